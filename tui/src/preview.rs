use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use slidesmith_common::{ContentItem, Slide, SlideType};
use slidesmith_protocol::PlaybackState;

use crate::app::{App, Status};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
        .split(f.area());

    match app.current_slide() {
        Some(slide) => draw_results(f, chunks[0], app, slide),
        None => draw_input(f, chunks[0], app),
    }
    draw_status(f, chunks[1], app.status());
    f.render_widget(
        Paragraph::new(help_line(app)).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn help_line(app: &App) -> &'static str {
    if app.current_slide().is_some() {
        "←/→ navigate  r new image  p narrate  c copy  e export  s save  n new deck  q quit"
    } else {
        "Enter generate  Esc quit"
    }
}

fn draw_input(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(area);

    let intro = Paragraph::new("Describe what your deck should be about.")
        .block(Block::default().title("Slidesmith").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(intro, chunks[0]);

    let input = Paragraph::new(app.input())
        .block(Block::default().title("Topic").borders(Borders::ALL));
    f.render_widget(input, chunks[1]);
}

fn draw_results(f: &mut Frame, area: Rect, app: &App, slide: &Slide) {
    let total = app.document().map_or(0, |d| d.len());
    let index = app.current();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    let title = format!(
        "Slide {}/{} [{}]",
        index + 1,
        total,
        slide.slide_type.as_str()
    );
    let body = Paragraph::new(slide_lines(slide, app.is_searching(index)))
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    f.render_widget(body, chunks[0]);

    let (state, audio) = app.narration_for(index);
    let mut notes_title = format!("Speaker notes ({})", playback_label(state));
    if let Some(tone) = &slide.speaker_tone {
        notes_title.push_str(&format!(" · {tone}"));
    }
    let mut notes = vec![Line::from(
        slide.speaker_script.clone().unwrap_or_else(|| "No script".to_string()),
    )];
    if let Some(path) = audio {
        notes.push(Line::from(Span::styled(
            format!("Audio: {}", path.display()),
            Style::default().fg(Color::DarkGray),
        )));
    }
    let notes = Paragraph::new(notes)
        .block(Block::default().title(notes_title).borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(notes, chunks[1]);
}

fn playback_label(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Idle => "idle",
        PlaybackState::Loading => "synthesizing",
        PlaybackState::Playing => "playing",
        PlaybackState::Paused => "paused",
    }
}

/// Text rendering of a slide: heading, body and visual status.
pub(crate) fn slide_lines(slide: &Slide, searching: bool) -> Vec<Line<'static>> {
    let heading = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::from(Span::styled(slide.title.clone(), heading)), Line::default()];

    for item in &slide.content {
        match item {
            ContentItem::Text(text) if slide.slide_type == SlideType::Quote => {
                lines.push(Line::from(Span::styled(
                    format!("“{text}”"),
                    Style::default().add_modifier(Modifier::ITALIC),
                )));
            }
            ContentItem::Text(text) => lines.push(Line::from(format!("• {text}"))),
            ContentItem::Section { header, bullets } => {
                lines.push(Line::from(Span::styled(header.clone(), Style::default().fg(Color::Cyan))));
                lines.extend(bullets.iter().map(|b| Line::from(format!("  – {b}"))));
            }
        }
    }

    let visual = if searching {
        Some("Searching for an image...".to_string())
    } else if let Some(url) = &slide.img_data {
        Some(format!("Image: {url}"))
    } else if slide.visual_prompt.is_some() {
        Some("No image yet (r to search)".to_string())
    } else {
        None
    };
    if let Some(visual) = visual {
        lines.push(Line::default());
        if let Some(caption) = &slide.visual_caption {
            lines.push(Line::from(Span::styled(caption.clone(), Style::default().fg(Color::Yellow))));
        }
        lines.push(Line::from(Span::styled(visual, Style::default().fg(Color::DarkGray))));
    }
    lines
}

fn draw_status(f: &mut Frame, area: Rect, status: Option<&Status>) {
    let Some(status) = status else {
        return;
    };
    let (text, color) = match status {
        Status::Info(m) => (m.as_str(), Color::Gray),
        Status::Success(m) => (m.as_str(), Color::Green),
        Status::Error(m) => (m.as_str(), Color::Red),
    };
    f.render_widget(Paragraph::new(text).style(Style::default().fg(color)), area);
}
