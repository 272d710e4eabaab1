use std::collections::HashSet;
use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use slidesmith_common::{GenerationRequest, PresentationDocument, Slide};
use slidesmith_protocol::{Event, NoticeKind, Op, PlaybackState, Step};

/// What the terminal loop should do after a key press or event.
#[derive(Debug)]
pub enum Action {
    Submit(Op),
    /// Put this text on the clipboard.
    Copy(String),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Success(String),
    Error(String),
}

/// View state mirrored from session events. The session stays the owner of
/// the document; this copy only feeds rendering.
pub struct App {
    pub running: bool,
    step: Step,
    input: String,
    document: Option<PresentationDocument>,
    current: usize,
    searching: HashSet<usize>,
    narration: (Option<usize>, PlaybackState, Option<PathBuf>),
    status: Option<Status>,
    out_dir: PathBuf,
}

impl App {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            running: true,
            step: Step::Input,
            input: String::new(),
            document: None,
            current: 0,
            searching: HashSet::new(),
            narration: (None, PlaybackState::Idle, None),
            status: None,
            out_dir,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn document(&self) -> Option<&PresentationDocument> {
        self.document.as_ref()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.document.as_ref().and_then(|d| d.slide(self.current))
    }

    pub fn is_searching(&self, index: usize) -> bool {
        self.searching.contains(&index)
    }

    /// Playback state for `index`; other slides read as idle.
    pub fn narration_for(&self, index: usize) -> (PlaybackState, Option<&PathBuf>) {
        match &self.narration {
            (Some(i), state, audio) if *i == index => (*state, audio.as_ref()),
            _ => (PlaybackState::Idle, None),
        }
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = Some(status);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Action::Quit);
        }
        match self.step {
            Step::Input => self.input_key(key),
            Step::Generating => match key.code {
                KeyCode::Esc => Some(Action::Quit),
                _ => None,
            },
            Step::Results => self.results_key(key),
        }
    }

    fn input_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Enter => {
                let topic = self.input.trim().to_string();
                if topic.is_empty() {
                    self.status = Some(Status::Info("Type a topic first".into()));
                    return None;
                }
                Some(Action::Submit(Op::Generate {
                    request: GenerationRequest::new(topic),
                }))
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                None
            }
            _ => None,
        }
    }

    fn results_key(&mut self, key: KeyEvent) -> Option<Action> {
        let total = self.document.as_ref().map_or(0, PresentationDocument::len);
        let op = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(Action::Quit),
            KeyCode::Left | KeyCode::Char('h') if self.current > 0 => Op::ShowSlide {
                index: self.current - 1,
            },
            KeyCode::Right | KeyCode::Char('l') if self.current + 1 < total => Op::ShowSlide {
                index: self.current + 1,
            },
            KeyCode::Char('r') => Op::RegenerateVisual {
                index: self.current,
            },
            KeyCode::Char('p') => Op::ToggleNarration {
                index: self.current,
            },
            KeyCode::Char('e') => Op::Export {
                out_dir: self.out_dir.clone(),
            },
            KeyCode::Char('s') => Op::Save { name: None },
            KeyCode::Char('n') => Op::ClearProject,
            KeyCode::Char('c') => {
                let text = self.current_slide()?.summary_text();
                self.status = Some(Status::Success(format!(
                    "Copied slide {} to the clipboard",
                    self.current + 1
                )));
                return Some(Action::Copy(text));
            }
            _ => return None,
        };
        Some(Action::Submit(op))
    }

    /// Apply a session event. May ask for a follow-up op.
    pub fn handle_event(&mut self, event: Event) -> Option<Action> {
        match event {
            Event::SessionConfigured {} => {}
            Event::StepChanged { step } => {
                self.step = step;
                if step == Step::Generating {
                    self.status = Some(Status::Info("Generating deck...".into()));
                }
            }
            Event::DocumentReady { title, slide_count } => {
                self.current = 0;
                self.searching.clear();
                self.narration = (None, PlaybackState::Idle, None);
                self.status = Some(Status::Success(format!("{title}: {slide_count} slides")));
                return Some(Action::Submit(Op::Snapshot));
            }
            Event::Snapshot { document } => self.document = document,
            Event::DocumentCleared => {
                self.document = None;
                self.input.clear();
                self.searching.clear();
                self.narration = (None, PlaybackState::Idle, None);
                self.status = None;
            }
            Event::SlideShown { index } => self.current = index,
            Event::VisualRequested { index, .. } => {
                self.searching.insert(index);
            }
            Event::SlideImageUpdated { index, url } => {
                self.searching.remove(&index);
                if let Some(doc) = self.document.as_mut() {
                    doc.set_slide_image(index, Some(url));
                }
            }
            Event::VisualUnavailable { index } => {
                self.searching.remove(&index);
                self.status = Some(Status::Info(format!("No image found for slide {}", index + 1)));
            }
            Event::Exported { path } => {
                self.status = Some(Status::Success(format!("Deck saved to {}", path.display())));
            }
            Event::Saved { id } => {
                self.status = Some(Status::Success(format!("Saved as {id}")));
            }
            Event::ProjectDeleted { id } => {
                self.status = Some(Status::Success(format!("Deleted {id}")));
            }
            Event::NarrationState {
                index,
                state,
                audio,
            } => {
                self.narration = (Some(index), state, audio);
            }
            Event::Notice { kind, message } => {
                self.status = Some(match kind {
                    NoticeKind::Info => Status::Info(message),
                    NoticeKind::Success => Status::Success(message),
                });
            }
            Event::Error { message } => {
                tracing::warn!("session error: {message}");
                self.status = Some(Status::Error(message));
            }
            Event::ShutdownComplete => self.running = false,
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidesmith_common::{Meta, SlideType};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn doc(n: usize) -> PresentationDocument {
        PresentationDocument {
            meta: Meta {
                title: "Deck".into(),
                ..Default::default()
            },
            slides: (0..n)
                .map(|i| Slide {
                    slide_type: SlideType::Content,
                    title: format!("S{i}"),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn with_results(n: usize) -> App {
        let mut app = App::new(PathBuf::from("/tmp/out"));
        app.handle_event(Event::StepChanged { step: Step::Results });
        app.handle_event(Event::Snapshot { document: Some(doc(n)) });
        app
    }

    #[test]
    fn typing_a_topic_submits_generate() {
        let mut app = App::new(PathBuf::from("."));
        assert!(app.handle_key(key(KeyCode::Enter)).is_none());
        for c in "AI".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        match app.handle_key(key(KeyCode::Enter)) {
            Some(Action::Submit(Op::Generate { request })) => assert_eq!(request.topic, "AI"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn navigation_stays_within_deck() {
        let mut app = with_results(2);
        assert!(app.handle_key(key(KeyCode::Left)).is_none());
        assert!(matches!(
            app.handle_key(key(KeyCode::Right)),
            Some(Action::Submit(Op::ShowSlide { index: 1 }))
        ));
        app.handle_event(Event::SlideShown { index: 1 });
        assert!(app.handle_key(key(KeyCode::Char('l'))).is_none());
        assert!(matches!(
            app.handle_key(key(KeyCode::Char('p'))),
            Some(Action::Submit(Op::ToggleNarration { index: 1 }))
        ));
    }

    #[test]
    fn copy_key_yields_the_slide_summary() {
        let mut app = with_results(2);
        app.handle_event(Event::SlideShown { index: 1 });
        match app.handle_key(key(KeyCode::Char('c'))) {
            Some(Action::Copy(text)) => {
                assert!(text.starts_with("TITLE: S1\n\nCONTENT:"));
                assert!(text.contains("SCRIPT:"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            app.status(),
            Some(&Status::Success("Copied slide 2 to the clipboard".into()))
        );

        // Ctrl-C still quits.
        assert!(matches!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        ));
    }

    #[test]
    fn document_ready_requests_a_snapshot() {
        let mut app = App::new(PathBuf::from("."));
        let follow_up = app.handle_event(Event::DocumentReady {
            title: "Deck".into(),
            slide_count: 3,
        });
        assert!(matches!(follow_up, Some(Action::Submit(Op::Snapshot))));
    }

    #[test]
    fn image_updates_patch_the_local_copy() {
        let mut app = with_results(2);
        app.handle_event(Event::VisualRequested { index: 1, token: 4 });
        assert!(app.is_searching(1));
        app.handle_event(Event::SlideImageUpdated {
            index: 1,
            url: "https://img/1.jpg".into(),
        });
        assert!(!app.is_searching(1));
        assert_eq!(
            app.document().and_then(|d| d.slide(1)).and_then(|s| s.img_data.as_deref()),
            Some("https://img/1.jpg")
        );
    }

    #[test]
    fn narration_state_is_per_slide() {
        let mut app = with_results(2);
        app.handle_event(Event::NarrationState {
            index: 0,
            state: PlaybackState::Playing,
            audio: Some(PathBuf::from("/tmp/a.wav")),
        });
        assert_eq!(app.narration_for(0).0, PlaybackState::Playing);
        assert_eq!(app.narration_for(1), (PlaybackState::Idle, None));
    }

    #[test]
    fn clear_returns_to_empty_input() {
        let mut app = with_results(1);
        app.handle_event(Event::DocumentCleared);
        app.handle_event(Event::StepChanged { step: Step::Input });
        assert!(app.document().is_none());
        assert_eq!(app.step(), Step::Input);
        assert_eq!(app.input(), "");
    }
}
