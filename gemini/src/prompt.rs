use slidesmith_common::{AttachmentKind, GenerationRequest};

use crate::models::Part;

/// Fixed design brief sent as the system instruction for deck generation.
pub fn system_instruction(topic: &str) -> String {
    format!(
        r#"You are an elite Presentation Designer and Communication Coach.
Create a professional PowerPoint presentation on: "{topic}".

STRICT DESIGN & CONTENT RULES:
1. **6x6 Rule**: Maximum 6 bullet points per slide. Maximum 6-7 words per bullet point. NO paragraphs.
2. **One Idea Per Slide**: Each slide must focus on a single core message.
3. **Readability**: Content must be designed for large projection. Short, punchy keywords.
4. **Layout Instructions**: For every slide, specify the layout (e.g., "Split: Text Left / Image Right", "Center: Big Statement").

CRITICAL LABELING GUIDELINES:
5. **Figures**: Must have a numbered caption **BELOW** the image (e.g., "Figure 1: Market Growth").
6. **Tables**: Must have a numbered caption **ABOVE** the table (e.g., "Table 1: Budget Breakdown").
7. **Visuals**: Explicitly categorize visual elements as 'figure' or 'table'.

COACHING SESSION:
8. **Script**: Provide a verbatim script or detailed talking points for what the speaker should say.
9. **Tone**: Provide specific vocal direction (e.g., "Enthusiastic and fast-paced", "Somber and serious").

MANDATORY STRUCTURE:
- **Slide 1**: Title Slide.
- **Slide 2**: Agenda/Roadmap.
- **Middle Slides**: Core content (must cover technical details).
- **Second to Last Slide**: References/Bibliography (List sources).
- **Last Slide**: Thank You / Q&A.

OUTPUT JSON FORMAT:
{{
  "meta": {{ "title": "Title", "theme": "Professional", "date": "YYYY-MM-DD" }},
  "slides": [
    {{
      "type": "title" | "content" | "image_split" | "chart" | "quote",
      "title": "Slide Title",
      "content": ["Bullet 1", "Bullet 2"],
      "layout_guide": "Text left, Image right",
      "visual_prompt": "Detailed prompt for AI image generation",
      "visual_type": "figure" | "table",
      "visual_caption": "Figure X: Description",
      "speaker_script": "Words to say...",
      "speaker_tone": "Confident"
    }}
  ]
}}"#
    )
}

/// User turn: topic line followed by attachment parts.
pub fn user_parts(request: &GenerationRequest) -> Vec<Part> {
    let mut parts = vec![Part::text(format!(
        "Topic: {}. Target Slides: {}. Style: {}.",
        request.topic, request.slide_count, request.style
    ))];

    for (index, file) in request.attachments.iter().enumerate() {
        let n = index + 1;
        match file.kind {
            AttachmentKind::Text => {
                parts.push(Part::text(format!(
                    "\n\n[Context File {n}: {}]\n{}",
                    file.name, file.data
                )));
            }
            AttachmentKind::Binary => {
                let mime = file
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                parts.push(Part::inline(mime, file.data.clone()));
                parts.push(Part::text(format!(
                    "\n[File Attachment {n}: {}] (Visual Context)",
                    file.name
                )));
            }
        }
    }

    if !request.attachments.is_empty() {
        parts.push(Part::text(
            "\n\nUse the attached context to inform the slide content.",
        ));
    }

    parts
}

/// Spoken prompt for the speech model. The script is sent as given.
pub fn speech_prompt(script: &str, tone: &str) -> String {
    let tone = if tone.trim().is_empty() { "professional" } else { tone };
    format!("Say in a {tone} tone: {script}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidesmith_common::Attachment;

    #[test]
    fn user_parts_without_attachments_is_single_line() {
        let mut req = GenerationRequest::new("Future of AI");
        req.slide_count = 5;
        let parts = user_parts(&req);
        assert_eq!(parts.len(), 1);
        assert_eq!(
            parts[0].as_text(),
            Some("Topic: Future of AI. Target Slides: 5. Style: Corporate.")
        );
    }

    #[test]
    fn attachments_are_inlined_and_labelled() {
        let mut req = GenerationRequest::new("Energy");
        req.attachments = vec![
            Attachment {
                name: "notes.txt".into(),
                kind: AttachmentKind::Text,
                mime_type: Some("text/plain".into()),
                data: "solar is cheap".into(),
            },
            Attachment {
                name: "chart.png".into(),
                kind: AttachmentKind::Binary,
                mime_type: Some("image/png".into()),
                data: "iVBORw0=".into(),
            },
        ];
        let parts = user_parts(&req);
        assert_eq!(parts.len(), 5);
        assert!(parts[1]
            .as_text()
            .unwrap()
            .contains("[Context File 1: notes.txt]\nsolar is cheap"));
        let inline = parts[2].as_inline_data().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "iVBORw0=");
        assert!(parts[3]
            .as_text()
            .unwrap()
            .contains("[File Attachment 2: chart.png] (Visual Context)"));
        assert!(parts[4].as_text().unwrap().contains("Use the attached context"));
    }

    #[test]
    fn speech_prompt_wraps_script_with_tone() {
        assert_eq!(
            speech_prompt("Welcome to the show", "Confident"),
            "Say in a Confident tone: Welcome to the show"
        );
        assert_eq!(speech_prompt("Hi", ""), "Say in a professional tone: Hi");
    }
}
