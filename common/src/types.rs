use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deck-level metadata, set once from the generation response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub date: String,
}

/// Layout family of a slide. Unknown values from the model fall back to
/// `Content`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideType {
    Title,
    ImageSplit,
    Chart,
    Quote,
    #[default]
    #[serde(other)]
    Content,
}

impl SlideType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlideType::Title => "title",
            SlideType::ImageSplit => "image_split",
            SlideType::Chart => "chart",
            SlideType::Quote => "quote",
            SlideType::Content => "content",
        }
    }

    /// Slide types that reserve a side region for a visual.
    pub fn supports_visual(&self) -> bool {
        matches!(self, SlideType::ImageSplit | SlideType::Chart)
    }
}

/// Decides where a visual's caption goes: tables are captioned above,
/// figures below.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualType {
    Table,
    #[default]
    #[serde(other)]
    Figure,
}

impl VisualType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualType::Table => "table",
            VisualType::Figure => "figure",
        }
    }

    pub fn caption_above(&self) -> bool {
        matches!(self, VisualType::Table)
    }
}

/// One entry of a slide body: either a plain bullet or a header with its own
/// sub-bullets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContentItem {
    Text(String),
    Section {
        header: String,
        bullets: Vec<String>,
    },
}

impl ContentItem {
    pub fn text(s: impl Into<String>) -> Self {
        ContentItem::Text(s.into())
    }

    pub fn section<I, S>(header: impl Into<String>, bullets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ContentItem::Section {
            header: header.into(),
            bullets: bullets.into_iter().map(Into::into).collect(),
        }
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => ContentItem::Text(s),
            Value::Object(mut map) if map.get("header").is_some_and(Value::is_string) => {
                let header = match map.remove("header") {
                    Some(Value::String(h)) => h,
                    _ => String::new(),
                };
                let bullets = match map.remove("bullets") {
                    Some(Value::Array(items)) => items.into_iter().map(value_to_line).collect(),
                    Some(Value::String(single)) => vec![single],
                    _ => Vec::new(),
                };
                ContentItem::Section { header, bullets }
            }
            other => ContentItem::Text(value_to_line(other)),
        }
    }
}

fn value_to_line(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl<'de> Deserialize<'de> for ContentItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(ContentItem::from_value(Value::deserialize(deserializer)?))
    }
}

/// Accepts an array of items, a single string, or null.
fn content_items<'de, D>(deserializer: D) -> Result<Vec<ContentItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(ContentItem::from_value).collect(),
        other => vec![ContentItem::from_value(other)],
    })
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(rename = "type", default)]
    pub slide_type: SlideType,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "content_items")]
    pub content: Vec<ContentItem>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub layout_guide: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub visual_prompt: Option<String>,
    #[serde(default)]
    pub visual_type: VisualType,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub visual_caption: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub speaker_script: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub speaker_tone: Option<String>,
    /// Reference to a resolved visual. Bytes are only fetched at export.
    #[serde(
        rename = "imgData",
        default,
        deserialize_with = "non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub img_data: Option<String>,
}

impl Slide {
    pub fn is_title(&self) -> bool {
        self.slide_type == SlideType::Title
    }

    /// Whether export reserves a visual region next to the body.
    pub fn reserves_visual(&self) -> bool {
        self.slide_type.supports_visual() && self.visual_caption.is_some()
    }

    /// Plain-text lines of the body, headers first then their bullets.
    pub fn content_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.content.len());
        for item in &self.content {
            match item {
                ContentItem::Text(text) => lines.push(text.clone()),
                ContentItem::Section { header, bullets } => {
                    lines.push(header.clone());
                    lines.extend(bullets.iter().map(|b| format!("  • {b}")));
                }
            }
        }
        lines
    }

    /// Title, body and script as a single clipboard-style block.
    pub fn summary_text(&self) -> String {
        format!(
            "TITLE: {}\n\nCONTENT:\n{}\n\nSCRIPT:\n{}",
            self.title,
            self.content_lines().join("\n"),
            self.speaker_script.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationDocument {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub slides: Vec<Slide>,
}

impl PresentationDocument {
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    /// Replace the visual reference of one slide. Returns false when the
    /// index is out of range.
    pub fn set_slide_image(&mut self, index: usize, reference: Option<String>) -> bool {
        match self.slides.get_mut(index) {
            Some(slide) => {
                slide.img_data = reference;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Text,
    Binary,
}

/// A user-supplied context file. Text attachments carry their contents
/// verbatim; binary ones carry base64 data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub kind: AttachmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub slide_count: usize,
    pub style: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl GenerationRequest {
    pub const DEFAULT_SLIDE_COUNT: usize = 8;
    pub const DEFAULT_STYLE: &'static str = "Corporate";

    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            slide_count: Self::DEFAULT_SLIDE_COUNT,
            style: Self::DEFAULT_STYLE.to_string(),
            attachments: Vec::new(),
        }
    }
}

/// Topics offered when the user asks to be surprised.
pub const SAMPLE_TOPICS: [&str; 5] = [
    "Future of AI",
    "Sustainable Energy",
    "Space Colonization",
    "Cognitive Science",
    "Blockchain Evolution",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_heterogeneous_content() {
        let json = r#"{
            "type": "content",
            "title": "Agenda",
            "content": [
                "Intro",
                {"header": "Details", "bullets": ["One", "Two"]},
                42
            ]
        }"#;
        let slide: Slide = serde_json::from_str(json).unwrap();
        assert_eq!(
            slide.content,
            vec![
                ContentItem::text("Intro"),
                ContentItem::section("Details", ["One", "Two"]),
                ContentItem::text("42"),
            ]
        );
    }

    #[test]
    fn unknown_slide_type_falls_back_to_content() {
        let slide: Slide = serde_json::from_str(r#"{"type": "timeline", "title": "x"}"#).unwrap();
        assert_eq!(slide.slide_type, SlideType::Content);

        let slide: Slide = serde_json::from_str(r#"{"type": "image_split", "title": "x"}"#).unwrap();
        assert_eq!(slide.slide_type, SlideType::ImageSplit);
    }

    #[test]
    fn empty_strings_are_absent() {
        let slide: Slide = serde_json::from_str(
            r#"{"type": "quote", "title": "x", "speaker_tone": "", "imgData": "", "visual_type": ""}"#,
        )
        .unwrap();
        assert_eq!(slide.speaker_tone, None);
        assert_eq!(slide.img_data, None);
        assert_eq!(slide.visual_type, VisualType::Figure);
    }

    #[test]
    fn single_string_content_becomes_one_item() {
        let slide: Slide = serde_json::from_str(r#"{"title": "x", "content": "Only"}"#).unwrap();
        assert_eq!(slide.content, vec![ContentItem::text("Only")]);
    }

    #[test]
    fn reserves_visual_needs_type_and_caption() {
        let mut slide = Slide {
            slide_type: SlideType::Chart,
            ..Default::default()
        };
        assert!(!slide.reserves_visual());
        slide.visual_caption = Some("Figure 1: Growth".into());
        assert!(slide.reserves_visual());
        slide.slide_type = SlideType::Quote;
        assert!(!slide.reserves_visual());
    }

    #[test]
    fn set_slide_image_rejects_out_of_range() {
        let mut doc = PresentationDocument {
            meta: Meta::default(),
            slides: vec![Slide::default()],
        };
        assert!(doc.set_slide_image(0, Some("https://img/1.jpg".into())));
        assert!(!doc.set_slide_image(3, Some("https://img/2.jpg".into())));
        assert_eq!(doc.slides[0].img_data.as_deref(), Some("https://img/1.jpg"));
    }
}
