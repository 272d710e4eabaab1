//! First export phase: place every slide's shapes on the 16:9 canvas and
//! fetch the pictures they need.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};
use slidesmith_common::{ContentItem, Slide};

use crate::client::ImageFetcher;

pub const EMU_PER_INCH: i64 = 914_400;
/// 10in x 5.625in.
pub const SLIDE_WIDTH: i64 = 9_144_000;
pub const SLIDE_HEIGHT: i64 = 5_143_500;

pub const TITLE_BACKGROUND: &str = "1E3A8A";
pub const UNAVAILABLE_LABEL: &str = "[Image unavailable]";
pub const PLACEHOLDER_HINT: &str = "[Click \"Generate Figure\" to add image]";
pub const FOOTER_LABEL: &str = "Generated Presentation";

/// Opacity of the title slide's background picture (60% transparent).
const BACKGROUND_ALPHA: u32 = 40_000;

pub fn inches(v: f64) -> i64 {
    (v * EMU_PER_INCH as f64).round() as i64
}

fn pct_x(p: f64) -> i64 {
    (SLIDE_WIDTH as f64 * p / 100.0).round() as i64
}

fn pct_y(p: f64) -> i64 {
    (SLIDE_HEIGHT as f64 * p / 100.0).round() as i64
}

/// Position and size in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Frame {
    pub fn new(x: i64, y: i64, cx: i64, cy: i64) -> Self {
        Self { x, y, cx, cy }
    }

    pub fn full_slide() -> Self {
        Self::new(0, 0, SLIDE_WIDTH, SLIDE_HEIGHT)
    }

    /// Largest frame with the image's aspect ratio that fits inside, centered.
    pub fn contain(&self, width: u32, height: u32) -> Frame {
        if width == 0 || height == 0 {
            return *self;
        }
        let image_ratio = f64::from(width) / f64::from(height);
        let frame_ratio = self.cx as f64 / self.cy as f64;
        if image_ratio > frame_ratio {
            let cy = (self.cx as f64 / image_ratio).round() as i64;
            Frame::new(self.x, self.y + (self.cy - cy) / 2, self.cx, cy)
        } else {
            let cx = (self.cy as f64 * image_ratio).round() as i64;
            Frame::new(self.x + (self.cx - cx) / 2, self.y, cx, self.cy)
        }
    }

    /// Source crop that lets the image fill this frame without distortion.
    pub fn cover(&self, width: u32, height: u32) -> Crop {
        if width == 0 || height == 0 {
            return Crop::default();
        }
        let image_ratio = f64::from(width) / f64::from(height);
        let frame_ratio = self.cx as f64 / self.cy as f64;
        if image_ratio > frame_ratio {
            let side = ((1.0 - frame_ratio / image_ratio) / 2.0 * 100_000.0).round() as u32;
            Crop {
                left: side,
                right: side,
                ..Crop::default()
            }
        } else {
            let side = ((1.0 - image_ratio / frame_ratio) / 2.0 * 100_000.0).round() as u32;
            Crop {
                top: side,
                bottom: side,
                ..Crop::default()
            }
        }
    }
}

/// Per-side source crop in thousandths of a percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crop {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Crop {
    pub fn is_empty(&self) -> bool {
        *self == Crop::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Top,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    /// Points.
    pub size: u32,
    pub bold: bool,
    pub color: &'static str,
}

impl TextStyle {
    pub const fn new(size: u32, bold: bool, color: &'static str) -> Self {
        Self { size, bold, color }
    }
}

const TITLE_STYLE: TextStyle = TextStyle::new(44, true, "FFFFFF");
const SUBTITLE_STYLE: TextStyle = TextStyle::new(18, false, "E0E0E0");
const HEADING_STYLE: TextStyle = TextStyle::new(28, true, "1E3A8A");
const BODY_STYLE: TextStyle = TextStyle::new(16, false, "374151");
const CAPTION_STYLE: TextStyle = TextStyle::new(10, true, "6B7280");
const UNAVAILABLE_STYLE: TextStyle = TextStyle::new(14, true, "CC0000");
const HINT_STYLE: TextStyle = TextStyle::new(12, true, "9CA3AF");
const FOOTER_STYLE: TextStyle = TextStyle::new(10, false, "9CA3AF");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    pub style: TextStyle,
    pub bullet: bool,
    /// Indent level; sub-bullets sit at level 1.
    pub level: u8,
}

impl Paragraph {
    fn plain(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
            bullet: false,
            level: 0,
        }
    }

    fn bulleted(text: impl Into<String>, style: TextStyle, level: u8) -> Self {
        Self {
            text: text.into(),
            style,
            bullet: true,
            level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBox {
    pub frame: Frame,
    pub paragraphs: Vec<Paragraph>,
    pub align: Align,
    pub anchor: Anchor,
}

impl TextBox {
    fn line(frame: Frame, text: impl Into<String>, style: TextStyle, align: Align) -> Self {
        Self {
            frame,
            paragraphs: vec![Paragraph::plain(text, style)],
            align,
            anchor: Anchor::Top,
        }
    }

    /// All paragraph text joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outline {
    pub color: &'static str,
    /// Points.
    pub width: u32,
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rect {
    pub frame: Frame,
    pub fill: &'static str,
    pub outline: Outline,
}

/// Picture bytes in a format the package can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl EmbeddedImage {
    /// Detect format and size. Formats presentation software does not read
    /// natively are re-encoded as PNG.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, image::ImageError> {
        let format = image::guess_format(&bytes)?;
        if matches!(
            format,
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::Bmp
        ) {
            let (width, height) = ImageReader::with_format(Cursor::new(&bytes), format).into_dimensions()?;
            return Ok(Self {
                bytes,
                format,
                width,
                height,
            });
        }

        let decoded = image::load_from_memory_with_format(&bytes, format)?;
        let mut png = Cursor::new(Vec::new());
        decoded.write_to(&mut png, ImageFormat::Png)?;
        Ok(Self {
            bytes: png.into_inner(),
            format: ImageFormat::Png,
            width: decoded.width(),
            height: decoded.height(),
        })
    }

    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            _ => "png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub frame: Frame,
    pub image: EmbeddedImage,
    pub crop: Crop,
    /// Opacity in thousandths of a percent; `None` is fully opaque.
    pub alpha: Option<u32>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Text(TextBox),
    Rect(Rect),
    Picture(Picture),
}

impl Element {
    pub fn as_text(&self) -> Option<&TextBox> {
        match self {
            Element::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// One slide, fully positioned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlideLayout {
    pub background: Option<&'static str>,
    pub elements: Vec<Element>,
    pub notes: Option<String>,
}

impl SlideLayout {
    pub fn pictures(&self) -> impl Iterator<Item = &Picture> {
        self.elements.iter().filter_map(|e| match e {
            Element::Picture(p) => Some(p),
            _ => None,
        })
    }

    /// Index of the first text box whose text equals `text`.
    pub fn position_of_text(&self, text: &str) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| e.as_text().is_some_and(|t| t.text() == text))
    }
}

pub fn speaker_notes(slide: &Slide) -> Option<String> {
    slide.speaker_script.as_ref().map(|script| {
        format!(
            "Speaker Notes:\n\n{script}\n\nTone: {}",
            slide.speaker_tone.as_deref().unwrap_or("Professional")
        )
    })
}

async fn load_image(fetcher: &dyn ImageFetcher, url: &str) -> Option<EmbeddedImage> {
    let bytes = match fetcher.fetch(url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("{e}");
            return None;
        }
    };
    match EmbeddedImage::from_bytes(bytes) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!("unusable image at {url}: {e}");
            None
        }
    }
}

/// Lay out slide `index` of `total`. Picture failures degrade to labels;
/// this never fails.
pub async fn layout_slide(
    slide: &Slide,
    index: usize,
    total: usize,
    fetcher: &dyn ImageFetcher,
) -> SlideLayout {
    let mut layout = if slide.is_title() {
        title_slide(slide, fetcher).await
    } else {
        content_slide(slide, index, total, fetcher).await
    };
    layout.notes = speaker_notes(slide);
    layout
}

async fn title_slide(slide: &Slide, fetcher: &dyn ImageFetcher) -> SlideLayout {
    let mut elements = Vec::new();

    if let Some(url) = slide.img_data.as_deref() {
        if let Some(image) = load_image(fetcher, url).await {
            let frame = Frame::full_slide();
            elements.push(Element::Picture(Picture {
                crop: frame.cover(image.width, image.height),
                frame,
                image,
                alpha: Some(BACKGROUND_ALPHA),
                description: slide.title.clone(),
            }));
        }
    }

    elements.push(Element::Text(TextBox {
        frame: Frame::new(inches(0.5), inches(1.8), pct_x(90.0), inches(1.5)),
        paragraphs: vec![Paragraph::plain(&slide.title, TITLE_STYLE)],
        align: Align::Center,
        anchor: Anchor::Middle,
    }));

    let lines = slide.content_lines();
    if !lines.is_empty() {
        elements.push(Element::Text(TextBox {
            frame: Frame::new(inches(0.5), inches(3.5), pct_x(90.0), inches(1.0)),
            paragraphs: lines
                .into_iter()
                .map(|line| Paragraph::plain(line, SUBTITLE_STYLE))
                .collect(),
            align: Align::Center,
            anchor: Anchor::Top,
        }));
    }

    SlideLayout {
        background: Some(TITLE_BACKGROUND),
        elements,
        notes: None,
    }
}

fn body_paragraphs(content: &[ContentItem]) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    for item in content {
        match item {
            ContentItem::Text(text) => paragraphs.push(Paragraph::bulleted(text, BODY_STYLE, 0)),
            ContentItem::Section { header, bullets } => {
                paragraphs.push(Paragraph::plain(
                    header,
                    TextStyle {
                        bold: true,
                        ..BODY_STYLE
                    },
                ));
                paragraphs.extend(bullets.iter().map(|b| Paragraph::bulleted(b, BODY_STYLE, 1)));
            }
        }
    }
    paragraphs
}

fn visual_region() -> Frame {
    Frame::new(pct_x(52.0), inches(1.2), pct_x(45.0), inches(4.0))
}

async fn content_slide(
    slide: &Slide,
    index: usize,
    total: usize,
    fetcher: &dyn ImageFetcher,
) -> SlideLayout {
    let mut elements = vec![
        Element::Rect(Rect {
            frame: Frame::new(0, 0, SLIDE_WIDTH, inches(0.8)),
            fill: "F9FAFB",
            outline: Outline {
                color: "E5E7EB",
                width: 1,
                dashed: false,
            },
        }),
        Element::Text(TextBox::line(
            Frame::new(inches(0.5), inches(0.2), pct_x(90.0), inches(0.5)),
            &slide.title,
            HEADING_STYLE,
            Align::Left,
        )),
    ];

    let reserves_visual = slide.reserves_visual();

    if !slide.content.is_empty() {
        let width = if reserves_visual { pct_x(45.0) } else { pct_x(90.0) };
        elements.push(Element::Text(TextBox {
            frame: Frame::new(inches(0.5), inches(1.2), width, inches(4.0)),
            paragraphs: body_paragraphs(&slide.content),
            align: Align::Left,
            anchor: Anchor::Top,
        }));
    }

    if reserves_visual {
        visual_elements(slide, fetcher, &mut elements).await;
    }

    let footer_y = pct_y(92.0);
    elements.push(Element::Text(TextBox::line(
        Frame::new(pct_x(5.0), footer_y, pct_x(40.0), inches(0.3)),
        FOOTER_LABEL,
        FOOTER_STYLE,
        Align::Left,
    )));
    elements.push(Element::Text(TextBox::line(
        Frame::new(pct_x(85.0), footer_y, pct_x(12.0), inches(0.3)),
        format!("{} / {}", index + 1, total),
        FOOTER_STYLE,
        Align::Right,
    )));

    SlideLayout {
        background: None,
        elements,
        notes: None,
    }
}

/// Picture or placeholder for the reserved region, with its caption placed
/// above for tables and below for figures.
async fn visual_elements(slide: &Slide, fetcher: &dyn ImageFetcher, elements: &mut Vec<Element>) {
    let region = visual_region();
    let above = slide.visual_type.caption_above();
    let caption = slide.visual_caption.as_ref().map(|text| {
        let y = if above { inches(1.0) } else { inches(5.3) };
        Element::Text(TextBox::line(
            Frame::new(region.x, y, region.cx, inches(0.25)),
            text,
            CAPTION_STYLE,
            Align::Center,
        ))
    });
    let label_frame = Frame::new(region.x, inches(2.5), region.cx, inches(0.5));

    if above {
        elements.extend(caption.clone());
    }

    match slide.img_data.as_deref() {
        Some(url) => match load_image(fetcher, url).await {
            Some(image) => elements.push(Element::Picture(Picture {
                frame: region.contain(image.width, image.height),
                image,
                crop: Crop::default(),
                alpha: None,
                description: slide.visual_caption.clone().unwrap_or_default(),
            })),
            None => elements.push(Element::Text(TextBox::line(
                label_frame,
                UNAVAILABLE_LABEL,
                UNAVAILABLE_STYLE,
                Align::Center,
            ))),
        },
        None => {
            elements.push(Element::Rect(Rect {
                frame: region,
                fill: "F3F4F6",
                outline: Outline {
                    color: "D1D5DB",
                    width: 2,
                    dashed: true,
                },
            }));
            elements.push(Element::Text(TextBox::line(
                label_frame,
                PLACEHOLDER_HINT,
                HINT_STYLE,
                Align::Center,
            )));
        }
    }

    if !above {
        elements.extend(caption);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ExportError;
    use async_trait::async_trait;
    use slidesmith_common::{SlideType, VisualType};
    use std::collections::HashMap;

    /// Serves fixed bytes per URL; unknown URLs fail.
    #[derive(Default)]
    pub(crate) struct MapFetcher(pub HashMap<String, Vec<u8>>);

    #[async_trait]
    impl ImageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, ExportError> {
            self.0.get(url).cloned().ok_or_else(|| ExportError::ImageFetch {
                url: url.to_string(),
                reason: "http 404 Not Found".into(),
            })
        }
    }

    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn chart(visual_type: VisualType, img: Option<&str>) -> Slide {
        Slide {
            slide_type: SlideType::Chart,
            title: "Growth".into(),
            content: vec![ContentItem::text("Up and to the right")],
            visual_type,
            visual_caption: Some("Figure 1: Revenue".into()),
            img_data: img.map(str::to_string),
            ..Default::default()
        }
    }

    fn visual_position(layout: &SlideLayout) -> usize {
        layout
            .elements
            .iter()
            .position(|e| {
                matches!(e, Element::Picture(_) | Element::Rect(Rect { outline: Outline { dashed: true, .. }, .. }))
            })
            .unwrap()
    }

    #[tokio::test]
    async fn table_caption_precedes_visual_and_figure_caption_follows() {
        let fetcher = MapFetcher::default();

        let table = layout_slide(&chart(VisualType::Table, None), 1, 3, &fetcher).await;
        let caption = table.position_of_text("Figure 1: Revenue").unwrap();
        assert!(caption < visual_position(&table));

        let figure = layout_slide(&chart(VisualType::Figure, None), 1, 3, &fetcher).await;
        let caption = figure.position_of_text("Figure 1: Revenue").unwrap();
        assert!(caption > visual_position(&figure));
    }

    #[tokio::test]
    async fn missing_reference_draws_placeholder() {
        let layout = layout_slide(&chart(VisualType::Figure, None), 0, 1, &MapFetcher::default()).await;
        assert!(layout.position_of_text(PLACEHOLDER_HINT).is_some());
        assert_eq!(layout.pictures().count(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_draws_unavailable_label() {
        let slide = chart(VisualType::Figure, Some("https://img/missing.jpg"));
        let layout = layout_slide(&slide, 0, 1, &MapFetcher::default()).await;
        assert!(layout.position_of_text(UNAVAILABLE_LABEL).is_some());
        assert!(layout.position_of_text(PLACEHOLDER_HINT).is_none());
        assert!(layout.position_of_text("Figure 1: Revenue").is_some());
    }

    #[tokio::test]
    async fn fetched_picture_is_contained_in_region() {
        let url = "https://img/wide.png";
        let fetcher = MapFetcher([(url.to_string(), png(200, 50))].into_iter().collect());
        let layout = layout_slide(&chart(VisualType::Figure, Some(url)), 0, 1, &fetcher).await;

        let picture = layout.pictures().next().unwrap();
        let region = visual_region();
        assert_eq!(picture.frame.cx, region.cx);
        assert!(picture.frame.cy < region.cy);
        assert!(picture.frame.y > region.y);
        assert_eq!(picture.alpha, None);
        assert_eq!(picture.image.format, ImageFormat::Png);
    }

    #[tokio::test]
    async fn body_narrows_only_when_visual_is_reserved() {
        let fetcher = MapFetcher::default();
        let body_width = |layout: &SlideLayout| {
            layout
                .elements
                .iter()
                .filter_map(Element::as_text)
                .find(|t| t.text() == "Up and to the right")
                .map(|t| t.frame.cx)
                .unwrap()
        };

        let with_visual = layout_slide(&chart(VisualType::Figure, None), 0, 1, &fetcher).await;
        assert_eq!(body_width(&with_visual), pct_x(45.0));

        let mut plain = chart(VisualType::Figure, None);
        plain.visual_caption = None;
        let without = layout_slide(&plain, 0, 1, &fetcher).await;
        assert_eq!(body_width(&without), pct_x(90.0));
        assert!(without.position_of_text(PLACEHOLDER_HINT).is_none());
    }

    #[tokio::test]
    async fn sections_render_header_then_indented_bullets() {
        let slide = Slide {
            title: "Plan".into(),
            content: vec![ContentItem::section("Phase 1", ["Scope", "Hire"])],
            ..Default::default()
        };
        let layout = layout_slide(&slide, 2, 5, &MapFetcher::default()).await;
        let body = layout
            .elements
            .iter()
            .filter_map(Element::as_text)
            .find(|t| t.paragraphs.len() == 3)
            .unwrap();
        assert!(body.paragraphs[0].style.bold && !body.paragraphs[0].bullet);
        assert!(body.paragraphs[1].bullet && body.paragraphs[1].level == 1);
        assert!(layout.position_of_text("3 / 5").is_some());
        assert!(layout.position_of_text(FOOTER_LABEL).is_some());
    }

    #[tokio::test]
    async fn title_slide_puts_faded_cover_image_under_text() {
        let url = "https://img/bg.png";
        let fetcher = MapFetcher([(url.to_string(), png(100, 100))].into_iter().collect());
        let slide = Slide {
            slide_type: SlideType::Title,
            title: "Deck".into(),
            content: vec![ContentItem::text("Subtitle")],
            img_data: Some(url.into()),
            speaker_script: Some("Welcome".into()),
            ..Default::default()
        };
        let layout = layout_slide(&slide, 0, 4, &fetcher).await;

        assert_eq!(layout.background, Some(TITLE_BACKGROUND));
        assert!(matches!(layout.elements[0], Element::Picture(_)));
        let picture = layout.pictures().next().unwrap();
        assert_eq!(picture.alpha, Some(40_000));
        assert_eq!(picture.frame, Frame::full_slide());
        assert!(picture.crop.top > 0 && picture.crop.left == 0);
        assert!(layout.position_of_text(FOOTER_LABEL).is_none());
        assert_eq!(
            layout.notes.as_deref(),
            Some("Speaker Notes:\n\nWelcome\n\nTone: Professional")
        );
    }

    #[test]
    fn cover_crops_the_long_axis() {
        let frame = Frame::full_slide();
        let crop = frame.cover(400, 100);
        assert!(crop.left > 0 && crop.left == crop.right);
        assert_eq!(crop.top, 0);
        assert!(frame.cover(16, 9).left <= 1);
    }

    #[test]
    fn unreadable_bytes_are_rejected() {
        assert!(EmbeddedImage::from_bytes(b"definitely not an image".to_vec()).is_err());
    }
}
