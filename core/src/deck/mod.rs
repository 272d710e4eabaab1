//! Deck export: lay out every slide, then package the result as a 16:9
//! presentation with speaker notes.

pub mod layout;
pub mod package;
mod templates;
pub mod xml;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use slidesmith_common::{deck_file_name, save_bytes, PresentationDocument};

use crate::client::ImageFetcher;
use crate::error::ExportError;

pub use layout::{layout_slide, SlideLayout};

pub struct DeckAssembler {
    fetcher: Arc<dyn ImageFetcher>,
}

impl DeckAssembler {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Lay out all slides. Picture fetches run concurrently.
    pub async fn layout(&self, doc: &PresentationDocument) -> Vec<SlideLayout> {
        let total = doc.len();
        join_all(
            doc.slides
                .iter()
                .enumerate()
                .map(|(index, slide)| layout_slide(slide, index, total, self.fetcher.as_ref())),
        )
        .await
    }

    pub async fn build(&self, doc: &PresentationDocument) -> Result<Vec<u8>, ExportError> {
        if doc.is_empty() {
            return Err(ExportError::EmptyDeck);
        }
        let layouts = self.layout(doc).await;
        let title = if doc.meta.title.trim().is_empty() {
            "Presentation"
        } else {
            doc.meta.title.as_str()
        };
        package::write_package(title, &layouts, chrono::Utc::now())
    }

    /// Build the deck and write it into `out_dir` as `{title}.pptx`.
    pub async fn export(&self, doc: &PresentationDocument, out_dir: &Path) -> Result<PathBuf, ExportError> {
        let bytes = self.build(doc).await?;
        let path = save_bytes(out_dir, &deck_file_name(&doc.meta.title), &bytes).await?;
        tracing::info!("Exported {} slides to {}", doc.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::layout::tests::{png, MapFetcher};
    use super::*;
    use slidesmith_common::{ContentItem, Meta, Slide, SlideType, VisualType};
    use std::io::{Cursor, Read};

    fn read_part(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut part = archive.by_name(name).unwrap();
        let mut out = String::new();
        part.read_to_string(&mut out).unwrap();
        out
    }

    fn sample_doc() -> PresentationDocument {
        PresentationDocument {
            meta: Meta {
                title: "Solar: 2030?".into(),
                theme: "Corporate".into(),
                date: "2024".into(),
            },
            slides: vec![
                Slide {
                    slide_type: SlideType::Title,
                    title: "Solar".into(),
                    content: vec![ContentItem::text("A brighter grid")],
                    speaker_script: Some("Good morning.".into()),
                    ..Default::default()
                },
                Slide {
                    slide_type: SlideType::ImageSplit,
                    title: "Panels".into(),
                    content: vec![ContentItem::text("Efficiency rising")],
                    visual_type: VisualType::Figure,
                    visual_caption: Some("Figure 1: Rooftop array".into()),
                    img_data: Some("https://img/panel.png".into()),
                    speaker_script: Some("Look at this array.".into()),
                    speaker_tone: Some("Excited".into()),
                    ..Default::default()
                },
                Slide {
                    slide_type: SlideType::Chart,
                    title: "Costs".into(),
                    content: vec![ContentItem::text("Falling fast")],
                    visual_type: VisualType::Table,
                    visual_caption: Some("Table 1: Cost per watt".into()),
                    ..Default::default()
                },
            ],
        }
    }

    #[tokio::test]
    async fn package_contains_slides_notes_and_media() {
        let fetcher = MapFetcher(
            [("https://img/panel.png".to_string(), png(8, 6))]
                .into_iter()
                .collect(),
        );
        let assembler = DeckAssembler::new(Arc::new(fetcher));
        let bytes = assembler.build(&sample_doc()).await.unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide3.xml",
            "ppt/notesSlides/notesSlide1.xml",
            "ppt/notesSlides/notesSlide2.xml",
            "ppt/media/image1.png",
            "ppt/theme/theme2.xml",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {name}");
        }
        assert!(archive.by_name("ppt/notesSlides/notesSlide3.xml").is_err());

        let notes = read_part(&mut archive, "ppt/notesSlides/notesSlide2.xml");
        assert!(notes.contains("Look at this array."));
        assert!(notes.contains("Tone: Excited"));

        let rels = read_part(&mut archive, "ppt/slides/_rels/slide2.xml.rels");
        assert!(rels.contains(r#"Id="rId3""#) && rels.contains("../media/image1.png"));

        let slide3 = read_part(&mut archive, "ppt/slides/slide3.xml");
        assert!(slide3.contains("Table 1: Cost per watt"));
        assert!(slide3.contains("Generate Figure"));
        assert!(slide3.contains("3 / 3"));

        let core = read_part(&mut archive, "docProps/core.xml");
        assert!(core.contains("<dc:title>Solar: 2030?</dc:title>"));
    }

    #[tokio::test]
    async fn export_names_file_after_title() {
        let tmp = tempfile::tempdir().unwrap();
        let assembler = DeckAssembler::new(Arc::new(MapFetcher::default()));

        let path = assembler.export(&sample_doc(), tmp.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "Solar_ 2030_.pptx");
        assert!(path.exists());

        let mut untitled = sample_doc();
        untitled.meta.title.clear();
        let path = assembler.export(&untitled, tmp.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "Presentation.pptx");
    }

    #[tokio::test]
    async fn empty_deck_is_rejected() {
        let assembler = DeckAssembler::new(Arc::new(MapFetcher::default()));
        let err = assembler.build(&PresentationDocument::default()).await.unwrap_err();
        assert!(matches!(err, ExportError::EmptyDeck));
    }
}
