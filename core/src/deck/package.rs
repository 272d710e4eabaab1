//! Second export phase: serialize laid-out slides into the zip container.

use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::layout::SlideLayout;
use super::templates::{self, rel, Relationship};
use super::xml;
use crate::error::ExportError;

struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl PackageWriter {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    fn add(&mut self, path: &str, content: &[u8]) -> Result<(), ExportError> {
        self.zip.start_file(path, self.options)?;
        self.zip.write_all(content)?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        Ok(self.zip.finish()?.into_inner())
    }
}

/// Write a complete presentation package for `slides`.
pub fn write_package(
    title: &str,
    slides: &[SlideLayout],
    created: DateTime<Utc>,
) -> Result<Vec<u8>, ExportError> {
    let notes: Vec<usize> = slides
        .iter()
        .enumerate()
        .filter(|(_, s)| s.notes.is_some())
        .map(|(i, _)| i + 1)
        .collect();

    let mut pkg = PackageWriter::new();
    pkg.add(
        "[Content_Types].xml",
        templates::content_types_xml(slides.len(), &notes)?.as_bytes(),
    )?;
    pkg.add("_rels/.rels", templates::package_rels()?.as_bytes())?;
    pkg.add("docProps/core.xml", templates::core_xml(title, created)?.as_bytes())?;
    pkg.add(
        "docProps/app.xml",
        templates::app_xml(slides.len(), notes.len())?.as_bytes(),
    )?;

    pkg.add("ppt/presentation.xml", templates::presentation_xml(slides.len())?.as_bytes())?;
    pkg.add(
        "ppt/_rels/presentation.xml.rels",
        templates::presentation_rels(slides.len())?.as_bytes(),
    )?;
    pkg.add("ppt/presProps.xml", templates::pres_props_xml().as_bytes())?;
    pkg.add("ppt/viewProps.xml", templates::view_props_xml().as_bytes())?;
    pkg.add("ppt/tableStyles.xml", templates::table_styles_xml().as_bytes())?;
    pkg.add("ppt/slideMasters/slideMaster1.xml", templates::slide_master_xml()?.as_bytes())?;
    pkg.add(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        templates::slide_master_rels()?.as_bytes(),
    )?;
    pkg.add("ppt/slideLayouts/slideLayout1.xml", templates::slide_layout_xml()?.as_bytes())?;
    pkg.add(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        templates::slide_layout_rels()?.as_bytes(),
    )?;
    pkg.add("ppt/notesMasters/notesMaster1.xml", templates::notes_master_xml()?.as_bytes())?;
    pkg.add(
        "ppt/notesMasters/_rels/notesMaster1.xml.rels",
        templates::notes_master_rels()?.as_bytes(),
    )?;
    pkg.add("ppt/theme/theme1.xml", templates::theme_xml("Slidesmith")?.as_bytes())?;
    pkg.add("ppt/theme/theme2.xml", templates::theme_xml("Slidesmith Notes")?.as_bytes())?;

    let mut media = 0usize;
    for (i, layout) in slides.iter().enumerate() {
        let n = i + 1;
        let mut rels = vec![Relationship::new(
            "rId1",
            rel::SLIDE_LAYOUT,
            "../slideLayouts/slideLayout1.xml",
        )];
        if layout.notes.is_some() {
            rels.push(Relationship::new(
                "rId2",
                rel::NOTES_SLIDE,
                format!("../notesSlides/notesSlide{n}.xml"),
            ));
        }

        let mut picture_rels = Vec::new();
        for picture in layout.pictures() {
            media += 1;
            let name = format!("image{media}.{}", picture.image.extension());
            pkg.add(&format!("ppt/media/{name}"), &picture.image.bytes)?;
            let id = format!("rId{}", rels.len() + 1);
            rels.push(Relationship::new(id.clone(), rel::IMAGE, format!("../media/{name}")));
            picture_rels.push(id);
        }

        pkg.add(
            &format!("ppt/slides/slide{n}.xml"),
            xml::slide_xml(layout, &picture_rels)?.as_bytes(),
        )?;
        pkg.add(
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            templates::relationships_xml(&rels)?.as_bytes(),
        )?;

        if let Some(notes) = &layout.notes {
            pkg.add(
                &format!("ppt/notesSlides/notesSlide{n}.xml"),
                xml::notes_xml(notes)?.as_bytes(),
            )?;
            pkg.add(
                &format!("ppt/notesSlides/_rels/notesSlide{n}.xml.rels"),
                templates::relationships_xml(&[
                    Relationship::new("rId1", rel::NOTES_MASTER, "../notesMasters/notesMaster1.xml"),
                    Relationship::new("rId2", rel::SLIDE, format!("../slides/slide{n}.xml")),
                ])?
                .as_bytes(),
            )?;
        }
    }

    pkg.finish()
}
