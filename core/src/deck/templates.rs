//! Fixed package parts and the per-deck manifest parts.

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};

use super::layout::{SLIDE_HEIGHT, SLIDE_WIDTH};
use super::xml::{escape_xml, open_sp_tree, NS_A, NS_P, NS_R, XML_DECL};

pub(crate) const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Relationship types used by the package.
pub(crate) mod rel {
    pub const OFFICE_DOCUMENT: &str = "officeDocument";
    pub const EXTENDED_PROPERTIES: &str = "extended-properties";
    pub const SLIDE_MASTER: &str = "slideMaster";
    pub const SLIDE_LAYOUT: &str = "slideLayout";
    pub const SLIDE: &str = "slide";
    pub const NOTES_MASTER: &str = "notesMaster";
    pub const NOTES_SLIDE: &str = "notesSlide";
    pub const THEME: &str = "theme";
    pub const IMAGE: &str = "image";
    pub const PRES_PROPS: &str = "presProps";
    pub const VIEW_PROPS: &str = "viewProps";
    pub const TABLE_STYLES: &str = "tableStyles";
}

const CORE_PROPERTIES_REL: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";

/// One `<Relationship>` entry. `kind` is either a bare officeDocument
/// relationship name or a full type URI.
#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub id: String,
    pub kind: &'static str,
    pub target: String,
}

impl Relationship {
    pub fn new(id: impl Into<String>, kind: &'static str, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            target: target.into(),
        }
    }
}

pub(crate) fn relationships_xml(rels: &[Relationship]) -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(256 + rels.len() * 160);
    xml.push_str(XML_DECL);
    write!(xml, r#"<Relationships xmlns="{REL_NS}">"#)?;
    for r in rels {
        let kind = if r.kind.starts_with("http") {
            r.kind.to_string()
        } else {
            format!("{REL_BASE}/{}", r.kind)
        };
        write!(
            xml,
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            r.id,
            kind,
            escape_xml(&r.target)
        )?;
    }
    xml.push_str("</Relationships>");
    Ok(xml)
}

pub(crate) fn package_rels() -> Result<String, std::fmt::Error> {
    relationships_xml(&[
        Relationship::new("rId1", rel::OFFICE_DOCUMENT, "ppt/presentation.xml"),
        Relationship::new("rId2", CORE_PROPERTIES_REL, "docProps/core.xml"),
        Relationship::new("rId3", rel::EXTENDED_PROPERTIES, "docProps/app.xml"),
    ])
}

const PML: &str = "application/vnd.openxmlformats-officedocument.presentationml";

pub(crate) fn content_types_xml(slides: usize, notes: &[usize]) -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(2048 + slides * 200);
    xml.push_str(XML_DECL);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    for (ext, mime) in [
        ("png", "image/png"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("bmp", "image/bmp"),
    ] {
        write!(xml, r#"<Default Extension="{ext}" ContentType="{mime}"/>"#)?;
    }

    let mut overrides = vec![
        ("/ppt/presentation.xml".to_string(), format!("{PML}.presentation.main+xml")),
        ("/ppt/slideMasters/slideMaster1.xml".into(), format!("{PML}.slideMaster+xml")),
        ("/ppt/slideLayouts/slideLayout1.xml".into(), format!("{PML}.slideLayout+xml")),
        ("/ppt/notesMasters/notesMaster1.xml".into(), format!("{PML}.notesMaster+xml")),
        ("/ppt/theme/theme1.xml".into(), "application/vnd.openxmlformats-officedocument.theme+xml".into()),
        ("/ppt/theme/theme2.xml".into(), "application/vnd.openxmlformats-officedocument.theme+xml".into()),
        ("/ppt/presProps.xml".into(), format!("{PML}.presProps+xml")),
        ("/ppt/viewProps.xml".into(), format!("{PML}.viewProps+xml")),
        ("/ppt/tableStyles.xml".into(), format!("{PML}.tableStyles+xml")),
        ("/docProps/core.xml".into(), "application/vnd.openxmlformats-package.core-properties+xml".into()),
        ("/docProps/app.xml".into(), "application/vnd.openxmlformats-officedocument.extended-properties+xml".into()),
    ];
    for n in 1..=slides {
        overrides.push((format!("/ppt/slides/slide{n}.xml"), format!("{PML}.slide+xml")));
    }
    for n in notes {
        overrides.push((format!("/ppt/notesSlides/notesSlide{n}.xml"), format!("{PML}.notesSlide+xml")));
    }
    for (part, mime) in overrides {
        write!(xml, r#"<Override PartName="{part}" ContentType="{mime}"/>"#)?;
    }
    xml.push_str("</Types>");
    Ok(xml)
}

pub(crate) fn core_xml(title: &str, created: DateTime<Utc>) -> Result<String, std::fmt::Error> {
    let stamp = created.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECL);
    xml.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
    write!(
        xml,
        "<dc:title>{}</dc:title><dc:creator>slidesmith</dc:creator><cp:lastModifiedBy>slidesmith</cp:lastModifiedBy><cp:revision>1</cp:revision>",
        escape_xml(title)
    )?;
    write!(
        xml,
        r#"<dcterms:created xsi:type="dcterms:W3CDTF">{stamp}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{stamp}</dcterms:modified>"#
    )?;
    xml.push_str("</cp:coreProperties>");
    Ok(xml)
}

pub(crate) fn app_xml(slides: usize, notes: usize) -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(512);
    xml.push_str(XML_DECL);
    write!(
        xml,
        r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><Application>slidesmith</Application><PresentationFormat>On-screen Show (16:9)</PresentationFormat><Slides>{slides}</Slides><Notes>{notes}</Notes></Properties>"#
    )?;
    Ok(xml)
}

/// Relationship ids in presentation.xml.rels. Slides follow the fixed parts.
pub(crate) const PRESENTATION_FIXED_RELS: usize = 6;

pub(crate) fn presentation_rels(slides: usize) -> Result<String, std::fmt::Error> {
    let mut rels = vec![
        Relationship::new("rId1", rel::SLIDE_MASTER, "slideMasters/slideMaster1.xml"),
        Relationship::new("rId2", rel::THEME, "theme/theme1.xml"),
        Relationship::new("rId3", rel::NOTES_MASTER, "notesMasters/notesMaster1.xml"),
        Relationship::new("rId4", rel::PRES_PROPS, "presProps.xml"),
        Relationship::new("rId5", rel::VIEW_PROPS, "viewProps.xml"),
        Relationship::new("rId6", rel::TABLE_STYLES, "tableStyles.xml"),
    ];
    for n in 1..=slides {
        rels.push(Relationship::new(
            format!("rId{}", PRESENTATION_FIXED_RELS + n),
            rel::SLIDE,
            format!("slides/slide{n}.xml"),
        ));
    }
    relationships_xml(&rels)
}

pub(crate) fn presentation_xml(slides: usize) -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(1024 + slides * 48);
    xml.push_str(XML_DECL);
    write!(xml, r#"<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1">"#)?;
    xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);
    xml.push_str(r#"<p:notesMasterIdLst><p:notesMasterId r:id="rId3"/></p:notesMasterIdLst>"#);
    xml.push_str("<p:sldIdLst>");
    for n in 1..=slides {
        write!(xml, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, PRESENTATION_FIXED_RELS + n)?;
    }
    xml.push_str("</p:sldIdLst>");
    write!(
        xml,
        r#"<p:sldSz cx="{SLIDE_WIDTH}" cy="{SLIDE_HEIGHT}"/><p:notesSz cx="6858000" cy="9144000"/>"#
    )?;
    xml.push_str(r#"<p:defaultTextStyle><a:defPPr><a:defRPr lang="en-US"/></a:defPPr></p:defaultTextStyle>"#);
    xml.push_str("</p:presentation>");
    Ok(xml)
}

const CLR_MAP: &str = r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#;

fn empty_tree() -> String {
    let mut tree = String::new();
    open_sp_tree(&mut tree);
    tree.push_str("</p:spTree>");
    tree
}

pub(crate) fn slide_master_xml() -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_DECL);
    write!(
        xml,
        r#"<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>{}</p:cSld>{CLR_MAP}"#,
        empty_tree()
    )?;
    xml.push_str(r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#);
    xml.push_str("<p:txStyles>");
    for (tag, size) in [("titleStyle", 4400), ("bodyStyle", 1800), ("otherStyle", 1800)] {
        write!(
            xml,
            r#"<p:{tag}><a:lvl1pPr><a:defRPr sz="{size}"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/></a:defRPr></a:lvl1pPr></p:{tag}>"#
        )?;
    }
    xml.push_str("</p:txStyles></p:sldMaster>");
    Ok(xml)
}

pub(crate) fn slide_master_rels() -> Result<String, std::fmt::Error> {
    relationships_xml(&[
        Relationship::new("rId1", rel::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
        Relationship::new("rId2", rel::THEME, "../theme/theme1.xml"),
    ])
}

pub(crate) fn slide_layout_xml() -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECL);
    write!(
        xml,
        r#"<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1"><p:cSld name="Blank">{}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        empty_tree()
    )?;
    Ok(xml)
}

pub(crate) fn slide_layout_rels() -> Result<String, std::fmt::Error> {
    relationships_xml(&[Relationship::new(
        "rId1",
        rel::SLIDE_MASTER,
        "../slideMasters/slideMaster1.xml",
    )])
}

pub(crate) fn notes_master_xml() -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECL);
    write!(
        xml,
        r#"<p:notesMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>{}</p:cSld>{CLR_MAP}</p:notesMaster>"#,
        empty_tree()
    )?;
    Ok(xml)
}

pub(crate) fn notes_master_rels() -> Result<String, std::fmt::Error> {
    relationships_xml(&[Relationship::new("rId1", rel::THEME, "../theme/theme2.xml")])
}

pub(crate) fn theme_xml(name: &str) -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECL);
    write!(xml, r#"<a:theme xmlns:a="{NS_A}" name="{}"><a:themeElements>"#, escape_xml(name))?;

    xml.push_str(r#"<a:clrScheme name="Slidesmith"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#);
    for (slot, color) in [
        ("dk2", "1E3A8A"),
        ("lt2", "F9FAFB"),
        ("accent1", "1E3A8A"),
        ("accent2", "3B82F6"),
        ("accent3", "10B981"),
        ("accent4", "F59E0B"),
        ("accent5", "EF4444"),
        ("accent6", "6B7280"),
        ("hlink", "2563EB"),
        ("folHlink", "7C3AED"),
    ] {
        write!(xml, r#"<a:{slot}><a:srgbClr val="{color}"/></a:{slot}>"#)?;
    }
    xml.push_str("</a:clrScheme>");

    xml.push_str(r#"<a:fontScheme name="Slidesmith">"#);
    for tag in ["majorFont", "minorFont"] {
        write!(
            xml,
            r#"<a:{tag}><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:{tag}>"#
        )?;
    }
    xml.push_str("</a:fontScheme>");

    xml.push_str(r#"<a:fmtScheme name="Slidesmith"><a:fillStyleLst>"#);
    for _ in 0..3 {
        xml.push_str(r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#);
    }
    xml.push_str("</a:fillStyleLst><a:lnStyleLst>");
    for w in [6350, 12700, 19050] {
        write!(
            xml,
            r#"<a:ln w="{w}"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:prstDash val="solid"/></a:ln>"#
        )?;
    }
    xml.push_str("</a:lnStyleLst><a:effectStyleLst>");
    for _ in 0..3 {
        xml.push_str("<a:effectStyle><a:effectLst/></a:effectStyle>");
    }
    xml.push_str("</a:effectStyleLst><a:bgFillStyleLst>");
    for _ in 0..3 {
        xml.push_str(r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#);
    }
    xml.push_str("</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>");
    Ok(xml)
}

pub(crate) fn pres_props_xml() -> String {
    format!(r#"{XML_DECL}<p:presentationPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"/>"#)
}

pub(crate) fn view_props_xml() -> String {
    format!(
        r#"{XML_DECL}<p:viewPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
    )
}

pub(crate) fn table_styles_xml() -> String {
    format!(
        r#"{XML_DECL}<a:tblStyleLst xmlns:a="{NS_A}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presentation_declares_16_by_9_and_slide_rels() {
        let xml = presentation_xml(2).unwrap();
        assert!(xml.contains(r#"<p:sldSz cx="9144000" cy="5143500"/>"#));
        assert!(xml.contains(r#"<p:sldId id="256" r:id="rId7"/>"#));
        assert!(xml.contains(r#"<p:sldId id="257" r:id="rId8"/>"#));

        let rels = presentation_rels(2).unwrap();
        assert!(rels.contains(r#"Id="rId8" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml""#));
    }

    #[test]
    fn content_types_list_notes_only_where_present() {
        let xml = content_types_xml(3, &[2]).unwrap();
        assert!(xml.contains("/ppt/slides/slide3.xml"));
        assert!(xml.contains("/ppt/notesSlides/notesSlide2.xml"));
        assert!(!xml.contains("/ppt/notesSlides/notesSlide1.xml"));
    }

    #[test]
    fn core_properties_carry_title_and_author() {
        let created = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let xml = core_xml("Q3 <Review>", created).unwrap();
        assert!(xml.contains("<dc:title>Q3 &lt;Review&gt;</dc:title>"));
        assert!(xml.contains("<dc:creator>slidesmith</dc:creator>"));
        assert!(xml.contains("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn table_style_guid_is_braced() {
        assert!(table_styles_xml().contains(r#"def="{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}""#));
    }
}
