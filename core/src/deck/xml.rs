//! PresentationML for laid-out slides and their notes.

use std::fmt::Write;

use super::layout::{Align, Anchor, Element, Frame, Paragraph, Picture, Rect, SlideLayout, TextBox};

pub(crate) const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(crate) const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

pub(crate) const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const EMU_PER_POINT: u32 = 12_700;

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Not representable in XML 1.0.
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// Empty group properties every shape tree starts with.
pub(crate) fn open_sp_tree(xml: &mut String) {
    xml.push_str("<p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>");
    xml.push_str("<p:grpSpPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"0\" cy=\"0\"/>");
    xml.push_str("<a:chOff x=\"0\" y=\"0\"/><a:chExt cx=\"0\" cy=\"0\"/></a:xfrm></p:grpSpPr>");
}

fn write_xfrm(xml: &mut String, frame: &Frame) -> std::fmt::Result {
    write!(
        xml,
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        frame.x, frame.y, frame.cx, frame.cy
    )
}

fn write_paragraph(xml: &mut String, p: &Paragraph, align: Align) -> std::fmt::Result {
    let algn = match align {
        Align::Left => "l",
        Align::Center => "ctr",
        Align::Right => "r",
    };
    xml.push_str("<a:p>");
    if p.bullet {
        let margin = 285_750 * (i64::from(p.level) + 1);
        write!(xml, r#"<a:pPr marL="{margin}" indent="-285750" algn="{algn}"><a:buFont typeface="Arial"/><a:buChar char="•"/></a:pPr>"#)?;
    } else {
        write!(xml, r#"<a:pPr algn="{algn}"><a:buNone/></a:pPr>"#)?;
    }
    write!(
        xml,
        r#"<a:r><a:rPr lang="en-US" sz="{}" b="{}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:rPr><a:t>{}</a:t></a:r>"#,
        p.style.size * 100,
        u8::from(p.style.bold),
        p.style.color,
        escape_xml(&p.text)
    )?;
    xml.push_str("</a:p>");
    Ok(())
}

fn write_text_box(xml: &mut String, id: u32, text: &TextBox) -> std::fmt::Result {
    write!(
        xml,
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>"#
    )?;
    write_xfrm(xml, &text.frame)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    let anchor = match text.anchor {
        Anchor::Top => "t",
        Anchor::Middle => "ctr",
    };
    write!(
        xml,
        r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0" anchor="{anchor}"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#
    )?;
    for p in &text.paragraphs {
        write_paragraph(xml, p, text.align)?;
    }
    xml.push_str("</p:txBody></p:sp>");
    Ok(())
}

fn write_rect(xml: &mut String, id: u32, rect: &Rect) -> std::fmt::Result {
    write!(
        xml,
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Rectangle {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>"#
    )?;
    write_xfrm(xml, &rect.frame)?;
    write!(
        xml,
        r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:ln w="{}"><a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
        rect.fill,
        rect.outline.width * EMU_PER_POINT,
        rect.outline.color
    )?;
    if rect.outline.dashed {
        xml.push_str(r#"<a:prstDash val="dash"/>"#);
    }
    xml.push_str("</a:ln></p:spPr></p:sp>");
    Ok(())
}

fn write_picture(xml: &mut String, id: u32, pic: &Picture, rel_id: &str) -> std::fmt::Result {
    write!(
        xml,
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}" descr="{}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
        escape_xml(&pic.description)
    )?;
    write!(xml, r#"<p:blipFill><a:blip r:embed="{rel_id}">"#)?;
    if let Some(amt) = pic.alpha {
        write!(xml, r#"<a:alphaModFix amt="{amt}"/>"#)?;
    }
    xml.push_str("</a:blip>");
    if !pic.crop.is_empty() {
        write!(
            xml,
            r#"<a:srcRect l="{}" t="{}" r="{}" b="{}"/>"#,
            pic.crop.left, pic.crop.top, pic.crop.right, pic.crop.bottom
        )?;
    }
    xml.push_str("<a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>");
    write_xfrm(xml, &pic.frame)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#);
    Ok(())
}

/// Slide part. `picture_rels` holds one relationship id per picture, in
/// element order.
pub fn slide_xml(layout: &SlideLayout, picture_rels: &[String]) -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECL);
    write!(xml, r#"<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld>"#)?;
    if let Some(color) = layout.background {
        write!(
            xml,
            r#"<p:bg><p:bgPr><a:solidFill><a:srgbClr val="{color}"/></a:solidFill><a:effectLst/></p:bgPr></p:bg>"#
        )?;
    }
    open_sp_tree(&mut xml);

    let mut rels = picture_rels.iter();
    for (i, element) in layout.elements.iter().enumerate() {
        let id = i as u32 + 2;
        match element {
            Element::Text(text) => write_text_box(&mut xml, id, text)?,
            Element::Rect(rect) => write_rect(&mut xml, id, rect)?,
            Element::Picture(pic) => {
                let rel = rels.next().ok_or(std::fmt::Error)?;
                write_picture(&mut xml, id, pic, rel)?;
            }
        }
    }

    xml.push_str("</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>");
    Ok(xml)
}

/// Notes part: a slide image placeholder and a body with one paragraph per
/// line of `notes`.
pub fn notes_xml(notes: &str) -> Result<String, std::fmt::Error> {
    let mut xml = String::with_capacity(1024 + notes.len());
    xml.push_str(XML_DECL);
    write!(xml, r#"<p:notes xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld>"#)?;
    open_sp_tree(&mut xml);
    xml.push_str(r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp>"#);
    xml.push_str(r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes Placeholder 2"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>"#);
    for line in notes.split('\n') {
        if line.is_empty() {
            xml.push_str(r#"<a:p><a:endParaRPr lang="en-US" dirty="0"/></a:p>"#);
        } else {
            write!(
                xml,
                r#"<a:p><a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
                escape_xml(line)
            )?;
        }
    }
    xml.push_str("</p:txBody></p:sp></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>");
    Ok(xml)
}
