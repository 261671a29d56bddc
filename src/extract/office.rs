//! Office Open XML text extraction (docx, pptx, xlsx).
//!
//! The containers are zip archives of XML parts; we walk the parts that
//! carry user text and ignore everything else (styles, relationships,
//! media). Legacy binary formats are recognised but not parsed.

use std::io::{BufReader, Read, Seek};

use xml::reader::{EventReader, XmlEvent};
use zip::{ZipArchive, result::ZipError};

use super::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeFormat {
    Docx,
    Pptx,
    Xlsx,
    LegacyDoc,
    LegacyXls,
    LegacyPpt,
}

impl OfficeFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "docx" => Some(OfficeFormat::Docx),
            "pptx" => Some(OfficeFormat::Pptx),
            "xlsx" => Some(OfficeFormat::Xlsx),
            "doc" => Some(OfficeFormat::LegacyDoc),
            "xls" => Some(OfficeFormat::LegacyXls),
            "ppt" => Some(OfficeFormat::LegacyPpt),
            _ => None,
        }
    }
}

/// Extract the text of an Office document read from `reader`.
pub fn extract_office<R: Read + Seek>(
    format: OfficeFormat,
    reader: R,
) -> Result<String, ExtractError> {
    match format {
        OfficeFormat::Docx => docx_text(&mut ZipArchive::new(reader)?),
        OfficeFormat::Pptx => pptx_text(&mut ZipArchive::new(reader)?),
        OfficeFormat::Xlsx => xlsx_text(&mut ZipArchive::new(reader)?),
        OfficeFormat::LegacyDoc
        | OfficeFormat::LegacyXls
        | OfficeFormat::LegacyPpt => Err(ExtractError::Unsupported(format!(
            "legacy binary Office format {format:?}"
        ))),
    }
}

/// Feed every XML event of `reader` to `on_event`.
fn for_each_event<R: Read>(
    reader: R,
    mut on_event: impl FnMut(XmlEvent),
) -> Result<(), ExtractError> {
    for event in EventReader::new(BufReader::new(reader)) {
        on_event(event?);
    }
    Ok(())
}

/// Archive entries named `{prefix}N.xml`, ordered by `N`.
fn numbered_parts<R: Read + Seek>(
    archive: &ZipArchive<R>,
    prefix: &str,
) -> Vec<String> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(prefix)?.strip_suffix(".xml")?;
            Some((number.parse().ok()?, name.to_string()))
        })
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, name)| name).collect()
}

/// Paragraphs on their own line, runs separated by a space.
fn docx_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<String, ExtractError> {
    let part = archive.by_name("word/document.xml")?;
    let mut text = String::new();
    let mut in_text = false;

    for_each_event(part, |event| match event {
        XmlEvent::StartElement { name, .. } if name.local_name == "t" => {
            in_text = true;
        }
        XmlEvent::EndElement { name } => match name.local_name.as_str() {
            "t" => in_text = false,
            "r" => text.push(' '),
            "p" => text.push('\n'),
            _ => {}
        },
        XmlEvent::Characters(s) | XmlEvent::Whitespace(s) if in_text => {
            text.push_str(&s);
        }
        _ => {}
    })?;

    Ok(text)
}

/// One line per text element, slides in order.
fn pptx_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<String, ExtractError> {
    let mut text = String::new();

    for name in numbered_parts(archive, "ppt/slides/slide") {
        let part = archive.by_name(&name)?;
        let mut in_text = false;
        for_each_event(part, |event| match event {
            XmlEvent::StartElement { name, .. } if name.local_name == "t" => {
                in_text = true;
            }
            XmlEvent::EndElement { name } if name.local_name == "t" => {
                in_text = false;
                text.push('\n');
            }
            XmlEvent::Characters(s) | XmlEvent::Whitespace(s) if in_text => {
                text.push_str(&s);
            }
            _ => {}
        })?;
    }

    Ok(text)
}

/// Cells separated by a space, one line per row, sheets in order.
fn xlsx_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<String, ExtractError> {
    let shared = shared_strings(archive)?;
    let mut text = String::new();

    for name in numbered_parts(archive, "xl/worksheets/sheet") {
        let part = archive.by_name(&name)?;
        let mut cell_type: Option<String> = None;
        let mut value = String::new();
        let mut in_value = false;

        for_each_event(part, |event| match event {
            XmlEvent::StartElement {
                name, attributes, ..
            } => match name.local_name.as_str() {
                "c" => {
                    cell_type = attributes
                        .into_iter()
                        .find(|a| a.name.local_name == "t")
                        .map(|a| a.value);
                    value.clear();
                }
                "v" | "t" => in_value = true,
                _ => {}
            },
            XmlEvent::EndElement { name } => match name.local_name.as_str() {
                "v" | "t" => in_value = false,
                "c" => {
                    let cell = match cell_type.as_deref() {
                        Some("s") => value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|idx| shared.get(idx))
                            .map(String::as_str)
                            .unwrap_or(""),
                        _ => value.as_str(),
                    };
                    if !cell.is_empty() {
                        text.push_str(cell);
                        text.push(' ');
                    }
                }
                "row" => text.push('\n'),
                _ => {}
            },
            XmlEvent::Characters(s) | XmlEvent::Whitespace(s) if in_value => {
                value.push_str(&s);
            }
            _ => {}
        })?;
    }

    Ok(text)
}

/// The workbook's shared string table; empty when the part is absent.
fn shared_strings<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<String>, ExtractError> {
    let part = match archive.by_name("xl/sharedStrings.xml") {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    for_each_event(part, |event| match event {
        XmlEvent::StartElement { name, .. } => match name.local_name.as_str() {
            "si" => current.clear(),
            "t" => in_text = true,
            _ => {}
        },
        XmlEvent::EndElement { name } => match name.local_name.as_str() {
            "si" => strings.push(std::mem::take(&mut current)),
            "t" => in_text = false,
            _ => {}
        },
        XmlEvent::Characters(s) | XmlEvent::Whitespace(s) if in_text => {
            current.push_str(&s);
        }
        _ => {}
    })?;

    Ok(strings)
}
