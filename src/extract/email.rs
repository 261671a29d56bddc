//! RFC 822 message text extraction.
//!
//! The message is converted into a [`MimeNode`] tree and flattened into
//! one blob: a few headers, the readable body, then the text of any
//! document attachments under a labeled section.

use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::warn;

use super::{ExtractError, Strategy, extract_bytes};
use crate::{document::extension_of, html::html_to_text};

/// Headers copied into the extracted text, in this order.
const SUMMARY_HEADERS: &[&str] = &["Subject", "From", "To", "Date"];

/// Attachment types whose text is extracted.
const ATTACHMENT_EXTENSIONS: &[&str] =
    &["pdf", "docx", "xlsx", "pptx", "doc", "xls", "ppt"];

pub const ATTACHMENTS_MARKER: &str = "--- ATTACHMENTS ---";

/// The readable structure of a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    TextLeaf { html: bool, text: String },
    Multipart(Vec<MimeNode>),
    NestedMessage {
        headers: Vec<(String, String)>,
        body: Box<MimeNode>,
    },
}

impl MimeNode {
    /// Append this node's text to `out`, one block per line.
    pub fn flatten(&self, out: &mut String) {
        match self {
            MimeNode::TextLeaf { html: true, text } => {
                push_line(out, &html_to_text(text));
            }
            MimeNode::TextLeaf { html: false, text } => push_line(out, text),
            MimeNode::Multipart(children) => {
                for child in children {
                    child.flatten(out);
                }
            }
            MimeNode::NestedMessage { headers, body } => {
                for (name, value) in headers {
                    push_line(out, &format!("{name}: {value}"));
                }
                body.flatten(out);
            }
        }
    }
}

/// A document attached somewhere in the message tree.
#[derive(Debug)]
struct Attachment {
    filename: String,
    strategy: Strategy,
    bytes: Vec<u8>,
}

/// Extract the text of a raw email message.
pub fn extract_email(bytes: &[u8]) -> Result<String, ExtractError> {
    let mail = mailparse::parse_mail(bytes)?;
    let mut attachments = Vec::new();

    let mut text = String::new();
    for (name, value) in summary_headers(&mail) {
        push_line(&mut text, &format!("{name}: {value}"));
    }
    if let Some(body) = build_node(&mail, &mut attachments)? {
        body.flatten(&mut text);
    }

    let attachment_text = attachments_text(&attachments);
    if !attachment_text.is_empty() {
        text.push('\n');
        push_line(&mut text, ATTACHMENTS_MARKER);
        text.push('\n');
        text.push_str(&attachment_text);
    }

    Ok(text)
}

fn summary_headers(mail: &ParsedMail<'_>) -> Vec<(String, String)> {
    SUMMARY_HEADERS
        .iter()
        .filter_map(|name| {
            let value = mail.headers.get_first_value(name)?;
            let value = value.trim();
            (!value.is_empty()).then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// Build the readable tree for `part`, moving document attachments into
/// `attachments`. Returns `None` for parts with no readable text.
fn build_node(
    part: &ParsedMail<'_>,
    attachments: &mut Vec<Attachment>,
) -> Result<Option<MimeNode>, ExtractError> {
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();

    if mimetype == "message/rfc822" {
        let raw = part.get_body_raw()?;
        let nested = mailparse::parse_mail(&raw)?;
        let body = build_node(&nested, attachments)?
            .unwrap_or(MimeNode::Multipart(Vec::new()));
        return Ok(Some(MimeNode::NestedMessage {
            headers: summary_headers(&nested),
            body: Box::new(body),
        }));
    }

    if let Some(filename) = attachment_name(part) {
        let strategy = extension_of(std::path::Path::new(&filename))
            .filter(|ext| ATTACHMENT_EXTENSIONS.contains(&ext.as_str()))
            .and_then(|ext| Strategy::for_extension(&ext));
        if let Some(strategy) = strategy {
            attachments.push(Attachment {
                filename,
                strategy,
                bytes: part.get_body_raw()?,
            });
        }
        return Ok(None);
    }

    if mimetype.starts_with("multipart/") {
        let preferred = (mimetype == "multipart/alternative")
            .then(|| preferred_alternative(&part.subparts))
            .flatten();

        let mut children = Vec::new();
        for sub in &part.subparts {
            // Only one alternative is read; the others may still carry
            // attachments.
            if preferred.is_some_and(|p| !std::ptr::eq(p, sub)) {
                collect_attachments(sub, attachments)?;
            } else if let Some(node) = build_node(sub, attachments)? {
                children.push(node);
            }
        }
        return Ok(Some(MimeNode::Multipart(children)));
    }

    if mimetype == "text/plain" || mimetype == "text/html" {
        return Ok(Some(MimeNode::TextLeaf {
            html: mimetype == "text/html",
            text: part.get_body()?,
        }));
    }

    Ok(None)
}

/// Pick the plain text alternative when there is one, else the first
/// part.
fn preferred_alternative<'a>(
    parts: &'a [ParsedMail<'a>],
) -> Option<&'a ParsedMail<'a>> {
    parts
        .iter()
        .find(|p| p.ctype.mimetype.eq_ignore_ascii_case("text/plain"))
        .or_else(|| parts.first())
}

/// Gather attachments from a subtree whose text is not used.
fn collect_attachments(
    part: &ParsedMail<'_>,
    attachments: &mut Vec<Attachment>,
) -> Result<(), ExtractError> {
    if attachment_name(part).is_some() {
        build_node(part, attachments)?;
    }
    for sub in &part.subparts {
        collect_attachments(sub, attachments)?;
    }
    Ok(())
}

/// Filename of a part marked as an attachment.
fn attachment_name(part: &ParsedMail<'_>) -> Option<String> {
    let disposition = part.get_content_disposition();
    let named = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned();
    match disposition.disposition {
        DispositionType::Attachment => {
            Some(named.unwrap_or_else(|| "unknown".to_string()))
        }
        _ if !part.ctype.mimetype.starts_with("text/")
            && !part.ctype.mimetype.starts_with("multipart/") =>
        {
            named
        }
        _ => None,
    }
}

/// `[Attachment: name]` sections for every attachment yielding text.
fn attachments_text(attachments: &[Attachment]) -> String {
    let mut out = String::new();
    for attachment in attachments {
        match extract_bytes(attachment.strategy, &attachment.bytes) {
            Ok(text) if !text.trim().is_empty() => {
                out.push_str(&format!(
                    "[Attachment: {}]\n{}\n\n",
                    attachment.filename,
                    text.trim_end()
                ));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    attachment = %attachment.filename,
                    "attachment extraction failed: {e}"
                );
            }
        }
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    if !line.ends_with('\n') {
        out.push('\n');
    }
}
