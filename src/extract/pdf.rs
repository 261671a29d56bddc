use std::panic;

use super::ExtractError;

/// Extract the text of every page of an in-memory PDF.
///
/// The PDF library panics on some malformed inputs; a panic is reported
/// as an ordinary extraction failure so one bad file cannot take down a
/// scan.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("PDF parser panicked".to_string())),
    }
}
