//! Attachment extraction helpers.
//!
//! Thin glue over third-party extractors: PDFs and plain text become prompt
//! text, images become inline model parts. Anything else is ignored.

use crate::llm::ContentPart;

/// Extract readable text from an attachment, if it is a kind we understand.
pub fn extract_text(filename: &str, content_type: Option<&str>, bytes: &[u8]) -> Option<String> {
    let is_pdf = content_type.is_some_and(|ct| ct.contains("pdf"))
        || filename.to_lowercase().ends_with(".pdf");
    if is_pdf {
        return match pdf_extract::extract_text_from_mem(bytes) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(filename, %error, "failed to extract PDF text");
                None
            }
        };
    }

    if content_type.is_some_and(|ct| ct.starts_with("text/")) {
        return match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(text),
            Err(_) => {
                tracing::warn!(filename, "text attachment is not valid UTF-8");
                None
            }
        };
    }

    None
}

/// Is this attachment an image the model can look at directly?
pub fn is_image(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.starts_with("image/"))
}

/// Adapt image bytes into a model input part.
pub fn image_part(content_type: &str, bytes: &[u8]) -> ContentPart {
    ContentPart::from_image_bytes(content_type, bytes)
}
