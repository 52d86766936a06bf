//! Converts uploaded bytes into plain-text documents.
//!
//! HTML is kept as markup: element ids and classes are what the script
//! generator needs to pick selectors from.

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

const UTF8_BOM: &str = "\u{feff}";

/// An uploaded file after decoding. Discarded once chunked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Markdown,
    Text,
    Json,
    Html,
    Other,
}

impl DocumentKind {
    fn from_filename(filename: &str) -> Self {
        let lower = filename.to_lowercase();
        let extension = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match extension {
            "md" | "markdown" => DocumentKind::Markdown,
            "txt" => DocumentKind::Text,
            "json" => DocumentKind::Json,
            "html" | "htm" => DocumentKind::Html,
            _ => DocumentKind::Other,
        }
    }
}

pub fn is_html(filename: &str) -> bool {
    DocumentKind::from_filename(filename) == DocumentKind::Html
}

pub fn parse_document(filename: &str, bytes: &[u8]) -> Result<Document, ApiError> {
    let source = base_name(filename);
    if source.is_empty() {
        return Err(ApiError::BadRequest(
            "Uploaded file has no filename".to_string(),
        ));
    }

    let content = match DocumentKind::from_filename(&source) {
        DocumentKind::Markdown | DocumentKind::Text | DocumentKind::Html => {
            decode_strict(&source, bytes)?
        }
        DocumentKind::Json => pretty_json(&source, &decode_strict(&source, bytes)?)?,
        DocumentKind::Other => String::from_utf8_lossy(bytes).into_owned(),
    };

    let content = if content.starts_with(UTF8_BOM) {
        content[UTF8_BOM.len()..].to_string()
    } else {
        content
    };

    tracing::debug!(source = %source, chars = content.chars().count(), "Parsed document");
    Ok(Document { content, source })
}

/// Browsers and some clients send full paths; only the last component names
/// the document.
fn base_name(filename: &str) -> String {
    filename
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

fn decode_strict(source: &str, bytes: &[u8]) -> Result<String, ApiError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|err| ApiError::BadRequest(format!("{} is not valid UTF-8: {}", source, err)))
}

fn pretty_json(source: &str, text: &str) -> Result<String, ApiError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|err| ApiError::BadRequest(format!("{} is not valid JSON: {}", source, err)))?;
    serde_json::to_string_pretty(&value).map_err(ApiError::internal)
}
