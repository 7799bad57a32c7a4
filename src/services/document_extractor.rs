// Document Extraction Service
// Text, metadata and content hash for PDF and DOCX files

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("pdf text extraction failed: {0}")]
    Pdf(String),
    #[error("unsupported document type: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            other => Err(ExtractError::Unsupported(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub text: String,
    /// Property name -> value. PDF info keys keep their leading slash (`/Creator`).
    pub metadata: BTreeMap<String, String>,
    pub document_hash: String,
}

/// SHA-256 of the raw file bytes, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn extract_document(path: &Path, kind: DocumentKind) -> Result<ExtractedDocument, ExtractError> {
    let bytes = std::fs::read(path)?;
    extract_document_bytes(&bytes, kind)
}

pub fn extract_document_bytes(bytes: &[u8], kind: DocumentKind) -> Result<ExtractedDocument, ExtractError> {
    let (text, metadata) = match kind {
        DocumentKind::Pdf => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| ExtractError::Pdf(e.to_string()))?;
            (text, pdf_info_metadata(bytes))
        }
        DocumentKind::Docx => docx_contents(bytes)?,
    };
    Ok(ExtractedDocument {
        text,
        metadata,
        document_hash: content_hash(bytes),
    })
}

// ============ PDF ============

fn pdf_info_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/(Creator|Producer|Author|Title|Subject)\s*\(([^)]*)\)").expect("pdf info regex")
    })
}

/// Literal-string entries of the document info dictionary. Compressed or hex-encoded
/// entries are not decoded.
pub fn pdf_info_metadata(bytes: &[u8]) -> BTreeMap<String, String> {
    let raw = String::from_utf8_lossy(bytes);
    let mut metadata = BTreeMap::new();
    for cap in pdf_info_re().captures_iter(&raw) {
        let value = cap[2].trim();
        if value.is_empty() {
            continue;
        }
        metadata
            .entry(format!("/{}", &cap[1]))
            .or_insert_with(|| value.to_string());
    }
    metadata
}

// ============ DOCX ============

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("paragraph regex"))
}

fn run_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("run text regex"))
}

fn property_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<(?:dc|cp|dcterms):(creator|lastModifiedBy|title|subject|created|modified)(?:\s[^>]*)?>(.*?)</")
            .expect("property regex")
    })
}

fn application_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<Application>(.*?)</Application>").expect("application regex"))
}

fn char_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&#(?:x([0-9A-Fa-f]+)|([0-9]+));").expect("char ref regex"))
}

/// `&amp;` goes last so an escaped reference such as `&amp;#38;` stays literal.
fn unescape_xml(s: &str) -> String {
    let decoded = char_ref_re().replace_all(s, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    Some(content)
}

fn docx_contents(bytes: &[u8]) -> Result<(String, BTreeMap<String, String>), ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let document_xml = {
        let mut entry = archive.by_name("word/document.xml")?;
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        content
    };

    let paragraphs: Vec<String> = paragraph_re()
        .find_iter(&document_xml)
        .map(|p| {
            run_text_re()
                .captures_iter(p.as_str())
                .map(|c| unescape_xml(&c[1]))
                .collect::<String>()
        })
        .collect();

    let mut metadata = BTreeMap::new();
    if let Some(core) = read_entry(&mut archive, "docProps/core.xml") {
        for cap in property_re().captures_iter(&core) {
            let value = unescape_xml(cap[2].trim());
            if value.is_empty() {
                continue;
            }
            let key = match &cap[1] {
                "creator" => "author",
                "lastModifiedBy" => "last_modified_by",
                other => other,
            };
            metadata.insert(key.to_string(), value);
        }
    }
    if let Some(app) = read_entry(&mut archive, "docProps/app.xml") {
        if let Some(cap) = application_re().captures(&app) {
            let value = unescape_xml(cap[1].trim());
            if !value.is_empty() {
                metadata.insert("application".to_string(), value);
            }
        }
    }

    Ok((paragraphs.join("\n"), metadata))
}
