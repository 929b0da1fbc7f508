//! Document loading: extension-dispatched text extraction plus cleaning.
//!
//! | Extension | Units produced | Metadata |
//! |-----------|----------------|----------|
//! | `pdf` | one per page (`pdf-extract`) | `page` (1-based) |
//! | `csv` | one per data row, rendered as `header: value` lines (`csv`) | `row` (0-based) |
//! | `txt` | one for the whole file (lossy UTF-8) | none |
//! | `docx`, `doc` | one for the document body (`zip` + `quick-xml`) | none |
//!
//! Every unit is passed through [`clean_text`]; units that end up empty
//! are dropped. A document with no surviving unit is [`LoadOutcome::Empty`].
//!
//! Loading is synchronous and CPU-bound; async callers run it on the
//! blocking pool.

use std::io::Read;

use lexctx_core::clean::clean_text;
use lexctx_core::models::{DocumentRef, SourceMeta, TextUnit};

use crate::error::IngestError;

/// Extensions accepted by [`load_document`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "csv", "txt", "doc", "docx"];

/// Maximum decompressed bytes read from a ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Result of loading one document.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Vec<TextUnit>),
    /// The file was read but no text survived cleaning.
    Empty,
}

/// Load, extract and clean `doc`.
///
/// The extension is checked before the file is opened, then the size
/// against `max_file_bytes`.
pub fn load_document(doc: &DocumentRef, max_file_bytes: u64) -> Result<LoadOutcome, IngestError> {
    if !SUPPORTED_EXTENSIONS.contains(&doc.extension.as_str()) {
        return Err(IngestError::UnsupportedType(doc.extension.clone()));
    }

    let path = doc.path.as_path();
    let display = path.display().to_string();
    let io_err = |source| IngestError::Io {
        path: display.clone(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > max_file_bytes {
        return Err(IngestError::FileTooLarge {
            path: display,
            size,
            limit: max_file_bytes,
        });
    }
    let bytes = std::fs::read(path).map_err(io_err)?;

    let source = doc.file_name();

    let raw = match doc.extension.as_str() {
        "pdf" => extract_pdf_pages(&bytes, &source),
        "csv" => extract_csv_rows(&bytes, &source),
        "txt" => Ok(vec![TextUnit {
            content: String::from_utf8_lossy(&bytes).into_owned(),
            meta: meta(&source),
        }]),
        _ => extract_docx(&bytes).map(|content| {
            vec![TextUnit {
                content,
                meta: meta(&source),
            }]
        }),
    }
    .map_err(|reason| IngestError::Extraction {
        path: display,
        reason,
    })?;

    let units: Vec<TextUnit> = raw
        .into_iter()
        .map(|u| TextUnit {
            content: clean_text(&u.content),
            meta: u.meta,
        })
        .filter(|u| !u.content.is_empty())
        .collect();

    if units.is_empty() {
        Ok(LoadOutcome::Empty)
    } else {
        Ok(LoadOutcome::Loaded(units))
    }
}

fn meta(source: &str) -> SourceMeta {
    SourceMeta {
        source: source.to_string(),
        page: None,
        row: None,
    }
}

fn extract_pdf_pages(bytes: &[u8], source: &str) -> Result<Vec<TextUnit>, String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, content)| TextUnit {
            content,
            meta: SourceMeta {
                page: Some(i as u32 + 1),
                ..meta(source)
            },
        })
        .collect())
}

fn extract_csv_rows(bytes: &[u8], source: &str) -> Result<Vec<TextUnit>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();

    let mut units = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        let content = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{}: {}", h.trim(), v.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        units.push(TextUnit {
            content,
            meta: SourceMeta {
                row: Some(row as u32),
                ..meta(source)
            },
        });
    }
    Ok(units)
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    extract_paragraph_text(&xml)
}

/// Collect `<w:t>` runs, one line per `<w:p>` paragraph.
fn extract_paragraph_text(xml: &[u8]) -> Result<String, String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(t)) if in_text => {
                out.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
