//! Per-format text extractors.
//!
//! Each extractor receives raw bytes and returns plain text. None mutate
//! shared state and none are retried. Structured parsers (docx/xlsx)
//! swallow their own failures and fall back to a cruder printable-run
//! byte scrape rather than failing the operation; only an unknown
//! extension fails fast.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::error::ExtractionError;

/// A stateless text extractor for one file format
pub trait Extract: Send + Sync {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError>;
}

/// Extensions with a registered extractor
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "xlsx", "xls", "csv", "txt"];

/// Typed dispatch table: extension (lowercase) -> extractor
pub fn extractor_for(extension: &str) -> Option<&'static dyn Extract> {
    static PDF: PdfExtractor = PdfExtractor;
    static DOCX: DocxExtractor = DocxExtractor;
    static XLSX: XlsxExtractor = XlsxExtractor;
    static SCRAPE: ScrapeExtractor = ScrapeExtractor;
    static PLAIN: PlainTextExtractor = PlainTextExtractor;

    match extension {
        "pdf" => Some(&PDF),
        "docx" => Some(&DOCX),
        "xlsx" => Some(&XLSX),
        // Legacy binary office formats have no structured parser here
        "doc" | "xls" => Some(&SCRAPE),
        "csv" | "txt" => Some(&PLAIN),
        _ => None,
    }
}

// ==================== PDF ====================

/// Byte-pattern scrape of printable runs. No true PDF parser in this
/// path: inherently lossy for structured PDFs, but keeps embedded ASCII
/// strings searchable.
struct PdfExtractor;

impl Extract for PdfExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        Ok(scrape_printable_runs(data))
    }
}

// ==================== DOCX ====================

/// Structured docx extraction: unzip, walk `word/document.xml`, collect
/// run text with paragraph breaks. Falls back to the byte scrape on any
/// structural failure.
struct DocxExtractor;

impl Extract for DocxExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        match docx_document_text(data) {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Ok(scrape_printable_runs(data)),
            Err(e) => {
                debug!(error = %e, "docx structure parse failed, falling back to byte scrape");
                Ok(scrape_printable_runs(data))
            }
        }
    }
}

fn docx_document_text(data: &[u8]) -> Result<String, ZipXmlError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let xml = read_archive_file(&mut archive, "word/document.xml")?;

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run_text => {
                if let Ok(run) = t.unescape() {
                    text.push_str(&run);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

// ==================== XLSX ====================

/// Structured xlsx extraction: one CSV-like block per sheet, labeled by
/// sheet name. Falls back to the byte scrape on any structural failure.
struct XlsxExtractor;

impl Extract for XlsxExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        match xlsx_sheet_text(data) {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Ok(scrape_printable_runs(data)),
            Err(e) => {
                debug!(error = %e, "xlsx structure parse failed, falling back to byte scrape");
                Ok(scrape_printable_runs(data))
            }
        }
    }
}

fn xlsx_sheet_text(data: &[u8]) -> Result<String, ZipXmlError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

    let shared_strings = match read_archive_file(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => parse_shared_strings(&xml)?,
        // Optional part: workbooks without string cells omit it
        Err(_) => Vec::new(),
    };

    let workbook = read_archive_file(&mut archive, "xl/workbook.xml")?;
    let sheet_names = parse_sheet_names(&workbook)?;

    let mut blocks = Vec::new();
    for (index, name) in sheet_names.iter().enumerate() {
        let path = format!("xl/worksheets/sheet{}.xml", index + 1);
        let Ok(xml) = read_archive_file(&mut archive, &path) else {
            continue;
        };
        let rows = parse_sheet_rows(&xml, &shared_strings)?;

        let mut block = format!("Sheet: {}", name);
        for row in rows {
            block.push('\n');
            block.push_str(&row.join(","));
        }
        blocks.push(block);
    }

    Ok(blocks.join("\n\n"))
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, ZipXmlError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut depth_in_si = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    depth_in_si = true;
                    current.clear();
                }
                b"t" if depth_in_si => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    depth_in_si = false;
                    strings.push(current.clone());
                }
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Ok(text) = t.unescape() {
                    current.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

fn parse_sheet_names(xml: &[u8]) -> Result<Vec<String>, ZipXmlError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut names = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"name" {
                        if let Ok(value) = attr.unescape_value() {
                            names.push(value.into_owned());
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}

fn parse_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ZipXmlError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut in_row = false;
    let mut cell_is_shared = false;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    in_row = true;
                    current_row.clear();
                }
                b"c" => {
                    cell_is_shared = e.attributes().flatten().any(|attr| {
                        attr.key.local_name().as_ref() == b"t" && attr.value.as_ref() == b"s"
                    });
                }
                b"v" => in_value = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"row" => {
                    in_row = false;
                    rows.push(current_row.clone());
                }
                b"v" => in_value = false,
                _ => {}
            },
            Event::Text(t) if in_row && in_value => {
                if let Ok(raw) = t.unescape() {
                    let value = if cell_is_shared {
                        raw.parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i))
                            .cloned()
                            .unwrap_or_else(|| raw.into_owned())
                    } else {
                        raw.into_owned()
                    };
                    current_row.push(value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

// ==================== Legacy binary / fallback ====================

/// Raw byte scrape for legacy binary formats (doc/xls) and all fallback
/// paths: extract printable runs of at least three characters, joined
/// with single spaces.
struct ScrapeExtractor;

impl Extract for ScrapeExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        Ok(scrape_printable_runs(data))
    }
}

pub(crate) fn scrape_printable_runs(data: &[u8]) -> String {
    let mut runs = Vec::new();
    let mut current = String::new();

    for &byte in data {
        if (0x20..0x7f).contains(&byte) {
            current.push(byte as char);
        } else if !current.is_empty() {
            if current.len() >= 3 {
                runs.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= 3 {
        runs.push(current);
    }

    runs.join(" ")
}

// ==================== Plain text ====================

/// Verbatim lossy UTF-8 decode for csv/txt
struct PlainTextExtractor;

impl Extract for PlainTextExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

// ==================== Internal error plumbing ====================

/// Internal failure inside a structured parser; always swallowed by the
/// calling extractor's fallback
#[derive(Debug, thiserror::Error)]
enum ZipXmlError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

fn read_archive_file(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ZipXmlError> {
    let mut file = archive.by_name(name)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn dispatch_table_rejects_unknown_extensions() {
        for extension in SUPPORTED_EXTENSIONS {
            assert!(extractor_for(extension).is_some());
        }
        assert!(extractor_for("zip").is_none());
        assert!(extractor_for("exe").is_none());
    }

    #[test]
    fn csv_is_decoded_verbatim() {
        let extractor = extractor_for("csv").unwrap();
        assert_eq!(extractor.extract(b"a,b\n1,2").unwrap(), "a,b\n1,2");
    }

    #[test]
    fn pdf_scrape_finds_embedded_ascii() {
        let mut data = b"%PDF-1.4\x00\x01\x02".to_vec();
        data.extend_from_slice(b"\x00\x00Hello World\x00\x03stream\x01");
        let extractor = extractor_for("pdf").unwrap();
        let text = extractor.extract(&data).unwrap();
        assert!(text.contains("Hello World"));
    }

    #[test]
    fn scrape_drops_short_runs_and_joins_with_spaces() {
        let data = b"ab\x00cdef\x01\x02gh\x03ijk";
        assert_eq!(scrape_printable_runs(data), "cdef ijk");
    }

    #[test]
    fn malformed_doc_still_yields_text() {
        let mut data = vec![0xd0u8, 0xcf, 0x11, 0xe0];
        data.extend_from_slice(b"\x00\x00Quarterly results improved\x00");
        let extractor = extractor_for("doc").unwrap();
        let text = extractor.extract(&data).unwrap();
        assert!(text.contains("Quarterly results improved"));
    }

    #[test]
    fn docx_paragraphs_are_extracted() {
        let document = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second </w:t></w:r><w:r><w:t>paragraph.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let data = build_zip(&[("word/document.xml", document)]);

        let extractor = extractor_for("docx").unwrap();
        let text = extractor.extract(&data).unwrap();
        assert!(text.contains("First paragraph."));
        assert!(text.contains("Second paragraph."));
    }

    #[test]
    fn truncated_docx_falls_back_to_scrape() {
        let extractor = extractor_for("docx").unwrap();
        let text = extractor.extract(b"PK\x03\x04 not a real archive body").unwrap();
        assert!(text.contains("not a real archive body"));
    }

    #[test]
    fn xlsx_sheets_become_labeled_csv_blocks() {
        let workbook = r#"<?xml version="1.0"?>
            <workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
              <sheets><sheet name="Revenue" sheetId="1" r:id="rId1"
                xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/></sheets>
            </workbook>"#;
        let shared = r#"<?xml version="1.0"?>
            <sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
              <si><t>region</t></si><si><t>total</t></si><si><t>east</t></si>
            </sst>"#;
        let sheet = r#"<?xml version="1.0"?>
            <worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
              <sheetData>
                <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
                <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>1250</v></c></row>
              </sheetData>
            </worksheet>"#;
        let data = build_zip(&[
            ("xl/workbook.xml", workbook),
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);

        let extractor = extractor_for("xlsx").unwrap();
        let text = extractor.extract(&data).unwrap();
        assert!(text.contains("Sheet: Revenue"));
        assert!(text.contains("region,total"));
        assert!(text.contains("east,1250"));
    }
}
