//! Single-sheet `.xlsx` writer for flat records.
//!
//! The workbook is assembled by hand as an Office Open XML package: a zip
//! holding the content-type map, relationships, workbook, one worksheet and a
//! minimal stylesheet (style 1 is the bold header). Cells use inline strings so
//! no shared-string table is needed.

use std::io::{Cursor, Write};

use serde_json::Value;
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::models::Reading;

pub const SHEET_NAME: &str = "Lecturas";

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no records to export")]
    Empty,

    #[error("failed to write workbook: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to write workbook: {0}")]
    Io(#[from] std::io::Error),
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Serializes `records` into an in-memory workbook.
///
/// Columns follow the first record's keys, then any key first seen in a later
/// record. Records lacking a column get a blank cell there.
pub fn write_workbook(records: &[Reading]) -> Result<Vec<u8>, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }

    let columns = collect_columns(records);
    let sheet = render_sheet(&columns, records);

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    write_entry(&mut zip, "[Content_Types].xml", CONTENT_TYPES.as_bytes(), options)?;
    write_entry(&mut zip, "_rels/.rels", ROOT_RELS.as_bytes(), options)?;
    write_entry(&mut zip, "xl/workbook.xml", render_workbook().as_bytes(), options)?;
    write_entry(&mut zip, "xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes(), options)?;
    write_entry(&mut zip, "xl/styles.xml", STYLES.as_bytes(), options)?;
    write_entry(&mut zip, "xl/worksheets/sheet1.xml", sheet.as_bytes(), options)?;

    Ok(zip.finish()?.into_inner())
}

fn write_entry<W: Write + std::io::Seek>(
    zip: &mut zip::ZipWriter<W>,
    name: &str,
    contents: &[u8],
    options: FileOptions,
) -> Result<(), ExportError> {
    zip.start_file(name, options)?;
    zip.write_all(contents)?;
    Ok(())
}

fn collect_columns(records: &[Reading]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }
    columns
}

fn render_workbook() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape_xml(SHEET_NAME)
    )
}

fn render_sheet(columns: &[&str], records: &[Reading]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    xml.push_str(r#"<row r="1">"#);
    for (col, name) in columns.iter().enumerate() {
        let cell = cell_ref(col, 1);
        xml.push_str(&format!(
            r#"<c r="{cell}" s="1" t="inlineStr"><is><t>{}</t></is></c>"#,
            escape_xml(name)
        ));
    }
    xml.push_str("</row>");

    for (index, record) in records.iter().enumerate() {
        let row = index + 2;
        xml.push_str(&format!(r#"<row r="{row}">"#));
        for (col, name) in columns.iter().enumerate() {
            if let Some(value) = record.get(*name) {
                xml.push_str(&render_cell(&cell_ref(col, row), value));
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn render_cell(cell: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => format!(r#"<c r="{cell}" t="b"><v>{}</v></c>"#, u8::from(*flag)),
        Value::Number(number) => format!(r#"<c r="{cell}"><v>{number}</v></c>"#),
        Value::String(text) => inline_string(cell, text),
        nested => inline_string(cell, &nested.to_string()),
    }
}

fn inline_string(cell: &str, text: &str) -> String {
    format!(
        r#"<c r="{cell}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        escape_xml(text)
    )
}

/// A1-style reference for a zero-based column and one-based row.
fn cell_ref(col: usize, row: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    format!("{}{row}", String::from_utf8_lossy(&letters))
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are not legal in XML 1.0.
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}
