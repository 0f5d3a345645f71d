//! Minimal xlsx reader — flattens the primary worksheet into a row-major
//! cell stream.
//!
//! An xlsx file is a zip archive of XML parts. Only two parts matter here:
//! `xl/sharedStrings.xml` (the string table) and the primary worksheet. The
//! used range is flattened row-major with empty cells kept as `None`, so
//! fixed offsets into the stream line up with positions in the sheet.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesText, Event};
use quick_xml::Reader;

use crate::error::ExtractError;

/// Decodes a text event and resolves XML entity references.
///
/// quick-xml 0.38 split the former `BytesText::unescape()` into a raw byte
/// decode plus an explicit entity-unescape step; this restores the original
/// decode-then-unescape behavior, yielding an empty string on any error.
fn decode_text(e: &BytesText) -> String {
    e.decode()
        .ok()
        .and_then(|d| quick_xml::escape::unescape(&d).map(|u| u.into_owned()).ok())
        .unwrap_or_default()
}

const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const FIRST_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// Opens a workbook and flattens its primary worksheet.
pub fn load_workbook(path: &Path) -> Result<Vec<Option<String>>, ExtractError> {
    let file = File::open(path).map_err(|e| ExtractError::OpenWorkbook {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| ExtractError::OpenWorkbook {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let shared = match read_part(&mut archive, SHARED_STRINGS_PART) {
        Some(xml) => parse_shared_strings(&xml).map_err(|reason| ExtractError::SheetXml {
            path: path.to_path_buf(),
            reason,
        })?,
        None => Vec::new(),
    };

    let sheet_part = primary_sheet_part(&archive).ok_or_else(|| ExtractError::MissingSheet {
        path: path.to_path_buf(),
    })?;
    let sheet_xml = read_part(&mut archive, &sheet_part).ok_or_else(|| {
        ExtractError::OpenWorkbook {
            path: path.to_path_buf(),
            reason: format!("cannot read {}", sheet_part),
        }
    })?;

    parse_sheet(&sheet_xml, &shared).map_err(|reason| ExtractError::SheetXml {
        path: path.to_path_buf(),
        reason,
    })
}

/// Sheet1 when present (the template's data sheet), otherwise the first
/// worksheet part by name.
fn primary_sheet_part<R: Read + Seek>(archive: &zip::ZipArchive<R>) -> Option<String> {
    let mut sheets: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    if sheets.iter().any(|n| n == FIRST_SHEET_PART) {
        return Some(FIRST_SHEET_PART.to_string());
    }
    sheets.sort();
    sheets.into_iter().next()
}

fn read_part<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Parses the shared string table. Rich-text runs inside one `<si>` are
/// concatenated; phonetic runs are skipped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    current.push_str(&decode_text(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("shared strings: {}", e)),
            _ => {}
        }
    }

    Ok(strings)
}

enum CellType {
    Number,
    Shared,
    InlineStr,
    Bool,
}

/// Streams one worksheet's XML into the flattened cell grid.
fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Option<String>>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut cells: HashMap<(u32, u32), String> = HashMap::new();
    let mut row: u32 = 0;
    let mut col: u32 = 0;
    let mut cell_open = false;
    let mut cell_type = CellType::Number;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut buf = String::new();

    loop {
        let event = reader.read_event().map_err(|e| format!("sheet: {}", e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"row" => {
                        row = attr_value(e, b"r")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(row + 1);
                        col = 0;
                    }
                    b"c" => {
                        col = attr_value(e, b"r")
                            .and_then(|r| parse_cell_ref(&r))
                            .map(|(_, c)| c)
                            .unwrap_or(col + 1);
                        if !is_empty {
                            cell_open = true;
                            cell_type = match attr_value(e, b"t").as_deref() {
                                Some("s") => CellType::Shared,
                                Some("inlineStr") => CellType::InlineStr,
                                Some("b") => CellType::Bool,
                                _ => CellType::Number,
                            };
                            buf.clear();
                        }
                    }
                    b"v" if cell_open && !is_empty => in_value = true,
                    b"t" if cell_open && !is_empty => {
                        if matches!(cell_type, CellType::InlineStr) {
                            in_inline_text = true;
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"c" => {
                    if cell_open {
                        if let Some(value) = finalize_cell(&cell_type, &buf, shared) {
                            cells.insert((row, col), value);
                        }
                        cell_open = false;
                    }
                }
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                _ => {}
            },
            Event::Text(e) => {
                if in_value || in_inline_text {
                    buf.push_str(&decode_text(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(flatten(&cells))
}

fn finalize_cell(cell_type: &CellType, raw: &str, shared: &[String]) -> Option<String> {
    let value = match cell_type {
        CellType::Shared => {
            let idx: usize = raw.trim().parse().ok()?;
            shared.get(idx)?.clone()
        }
        CellType::Bool => {
            if raw.trim() == "1" {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        CellType::InlineStr | CellType::Number => raw.to_string(),
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Row-major flatten of the bounding rectangle of all non-empty cells.
fn flatten(cells: &HashMap<(u32, u32), String>) -> Vec<Option<String>> {
    let Some(min_row) = cells.keys().map(|(r, _)| *r).min() else {
        return Vec::new();
    };
    let max_row = cells.keys().map(|(r, _)| *r).max().unwrap_or(min_row);
    let min_col = cells.keys().map(|(_, c)| *c).min().unwrap_or(1);
    let max_col = cells.keys().map(|(_, c)| *c).max().unwrap_or(min_col);

    let mut out = Vec::with_capacity(((max_row - min_row + 1) * (max_col - min_col + 1)) as usize);
    for r in min_row..=max_row {
        for c in min_col..=max_col {
            out.push(cells.get(&(r, c)).cloned());
        }
    }
    out
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// "BC12" -> (row 12, col 55); columns are 1-based.
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let letters: String = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let digits = &cell_ref[letters.len()..];
    if letters.is_empty() || digits.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits.parse().ok()?;
    Some((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((1, 1)));
        assert_eq!(parse_cell_ref("B3"), Some((3, 2)));
        assert_eq!(parse_cell_ref("Z10"), Some((10, 26)));
        assert_eq!(parse_cell_ref("AA1"), Some((1, 27)));
        assert_eq!(parse_cell_ref("BC12"), Some((12, 55)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("ABC"), None);
    }

    #[test]
    fn test_parse_shared_strings() {
        let xml = r#"<?xml version="1.0"?>
        <sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3">
            <si><t>BOARD REQUIRED</t></si>
            <si><r><t>Job </t></r><r><t>No:</t></r></si>
            <si><t xml:space="preserve">Dims</t></si>
        </sst>"#;

        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["BOARD REQUIRED", "Job No:", "Dims"]);
    }

    #[test]
    fn test_parse_sheet_mixed_cell_types() {
        let shared = vec!["Job No:".to_string(), "X-Board".to_string()];
        let xml = r#"<?xml version="1.0"?>
        <worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <sheetData>
                <row r="1">
                    <c r="A1" t="s"><v>0</v></c>
                    <c r="B1"><v>10023</v></c>
                </row>
                <row r="2">
                    <c r="A2" t="s"><v>1</v></c>
                    <c r="B2" t="inlineStr"><is><t>16mm</t></is></c>
                </row>
            </sheetData>
        </worksheet>"#;

        let cells = parse_sheet(xml, &shared).unwrap();
        assert_eq!(
            cells,
            vec![
                Some("Job No:".to_string()),
                Some("10023".to_string()),
                Some("X-Board".to_string()),
                Some("16mm".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_sheet_preserves_gaps() {
        // A1 and C1 populated, B1 absent entirely; row 2 missing; D3 set.
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"><v>1</v></c><c r="C1"><v>3</v></c></row>
            <row r="3"><c r="D3"><v>4</v></c></row>
        </sheetData></worksheet>"#;

        let cells = parse_sheet(xml, &[]).unwrap();
        // Rectangle A1:D3 = 4 cols x 3 rows.
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[0], Some("1".to_string()));
        assert_eq!(cells[1], None);
        assert_eq!(cells[2], Some("3".to_string()));
        // Whole of row 2 is gaps.
        assert!(cells[4..8].iter().all(|c| c.is_none()));
        assert_eq!(cells[11], Some("4".to_string()));
    }

    #[test]
    fn test_parse_sheet_crops_leading_empty_region() {
        // Content starting at C5 must flatten as if C5 were the origin.
        let xml = r#"<worksheet><sheetData>
            <row r="5"><c r="C5"><v>a</v></c><c r="D5"><v>b</v></c></row>
        </sheetData></worksheet>"#;

        let cells = parse_sheet(xml, &[]).unwrap();
        assert_eq!(cells, vec![Some("a".to_string()), Some("b".to_string())]);
    }

    #[test]
    fn test_parse_sheet_without_cell_refs_uses_position() {
        let xml = r#"<worksheet><sheetData>
            <row><c><v>1</v></c><c><v>2</v></c></row>
            <row><c><v>3</v></c></row>
        </sheetData></worksheet>"#;

        let cells = parse_sheet(xml, &[]).unwrap();
        assert_eq!(
            cells,
            vec![
                Some("1".to_string()),
                Some("2".to_string()),
                Some("3".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_parse_sheet_empty_cells_and_bools() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"/><c r="B1" t="b"><v>1</v></c><c r="C1" t="b"><v>0</v></c></row>
        </sheetData></worksheet>"#;

        let cells = parse_sheet(xml, &[]).unwrap();
        assert_eq!(cells, vec![Some("TRUE".to_string()), Some("FALSE".to_string())]);
    }

    #[test]
    fn test_numeric_values_pass_through_verbatim() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"><v>16.5</v></c><c r="B1"><v>4</v></c></row>
        </sheetData></worksheet>"#;

        let cells = parse_sheet(xml, &[]).unwrap();
        assert_eq!(cells, vec![Some("16.5".to_string()), Some("4".to_string())]);
    }
}
