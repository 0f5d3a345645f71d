//! Board line-item extraction from the flattened cell stream.
//!
//! The template carries its board table between a "BOARD REQUIRED" banner
//! and the next section banner. `BOARD_HEADER_SPAN` and `BOARD_STRIDE` are
//! empirical offsets tied to the current sheet template version; a record
//! with any blank field is dropped, so a template that drifts produces no
//! rows rather than garbage rows.

use crate::db::mu_repo::BoardItem;

/// Cells between the "BOARD REQUIRED" banner and the first data record.
pub const BOARD_HEADER_SPAN: usize = 54;
/// Cells from one board record to the next.
pub const BOARD_STRIDE: usize = 18;

const START_MARKER: &str = "BOARD REQUIRED";
const END_MARKERS: &[&str] = &[
    "HARDWARE",
    "ELECTRICAL",
    "OUTSOURCED",
    "OUTSOURCING",
    "FINISHING",
];

/// Field positions within one record.
const TYPE_OFFSET: usize = 0;
const THICKNESS_OFFSET: usize = 1;
const SIZE_OFFSET: usize = 2;
const UNITS_UP_OFFSET: usize = 4;

/// Reads the board records between the anchors. A sheet without the banner
/// has no board section and yields nothing. Records with any blank field
/// are dropped.
pub fn extract_boards(cells: &[Option<String>]) -> Vec<BoardItem> {
    let Some(start_anchor) = find_start_anchor(cells) else {
        return Vec::new();
    };
    let end_anchor = find_end_anchor(cells, start_anchor + 1);

    let mut items = Vec::new();
    let mut pos = start_anchor + BOARD_HEADER_SPAN;
    while pos < end_anchor {
        if let Some(item) = read_record(cells, pos) {
            items.push(item);
        }
        pos += BOARD_STRIDE;
    }
    items
}

fn find_start_anchor(cells: &[Option<String>]) -> Option<usize> {
    cells.iter().position(|c| {
        c.as_ref()
            .is_some_and(|v| v.to_uppercase().contains(START_MARKER))
    })
}

fn find_end_anchor(cells: &[Option<String>], from: usize) -> usize {
    cells
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, c)| {
            c.as_ref().is_some_and(|v| {
                let upper = v.to_uppercase();
                END_MARKERS.iter().any(|marker| upper.contains(marker))
            })
        })
        .map(|(i, _)| i)
        .unwrap_or(cells.len())
}

fn read_record(cells: &[Option<String>], pos: usize) -> Option<BoardItem> {
    let field = |offset: usize| -> Option<String> {
        let value = cells.get(pos + offset)?.as_deref()?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    };

    let xb_type = field(TYPE_OFFSET)?;
    let thickness = {
        let raw = field(THICKNESS_OFFSET)?;
        let stripped = strip_mm_suffix(&raw);
        if stripped.is_empty() {
            return None;
        }
        stripped.to_string()
    };
    let size_text = field(SIZE_OFFSET)?;
    let units_up = field(UNITS_UP_OFFSET)?;

    Some(BoardItem {
        xb_type,
        thickness,
        size_text,
        units_up,
    })
}

/// Drops a trailing "mm" (any case) plus the whitespace before it.
fn strip_mm_suffix(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.is_char_boundary(trimmed.len() - 2) {
        let (head, tail) = trimmed.split_at(trimmed.len() - 2);
        if tail.eq_ignore_ascii_case("mm") {
            return head.trim_end();
        }
    }
    trimmed
}
