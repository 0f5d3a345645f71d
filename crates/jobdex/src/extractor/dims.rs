//! Product dimension extraction.
//!
//! The template labels overall dimensions with a cell containing exactly
//! "Dims"; the next cell is free text like "1200w x 800h x 50d mm". Tokens
//! may carry their own unit and axis letter; a unit appearing later in the
//! text (a trailing "cm") applies to earlier unitless tokens, and untagged
//! numbers fill the remaining width/height/depth slots in order.

use regex::Regex;

use crate::db::mu_repo::Dimensions;

const DIMS_LABEL: &str = "Dims";

/// Extracts dimensions from the cell stream. A sheet without the label, or
/// with a blank value cell, gets explicit zero dimensions rather than none
/// at all — the row still exists for querying.
pub fn extract_dimensions(cells: &[Option<String>]) -> Dimensions {
    let Some(idx) = cells
        .iter()
        .position(|c| c.as_deref().map(str::trim) == Some(DIMS_LABEL))
    else {
        return zero_dimensions();
    };

    let text = cells
        .get(idx + 1)
        .and_then(|c| c.as_deref())
        .unwrap_or("");
    if text.trim().is_empty() {
        return zero_dimensions();
    }

    parse_dimension_text(text)
}

fn zero_dimensions() -> Dimensions {
    Dimensions {
        width_mm: Some(0),
        height_mm: Some(0),
        depth_mm: Some(0),
    }
}

/// Parses free dimension text into millimetre values.
pub fn parse_dimension_text(text: &str) -> Dimensions {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    let token_re = Regex::new(r"(\d+(?:[.,]\d+)?)\s*(mm|cm|m)?\s*([whd])?")
        .expect("valid dimension token regex");
    // Standalone units only; a unit glued to a number is captured by the
    // token itself.
    let unit_re = Regex::new(r"\b(mm|cm|m)\b").expect("valid unit regex");

    let standalone_units: Vec<(usize, &str)> = unit_re
        .find_iter(&collapsed)
        .map(|m| (m.start(), m.as_str()))
        .collect();

    // Slots in (w, h, d) order.
    let mut tagged: [Option<i64>; 3] = [None; 3];
    let mut untagged: Vec<i64> = Vec::new();

    for cap in token_re.captures_iter(&collapsed).take(3) {
        let Ok(number) = cap[1].replace(',', ".").parse::<f64>() else {
            continue;
        };
        let token_end = cap
            .get(0)
            .map(|m| m.end())
            .unwrap_or(collapsed.len());

        let unit = cap
            .get(2)
            .map(|m| m.as_str())
            .or_else(|| {
                standalone_units
                    .iter()
                    .find(|(pos, _)| *pos >= token_end)
                    .map(|(_, unit)| *unit)
            })
            .unwrap_or("mm");

        let factor = match unit {
            "cm" => 10.0,
            "m" => 1000.0,
            _ => 1.0,
        };
        let value = (number * factor).round() as i64;

        match cap.get(3).map(|m| m.as_str()) {
            Some("w") => tagged[0] = Some(value),
            Some("h") => tagged[1] = Some(value),
            Some("d") => tagged[2] = Some(value),
            _ => untagged.push(value),
        }
    }

    let mut spare = untagged.into_iter();
    for slot in tagged.iter_mut() {
        if slot.is_none() {
            if let Some(value) = spare.next() {
                *slot = Some(value);
            }
        }
    }

    Dimensions {
        width_mm: tagged[0],
        height_mm: tagged[1],
        depth_mm: tagged[2],
    }
}
