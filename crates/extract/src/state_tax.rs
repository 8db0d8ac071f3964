//! State income tax brackets, deductions and exemptions.
//!
//! The sheet lists each state on a 12-cell row carrying its deductions and
//! exemptions plus its first bracket. Further brackets follow on 7-cell
//! rows until the next state starts.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use reregion_core::geo::normalize_state;
use reregion_core::{CanonicalGeoRecord, StateBracket, StateTaxRecord};

use crate::error::ExtractError;
use crate::sheet::SheetSource;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]+").expect("valid regex"));

const STATE_ROW: usize = 12;
const BRACKET_ROW: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateTaxData {
    pub states: Vec<StateTaxRecord>,
    pub brackets: Vec<StateBracket>,
}

/// Build state rows keyed by the FIPS code the canonical set uses.
///
/// States missing from `canonical` are skipped together with their
/// brackets. Uncleanable cells become `null`.
pub fn get_state_tax_data(rows: &[Vec<String>], canonical: &[CanonicalGeoRecord], null: &str) -> StateTaxData {
    let mut fips: HashMap<String, &str> = HashMap::new();
    for record in canonical {
        fips.entry(record.state_key()).or_insert(record.state_fips.as_str());
    }

    let mut data = StateTaxData::default();
    let mut state_id: Option<&str> = None;

    for row in rows {
        if row.len() == STATE_ROW {
            let name = row[0].trim();
            state_id = fips.get(&normalize_state(name)).copied();
            match state_id {
                Some(id) => data.states.push(StateTaxRecord {
                    state_id: id.to_string(),
                    state_name: name.to_string(),
                    single_deduction: digits_or(&row[7], null),
                    couple_deduction: digits_or(&row[8], null),
                    single_exemption: digits_or(&row[9], null),
                    couple_exemption: digits_or(&row[10], null),
                    dependent_exemption: digits_or(&row[11], null),
                }),
                None if !name.is_empty() => log::warn!("state tax: {name:?} is not in the census set, skipping"),
                None => {}
            }
        }

        if row.len() == STATE_ROW || row.len() == BRACKET_ROW {
            let Some(id) = state_id else {
                continue;
            };
            data.brackets.push(StateBracket {
                state_id: id.to_string(),
                single_rate: rate_or(&row[1], null),
                single_bracket: digits_or(&row[3], null),
                // TODO: column 4 holds the married rate but is cleaned like a
                // bracket amount; confirm against the sheet layout
                married_rate: digits_or(&row[4], null),
                married_bracket: digits_or(&row[6], null),
            });
        }
    }

    log::info!("state tax: {} states, {} brackets", data.states.len(), data.brackets.len());
    data
}

pub fn read_state_tax_data(
    sheets: &dyn SheetSource,
    path: &Path,
    sheet: &str,
    canonical: &[CanonicalGeoRecord],
    null: &str,
) -> Result<StateTaxData, ExtractError> {
    let rows = sheets.read_sheet(path, sheet)?;
    Ok(get_state_tax_data(&rows, canonical, null))
}

/// Digits only, e.g. `"$12,950"` → `"12950"`.
fn digits_or(raw: &str, null: &str) -> String {
    let digits = NON_DIGITS.replace_all(raw, "");
    if digits.is_empty() {
        null.to_string()
    } else {
        digits.into_owned()
    }
}

/// Percent value of a rate cell: `"5.75%"` → `"5.75"`.
///
/// A bare number below 1 is a percent-formatted cell read as a fraction
/// and is scaled to percent.
fn rate_or(raw: &str, null: &str) -> String {
    let text = raw.trim();
    let (number, had_percent) = match text.strip_suffix('%') {
        Some(n) => (n.trim_end(), true),
        None => (text, false),
    };

    match number.parse::<f64>() {
        Ok(n) if !had_percent && n > 0.0 && n < 1.0 => format_decimal(n * 100.0),
        Ok(_) => number.to_string(),
        Err(_) => null.to_string(),
    }
}

pub(crate) fn format_decimal(n: f64) -> String {
    let text = format!("{n:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
