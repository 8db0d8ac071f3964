use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use reregion_core::{FederalBracket, FederalDeductions};

use crate::error::ExtractError;
use crate::sheet::SheetSource;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]+").expect("valid regex"));

/// Bracket table: two title/header rows, one row per rate, one footnote row.
const BRACKET_HEADER_ROWS: usize = 2;

/// Standard deduction table: single, married, head of household on rows 2-4.
const DEDUCTION_ROWS: [usize; 3] = [2, 3, 4];

pub fn get_federal_tax_data(
    bracket_rows: &[Vec<String>],
    deduction_rows: &[Vec<String>],
) -> Result<(Vec<FederalBracket>, FederalDeductions), ExtractError> {
    let brackets = parse_brackets(bracket_rows)?;
    let deductions = parse_deductions(deduction_rows)?;
    log::info!("federal tax: {} brackets", brackets.len());
    Ok((brackets, deductions))
}

pub fn read_federal_tax_data(
    sheets: &dyn SheetSource,
    path: &Path,
    brackets_sheet: &str,
    deductions_sheet: &str,
) -> Result<(Vec<FederalBracket>, FederalDeductions), ExtractError> {
    let bracket_rows = sheets.read_sheet(path, brackets_sheet)?;
    let deduction_rows = sheets.read_sheet(path, deductions_sheet)?;
    get_federal_tax_data(&bracket_rows, &deduction_rows)
}

pub fn parse_brackets(rows: &[Vec<String>]) -> Result<Vec<FederalBracket>, ExtractError> {
    if rows.len() <= BRACKET_HEADER_ROWS + 1 {
        return Err(ExtractError::Malformed(format!(
            "federal bracket table has {} rows, expected headers, brackets and a footnote",
            rows.len()
        )));
    }

    rows[BRACKET_HEADER_ROWS..rows.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() < 4 {
                return Err(ExtractError::Malformed(format!(
                    "federal bracket row {} has {} cells, expected 4",
                    i + BRACKET_HEADER_ROWS,
                    row.len()
                )));
            }
            Ok(FederalBracket {
                rate: fractional_rate(&row[0]),
                single_bracket: bracket_floor(&row[1]),
                married_bracket: bracket_floor(&row[2]),
                head_of_household_bracket: bracket_floor(&row[3]),
            })
        })
        .collect()
}

pub fn parse_deductions(rows: &[Vec<String>]) -> Result<FederalDeductions, ExtractError> {
    let [single, married, head] = DEDUCTION_ROWS.map(|i| {
        rows.get(i)
            .and_then(|row| row.get(1))
            .map(|cell| digits(cell))
            .ok_or_else(|| ExtractError::Malformed(format!("federal deduction table has no value on row {i}")))
    });

    Ok(FederalDeductions {
        single: single?,
        married: married?,
        head_of_household: head?,
    })
}

/// `"22%"` → `"0.22"`. A cell already read as a fraction is kept.
fn fractional_rate(raw: &str) -> String {
    let text = raw.trim();
    if !text.contains('%') {
        if let Ok(n) = text.parse::<f64>() {
            if n > 0.0 && n < 1.0 {
                return text.to_string();
            }
        }
    }
    format!("0.{}", digits(text))
}

/// Lower bound of `"$10,276 to $41,775"` → `"10276"`.
fn bracket_floor(raw: &str) -> String {
    let floor = raw.split(" to ").next().unwrap_or(raw);
    digits(floor)
}

fn digits(raw: &str) -> String {
    NON_DIGITS.replace_all(raw, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn bracket_sheet() -> Vec<Vec<String>> {
        vec![
            row(&["Table 1. 2022 Federal Income Tax Brackets and Rates"]),
            row(&["Rate", "For Single Filers", "For Married Individuals Filing Joint Returns", "For Heads of Households"]),
            row(&["10%", "$0 to $10,275", "$0 to $20,550", "$0 to $14,650"]),
            row(&["22%", "$41,776 to $89,075", "$83,551 to $178,150", "$55,901 to $89,050"]),
            row(&["37%", "$539,901 or more", "$647,851 or more", "$539,901 or more"]),
            row(&["Source: Internal Revenue Service"]),
        ]
    }

    fn deduction_sheet() -> Vec<Vec<String>> {
        vec![
            row(&["Table 2. 2022 Standard Deduction"]),
            row(&["Filing Status", "Deduction Amount"]),
            row(&["Single", "$12,950"]),
            row(&["Married Filing Jointly", "$25,900"]),
            row(&["Head of Household", "$19,400"]),
        ]
    }

    #[test]
    fn brackets_skip_headers_and_footnote() {
        let brackets = parse_brackets(&bracket_sheet()).unwrap();
        assert_eq!(brackets.len(), 3);
        assert_eq!(brackets[0].rate, "0.10");
        assert_eq!(brackets[0].single_bracket, "0");
        assert_eq!(brackets[1].rate, "0.22");
        assert_eq!(brackets[1].married_bracket, "83551");
        assert_eq!(brackets[2].head_of_household_bracket, "539901");
    }

    #[test]
    fn deductions_come_from_the_second_column() {
        let deductions = parse_deductions(&deduction_sheet()).unwrap();
        assert_eq!(
            deductions,
            FederalDeductions {
                single: "12950".into(),
                married: "25900".into(),
                head_of_household: "19400".into(),
            }
        );
    }

    #[test]
    fn fraction_cells_keep_their_value() {
        assert_eq!(fractional_rate("0.35"), "0.35");
        assert_eq!(fractional_rate("35%"), "0.35");
    }

    #[test]
    fn short_tables_are_malformed() {
        assert!(parse_brackets(&bracket_sheet()[..3]).is_err());
        assert!(parse_deductions(&deduction_sheet()[..4]).is_err());

        let mut rows = bracket_sheet();
        rows[3] = row(&["22%", "$41,776 to $89,075"]);
        assert!(matches!(parse_brackets(&rows), Err(ExtractError::Malformed(_))));
    }

    #[test]
    fn combined_entry_point() {
        let (brackets, deductions) = get_federal_tax_data(&bracket_sheet(), &deduction_sheet()).unwrap();
        assert_eq!(brackets.len(), 3);
        assert_eq!(deductions.married, "25900");
    }
}
