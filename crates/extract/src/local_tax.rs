use std::path::Path;

use reregion_core::CanonicalGeoRecord;
use reregion_recon::{collect_raw_records, reconcile, Diagnostics, ReconcileOutput};

use crate::error::ExtractError;
use crate::sheet::SheetSource;
use crate::state_tax::format_decimal;

/// Read the local income tax sheet and reconcile it against `canonical`.
///
/// A zero-row sheet is an error; a sheet with only a header reconciles to
/// nothing. Rate cells that come back as bare fractions are rendered as the
/// percentages the sheet displays.
pub fn get_local_tax_data(
    sheets: &dyn SheetSource,
    path: &Path,
    sheet: &str,
    canonical: &[CanonicalGeoRecord],
    threshold: u8,
    diagnostics: &dyn Diagnostics,
) -> Result<ReconcileOutput, ExtractError> {
    let rows = sheets.read_sheet(path, sheet)?;
    if rows.is_empty() {
        return Err(ExtractError::Malformed(format!(
            "local tax sheet '{sheet}' in {} is empty",
            path.display()
        )));
    }

    let mut raw = collect_raw_records(&rows);
    for record in &mut raw {
        percent_cell(&mut record.resident_tax_text);
        percent_cell(&mut record.nonresident_tax_text);
    }
    log::info!("local tax: reconciling {} jurisdictions against {} counties", raw.len(), canonical.len());
    Ok(reconcile(&raw, canonical, threshold, diagnostics))
}

/// `0.015` becomes `1.5%`. Text and whole numbers are left alone.
fn percent_cell(text: &mut String) {
    if let Ok(n) = text.trim().parse::<f64>() {
        if n > 0.0 && n < 1.0 {
            *text = format!("{}%", format_decimal(n * 100.0));
        }
    }
}
