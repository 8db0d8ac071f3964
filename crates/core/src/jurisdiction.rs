use serde::Serialize;

/// One row of the local tax sheet, before resolution.
///
/// `state_name` is already the filled-down value for this row. It is owned by
/// the record so concurrent resolution never observes the scanner's running
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawJurisdictionRecord {
    pub state_name: String,
    pub jurisdiction_name: String,
    pub resident_tax_text: String,
    pub nonresident_tax_text: String,
}

/// Structured view of one free-text tax description.
///
/// At most one pattern class populates fields. The rate-plus-fee class is the
/// exception and sets both `rate` and `yearly_fee`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TaxComponents {
    pub raw_text: String,
    pub rate: Option<String>,
    pub monthly_fee: Option<String>,
    pub yearly_fee: Option<String>,
    pub pay_period_fee: Option<String>,
    pub percent_of_state_liability: Option<String>,
}

impl TaxComponents {
    pub fn unparsed(raw_text: &str) -> Self {
        Self {
            raw_text: raw_text.to_string(),
            ..Default::default()
        }
    }

    /// True when no structured field was extracted.
    pub fn is_empty(&self) -> bool {
        self.rate.is_none()
            && self.monthly_fee.is_none()
            && self.yearly_fee.is_none()
            && self.pay_period_fee.is_none()
            && self.percent_of_state_liability.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedJurisdictionRecord {
    pub jurisdiction_name: String,
    /// Canonical county id, or `None` when no candidate cleared the threshold.
    pub county_id: Option<String>,
    pub resident: TaxComponents,
    pub nonresident: TaxComponents,
}
