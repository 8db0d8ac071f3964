use serde::Serialize;

/// One county of the canonical geography set.
///
/// Built once per run from the census source and never mutated after.
/// `county_fips` is only unique within a state, so the canonical key is the
/// concatenation returned by [`CanonicalGeoRecord::county_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalGeoRecord {
    pub county_name: String,
    pub population: i64,
    pub male_count: i64,
    pub female_count: i64,
    pub median_income: i64,
    pub median_gross_rent: i64,
    pub avg_commute_minutes: i64,
    pub county_fips: String,
    pub state_fips: String,
    pub state_name: String,
}

impl CanonicalGeoRecord {
    pub fn county_id(&self) -> String {
        format!("{}{}", self.state_fips, self.county_fips)
    }

    /// State name folded for comparison: trimmed and lowercased.
    pub fn state_key(&self) -> String {
        normalize_state(&self.state_name)
    }
}

/// Case- and whitespace-insensitive key used wherever state names are compared.
pub fn normalize_state(name: &str) -> String {
    name.trim().to_lowercase()
}
