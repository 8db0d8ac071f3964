use serde::Serialize;

// Values stay as cleaned text. Empty or null-sentinel entries are turned into
// column defaults by the store, in one place.

/// One state, with its deductions and exemptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTaxRecord {
    pub state_id: String,
    pub state_name: String,
    pub single_deduction: String,
    pub couple_deduction: String,
    pub single_exemption: String,
    pub couple_exemption: String,
    pub dependent_exemption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateBracket {
    pub state_id: String,
    pub single_rate: String,
    pub single_bracket: String,
    pub married_rate: String,
    pub married_bracket: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FederalBracket {
    /// Fractional rate, e.g. `"0.22"`.
    pub rate: String,
    pub single_bracket: String,
    pub married_bracket: String,
    pub head_of_household_bracket: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FederalDeductions {
    pub single: String,
    pub married: String,
    pub head_of_household: String,
}
