use std::collections::HashMap;

use reregion_core::geo::normalize_state;
use reregion_core::CanonicalGeoRecord;

use crate::similarity::Scores;

/// Marker for county abbreviations such as `"Fairfax Co."`.
pub const COUNTY_ABBREVIATION: &str = "Co.";

/// A canonical county picked for a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyMatch {
    pub county_id: String,
    pub score: u8,
}

/// Matches noisy jurisdiction names to canonical counties within one state.
///
/// Candidates are grouped by folded state name, in canonical-set order.
/// Ties on the best score go to the first candidate scanned. No further
/// tie-break is applied.
pub struct EntityResolver<'a> {
    by_state: HashMap<String, Vec<&'a CanonicalGeoRecord>>,
    threshold: u8,
}

impl<'a> EntityResolver<'a> {
    pub fn new(canonical: &'a [CanonicalGeoRecord], threshold: u8) -> Self {
        let mut by_state: HashMap<String, Vec<&'a CanonicalGeoRecord>> = HashMap::new();
        for record in canonical {
            by_state.entry(record.state_key()).or_default().push(record);
        }
        Self { by_state, threshold }
    }

    /// Best same-state candidate scoring strictly above the threshold.
    pub fn resolve(&self, state_name: &str, jurisdiction_name: &str) -> Option<CountyMatch> {
        let candidates = self.by_state.get(&normalize_state(state_name))?;
        let subject = match_subject(jurisdiction_name);

        let mut best: Option<(&CanonicalGeoRecord, u8)> = None;
        for &candidate in candidates {
            let score = Scores::compute(&candidate.county_name, subject).best();
            let current = best.map(|(_, s)| s).unwrap_or(0);
            if score > self.threshold && score > current {
                best = Some((candidate, score));
            }
        }

        best.map(|(record, score)| CountyMatch { county_id: record.county_id(), score })
    }
}

/// Name used for matching. For `"X Co. (Alt)"` this is the parenthesized `Alt`.
pub fn match_subject(jurisdiction_name: &str) -> &str {
    if jurisdiction_name.contains(COUNTY_ABBREVIATION) {
        if let Some((_, alternate)) = jurisdiction_name.split_once(" (") {
            return alternate.strip_suffix(')').unwrap_or(alternate);
        }
    }
    jurisdiction_name
}

/// Resolve one jurisdiction without building a reusable index.
pub fn resolve(
    canonical: &[CanonicalGeoRecord],
    state_name: &str,
    jurisdiction_name: &str,
    threshold: u8,
) -> Option<String> {
    EntityResolver::new(canonical, threshold)
        .resolve(state_name, jurisdiction_name)
        .map(|m| m.county_id)
}
