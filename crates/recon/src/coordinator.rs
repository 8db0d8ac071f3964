use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;
use reregion_core::{CanonicalGeoRecord, RawJurisdictionRecord, ResolvedJurisdictionRecord};

use crate::description::parse_description;
use crate::diagnostics::{Anomaly, Diagnostics, ReconcileSummary};
use crate::resolver::EntityResolver;

/// Resolved records plus the unmatched tally.
///
/// `records` is in completion order, not input order.
#[derive(Debug, Clone)]
pub struct ReconcileOutput {
    pub records: Vec<ResolvedJurisdictionRecord>,
    pub summary: ReconcileSummary,
}

impl ReconcileOutput {
    pub fn unmatched(&self) -> usize {
        self.summary.unmatched
    }
}

/// Turn local-tax sheet rows into raw records.
///
/// Skips the header row and rows with fewer than three cells. The state
/// column is sparse: a blank cell inherits the last state seen, and that
/// value is copied into the record before any concurrent work starts.
pub fn collect_raw_records(rows: &[Vec<String>]) -> Vec<RawJurisdictionRecord> {
    let mut current_state = String::new();
    let mut records = Vec::new();

    for row in rows.iter().skip(1) {
        if row.len() < 3 {
            continue;
        }
        if !row[0].trim().is_empty() {
            current_state = row[0].clone();
        }
        records.push(RawJurisdictionRecord {
            state_name: current_state.clone(),
            jurisdiction_name: row[1].clone(),
            resident_tax_text: row[2].clone(),
            nonresident_tax_text: row.get(3).cloned().unwrap_or_default(),
        });
    }

    records
}

/// Resolve and parse every record concurrently, on one worker per available core.
pub fn reconcile(
    raw: &[RawJurisdictionRecord],
    canonical: &[CanonicalGeoRecord],
    threshold: u8,
    diagnostics: &dyn Diagnostics,
) -> ReconcileOutput {
    let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    reconcile_with_workers(raw, canonical, threshold, diagnostics, workers)
}

/// As [`reconcile`], with an explicit worker count.
///
/// Each record is one unit of work. Workers pull units until none remain, and
/// the call returns only after every worker has joined. Only the output
/// vector (mutex) and the unmatched counter (atomic) are shared.
pub fn reconcile_with_workers(
    raw: &[RawJurisdictionRecord],
    canonical: &[CanonicalGeoRecord],
    threshold: u8,
    diagnostics: &dyn Diagnostics,
    workers: usize,
) -> ReconcileOutput {
    let resolver = EntityResolver::new(canonical, threshold);
    let merged: Mutex<Vec<ResolvedJurisdictionRecord>> = Mutex::new(Vec::with_capacity(raw.len()));
    let unmatched = AtomicUsize::new(0);
    let next = AtomicUsize::new(0);
    let workers = workers.clamp(1, raw.len().max(1));

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let idx = next.fetch_add(1, Ordering::Relaxed);
                let Some(record) = raw.get(idx) else {
                    break;
                };

                let resolved = resolve_record(record, &resolver, diagnostics);
                if resolved.county_id.is_none() {
                    unmatched.fetch_add(1, Ordering::Relaxed);
                }
                merged.lock().push(resolved);
            });
        }
    });

    let records = merged.into_inner();
    let summary = ReconcileSummary {
        total: records.len(),
        unmatched: unmatched.into_inner(),
    };
    diagnostics.report(Anomaly::Summary(summary));

    ReconcileOutput { records, summary }
}

fn resolve_record(
    record: &RawJurisdictionRecord,
    resolver: &EntityResolver<'_>,
    diagnostics: &dyn Diagnostics,
) -> ResolvedJurisdictionRecord {
    let county_id = resolver
        .resolve(&record.state_name, &record.jurisdiction_name)
        .map(|m| m.county_id);

    ResolvedJurisdictionRecord {
        jurisdiction_name: record.jurisdiction_name.clone(),
        county_id,
        resident: parse_description(&record.resident_tax_text, diagnostics),
        nonresident: parse_description(&record.nonresident_tax_text, diagnostics),
    }
}
