use parking_lot::Mutex;

/// Outcome counts for one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub total: usize,
    pub unmatched: usize,
}

impl ReconcileSummary {
    /// Share of unmatched records, rounded to a whole percent.
    pub fn unmatched_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.unmatched as f64 / self.total as f64 * 100.0).round() as u32
    }
}

/// Non-fatal anomalies raised while reconciling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// Description encodes a range and was left unparsed.
    UnparsableDescription { text: String },
    /// End-of-run summary.
    Summary(ReconcileSummary),
}

/// Sink for reconciliation anomalies.
///
/// Passed into the engine explicitly; units of work call it concurrently.
pub trait Diagnostics: Send + Sync {
    fn report(&self, anomaly: Anomaly);
}

/// Forwards anomalies to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, anomaly: Anomaly) {
        match anomaly {
            Anomaly::UnparsableDescription { text } => {
                log::warn!("{text} contains a range, cannot parse components");
            }
            Anomaly::Summary(s) if s.unmatched > 0 => {
                log::warn!(
                    "{} local tax jurisdictions could not be matched out of {} ({}%)",
                    s.unmatched,
                    s.total,
                    s.unmatched_percent(),
                );
            }
            Anomaly::Summary(s) => {
                log::info!("all {} local tax jurisdictions matched a county", s.total);
            }
        }
    }
}

/// Keeps every anomaly in arrival order.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    events: Mutex<Vec<Anomaly>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Anomaly> {
        self.events.lock().clone()
    }

    pub fn unparsable(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|a| match a {
                Anomaly::UnparsableDescription { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self) -> Option<ReconcileSummary> {
        self.events.lock().iter().rev().find_map(|a| match a {
            Anomaly::Summary(s) => Some(*s),
            _ => None,
        })
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, anomaly: Anomaly) {
        self.events.lock().push(anomaly);
    }
}
