//! Stage orchestration for one `reregion` run.
//!
//! Stages, in run order:
//!
//! | # | Stage     | Tables                              | Needs          |
//! |---|-----------|-------------------------------------|----------------|
//! | 1 | federal   | `federal_brackets`, `federal_deductions` | -         |
//! | 2 | state     | `states`, `state_brackets`          | census         |
//! | 3 | county    | `county`                            | census, 2      |
//! | 4 | local tax | `tax_locale`                        | census, 2, 3   |
//!
//! The census set is fetched once, before stage 2, and shared by 2-4.
//! With `-c`, the tables of stages 2-4 are cleared together once the fetch
//! succeeds, children first. A run that would clear a parent whose children
//! it does not reload fails before anything is deleted.

use std::fmt;
use std::time::Duration;

use reregion_config::EtlConfig;
use reregion_core::CanonicalGeoRecord;
use reregion_extract::{
    get_census_data, get_local_tax_data, read_federal_tax_data, read_state_tax_data, CensusClient,
    ExtractError, GeographySource, SheetSource,
};
use reregion_recon::{Diagnostics, ReconcileSummary};
use reregion_store::{EngineOptions, PersistenceEngine, StoreError, Table};

use crate::error::EtlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Config,
    Database,
    Census,
    Federal,
    State,
    County,
    LocalTax,
    Views,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Database => "database",
            Stage::Census => "census",
            Stage::Federal => "federal",
            Stage::State => "state",
            Stage::County => "county",
            Stage::LocalTax => "local tax",
            Stage::Views => "views",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which numbered stages run, after dependencies are pulled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSelection {
    pub federal: bool,
    pub state: bool,
    pub county: bool,
    pub local_tax: bool,
}

impl StageSelection {
    pub fn all() -> Self {
        Self { federal: true, state: true, county: true, local_tax: true }
    }

    /// Stages `1..=4` as requested on the command line. Empty means all.
    ///
    /// Stage 2 runs for any of 2, 3, 4 and stage 3 for 3 or 4, since each
    /// loads a table the later ones reference.
    pub fn from_requested(stages: &[u8]) -> Self {
        if stages.is_empty() {
            return Self::all();
        }
        let has = |n: u8| stages.contains(&n);
        Self {
            federal: has(1),
            state: has(2) || has(3) || has(4),
            county: has(3) || has(4),
            local_tax: has(4),
        }
    }

    pub fn needs_census(&self) -> bool {
        self.state || self.county || self.local_tax
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub load: bool,
    pub clear: bool,
    pub refresh_views: bool,
    pub stages: StageSelection,
}

/// What a run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Data rows loaded per stage, in run order. Sentinel rows are not counted.
    pub loaded: Vec<(Stage, usize)>,
    pub reconcile: Option<ReconcileSummary>,
    pub views: Option<usize>,
}

impl RunReport {
    pub fn rows_for(&self, stage: Stage) -> Option<usize> {
        self.loaded.iter().find(|(s, _)| *s == stage).map(|(_, n)| *n)
    }
}

/// Sources and sinks for one run. Built by `main`, or by tests with fakes.
pub struct Pipeline<'a> {
    pub config: &'a EtlConfig,
    pub geography: &'a dyn GeographySource,
    pub sheets: &'a dyn SheetSource,
    pub diagnostics: &'a dyn Diagnostics,
}

impl Pipeline<'_> {
    /// Run the selected stages, then the views. Stops at the first fatal error.
    pub fn run(&self, engine: &mut PersistenceEngine, options: &RunOptions) -> Result<RunReport, EtlError> {
        let mut report = RunReport::default();
        let stages = options.stages;

        if options.load {
            if stages.federal {
                let n = self.load_federal(engine, options.clear)?;
                report.loaded.push((Stage::Federal, n));
            }

            if stages.needs_census() {
                log::info!("fetching census geography");
                let canonical =
                    get_census_data(self.geography).map_err(|e| EtlError::extract(Stage::Census, e))?;

                if options.clear {
                    clear_census_tables(engine, &stages)?;
                }

                if stages.state {
                    let n = self.load_state(engine, &canonical)?;
                    report.loaded.push((Stage::State, n));
                }
                if stages.county {
                    let n = engine
                        .load_county(&canonical, false)
                        .map_err(|e| EtlError::store(Stage::County, e))?;
                    log::info!("county: loaded {n} counties");
                    report.loaded.push((Stage::County, n));
                }
                if stages.local_tax {
                    let (n, summary) = self.load_local_tax(engine, &canonical)?;
                    report.loaded.push((Stage::LocalTax, n));
                    report.reconcile = Some(summary);
                }
            }
        }

        if options.refresh_views {
            let n = engine.refresh_views().map_err(|e| EtlError::store(Stage::Views, e))?;
            log::info!("views: defined {n} views");
            report.views = Some(n);
        }

        Ok(report)
    }

    fn load_federal(&self, engine: &mut PersistenceEngine, clear: bool) -> Result<usize, EtlError> {
        let sources = &self.config.sources;
        let fail = |e: ExtractError| EtlError::extract(Stage::Federal, e);
        let (brackets, deductions) = read_federal_tax_data(
            self.sheets,
            &sources.federal_tax_path(),
            &sources.federal_brackets_sheet,
            &sources.federal_deductions_sheet,
        )
        .map_err(fail)?;

        let store = |e: StoreError| EtlError::store(Stage::Federal, e);
        let n = engine.load_federal_brackets(&brackets, clear).map_err(store)?;
        engine.load_federal_deductions(&deductions, clear).map_err(store)?;
        log::info!("federal: loaded {n} brackets and the standard deductions");
        Ok(n)
    }

    fn load_state(
        &self,
        engine: &mut PersistenceEngine,
        canonical: &[CanonicalGeoRecord],
    ) -> Result<usize, EtlError> {
        let sources = &self.config.sources;
        let data = read_state_tax_data(
            self.sheets,
            &sources.state_tax_path(),
            &sources.state_tax_sheet,
            canonical,
            &self.config.general.null_string,
        )
        .map_err(|e| EtlError::extract(Stage::State, e))?;

        let store = |e: StoreError| EtlError::store(Stage::State, e);
        let states = engine.load_states(&data.states, false).map_err(store)?;
        let brackets = engine.load_state_brackets(&data.brackets, false).map_err(store)?;
        log::info!("state: loaded {states} states and {brackets} brackets");
        Ok(states)
    }

    fn load_local_tax(
        &self,
        engine: &mut PersistenceEngine,
        canonical: &[CanonicalGeoRecord],
    ) -> Result<(usize, ReconcileSummary), EtlError> {
        let sources = &self.config.sources;
        let output = get_local_tax_data(
            self.sheets,
            &sources.local_tax_path(),
            &sources.local_tax_sheet,
            canonical,
            self.config.local_tax.threshold,
            self.diagnostics,
        )
        .map_err(|e| EtlError::extract(Stage::LocalTax, e))?;

        let n = engine
            .load_tax_locale(&output.records, false)
            .map_err(|e| EtlError::store(Stage::LocalTax, e))?;
        log::info!("local tax: loaded {n} jurisdictions");
        Ok((n, output.summary))
    }
}

/// Clear the tables of stages 2-4 that run, children before parents.
///
/// A table whose dependent is not part of the run keeps its rows, and the
/// error names the stage that owns it.
fn clear_census_tables(engine: &mut PersistenceEngine, stages: &StageSelection) -> Result<(), EtlError> {
    let mut specs = Vec::new();
    if stages.local_tax {
        specs.push(Table::TaxLocale.spec());
    }
    if stages.county {
        specs.push(Table::County.spec());
    }
    if stages.state {
        specs.push(Table::StateBrackets.spec());
        specs.push(Table::States.spec());
    }

    engine.clear_tables(&specs).map_err(|e| {
        let stage = match &e {
            StoreError::DependentRows { table, .. } => stage_for_table(table),
            _ => specs.first().map_or(Stage::State, |s| stage_for_table(s.name)),
        };
        EtlError::store(stage, e)
    })
}

fn stage_for_table(name: &str) -> Stage {
    match name {
        "tax_locale" => Stage::LocalTax,
        "county" => Stage::County,
        _ => Stage::State,
    }
}

pub fn engine_options(config: &EtlConfig) -> EngineOptions {
    EngineOptions {
        null_sentinel: config.general.null_string.clone(),
        max_params: config.database.max_params,
        views_dir: config.database.views_dir.clone(),
    }
}

pub fn open_engine(config: &EtlConfig) -> Result<PersistenceEngine, StoreError> {
    PersistenceEngine::open(&config.database.path, engine_options(config))
}

pub fn census_client(config: &EtlConfig) -> Result<CensusClient, ExtractError> {
    let census = &config.census;
    CensusClient::from_env(
        &census.base_url,
        &census.api_key_env,
        census.attempts,
        Duration::from_secs(census.backoff_secs),
    )
}
