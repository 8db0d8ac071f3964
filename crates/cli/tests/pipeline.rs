// End-to-end stage runs against fixed census and sheet rows.
// Run with: cargo test -p reregion-cli --test pipeline

use std::collections::HashMap;
use std::path::Path;

use reregion_cli::{engine_options, Pipeline, RunOptions, Stage, StageSelection};
use reregion_config::EtlConfig;
use reregion_extract::{ExtractError, GeographySource, SheetSource};
use reregion_recon::CollectingDiagnostics;
use reregion_store::PersistenceEngine;

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

struct FixedCensus;

impl GeographySource for FixedCensus {
    fn fetch_geography_rows(&self) -> Result<Vec<Vec<String>>, ExtractError> {
        Ok(vec![
            row(&["NAME", "B01003_001E", "B01001_002E", "B01001_026E", "B19013_001E", "B25031_001E", "C08536_001E", "state", "county"]),
            row(&["Fairfax County, Virginia", "1147532", "566000", "581532", "124831", "1958", "16065448", "51", "059"]),
            row(&["Arlington County, Virginia", "238643", "118000", "120643", "120071", "2002", "3102359", "51", "013"]),
            row(&["Franklin County, Ohio", "1321414", "650000", "671414", "62352", "1050", "15857000", "39", "049"]),
            row(&["District of Columbia, District of Columbia", "705749", "334000", "371749", "92266", "1667", "9000000", "11", "001"]),
        ])
    }
}

struct DownCensus;

impl GeographySource for DownCensus {
    fn fetch_geography_rows(&self) -> Result<Vec<Vec<String>>, ExtractError> {
        Err(ExtractError::Network { source: "census".into(), attempts: 3, message: "HTTP 503".into() })
    }
}

struct UnusedCensus;

impl GeographySource for UnusedCensus {
    fn fetch_geography_rows(&self) -> Result<Vec<Vec<String>>, ExtractError> {
        panic!("census must not be fetched for federal-only runs");
    }
}

/// Sheets by name; the workbook path is ignored.
struct FixedSheets(HashMap<String, Vec<Vec<String>>>);

impl SheetSource for FixedSheets {
    fn read_sheet(&self, path: &Path, sheet: &str) -> Result<Vec<Vec<String>>, ExtractError> {
        self.0.get(sheet).cloned().ok_or_else(|| ExtractError::SourceRead {
            path: path.to_path_buf(),
            message: format!("no sheet {sheet}"),
        })
    }
}

fn local_rows() -> Vec<Vec<String>> {
    vec![
        row(&["State", "Locality", "Resident", "Nonresident"]),
        row(&["Ohio", "Columbus (Franklin Co.)", "2.50%", "2.50%"]),
        row(&["", "Nowhere Village", "1.00%", "1.00%"]),
        row(&["Virginia", "Fairfax Co.", "$5.00 / month", ""]),
    ]
}

fn sheets(config: &EtlConfig) -> FixedSheets {
    let s = &config.sources;
    let mut map = HashMap::new();
    map.insert(
        s.federal_brackets_sheet.clone(),
        vec![
            row(&["Table 1. 2022 Federal Income Tax Brackets and Rates"]),
            row(&["Rate", "For Single Filers", "For Married Individuals Filing Joint Returns", "For Heads of Households"]),
            row(&["10%", "$0 to $10,275", "$0 to $20,550", "$0 to $14,650"]),
            row(&["12%", "$10,276 to $41,775", "$20,551 to $83,550", "$14,651 to $55,900"]),
            row(&["22%", "$41,776 to $89,075", "$83,551 to $178,150", "$55,901 to $89,050"]),
            row(&["Source: Internal Revenue Service"]),
        ],
    );
    map.insert(
        s.federal_deductions_sheet.clone(),
        vec![
            row(&["Table 2. 2022 Standard Deduction"]),
            row(&["Filing Status", "Deduction Amount"]),
            row(&["Single", "$12,950"]),
            row(&["Married Filing Jointly", "$25,900"]),
            row(&["Head of Household", "$19,400"]),
        ],
    );
    map.insert(
        s.state_tax_sheet.clone(),
        vec![
            row(&["State", "Single Filer Rates"]),
            row(&["Ohio", "0.00%", ">", "$0", "0.00%", ">", "$0", "n.a.", "n.a.", "$2,400", "$4,800", "$2,400"]),
            row(&["", "2.77%", ">", "$25,000", "2.77%", ">", "$25,000"]),
            row(&["Virginia", "2.00%", ">", "$0", "2.00%", ">", "$0", "$8,000", "$16,000", "$930", "$1,860", "$930"]),
            row(&["", "3.00%", ">", "$3,000", "3.00%", ">", "$3,000"]),
            row(&["", "5.75%", ">", "$17,000", "5.75%", ">", "$17,000"]),
        ],
    );
    map.insert(s.local_tax_sheet.clone(), local_rows());
    FixedSheets(map)
}

fn engine(config: &EtlConfig) -> PersistenceEngine {
    PersistenceEngine::open_in_memory(engine_options(config)).unwrap()
}

fn count(engine: &PersistenceEngine, table: &str) -> i64 {
    engine
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        .unwrap()
}

fn locale_county(engine: &PersistenceEngine, name: &str) -> String {
    engine
        .connection()
        .query_row("SELECT county_id FROM tax_locale WHERE locale_name = ?1", [name], |r| r.get(0))
        .unwrap()
}

fn load_all() -> RunOptions {
    RunOptions { load: true, clear: false, refresh_views: true, stages: StageSelection::all() }
}

#[test]
fn full_run_loads_every_table() {
    let config = EtlConfig::default();
    let sheets = sheets(&config);
    let diagnostics = CollectingDiagnostics::new();
    let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let mut engine = engine(&config);

    let report = pipeline.run(&mut engine, &load_all()).unwrap();

    assert_eq!(report.rows_for(Stage::Federal), Some(3));
    assert_eq!(report.rows_for(Stage::State), Some(2));
    assert_eq!(report.rows_for(Stage::County), Some(3));
    assert_eq!(report.rows_for(Stage::LocalTax), Some(3));
    assert_eq!(report.views, Some(3));

    let summary = report.reconcile.unwrap();
    assert_eq!((summary.total, summary.unmatched), (3, 1));

    assert_eq!(count(&engine, "federal_brackets"), 3);
    assert_eq!(count(&engine, "federal_deductions"), 1);
    // Data rows plus the unknown sentinel
    assert_eq!(count(&engine, "states"), 3);
    assert_eq!(count(&engine, "county"), 4);
    assert_eq!(count(&engine, "state_brackets"), 5);
    assert_eq!(count(&engine, "tax_locale"), 3);

    assert_eq!(locale_county(&engine, "Columbus (Franklin Co.)"), "39049");
    assert_eq!(locale_county(&engine, "Fairfax Co."), "51059");
    assert_eq!(locale_county(&engine, "Nowhere Village"), "32767");
}

#[test]
fn rerun_without_clear_upserts_in_place() {
    let config = EtlConfig::default();
    let sheets = sheets(&config);
    let diagnostics = CollectingDiagnostics::new();
    let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let mut engine = engine(&config);

    pipeline.run(&mut engine, &load_all()).unwrap();
    pipeline.run(&mut engine, &load_all()).unwrap();

    assert_eq!(count(&engine, "federal_brackets"), 3);
    assert_eq!(count(&engine, "county"), 4);
    assert_eq!(count(&engine, "tax_locale"), 3);
}

#[test]
fn clear_drops_rows_no_longer_in_the_source() {
    let config = EtlConfig::default();
    let mut sheets = sheets(&config);
    let diagnostics = CollectingDiagnostics::new();
    let mut engine = engine(&config);

    {
        let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &sheets, diagnostics: &diagnostics };
        pipeline.run(&mut engine, &load_all()).unwrap();
    }

    sheets.0.insert(config.sources.local_tax_sheet.clone(), local_rows()[..2].to_vec());
    let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let options = RunOptions { load: true, clear: true, refresh_views: false, stages: StageSelection::from_requested(&[4]) };
    let report = pipeline.run(&mut engine, &options).unwrap();

    assert_eq!(report.rows_for(Stage::Federal), None);
    assert_eq!(count(&engine, "tax_locale"), 1);
    assert_eq!(count(&engine, "federal_brackets"), 3);
}

#[test]
fn clearing_states_alone_keeps_counties_and_locales() {
    let config = EtlConfig::default();
    let sheets = sheets(&config);
    let diagnostics = CollectingDiagnostics::new();
    let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let mut engine = engine(&config);
    pipeline.run(&mut engine, &load_all()).unwrap();

    let options = RunOptions { load: true, clear: true, refresh_views: false, stages: StageSelection::from_requested(&[2]) };
    let err = pipeline.run(&mut engine, &options).unwrap_err();
    assert_eq!(err.stage, Stage::State);
    assert_eq!(err.exit_code(), reregion_cli::exit_codes::EXIT_STORE_DEPENDENT_ROWS);
    assert!(err.to_string().starts_with("state stage failed"));

    assert_eq!(count(&engine, "states"), 3);
    assert_eq!(count(&engine, "state_brackets"), 5);
    assert_eq!(count(&engine, "county"), 4);
    assert_eq!(count(&engine, "tax_locale"), 3);
}

#[test]
fn clearing_counties_alone_keeps_locales() {
    let config = EtlConfig::default();
    let sheets = sheets(&config);
    let diagnostics = CollectingDiagnostics::new();
    let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let mut engine = engine(&config);
    pipeline.run(&mut engine, &load_all()).unwrap();

    let options = RunOptions { load: true, clear: true, refresh_views: false, stages: StageSelection::from_requested(&[3]) };
    let err = pipeline.run(&mut engine, &options).unwrap_err();
    assert_eq!(err.stage, Stage::County);
    assert_eq!(count(&engine, "county"), 4);
    assert_eq!(count(&engine, "tax_locale"), 3);
}

#[test]
fn clearing_states_before_counties_exist_reloads_them() {
    let config = EtlConfig::default();
    let sheets = sheets(&config);
    let diagnostics = CollectingDiagnostics::new();
    let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let mut engine = engine(&config);

    let options = RunOptions { load: true, clear: true, refresh_views: false, stages: StageSelection::from_requested(&[2]) };
    pipeline.run(&mut engine, &options).unwrap();
    pipeline.run(&mut engine, &options).unwrap();
    assert_eq!(count(&engine, "states"), 3);
    assert_eq!(count(&engine, "state_brackets"), 5);
    assert!(!engine.table_exists("county").unwrap());
}

#[test]
fn census_failure_stops_at_the_census_stage() {
    let config = EtlConfig::default();
    let sheets = sheets(&config);
    let diagnostics = CollectingDiagnostics::new();
    let pipeline = Pipeline { config: &config, geography: &DownCensus, sheets: &sheets, diagnostics: &diagnostics };
    let mut engine = engine(&config);

    let err = pipeline.run(&mut engine, &load_all()).unwrap_err();
    assert_eq!(err.stage, Stage::Census);
    assert_eq!(err.exit_code(), reregion_cli::exit_codes::EXIT_EXTRACT_NETWORK);
    assert!(err.to_string().starts_with("census stage failed"));

    // Stage 1 ran before the failure
    assert_eq!(count(&engine, "federal_brackets"), 3);
    assert!(!engine.table_exists("county").unwrap());
}

#[test]
fn federal_only_run_skips_census() {
    let config = EtlConfig::default();
    let sheets = sheets(&config);
    let diagnostics = CollectingDiagnostics::new();
    let pipeline = Pipeline { config: &config, geography: &UnusedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let mut engine = engine(&config);

    let options = RunOptions { load: true, clear: false, refresh_views: false, stages: StageSelection::from_requested(&[1]) };
    let report = pipeline.run(&mut engine, &options).unwrap();
    assert_eq!(report.loaded, vec![(Stage::Federal, 3)]);
    assert!(report.reconcile.is_none());
}

#[test]
fn missing_sheet_names_the_stage() {
    let config = EtlConfig::default();
    let mut sheets = sheets(&config);
    sheets.0.remove(&config.sources.state_tax_sheet);
    let diagnostics = CollectingDiagnostics::new();
    let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let mut engine = engine(&config);

    let err = pipeline.run(&mut engine, &load_all()).unwrap_err();
    assert_eq!(err.stage, Stage::State);
    assert_eq!(err.exit_code(), reregion_cli::exit_codes::EXIT_EXTRACT_SOURCE);
}

#[test]
fn views_only_run_needs_no_sources() {
    let config = EtlConfig::default();
    let sheets = FixedSheets(HashMap::new());
    let diagnostics = CollectingDiagnostics::new();
    let mut engine = engine(&config);

    // Views read from the tables, so load them first
    {
        let loaded = self::sheets(&config);
        let pipeline = Pipeline { config: &config, geography: &FixedCensus, sheets: &loaded, diagnostics: &diagnostics };
        let options = RunOptions { refresh_views: false, ..load_all() };
        pipeline.run(&mut engine, &options).unwrap();
    }

    let pipeline = Pipeline { config: &config, geography: &UnusedCensus, sheets: &sheets, diagnostics: &diagnostics };
    let options = RunOptions { load: false, clear: false, refresh_views: true, stages: StageSelection::all() };
    let report = pipeline.run(&mut engine, &options).unwrap();
    assert!(report.loaded.is_empty());
    assert_eq!(report.views, Some(3));
}
