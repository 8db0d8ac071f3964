use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use reregion_core::{
    CanonicalGeoRecord, FederalBracket, FederalDeductions, ResolvedJurisdictionRecord, StateBracket,
    StateTaxRecord, TaxComponents,
};
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params_from_iter, Connection, ToSql};

use crate::batch::{build_batches, build_upsert_statement, Bind};
use crate::error::StoreError;
use crate::schema::{dependents, ScriptKind, TableSpec, COUNTY, DEFAULT_VIEWS, FEDERAL_BRACKETS, FEDERAL_DEDUCTIONS, STATES, STATE_BRACKETS, TAX_LOCALE};

/// Reserved id for "unknown" state and county rows.
pub const UNKNOWN_ID: &str = "32767";

/// SQLite's default host parameter limit.
pub const SQLITE_MAX_PARAMS: usize = 32766;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub null_sentinel: String,
    pub max_params: usize,
    /// Directory of view scripts. `None` uses the built-in views.
    pub views_dir: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            null_sentinel: "NONE".to_string(),
            max_params: SQLITE_MAX_PARAMS,
            views_dir: None,
        }
    }
}

impl ToSql for Bind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Bind::Text(s) => ToSqlOutput::from(s.as_str()),
            Bind::Integer(n) => ToSqlOutput::from(*n),
            Bind::Real(x) => ToSqlOutput::from(*x),
            Bind::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

/// Creates, clears and loads the ETL tables.
///
/// Single-threaded: callers load one table at a time.
pub struct PersistenceEngine {
    conn: Connection,
    options: EngineOptions,
}

impl PersistenceEngine {
    pub fn open(path: impl AsRef<Path>, options: EngineOptions) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_connection(conn, options)
    }

    pub fn open_in_memory(options: EngineOptions) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, options)
    }

    pub fn from_connection(conn: Connection, options: EngineOptions) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        log::info!("database engine ready (max {} parameters per statement)", options.max_params);
        Ok(Self { conn, options })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        table_exists(&self.conn, name)
    }

    /// Create `spec` if absent, or clear it when asked.
    ///
    /// Creation requires the parent table to exist already. An existing table
    /// is left untouched unless `clear_existing` is set. A clear only touches
    /// `spec` and fails while a dependent table still holds rows.
    pub fn ensure_table(&self, spec: &TableSpec, clear_existing: bool) -> Result<(), StoreError> {
        log::info!("checking if {} exists", spec.name);
        if self.table_exists(spec.name)? {
            if clear_existing {
                delete_rows(&self.conn, spec, &[spec.name])?;
            }
            return Ok(());
        }

        if let Some(parent) = spec.depends_on {
            if !self.table_exists(parent)? {
                return Err(StoreError::MissingDependency {
                    table: spec.name.to_string(),
                    depends_on: parent.to_string(),
                });
            }
        }

        log::info!("table {} does not exist, creating it", spec.name);
        self.conn.execute_batch(required_script(spec, ScriptKind::Ddl)?)?;
        Ok(())
    }

    /// Empty every existing table in `specs`, in the given order, as one unit.
    ///
    /// List children before their parents. Fails, and clears nothing, when a
    /// table outside `specs` still references one being cleared.
    pub fn clear_tables(&mut self, specs: &[&TableSpec]) -> Result<(), StoreError> {
        let clearing: Vec<&str> = specs.iter().map(|s| s.name).collect();
        let tx = self.conn.transaction()?;
        for spec in specs {
            if table_exists(&tx, spec.name)? {
                delete_rows(&tx, spec, &clearing)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Upsert `rows` into `spec` in as many statements as the parameter limit requires.
    ///
    /// Returns the number of rows written. All batches of one call share a transaction.
    pub fn load_table(
        &mut self,
        spec: &TableSpec,
        rows: &[Vec<String>],
        clear_existing: bool,
    ) -> Result<usize, StoreError> {
        self.ensure_table(spec, clear_existing)?;
        if rows.is_empty() {
            log::info!("no rows to load into {}", spec.name);
            return Ok(0);
        }

        let insert = required_script(spec, ScriptKind::Insert)?;
        let update = required_script(spec, ScriptKind::Update)?;
        let batches = build_batches(spec, rows, &self.options.null_sentinel, self.options.max_params)?;

        let tx = self.conn.transaction()?;
        for batch in &batches {
            let sql = build_upsert_statement(insert, update, batch.rows, spec.column_count());
            tx.execute(&sql, params_from_iter(batch.binds.iter()))?;
            log::info!("upserted {} records into {}", batch.rows, spec.name);
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn load_states(&mut self, records: &[StateTaxRecord], clear: bool) -> Result<usize, StoreError> {
        log::info!("executing insert for states table");
        let mut rows = vec![sentinel_row(&[UNKNOWN_ID, "Unknown", "0", "0", "0", "0", "0"])];
        rows.extend(records.iter().map(|r| {
            vec![
                r.state_id.clone(),
                r.state_name.clone(),
                r.single_deduction.clone(),
                r.couple_deduction.clone(),
                r.single_exemption.clone(),
                r.couple_exemption.clone(),
                r.dependent_exemption.clone(),
            ]
        }));
        self.load_table(&STATES, &rows, clear).map(|_| records.len())
    }

    pub fn load_state_brackets(&mut self, records: &[StateBracket], clear: bool) -> Result<usize, StoreError> {
        log::info!("executing insert for state bracket table");
        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|r| {
                vec![
                    r.state_id.clone(),
                    r.single_rate.clone(),
                    r.single_bracket.clone(),
                    r.married_rate.clone(),
                    r.married_bracket.clone(),
                ]
            })
            .collect();
        self.load_table(&STATE_BRACKETS, &rows, clear)
    }

    /// Counties whose state is not loaded are attached to the unknown state.
    pub fn load_county(&mut self, records: &[CanonicalGeoRecord], clear: bool) -> Result<usize, StoreError> {
        log::info!("executing insert for county table");
        let known_states = self.known_ids(&STATES, "state_id")?;
        let null = self.options.null_sentinel.clone();

        let mut orphaned = 0usize;
        let mut rows = vec![sentinel_row(&[UNKNOWN_ID, "Unknown", UNKNOWN_ID, "0", "0", "0", "0", "0", "0"])];
        for r in records {
            let state_id = if r.state_fips != null && known_states.contains(&r.state_fips) {
                r.state_fips.clone()
            } else {
                orphaned += 1;
                UNKNOWN_ID.to_string()
            };
            rows.push(vec![
                r.county_id(),
                r.county_name.clone(),
                state_id,
                r.population.to_string(),
                r.male_count.to_string(),
                r.female_count.to_string(),
                r.median_income.to_string(),
                r.median_gross_rent.to_string(),
                r.avg_commute_minutes.to_string(),
            ]);
        }
        if orphaned > 0 {
            log::warn!("{orphaned} counties have no loaded state and were attached to the unknown state");
        }
        self.load_table(&COUNTY, &rows, clear).map(|_| records.len())
    }

    pub fn load_federal_brackets(&mut self, records: &[FederalBracket], clear: bool) -> Result<usize, StoreError> {
        log::info!("executing insert for federal bracket table");
        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|r| {
                vec![
                    r.rate.clone(),
                    r.single_bracket.clone(),
                    r.married_bracket.clone(),
                    r.head_of_household_bracket.clone(),
                ]
            })
            .collect();
        self.load_table(&FEDERAL_BRACKETS, &rows, clear)
    }

    pub fn load_federal_deductions(&mut self, deductions: &FederalDeductions, clear: bool) -> Result<usize, StoreError> {
        log::info!("executing insert for federal deductions table");
        let rows = vec![vec![
            deductions.single.clone(),
            deductions.married.clone(),
            deductions.head_of_household.clone(),
        ]];
        self.load_table(&FEDERAL_DEDUCTIONS, &rows, clear)
    }

    /// Unmatched jurisdictions, and ids missing from `county`, bind to the unknown county.
    pub fn load_tax_locale(&mut self, records: &[ResolvedJurisdictionRecord], clear: bool) -> Result<usize, StoreError> {
        log::info!("executing insert for local tax table");
        let known_counties = self.known_ids(&COUNTY, "county_id")?;
        let null = self.options.null_sentinel.clone();

        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|r| {
                let county_id = r
                    .county_id
                    .as_ref()
                    .filter(|id| known_counties.contains(*id))
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_ID.to_string());
                let mut row = Vec::with_capacity(14);
                row.push(r.jurisdiction_name.clone());
                row.push(county_id);
                push_components(&mut row, &r.resident, &null);
                push_components(&mut row, &r.nonresident, &null);
                row
            })
            .collect();
        self.load_table(&TAX_LOCALE, &rows, clear)
    }

    /// Run every view script, in file-name order. The first failure aborts.
    pub fn refresh_views(&self) -> Result<usize, StoreError> {
        let scripts = match &self.options.views_dir {
            Some(dir) => read_view_dir(dir)?,
            None => DEFAULT_VIEWS
                .iter()
                .map(|(path, body)| (file_name(path).to_string(), body.to_string()))
                .collect(),
        };

        for (name, body) in &scripts {
            self.conn.execute_batch(body).map_err(|e| StoreError::View {
                name: name.clone(),
                message: e.to_string(),
            })?;
            log::info!("successfully defined view {name}");
        }
        Ok(scripts.len())
    }

    fn known_ids(&self, spec: &TableSpec, column: &str) -> Result<HashSet<String>, StoreError> {
        if !self.table_exists(spec.name)? {
            return Ok(HashSet::new());
        }
        let mut stmt = self.conn.prepare(&format!("SELECT {column} FROM {}", spec.name))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// `DELETE` every row of `spec`. Dependents not named in `clearing` must be empty.
fn delete_rows(conn: &Connection, spec: &TableSpec, clearing: &[&str]) -> Result<(), StoreError> {
    for dependent in dependents(spec.name) {
        if clearing.contains(&dependent.name) || !table_exists(conn, dependent.name)? {
            continue;
        }
        let rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", dependent.name), [], |r| r.get(0))?;
        if rows > 0 {
            return Err(StoreError::DependentRows {
                table: spec.name.to_string(),
                dependent: dependent.name.to_string(),
            });
        }
    }

    log::info!("table {} exists and a clear was requested, dropping its rows", spec.name);
    conn.execute(&format!("DELETE FROM {}", spec.name), [])?;
    Ok(())
}

fn required_script(spec: &TableSpec, kind: ScriptKind) -> Result<&'static str, StoreError> {
    spec.script(kind)
        .ok_or_else(|| StoreError::MissingScript(spec.script_path(kind)))
}

fn sentinel_row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn push_components(row: &mut Vec<String>, c: &TaxComponents, null: &str) {
    let or_null = |v: &Option<String>| v.clone().unwrap_or_else(|| null.to_string());
    row.push(c.raw_text.clone());
    row.push(or_null(&c.rate));
    row.push(or_null(&c.monthly_fee));
    row.push(or_null(&c.yearly_fee));
    row.push(or_null(&c.pay_period_fee));
    row.push(or_null(&c.percent_of_state_liability));
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn read_view_dir(dir: &Path) -> Result<Vec<(String, String)>, StoreError> {
    let io_err = |path: &Path, e: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    paths
        .into_iter()
        .map(|path| {
            let body = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok((name, body))
        })
        .collect()
}
