//! Static schema registry.
//!
//! Every table knows its columns in bind order, its single optional parent
//! table, and the embedded DDL / insert / update scripts keyed by its
//! script identifier.

/// How a raw string value is normalized before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Text,
    Integer,
    Decimal,
    /// Decimal that binds SQL `NULL` when absent instead of `0.0`.
    NullableDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Ddl,
    Insert,
    Update,
}

impl ScriptKind {
    pub fn dir(self) -> &'static str {
        match self {
            Self::Ddl => "ddl",
            Self::Insert => "insert",
            Self::Update => "update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub depends_on: Option<&'static str>,
    /// File stem shared by the table's ddl, insert and update scripts.
    pub script_ref: &'static str,
    /// Bound columns in order, including the ordinal key when present.
    pub columns: &'static [Column],
    /// First column is the running row position rather than input data.
    pub ordinal_key: bool,
}

impl TableSpec {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of cells each input row must carry.
    pub fn data_columns(&self) -> &'static [Column] {
        if self.ordinal_key {
            &self.columns[1..]
        } else {
            self.columns
        }
    }

    pub fn script_path(&self, kind: ScriptKind) -> String {
        format!("{}/{}.sql", kind.dir(), self.script_ref)
    }

    pub fn script(&self, kind: ScriptKind) -> Option<&'static str> {
        script(&self.script_path(kind))
    }
}

/// The six logical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    States,
    County,
    StateBrackets,
    FederalBrackets,
    FederalDeductions,
    TaxLocale,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::States,
        Table::County,
        Table::StateBrackets,
        Table::FederalBrackets,
        Table::FederalDeductions,
        Table::TaxLocale,
    ];

    pub fn spec(self) -> &'static TableSpec {
        match self {
            Self::States => &STATES,
            Self::County => &COUNTY,
            Self::StateBrackets => &STATE_BRACKETS,
            Self::FederalBrackets => &FEDERAL_BRACKETS,
            Self::FederalDeductions => &FEDERAL_DEDUCTIONS,
            Self::TaxLocale => &TAX_LOCALE,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

/// Tables whose foreign key points at `name`.
pub fn dependents(name: &str) -> impl Iterator<Item = &'static TableSpec> + '_ {
    Table::ALL.into_iter().map(Table::spec).filter(move |s| s.depends_on == Some(name))
}

/// Look a table up by name.
pub fn lookup(name: &str) -> Option<&'static TableSpec> {
    Table::ALL.iter().map(|t| t.spec()).find(|s| s.name == name)
}

use ColumnKind::{Decimal, Integer, NullableDecimal, Text};

pub static STATES: TableSpec = TableSpec {
    name: "states",
    depends_on: None,
    script_ref: "states",
    columns: &[
        col("state_id", Text),
        col("state_name", Text),
        col("single_deduction", Integer),
        col("couple_deduction", Integer),
        col("single_exemption", Integer),
        col("couple_exemption", Integer),
        col("dependent_exemption", Integer),
    ],
    ordinal_key: false,
};

pub static COUNTY: TableSpec = TableSpec {
    name: "county",
    depends_on: Some("states"),
    script_ref: "county",
    columns: &[
        col("county_id", Text),
        col("county_name", Text),
        col("state_id", Text),
        col("population", Integer),
        col("male_population", Integer),
        col("female_population", Integer),
        col("median_income", Integer),
        col("median_gross_rent", Integer),
        col("avg_commute_minutes", Integer),
    ],
    ordinal_key: false,
};

pub static STATE_BRACKETS: TableSpec = TableSpec {
    name: "state_brackets",
    depends_on: Some("states"),
    script_ref: "state_brackets",
    columns: &[
        col("state_id", Text),
        col("single_rate", Decimal),
        col("single_bracket", Integer),
        col("married_rate", Decimal),
        col("married_bracket", Integer),
    ],
    ordinal_key: false,
};

pub static FEDERAL_BRACKETS: TableSpec = TableSpec {
    name: "federal_brackets",
    depends_on: None,
    script_ref: "federal_brackets",
    columns: &[
        col("rate", Decimal),
        col("single_bracket", Integer),
        col("married_bracket", Integer),
        col("head_of_household_bracket", Integer),
    ],
    ordinal_key: false,
};

pub static FEDERAL_DEDUCTIONS: TableSpec = TableSpec {
    name: "federal_deductions",
    depends_on: None,
    script_ref: "federal_deductions",
    columns: &[
        col("single", Integer),
        col("married", Integer),
        col("head_of_household", Integer),
    ],
    ordinal_key: false,
};

pub static TAX_LOCALE: TableSpec = TableSpec {
    name: "tax_locale",
    depends_on: Some("county"),
    script_ref: "tax_locale",
    columns: &[
        col("locale_id", Integer),
        col("locale_name", Text),
        col("county_id", Text),
        col("resident_desc", Text),
        col("resident_rate", Decimal),
        col("resident_month_fee", Decimal),
        col("resident_year_fee", Decimal),
        col("resident_pay_period_fee", Decimal),
        col("resident_state_rate", NullableDecimal),
        col("nonresident_desc", Text),
        col("nonresident_rate", Decimal),
        col("nonresident_month_fee", Decimal),
        col("nonresident_year_fee", Decimal),
        col("nonresident_pay_period_fee", Decimal),
        col("nonresident_state_rate", NullableDecimal),
    ],
    ordinal_key: true,
};

// ---------------------------------------------------------------------------
// Embedded scripts
// ---------------------------------------------------------------------------

macro_rules! scripts {
    ($($path:literal),* $(,)?) => {
        &[$(($path, include_str!(concat!("../sql/", $path)))),*]
    };
}

static SCRIPTS: &[(&str, &str)] = scripts![
    "ddl/states.sql",
    "ddl/county.sql",
    "ddl/state_brackets.sql",
    "ddl/federal_brackets.sql",
    "ddl/federal_deductions.sql",
    "ddl/tax_locale.sql",
    "insert/states.sql",
    "insert/county.sql",
    "insert/state_brackets.sql",
    "insert/federal_brackets.sql",
    "insert/federal_deductions.sql",
    "insert/tax_locale.sql",
    "update/states.sql",
    "update/county.sql",
    "update/state_brackets.sql",
    "update/federal_brackets.sql",
    "update/federal_deductions.sql",
    "update/tax_locale.sql",
];

/// Built-in view scripts, in execution order.
pub static DEFAULT_VIEWS: &[(&str, &str)] = scripts![
    "view/01_county_profile.sql",
    "view/02_state_tax_summary.sql",
    "view/03_unmatched_locales.sql",
];

/// Embedded script by path relative to the `sql/` directory.
pub fn script(path: &str) -> Option<&'static str> {
    SCRIPTS.iter().find(|(p, _)| *p == path).map(|(_, body)| *body)
}
