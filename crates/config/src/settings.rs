// ETL settings
// Loaded from --config, ./reregion.toml, or ~/.config/reregion/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// File name looked up in the working directory.
pub const LOCAL_FILE: &str = "reregion.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Stand-in for "no data" inside extracted rows
    pub null_string: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self { null_string: "NONE".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CensusSettings {
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Total request attempts, including the first
    pub attempts: u32,

    /// Wait before the first retry; doubles on each further retry
    pub backoff_secs: u64,
}

impl Default for CensusSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.census.gov/data/2019/acs/acs1".to_string(),
            api_key_env: "CENSUS_API_KEY".to_string(),
            attempts: 3,
            backoff_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalTaxSettings {
    /// Similarity score a county match must exceed (0-100)
    pub threshold: u8,
}

impl Default for LocalTaxSettings {
    fn default() -> Self {
        Self { threshold: 85 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub data_dir: PathBuf,
    pub local_tax_file: String,
    pub local_tax_sheet: String,
    pub state_tax_file: String,
    pub state_tax_sheet: String,
    pub federal_tax_file: String,
    pub federal_brackets_sheet: String,
    pub federal_deductions_sheet: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            local_tax_file: "Local_Income_Tax_Rates_2019.xlsx".to_string(),
            local_tax_sheet: "Local Income Tax Rates".to_string(),
            state_tax_file: "State-Individual-Income-Tax-Rates-and-Brackets-for-2022-v.xlsx".to_string(),
            state_tax_sheet: "2022".to_string(),
            federal_tax_file: "2022-Federal-Income-Tax-Rates-and-Brackets-Tax-Foundation.xlsx".to_string(),
            federal_brackets_sheet: "Table 1".to_string(),
            federal_deductions_sheet: "Table 2".to_string(),
        }
    }
}

impl SourceSettings {
    pub fn local_tax_path(&self) -> PathBuf {
        self.data_dir.join(&self.local_tax_file)
    }

    pub fn state_tax_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_tax_file)
    }

    pub fn federal_tax_path(&self) -> PathBuf {
        self.data_dir.join(&self.federal_tax_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,

    /// Host parameters allowed in one statement
    pub max_params: usize,

    /// Directory of view scripts; built-in views when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views_dir: Option<PathBuf>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reregion.db"),
            max_params: 32766,
            views_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub general: GeneralSettings,
    pub census: CensusSettings,
    pub local_tax: LocalTaxSettings,
    pub sources: SourceSettings,
    pub database: DatabaseSettings,
}

impl EtlConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: EtlConfig = toml::from_str(input).map_err(|e| ConfigError::Parse {
            path: None,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let null = self.general.null_string.trim();
        if null.is_empty() {
            return Err(ConfigError::Invalid("general.null_string must not be empty".into()));
        }
        // The sentinel must never collide with a real numeric value
        if null.parse::<f64>().is_ok() {
            return Err(ConfigError::Invalid(format!(
                "general.null_string must not be numeric, got {null:?}"
            )));
        }

        if self.census.attempts == 0 {
            return Err(ConfigError::Invalid("census.attempts must be at least 1".into()));
        }
        if self.census.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("census.base_url must not be empty".into()));
        }

        if self.local_tax.threshold > 100 {
            return Err(ConfigError::Invalid(format!(
                "local_tax.threshold must be between 0 and 100, got {}",
                self.local_tax.threshold
            )));
        }

        if self.database.max_params == 0 {
            return Err(ConfigError::Invalid("database.max_params must be positive".into()));
        }

        Ok(())
    }

    /// Paths tried, in order, when no explicit config is given.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("reregion").join("config.toml"));
        }
        paths
    }

    /// Load from `explicit`, else the first existing search path, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_with(explicit, &Self::search_paths())
    }

    /// As [`load`](Self::load), with the search paths supplied.
    ///
    /// An explicit path must exist. Search paths that do not exist are skipped.
    pub fn load_with(
        explicit: Option<&Path>,
        search: &[PathBuf],
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let chosen = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => search.iter().find(|p| p.is_file()).cloned(),
        };

        let Some(path) = chosen else {
            let config = Self::default();
            config.validate()?;
            return Ok((config, None));
        };

        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: Some(path.clone()),
                message,
            },
            other => other,
        })?;
        Ok((config, Some(path)))
    }
}
