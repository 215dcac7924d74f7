use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::{
    cleaning::{ColumnKind, ColumnRule},
    storage::{self, StorageManager},
};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_TOP_N: usize = 10;
const DEFAULT_MAX_TOP_N: usize = 100;
const DEFAULT_ARTIFACT_FILE: &str = "model.bin";
const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;

const DEFAULT_TITLE_COLUMN: &str = "Movie Name";
const DEFAULT_DESCRIPTION_COLUMN: &str = "Description";

/// Display fields a recommendation record can carry.
pub const DISPLAY_FIELDS: [&str; 3] = ["name", "genre", "rating"];

/// Build pipeline settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Threads for the similarity computation: "auto" or a positive integer
    #[serde(default = "default_parallelism")]
    pub parallelism: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
        }
    }
}

impl BuildConfig {
    /// `None` means rayon picks the thread count.
    pub fn threads(&self) -> Option<usize> {
        match self.parallelism.as_str() {
            "auto" => None,
            value => value.parse::<usize>().ok().filter(|n| *n > 0),
        }
    }
}

/// HTTP hosting settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upper bound on a single recommend call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Dataset schema and cleaning rules
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_title_column")]
    pub title_column: String,

    #[serde(default = "default_description_column")]
    pub description_column: String,

    /// Display field (name, genre, rating) -> corpus column
    #[serde(default = "default_display")]
    pub display: BTreeMap<String, String>,

    /// Raw column header -> cleaning rule. Unlisted columns use `auto`.
    #[serde(default = "default_columns")]
    pub columns: BTreeMap<String, ColumnRule>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            title_column: default_title_column(),
            description_column: default_description_column(),
            display: default_display(),
            columns: default_columns(),
        }
    }
}

impl DatasetConfig {
    pub fn rule_for(&self, header: &str) -> ColumnRule {
        self.columns.get(header).cloned().unwrap_or_default()
    }
}

fn default_parallelism() -> String {
    "auto".to_string()
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_title_column() -> String {
    DEFAULT_TITLE_COLUMN.to_string()
}

fn default_description_column() -> String {
    DEFAULT_DESCRIPTION_COLUMN.to_string()
}

fn default_display() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("name".to_string(), DEFAULT_TITLE_COLUMN.to_string()),
        ("genre".to_string(), "Genre".to_string()),
        ("rating".to_string(), "Movie Rating".to_string()),
    ])
}

fn default_columns() -> BTreeMap<String, ColumnRule> {
    BTreeMap::from([
        (
            "Year of Release".to_string(),
            ColumnRule::new(ColumnKind::Year, Some("ReleaseYear")),
        ),
        (
            "Watch Time".to_string(),
            ColumnRule::new(ColumnKind::Duration, Some("TotalTime")),
        ),
        (
            "Meatscore of movie".to_string(),
            ColumnRule::new(ColumnKind::Score, Some("Meatscore")),
        ),
        (
            "Gross".to_string(),
            ColumnRule::new(ColumnKind::Gross, Some("Worth")),
        ),
        ("Votes".to_string(), ColumnRule::new(ColumnKind::Drop, None)),
    ])
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_max_top_n() -> usize {
    DEFAULT_MAX_TOP_N
}

fn default_artifact_file() -> String {
    DEFAULT_ARTIFACT_FILE.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Recommendations returned when the caller does not ask for a count
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,

    /// Model artifact, relative to the base path
    #[serde(default = "default_artifact_file")]
    pub artifact_file: String,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            max_top_n: DEFAULT_MAX_TOP_N,
            artifact_file: default_artifact_file(),
            build: BuildConfig::default(),
            serve: ServeConfig::default(),
            dataset: DatasetConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.top_n == 0 {
            bail!("top_n must be greater than 0");
        }

        if self.max_top_n < self.top_n {
            bail!(
                "max_top_n ({}) must not be smaller than top_n ({})",
                self.max_top_n,
                self.top_n
            );
        }

        if self.artifact_file.trim().is_empty() {
            bail!("artifact_file must not be empty");
        }

        if self.build.parallelism != "auto" && self.build.threads().is_none() {
            bail!(
                "build.parallelism must be 'auto' or a positive integer, got '{}'",
                self.build.parallelism
            );
        }

        if self.serve.request_timeout_ms == 0 {
            bail!("serve.request_timeout_ms must be greater than 0");
        }

        let dataset = &self.dataset;
        if dataset.title_column.is_empty() || dataset.description_column.is_empty() {
            bail!("dataset.title_column and dataset.description_column must be set");
        }

        if dataset.title_column == dataset.description_column {
            bail!("dataset.title_column and dataset.description_column must differ");
        }

        for field in dataset.display.keys() {
            if !DISPLAY_FIELDS.contains(&field.as_str()) {
                bail!(
                    "dataset.display: unknown field '{field}', expected one of {:?}",
                    DISPLAY_FIELDS
                );
            }
        }

        Ok(())
    }

    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.base_path.join(&self.artifact_file)
    }
}
