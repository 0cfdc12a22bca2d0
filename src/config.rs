use crate::constants;
use crate::error::{EtlError, Result};
use crate::pipeline::extract::SourceFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Static configuration for one pipeline process. Read once, never mutated.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_path: PathBuf,
    pub metrics_path: Option<PathBuf>,
    pub store_config_path: PathBuf,
    pub sources: Vec<SourceSpec>,
    pub schedule: ScheduleConfig,
}

/// One input file and how to read it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSpec {
    /// Human-readable name used in log lines
    pub label: String,
    /// Short suffix applied to colliding columns when merging
    pub tag: String,
    /// File name, relative to `data_dir` unless absolute
    pub file: PathBuf,
    pub format: SourceFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local wall-clock time, `HH:MM`
    pub at: String,
    pub poll_interval_secs: u64,
    pub overlap: OverlapPolicy,
    /// Pipeline executable; defaults to the sibling `weather-etl` binary
    pub pipeline_bin: Option<PathBuf>,
}

/// What to do when a trigger fires while the previous run is still going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Start another run regardless
    #[default]
    Allow,
    /// Skip the trigger and log a warning
    Skip,
}

/// Connection descriptor for the document store.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
            output_path: PathBuf::from(constants::DEFAULT_OUTPUT_PATH),
            metrics_path: Some(PathBuf::from(constants::DEFAULT_METRICS_PATH)),
            store_config_path: PathBuf::from(constants::DEFAULT_STORE_CONFIG_PATH),
            sources: default_sources(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            at: constants::DEFAULT_SCHEDULE_AT.to_string(),
            poll_interval_secs: constants::DEFAULT_POLL_INTERVAL_SECS,
            overlap: OverlapPolicy::default(),
            pipeline_bin: None,
        }
    }
}

fn default_sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec {
            label: "sample_data.csv".to_string(),
            tag: constants::CSV_SOURCE_TAG.to_string(),
            file: PathBuf::from("sample_data.csv"),
            format: SourceFormat::Delimited,
        },
        SourceSpec {
            label: "sample_weather.json".to_string(),
            tag: constants::JSON_SOURCE_TAG.to_string(),
            file: PathBuf::from("sample_weather.json"),
            format: SourceFormat::Records,
        },
        SourceSpec {
            label: "google_sheet_sample.csv".to_string(),
            tag: constants::GOOGLE_SHEET_SOURCE_TAG.to_string(),
            file: PathBuf::from("google_sheet_sample.csv"),
            format: SourceFormat::Delimited,
        },
    ]
}

impl PipelineConfig {
    /// Load from `path` if given, else from `pipeline.toml` if it exists,
    /// else use defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(constants::DEFAULT_PIPELINE_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("ETL_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(out) = std::env::var("ETL_OUTPUT_PATH") {
            self.output_path = PathBuf::from(out);
        }
        if let Ok(store) = std::env::var("ETL_STORE_CONFIG") {
            self.store_config_path = PathBuf::from(store);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(EtlError::Config("at least one source is required".to_string()));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if source.tag.trim().is_empty() {
                return Err(EtlError::Config(format!(
                    "source '{}' has an empty tag",
                    source.label
                )));
            }
            if self.sources[..i].iter().any(|s| s.tag == source.tag) {
                return Err(EtlError::Config(format!("duplicate source tag '{}'", source.tag)));
            }
        }
        if self.schedule.poll_interval_secs == 0 {
            return Err(EtlError::Config("schedule.poll_interval_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Absolute-or-data-dir-relative path of a source file.
    pub fn source_path(&self, source: &SourceSpec) -> PathBuf {
        if source.file.is_absolute() {
            source.file.clone()
        } else {
            self.data_dir.join(&source.file)
        }
    }
}

impl StoreConfig {
    /// Read the JSON connection descriptor; `ETL_STORE_URI` overrides its URI.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read store config '{}': {}", path.display(), e))
        })?;
        let mut config: StoreConfig = serde_json::from_str(&content)?;
        if let Ok(uri) = std::env::var("ETL_STORE_URI") {
            config.uri = uri;
        }
        if config.database.trim().is_empty() || config.collection.trim().is_empty() {
            return Err(EtlError::Config(
                "store config requires non-empty database and collection".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_has_three_sources() {
        let config = PipelineConfig::default();
        let tags: Vec<&str> = config.sources.iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["csv", "json", "google"]);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.source_path(&config.sources[1]),
            PathBuf::from("data/sample_weather.json")
        );
    }

    #[test]
    fn test_pipeline_config_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
data_dir = "/srv/weather"
output_path = "out/final.csv"

[[sources]]
label = "stations"
tag = "st"
file = "stations.csv"
format = "delimited"

[schedule]
at = "06:30"
overlap = "skip"
"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/weather"));
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].format, SourceFormat::Delimited);
        assert_eq!(config.schedule.at, "06:30");
        assert_eq!(config.schedule.overlap, OverlapPolicy::Skip);
        assert_eq!(config.schedule.poll_interval_secs, 60);
    }

    #[test]
    fn test_duplicate_tags_rejected() {
        let mut config = PipelineConfig::default();
        config.sources[1].tag = "csv".to_string();
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));
    }

    #[test]
    fn test_store_config_from_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"uri": "file:///tmp/store", "database": "weather", "collection": "daily"}}"#
        )
        .unwrap();
        let config = StoreConfig::load(file.path()).unwrap();
        assert_eq!(config.database, "weather");
        assert_eq!(config.collection, "daily");
    }

    #[test]
    fn test_store_config_missing_file() {
        let err = StoreConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }
}
