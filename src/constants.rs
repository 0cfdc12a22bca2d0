//! Column and source name constants shared by the pipeline stages,
//! the loader and the scheduler.

// Join key for the merge stage
pub const DATE_COLUMN: &str = "date";

// Unit conversion
pub const TEMPERATURE_F_COLUMN: &str = "temperature_f";
pub const TEMPERATURE_C_COLUMN: &str = "temperature_c";

// Derived feature and its operands
pub const HUMIDITY_COLUMN: &str = "humidity";
pub const WIND_SPEED_COLUMN: &str = "wind_speed_kmph";
pub const WEATHER_IMPACT_COLUMN: &str = "weather_impact_score";

/// Columns whose nulls are replaced with zero after the merge.
pub const DEFAULT_FILL_COLUMNS: [&str; 4] = [
    TEMPERATURE_C_COLUMN,
    HUMIDITY_COLUMN,
    WIND_SPEED_COLUMN,
    WEATHER_IMPACT_COLUMN,
];

// Source tags, used as merge suffixes
pub const CSV_SOURCE_TAG: &str = "csv";
pub const JSON_SOURCE_TAG: &str = "json";
pub const GOOGLE_SHEET_SOURCE_TAG: &str = "google";

// Default on-disk layout
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUTPUT_PATH: &str = "output/final_cleaned_data.csv";
pub const DEFAULT_METRICS_PATH: &str = "output/pipeline_metrics.prom";
pub const DEFAULT_STORE_CONFIG_PATH: &str = "config/db_config.json";
pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "pipeline.toml";

// Scheduler defaults
pub const DEFAULT_SCHEDULE_AT: &str = "13:00";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const PIPELINE_BIN_NAME: &str = "weather-etl";

/// Tokens read as null by the delimited-text extractor.
pub const NA_TOKENS: [&str; 9] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"];
