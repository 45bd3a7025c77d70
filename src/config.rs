use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SheetcountConfig {
    pub stream: StreamConfig,
    pub detector: DetectorConfig,
    pub counting: CountingConfig,
    pub persistence: PersistenceConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StreamConfig {
    /// Frame source uri (`-` for stdin, `file://<path>` or a bare path)
    #[serde(default = "default_stream_source")]
    pub source: String,

    /// Frames kept buffered ahead of the counter
    #[serde(default = "default_buffer_depth")]
    pub buffer_depth: usize,

    /// Apply the freshest-frame-only policy
    #[serde(default = "default_stream_live")]
    pub live: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Minimum detection confidence (0-1)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CountingConfig {
    /// Left edge of the counting lane in pixels
    #[serde(default = "default_lane_x_min")]
    pub lane_x_min: i32,

    /// Right edge of the counting lane in pixels
    #[serde(default = "default_lane_x_max")]
    pub lane_x_max: i32,

    /// Y coordinate of the counting line in pixels
    #[serde(default = "default_line_y")]
    pub line_y: i32,

    /// Maximum centroid distance (pixels) for a detection to continue a track
    #[serde(default = "default_track_match_distance")]
    pub track_match_distance: i32,

    /// First track identity handed out
    #[serde(default = "default_first_track_id")]
    pub first_track_id: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Jsonl,
    Rest,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PersistenceConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// JSON-lines ledger file
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Base url of the REST ledger
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent with every REST request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Table holding the count records
    #[serde(default = "default_store_table")]
    pub table: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Capacity of the persistence queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upper bound on the shutdown drain of the persistence queue
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Interval between operator status updates
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// Redraw the running total in place on stdout
    #[serde(default = "default_status_line")]
    pub status_line: bool,
}

impl SheetcountConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("stream.source", default_stream_source())?
            .set_default("stream.buffer_depth", default_buffer_depth() as i64)?
            .set_default("stream.live", default_stream_live())?
            .set_default(
                "detector.confidence_threshold",
                default_confidence_threshold() as f64,
            )?
            .set_default("counting.lane_x_min", default_lane_x_min() as i64)?
            .set_default("counting.lane_x_max", default_lane_x_max() as i64)?
            .set_default("counting.line_y", default_line_y() as i64)?
            .set_default(
                "counting.track_match_distance",
                default_track_match_distance() as i64,
            )?
            .set_default("counting.first_track_id", default_first_track_id())?
            .set_default("persistence.backend", "jsonl")?
            .set_default("persistence.path", default_store_path())?
            .set_default("persistence.table", default_store_table())?
            .set_default(
                "persistence.request_timeout_ms",
                default_request_timeout_ms(),
            )?
            .set_default(
                "persistence.queue_capacity",
                default_queue_capacity() as i64,
            )?
            .set_default("persistence.drain_timeout_ms", default_drain_timeout_ms())?
            .set_default("system.status_interval_ms", default_status_interval_ms())?
            .set_default("system.status_line", default_status_line())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with SHEETCOUNT_ prefix
            .add_source(
                Environment::with_prefix("SHEETCOUNT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SheetcountConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.source.trim().is_empty() {
            return Err(ConfigError::Message(
                "Stream source must not be empty".to_string(),
            ));
        }

        if self.stream.buffer_depth == 0 {
            return Err(ConfigError::Message(
                "Stream buffer_depth must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(ConfigError::Message(
                "Detector confidence_threshold must be within 0..=1".to_string(),
            ));
        }

        if self.counting.lane_x_min > self.counting.lane_x_max {
            return Err(ConfigError::Message(
                "Counting lane_x_min must not exceed lane_x_max".to_string(),
            ));
        }

        if self.counting.track_match_distance <= 0 {
            return Err(ConfigError::Message(
                "Counting track_match_distance must be greater than 0".to_string(),
            ));
        }

        if self.persistence.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Persistence queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.persistence.backend == StoreBackend::Rest {
            if self.persistence.url.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Message(
                    "Persistence url is required for the rest backend".to_string(),
                ));
            }
            if self.persistence.api_key.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Message(
                    "Persistence api_key is required for the rest backend".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl CountingConfig {
    /// Match threshold compared against squared centroid distances
    pub fn track_match_distance_sq(&self) -> i64 {
        let d = self.track_match_distance as i64;
        d * d
    }
}

impl Default for SheetcountConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig {
                source: default_stream_source(),
                buffer_depth: default_buffer_depth(),
                live: default_stream_live(),
            },
            detector: DetectorConfig {
                confidence_threshold: default_confidence_threshold(),
            },
            counting: CountingConfig {
                lane_x_min: default_lane_x_min(),
                lane_x_max: default_lane_x_max(),
                line_y: default_line_y(),
                track_match_distance: default_track_match_distance(),
                first_track_id: default_first_track_id(),
            },
            persistence: PersistenceConfig {
                backend: default_store_backend(),
                path: default_store_path(),
                url: None,
                api_key: None,
                table: default_store_table(),
                request_timeout_ms: default_request_timeout_ms(),
                queue_capacity: default_queue_capacity(),
                drain_timeout_ms: default_drain_timeout_ms(),
            },
            system: SystemConfig {
                status_interval_ms: default_status_interval_ms(),
                status_line: default_status_line(),
            },
        }
    }
}

// Default value functions
fn default_stream_source() -> String {
    "-".to_string()
}
fn default_buffer_depth() -> usize {
    1
}
fn default_stream_live() -> bool {
    true
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_lane_x_min() -> i32 {
    200
}
fn default_lane_x_max() -> i32 {
    440
}
fn default_line_y() -> i32 {
    300
}
fn default_track_match_distance() -> i32 {
    80
}
fn default_first_track_id() -> u64 {
    0
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Jsonl
}
fn default_store_path() -> String {
    "./sheet_counts.jsonl".to_string()
}
fn default_store_table() -> String {
    "sheet_counts".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_queue_capacity() -> usize {
    256
}
fn default_drain_timeout_ms() -> u64 {
    2000
}

fn default_status_interval_ms() -> u64 {
    1000
}
fn default_status_line() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SheetcountConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.counting.track_match_distance_sq(), 6400);
        assert_eq!(config.persistence.queue_capacity, 256);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[counting]
line_y = 320
lane_x_min = 100

[persistence]
backend = "memory"
queue_capacity = 8
"#
        )
        .unwrap();

        let config = SheetcountConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.counting.line_y, 320);
        assert_eq!(config.counting.lane_x_min, 100);
        assert_eq!(config.counting.lane_x_max, 440);
        assert_eq!(config.persistence.backend, StoreBackend::Memory);
        assert_eq!(config.persistence.queue_capacity, 8);
        assert_eq!(config.stream.source, "-");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SheetcountConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config, SheetcountConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SheetcountConfig::default();

        config.counting.lane_x_min = 500;
        assert!(config.validate().is_err());
        config.counting.lane_x_min = 200;

        config.detector.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
        config.detector.confidence_threshold = 0.5;

        config.persistence.queue_capacity = 0;
        assert!(config.validate().is_err());
        config.persistence.queue_capacity = 16;

        config.persistence.backend = StoreBackend::Rest;
        assert!(config.validate().is_err());

        config.persistence.url = Some("https://ledger.example".to_string());
        config.persistence.api_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }
}
