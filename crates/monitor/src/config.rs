//! Layered process configuration

use anyhow::Context;
use audit_log::AuditConfig;
use camera_capture::CaptureConfig;
use collector::CollectorConfig;
use perception::PerceptionConfig;
use serde::{Deserialize, Deserializer};
use stabilizer::StabilizerConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "argus-vision.toml";
/// Overrides the config file location
pub const CONFIG_PATH_VAR: &str = "ARGUS_CONFIG";
/// Prefix for per-key overrides, e.g. `ARGUS__COLLECTOR__BASE_URL`
pub const ENV_PREFIX: &str = "ARGUS";

/// Everything the monitor needs to start
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub collector: CollectorConfig,
    pub capture: CaptureConfig,
    pub perception: PerceptionConfig,
    pub stabilizer: StabilizerSettings,
    pub audit: AuditConfig,
    pub output: OutputConfig,
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            capture: CaptureConfig::default(),
            perception: PerceptionConfig::default(),
            stabilizer: StabilizerSettings::default(),
            audit: AuditConfig::default(),
            output: OutputConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// One stabilizer per signal class. Keys left out of a `[stabilizer.*]`
/// table take that class's preset.
#[derive(Debug, Clone, Copy)]
pub struct StabilizerSettings {
    pub face: StabilizerConfig,
    pub motion: StabilizerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StabilizerTables {
    face: StabilizerOverrides,
    motion: StabilizerOverrides,
}

#[derive(Debug, Default, Deserialize)]
struct StabilizerOverrides {
    stability_window_ms: Option<u64>,
    min_spacing_ms: Option<u64>,
}

impl StabilizerOverrides {
    fn over(self, preset: StabilizerConfig) -> StabilizerConfig {
        StabilizerConfig {
            stability_window_ms: self
                .stability_window_ms
                .unwrap_or(preset.stability_window_ms),
            min_spacing_ms: self.min_spacing_ms.unwrap_or(preset.min_spacing_ms),
        }
    }
}

impl<'de> Deserialize<'de> for StabilizerSettings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tables = StabilizerTables::deserialize(deserializer)?;
        Ok(Self {
            face: tables.face.over(StabilizerConfig::face()),
            motion: tables.motion.over(StabilizerConfig::motion()),
        })
    }
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            face: StabilizerConfig::face(),
            motion: StabilizerConfig::motion(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Headless,
    Preview,
}

/// Presentation sink selection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,
    /// JPEG file rewritten with the latest frame in preview mode
    pub preview_path: PathBuf,
    /// Minimum time between preview writes (ms)
    pub preview_interval_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Headless,
            preview_path: PathBuf::from("preview.jpg"),
            preview_interval_ms: 40,
        }
    }
}

impl OutputConfig {
    /// Minimum time between preview writes
    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms)
    }
}

impl MonitorConfig {
    /// Load defaults, then the config file (if any), then `ARGUS__*` variables
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Same as [`MonitorConfig::load`] with an explicit file path. A missing
    /// file is not an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("reading configuration from {}", path.display()))?;

        let config: MonitorConfig = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.capture.fps > 0, "capture.fps must be positive");
        anyhow::ensure!(
            self.capture.width > 0 && self.capture.height > 0,
            "capture dimensions must be positive"
        );
        anyhow::ensure!(
            (1..=100).contains(&self.capture.jpeg_quality),
            "capture.jpeg_quality must be in 1..=100"
        );
        anyhow::ensure!(
            self.collector.flush_interval_ms > 0,
            "collector.flush_interval_ms must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.collector.base_url, "http://localhost:8080");
        assert_eq!(config.capture.fps, 30);
        assert_eq!(config.stabilizer.face.stability_window_ms, 700);
        assert_eq!(config.stabilizer.face.min_spacing_ms, 2000);
        assert_eq!(config.stabilizer.motion.min_spacing_ms, 0);
        assert_eq!(config.output.mode, OutputMode::Headless);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = MonitorConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.collector.flush_interval_ms, 2000);
        assert_eq!(config.perception.face.min_area, 2500);
    }

    #[test]
    fn test_file_overrides_selected_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("argus-vision.toml");
        fs::write(
            &path,
            r#"
log_level = "debug"

[collector]
base_url = "http://collector.internal:9000"

[perception.face]
horizontal_threshold = 0.25

[stabilizer.face]
min_spacing_ms = 1500

[output]
mode = "preview"
"#,
        )
        .unwrap();

        let config = MonitorConfig::load_from(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.collector.base_url, "http://collector.internal:9000");
        assert_eq!(config.collector.event_path, "/api/event");
        assert_eq!(config.perception.face.horizontal_threshold, 0.25);
        assert_eq!(config.stabilizer.face.min_spacing_ms, 1500);
        assert_eq!(config.stabilizer.face.stability_window_ms, 700);
        assert_eq!(config.output.mode, OutputMode::Preview);
    }

    #[test]
    fn test_partial_stabilizer_tables_keep_class_presets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("argus-vision.toml");
        fs::write(
            &path,
            "[stabilizer.motion]\nstability_window_ms = 0\n\n[stabilizer.face]\nstability_window_ms = 500\n",
        )
        .unwrap();

        let config = MonitorConfig::load_from(&path).unwrap();
        assert_eq!(config.stabilizer.motion.stability_window_ms, 0);
        assert_eq!(config.stabilizer.motion.min_spacing_ms, 0);
        assert_eq!(config.stabilizer.face.stability_window_ms, 500);
        assert_eq!(config.stabilizer.face.min_spacing_ms, 2000);
    }

    #[test]
    fn test_motion_spacing_alone_keeps_zero_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("argus-vision.toml");
        fs::write(&path, "[stabilizer.motion]\nmin_spacing_ms = 250\n").unwrap();

        let config = MonitorConfig::load_from(&path).unwrap();
        assert_eq!(config.stabilizer.motion.stability_window_ms, 0);
        assert_eq!(config.stabilizer.motion.min_spacing_ms, 250);
        assert_eq!(config.stabilizer.face.stability_window_ms, 700);
    }

    #[test]
    fn test_zero_fps_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("argus-vision.toml");
        fs::write(&path, "[capture]\nfps = 0\n").unwrap();
        assert!(MonitorConfig::load_from(&path).is_err());
    }
}
