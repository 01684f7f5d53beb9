use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ScopeError;
use crate::scan::{LineWindow, ScanFormat};
use crate::types::{RAW_CHANNEL_COUNT, STRUCTURED_CHANNEL_COUNT};

/// Largest accepted plot side, in pixels.
pub const MAX_PLOT_SIDE: u32 = 8192;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OutputNames {
    pub sequencer: PathBuf,
    pub combined: PathBuf,
    pub scan: PathBuf,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            sequencer: PathBuf::from("sequencerscope.png"),
            combined: PathBuf::from("combinedscope.png"),
            scan: PathBuf::from("scanplot.png"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Base path prepended to relative sequencer file names.
    pub sequencer_directory: Option<PathBuf>,
    /// Sequencer clock that triggers the ADC.
    pub trigger_clock: String,
    pub raw_channel_count: usize,
    /// Lines averaged in a structured scan for the combined view.
    pub structured_lines: LineWindow,
    /// Lines averaged in a raw dump for the combined view.
    pub raw_lines: LineWindow,
    /// Acquisition window length, in multiples of 256 samples.
    pub extend: usize,
    /// Put x ticks on clock edges instead of every 256 samples.
    pub mark_transitions: bool,
    pub combined_readout: String,
    pub sequencer_readout: String,
    pub comparison_channels: Vec<usize>,
    pub outputs: OutputNames,
    pub plot_width: u32,
    pub plot_height: u32,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            sequencer_directory: None,
            trigger_clock: "TRG".to_owned(),
            raw_channel_count: RAW_CHANNEL_COUNT,
            structured_lines: LineWindow::sensor_region(),
            raw_lines: LineWindow::ALL,
            extend: 1,
            mark_transitions: true,
            combined_readout: "ReadPixel".to_owned(),
            sequencer_readout: "Acquisition".to_owned(),
            comparison_channels: (0..STRUCTURED_CHANNEL_COUNT).collect(),
            outputs: OutputNames::default(),
            plot_width: 1300,
            plot_height: 800,
        }
    }
}

impl ScopeConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ScopeError> {
        let config: ScopeConfig =
            serde_json::from_str(text).map_err(|e| ScopeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ScopeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScopeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ScopeError> {
        if self.extend == 0 {
            return Err(ScopeError::Config("extend must be at least 1".into()));
        }
        if self.raw_channel_count == 0 {
            return Err(ScopeError::Config("raw_channel_count must be at least 1".into()));
        }
        if self.trigger_clock.is_empty() {
            return Err(ScopeError::Config("trigger_clock must not be empty".into()));
        }
        if self.plot_width == 0 || self.plot_height == 0 {
            return Err(ScopeError::Config("plot size must be non-zero".into()));
        }
        if self.plot_width > MAX_PLOT_SIDE || self.plot_height > MAX_PLOT_SIDE {
            return Err(ScopeError::Config(format!(
                "plot size {}x{} exceeds {MAX_PLOT_SIDE} pixels per side",
                self.plot_width, self.plot_height
            )));
        }
        Ok(())
    }

    pub fn resolve_sequencer_path(&self, path: &Path) -> PathBuf {
        match &self.sequencer_directory {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn line_window(&self, format: ScanFormat) -> LineWindow {
        match format {
            ScanFormat::Structured => self.structured_lines,
            ScanFormat::Raw => self.raw_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ScopeConfig::from_json_str(
            r#"{ "sequencer_directory": "/data/seq", "extend": 2, "structured_lines": { "skip_leading": 4 } }"#,
        )
        .unwrap();
        assert_eq!(config.extend, 2);
        assert_eq!(config.trigger_clock, "TRG");
        assert_eq!(config.raw_channel_count, 48);
        assert_eq!(
            config.structured_lines,
            LineWindow {
                skip_leading: 4,
                skip_trailing: 0
            }
        );
        assert_eq!(config.outputs.combined, PathBuf::from("combinedscope.png"));
    }

    #[test]
    fn sequencer_directory_prefixes_relative_paths() {
        let config = ScopeConfig {
            sequencer_directory: Some(PathBuf::from("/data/seq")),
            ..ScopeConfig::default()
        };
        assert_eq!(
            config.resolve_sequencer_path(Path::new("readout.json")),
            PathBuf::from("/data/seq/readout.json")
        );
        assert_eq!(
            config.resolve_sequencer_path(Path::new("/tmp/readout.json")),
            PathBuf::from("/tmp/readout.json")
        );
        assert_eq!(
            ScopeConfig::default().resolve_sequencer_path(Path::new("readout.json")),
            PathBuf::from("readout.json")
        );
    }

    #[test]
    fn rejects_zero_extend() {
        assert!(matches!(
            ScopeConfig::from_json_str(r#"{ "extend": 0 }"#),
            Err(ScopeError::Config(_))
        ));
    }

    #[test]
    fn rejects_oversized_plot() {
        let config = ScopeConfig {
            plot_width: 70_000,
            plot_height: 70_000,
            ..ScopeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ScopeError::Config(_))));
        let edge = ScopeConfig {
            plot_width: MAX_PLOT_SIDE,
            ..ScopeConfig::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn line_window_follows_format() {
        let config = ScopeConfig::default();
        assert_eq!(config.line_window(ScanFormat::Structured), LineWindow::sensor_region());
        assert_eq!(config.line_window(ScanFormat::Raw), LineWindow::ALL);
    }
}
