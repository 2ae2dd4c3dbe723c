//! Configuration types for the RC lab plotting pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::processors::alignment::MatchStrategy;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// File naming and column naming for the two capture channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Filename suffix of the input-voltage channel
    #[serde(default = "default_input_suffix")]
    pub input_suffix: String,

    /// Filename suffix of the capacitor-voltage channel
    #[serde(default = "default_cap_suffix")]
    pub cap_suffix: String,

    /// Exact header of the timestamp column (leading space included)
    #[serde(default = "default_time_column")]
    pub time_column: String,

    /// Exact header of the calibrated value column
    #[serde(default = "default_value_column")]
    pub value_column: String,
}

fn default_input_suffix() -> String {
    "Ana7_input.csv".to_string()
}

fn default_cap_suffix() -> String {
    "Ana8_cap.csv".to_string()
}

fn default_time_column() -> String {
    " time".to_string()
}

fn default_value_column() -> String {
    " cal[0]".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            input_suffix: default_input_suffix(),
            cap_suffix: default_cap_suffix(),
            time_column: default_time_column(),
            value_column: default_value_column(),
        }
    }
}

/// How the capacitor channel is matched onto the input channel's time axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentConfig {
    #[serde(default)]
    pub strategy: MatchStrategy,

    /// Maximum time distance (seconds) accepted for a match
    #[serde(default)]
    pub tolerance: Option<f64>,
}

impl AlignmentConfig {
    /// Reject a negative or non-finite tolerance.
    pub fn validate(&self) -> Result<()> {
        if let Some(tol) = self.tolerance {
            if !tol.is_finite() || tol < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "alignment tolerance must be a non-negative number, got {}",
                    tol
                )));
            }
        }
        Ok(())
    }
}

/// Optional preprocessing applied between reading and alignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Drop leading/trailing rows whose calibrated value is exactly zero
    #[serde(default)]
    pub trim_zero_edges: bool,
}

/// Figure geometry and labeling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Width of the figure in inches
    #[serde(default = "default_panel_width")]
    pub panel_width_in: f64,

    /// Height of one panel in inches
    #[serde(default = "default_panel_height")]
    pub panel_height_in: f64,

    /// Panel titles are the job label cut at the first occurrence of this marker
    #[serde(default = "default_title_marker")]
    pub title_marker: String,

    /// Render captions, axis labels and legends (needs system fonts)
    #[serde(default = "default_draw_text")]
    pub draw_text: bool,
}

fn default_dpi() -> u32 {
    300
}

fn default_panel_width() -> f64 {
    10.0
}

fn default_panel_height() -> f64 {
    5.0
}

fn default_title_marker() -> String {
    ", Ana".to_string()
}

fn default_draw_text() -> bool {
    true
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            panel_width_in: default_panel_width(),
            panel_height_in: default_panel_height(),
            title_marker: default_title_marker(),
            draw_text: default_draw_text(),
        }
    }
}

impl PlotConfig {
    /// Pixel dimensions of a figure holding `panels` stacked panels.
    pub fn figure_size(&self, panels: usize) -> (u32, u32) {
        let dpi = self.dpi as f64;
        let width = (self.panel_width_in * dpi).round() as u32;
        let height = (self.panel_height_in * dpi * panels.max(1) as f64).round() as u32;
        (width.max(1), height.max(1))
    }
}

/// One experiment configuration: a subfolder of the data root plus its resistances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentFolder {
    pub name: String,

    /// Positional resistances (ohms); panel `i` reads entry `2 * i`
    #[serde(default)]
    pub resistances: Vec<f64>,

    /// Resistance (ohms) keyed by pair prefix; takes precedence over `resistances`
    #[serde(default)]
    pub pair_resistances: BTreeMap<String, f64>,
}

impl ExperimentFolder {
    pub fn new(name: impl Into<String>, resistances: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            resistances,
            pair_resistances: BTreeMap::new(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("RC Lab data Raw")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_folders() -> Vec<ExperimentFolder> {
    vec![
        ExperimentFolder::new("change capacitor (1kohm, series, 3.3v)", vec![1000.0; 6]),
        ExperimentFolder::new(
            "change resistor (47uF, series, 3.3v)",
            vec![
                15000.0, 15000.0, 330000.0, 330000.0, 47.0, 47.0, 680.0, 680.0,
            ],
        ),
        ExperimentFolder::new("change voltage (47uF, 1kohm, series)", vec![1000.0; 8]),
    ]
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding one subfolder per experiment
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Where figures are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_folders")]
    pub folders: Vec<ExperimentFolder>,

    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub alignment: AlignmentConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            output_dir: default_output_dir(),
            folders: default_folders(),
            channels: ChannelConfig::default(),
            alignment: AlignmentConfig::default(),
            processing: ProcessingConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up an experiment folder by name.
    pub fn folder(&self, name: &str) -> Option<&ExperimentFolder> {
        self.folders.iter().find(|f| f.name == name)
    }

    /// Reject settings that would produce meaningless output.
    pub fn validate(&self) -> Result<()> {
        if self.channels.input_suffix.is_empty() || self.channels.cap_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "channel suffixes must not be empty".to_string(),
            ));
        }
        if self.channels.input_suffix == self.channels.cap_suffix {
            return Err(ConfigError::Invalid(
                "input and capacitor suffixes must differ".to_string(),
            ));
        }

        self.alignment.validate()?;

        if self.plot.dpi == 0 {
            return Err(ConfigError::Invalid("plot dpi must be positive".to_string()));
        }
        if !(self.plot.panel_width_in > 0.0 && self.plot.panel_height_in > 0.0) {
            return Err(ConfigError::Invalid(
                "panel dimensions must be positive".to_string(),
            ));
        }

        for folder in &self.folders {
            let positional = folder.resistances.iter();
            let by_prefix = folder.pair_resistances.values();
            if let Some(bad) = positional.chain(by_prefix).find(|r| !(r.is_finite() && **r > 0.0)) {
                return Err(ConfigError::Invalid(format!(
                    "folder '{}' has non-positive resistance {}",
                    folder.name, bad
                )));
            }
        }

        Ok(())
    }
}
