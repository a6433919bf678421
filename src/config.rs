use crate::error::{ReportError, Result};
use crate::pdf::font::{DEFAULT_FONT_PATH, DEFAULT_FONT_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "ot_report.json";

/// Settings of the console shell. Every field has a default, so a config
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub input_path: PathBuf,
    pub report_period: String,
    pub output_dir: PathBuf,
    pub font_path: PathBuf,
    pub font_url: String,
    pub currency_symbol: String,
    pub preview_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            input_path: PathBuf::from("OT_Data_Extracted.xlsx"),
            report_period: "01-10-2025 to 24-10-2025".to_string(),
            output_dir: PathBuf::from("."),
            font_path: PathBuf::from(DEFAULT_FONT_PATH),
            font_url: DEFAULT_FONT_URL.to_string(),
            currency_symbol: "₹".to_string(),
            preview_rows: 10,
        }
    }
}

impl ReportConfig {
    /// Load `path` if it exists, defaults otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(ReportConfig::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ReportError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ReportConfig = serde_json::from_str(&text).map_err(|e| ReportError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }
}
