use crate::constants::{DEFAULT_MIN_FONT_SIZE, MAX_ROWS, PROGRESS_UPDATE_INTERVAL, YIELD_INTERVAL};
use crate::layout::PlacementMode;
use crate::shaping::ShapingOptions;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Engine-wide generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationOptions {
    /// How the template image is scaled onto the page
    pub placement: PlacementMode,

    /// Global shrink-to-fit floor in points
    pub min_font_size: f32,

    // Scheduling
    pub progress_interval: usize,
    pub yield_interval: usize,

    pub shaping: ShapingOptions,

    /// Document title written to the PDF info dictionary
    pub title: String,

    /// Largest dataset accepted by one job
    pub max_rows: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            placement: PlacementMode::Cover,
            min_font_size: DEFAULT_MIN_FONT_SIZE,
            progress_interval: PROGRESS_UPDATE_INTERVAL,
            yield_interval: YIELD_INTERVAL,
            shaping: ShapingOptions::default(),
            title: "Certificates".to_string(),
            max_rows: MAX_ROWS,
        }
    }
}

impl GenerationOptions {
    /// Load options from JSON file
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| GenerationError::Config(format!("Failed to parse config: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GenerationError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if !self.min_font_size.is_finite() || self.min_font_size <= 0.0 {
            return Err(GenerationError::Config(format!(
                "Minimum font size must be positive, got {}",
                self.min_font_size
            )));
        }

        if self.progress_interval == 0 || self.yield_interval == 0 {
            return Err(GenerationError::Config(
                "Progress and yield intervals must be at least 1".to_string(),
            ));
        }

        if self.max_rows == 0 {
            return Err(GenerationError::Config(
                "Row limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
