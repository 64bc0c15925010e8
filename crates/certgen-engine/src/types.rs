use crate::constants::{DEFAULT_LANDSCAPE_MM, DEFAULT_PORTRAIT_MM, mm_to_pt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
    #[error("Failed to load resource: {0}")]
    ResourceLoad(String),
    #[error("Generation cancelled")]
    Cancelled,
    #[error("Failed to render row {row}: {message}")]
    RowRender { row: usize, message: String },
    #[error("No rows to generate")]
    EmptyDataset,
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl GenerationError {
    /// Cancellation is an outcome, not a failure; callers branch on this.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Paper orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Portrait: height > width
    #[default]
    Portrait,
    /// Landscape: width > height
    Landscape,
}

/// Standard paper sizes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaperSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl PaperSize {
    /// Get base dimensions (always portrait)
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PaperSize::A3 => (297.0, 420.0),
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::A5 => (148.0, 210.0),
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::Legal => (215.9, 355.6),
            PaperSize::Tabloid => (279.4, 431.8),
        }
    }

    /// Page size with orientation applied
    pub fn page_size(self, orientation: Orientation) -> PageSize {
        let (w, h) = self.dimensions_mm();
        match orientation {
            Orientation::Portrait => PageSize::new(w, h),
            Orientation::Landscape => PageSize::new(h, w),
        }
    }
}

/// Output page size in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageSize {
    pub fn new(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }

    /// Default paper for a template with no explicit size: A4, turned
    /// landscape when the image is wider than it is tall.
    pub fn for_template(width_px: u32, height_px: u32) -> Self {
        let (w, h) = if width_px > height_px {
            DEFAULT_LANDSCAPE_MM
        } else {
            DEFAULT_PORTRAIT_MM
        };
        Self::new(w, h)
    }

    pub fn width_pt(&self) -> f32 {
        mm_to_pt(self.width_mm)
    }

    pub fn height_pt(&self) -> f32 {
        mm_to_pt(self.height_mm)
    }

    pub fn orientation(&self) -> Orientation {
        if self.width_mm > self.height_mm {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.width_mm.is_finite() && self.height_mm.is_finite())
            || self.width_mm <= 0.0
            || self.height_mm <= 0.0
        {
            return Err(GenerationError::Config(format!(
                "Page size must be positive, got {}x{}mm",
                self.width_mm, self.height_mm
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_follows_template_aspect() {
        assert_eq!(PageSize::for_template(2480, 3508), PageSize::new(210.0, 297.0));
        assert_eq!(PageSize::for_template(3508, 2480), PageSize::new(297.0, 210.0));
        // Square images stay portrait
        assert_eq!(PageSize::for_template(1000, 1000), PageSize::new(210.0, 297.0));
    }

    #[test]
    fn test_paper_orientation() {
        let page = PaperSize::Letter.page_size(Orientation::Landscape);
        assert_eq!(page, PageSize::new(279.4, 215.9));
        assert_eq!(page.orientation(), Orientation::Landscape);
    }

    #[test]
    fn test_page_validation() {
        assert!(PageSize::new(210.0, 297.0).validate().is_ok());
        assert!(PageSize::new(0.0, 297.0).validate().is_err());
        assert!(PageSize::new(210.0, f32::NAN).validate().is_err());
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(GenerationError::Cancelled.is_cancelled());
        assert!(!GenerationError::EmptyDataset.is_cancelled());
    }
}
