//! `--page` argument parsing

use certgen_engine::{Orientation, PageSize, PaperSize};
use std::str::FromStr;

/// Requested output page size
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageChoice {
    /// A4, landscape for wide templates
    Auto,
    /// Template pixel size at its recorded resolution
    Native,
    Paper(PaperSize),
    /// Explicit width x height in millimeters
    Custom(f32, f32),
}

impl FromStr for PageChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let paper = match lower.as_str() {
            "auto" => return Ok(PageChoice::Auto),
            "native" => return Ok(PageChoice::Native),
            "a3" => PaperSize::A3,
            "a4" => PaperSize::A4,
            "a5" => PaperSize::A5,
            "letter" => PaperSize::Letter,
            "legal" => PaperSize::Legal,
            "tabloid" => PaperSize::Tabloid,
            other => {
                let (w, h) = other
                    .split_once('x')
                    .ok_or_else(|| format!("Unknown page size '{s}'"))?;
                let w: f32 = w.trim().parse().map_err(|_| format!("Bad width in '{s}'"))?;
                let h: f32 = h.trim().parse().map_err(|_| format!("Bad height in '{s}'"))?;
                PageSize::new(w, h).validate().map_err(|e| e.to_string())?;
                return Ok(PageChoice::Custom(w, h));
            }
        };
        Ok(PageChoice::Paper(paper))
    }
}

impl PageChoice {
    /// Whether `--landscape` affects this choice
    pub fn has_orientation(self) -> bool {
        matches!(self, PageChoice::Paper(_) | PageChoice::Custom(..))
    }

    /// Fixed size for this choice, or `None` when it depends on the template.
    pub fn resolve(self, landscape: bool) -> Option<PageSize> {
        let orientation = if landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        match self {
            PageChoice::Auto | PageChoice::Native => None,
            PageChoice::Paper(paper) => Some(paper.page_size(orientation)),
            PageChoice::Custom(w, h) if landscape && h > w => Some(PageSize::new(h, w)),
            PageChoice::Custom(w, h) => Some(PageSize::new(w, h)),
        }
    }
}
