//! Template image placement on the page
//!
//! The template keeps its aspect ratio and is centered on the page. Under
//! `Cover` it is scaled until both axes are filled, so the overflowing axis
//! gets a negative offset and is clipped when drawn. Under `Fit` it is
//! scaled until it fits entirely, leaving margins on one axis.

use crate::types::PageSize;
use serde::{Deserialize, Serialize};

/// How the template image is scaled onto the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementMode {
    /// Fill the page, cropping overflow (preserve aspect ratio)
    #[default]
    Cover,
    /// Fit inside the page, letterboxing (preserve aspect ratio)
    Fit,
}

/// Where the scaled template lands, in millimeters from the bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    /// Millimeters per image pixel
    pub scale: f32,
}

impl ImagePlacement {
    /// True when part of the image falls outside the page
    pub fn overflows(&self) -> bool {
        self.x_mm < 0.0 || self.y_mm < 0.0
    }
}

/// Place an image of `native_w`×`native_h` pixels on `page`.
pub fn place_image(native_w: u32, native_h: u32, page: &PageSize, mode: PlacementMode) -> ImagePlacement {
    let scale = calculate_scale(
        native_w as f32,
        native_h as f32,
        page.width_mm,
        page.height_mm,
        mode,
    );

    let width_mm = native_w as f32 * scale;
    let height_mm = native_h as f32 * scale;

    ImagePlacement {
        x_mm: (page.width_mm - width_mm) / 2.0,
        y_mm: (page.height_mm - height_mm) / 2.0,
        width_mm,
        height_mm,
        scale,
    }
}

fn calculate_scale(
    src_width: f32,
    src_height: f32,
    target_width: f32,
    target_height: f32,
    mode: PlacementMode,
) -> f32 {
    let scale_w = target_width / src_width;
    let scale_h = target_height / src_height;
    match mode {
        PlacementMode::Cover => scale_w.max(scale_h),
        PlacementMode::Fit => scale_w.min(scale_h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    #[test]
    fn test_matching_aspect_fills_exactly() {
        // A4 at 300 DPI on A4
        let page = PageSize::new(210.0, 297.0);
        for mode in [PlacementMode::Cover, PlacementMode::Fit] {
            let p = place_image(2480, 3508, &page, mode);
            assert!(p.x_mm.abs() < 0.1 && p.y_mm.abs() < 0.1, "{mode:?}: {p:?}");
            assert!((p.width_mm - 210.0).abs() < 0.1);
        }
    }

    #[test]
    fn test_cover_overflows_and_centers() {
        // Square image on portrait A4: height governs, width overflows
        let page = PageSize::new(210.0, 297.0);
        let p = place_image(1000, 1000, &page, PlacementMode::Cover);

        assert!((p.height_mm - 297.0).abs() < EPS);
        assert!((p.width_mm - 297.0).abs() < EPS);
        assert!((p.x_mm - (210.0 - 297.0) / 2.0).abs() < EPS);
        assert!(p.y_mm.abs() < EPS);
        assert!(p.overflows());
    }

    #[test]
    fn test_fit_letterboxes() {
        let page = PageSize::new(210.0, 297.0);
        let p = place_image(1000, 1000, &page, PlacementMode::Fit);

        assert!((p.width_mm - 210.0).abs() < EPS);
        assert!((p.y_mm - (297.0 - 210.0) / 2.0).abs() < EPS);
        assert!(!p.overflows());
    }

    #[test]
    fn test_default_is_cover() {
        assert_eq!(PlacementMode::default(), PlacementMode::Cover);
    }
}
