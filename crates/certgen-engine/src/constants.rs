//! Shared constants for certificate generation
//!
//! This module centralizes the unit conventions and the magic numbers used
//! throughout the engine. Every coordinate that crosses a component boundary
//! goes through the conversions below, so they are exact linear scales with
//! no rounding; callers round (if at all) at the point of drawing.

// =============================================================================
// Unit Conversion
// =============================================================================

/// On-screen pixels per millimeter (96 DPI)
pub const MM_TO_PX: f32 = 3.779527559;

/// Document points per millimeter (1 inch = 72 points, 1 inch = 25.4mm)
pub const MM_TO_PT: f32 = 2.83464567;

/// Convert millimeters to on-screen pixels
#[inline]
pub fn mm_to_px(mm: f32) -> f32 {
    mm * MM_TO_PX
}

/// Convert on-screen pixels to millimeters
#[inline]
pub fn px_to_mm(px: f32) -> f32 {
    px / MM_TO_PX
}

/// Convert millimeters to document points
#[inline]
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * MM_TO_PT
}

/// Convert document points to millimeters
#[inline]
pub fn pt_to_mm(pt: f32) -> f32 {
    pt / MM_TO_PT
}

// =============================================================================
// Default Page Dimensions
// =============================================================================

/// Portrait paper used when no page size is supplied (A4)
pub const DEFAULT_PORTRAIT_MM: (f32, f32) = (210.0, 297.0);

/// Landscape paper used when no page size is supplied (A4 rotated)
pub const DEFAULT_LANDSCAPE_MM: (f32, f32) = (297.0, 210.0);

/// Resolution assumed for templates that carry no physical density
pub const FALLBACK_TEMPLATE_DPI: f32 = 300.0;

// =============================================================================
// Text Layout
// =============================================================================

/// Smallest size shrink-to-fit will ever pick (points)
pub const DEFAULT_MIN_FONT_SIZE: f32 = 6.0;

/// Largest font size a field may ask for (points)
pub const MAX_FONT_SIZE: f32 = 1000.0;

/// Font size for fields that do not specify one (points)
pub const DEFAULT_FONT_SIZE: f32 = 14.0;

/// Color for fields that do not specify one
pub const DEFAULT_FIELD_COLOR: &str = "#000000";

/// Distance from the baseline down to the underline (points)
pub const UNDERLINE_OFFSET: f32 = 2.0;

/// Underline thickness as a fraction of the effective font size
pub const UNDERLINE_THICKNESS_RATIO: f32 = 0.05;

// =============================================================================
// Batch Scheduling
// =============================================================================

/// Emit a progress notification every N finished rows (and after the last)
pub const PROGRESS_UPDATE_INTERVAL: usize = 5;

/// Yield to the host scheduler every N finished rows
pub const YIELD_INTERVAL: usize = 10;

/// Largest dataset a single job accepts
pub const MAX_ROWS: usize = 10_000;

// =============================================================================
// Template Format
// =============================================================================

/// The only accepted template container: PNG
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_px_round_trip() {
        for v in [0.0_f32, 1.0, 25.4, 210.0, 297.0, -12.5, 1234.567] {
            let back = px_to_mm(mm_to_px(v));
            assert!((back - v).abs() <= v.abs() * 1e-6 + 1e-6, "{v} -> {back}");
        }
    }

    #[test]
    fn test_mm_to_pt_is_linear() {
        assert_eq!(mm_to_pt(0.0), 0.0);
        assert!((mm_to_pt(1.0) - MM_TO_PT).abs() < f32::EPSILON);
        assert!((mm_to_pt(50.0) - 50.0 * MM_TO_PT).abs() < 1e-4);
        assert!((mm_to_pt(-10.0) + mm_to_pt(10.0)).abs() < 1e-6);
        assert!((pt_to_mm(mm_to_pt(297.0)) - 297.0).abs() < 1e-3);
    }

    #[test]
    fn test_a4_in_points() {
        // A4 height is the familiar ~842pt
        assert!((mm_to_pt(297.0) - 841.89).abs() < 0.01);
    }
}
