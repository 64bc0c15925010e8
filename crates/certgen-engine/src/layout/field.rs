//! Field layout: from a field in millimeters to drawable geometry in points
//!
//! Fields are authored in the editor as top-left anchors measured from the
//! top of the page. The document origin is the bottom-left corner and text is
//! drawn from its baseline, so the vertical position is approximated as
//! `page_height - y - font_size`. This matches the editor preview and is kept
//! as is.

use crate::constants::{DEFAULT_MIN_FONT_SIZE, UNDERLINE_OFFSET, UNDERLINE_THICKNESS_RATIO, mm_to_pt};
use crate::field::{Align, Field};
use crate::font::TextMeasure;

/// Page-level inputs to field layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutContext {
    pub page_height_pt: f32,
    /// Field-local scale, applied to font size and letter spacing
    pub scale: f32,
    /// Global shrink-to-fit floor (points)
    pub min_font_size: f32,
}

impl LayoutContext {
    pub fn new(page_height_pt: f32) -> Self {
        Self {
            page_height_pt,
            scale: 1.0,
            min_font_size: DEFAULT_MIN_FONT_SIZE,
        }
    }
}

/// RGB color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
}

/// Parse `#rgb` or `#rrggbb`. Anything else is black.
pub fn parse_hex_color(color: &str) -> Rgb {
    let Some(hex) = color.trim().strip_prefix('#') else {
        return Rgb::BLACK;
    };
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Rgb::BLACK;
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).map(|v| v as f32 / 255.0).unwrap_or(0.0);
    match hex.len() {
        3 => {
            let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
            Rgb {
                r: expand(0),
                g: expand(1),
                b: expand(2),
            }
        }
        6 => Rgb {
            r: channel(&hex[0..2]),
            g: channel(&hex[2..4]),
            b: channel(&hex[4..6]),
        },
        _ => Rgb::BLACK,
    }
}

/// One string drawn at one x position on the field's baseline
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
}

/// Underline stroke, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Underline {
    pub x1: f32,
    pub x2: f32,
    pub y: f32,
    pub thickness: f32,
}

/// Clockwise rotation around a pivot, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub degrees: f32,
    pub pivot_x: f32,
    pub pivot_y: f32,
}

impl Rotation {
    /// Content-stream matrix `[a b c d e f]` rotating around the pivot
    pub fn matrix(&self) -> [f32; 6] {
        let (sin, cos) = self.degrees.to_radians().sin_cos();
        // Clockwise with the y axis pointing up
        let (a, b, c, d) = (cos, -sin, sin, cos);
        let e = self.pivot_x - a * self.pivot_x - c * self.pivot_y;
        let f = self.pivot_y - b * self.pivot_x - d * self.pivot_y;
        [a, b, c, d, e, f]
    }
}

/// Resolved geometry of one field on one page
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub font_size: f32,
    /// Left edge of the text after alignment
    pub x: f32,
    /// Baseline
    pub y: f32,
    /// Measured width at the effective size, letter spacing included
    pub width: f32,
    /// One run for plain text, one per character under letter spacing
    pub runs: Vec<TextRun>,
    pub underline: Option<Underline>,
    pub rotation: Option<Rotation>,
    pub color: Rgb,
    /// Present only below full opacity
    pub opacity: Option<f32>,
}

impl FieldLayout {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Lay out already-shaped `text` for `field`.
pub fn resolve_field_layout(
    field: &Field,
    text: &str,
    measure: &dyn TextMeasure,
    ctx: &LayoutContext,
) -> FieldLayout {
    let anchor_x = mm_to_pt(field.x);
    let nominal = field.font_size * ctx.scale;
    let spacing = field.letter_spacing * ctx.scale;

    let measure_at = |size: f32| measured_width(text, size, spacing, measure);

    let mut font_size = nominal;
    let mut width = measure_at(nominal);
    if let Some(max_width_mm) = field.max_width_mm.filter(|w| *w > 0.0) {
        let max_width = mm_to_pt(max_width_mm);
        if width > max_width {
            let floor = field
                .min_font_size
                .map_or(ctx.min_font_size, |m| m.max(ctx.min_font_size));
            font_size = shrink_to_fit(nominal, floor, max_width, &measure_at);
            width = measure_at(font_size);
        }
    }

    let x = anchor_x - alignment_shift(field.align, width);
    let y = ctx.page_height_pt - mm_to_pt(field.y) - font_size;

    let runs = if spacing != 0.0 {
        let mut cursor = x;
        text.chars()
            .map(|ch| {
                let run = TextRun {
                    text: ch.to_string(),
                    x: cursor,
                };
                cursor += measure.width_of_text_at_size(&run.text, font_size) + spacing;
                run
            })
            .collect()
    } else {
        vec![TextRun {
            text: text.to_string(),
            x,
        }]
    };

    let underline = field.underline.then(|| Underline {
        x1: x,
        x2: x + width,
        y: y - UNDERLINE_OFFSET,
        thickness: font_size * UNDERLINE_THICKNESS_RATIO,
    });

    let rotation = field
        .rotation
        .filter(|r| r.is_finite() && *r != 0.0)
        .map(|degrees| Rotation {
            degrees,
            pivot_x: anchor_x,
            pivot_y: y + font_size / 2.0,
        });

    let opacity = (field.opacity.is_finite() && field.opacity < 1.0).then(|| field.opacity.max(0.0));

    FieldLayout {
        font_size,
        x,
        y,
        width,
        runs,
        underline,
        rotation,
        color: parse_hex_color(&field.color),
        opacity,
    }
}

fn measured_width(text: &str, size: f32, spacing: f32, measure: &dyn TextMeasure) -> f32 {
    let width = measure.width_of_text_at_size(text, size);
    let gaps = text.chars().count().saturating_sub(1) as f32;
    width + spacing * gaps
}

fn alignment_shift(align: Align, width: f32) -> f32 {
    match align {
        Align::Left => 0.0,
        Align::Center => width / 2.0,
        Align::Right => width,
    }
}

/// Largest whole point size below `nominal` whose width fits, else `floor`.
///
/// A floor above the nominal size leaves the nominal size alone. Width grows
/// with size, so the integer range is binary searched.
fn shrink_to_fit(nominal: f32, floor: f32, max_width: f32, measure_at: &dyn Fn(f32) -> f32) -> f32 {
    if floor >= nominal {
        return nominal;
    }

    let mut hi = if nominal.fract() == 0.0 {
        nominal as i64 - 1
    } else {
        nominal.floor() as i64
    };
    let mut lo = floor.ceil() as i64;

    let mut best = None;
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        if measure_at(mid as f32) <= max_width {
            best = Some(mid);
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }
    best.map_or(floor, |size| size as f32)
}
