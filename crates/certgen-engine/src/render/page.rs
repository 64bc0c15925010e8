//! Rendering of one certificate page

use crate::constants::mm_to_pt;
use crate::field::{Field, Row};
use crate::font::TextMeasure;
use crate::layout::{LayoutContext, PlacementMode, place_image, resolve_field_layout};
use crate::shaping::ShapeMemo;
use crate::types::{PageSize, Result};

use super::canvas::{Canvas, ImageDraw, LineDraw, TextDraw};

/// Page-wide settings, identical for every row of a job
#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    pub page: PageSize,
    /// Template size in pixels
    pub template_width: u32,
    pub template_height: u32,
    pub placement: PlacementMode,
    pub min_font_size: f32,
}

impl PageSpec {
    fn image_draw(&self) -> ImageDraw {
        let placed = place_image(
            self.template_width,
            self.template_height,
            &self.page,
            self.placement,
        );
        ImageDraw {
            x: mm_to_pt(placed.x_mm),
            y: mm_to_pt(placed.y_mm),
            width: mm_to_pt(placed.width_mm),
            height: mm_to_pt(placed.height_mm),
            clip_width: self.page.width_pt(),
            clip_height: self.page.height_pt(),
        }
    }

    fn layout_context(&self) -> LayoutContext {
        LayoutContext {
            min_font_size: self.min_font_size,
            ..LayoutContext::new(self.page.height_pt())
        }
    }
}

/// Draw the template, then every enabled, non-empty field in list order.
///
/// Returns the number of fields drawn.
pub fn render_page(
    canvas: &mut dyn Canvas,
    spec: &PageSpec,
    row: &Row,
    fields: &[Field],
    shaper: &mut ShapeMemo,
    measure: &dyn TextMeasure,
) -> Result<usize> {
    canvas.draw_image(&spec.image_draw())?;

    let ctx = spec.layout_context();
    let mut drawn = 0;
    for field in fields.iter().filter(|f| f.enabled) {
        let text = field.resolve_text(row);
        if text.is_empty() {
            continue;
        }

        let layout = resolve_field_layout(field, shaper.shape(&text), measure, &ctx);
        let transform = layout.rotation.map(|r| r.matrix());

        canvas.draw_text(&TextDraw {
            runs: layout.runs,
            y: layout.y,
            font_size: layout.font_size,
            color: layout.color,
            opacity: layout.opacity,
            transform,
        })?;

        if let Some(underline) = layout.underline {
            canvas.draw_line(&LineDraw {
                from: (underline.x1, underline.y),
                to: (underline.x2, underline.y),
                thickness: underline.thickness,
                color: layout.color,
                opacity: layout.opacity,
                transform,
            })?;
        }
        drawn += 1;
    }
    Ok(drawn)
}
