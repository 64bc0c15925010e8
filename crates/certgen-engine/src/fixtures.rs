//! Synthetic assets for tests, built with the `fixtures` feature
//!
//! `font()` builds a minimal TrueType file (cmap, head, hhea, hmtx, maxp)
//! covering printable ASCII and the Arabic blocks, with every glyph one
//! half-em wide. `template_png()` encodes a solid-color PNG. Neither has
//! outlines worth looking at; they exist so layout and PDF output can be
//! checked without binary assets in the tree.

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Units per em of the synthetic font
pub const UNITS_PER_EM: u16 = 1000;

/// Advance of every glyph, in font units
pub const ADVANCE: u16 = 500;

/// Advance of every glyph as a fraction of the font size
pub const ADVANCE_EM: f32 = ADVANCE as f32 / UNITS_PER_EM as f32;

/// Character ranges mapped by the synthetic font, in glyph order
const RANGES: &[(u32, u32)] = &[
    (0x0020, 0x007E),
    (0x0600, 0x06FF),
    (0xFB50, 0xFDFF),
    (0xFE70, 0xFEFF),
];

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Build the synthetic TrueType font.
pub fn font() -> Vec<u8> {
    let mapped: u32 = RANGES.iter().map(|(lo, hi)| hi - lo + 1).sum();
    let num_glyphs = (mapped + 1) as u16;

    let mut cmap = Vec::new();
    be16(&mut cmap, 0); // version
    be16(&mut cmap, 1); // one encoding record
    be16(&mut cmap, 3); // Windows
    be16(&mut cmap, 10); // UCS-4
    be32(&mut cmap, 12); // subtable offset
    be16(&mut cmap, 12); // format 12
    be16(&mut cmap, 0);
    be32(&mut cmap, 16 + 12 * RANGES.len() as u32);
    be32(&mut cmap, 0); // language
    be32(&mut cmap, RANGES.len() as u32);
    let mut next_gid = 1u32;
    for &(lo, hi) in RANGES {
        be32(&mut cmap, lo);
        be32(&mut cmap, hi);
        be32(&mut cmap, next_gid);
        next_gid += hi - lo + 1;
    }

    let mut head = Vec::new();
    be32(&mut head, 0x0001_0000); // version
    be32(&mut head, 0x0001_0000); // font revision
    be32(&mut head, 0); // checksum adjustment
    be32(&mut head, 0x5F0F_3CF5); // magic
    be16(&mut head, 0x000B); // flags
    be16(&mut head, UNITS_PER_EM);
    head.extend_from_slice(&[0; 16]); // created, modified
    be16(&mut head, 0); // xMin
    be16(&mut head, (-200i16) as u16); // yMin
    be16(&mut head, ADVANCE); // xMax
    be16(&mut head, 800); // yMax
    be16(&mut head, 0); // macStyle
    be16(&mut head, 8); // lowestRecPPEM
    be16(&mut head, 2); // fontDirectionHint
    be16(&mut head, 0); // indexToLocFormat
    be16(&mut head, 0); // glyphDataFormat

    let mut hhea = Vec::new();
    be32(&mut hhea, 0x0001_0000);
    be16(&mut hhea, 800); // ascender
    be16(&mut hhea, (-200i16) as u16); // descender
    be16(&mut hhea, 0); // line gap
    be16(&mut hhea, ADVANCE); // advanceWidthMax
    be16(&mut hhea, 0); // minLeftSideBearing
    be16(&mut hhea, 0); // minRightSideBearing
    be16(&mut hhea, ADVANCE); // xMaxExtent
    be16(&mut hhea, 1); // caretSlopeRise
    be16(&mut hhea, 0); // caretSlopeRun
    be16(&mut hhea, 0); // caretOffset
    hhea.extend_from_slice(&[0; 8]); // reserved
    be16(&mut hhea, 0); // metricDataFormat
    be16(&mut hhea, num_glyphs); // numberOfHMetrics

    let mut hmtx = Vec::new();
    for _ in 0..num_glyphs {
        be16(&mut hmtx, ADVANCE);
        be16(&mut hmtx, 0);
    }

    let mut maxp = Vec::new();
    be32(&mut maxp, 0x0000_5000);
    be16(&mut maxp, num_glyphs);

    // Table records must be sorted by tag
    let tables: [(&[u8; 4], Vec<u8>); 5] = [
        (b"cmap", cmap),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"maxp", maxp),
    ];

    let mut out = Vec::new();
    be32(&mut out, 0x0001_0000);
    be16(&mut out, tables.len() as u16);
    be16(&mut out, 64); // searchRange
    be16(&mut out, 2); // entrySelector
    be16(&mut out, 16); // rangeShift

    let mut offset = 12 + 16 * tables.len() as u32;
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        be32(&mut out, 0); // checksum
        be32(&mut out, offset);
        be32(&mut out, data.len() as u32);
        offset += (data.len() as u32).next_multiple_of(4);
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        out.resize(out.len().next_multiple_of(4), 0);
    }
    out
}

/// Encode a solid-color RGBA PNG of the given pixel size.
pub fn template_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([250, 245, 230, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_layout() {
        let bytes = font();
        assert_eq!(&bytes[..4], &[0, 1, 0, 0]);
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_png_signature() {
        let png = template_png(4, 3);
        assert_eq!(&png[..8], &crate::constants::PNG_SIGNATURE);
    }
}
