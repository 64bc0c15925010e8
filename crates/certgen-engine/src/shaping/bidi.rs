//! Visual reordering with the Unicode Bidirectional Algorithm (UAX#9).
//!
//! PDF text operators draw glyphs left to right, so right-to-left runs have
//! to be reversed into display order before they reach the page. Embedded
//! left-to-right runs (Latin names, digits) keep their own order.

use super::{ShapingUnavailable, TextShaper};
use unicode_bidi::BidiInfo;

#[derive(Debug, Clone, Default)]
pub struct BidiReorder;

impl BidiReorder {
    /// Probe the algorithm once so a broken build degrades at construction
    /// time rather than on the first row.
    pub fn load() -> Result<Self, ShapingUnavailable> {
        let probe = "\u{05D0}a";
        let reordered = reorder(probe);
        if reordered != "a\u{05D0}" {
            return Err(ShapingUnavailable(format!(
                "bidi probe reordered {probe:?} to {reordered:?}"
            )));
        }
        Ok(Self)
    }
}

fn reorder(text: &str) -> String {
    let info = BidiInfo::new(text, None);
    if !info.has_rtl() {
        return text.to_string();
    }

    info.paragraphs
        .iter()
        .map(|para| info.reorder_line(para, para.range.clone()))
        .collect()
}

impl TextShaper for BidiReorder {
    fn shape(&self, logical: &str) -> String {
        reorder(logical)
    }
}
