//! Arabic-script presentation-form substitution backed by `ar_reshaper`.
//!
//! Each joining letter becomes the isolated, final, initial or medial form
//! its neighbours call for, and lam + alef fuse into the mandatory
//! ligature. Covers Arabic, Persian and Urdu letters.

use super::{ShapingUnavailable, TextShaper};

pub struct ArabicReshaper {
    inner: ar_reshaper::ArabicReshaper,
}

impl ArabicReshaper {
    /// Build the reshaper and check it joins a simple pair.
    pub fn load() -> Result<Self, ShapingUnavailable> {
        let reshaper = Self {
            inner: ar_reshaper::ArabicReshaper::default(),
        };

        let probe = "\u{0628}\u{0628}";
        let shaped = reshaper.shape(probe);
        if shaped != "\u{FE91}\u{FE90}" {
            return Err(ShapingUnavailable(format!(
                "reshaper probe turned {probe:?} into {shaped:?}"
            )));
        }
        Ok(reshaper)
    }
}

impl TextShaper for ArabicReshaper {
    fn shape(&self, logical: &str) -> String {
        self.inner.reshape(logical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reshaper() -> ArabicReshaper {
        ArabicReshaper::load().unwrap()
    }

    #[test]
    fn test_isolated_letter() {
        assert_eq!(reshaper().shape("\u{0628}"), "\u{FE8F}");
    }

    #[test]
    fn test_dual_joining_word() {
        // beh beh beh -> initial, medial, final
        assert_eq!(
            reshaper().shape("\u{0628}\u{0628}\u{0628}"),
            "\u{FE91}\u{FE92}\u{FE90}"
        );
    }

    #[test]
    fn test_right_joining_breaks_the_chain() {
        // alef never joins forward, so the last beh is isolated
        assert_eq!(
            reshaper().shape("\u{0628}\u{0627}\u{0628}"),
            "\u{FE91}\u{FE8E}\u{FE8F}"
        );
    }

    #[test]
    fn test_lam_alef_ligature() {
        assert_eq!(reshaper().shape("\u{0644}\u{0627}"), "\u{FEFB}");
        assert_eq!(reshaper().shape("\u{0633}\u{0644}\u{0627}"), "\u{FEB3}\u{FEFC}");
    }

    #[test]
    fn test_lam_alef_ligature_across_haraka() {
        // lam + fatha + alef still fuses
        let shaped = reshaper().shape("\u{0644}\u{064E}\u{0627}");
        assert!(shaped.contains('\u{FEFB}'), "{shaped:?}");
        assert!(!shaped.contains('\u{FEDF}'), "{shaped:?}");
    }

    #[test]
    fn test_urdu_letters() {
        // beh + yeh barree: initial beh, final yeh barree
        assert_eq!(reshaper().shape("\u{0628}\u{06D2}"), "\u{FE91}\u{FBAF}");
        // heh doachashmee alone
        assert_eq!(reshaper().shape("\u{06BE}"), "\u{FBAA}");
    }

    #[test]
    fn test_persian_letters() {
        // peh + keheh + yeh
        assert_eq!(
            reshaper().shape("\u{067E}\u{06A9}\u{06CC}"),
            "\u{FB58}\u{FB91}\u{FBFD}"
        );
    }

    #[test]
    fn test_non_arabic_passes_through() {
        assert_eq!(reshaper().shape("Ahmed 2024"), "Ahmed 2024");
        assert_eq!(reshaper().shape("\u{0628} \u{0628}"), "\u{FE8F} \u{FE8F}");
    }
}
