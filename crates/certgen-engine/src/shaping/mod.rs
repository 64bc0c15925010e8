//! Text shaping: logical string in, visual string out
//!
//! Two stages run in order:
//! 1. Presentation-form substitution for connective scripts (`arabic`)
//! 2. Bidirectional visual reordering (`bidi`)
//!
//! Each stage is a capability chosen once when the pipeline is built. A
//! stage that cannot initialise is replaced by the identity shaper; text
//! still renders, only unjoined or in logical order.

mod arabic;
mod bidi;

pub use arabic::ArabicReshaper;
pub use bidi::BidiReorder;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Converts a logical string into the form that is drawn.
pub trait TextShaper: Send + Sync {
    fn shape(&self, logical: &str) -> String;
}

/// Why a shaping stage could not be brought up
#[derive(Debug, Clone)]
pub struct ShapingUnavailable(pub String);

impl fmt::Display for ShapingUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ShapingUnavailable {}

/// Pass-through shaper
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityShaper;

impl TextShaper for IdentityShaper {
    fn shape(&self, logical: &str) -> String {
        logical.to_string()
    }
}

/// Which shaping stages to enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingOptions {
    pub reshape: bool,
    pub reorder: bool,
}

impl Default for ShapingOptions {
    fn default() -> Self {
        Self {
            reshape: true,
            reorder: true,
        }
    }
}

/// Reshaping followed by reordering
pub struct ShapingPipeline {
    stages: Vec<Box<dyn TextShaper>>,
}

impl ShapingPipeline {
    /// Build the pipeline, degrading any stage that fails to load.
    pub fn new(options: ShapingOptions) -> Self {
        let mut pipeline = Self { stages: Vec::new() };
        if options.reshape {
            pipeline.push_stage("reshaping", ArabicReshaper::load());
        }
        if options.reorder {
            pipeline.push_stage("bidi reordering", BidiReorder::load());
        }
        pipeline
    }

    /// Assemble a pipeline from explicit stages
    pub fn from_stages(stages: Vec<Box<dyn TextShaper>>) -> Self {
        Self { stages }
    }

    fn push_stage<S: TextShaper + 'static>(
        &mut self,
        name: &str,
        loaded: Result<S, ShapingUnavailable>,
    ) {
        match loaded {
            Ok(stage) => self.stages.push(Box::new(stage)),
            Err(e) => {
                log::warn!("Text {name} unavailable, rendering unshaped: {e}");
                self.stages.push(Box::new(IdentityShaper));
            }
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl Default for ShapingPipeline {
    fn default() -> Self {
        Self::new(ShapingOptions::default())
    }
}

impl TextShaper for ShapingPipeline {
    fn shape(&self, logical: &str) -> String {
        self.stages
            .iter()
            .fold(logical.to_string(), |text, stage| stage.shape(&text))
    }
}

/// Per-job memo over a shared shaper.
///
/// Unbounded: distinct strings in one job are bounded by rows × fields,
/// and the memo is dropped when the job ends.
pub struct ShapeMemo {
    shaper: Arc<dyn TextShaper>,
    memo: HashMap<String, String>,
    hits: usize,
}

impl ShapeMemo {
    pub fn new(shaper: Arc<dyn TextShaper>) -> Self {
        Self {
            shaper,
            memo: HashMap::new(),
            hits: 0,
        }
    }

    pub fn shape(&mut self, logical: &str) -> &str {
        if self.memo.contains_key(logical) {
            self.hits += 1;
        } else {
            let visual = self.shaper.shape(logical);
            self.memo.insert(logical.to_string(), visual);
        }
        &self.memo[logical]
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl TextShaper for Counting {
        fn shape(&self, logical: &str) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            logical.to_uppercase()
        }
    }

    struct Broken;

    impl Broken {
        fn load() -> Result<Self, ShapingUnavailable> {
            Err(ShapingUnavailable("module missing".into()))
        }
    }

    impl TextShaper for Broken {
        fn shape(&self, _: &str) -> String {
            unreachable!("never installed")
        }
    }

    #[test]
    fn test_memo_shapes_each_string_once() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let mut memo = ShapeMemo::new(counting.clone());

        assert_eq!(memo.shape("abc"), "ABC");
        assert_eq!(memo.shape("abc"), "ABC");
        assert_eq!(memo.shape("xyz"), "XYZ");

        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
        assert_eq!(memo.len(), 2);
        assert_eq!(memo.hits(), 1);
    }

    #[test]
    fn test_failed_stage_degrades_to_identity() {
        let mut pipeline = ShapingPipeline::from_stages(Vec::new());
        pipeline.push_stage("broken", Broken::load());
        assert_eq!(pipeline.stage_count(), 1);
        assert_eq!(pipeline.shape("\u{0628}\u{0628}"), "\u{0628}\u{0628}");
    }

    #[test]
    fn test_pipeline_reshapes_then_reorders() {
        let pipeline = ShapingPipeline::default();
        // beh beh: joined forms, then reversed into display order
        assert_eq!(pipeline.shape("\u{0628}\u{0628}"), "\u{FE90}\u{FE91}");
    }

    #[test]
    fn test_disabled_stages() {
        let pipeline = ShapingPipeline::new(ShapingOptions {
            reshape: false,
            reorder: false,
        });
        assert_eq!(pipeline.stage_count(), 0);
        assert_eq!(pipeline.shape("\u{0628}\u{0628}"), "\u{0628}\u{0628}");
    }
}
