pub mod batch;
pub mod constants;
mod field;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod font;
pub mod layout;
mod options;
pub mod render;
pub mod shaping;
pub mod template;
mod types;

pub use batch::{
    CancelFlag, GenerationJob, GenerationOutput, Generator, NoProgress, OutputMode, Progress,
    ProgressSink, ResourceCache,
};
pub use field::*;
pub use font::{FontBytes, FontCache, FontFile, FontSource, TextMeasure, Typeface};
pub use layout::{PlacementMode, parse_hex_color, place_image, resolve_field_layout};
pub use options::*;
pub use shaping::{ShapingOptions, ShapingPipeline, TextShaper};
pub use template::{TemplateAsset, TemplateBytes, TemplateCache, TemplateFile, TemplateSource};
pub use types::*;
