//! Layout calculation for certificate pages
//!
//! This module handles the geometry of a page:
//! - Template image placement (cover or fit, centered)
//! - Field placement (alignment, shrink-to-fit, rotation, underline)

mod field;
mod placement;

pub use field::*;
pub use placement::*;
