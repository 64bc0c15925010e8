//! Page rendering
//!
//! - `canvas`: drawing primitives and the `Canvas` trait
//! - `page`: one certificate page from a row and the field list
//! - `pdf`: the lopdf-backed document writer

mod canvas;
mod page;
mod pdf;

pub use canvas::*;
pub use page::*;
pub use pdf::{DocumentBuilder, FontPayload, PdfCanvas};
