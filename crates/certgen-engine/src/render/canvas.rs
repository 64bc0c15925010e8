//! Drawing primitives shared by the page renderer and its backends
//!
//! All coordinates are document points with the origin at the bottom-left
//! corner of the page.

use crate::layout::{Rgb, TextRun};
use crate::types::Result;

/// Template image covering (or fitting) the page
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDraw {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Page box the image is clipped to
    pub clip_width: f32,
    pub clip_height: f32,
}

/// Text on one baseline, possibly split into per-character runs
#[derive(Debug, Clone, PartialEq)]
pub struct TextDraw {
    pub runs: Vec<TextRun>,
    pub y: f32,
    pub font_size: f32,
    pub color: Rgb,
    pub opacity: Option<f32>,
    /// Extra transform applied around the draw (rotation)
    pub transform: Option<[f32; 6]>,
}

/// A straight stroke
#[derive(Debug, Clone, PartialEq)]
pub struct LineDraw {
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub thickness: f32,
    pub color: Rgb,
    pub opacity: Option<f32>,
    pub transform: Option<[f32; 6]>,
}

/// A drawing surface for one page
pub trait Canvas {
    fn draw_image(&mut self, image: &ImageDraw) -> Result<()>;
    fn draw_text(&mut self, text: &TextDraw) -> Result<()>;
    fn draw_line(&mut self, line: &LineDraw) -> Result<()>;
}

/// Any draw call, as recorded by [`RecordingCanvas`]
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Image(ImageDraw),
    Text(TextDraw),
    Line(LineDraw),
}

/// Canvas that keeps every call instead of drawing
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> impl Iterator<Item = &TextDraw> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text(t) => Some(t),
            _ => None,
        })
    }

    /// Concatenated run text of each text draw, in draw order
    pub fn strings(&self) -> Vec<String> {
        self.texts()
            .map(|t| t.runs.iter().map(|r| r.text.as_str()).collect())
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    fn draw_image(&mut self, image: &ImageDraw) -> Result<()> {
        self.commands.push(DrawCommand::Image(image.clone()));
        Ok(())
    }

    fn draw_text(&mut self, text: &TextDraw) -> Result<()> {
        self.commands.push(DrawCommand::Text(text.clone()));
        Ok(())
    }

    fn draw_line(&mut self, line: &LineDraw) -> Result<()> {
        self.commands.push(DrawCommand::Line(line.clone()));
        Ok(())
    }
}
