//! The bundled typeface: loading, metrics and the process-wide font cache
//!
//! One TrueType font is used for every field. Its bytes are obtained once
//! per process and parsed once into a `Typeface` holding everything the
//! layout and PDF writer need, so rows never touch the raw font again.

use crate::types::{GenerationError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use ttf_parser::{Face, GlyphId, name_id};

/// Measures shaped text, in points
pub trait TextMeasure {
    fn width_of_text_at_size(&self, text: &str, size: f32) -> f32;
}

/// Where font bytes come from
pub trait FontSource: Send + Sync {
    /// Human-readable origin, for logs and errors
    fn describe(&self) -> String;
    fn fetch(&self) -> std::io::Result<Vec<u8>>;
}

/// A font file on disk
#[derive(Debug, Clone)]
pub struct FontFile(pub PathBuf);

impl FontSource for FontFile {
    fn describe(&self) -> String {
        self.0.display().to_string()
    }

    fn fetch(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.0)
    }
}

/// Font bytes already in memory (bundled or fetched by the caller)
#[derive(Debug, Clone)]
pub struct FontBytes(pub Arc<[u8]>);

impl FontSource for FontBytes {
    fn describe(&self) -> String {
        format!("<{} bundled bytes>", self.0.len())
    }

    fn fetch(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.0.to_vec())
    }
}

/// A parsed font with the metrics needed for layout and embedding.
#[derive(Debug)]
pub struct Typeface {
    data: Arc<[u8]>,
    postscript_name: String,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    bbox: [i16; 4],
    glyphs: HashMap<char, u16>,
    advances: Vec<u16>,
}

impl Typeface {
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let data: Arc<[u8]> = data.into();
        let face = Face::parse(&data, 0)
            .map_err(|e| GenerationError::ResourceLoad(format!("Failed to parse font: {e}")))?;

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables.into_iter().filter(|s| s.is_unicode()) {
                subtable.codepoints(|cp| {
                    if let (Some(ch), Some(gid)) = (char::from_u32(cp), subtable.glyph_index(cp)) {
                        glyphs.entry(ch).or_insert(gid.0);
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(GenerationError::ResourceLoad(
                "Font has no Unicode character map".to_string(),
            ));
        }

        let advances = (0..face.number_of_glyphs())
            .map(|gid| face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0))
            .collect();

        let bbox = face.global_bounding_box();
        let postscript_name = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
            .map(|name| {
                name.chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                    .collect::<String>()
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "CertificateFont".to_string());

        let typeface = Self {
            postscript_name,
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            glyphs,
            advances,
            data: data.clone(),
        };
        log::debug!(
            "Parsed font {}: {} glyphs, {} mapped characters",
            typeface.postscript_name,
            typeface.advances.len(),
            typeface.glyphs.len()
        );
        Ok(typeface)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn postscript_name(&self) -> &str {
        &self.postscript_name
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn ascender(&self) -> i16 {
        self.ascender
    }

    pub fn descender(&self) -> i16 {
        self.descender
    }

    pub fn bbox(&self) -> [i16; 4] {
        self.bbox
    }

    pub fn glyph_count(&self) -> usize {
        self.advances.len()
    }

    /// Glyph for `ch`, or `.notdef` (0) when the font lacks it
    pub fn glyph_index(&self, ch: char) -> u16 {
        self.glyphs.get(&ch).copied().unwrap_or(0)
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }

    /// Advance of `gid` in font units
    pub fn advance(&self, gid: u16) -> u16 {
        self.advances.get(gid as usize).copied().unwrap_or(0)
    }

    /// Iterate the character map
    pub fn mapped_chars(&self) -> impl Iterator<Item = (char, u16)> + '_ {
        self.glyphs.iter().map(|(ch, gid)| (*ch, *gid))
    }

    /// Two-byte glyph ids for an Identity-H encoded string
    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .flat_map(|ch| self.glyph_index(ch).to_be_bytes())
            .collect()
    }
}

impl TextMeasure for Typeface {
    fn width_of_text_at_size(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|ch| self.advance(self.glyph_index(ch)) as u32)
            .sum();
        units as f32 * size / self.units_per_em as f32
    }
}

/// Process-lifetime font slot.
///
/// Filled by the first successful load and shared by every later job. A
/// failed load leaves the slot empty.
#[derive(Debug, Default)]
pub struct FontCache {
    slot: Mutex<Option<Arc<Typeface>>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, source: &dyn FontSource) -> Result<Arc<Typeface>> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| GenerationError::ResourceLoad("font cache poisoned".to_string()))?;
        if let Some(typeface) = slot.as_ref() {
            return Ok(typeface.clone());
        }

        log::info!("Loading font from {}", source.describe());
        let bytes = source.fetch().map_err(|e| {
            GenerationError::ResourceLoad(format!(
                "Failed to read font {}: {e}",
                source.describe()
            ))
        })?;
        let typeface = Arc::new(Typeface::parse(bytes)?);
        *slot = Some(typeface.clone());
        Ok(typeface)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}
