//! Template images and their fingerprint-keyed cache
//!
//! A template is one PNG. Its raw bytes and pixel size (read straight from
//! the IHDR header) are cached under a cheap fingerprint, and the pixel
//! planes used for embedding are decoded at most once per cached asset.

use crate::constants::{FALLBACK_TEMPLATE_DPI, PNG_SIGNATURE};
use crate::types::{GenerationError, PageSize, Result};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::UNIX_EPOCH;

/// Identity of a template file without reading its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub size: u64,
    /// Modification time, nanoseconds since the Unix epoch
    pub modified: u128,
}

/// Where template bytes come from
pub trait TemplateSource: Send + Sync {
    fn describe(&self) -> String;
    fn fingerprint(&self) -> Result<Fingerprint>;
    fn read(&self) -> Result<Vec<u8>>;
}

/// A template file on disk, fingerprinted by size and modification time
#[derive(Debug, Clone)]
pub struct TemplateFile(pub PathBuf);

impl TemplateSource for TemplateFile {
    fn describe(&self) -> String {
        self.0.display().to_string()
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        let meta = std::fs::metadata(&self.0)?;
        let modified = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(Fingerprint {
            size: meta.len(),
            modified,
        })
    }

    fn read(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.0)?)
    }
}

/// Template bytes handed over in memory (an upload, a test fixture).
///
/// `modified` plays the role of the file timestamp; callers bump it when
/// the content changes.
#[derive(Debug, Clone)]
pub struct TemplateBytes {
    pub bytes: Arc<[u8]>,
    pub modified: u128,
}

impl TemplateBytes {
    pub fn new(bytes: impl Into<Arc<[u8]>>, modified: u128) -> Self {
        Self {
            bytes: bytes.into(),
            modified,
        }
    }
}

impl TemplateSource for TemplateBytes {
    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.bytes.len())
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        Ok(Fingerprint {
            size: self.bytes.len() as u64,
            modified: self.modified,
        })
    }

    fn read(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.to_vec())
    }
}

/// Compressed pixel planes ready to become an image XObject
#[derive(Debug)]
pub struct ImagePlanes {
    /// Zlib-compressed 8-bit RGB samples
    pub rgb: Vec<u8>,
    /// Zlib-compressed 8-bit alpha samples, when the image is not opaque
    pub alpha: Option<Vec<u8>>,
}

/// A validated template, shared by every document of every job using it
#[derive(Debug)]
pub struct TemplateAsset {
    pub fingerprint: Fingerprint,
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    planes: OnceLock<Arc<ImagePlanes>>,
}

impl TemplateAsset {
    /// Validate the signature and read the pixel size from the header.
    pub fn from_bytes(fingerprint: Fingerprint, bytes: Vec<u8>) -> Result<Self> {
        let (width, height) = png_dimensions(&bytes)?;
        Ok(Self {
            fingerprint,
            bytes: bytes.into(),
            width,
            height,
            planes: OnceLock::new(),
        })
    }

    /// Decoded, compressed pixel data; decoded on first use only.
    pub fn planes(&self) -> Result<Arc<ImagePlanes>> {
        if let Some(planes) = self.planes.get() {
            return Ok(planes.clone());
        }
        let planes = Arc::new(decode_planes(&self.bytes)?);
        // A concurrent caller may have won the race; keep whichever landed
        Ok(self.planes.get_or_init(|| planes).clone())
    }

    /// Physical size from the PNG `pHYs` chunk, assuming 300 DPI without one
    pub fn physical_size(&self) -> PageSize {
        let px_per_mm = png_pixels_per_mm(&self.bytes).unwrap_or(FALLBACK_TEMPLATE_DPI / 25.4);
        PageSize::new(
            self.width as f32 / px_per_mm,
            self.height as f32 / px_per_mm,
        )
    }
}

/// Check the PNG signature and read width/height from IHDR
pub fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    if bytes.len() < 8 || bytes[..8] != PNG_SIGNATURE {
        return Err(GenerationError::InvalidTemplate(
            "template is not a PNG image".to_string(),
        ));
    }
    // signature, then the IHDR chunk: length, type, width, height
    if bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return Err(GenerationError::InvalidTemplate(
            "PNG header is truncated".to_string(),
        ));
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    if width == 0 || height == 0 {
        return Err(GenerationError::InvalidTemplate(format!(
            "PNG has empty dimensions {width}x{height}"
        )));
    }
    Ok((width, height))
}

/// Pixels per millimeter declared by the `pHYs` chunk, if any
pub fn png_pixels_per_mm(bytes: &[u8]) -> Option<f32> {
    let mut pos = 8;
    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().ok()?) as usize;
        let kind = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        if kind == b"IDAT" || kind == b"IEND" {
            return None;
        }
        if kind == b"pHYs" && len >= 9 && data_start + 9 <= bytes.len() {
            let chunk = &bytes[data_start..data_start + 9];
            let px_per_unit_x = u32::from_be_bytes(chunk[0..4].try_into().ok()?);
            // unit 1 = meter; 0 only gives an aspect ratio
            if chunk[8] != 1 || px_per_unit_x == 0 {
                return None;
            }
            return Some(px_per_unit_x as f32 / 1000.0);
        }
        // length, type, data, crc
        pos = data_start.checked_add(len)?.checked_add(4)?;
    }
    None
}

fn decode_planes(bytes: &[u8]) -> Result<ImagePlanes> {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
        .map_err(|e| GenerationError::InvalidTemplate(format!("Failed to decode PNG: {e}")))?;
    log::debug!("Decoded template {}x{}", img.width(), img.height());

    let rgb = img.to_rgb8();
    let alpha = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let samples: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        // Fully opaque images don't need a soft mask
        (!samples.iter().all(|a| *a == u8::MAX)).then_some(samples)
    } else {
        None
    };

    Ok(ImagePlanes {
        rgb: deflate(rgb.as_raw())?,
        alpha: alpha.map(|a| deflate(&a)).transpose()?,
    })
}

pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Fingerprint-keyed template cache.
///
/// Written at most once per distinct fingerprint, read by every row.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: Mutex<HashMap<Fingerprint, Arc<TemplateAsset>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached asset for `source`, reading and validating it on a miss.
    pub fn load(&self, source: &dyn TemplateSource) -> Result<Arc<TemplateAsset>> {
        let fingerprint = source.fingerprint()?;
        if let Some(asset) = self.lock()?.get(&fingerprint) {
            log::debug!("Template cache hit for {}", source.describe());
            return Ok(asset.clone());
        }

        log::debug!("Template cache miss for {}", source.describe());
        let asset = Arc::new(TemplateAsset::from_bytes(fingerprint, source.read()?)?);
        log::info!(
            "Loaded template {} ({}x{}px)",
            source.describe(),
            asset.width,
            asset.height
        );
        Ok(self
            .lock()?
            .entry(fingerprint)
            .or_insert(asset)
            .clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Fingerprint, Arc<TemplateAsset>>>> {
        self.entries
            .lock()
            .map_err(|_| GenerationError::ResourceLoad("template cache poisoned".to_string()))
    }
}
