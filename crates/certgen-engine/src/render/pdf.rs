//! PDF output over lopdf
//!
//! Each output document gets:
//! - One embedded Type0 font (CIDFontType2, Identity-H) with a `W` widths
//!   array and a `ToUnicode` CMap so text stays searchable
//! - One template image XObject, with an `SMask` when it has transparency
//! - One `ExtGState` per distinct opacity
//! - One content stream per page, built as text
//!
//! The costly parts (compressed font program, widths, CMap, compressed
//! pixels) are prepared once and cloned into each document.

use crate::font::Typeface;
use crate::template::{TemplateAsset, deflate};
use crate::types::{PageSize, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::canvas::{Canvas, ImageDraw, LineDraw, TextDraw};

const FONT_RESOURCE: &str = "F1";
const IMAGE_RESOURCE: &str = "Im1";
const PRODUCER: &str = concat!("certgen ", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Font Payload
// =============================================================================

/// Everything needed to embed a typeface, computed once per job
#[derive(Debug)]
pub struct FontPayload {
    typeface: Arc<Typeface>,
    base_font: String,
    compressed_program: Vec<u8>,
    widths: Vec<Object>,
    default_width: i64,
    compressed_to_unicode: Vec<u8>,
}

impl FontPayload {
    pub fn prepare(typeface: Arc<Typeface>) -> Result<Self> {
        let scale = 1000.0 / typeface.units_per_em() as f32;
        let width_of = |gid: u16| (typeface.advance(gid) as f32 * scale).round() as i64;

        // Lowest code point per glyph, for widths and reverse mapping
        let mut by_glyph: BTreeMap<u16, char> = BTreeMap::new();
        for (ch, gid) in typeface.mapped_chars() {
            by_glyph
                .entry(gid)
                .and_modify(|c| *c = (*c).min(ch))
                .or_insert(ch);
        }

        let widths = widths_array(by_glyph.keys().map(|gid| (*gid, width_of(*gid))));
        let to_unicode = to_unicode_cmap(&by_glyph);

        log::debug!(
            "Prepared font {} for embedding ({} glyphs with widths)",
            typeface.postscript_name(),
            by_glyph.len()
        );

        Ok(Self {
            base_font: typeface.postscript_name().to_string(),
            compressed_program: deflate(typeface.data())?,
            widths,
            default_width: width_of(0),
            compressed_to_unicode: deflate(to_unicode.as_bytes())?,
            typeface,
        })
    }

    pub fn typeface(&self) -> &Typeface {
        &self.typeface
    }

    fn embed(&self, doc: &mut Document) -> ObjectId {
        let face = &self.typeface;
        let scale = 1000.0 / face.units_per_em() as f32;
        let scaled = |v: i16| Object::Integer((v as f32 * scale).round() as i64);

        let mut program_dict = Dictionary::new();
        program_dict.set("Length1", Object::Integer(face.data().len() as i64));
        program_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        let program_id = doc.add_object(Stream::new(program_dict, self.compressed_program.clone()));

        let [x_min, y_min, x_max, y_max] = face.bbox();
        let descriptor_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(self.base_font.as_bytes().to_vec())),
            ("Flags", Object::Integer(4)),
            (
                "FontBBox",
                Object::Array(vec![scaled(x_min), scaled(y_min), scaled(x_max), scaled(y_max)]),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", scaled(face.ascender())),
            ("Descent", scaled(face.descender())),
            ("CapHeight", scaled(face.ascender())),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(program_id)),
        ]));

        let cid_font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(self.base_font.as_bytes().to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("Registry", Object::string_literal("Adobe")),
                    ("Ordering", Object::string_literal("Identity")),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("DW", Object::Integer(self.default_width)),
            ("W", Object::Array(self.widths.clone())),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]));

        let mut cmap_dict = Dictionary::new();
        cmap_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        let to_unicode_id =
            doc.add_object(Stream::new(cmap_dict, self.compressed_to_unicode.clone()));

        doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(self.base_font.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            (
                "DescendantFonts",
                Object::Array(vec![Object::Reference(cid_font_id)]),
            ),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ]))
    }
}

/// `W` array entries, grouping consecutive glyph ids: `start [w1 w2 ...]`
fn widths_array(glyphs: impl Iterator<Item = (u16, i64)>) -> Vec<Object> {
    let mut out = Vec::new();
    let mut run_start: Option<u16> = None;
    let mut run: Vec<Object> = Vec::new();
    let mut last = 0u16;

    for (gid, width) in glyphs {
        if run_start.is_some() && gid != last.wrapping_add(1) {
            out.push(Object::Integer(run_start.take().unwrap_or_default() as i64));
            out.push(Object::Array(std::mem::take(&mut run)));
        }
        run_start.get_or_insert(gid);
        run.push(Object::Integer(width));
        last = gid;
    }
    if let Some(start) = run_start {
        out.push(Object::Integer(start as i64));
        out.push(Object::Array(run));
    }
    out
}

fn to_unicode_cmap(by_glyph: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = by_glyph.iter().collect();
    // bfchar blocks hold at most 100 entries
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            cmap.push_str(&format!("<{gid:04X}> <{utf16}>\n"));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

// =============================================================================
// Document Builder
// =============================================================================

/// One output document under construction
pub struct DocumentBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_refs: Vec<Object>,
    font: Arc<FontPayload>,
    font_id: ObjectId,
    image_id: ObjectId,
    graphics_states: BTreeMap<u16, ObjectId>,
    missing_glyphs: HashSet<char>,
    title: String,
}

impl DocumentBuilder {
    /// Start a document with the font and template image embedded.
    pub fn new(font: Arc<FontPayload>, template: &TemplateAsset, title: &str) -> Result<Self> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = font.embed(&mut doc);
        let image_id = embed_image(&mut doc, template)?;

        Ok(Self {
            doc,
            pages_id,
            page_refs: Vec::new(),
            font,
            font_id,
            image_id,
            graphics_states: BTreeMap::new(),
            missing_glyphs: HashSet::new(),
            title: title.to_string(),
        })
    }

    /// Open a new page; it is added to the document by [`PdfCanvas::finish`].
    pub fn begin_page(&mut self, page: PageSize) -> PdfCanvas<'_> {
        PdfCanvas {
            builder: self,
            page,
            ops: String::new(),
            used_states: BTreeMap::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_refs.len()
    }

    /// Write the page tree, catalog and info, and serialize.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.page_refs.len() as i64;
        let pages_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(self.page_refs)),
            ("Count", Object::Integer(count)),
        ]);
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        let info_id = self.doc.add_object(Dictionary::from_iter(vec![
            ("Title", text_string(&self.title)),
            ("Producer", Object::string_literal(PRODUCER)),
        ]));

        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", Object::Reference(info_id));

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    fn graphics_state(&mut self, opacity: f32) -> (String, ObjectId) {
        let key = (opacity.clamp(0.0, 1.0) * 1000.0).round() as u16;
        let id = *self.graphics_states.entry(key).or_insert_with(|| {
            let alpha = Object::Real(key as f32 / 1000.0);
            self.doc.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"ExtGState".to_vec())),
                ("ca", alpha.clone()),
                ("CA", alpha),
            ]))
        });
        (format!("GS{key}"), id)
    }

    fn warn_missing_glyphs(&mut self, text: &str) {
        for ch in text.chars() {
            if !ch.is_whitespace()
                && !self.font.typeface().has_glyph(ch)
                && self.missing_glyphs.insert(ch)
            {
                log::warn!(
                    "Font {} has no glyph for {ch:?} (U+{:04X})",
                    self.font.typeface().postscript_name(),
                    ch as u32
                );
            }
        }
    }
}

fn embed_image(doc: &mut Document, template: &TemplateAsset) -> Result<ObjectId> {
    let planes = template.planes()?;

    let image_dict = |color_space: &[u8]| {
        Dictionary::from_iter(vec![
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(template.width as i64)),
            ("Height", Object::Integer(template.height as i64)),
            ("ColorSpace", Object::Name(color_space.to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", Object::Name(b"FlateDecode".to_vec())),
        ])
    };

    let mut dict = image_dict(b"DeviceRGB");
    if let Some(alpha) = &planes.alpha {
        let mask_id = doc.add_object(Stream::new(image_dict(b"DeviceGray"), alpha.clone()));
        dict.set("SMask", Object::Reference(mask_id));
    }
    Ok(doc.add_object(Stream::new(dict, planes.rgb.clone())))
}

// =============================================================================
// Page Canvas
// =============================================================================

/// Canvas writing one page's content stream
pub struct PdfCanvas<'a> {
    builder: &'a mut DocumentBuilder,
    page: PageSize,
    ops: String,
    used_states: BTreeMap<String, ObjectId>,
}

impl PdfCanvas<'_> {
    /// Add the page to the document.
    pub fn finish(self) -> ObjectId {
        let mut resources = Dictionary::new();
        resources.set(
            "Font",
            Dictionary::from_iter(vec![(FONT_RESOURCE, Object::Reference(self.builder.font_id))]),
        );
        resources.set(
            "XObject",
            Dictionary::from_iter(vec![(IMAGE_RESOURCE, Object::Reference(self.builder.image_id))]),
        );
        if !self.used_states.is_empty() {
            let states: Dictionary = self
                .used_states
                .into_iter()
                .map(|(name, id)| (name.into_bytes(), Object::Reference(id)))
                .collect();
            resources.set("ExtGState", states);
        }

        let pages_id = self.builder.pages_id;
        let doc = &mut self.builder.doc;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), self.ops.into_bytes()));
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(self.page.width_pt()),
                    Object::Real(self.page.height_pt()),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(resources)),
        ]));
        self.builder.page_refs.push(Object::Reference(page_id));
        page_id
    }

    fn push_state(&mut self, opacity: Option<f32>, transform: Option<[f32; 6]>) {
        self.ops.push_str("q\n");
        if let Some(opacity) = opacity {
            let (name, id) = self.builder.graphics_state(opacity);
            self.ops.push_str(&format!("/{name} gs\n"));
            self.used_states.insert(name, id);
        }
        if let Some([a, b, c, d, e, f]) = transform {
            self.ops.push_str(&format!(
                "{} {} {} {} {} {} cm\n",
                num(a),
                num(b),
                num(c),
                num(d),
                num(e),
                num(f)
            ));
        }
    }
}

impl Canvas for PdfCanvas<'_> {
    fn draw_image(&mut self, image: &ImageDraw) -> Result<()> {
        self.ops.push_str(&format!(
            "q\n0 0 {} {} re W n\n{} 0 0 {} {} {} cm\n/{IMAGE_RESOURCE} Do\nQ\n",
            num(image.clip_width),
            num(image.clip_height),
            num(image.width),
            num(image.height),
            num(image.x),
            num(image.y)
        ));
        Ok(())
    }

    fn draw_text(&mut self, text: &TextDraw) -> Result<()> {
        self.push_state(text.opacity, text.transform);
        let c = text.color;
        self.ops
            .push_str(&format!("{} {} {} rg\n", num(c.r), num(c.g), num(c.b)));
        for run in &text.runs {
            self.builder.warn_missing_glyphs(&run.text);
            let glyphs: String = self
                .builder
                .font
                .typeface()
                .encode(&run.text)
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect();
            self.ops.push_str(&format!(
                "BT\n/{FONT_RESOURCE} {} Tf\n{} {} Td\n<{glyphs}> Tj\nET\n",
                num(text.font_size),
                num(run.x),
                num(text.y)
            ));
        }
        self.ops.push_str("Q\n");
        Ok(())
    }

    fn draw_line(&mut self, line: &LineDraw) -> Result<()> {
        self.push_state(line.opacity, line.transform);
        let c = line.color;
        self.ops.push_str(&format!(
            "{} {} {} RG\n{} w\n{} {} m\n{} {} l\nS\nQ\n",
            num(c.r),
            num(c.g),
            num(c.b),
            num(line.thickness),
            num(line.from.0),
            num(line.from.1),
            num(line.to.0),
            num(line.to.1)
        ));
        Ok(())
    }
}

/// Content-stream number: four decimals, no exponent
/// PDF text string: literal for ASCII, UTF-16BE with a byte order mark
/// otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn num(v: f32) -> String {
    let rounded = (v * 10_000.0).round() / 10_000.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{rounded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::layout::{Rgb, TextRun};
    use crate::template::Fingerprint;
    use lopdf::content::Content;

    fn builder() -> DocumentBuilder {
        titled_builder("Test")
    }

    fn titled_builder(title: &str) -> DocumentBuilder {
        let typeface = Arc::new(Typeface::parse(fixtures::font()).unwrap());
        let font = Arc::new(FontPayload::prepare(typeface).unwrap());
        let template = TemplateAsset::from_bytes(
            Fingerprint {
                size: 0,
                modified: 0,
            },
            fixtures::template_png(16, 16),
        )
        .unwrap();
        DocumentBuilder::new(font, &template, title).unwrap()
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(0.0), "0");
        assert_eq!(num(-0.00001), "0");
        assert_eq!(num(12.0), "12");
        assert_eq!(num(141.732283), "141.7323");
    }

    #[test]
    fn test_widths_array_groups_runs() {
        let w = widths_array([(1, 500), (2, 500), (5, 250)].into_iter());
        assert_eq!(w.len(), 4);
        assert_eq!(w[0], Object::Integer(1));
        assert_eq!(
            w[1],
            Object::Array(vec![Object::Integer(500), Object::Integer(500)])
        );
        assert_eq!(w[2], Object::Integer(5));
    }

    #[test]
    fn test_to_unicode_blocks() {
        let map: BTreeMap<u16, char> = (1..=150u16).map(|g| (g, 'A')).collect();
        let cmap = to_unicode_cmap(&map);
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
        assert!(cmap.contains("<0001> <0041>"));
    }

    #[test]
    fn test_pages_and_content() {
        let mut b = builder();
        for label in ["A", "B"] {
            let mut canvas = b.begin_page(PageSize::new(210.0, 297.0));
            canvas
                .draw_text(&TextDraw {
                    runs: vec![TextRun {
                        text: label.to_string(),
                        x: 100.0,
                    }],
                    y: 700.0,
                    font_size: 20.0,
                    color: Rgb::BLACK,
                    opacity: Some(0.5),
                    transform: None,
                })
                .unwrap();
            canvas.finish();
        }
        assert_eq!(b.page_count(), 2);

        let bytes = b.finish().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        let page_id = pages[&1];
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        assert!(ops.contains(&"gs"));
        assert!(ops.contains(&"Tj"));
    }

    #[test]
    fn test_unicode_title_is_utf16() {
        let title = "\u{0634}\u{0647}\u{0627}\u{062F}\u{0629} 2026";
        let mut b = titled_builder(title);
        b.begin_page(PageSize::new(210.0, 297.0)).finish();
        let doc = Document::load_mem(&b.finish().unwrap()).unwrap();

        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(info_id).unwrap().as_dict().unwrap();
        let raw = info.get(b"Title").unwrap().as_str().unwrap();

        assert_eq!(&raw[..2], &[0xFE, 0xFF]);
        let units: Vec<u16> = raw[2..]
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(String::from_utf16(&units).unwrap(), title);

        assert!(matches!(
            text_string("Certificates"),
            Object::String(ref bytes, StringFormat::Literal) if bytes == b"Certificates"
        ));
    }
}
