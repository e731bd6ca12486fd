//! Font and default template, loaded once at startup and shared read-only.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use genpdf::fonts::{FontData, FontFamily};
use image::{ImageFormat, Rgb, RgbImage};
use printpdf::BuiltinFont;
use ttf_parser::kern::{Format, Subtable};
use ttf_parser::{Face, GlyphId, Tag};

use super::fit::FontMetrics;
use crate::error::RenderError;

/// Locations tried, in order, when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/google-noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
];

/// Template used when a batch does not upload its own.
const BUNDLED_TEMPLATE: &str = "static/template.png";

/// Metrics read straight from the font's `hhea`, `hmtx`, `cmap` and `kern`
/// tables, the same tables the PDF backend measures with.
#[derive(Debug, Clone)]
pub struct TrueTypeMetrics {
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    notdef_advance: u16,
    glyphs: HashMap<char, (GlyphId, u16)>,
    kerning: HashMap<(GlyphId, GlyphId), i16>,
}

impl TrueTypeMetrics {
    pub fn parse(data: &[u8]) -> Result<Self, RenderError> {
        let face = Face::parse(data, 0).map_err(|e| RenderError::Font(e.to_string()))?;

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    let Some(c) = char::from_u32(cp) else { return };
                    if let Some(gid) = subtable.glyph_index(cp) {
                        let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                        glyphs.entry(c).or_insert((gid, advance));
                    }
                });
            }
        }

        // Not `Face::ascender`: that prefers the OS/2 typo metrics.
        let hhea = face.tables().hhea;
        Ok(Self {
            units_per_em: face.units_per_em(),
            ascender: hhea.ascender,
            descender: hhea.descender,
            notdef_advance: face.glyph_hor_advance(GlyphId(0)).unwrap_or(0),
            glyphs,
            kerning: kerning_pairs(&face),
        })
    }

    fn glyph_id(&self, c: char) -> GlyphId {
        self.glyphs.get(&c).map_or(GlyphId(0), |(gid, _)| *gid)
    }
}

/// Pairs from the first subtable of an OpenType `kern` table, when it is a
/// plain horizontal format 0 list. Other layouts (Apple `kern`, class
/// based subtables, GPOS) are not applied by the PDF backend.
fn kerning_pairs(face: &Face<'_>) -> HashMap<(GlyphId, GlyphId), i16> {
    // Version 0, at least one subtable, and a coverage word of exactly 1:
    // horizontal, format 0, no minimum, cross-stream or override bits.
    let applied = face.raw_face().table(Tag::from_bytes(b"kern")).is_some_and(|raw| {
        raw.len() >= 10 && raw[..2] == [0, 0] && raw[2..4] != [0, 0] && raw[8..10] == [0, 1]
    });
    let Some(table) = face.tables().kern.filter(|_| applied) else {
        return HashMap::new();
    };

    match table.subtables.into_iter().next() {
        Some(Subtable {
            horizontal: true,
            has_cross_stream: false,
            format: Format::Format0(subtable),
            ..
        }) => subtable
            .pairs
            .into_iter()
            .map(|pair| ((pair.left(), pair.right()), pair.value))
            .collect(),
        _ => HashMap::new(),
    }
}

impl FontMetrics for TrueTypeMetrics {
    fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    fn glyph_advance(&self, c: char) -> u16 {
        self.glyphs
            .get(&c)
            .map_or(self.notdef_advance, |(_, advance)| *advance)
    }

    fn kerning(&self, left: char, right: char) -> i16 {
        if self.kerning.is_empty() {
            return 0;
        }
        let pair = (self.glyph_id(left), self.glyph_id(right));
        self.kerning.get(&pair).copied().unwrap_or(0)
    }

    fn ascender(&self) -> i16 {
        self.ascender
    }

    fn descender(&self) -> i16 {
        self.descender
    }
}

/// One TrueType face, usable both by the PDF backend and for text fitting.
#[derive(Clone)]
pub struct FontAsset {
    pub path: PathBuf,
    pub family: FontFamily<FontData>,
    pub metrics: TrueTypeMetrics,
}

impl FontAsset {
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path)?;
        let metrics = TrueTypeMetrics::parse(&bytes)?;
        let font = |builtin| {
            FontData::new(bytes.clone(), builtin).map_err(|e| RenderError::Font(e.to_string()))
        };
        // Certificates only print the regular face. genpdf embeds every member
        // of the family, so the unused styles point at built-in fonts instead of
        // embedding the same file three more times.
        let family = FontFamily {
            regular: font(None)?,
            bold: font(Some(BuiltinFont::HelveticaBold))?,
            italic: font(Some(BuiltinFont::HelveticaOblique))?,
            bold_italic: font(Some(BuiltinFont::HelveticaBoldOblique))?,
        };
        Ok(Self {
            path: path.to_path_buf(),
            family,
            metrics,
        })
    }

    /// Load `explicit` if given, otherwise the first installed system font.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, RenderError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        SYSTEM_FONTS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .ok_or_else(|| {
                RenderError::Font(
                    "No suitable fonts found. Set FONT_PATH or install: apt install fonts-noto-core"
                        .to_string(),
                )
            })
            .and_then(Self::load)
    }
}

/// Raw bytes of the default certificate background.
///
/// Order: `explicit`, then the bundled `static/template.png`, then a plain
/// generated frame.
pub fn default_template(explicit: Option<&Path>) -> Result<Vec<u8>, RenderError> {
    if let Some(path) = explicit {
        return Ok(std::fs::read(path)?);
    }
    let bundled = Path::new(BUNDLED_TEMPLATE);
    if bundled.exists() {
        return Ok(std::fs::read(bundled)?);
    }
    Ok(generated_template()?)
}

/// Cream page with a double gold frame, A4 proportions.
pub fn generated_template() -> Result<Vec<u8>, image::ImageError> {
    let (width, height) = (420u32, 594u32);
    let mut img = RgbImage::from_pixel(width, height, Rgb([253, 250, 240]));
    let gold = Rgb([184, 146, 60]);

    for (inset, thickness) in [(12u32, 4u32), (22, 1)] {
        for y in inset..height - inset {
            for x in inset..width - inset {
                let on_frame = x < inset + thickness
                    || x >= width - inset - thickness
                    || y < inset + thickness
                    || y >= height - inset - thickness;
                if on_frame {
                    img.put_pixel(x, y, gold);
                }
            }
        }
    }

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// First installed system font, for tests that need real glyph metrics.
#[cfg(test)]
pub(crate) fn test_font() -> Option<FontAsset> {
    match FontAsset::discover(None) {
        Ok(font) => Some(font),
        Err(e) => {
            eprintln!("skipping: {e}");
            None
        }
    }
}
