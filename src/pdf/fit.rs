/// Glyph metrics in font design units.
///
/// Widths computed through this trait must agree with the metrics the PDF
/// backend uses when it lays out the same string, otherwise centred text
/// drifts off-centre.
pub trait FontMetrics {
    /// Size of the em square in design units (1000 for Type 1, usually 1000
    /// or 2048 for TrueType).
    fn units_per_em(&self) -> u16;

    /// Advance width of `c`; characters without a glyph use the `.notdef` advance.
    fn glyph_advance(&self, c: char) -> u16;

    /// Pair adjustment added between `left` and `right`, usually negative.
    fn kerning(&self, _left: char, _right: char) -> i16 {
        0
    }

    /// `hhea` ascender: baseline to top of the line box.
    fn ascender(&self) -> i16;

    /// `hhea` descender: baseline to bottom of the line box, negative below.
    fn descender(&self) -> i16;

    /// Rendered width of `text` at `size` points, kerning included.
    fn text_width(&self, text: &str, size: f32) -> f32 {
        let mut units: i64 = 0;
        let mut previous = None;
        for c in text.chars() {
            units += i64::from(self.glyph_advance(c));
            if let Some(left) = previous {
                units += i64::from(self.kerning(left, c));
            }
            previous = Some(c);
        }
        units as f32 * size / f32::from(self.units_per_em())
    }

    /// Height of the line box at `size` points. The PDF backend places the
    /// baseline this far below the top of a text line.
    fn glyph_height(&self, size: f32) -> f32 {
        let units = i32::from(self.ascender()) - i32::from(self.descender());
        units as f32 * size / f32::from(self.units_per_em())
    }
}

pub const MIN_FONT_SIZE: u8 = 8;

/// Largest integral font size, starting at `initial` and stepping down by one,
/// at which `text` fits into `max_width`. Never goes below `min`; the result
/// may still overflow `max_width` once `min` is reached.
pub fn fit_font_size<M: FontMetrics + ?Sized>(
    metrics: &M,
    text: &str,
    max_width: f32,
    initial: u8,
    min: u8,
) -> u8 {
    let mut size = initial;
    while metrics.text_width(text, f32::from(size)) > max_width && size > min {
        size -= 1;
    }
    size
}
