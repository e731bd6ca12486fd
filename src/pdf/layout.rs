//! Fixed certificate geometry.
//!
//! Offsets are tuned to the default template artwork and are measured in PDF
//! points with the origin at the bottom-left corner of the page.

use crate::roster::Row;

use super::fit::{fit_font_size, FontMetrics, MIN_FONT_SIZE};

pub const DEFAULT_NAME: &str = "Participant";

/// Sum of the left and right margins around the name line.
pub const NAME_MARGIN: f32 = 140.0;
/// Name baseline, measured down from the top edge.
pub const NAME_BASELINE_FROM_TOP: f32 = 300.0;
pub const NAME_INITIAL_SIZE: u8 = 40;

pub const AWARD_SIZE: u8 = 14;
/// Award baseline distance below the name baseline.
pub const AWARD_GAP: f32 = 36.0;

/// Resolution of the generated QR bitmap.
pub const QR_PIXELS: u32 = 220;
pub const QR_BOX: f32 = 120.0;
pub const QR_RIGHT_OFFSET: f32 = 160.0;
pub const QR_BOTTOM_OFFSET: f32 = 60.0;

const MM_PER_PT: f64 = 25.4 / 72.0;

pub fn pt_to_mm(pt: f32) -> f64 {
    f64::from(pt) * MM_PER_PT
}

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// ISO A4 portrait.
    pub const A4: PageSize = PageSize {
        width: 595.275_6,
        height: 841.889_8,
    };
}

/// A single line of text: left edge and baseline, in points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub size: u8,
    pub x: f32,
    pub baseline: f32,
    /// Distance from the top of the line box down to the baseline.
    pub glyph_height: f32,
}

impl TextLine {
    /// Top of the line box, measured down from the top edge of the page.
    pub fn top_from_page_top(&self, page: PageSize) -> f32 {
        page.height - self.baseline - self.glyph_height
    }
}

/// Axis-aligned box with its lower-left corner at (`x`, `y`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificateLayout {
    pub page: PageSize,
    pub background: Placement,
    pub name: TextLine,
    pub award: Option<TextLine>,
    pub qr: Placement,
}

impl CertificateLayout {
    pub fn lines(&self) -> impl Iterator<Item = &TextLine> {
        std::iter::once(&self.name).chain(self.award.as_ref())
    }
}

/// Name printed on the certificate.
pub fn display_name(row: &Row) -> &str {
    row.non_blank("name").unwrap_or(DEFAULT_NAME)
}

pub fn layout_certificate<M: FontMetrics + ?Sized>(
    row: &Row,
    metrics: &M,
    page: PageSize,
) -> CertificateLayout {
    let name = display_name(row);
    let max_width = page.width - NAME_MARGIN;
    let size = fit_font_size(metrics, name, max_width, NAME_INITIAL_SIZE, MIN_FONT_SIZE);
    let baseline = page.height - NAME_BASELINE_FROM_TOP;
    let name_line = centred(metrics, page, name, size, baseline);

    let award = row
        .non_blank("award")
        .map(|award| centred(metrics, page, award, AWARD_SIZE, baseline - AWARD_GAP));

    CertificateLayout {
        page,
        // Stretched: the template's aspect ratio is not preserved.
        background: Placement {
            x: 0.0,
            y: 0.0,
            width: page.width,
            height: page.height,
        },
        name: name_line,
        award,
        qr: Placement {
            x: page.width - QR_RIGHT_OFFSET,
            y: QR_BOTTOM_OFFSET,
            width: QR_BOX,
            height: QR_BOX,
        },
    }
}

fn centred<M: FontMetrics + ?Sized>(
    metrics: &M,
    page: PageSize,
    text: &str,
    size: u8,
    baseline: f32,
) -> TextLine {
    let width = metrics.text_width(text, f32::from(size));
    TextLine {
        text: text.to_string(),
        size,
        x: (page.width - width) / 2.0,
        baseline,
        glyph_height: metrics.glyph_height(f32::from(size)),
    }
}
