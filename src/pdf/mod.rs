// Certificate PDF generation
// genpdf lays out from the top-left corner in millimetres; the layout module
// works in PDF points from the bottom-left, so everything is converted here.
mod assets;
mod fit;
mod layout;
mod qr;

pub use assets::{default_template, FontAsset};
pub use layout::{
    display_name, layout_certificate, CertificateLayout, PageSize, Placement, TextLine,
};
pub use qr::verification_url;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use genpdf::elements::Image;
use genpdf::render::Area;
use genpdf::style::Style;
use genpdf::{Context, Document, Element, Position, RenderResult, Scale, Size};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::RenderError;
use crate::roster::Row;
use crate::storage;
use layout::{pt_to_mm, QR_PIXELS};

/// Images are placed at 72 dpi so one pixel is one point before scaling.
const IMAGE_DPI: f64 = 72.0;

/// A certificate written to the batch scratch directory.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub file_name: String,
    pub path: PathBuf,
    pub registration_id: String,
}

/// Background image for one batch, normalised to an opaque RGB PNG on disk.
#[derive(Debug, Clone)]
pub struct TemplateImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl TemplateImage {
    /// Decode `bytes` (any format the `image` crate knows) and store it in
    /// `dir`. Transparent pixels are flattened onto white; genpdf rejects
    /// images with an alpha channel.
    pub fn prepare(bytes: &[u8], dir: &Path) -> Result<Self, RenderError> {
        let decoded = image::load_from_memory(bytes)?;
        let (width, height) = (decoded.width(), decoded.height());

        let mut background = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        image::imageops::overlay(&mut background, &decoded.to_rgba8(), 0, 0);
        let rgb = DynamicImage::ImageRgba8(background).to_rgb8();

        let path = dir.join("template.png");
        rgb.save_with_format(&path, ImageFormat::Png)?;
        Ok(Self {
            path,
            width,
            height,
        })
    }
}

/// Seam between the batch loop and the PDF backend.
pub trait RenderCertificate: Send + Sync {
    fn render(
        &self,
        row: &Row,
        template: &TemplateImage,
        out_dir: &Path,
    ) -> Result<RenderedDocument, RenderError>;
}

pub struct CertificateRenderer {
    font: Arc<FontAsset>,
    page: PageSize,
    verify_base_url: String,
}

impl CertificateRenderer {
    pub fn new(font: Arc<FontAsset>, verify_base_url: impl Into<String>) -> Self {
        Self {
            font,
            page: PageSize::A4,
            verify_base_url: verify_base_url.into(),
        }
    }

    pub fn layout(&self, row: &Row) -> CertificateLayout {
        layout_certificate(row, &self.font.metrics, self.page)
    }
}

impl RenderCertificate for CertificateRenderer {
    fn render(
        &self,
        row: &Row,
        template: &TemplateImage,
        out_dir: &Path,
    ) -> Result<RenderedDocument, RenderError> {
        let registration_id = storage::resolve_registration_id(row)?;
        let layout = self.layout(row);
        let file_name = storage::certificate_file_name(&layout.name.text, &registration_id);

        let url = verification_url(&self.verify_base_url, &registration_id);
        let qr_path = out_dir.join(format!("{}.qr.png", file_name));
        qr::encode(&url, QR_PIXELS)?.save_with_format(&qr_path, ImageFormat::Png)?;

        let page = CertificatePage::new(layout, template, &qr_path)?;
        let mut doc = Document::new(self.font.family.clone());
        doc.set_title(format!("Certificate {}", registration_id));
        doc.set_minimal_conformance();
        doc.set_paper_size(Size::new(pt_to_mm(self.page.width), pt_to_mm(self.page.height)));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(0);
        doc.set_page_decorator(decorator);
        doc.push(page);

        let path = out_dir.join(&file_name);
        let rendered = doc.render_to_file(&path);
        std::fs::remove_file(&qr_path)?;
        if let Err(e) = rendered {
            let _ = std::fs::remove_file(&path);
            return Err(RenderError::Pdf(e.to_string()));
        }

        Ok(RenderedDocument {
            file_name,
            path,
            registration_id,
        })
    }
}

/// The whole certificate as one genpdf element: every part is drawn into the
/// same page area at a fixed position.
struct CertificatePage {
    background: Image,
    qr: Image,
    lines: Vec<TextLine>,
    page: PageSize,
}

impl CertificatePage {
    fn new(
        layout: CertificateLayout,
        template: &TemplateImage,
        qr_path: &Path,
    ) -> Result<Self, RenderError> {
        let background = placed_image(
            &template.path,
            (template.width, template.height),
            layout.background,
            layout.page,
        )?;
        let qr = placed_image(qr_path, (QR_PIXELS, QR_PIXELS), layout.qr, layout.page)?;
        let lines = layout.lines().cloned().collect();
        Ok(Self {
            background,
            qr,
            lines,
            page: layout.page,
        })
    }
}

/// Load `path` and scale it to exactly fill `target`, ignoring aspect ratio.
fn placed_image(
    path: &Path,
    (width_px, height_px): (u32, u32),
    target: Placement,
    page: PageSize,
) -> Result<Image, RenderError> {
    let mut image = Image::from_path(path)
        .map_err(|e| RenderError::Image(e.to_string()))?
        .with_position(Position::new(
            pt_to_mm(target.x),
            pt_to_mm(page.height - target.y - target.height),
        ))
        .with_scale(Scale::new(
            f64::from(target.width) / f64::from(width_px.max(1)),
            f64::from(target.height) / f64::from(height_px.max(1)),
        ));
    image.set_dpi(IMAGE_DPI);
    Ok(image)
}

impl Element for CertificatePage {
    fn render(
        &mut self,
        context: &Context,
        area: Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, genpdf::error::Error> {
        self.background.render(context, area.clone(), Style::new())?;

        for line in &self.lines {
            // genpdf positions text by the top of the line box.
            let top = line.top_from_page_top(self.page);
            let position = Position::new(pt_to_mm(line.x), pt_to_mm(top));
            let style = Style::new().with_font_size(line.size);
            if !area.print_str(&context.font_cache, position, style, &line.text)? {
                tracing::warn!("text {:?} does not fit on the page", line.text);
            }
        }

        self.qr.render(context, area.clone(), Style::new())?;

        let mut result = RenderResult::default();
        result.size = area.size();
        Ok(result)
    }
}
