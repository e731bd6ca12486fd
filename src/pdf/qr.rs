//! Verification QR codes.

use image::{GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};

use crate::error::EncodingError;

/// Quiet zone around the symbol, in modules.
pub const QR_MARGIN_MODULES: u32 = 1;

/// Verification link for a registration id: `<base>?reg=<percent-encoded id>`.
pub fn verification_url(base: &str, registration_id: &str) -> String {
    format!("{}?reg={}", base, urlencoding::encode(registration_id))
}

/// Encode `data` as a square black-on-white QR bitmap of `pixel_size` pixels.
///
/// Modules are scaled by the largest whole factor that fits and the symbol
/// is centred. When even one pixel per module does not fit, the bitmap grows
/// to the symbol's natural size instead of truncating it.
pub fn encode(data: &str, pixel_size: u32) -> Result<GrayImage, EncodingError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)?;
    let modules = code.width() as u32;
    let colors = code.to_colors();

    let total = modules + 2 * QR_MARGIN_MODULES;
    let scale = (pixel_size / total).max(1);
    let side = pixel_size.max(total * scale);
    let origin = (side - total * scale) / 2 + QR_MARGIN_MODULES * scale;

    let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));
    for (i, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let x = origin + (i as u32 % modules) * scale;
        let y = origin + (i as u32 / modules) * scale;
        for dy in 0..scale {
            for dx in 0..scale {
                img.put_pixel(x + dx, y + dy, Luma([0u8]));
            }
        }
    }

    Ok(img)
}
