use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, Luma, RgbaImage};
use qrcode::QrCode;

/// Display size of the scannable code on the invitation, in pixels.
pub const CODE_SIZE: u32 = 180;

/// Build the QR payload for an invitee.
///
/// A reader scanning the final invitation must recover exactly this string.
pub fn code_payload(name: &str, invite_id: &str) -> String {
    format!("Name: {name}, ID: {invite_id}")
}

/// Encode a text payload into a 180x180 RGBA QR image.
///
/// The code is rendered at its native module grid and scaled with
/// nearest-neighbor filtering, which keeps module edges crisp so the code
/// stays decodable at display size.
pub fn generate_code(payload: &str) -> Result<RgbaImage> {
    let code = QrCode::new(payload.as_bytes())
        .with_context(|| format!("Failed to encode QR payload ({} bytes)", payload.len()))?;

    let native = code.render::<Luma<u8>>().quiet_zone(true).build();

    let resized = DynamicImage::ImageLuma8(native)
        .resize_exact(CODE_SIZE, CODE_SIZE, FilterType::Nearest)
        .to_rgba8();

    Ok(resized)
}
