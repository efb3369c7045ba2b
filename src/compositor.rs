use crate::config::AssetConfig;
use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, ensure, Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::Path;
use tracing::info;

/// Display size of the resized profile photo, in pixels
pub const PHOTO_SIZE: u32 = 180;

// Card geometry, in template pixel space. The template is required to be at
// least 1100x475 so every element lands inside it.
const CARD_LEFT: i32 = 100;
const CARD_TOP: i32 = 200;
const CARD_RIGHT: i32 = 1100;
const CARD_BOTTOM: i32 = 475;
const CARD_RADIUS: i32 = 30;
const CARD_FILL: Rgba<u8> = Rgba([0, 0, 0, 150]);

const PHOTO_POS: (i64, i64) = (150, 248);
const CODE_POS: (i64, i64) = (880, 248);
const NAME_POS: (i32, i32) = (360, 290);
const DETAILS_POS: (i32, i32) = (360, 360);
const INVITE_ID_POS: (i32, i32) = (360, 420);

const NAME_SCALE: f32 = 48.0;
const DETAIL_SCALE: f32 = 32.0;
const NAME_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const DETAIL_COLOR: Rgba<u8> = Rgba([204, 204, 204, 255]);

/// Text content drawn onto the invitation card
#[derive(Debug, Clone)]
pub struct InviteCard {
    pub name: String,
    pub year: String,
    pub section: String,
    pub invite_id: String,
}

/// Invitation image compositor.
///
/// Loads the background template and both fonts once at construction; a
/// missing or unreadable asset is fatal, there is no fallback. Rendering is
/// fully deterministic: identical inputs produce byte-identical output.
pub struct Compositor {
    template: RgbaImage,
    name_font: FontVec,
    detail_font: FontVec,
}

impl Compositor {
    /// Load the template and fonts from the configured paths
    pub fn from_config(config: &AssetConfig) -> Result<Self> {
        let template = image::open(&config.template_path)
            .with_context(|| format!("Failed to load template {}", config.template_path))?
            .to_rgba8();

        ensure!(
            template.width() >= CARD_RIGHT as u32 && template.height() >= CARD_BOTTOM as u32,
            "Template {} is {}x{}, card layout needs at least {}x{}",
            config.template_path,
            template.width(),
            template.height(),
            CARD_RIGHT,
            CARD_BOTTOM
        );

        let name_font = load_font(&config.name_font_path)?;
        let detail_font = load_font(&config.detail_font_path)?;

        info!(
            template = %config.template_path,
            width = template.width(),
            height = template.height(),
            "Compositor initialized"
        );

        Ok(Self {
            template,
            name_font,
            detail_font,
        })
    }

    /// Template dimensions; the rendered output always matches these
    pub fn template_dimensions(&self) -> (u32, u32) {
        self.template.dimensions()
    }

    /// Render the invitation for one submission.
    ///
    /// Layering, all at fixed coordinates: translucent rounded card, resized
    /// photo (blended through its own alpha), opaque scannable code, name and
    /// detail text, then the whole overlay alpha-composited onto the template.
    pub fn render(&self, card: &InviteCard, photo: &DynamicImage, code: &RgbaImage) -> RgbaImage {
        let (width, height) = self.template.dimensions();
        let mut layer = RgbaImage::new(width, height);

        draw_rounded_card(&mut layer);

        // Arbitrary aspect ratios are squashed to the photo slot; any
        // distortion is accepted.
        let photo = photo
            .resize_exact(PHOTO_SIZE, PHOTO_SIZE, FilterType::Triangle)
            .to_rgba8();
        imageops::overlay(&mut layer, &photo, PHOTO_POS.0, PHOTO_POS.1);

        // The code is pasted opaque so its quiet zone stays light
        imageops::replace(&mut layer, code, CODE_POS.0, CODE_POS.1);

        draw_text_mut(
            &mut layer,
            NAME_COLOR,
            NAME_POS.0,
            NAME_POS.1,
            PxScale::from(NAME_SCALE),
            &self.name_font,
            &card.name,
        );

        let details = format!("{} Year | Section: {}", card.year, card.section);
        draw_text_mut(
            &mut layer,
            DETAIL_COLOR,
            DETAILS_POS.0,
            DETAILS_POS.1,
            PxScale::from(DETAIL_SCALE),
            &self.detail_font,
            &details,
        );

        let id_line = format!("Invite ID: {}", card.invite_id);
        draw_text_mut(
            &mut layer,
            DETAIL_COLOR,
            INVITE_ID_POS.0,
            INVITE_ID_POS.1,
            PxScale::from(DETAIL_SCALE),
            &self.detail_font,
            &id_line,
        );

        let mut output = self.template.clone();
        imageops::overlay(&mut output, &layer, 0, 0);

        // Integer alpha blending can round to 254 where anti-aliased text
        // meets the translucent card; the invitation is fully opaque.
        for px in output.pixels_mut() {
            px.0[3] = 255;
        }

        output
    }
}

/// Encode a rendered invitation as PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("Failed to encode invitation as PNG")?;
    Ok(buffer.into_inner())
}

fn load_font(path: &str) -> Result<FontVec> {
    let bytes = std::fs::read(Path::new(path))
        .with_context(|| format!("Failed to read font {path}"))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("Failed to parse font {path}: {e}"))
}

/// Draw the translucent rounded card onto a transparent layer.
///
/// Two overlapping rectangles cover the straight spans and four discs fill
/// the corners; every covered pixel is set to the same fill value, so the
/// overlap does not darken.
fn draw_rounded_card(layer: &mut RgbaImage) {
    let width = CARD_RIGHT - CARD_LEFT;
    let height = CARD_BOTTOM - CARD_TOP;

    draw_filled_rect_mut(
        layer,
        Rect::at(CARD_LEFT + CARD_RADIUS, CARD_TOP)
            .of_size((width - 2 * CARD_RADIUS) as u32, height as u32),
        CARD_FILL,
    );
    draw_filled_rect_mut(
        layer,
        Rect::at(CARD_LEFT, CARD_TOP + CARD_RADIUS)
            .of_size(width as u32, (height - 2 * CARD_RADIUS) as u32),
        CARD_FILL,
    );

    let corners = [
        (CARD_LEFT + CARD_RADIUS, CARD_TOP + CARD_RADIUS),
        (CARD_RIGHT - CARD_RADIUS, CARD_TOP + CARD_RADIUS),
        (CARD_LEFT + CARD_RADIUS, CARD_BOTTOM - CARD_RADIUS),
        (CARD_RIGHT - CARD_RADIUS, CARD_BOTTOM - CARD_RADIUS),
    ];
    for (cx, cy) in corners {
        draw_filled_circle_mut(layer, (cx, cy), CARD_RADIUS, CARD_FILL);
    }
}
