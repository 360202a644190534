use anyhow::{Result, anyhow};
use image::RgbaImage;
use std::sync::Arc;
use tiny_skia::{ColorU8, Paint, Pixmap, Rect, Transform};
use tracing::warn;
use usvg::{Options, Tree, fontdb};

use super::font::css_family_list;
use super::{BoxPx, FontSpec, color_to_hex};

/// The raster the overlay is composed on.
pub trait Surface {
    /// Resizes to the image and repaints it at the origin, dropping prior content.
    fn reset(&mut self, image: &RgbaImage) -> Result<()>;

    fn dimensions(&self) -> (u32, u32);

    fn fill_rect(&mut self, bbox: BoxPx, color: ColorU8);

    /// Draws `text` with its left edge at `x` and its middle at `y`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: &FontSpec, color: ColorU8);
}

/// `tiny-skia` pixmap with text rasterized through `resvg`.
pub struct PixmapSurface {
    pixmap: Option<Pixmap>,
    fontdb: Arc<fontdb::Database>,
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("dimensions", &self.dimensions())
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl PixmapSurface {
    pub fn new(fontdb: Arc<fontdb::Database>) -> Self {
        Self {
            pixmap: None,
            fontdb,
        }
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Straight-alpha color at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<ColorU8> {
        self.pixmap
            .as_ref()
            .and_then(|pixmap| pixmap.pixel(x, y))
            .map(|pixel| pixel.demultiply())
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let pixmap = self.pixmap.as_ref()?;
        let mut data = Vec::with_capacity(pixmap.pixels().len() * 4);
        for pixel in pixmap.pixels() {
            let color = pixel.demultiply();
            data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
    }
}

impl Surface for PixmapSurface {
    fn reset(&mut self, image: &RgbaImage) -> Result<()> {
        let (width, height) = image.dimensions();
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("invalid surface size {}x{}", width, height))?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        self.pixmap = Some(pixmap);
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.pixmap
            .as_ref()
            .map(|pixmap| (pixmap.width(), pixmap.height()))
            .unwrap_or((0, 0))
    }

    fn fill_rect(&mut self, bbox: BoxPx, color: ColorU8) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        // inverted boxes fill the same area, like a canvas fillRect with a negative extent
        let left = bbox.x1.min(bbox.x2) as f32;
        let right = bbox.x1.max(bbox.x2) as f32;
        let top = bbox.y1.min(bbox.y2) as f32;
        let bottom = bbox.y1.max(bbox.y2) as f32;
        if right <= left || bottom <= top {
            return;
        }
        let Some(rect) = Rect::from_ltrb(left, top, right, bottom) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.red(), color.green(), color.blue(), color.alpha());
        paint.anti_alias = false;
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: &FontSpec, color: ColorU8) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let svg = text_svg(
            pixmap.width(),
            pixmap.height(),
            text,
            x,
            y,
            font,
            color,
        );
        let options = Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Options::default()
        };
        match Tree::from_str(&svg, &options) {
            Ok(tree) => {
                let mut pixmap_mut = pixmap.as_mut();
                resvg::render(&tree, Transform::identity(), &mut pixmap_mut);
            }
            Err(err) => warn!("failed to lay out text '{}': {}", text, err),
        }
    }
}

pub(super) fn text_svg(
    width: u32,
    height: u32,
    text: &str,
    x: f32,
    y: f32,
    font: &FontSpec,
    color: ColorU8,
) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="{fill}"{opacity} dominant-baseline="middle" xml:space="preserve">{text}</text>"#,
        x = x,
        y = y,
        size = font.size_px,
        family = escape_xml(&css_family_list(&font.family)),
        fill = color_to_hex(color),
        opacity = if color.alpha() == 0xff {
            String::new()
        } else {
            format!(r#" fill-opacity="{}""#, color.alpha() as f32 / 255.0)
        },
        text = escape_xml(text)
    ));
    svg.push_str("</svg>");
    svg
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
