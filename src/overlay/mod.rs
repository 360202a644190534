mod coords;
mod font;
mod layout;
mod render;
mod surface;

use anyhow::{Result, anyhow};
use serde::Serialize;
use tiny_skia::ColorU8;

pub use coords::parse_coords;
pub use font::{
    EstimatedMetrics, FontFile, ResolvedOverlayFont, ShapedMeasurer, TextMeasurer,
    configure_generic_families, load_font_file, resolve_overlay_font, split_family_list,
};
pub use layout::{LineLayout, PlacedRun, layout_line};
pub use render::{TextRequest, draw_text_in_box};
pub use surface::{PixmapSurface, Surface};

/// Axis-aligned box in source image pixels, as `x1,y1,x2,y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxPx {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoxPx {
    pub fn width(&self) -> f32 {
        self.x2 as f32 - self.x1 as f32
    }

    pub fn height(&self) -> f32 {
        self.y2 as f32 - self.y1 as f32
    }

    pub fn center_y(&self) -> f32 {
        self.y1 as f32 + self.height() / 2.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Right,
    #[default]
    Center,
}

impl Alignment {
    /// Anything other than `left` or `right` centers.
    pub fn from_selector(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("left") {
            Alignment::Left
        } else if value.eq_ignore_ascii_case("right") {
            Alignment::Right
        } else {
            Alignment::Center
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Right => "right",
            Alignment::Center => "center",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub size_px: f32,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size_px: f32) -> Self {
        Self {
            family: family.into(),
            size_px,
        }
    }

    pub fn css(&self) -> String {
        format!("{}px {}", self.size_px, self.family)
    }
}

#[derive(Debug, Clone)]
pub struct TextField {
    pub name: String,
    pub text: String,
    pub coords: String,
    pub font: FontSpec,
    pub alignment: Alignment,
    /// Extra gap between characters; `0` draws the text as one run.
    pub spacing: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub backdrop_color: ColorU8,
    pub text_color: ColorU8,
    pub font_family: String,
}

pub const DEFAULT_BACKDROP_COLOR: &str = "#161616";
pub const DEFAULT_TEXT_COLOR: &str = "#D0D0D0";
pub const DEFAULT_FONT_FAMILY: &str = "Microsoft YaHei UI, SimHei, Arial, sans-serif";

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            backdrop_color: ColorU8::from_rgba(0x16, 0x16, 0x16, 0xff),
            text_color: ColorU8::from_rgba(0xd0, 0xd0, 0xd0, 0xff),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

impl OverlayStyle {
    pub fn from_parts(backdrop: &str, text: &str, font_family: &str) -> Result<Self> {
        Ok(Self {
            backdrop_color: parse_hex_color(backdrop)?,
            text_color: parse_hex_color(text)?,
            font_family: font_family.to_string(),
        })
    }
}

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(value: &str) -> Result<ColorU8> {
    let raw = value.trim();
    let hex = raw
        .strip_prefix('#')
        .ok_or_else(|| anyhow!("color must start with '#': {}", raw))?;
    if !hex.is_ascii() {
        return Err(anyhow!("invalid color: {}", raw));
    }
    let channel = |text: &str| {
        u8::from_str_radix(text, 16).map_err(|_| anyhow!("invalid color: {}", raw))
    };
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (slot, ch) in rgb.iter_mut().zip(hex.chars()) {
                let digit = ch
                    .to_digit(16)
                    .ok_or_else(|| anyhow!("invalid color: {}", raw))? as u8;
                *slot = digit * 17;
            }
            Ok(ColorU8::from_rgba(rgb[0], rgb[1], rgb[2], 0xff))
        }
        6 => Ok(ColorU8::from_rgba(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            0xff,
        )),
        8 => Ok(ColorU8::from_rgba(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            channel(&hex[6..8])?,
        )),
        _ => Err(anyhow!("invalid color: {}", raw)),
    }
}

pub(crate) fn color_to_hex(color: ColorU8) -> String {
    format!(
        "#{:02x}{:02x}{:02x}",
        color.red(),
        color.green(),
        color.blue()
    )
}
