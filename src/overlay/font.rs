use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tiny_skia::ColorU8;
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::{Group, Node, Options, Tree, fontdb};

use super::FontSpec;
use super::surface::text_svg;

/// Horizontal advance lookup for a run of text in a given font.
pub trait TextMeasurer {
    fn measure(&self, text: &str, font: &FontSpec) -> f32;
}

/// Measures text by laying it out with `usvg` against the database the
/// surface draws with. Fallback faces and `.notdef` glyphs get the advance
/// they are drawn at.
#[derive(Clone)]
pub struct ShapedMeasurer {
    fontdb: Arc<fontdb::Database>,
}

impl std::fmt::Debug for ShapedMeasurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedMeasurer")
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl ShapedMeasurer {
    pub fn new(fontdb: Arc<fontdb::Database>) -> Self {
        Self { fontdb }
    }

    fn advance(&self, text: &str, font: &FontSpec) -> Option<f32> {
        let chars = text.chars().count() as f32;
        let width = (font.size_px * chars * 2.0).ceil().max(1.0) as u32;
        let height = (font.size_px * 2.0).ceil().max(1.0) as u32;
        let svg = text_svg(
            width,
            height,
            text,
            0.0,
            font.size_px,
            font,
            ColorU8::from_rgba(0, 0, 0, 0xff),
        );
        let options = Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Options::default()
        };
        let tree = Tree::from_str(&svg, &options).ok()?;
        laid_out_width(tree.root())
    }
}

// The text bbox is built from glyph advances, not outlines.
fn laid_out_width(group: &Group) -> Option<f32> {
    group.children().iter().find_map(|node| match node {
        Node::Text(text) => Some(text.bounding_box().width()),
        Node::Group(group) => laid_out_width(group),
        _ => None,
    })
}

impl TextMeasurer for ShapedMeasurer {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        match self.advance(text, font) {
            Some(width) => width,
            None => {
                debug!("font: no layout for '{}', estimating", text);
                EstimatedMetrics.measure(text, font)
            }
        }
    }
}

/// Width estimate used when no installed face matches the requested families.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

impl TextMeasurer for EstimatedMetrics {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        estimate_text_width_units(text) * font.size_px
    }
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF00..=0xFFEF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(estimate_char_units_for_width)
        .sum()
}

/// A font file given on the command line or in settings.
#[derive(Clone)]
pub struct FontFile {
    data: Vec<u8>,
    family: Option<String>,
}

impl std::fmt::Debug for FontFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFile")
            .field("family", &self.family)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FontFile {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }
}

pub fn load_font_file(path: &Path) -> Result<FontFile> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    font_file_from_data(data)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn font_file_from_data(data: Vec<u8>) -> Result<FontFile> {
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    let family = (0..count)
        .find_map(|index| Face::parse(&data, index).ok())
        .map(|face| extract_family_name(&face))
        .ok_or_else(|| anyhow!("failed to parse font data"))?;
    Ok(FontFile { data, family })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOverlayFont {
    /// Family list handed to the renderer and the measurer.
    pub family: String,
    /// Installed family the list resolved to, if any.
    pub resolved: Option<String>,
}

impl ResolvedOverlayFont {
    /// Measurer that agrees with what a surface over `db` draws.
    pub fn measurer(&self, db: Arc<fontdb::Database>) -> Box<dyn TextMeasurer> {
        match self.resolved {
            Some(_) => Box::new(ShapedMeasurer::new(db)),
            None => Box::new(EstimatedMetrics),
        }
    }
}

/// Picks the family used for both measuring and drawing.
///
/// An explicit font file wins and is registered in `db`. Otherwise the CSS
/// family list is walked in order. Generic names are first pointed at
/// installed faces, so `sans-serif` resolves on hosts without Arial.
pub fn resolve_overlay_font(
    db: &mut fontdb::Database,
    font_path: Option<&Path>,
    family_list: &str,
) -> Result<ResolvedOverlayFont> {
    if let Some(path) = font_path {
        let FontFile {
            data,
            family: file_family,
        } = load_font_file(path)?;
        let ids = db.load_font_source(fontdb::Source::Binary(Arc::new(data)));
        configure_generic_families(db);
        let family = ids
            .first()
            .and_then(|id| db.face(*id))
            .and_then(face_family)
            .map(str::to_string)
            .or(file_family)
            .ok_or_else(|| anyhow!("font has no family name: {}", path.display()))?;
        debug!("font: loaded {} from {}", family, path.display());
        return Ok(ResolvedOverlayFont {
            resolved: Some(family.clone()),
            family,
        });
    }

    configure_generic_families(db);
    for candidate in split_family_list(family_list) {
        match installed_family(db, &candidate) {
            Some(family) => {
                debug!("font: {} resolved to {}", candidate, family);
                return Ok(ResolvedOverlayFont {
                    resolved: Some(family.clone()),
                    family,
                });
            }
            None => debug!("font: {} is not installed", candidate),
        }
    }

    warn!(
        "no installed font matches '{}'; using estimated text widths",
        family_list
    );
    Ok(ResolvedOverlayFont {
        family: family_list.to_string(),
        resolved: None,
    })
}

type SetGenericFamily = fn(&mut fontdb::Database, String);

const SANS_SERIF_FACES: &[&str] = &[
    "DejaVu Sans",
    "Noto Sans",
    "Liberation Sans",
    "Helvetica",
    "Noto Sans CJK SC",
];
const SERIF_FACES: &[&str] = &["DejaVu Serif", "Noto Serif", "Liberation Serif"];
const MONOSPACE_FACES: &[&str] = &["DejaVu Sans Mono", "Noto Sans Mono", "Liberation Mono"];

/// Points each generic family that names a missing face at an installed one,
/// preferring common families and then the first face in `db`.
pub fn configure_generic_families(db: &mut fontdb::Database) {
    let Some(first) = db.faces().find_map(face_family).map(str::to_string) else {
        return;
    };
    let generics: [(fontdb::Family<'static>, &[&str], SetGenericFamily); 5] = [
        (
            fontdb::Family::SansSerif,
            SANS_SERIF_FACES,
            fontdb::Database::set_sans_serif_family::<String>,
        ),
        (
            fontdb::Family::Serif,
            SERIF_FACES,
            fontdb::Database::set_serif_family::<String>,
        ),
        (
            fontdb::Family::Monospace,
            MONOSPACE_FACES,
            fontdb::Database::set_monospace_family::<String>,
        ),
        (
            fontdb::Family::Cursive,
            SANS_SERIF_FACES,
            fontdb::Database::set_cursive_family::<String>,
        ),
        (
            fontdb::Family::Fantasy,
            SANS_SERIF_FACES,
            fontdb::Database::set_fantasy_family::<String>,
        ),
    ];
    for (generic, preferred, set) in generics {
        if query_families(db, &[generic]).is_some() {
            continue;
        }
        let family = preferred
            .iter()
            .find(|name| query_families(db, &[fontdb::Family::Name(**name)]).is_some())
            .map(|name| name.to_string())
            .unwrap_or_else(|| first.clone());
        debug!("font: {} -> {}", db.family_name(&generic), family);
        set(db, family);
    }
}

/// Splits a CSS font-family list, dropping quotes and empty entries.
pub fn split_family_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|name| name.trim().trim_matches(|ch| ch == '"' || ch == '\''))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .collect()
}

/// Re-quotes named families so names with digits or odd characters survive
/// CSS parsing. Generic keywords stay bare.
pub(crate) fn css_family_list(list: &str) -> String {
    split_family_list(list)
        .into_iter()
        .map(|name| {
            if generic_family(&name).is_some() {
                name
            } else {
                format!("\"{}\"", name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn generic_family(name: &str) -> Option<fontdb::Family<'static>> {
    match name.to_ascii_lowercase().as_str() {
        "sans-serif" => Some(fontdb::Family::SansSerif),
        "serif" => Some(fontdb::Family::Serif),
        "monospace" => Some(fontdb::Family::Monospace),
        "cursive" => Some(fontdb::Family::Cursive),
        "fantasy" => Some(fontdb::Family::Fantasy),
        _ => None,
    }
}

fn query_families(db: &fontdb::Database, families: &[fontdb::Family<'_>]) -> Option<fontdb::ID> {
    db.query(&fontdb::Query {
        families,
        ..Default::default()
    })
}

fn installed_family(db: &fontdb::Database, family: &str) -> Option<String> {
    let families = [generic_family(family).unwrap_or(fontdb::Family::Name(family))];
    let id = query_families(db, &families)?;
    db.face(id).and_then(face_family).map(str::to_string)
}

fn face_family(face: &fontdb::FaceInfo) -> Option<&str> {
    face.families
        .iter()
        .find(|(_, language)| *language == fontdb::Language::English_UnitedStates)
        .or_else(|| face.families.first())
        .map(|(name, _)| name.as_str())
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
