use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compose::{DEFAULT_MAIN_FONT_SIZE, DEFAULT_TOP_TIME_FONT_SIZE};
use crate::overlay::{DEFAULT_BACKDROP_COLOR, DEFAULT_FONT_FAMILY, DEFAULT_TEXT_COLOR};
use crate::source::DEFAULT_IMAGE;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub default_image: String,
    pub backdrop_color: String,
    pub text_color: String,
    pub font_family: String,
    pub font_path: Option<String>,
    pub main_font_size: f32,
    pub top_time_font_size: f32,
    pub top_time_spacing: i32,
    pub alignment: String,
    pub date_coords: String,
    pub date_text: String,
    pub payment_time_coords: String,
    pub payment_time_text: String,
    pub transaction_id_coords: String,
    pub top_time_coords: String,
    pub top_time_text: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_image: DEFAULT_IMAGE.to_string(),
            backdrop_color: DEFAULT_BACKDROP_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_path: None,
            main_font_size: DEFAULT_MAIN_FONT_SIZE,
            top_time_font_size: DEFAULT_TOP_TIME_FONT_SIZE,
            top_time_spacing: 0,
            alignment: "center".to_string(),
            date_coords: "330,880,750,950".to_string(),
            date_text: String::new(),
            payment_time_coords: "330,960,750,1030".to_string(),
            payment_time_text: String::new(),
            transaction_id_coords: "200,1250,1000,1320".to_string(),
            top_time_coords: "40,20,200,80".to_string(),
            top_time_text: String::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    source: Option<SourceSettings>,
    style: Option<StyleSettings>,
    fonts: Option<FontSettings>,
    layout: Option<LayoutSettings>,
    fields: Option<FieldsSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceSettings {
    image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    backdrop_color: Option<String>,
    text_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    main_size: Option<f32>,
    top_time_size: Option<f32>,
    top_time_spacing: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSettings {
    alignment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldsSettings {
    date: Option<FieldSettings>,
    payment_time: Option<FieldSettings>,
    transaction_id: Option<FieldSettings>,
    top_time: Option<FieldSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldSettings {
    coords: Option<String>,
    text: Option<String>,
}

/// Loads settings from the working directory, the home directory and
/// `extra_path`, later files overriding earlier ones.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    ensure_home_settings_file()?;
    let mut dirs = vec![PathBuf::from(".")];
    if let Some(home) = home_dir() {
        dirs.push(home);
    }
    load_settings_from(&dirs, extra_path)
}

pub fn load_settings_from(dirs: &[PathBuf], extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut ordered_paths = Vec::new();
    for dir in dirs {
        ordered_paths.push(dir.join("settings.toml"));
        ordered_paths.push(dir.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl Settings {
    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(source) = incoming.source {
            if let Some(image) = non_empty(source.image) {
                self.default_image = image;
            }
        }
        if let Some(style) = incoming.style {
            if let Some(color) = non_empty(style.backdrop_color) {
                self.backdrop_color = color;
            }
            if let Some(color) = non_empty(style.text_color) {
                self.text_color = color;
            }
            if let Some(family) = non_empty(style.font_family) {
                self.font_family = family;
            }
            if let Some(path) = non_empty(style.font_path) {
                self.font_path = Some(path);
            }
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(size) = fonts.main_size.filter(|size| *size > 0.0) {
                self.main_font_size = size;
            }
            if let Some(size) = fonts.top_time_size.filter(|size| *size > 0.0) {
                self.top_time_font_size = size;
            }
            if let Some(spacing) = fonts.top_time_spacing {
                self.top_time_spacing = spacing;
            }
        }
        if let Some(layout) = incoming.layout {
            if let Some(alignment) = non_empty(layout.alignment) {
                self.alignment = alignment;
            }
        }
        if let Some(fields) = incoming.fields {
            merge_field(fields.date, &mut self.date_coords, Some(&mut self.date_text));
            merge_field(
                fields.payment_time,
                &mut self.payment_time_coords,
                Some(&mut self.payment_time_text),
            );
            merge_field(fields.transaction_id, &mut self.transaction_id_coords, None);
            merge_field(
                fields.top_time,
                &mut self.top_time_coords,
                Some(&mut self.top_time_text),
            );
        }
    }
}

// transaction ids are regenerated every pass, so their text is not configurable
fn merge_field(field: Option<FieldSettings>, coords: &mut String, text: Option<&mut String>) {
    let Some(field) = field else {
        return;
    };
    if let Some(value) = non_empty(field.coords) {
        *coords = value;
    }
    if let (Some(slot), Some(value)) = (text, field.text) {
        *slot = value;
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".receipt-overlay"))
        }
    })
}
