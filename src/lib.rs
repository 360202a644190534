use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use usvg::fontdb;

pub mod compose;
pub mod export;
pub mod ident;
pub mod logging;
pub mod overlay;
pub mod settings;
pub mod source;
mod test_util;

pub use compose::{Composer, FieldInputs, FieldKind, FieldOutcome, PassReport};
pub use overlay::{Alignment, BoxPx, FontSpec, OverlayStyle, PixmapSurface, Surface, TextMeasurer};
pub use source::{LoadStatus, SourceImage};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: Option<String>,
    pub output_dir: Option<String>,
    pub date: Option<String>,
    pub date_coords: Option<String>,
    pub payment_time: Option<String>,
    pub payment_time_coords: Option<String>,
    pub transaction_id_coords: Option<String>,
    pub top_time: Option<String>,
    pub top_time_coords: Option<String>,
    pub main_font_size: Option<f32>,
    pub top_time_font_size: Option<f32>,
    pub top_time_spacing: Option<i32>,
    pub alignment: Option<String>,
    pub font_family: Option<String>,
    pub settings_path: Option<String>,
    pub data_url: bool,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    status: &'a LoadStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a PassReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let mut inputs = FieldInputs::from_settings(&settings);
    apply_overrides(&config, &mut inputs);

    let family = config
        .font_family
        .clone()
        .unwrap_or_else(|| settings.font_family.clone());
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let font_path = settings.font_path.as_deref().map(Path::new);
    let resolved = overlay::resolve_overlay_font(&mut db, font_path, &family)?;
    let style = OverlayStyle::from_parts(
        &settings.backdrop_color,
        &settings.text_color,
        &resolved.family,
    )?;
    let db = Arc::new(db);
    let surface = PixmapSurface::new(Arc::clone(&db));
    let mut composer = Composer::new(surface, resolved.measurer(db), style);

    let (status, _) = match config.image.as_deref() {
        Some(path) => source::load_manual(&mut composer, &mut inputs, Path::new(path)).await?,
        None => {
            source::bootstrap(&mut composer, &mut inputs, Path::new(&settings.default_image))
                .await?
        }
    };
    if !status.is_loaded() {
        return format_output(&config, &status, None, None);
    }

    if config.data_url {
        let (url, report) = export::export_data_url(&mut composer, &mut inputs)?;
        return format_output(&config, &status, Some(&report), Some(url));
    }

    let dir = config
        .output_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let outcome = export::export_png(&mut composer, &mut inputs, &dir)?;
    let written = outcome.path.display().to_string();
    format_output(&config, &status, Some(&outcome.report), Some(written))
}

fn apply_overrides(config: &Config, inputs: &mut FieldInputs) {
    let text_overrides = [
        (&config.date, &mut inputs.date_text),
        (&config.date_coords, &mut inputs.date_coords),
        (&config.payment_time, &mut inputs.payment_time_text),
        (&config.payment_time_coords, &mut inputs.payment_time_coords),
        (
            &config.transaction_id_coords,
            &mut inputs.transaction_id_coords,
        ),
        (&config.top_time, &mut inputs.top_time_text),
        (&config.top_time_coords, &mut inputs.top_time_coords),
        (&config.alignment, &mut inputs.alignment),
    ];
    for (value, slot) in text_overrides {
        if let Some(value) = value {
            *slot = value.clone();
        }
    }
    if let Some(size) = config.main_font_size {
        inputs.main_font_size = size;
    }
    if let Some(size) = config.top_time_font_size {
        inputs.top_time_font_size = size;
    }
    if let Some(spacing) = config.top_time_spacing {
        inputs.top_time_spacing = spacing;
    }
}

fn format_output(
    config: &Config,
    status: &LoadStatus,
    report: Option<&PassReport>,
    output: Option<String>,
) -> Result<String> {
    if config.json {
        let summary = RunSummary {
            status,
            message: status.message(),
            report,
            output,
        };
        return Ok(serde_json::to_string_pretty(&summary)?);
    }

    let mut lines = vec![status.message()];
    if let Some(report) = report {
        lines.push(report.size_info());
        for skipped in report.skipped() {
            if let FieldOutcome::SkippedInvalidCoords { coords } = &skipped.outcome {
                lines.push(format!(
                    "skipped {}: invalid coords '{}'",
                    skipped.field.name(),
                    coords
                ));
            }
        }
    }
    if let Some(output) = output {
        if config.data_url {
            lines.push(output);
        } else {
            lines.push(format!("wrote {}", output));
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::BoxPx;

    fn report() -> PassReport {
        PassReport {
            width: 800,
            height: 600,
            fields: vec![
                compose::FieldReport {
                    field: FieldKind::Date,
                    text: "2024年01月15日".to_string(),
                    outcome: FieldOutcome::Rendered {
                        bbox: BoxPx {
                            x1: 100,
                            y1: 100,
                            x2: 400,
                            y2: 160,
                        },
                        origin_x: Some(107.0),
                        text_width: 286.0,
                    },
                },
                compose::FieldReport {
                    field: FieldKind::TopTime,
                    text: "09:41".to_string(),
                    outcome: FieldOutcome::SkippedInvalidCoords {
                        coords: "1,2".to_string(),
                    },
                },
            ],
        }
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let mut inputs = FieldInputs {
            date_coords: "1,1,2,2".to_string(),
            payment_time_text: "08:00:00".to_string(),
            main_font_size: 52.0,
            ..FieldInputs::default()
        };
        let config = Config {
            date_coords: Some("10,10,20,20".to_string()),
            top_time_spacing: Some(4),
            alignment: Some("right".to_string()),
            ..Config::default()
        };
        apply_overrides(&config, &mut inputs);
        assert_eq!(inputs.date_coords, "10,10,20,20");
        assert_eq!(inputs.payment_time_text, "08:00:00");
        assert_eq!(inputs.top_time_spacing, 4);
        assert_eq!(inputs.alignment, "right");
        assert_eq!(inputs.main_font_size, 52.0);
    }

    #[test]
    fn text_output_lists_skipped_fields_and_destination() {
        let status = LoadStatus::Loaded {
            width: 800,
            height: 600,
            default: false,
        };
        let output = format_output(
            &Config::default(),
            &status,
            Some(&report()),
            Some("out/modified_image_1.png".to_string()),
        )
        .expect("output");
        assert_eq!(
            output,
            "image loaded: 800x600\n\
             source size: 800x600 px; all coordinates use this size\n\
             skipped top_time: invalid coords '1,2'\n\
             wrote out/modified_image_1.png"
        );
    }

    #[test]
    fn json_output_serializes_the_report() {
        let status = LoadStatus::Loaded {
            width: 800,
            height: 600,
            default: true,
        };
        let config = Config {
            json: true,
            ..Config::default()
        };
        let output = format_output(&config, &status, Some(&report()), None).expect("output");
        let value: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value["status"]["status"], "loaded");
        assert_eq!(value["report"]["fields"][0]["field"], "date");
        assert_eq!(value["report"]["fields"][0]["status"], "rendered");
        assert_eq!(value["report"]["fields"][0]["origin_x"], 107.0);
        assert_eq!(value["report"]["fields"][1]["status"], "skipped_invalid_coords");
        assert!(value.get("output").is_none());
    }

    #[test]
    fn missing_image_reports_status_only() {
        let status = LoadStatus::Missing {
            path: "pay.png".to_string(),
        };
        let output = format_output(&Config::default(), &status, None, None).expect("output");
        assert_eq!(output, "default image 'pay.png' not found; load one manually");
    }
}
