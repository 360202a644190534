use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::compose::{Composer, FieldInputs, PassReport};
use crate::overlay::Surface;

pub const DEFAULT_IMAGE: &str = "pay.png";

/// Decoded base image. Its pixel size is the coordinate space for every box.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: RgbaImage,
    mime: String,
    path: Option<PathBuf>,
}

impl SourceImage {
    pub fn from_bytes(bytes: &[u8], path: Option<&Path>) -> Result<Self> {
        let mime = sniff_image_mime(bytes).ok_or_else(|| match path {
            Some(path) => anyhow!("not a supported image: {}", path.display()),
            None => anyhow!("not a supported image"),
        })?;
        let decoded = image::load_from_memory(bytes)
            .with_context(|| format!("failed to decode {} image", mime))?;
        Ok(Self {
            pixels: decoded.to_rgba8(),
            mime: mime.to_string(),
            path: path.map(Path::to_path_buf),
        })
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            mime: "image/png".to_string(),
            path: None,
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    let detected = kind.mime_type();
    detected.starts_with("image/").then_some(detected)
}

pub async fn load_source_image(path: &Path) -> Result<SourceImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image: {}", path.display()))?;
    SourceImage::from_bytes(&bytes, Some(path))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded {
        width: u32,
        height: u32,
        default: bool,
    },
    Missing {
        path: String,
    },
}

impl LoadStatus {
    pub fn message(&self) -> String {
        match self {
            LoadStatus::Loaded {
                width,
                height,
                default: true,
            } => format!("default image loaded: {}x{}", width, height),
            LoadStatus::Loaded { width, height, .. } => {
                format!("image loaded: {}x{}", width, height)
            }
            LoadStatus::Missing { path } => {
                format!("default image '{}' not found; load one manually", path)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadStatus::Loaded { .. })
    }
}

/// Tries the conventional default image. A missing or unreadable file is a
/// status, not an error; the composer stays usable for a manual load.
pub async fn bootstrap<S: Surface>(
    composer: &mut Composer<S>,
    inputs: &mut FieldInputs,
    path: &Path,
) -> Result<(LoadStatus, Option<PassReport>)> {
    match load_source_image(path).await {
        Ok(image) => install(composer, inputs, image, true),
        Err(err) => {
            warn!("{:#}", err);
            Ok((
                LoadStatus::Missing {
                    path: path.display().to_string(),
                },
                None,
            ))
        }
    }
}

/// Loads a user-chosen image and runs the first pass on it.
pub async fn load_manual<S: Surface>(
    composer: &mut Composer<S>,
    inputs: &mut FieldInputs,
    path: &Path,
) -> Result<(LoadStatus, Option<PassReport>)> {
    let image = load_source_image(path).await?;
    install(composer, inputs, image, false)
}

fn install<S: Surface>(
    composer: &mut Composer<S>,
    inputs: &mut FieldInputs,
    image: SourceImage,
    default: bool,
) -> Result<(LoadStatus, Option<PassReport>)> {
    let status = LoadStatus::Loaded {
        width: image.width(),
        height: image.height(),
        default,
    };
    composer.set_source(image);
    let report = composer.render_pass(inputs)?;
    info!("{}", status.message());
    Ok((status, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayStyle;
    use crate::test_util::{FixedClock, RecordingSurface, SequenceIds, half_em};
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    fn composer() -> Composer<RecordingSurface> {
        Composer::new(
            RecordingSurface::new(0, 0),
            Box::new(half_em()),
            OverlayStyle::default(),
        )
        .with_clock(FixedClock::jan_15_2024())
        .with_id_generator(SequenceIds::new(&[5]))
    }

    #[test]
    fn decodes_png_bytes() {
        let image = SourceImage::from_bytes(&png_bytes(6, 4), None).expect("image");
        assert_eq!((image.width(), image.height()), (6, 4));
        assert_eq!(image.mime(), "image/png");
        assert_eq!(image.pixels().get_pixel(5, 3).0, [1, 2, 3, 255]);
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = SourceImage::from_bytes(b"hello world", Some(Path::new("notes.txt")))
            .expect_err("not an image");
        assert!(err.to_string().contains("notes.txt"));
    }

    #[tokio::test]
    async fn bootstrap_reports_missing_default_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_IMAGE);
        let mut composer = composer();
        let mut inputs = FieldInputs::default();
        let (status, report) = bootstrap(&mut composer, &mut inputs, &path)
            .await
            .expect("bootstrap");
        assert!(!status.is_loaded());
        assert!(report.is_none());
        assert!(status.message().contains("not found"));
        assert!(composer.source().is_none());
    }

    #[tokio::test]
    async fn bootstrap_loads_and_renders_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_IMAGE);
        std::fs::write(&path, png_bytes(30, 20)).expect("write png");
        let mut composer = composer();
        let mut inputs = FieldInputs {
            date_coords: "0,0,30,10".to_string(),
            ..FieldInputs::default()
        };
        let (status, report) = bootstrap(&mut composer, &mut inputs, &path)
            .await
            .expect("bootstrap");
        assert_eq!(
            status,
            LoadStatus::Loaded {
                width: 30,
                height: 20,
                default: true
            }
        );
        assert_eq!(status.message(), "default image loaded: 30x20");
        let report = report.expect("report");
        assert_eq!((report.width, report.height), (30, 20));
        assert_eq!(composer.source().and_then(|s| s.path()), Some(path.as_path()));
        assert_eq!(inputs.date_text, "2024年01月15日");
    }

    #[tokio::test]
    async fn manual_load_propagates_errors() {
        let mut composer = composer();
        let mut inputs = FieldInputs::default();
        let result = load_manual(&mut composer, &mut inputs, Path::new("/no/such/image.png")).await;
        assert!(result.is_err());
    }
}
