use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::compose::{Composer, FieldInputs, PassReport};
use crate::overlay::PixmapSurface;

pub const EXPORT_MIME: &str = "image/png";

#[derive(Debug)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub bytes: usize,
    pub report: PassReport,
}

pub fn export_file_name(unix_millis: i64) -> String {
    format!("modified_image_{}.png", unix_millis)
}

pub fn encode_png(surface: &PixmapSurface) -> Result<Vec<u8>> {
    let image = surface
        .to_rgba_image()
        .ok_or_else(|| anyhow!("surface has not been rendered yet"))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .with_context(|| "failed to encode surface as PNG")?;
    Ok(bytes)
}

pub fn to_data_url(surface: &PixmapSurface) -> Result<String> {
    let bytes = encode_png(surface)?;
    Ok(format!("data:{};base64,{}", EXPORT_MIME, BASE64.encode(bytes)))
}

/// Redraws with the current inputs, then snapshots the surface.
fn fresh_pass(
    composer: &mut Composer<PixmapSurface>,
    inputs: &mut FieldInputs,
) -> Result<PassReport> {
    composer
        .render_pass(inputs)?
        .ok_or_else(|| anyhow!("load an image first"))
}

pub fn export_png(
    composer: &mut Composer<PixmapSurface>,
    inputs: &mut FieldInputs,
    dir: &Path,
) -> Result<ExportOutcome> {
    let report = fresh_pass(composer, inputs)?;
    let bytes = encode_png(composer.surface())?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
    let path = dir.join(export_file_name(composer.clock().unix_millis()));
    std::fs::write(&path, &bytes)
        .with_context(|| format!("failed to write image: {}", path.display()))?;
    info!("export: wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(ExportOutcome {
        path,
        bytes: bytes.len(),
        report,
    })
}

pub fn export_data_url(
    composer: &mut Composer<PixmapSurface>,
    inputs: &mut FieldInputs,
) -> Result<(String, PassReport)> {
    let report = fresh_pass(composer, inputs)?;
    let url = to_data_url(composer.surface())?;
    Ok((url, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayStyle;
    use crate::source::SourceImage;
    use crate::test_util::{FixedClock, SequenceIds, half_em};
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::sync::Arc;
    use usvg::fontdb;

    fn composer() -> Composer<PixmapSurface> {
        Composer::new(
            PixmapSurface::new(Arc::new(fontdb::Database::new())),
            Box::new(half_em()),
            OverlayStyle::default(),
        )
        .with_clock(FixedClock::jan_15_2024())
        .with_id_generator(SequenceIds::new(&[3]))
    }

    fn inputs() -> FieldInputs {
        FieldInputs {
            date_coords: "2,2,30,12".to_string(),
            ..FieldInputs::default()
        }
    }

    #[test]
    fn export_requires_an_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = export_png(&mut composer(), &mut inputs(), dir.path()).expect_err("no image");
        assert_eq!(err.to_string(), "load an image first");
        assert!(export_data_url(&mut composer(), &mut inputs()).is_err());
    }

    #[test]
    fn export_writes_a_timestamped_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut composer = composer();
        composer.set_source(SourceImage::from_rgba(RgbaImage::from_pixel(
            40,
            20,
            Rgba([255, 255, 255, 255]),
        )));
        let mut inputs = inputs();
        let outcome = export_png(&mut composer, &mut inputs, dir.path()).expect("export");
        assert_eq!(
            outcome.path.file_name().and_then(|name| name.to_str()),
            Some("modified_image_1705312800000.png")
        );
        let written = image::open(&outcome.path).expect("decode export");
        assert_eq!(written.dimensions(), (40, 20));
        assert_eq!(written.get_pixel(5, 5).0, [0x16, 0x16, 0x16, 0xff]);
        assert_eq!(written.get_pixel(35, 15).0, [255, 255, 255, 255]);
        assert_eq!(outcome.report.width, 40);
    }

    #[test]
    fn data_url_is_base64_png() {
        let mut composer = composer();
        composer.set_source(SourceImage::from_rgba(RgbaImage::from_pixel(
            4,
            4,
            Rgba([0, 0, 0, 255]),
        )));
        let (url, report) = export_data_url(&mut composer, &mut inputs()).expect("data url");
        let payload = url
            .strip_prefix("data:image/png;base64,")
            .expect("data url prefix");
        let bytes = BASE64.decode(payload).expect("base64");
        assert_eq!(&bytes[..4], b"\x89PNG");
        assert_eq!((report.width, report.height), (4, 4));
    }
}
