use anyhow::Result;
use image::{Rgba, RgbaImage};
use receipt_overlay::ident::{Clock, IdGenerator};
use receipt_overlay::{
    BoxPx, Composer, FieldInputs, FontSpec, OverlayStyle, SourceImage, Surface, TextMeasurer,
};
use time::{Date, Month};
use tiny_skia::ColorU8;

struct HalfEm;

impl TextMeasurer for HalfEm {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        text.chars().count() as f32 * font.size_px / 2.0
    }
}

#[derive(Default)]
struct Recorder {
    ops: Vec<String>,
    size: (u32, u32),
}

fn hex(color: ColorU8) -> String {
    format!(
        "#{:02x}{:02x}{:02x}",
        color.red(),
        color.green(),
        color.blue()
    )
}

impl Surface for Recorder {
    fn reset(&mut self, image: &RgbaImage) -> Result<()> {
        self.size = image.dimensions();
        self.ops = vec![format!("reset {}x{}", self.size.0, self.size.1)];
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn fill_rect(&mut self, bbox: BoxPx, color: ColorU8) {
        self.ops.push(format!(
            "fill_rect [{},{},{},{}] {}",
            bbox.x1,
            bbox.y1,
            bbox.x2,
            bbox.y2,
            hex(color)
        ));
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font: &FontSpec, color: ColorU8) {
        self.ops.push(format!(
            "fill_text {:?} x={} y={} font={} color={}",
            text,
            x,
            y,
            font.css(),
            hex(color)
        ));
    }
}

struct Jan15;

impl Clock for Jan15 {
    fn today(&self) -> Date {
        Date::from_calendar_date(2024, Month::January, 15).expect("date")
    }

    fn unix_millis(&self) -> i64 {
        1_705_312_800_000
    }
}

struct Fixed(u32);

impl IdGenerator for Fixed {
    fn next_suffix(&mut self) -> u32 {
        self.0
    }
}

#[test]
fn recorded_draw_operations() {
    let style = OverlayStyle {
        font_family: "sans-serif".to_string(),
        ..OverlayStyle::default()
    };
    let mut composer = Composer::new(Recorder::default(), Box::new(HalfEm), style)
        .with_clock(Jan15)
        .with_id_generator(Fixed(42));
    composer.set_source(SourceImage::from_rgba(RgbaImage::from_pixel(
        800,
        600,
        Rgba([255, 255, 255, 255]),
    )));

    let mut inputs = FieldInputs {
        date_text: String::new(),
        date_coords: "100,100,400,160".to_string(),
        payment_time_text: "12:30:45".to_string(),
        payment_time_coords: "100,200,400,260".to_string(),
        transaction_id_text: String::new(),
        transaction_id_coords: "0,300,800,360".to_string(),
        top_time_text: "09:41".to_string(),
        top_time_coords: "20,10,220,50".to_string(),
        main_font_size: 52.0,
        top_time_font_size: 46.0,
        top_time_spacing: 4,
        alignment: "center".to_string(),
    };
    let report = composer
        .render_pass(&mut inputs)
        .expect("render pass")
        .expect("source loaded");
    assert_eq!((report.width, report.height), (800, 600));

    insta::assert_snapshot!(composer.surface().ops.join("\n"));
}
