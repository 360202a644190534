use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ident::{self, Clock, HashedIdGenerator, IdGenerator, SystemClock};
use crate::overlay::{
    self, Alignment, BoxPx, FontSpec, OverlayStyle, Surface, TextField, TextMeasurer, TextRequest,
};
use crate::settings::Settings;
use crate::source::SourceImage;

pub const DEFAULT_MAIN_FONT_SIZE: f32 = 52.0;
pub const DEFAULT_TOP_TIME_FONT_SIZE: f32 = 46.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Date,
    PaymentTime,
    TransactionId,
    TopTime,
}

impl FieldKind {
    /// Later fields paint over earlier ones where boxes overlap.
    pub const RENDER_ORDER: [FieldKind; 4] = [
        FieldKind::Date,
        FieldKind::PaymentTime,
        FieldKind::TransactionId,
        FieldKind::TopTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Date => "date",
            FieldKind::PaymentTime => "payment_time",
            FieldKind::TransactionId => "transaction_id",
            FieldKind::TopTime => "top_time",
        }
    }
}

/// Raw form state. Persists across passes; the driver writes generated
/// values back into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldInputs {
    pub date_text: String,
    pub date_coords: String,
    pub payment_time_text: String,
    pub payment_time_coords: String,
    pub transaction_id_text: String,
    pub transaction_id_coords: String,
    pub top_time_text: String,
    pub top_time_coords: String,
    pub main_font_size: f32,
    pub top_time_font_size: f32,
    pub top_time_spacing: i32,
    pub alignment: String,
}

impl FieldInputs {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            date_text: settings.date_text.clone(),
            date_coords: settings.date_coords.clone(),
            payment_time_text: settings.payment_time_text.clone(),
            payment_time_coords: settings.payment_time_coords.clone(),
            transaction_id_text: String::new(),
            transaction_id_coords: settings.transaction_id_coords.clone(),
            top_time_text: settings.top_time_text.clone(),
            top_time_coords: settings.top_time_coords.clone(),
            main_font_size: settings.main_font_size,
            top_time_font_size: settings.top_time_font_size,
            top_time_spacing: settings.top_time_spacing,
            alignment: settings.alignment.clone(),
        }
    }

    fn text(&self, kind: FieldKind) -> &str {
        match kind {
            FieldKind::Date => &self.date_text,
            FieldKind::PaymentTime => &self.payment_time_text,
            FieldKind::TransactionId => &self.transaction_id_text,
            FieldKind::TopTime => &self.top_time_text,
        }
    }

    fn coords(&self, kind: FieldKind) -> &str {
        match kind {
            FieldKind::Date => &self.date_coords,
            FieldKind::PaymentTime => &self.payment_time_coords,
            FieldKind::TransactionId => &self.transaction_id_coords,
            FieldKind::TopTime => &self.top_time_coords,
        }
    }

    fn fields(&self, font_family: &str) -> Vec<(FieldKind, TextField)> {
        let alignment = Alignment::from_selector(&self.alignment);
        let main_size = effective_size(self.main_font_size, DEFAULT_MAIN_FONT_SIZE);
        let top_size = effective_size(self.top_time_font_size, DEFAULT_TOP_TIME_FONT_SIZE);
        FieldKind::RENDER_ORDER
            .into_iter()
            .map(|kind| {
                let (size, spacing) = match kind {
                    FieldKind::TopTime => (top_size, self.top_time_spacing),
                    _ => (main_size, 0),
                };
                let field = TextField {
                    name: kind.name().to_string(),
                    text: self.text(kind).to_string(),
                    coords: self.coords(kind).to_string(),
                    font: FontSpec::new(font_family, size),
                    alignment,
                    spacing,
                };
                (kind, field)
            })
            .collect()
    }
}

fn effective_size(value: f32, default: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldOutcome {
    Rendered {
        bbox: BoxPx,
        origin_x: Option<f32>,
        text_width: f32,
    },
    SkippedInvalidCoords {
        coords: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldReport {
    pub field: FieldKind,
    pub text: String,
    #[serde(flatten)]
    pub outcome: FieldOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub width: u32,
    pub height: u32,
    pub fields: Vec<FieldReport>,
}

impl PassReport {
    pub fn size_info(&self) -> String {
        format!(
            "source size: {}x{} px; all coordinates use this size",
            self.width, self.height
        )
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FieldReport> {
        self.fields
            .iter()
            .filter(|report| matches!(report.outcome, FieldOutcome::SkippedInvalidCoords { .. }))
    }
}

/// Owns the surface and recomposes it from the source image on every pass.
pub struct Composer<S: Surface> {
    surface: S,
    measurer: Box<dyn TextMeasurer>,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
    style: OverlayStyle,
    source: Option<SourceImage>,
}

impl<S: Surface> Composer<S> {
    pub fn new(surface: S, measurer: Box<dyn TextMeasurer>, style: OverlayStyle) -> Self {
        Self {
            surface,
            measurer,
            ids: Box::new(HashedIdGenerator::default()),
            clock: Box::new(SystemClock),
            style,
            source: None,
        }
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn set_source(&mut self, image: SourceImage) {
        info!(
            "source image: {}x{} ({})",
            image.width(),
            image.height(),
            image.mime()
        );
        self.source = Some(image);
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Runs one full pass. Returns `None` without touching the surface when
    /// no source image is loaded.
    pub fn render_pass(&mut self, inputs: &mut FieldInputs) -> Result<Option<PassReport>> {
        let Some(source) = self.source.as_ref() else {
            debug!("render pass skipped: no source image");
            return Ok(None);
        };
        self.surface
            .reset(source.pixels())
            .with_context(|| "failed to reset surface to the source image")?;

        let today = self.clock.today();
        if inputs.date_text.is_empty() {
            inputs.date_text = ident::display_date(today);
        }
        inputs.transaction_id_text = ident::transaction_id(today, self.ids.next_suffix());

        let mut reports = Vec::with_capacity(FieldKind::RENDER_ORDER.len());
        for (kind, field) in inputs.fields(&self.style.font_family) {
            let outcome = self.render_field(&field);
            reports.push(FieldReport {
                field: kind,
                text: field.text,
                outcome,
            });
        }

        let (width, height) = self.surface.dimensions();
        debug!("render pass done: {}x{}", width, height);
        Ok(Some(PassReport {
            width,
            height,
            fields: reports,
        }))
    }

    fn render_field(&mut self, field: &TextField) -> FieldOutcome {
        let Some(bbox) = overlay::parse_coords(&field.coords) else {
            warn!("skipping {}: invalid coords '{}'", field.name, field.coords);
            return FieldOutcome::SkippedInvalidCoords {
                coords: field.coords.clone(),
            };
        };
        let request = TextRequest {
            text: &field.text,
            bbox,
            font: &field.font,
            alignment: field.alignment,
            spacing: field.spacing,
        };
        let layout = overlay::draw_text_in_box(
            &mut self.surface,
            self.measurer.as_ref(),
            &request,
            &self.style,
        );
        FieldOutcome::Rendered {
            bbox,
            origin_x: layout.origin_x(),
            text_width: layout.total_width,
        }
    }
}
