use super::{
    Alignment, BoxPx, FontSpec, LineLayout, OverlayStyle, Surface, TextMeasurer, layout_line,
};

pub struct TextRequest<'a> {
    pub text: &'a str,
    pub bbox: BoxPx,
    pub font: &'a FontSpec,
    pub alignment: Alignment,
    pub spacing: i32,
}

/// Masks the box with the backdrop color, then draws the text inside it.
///
/// The backdrop is painted even when there is nothing to draw, so an empty
/// field still clears whatever the source image had in that region.
pub fn draw_text_in_box<S: Surface + ?Sized>(
    surface: &mut S,
    measurer: &dyn TextMeasurer,
    request: &TextRequest<'_>,
    style: &OverlayStyle,
) -> LineLayout {
    surface.fill_rect(request.bbox, style.backdrop_color);
    let layout = layout_line(
        request.text,
        request.bbox,
        request.font,
        request.alignment,
        request.spacing,
        measurer,
    );
    for run in &layout.runs {
        surface.fill_text(&run.text, run.x, layout.y, request.font, style.text_color);
    }
    layout
}
