//! Treemap render pipeline.
//!
//! Drawing goes through the [`Surface`] trait so the same pipeline feeds the
//! egui painter and headless tests. [`DisplayList`] is the recording surface;
//! [`RenderCache`] keeps one around and only re-records when the scene changes.

use std::borrow::Cow;

use crate::canvas::{PixelRect, Viewport};
use crate::color::{color_for, Rgb};
use crate::format::format_size;
use crate::treemap::Rect;

/// Rects thinner than this in either axis are not drawn at all.
pub const MIN_VISIBLE_PX: f32 = 2.0;
pub const MIN_LABEL_WIDTH: f32 = 60.0;
pub const MIN_LABEL_HEIGHT: f32 = 20.0;
/// Height above which the size line is drawn under the name.
pub const MIN_SIZE_LINE_HEIGHT: f32 = 40.0;
pub const LABEL_PADDING: f32 = 4.0;
pub const SIZE_LINE_OFFSET: f32 = 18.0;
pub const FONT_SIZE: f32 = 12.0;

pub const BORDER_COLOR: Rgb = Rgb::BLACK;
pub const BORDER_WIDTH: f32 = 1.0;
pub const HOVER_COLOR: Rgb = Rgb::WHITE;
pub const HOVER_WIDTH: f32 = 3.0;
pub const LABEL_COLOR: Rgb = Rgb::WHITE;

const ELLIPSIS: &str = "...";

/// Measures label text at [`FONT_SIZE`].
pub trait TextMetrics {
    fn text_width(&self, text: &str) -> f32;
}

impl<T: TextMetrics + ?Sized> TextMetrics for &T {
    fn text_width(&self, text: &str) -> f32 {
        (**self).text_width(text)
    }
}

/// Fixed advance per character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMetrics {
    pub advance: f32,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self { advance: 7.0 }
    }
}

impl TextMetrics for MonospaceMetrics {
    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.advance
    }
}

/// A 2D drawing target in canvas pixels.
pub trait Surface: TextMetrics {
    fn clear(&mut self, width: f32, height: f32);
    fn fill_rect(&mut self, rect: PixelRect, color: Rgb);
    fn stroke_rect(&mut self, rect: PixelRect, line_width: f32, color: Rgb);
    /// Draw text with its top-left corner at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Rgb);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear { width: f32, height: f32 },
    FillRect { rect: PixelRect, color: Rgb },
    StrokeRect { rect: PixelRect, line_width: f32, color: Rgb },
    Text { text: String, x: f32, y: f32, color: Rgb },
}

/// Surface that records draw calls for later replay.
pub struct DisplayList<M> {
    commands: Vec<DrawCommand>,
    metrics: M,
}

impl<M: TextMetrics> DisplayList<M> {
    pub fn new(metrics: M) -> Self {
        Self {
            commands: Vec::new(),
            metrics,
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }
}

impl<M: TextMetrics> TextMetrics for DisplayList<M> {
    fn text_width(&self, text: &str) -> f32 {
        self.metrics.text_width(text)
    }
}

impl<M: TextMetrics> Surface for DisplayList<M> {
    fn clear(&mut self, width: f32, height: f32) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear { width, height });
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgb) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn stroke_rect(&mut self, rect: PixelRect, line_width: f32, color: Rgb) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            line_width,
            color,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Rgb) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            color,
        });
    }
}

/// Everything a draw cycle reads.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub rects: &'a [Rect],
    /// Index into `rects`.
    pub hovered: Option<usize>,
    pub viewport: Viewport,
}

/// Run one draw cycle. Returns `false` when there was no surface to draw on.
pub fn render<S: Surface + ?Sized>(surface: Option<&mut S>, scene: &Scene<'_>) -> bool {
    let Some(surface) = surface else {
        log::trace!("No drawing surface, skipping draw cycle");
        return false;
    };

    let viewport = scene.viewport;
    surface.clear(viewport.width as f32, viewport.height as f32);

    for rect in scene.rects {
        let px = viewport.to_pixels(rect);
        // Negated so NaN spans are skipped too.
        if !(px.width >= MIN_VISIBLE_PX && px.height >= MIN_VISIBLE_PX) {
            continue;
        }

        surface.fill_rect(px, color_for(&rect.name).to_rgb());
        surface.stroke_rect(px, BORDER_WIDTH, BORDER_COLOR);

        if px.width > MIN_LABEL_WIDTH && px.height > MIN_LABEL_HEIGHT {
            let max_width = px.width - 2.0 * LABEL_PADDING;
            let label = truncate_label(&rect.name, max_width, &*surface);
            surface.fill_text(&label, px.x + LABEL_PADDING, px.y + LABEL_PADDING, LABEL_COLOR);

            if px.height > MIN_SIZE_LINE_HEIGHT {
                surface.fill_text(
                    &format_size(rect.size),
                    px.x + LABEL_PADDING,
                    px.y + SIZE_LINE_OFFSET,
                    LABEL_COLOR,
                );
            }
        }
    }

    // Border-only overlay on top of everything else.
    if let Some(hovered) = scene.hovered.and_then(|i| scene.rects.get(i)) {
        surface.stroke_rect(viewport.to_pixels(hovered), HOVER_WIDTH, HOVER_COLOR);
    }

    true
}

/// Shorten `name` with a trailing ellipsis until it fits in `max_width`.
///
/// Characters are dropped from the end one at a time; if nothing fits the
/// result is the bare ellipsis.
pub fn truncate_label<'a, M: TextMetrics + ?Sized>(
    name: &'a str,
    max_width: f32,
    metrics: &M,
) -> Cow<'a, str> {
    if metrics.text_width(name) <= max_width {
        return Cow::Borrowed(name);
    }

    let mut end = name.len();
    let mut candidate = format!("{name}{ELLIPSIS}");
    while end > 0 && metrics.text_width(&candidate) > max_width {
        end = name[..end].char_indices().next_back().map_or(0, |(i, _)| i);
        candidate.clear();
        candidate.push_str(&name[..end]);
        candidate.push_str(ELLIPSIS);
    }

    Cow::Owned(candidate)
}

/// Retained draw output, re-recorded only when the scene key changes.
#[derive(Debug, Default)]
pub struct RenderCache {
    key: Option<(u64, Viewport)>,
    commands: Vec<DrawCommand>,
}

impl RenderCache {
    /// Re-record if `revision` or the viewport changed since the last call.
    /// Returns whether a draw cycle ran.
    pub fn refresh<M: TextMetrics>(&mut self, revision: u64, scene: &Scene<'_>, metrics: M) -> bool {
        let key = (revision, scene.viewport);
        if self.key == Some(key) {
            return false;
        }

        let mut list = DisplayList::new(metrics);
        if render(Some(&mut list), scene) {
            self.commands = list.into_commands();
            self.key = Some(key);
        }
        true
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}
