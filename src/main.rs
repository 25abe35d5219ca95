use eframe::egui;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use spacescout_view::canvas::{PixelRect, Viewport};
use spacescout_view::color::Rgb;
use spacescout_view::config::ViewConfig;
use spacescout_view::format::format_size;
use spacescout_view::navigation::Navigator;
use spacescout_view::process::{ProcessBackend, Waker};
use spacescout_view::render::{DrawCommand, RenderCache, TextMetrics, FONT_SIZE};
use spacescout_view::sync::SyncLayer;

const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(26, 26, 26);

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ViewConfig::load()?;

    // The backend starts before the window exists; repaint requests are dropped
    // until the egui context is handed over.
    let repaint: Arc<OnceLock<egui::Context>> = Arc::new(OnceLock::new());
    let slot = repaint.clone();
    let waker: Waker = Arc::new(move || {
        if let Some(ctx) = slot.get() {
            ctx.request_repaint();
        }
    });
    let backend = ProcessBackend::spawn(&config.backend, Some(waker))?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_title("SpaceScout - Disk Usage Explorer"),
        ..Default::default()
    };

    eframe::run_native(
        "SpaceScout",
        options,
        Box::new(move |cc| {
            configure_custom_style(&cc.egui_ctx);
            let _ = repaint.set(cc.egui_ctx.clone());
            Box::new(SpaceScoutApp::new(backend, &config))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}

fn configure_custom_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    // Dark theme, panels a shade lighter than the canvas
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = egui::Color32::from_rgb(42, 42, 42);
    visuals.window_fill = egui::Color32::from_rgb(30, 30, 30);
    visuals.window_stroke = egui::Stroke::new(1.0, egui::Color32::from_rgb(68, 68, 68));
    // Breadcrumb links
    visuals.hyperlink_color = egui::Color32::from_rgb(0, 153, 255);

    // Soft corners on widgets, flat alert window
    visuals.window_rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(4.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(4.0);
    visuals.widgets.active.rounding = egui::Rounding::same(4.0);
    visuals.window_shadow = egui::epaint::Shadow::NONE;

    style.visuals = visuals;

    // Toolbar spacing
    style.spacing.item_spacing = egui::vec2(12.0, 8.0);
    style.spacing.button_padding = egui::vec2(16.0, 6.0);

    ctx.set_style(style);
}

struct SpaceScoutApp {
    backend: ProcessBackend,
    sync: SyncLayer,
    navigator: Navigator,
    cache: RenderCache,
    scan_path: String,
    min_size_kb: u64,
}

impl SpaceScoutApp {
    fn new(backend: ProcessBackend, config: &ViewConfig) -> Self {
        let sync = SyncLayer::connect(&backend);
        Self {
            backend,
            sync,
            navigator: Navigator::new(),
            cache: RenderCache::default(),
            scan_path: String::new(),
            min_size_kb: config.default_min_size_kb,
        }
    }

    fn show_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("SpaceScout");
                ui.separator();

                ui.label("Path:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.scan_path)
                        .hint_text("/path/to/scan")
                        .desired_width(360.0),
                );

                ui.label("Min size (KB):");
                ui.add(egui::DragValue::new(&mut self.min_size_kb).speed(10.0));

                let scanning = self.sync.state().is_scanning();
                let label = if scanning { "Scanning..." } else { "Scan" };
                if ui.add_enabled(!scanning, egui::Button::new(label)).clicked() {
                    if let Err(err) = self.sync.start_scan(&self.backend, &self.scan_path, self.min_size_kb) {
                        log::warn!("Scan not started: {}", err);
                    }
                }

                if let Some(progress) = self.sync.state().progress() {
                    ui.spinner();
                    ui.label(format!(
                        "files: {} dirs: {} errors: {}",
                        progress.files, progress.dirs, progress.errors
                    ));
                }
            });
        });
    }

    fn show_breadcrumbs(&mut self, ctx: &egui::Context) {
        if self.sync.state().breadcrumbs().is_empty() {
            return;
        }

        let mut selected = None;
        egui::TopBottomPanel::top("breadcrumbs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let items = self.sync.state().breadcrumbs();
                let last = items.len() - 1;
                for (index, item) in items.iter().enumerate() {
                    if index == last {
                        ui.label(egui::RichText::new(item.name.as_str()).strong());
                    } else {
                        if ui.link(item.name.as_str()).clicked() {
                            selected = Some(index);
                        }
                        ui.label(egui::RichText::new("›").weak());
                    }
                }
            });
        });

        if let Some(index) = selected {
            self.navigator.select_breadcrumb(index, self.sync.state(), &self.backend);
        }
    }

    fn show_canvas(&mut self, ctx: &egui::Context, interactive: bool) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BACKGROUND))
            .show(ctx, |ui| {
                let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click());
                let origin = response.rect.min;

                // Viewport and hover follow the allocated canvas
                let state = self.sync.state_mut();
                state.set_viewport(Viewport::from_size(response.rect.width(), response.rect.height()));
                let pointer = response
                    .hover_pos()
                    .and_then(|pos| state.viewport().normalize(pos.x - origin.x, pos.y - origin.y));
                state.set_pointer(pointer);

                if interactive {
                    self.navigator.handle_keys(ctx, &self.backend);

                    if response.clicked() {
                        self.navigator.click(self.sync.state(), &self.backend);
                    }
                    if response.secondary_clicked() {
                        self.navigator.context_click(self.sync.state());
                    }
                }

                // Re-record only when the scene changed, replay every frame
                let state = self.sync.state();
                self.cache
                    .refresh(state.revision(), &state.scene(), EguiMetrics { ctx });
                replay(&painter, origin, self.cache.commands());

                if let Some(rect) = state.hovered() {
                    if rect.is_dir {
                        ctx.set_cursor_icon(egui::CursorIcon::PointingHand);
                    }
                    response.on_hover_ui_at_pointer(|ui| {
                        ui.strong(rect.name.as_str());
                        ui.label(format!("Size: {}", format_size(rect.size)));
                        ui.label(if rect.is_dir { "Type: Directory" } else { "Type: File" });
                        if rect.is_dir {
                            ui.weak("Click to zoom in");
                        }
                    });
                }
            });
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(message) = self.sync.state().alert().map(str::to_owned) else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new("SpaceScout")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if dismissed {
            self.sync.state_mut().dismiss_alert();
        }
    }
}

impl eframe::App for SpaceScoutApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.sync.pump();
        self.navigator.poll(&self.backend);

        if let Some(home) = self.sync.take_home_dir() {
            if self.scan_path.is_empty() {
                self.scan_path = home;
            }
        }

        let modal = self.sync.state().alert().is_some();
        self.show_toolbar(ctx);
        self.show_breadcrumbs(ctx);
        self.show_canvas(ctx, !modal);
        self.show_alert(ctx);
        self.navigator.end_frame(ctx);

        // Replies also wake us through the backend waker; this covers the
        // spinner while nothing arrives.
        if self.sync.is_waiting() || self.navigator.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

/// Label measurement through egui's font system.
struct EguiMetrics<'a> {
    ctx: &'a egui::Context,
}

impl TextMetrics for EguiMetrics<'_> {
    fn text_width(&self, text: &str) -> f32 {
        self.ctx.fonts(|fonts| {
            fonts
                .layout_no_wrap(
                    text.to_owned(),
                    egui::FontId::proportional(FONT_SIZE),
                    egui::Color32::WHITE,
                )
                .size()
                .x
        })
    }
}

/// Paint a recorded draw cycle. Commands are in canvas pixels, offset by `origin`.
fn replay(painter: &egui::Painter, origin: egui::Pos2, commands: &[DrawCommand]) {
    for command in commands {
        match command {
            // Background pass
            DrawCommand::Clear { width, height } => {
                let area = egui::Rect::from_min_size(origin, egui::vec2(*width, *height));
                painter.rect_filled(area, 0.0, BACKGROUND);
            }
            DrawCommand::FillRect { rect, color } => {
                painter.rect_filled(to_screen(origin, rect), 0.0, to_color32(*color));
            }
            // Cell borders and the hover outline
            DrawCommand::StrokeRect {
                rect,
                line_width,
                color,
            } => {
                painter.rect_stroke(
                    to_screen(origin, rect),
                    0.0,
                    egui::Stroke::new(*line_width, to_color32(*color)),
                );
            }
            // Names and size lines, anchored top-left
            DrawCommand::Text { text, x, y, color } => {
                painter.text(
                    origin + egui::vec2(*x, *y),
                    egui::Align2::LEFT_TOP,
                    text,
                    egui::FontId::proportional(FONT_SIZE),
                    to_color32(*color),
                );
            }
        }
    }
}

fn to_screen(origin: egui::Pos2, rect: &PixelRect) -> egui::Rect {
    egui::Rect::from_min_size(origin + egui::vec2(rect.x, rect.y), egui::vec2(rect.width, rect.height))
}

fn to_color32(color: Rgb) -> egui::Color32 {
    egui::Color32::from_rgb(color.r, color.g, color.b)
}
