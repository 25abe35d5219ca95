use eframe::egui;

use crate::backend::{Backend, Pending};
use crate::state::ViewState;
use crate::treemap::NodeId;

/// Keys the canvas cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Backspace,
    Escape,
    Other,
}

impl NavKey {
    pub fn is_back(self) -> bool {
        matches!(self, NavKey::Backspace | NavKey::Escape)
    }
}

const BACK_KEYS: [(egui::Key, NavKey); 2] = [
    (egui::Key::Backspace, NavKey::Backspace),
    (egui::Key::Escape, NavKey::Escape),
];

/// Turns pointer and keyboard gestures into zoom commands.
///
/// Replies are collected by [`Navigator::poll`], which the UI calls once per
/// frame. Failures are logged and dropped; navigation never raises an alert.
#[derive(Default)]
pub struct Navigator {
    parent_query: Option<Pending<Option<NodeId>>>,
    zooms: Vec<(NodeId, Pending<()>)>,
    /// Keyboard focus as it stood at the end of the previous frame.
    had_text_focus: bool,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zoom into the hovered rect if it is a directory. Returns whether a zoom
    /// was issued.
    pub fn click(&mut self, state: &ViewState, backend: &dyn Backend) -> bool {
        match state.hovered() {
            Some(rect) if rect.is_dir => {
                log::debug!("Zooming into {} ({:?})", rect.name, rect.id);
                self.zoom(rect.id, backend);
                true
            }
            _ => false,
        }
    }

    /// Secondary click. No backend action exists for it yet; the caller must
    /// still swallow the gesture so no platform menu appears.
    pub fn context_click(&mut self, state: &ViewState) -> bool {
        if let Some(rect) = state.hovered() {
            log::trace!("Context click on {}", rect.name);
        }
        true
    }

    /// Handle a key press. Returns `true` when the key was consumed.
    ///
    /// Back keys typed into a text field are left alone.
    pub fn back_key(&mut self, key: NavKey, text_focus: bool, backend: &dyn Backend) -> bool {
        if !key.is_back() || text_focus {
            return false;
        }
        if self.parent_query.is_some() {
            log::debug!("Parent lookup already in flight, ignoring {:?}", key);
            return true;
        }
        self.parent_query = Some(backend.get_parent_node());
        self.poll(backend);
        true
    }

    /// Route this frame's back keys from egui. Returns whether one was consumed.
    ///
    /// egui drops keyboard focus on Escape before any widget runs, so a text
    /// field focused at the end of the previous frame still counts as typing.
    pub fn handle_keys(&mut self, ctx: &egui::Context, backend: &dyn Backend) -> bool {
        let text_focus = self.had_text_focus || ctx.wants_keyboard_input();
        let mut consumed = false;
        for (egui_key, key) in BACK_KEYS {
            let pressed = ctx.input(|i| i.key_pressed(egui_key));
            if pressed && self.back_key(key, text_focus, backend) {
                ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui_key));
                consumed = true;
            }
        }
        consumed
    }

    /// Remember keyboard focus once every widget of the frame has run.
    pub fn end_frame(&mut self, ctx: &egui::Context) {
        self.had_text_focus = ctx.wants_keyboard_input();
    }

    /// Jump to breadcrumb `index`. The last entry is the current focus and does
    /// nothing.
    pub fn select_breadcrumb(&mut self, index: usize, state: &ViewState, backend: &dyn Backend) -> bool {
        let items = state.breadcrumbs();
        if index + 1 >= items.len() {
            return false;
        }
        self.zoom(items[index].id, backend);
        true
    }

    /// Collect finished replies. Returns whether anything is still outstanding.
    pub fn poll(&mut self, backend: &dyn Backend) -> bool {
        if let Some(query) = self.parent_query.as_mut() {
            if let Some(outcome) = query.poll() {
                self.parent_query = None;
                match outcome {
                    Ok(Some(parent)) => self.zoom(parent, backend),
                    Ok(None) => log::debug!("Already at scan root"),
                    Err(err) => log::warn!("Failed to get parent node: {}", err),
                }
            }
        }

        self.zooms.retain_mut(|(node, pending)| match pending.poll() {
            Some(Ok(())) => false,
            Some(Err(err)) => {
                log::warn!("Failed to zoom to {:?}: {}", node, err);
                false
            }
            None => true,
        });

        self.is_busy()
    }

    pub fn is_busy(&self) -> bool {
        self.parent_query.is_some() || !self.zooms.is_empty()
    }

    fn zoom(&mut self, node: NodeId, backend: &dyn Backend) {
        self.zooms.push((node, backend.set_zoom(node)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{Call, FakeBackend};
    use crate::treemap::{BreadcrumbItem, Rect};

    fn rect(id: u32, x: f32, w: f32, is_dir: bool) -> Rect {
        Rect {
            id: NodeId(id),
            x,
            y: 0.0,
            w,
            h: 1.0,
            name: format!("entry{id}"),
            size: 4096,
            is_dir,
        }
    }

    fn state_with_pointer(x: f32) -> ViewState {
        let mut state = ViewState::default();
        state.set_rects(vec![rect(1, 0.0, 0.5, false), rect(2, 0.5, 0.5, true)]);
        state.set_pointer(Some((x, 0.5)));
        state
    }

    #[test]
    fn test_click_file_does_not_zoom() {
        let backend = FakeBackend::new();
        let mut nav = Navigator::new();
        let state = state_with_pointer(0.25);

        assert!(!nav.click(&state, &backend));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_click_directory_zooms_once() {
        let backend = FakeBackend::new();
        let mut nav = Navigator::new();
        let state = state_with_pointer(0.75);

        assert!(nav.click(&state, &backend));
        assert_eq!(backend.zoom_calls(), vec![NodeId(2)]);
        assert!(!nav.poll(&backend));
    }

    #[test]
    fn test_click_outside_everything() {
        let backend = FakeBackend::new();
        let mut nav = Navigator::new();
        let mut state = ViewState::default();
        state.set_rects(vec![rect(2, 0.0, 0.5, true)]);
        state.set_pointer(Some((0.9, 0.5)));

        assert!(!nav.click(&state, &backend));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_back_key_with_text_focus_is_ignored() {
        let backend = FakeBackend::new();
        backend.parent.set(Some(NodeId(0)));
        let mut nav = Navigator::new();

        assert!(!nav.back_key(NavKey::Backspace, true, &backend));
        assert!(!nav.back_key(NavKey::Escape, true, &backend));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_back_key_zooms_to_parent() {
        let backend = FakeBackend::new();
        backend.parent.set(Some(NodeId(4)));
        let mut nav = Navigator::new();

        assert!(nav.back_key(NavKey::Escape, false, &backend));
        assert_eq!(backend.calls(), vec![Call::GetParentNode, Call::SetZoom(NodeId(4))]);
    }

    #[test]
    fn test_back_key_at_root_does_nothing_more() {
        let backend = FakeBackend::new();
        let mut nav = Navigator::new();

        assert!(nav.back_key(NavKey::Backspace, false, &backend));
        assert_eq!(backend.calls(), vec![Call::GetParentNode]);
        assert!(!nav.is_busy());
    }

    #[test]
    fn test_other_keys_pass_through() {
        let backend = FakeBackend::new();
        let mut nav = Navigator::new();
        assert!(!nav.back_key(NavKey::Other, false, &backend));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_navigation_failures_are_swallowed() {
        let backend = FakeBackend::new();
        backend.fail_parent.set(true);
        let mut nav = Navigator::new();
        assert!(nav.back_key(NavKey::Backspace, false, &backend));
        assert!(backend.zoom_calls().is_empty());
        assert!(!nav.is_busy());

        backend.fail_parent.set(false);
        backend.fail_zoom.set(true);
        backend.parent.set(Some(NodeId(1)));
        assert!(nav.back_key(NavKey::Backspace, false, &backend));
        assert_eq!(backend.zoom_calls(), vec![NodeId(1)]);
        assert!(!nav.poll(&backend));
    }

    fn key_press(key: egui::Key) -> egui::Event {
        egui::Event::Key {
            key,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        }
    }

    /// One egui frame with a path field, then the navigator's key pass.
    fn run_frame(
        ctx: &egui::Context,
        nav: &mut Navigator,
        backend: &FakeBackend,
        path: &mut String,
        focus_path: bool,
        events: Vec<egui::Event>,
    ) {
        let input = egui::RawInput {
            events,
            ..Default::default()
        };
        let _ = ctx.run(input, |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                let response = ui.add(egui::TextEdit::singleline(path).id(egui::Id::new("path")));
                if focus_path {
                    response.request_focus();
                }
            });
            nav.handle_keys(ctx, backend);
            nav.end_frame(ctx);
        });
    }

    #[test]
    fn test_escape_in_path_field_does_not_navigate() {
        let ctx = egui::Context::default();
        let backend = FakeBackend::new();
        backend.parent.set(Some(NodeId(0)));
        let mut nav = Navigator::new();
        let mut path = String::from("/home/user");

        run_frame(&ctx, &mut nav, &backend, &mut path, true, vec![]);
        run_frame(&ctx, &mut nav, &backend, &mut path, false, vec![]);
        assert!(ctx.memory(|m| m.has_focus(egui::Id::new("path"))));

        run_frame(&ctx, &mut nav, &backend, &mut path, false, vec![key_press(egui::Key::Escape)]);
        assert!(backend.calls().is_empty(), "got {:?}", backend.calls());

        // Focus is gone now, so the next Escape navigates.
        run_frame(&ctx, &mut nav, &backend, &mut path, false, vec![key_press(egui::Key::Escape)]);
        assert_eq!(backend.calls(), vec![Call::GetParentNode, Call::SetZoom(NodeId(0))]);
    }

    #[test]
    fn test_backspace_in_path_field_does_not_navigate() {
        let ctx = egui::Context::default();
        let backend = FakeBackend::new();
        backend.parent.set(Some(NodeId(0)));
        let mut nav = Navigator::new();
        let mut path = String::from("/home/user");

        run_frame(&ctx, &mut nav, &backend, &mut path, true, vec![]);
        run_frame(&ctx, &mut nav, &backend, &mut path, false, vec![]);
        for _ in 0..3 {
            run_frame(&ctx, &mut nav, &backend, &mut path, false, vec![key_press(egui::Key::Backspace)]);
        }
        assert!(backend.calls().is_empty(), "got {:?}", backend.calls());
    }

    #[test]
    fn test_back_keys_navigate_without_focus() {
        let ctx = egui::Context::default();
        let backend = FakeBackend::new();
        backend.parent.set(Some(NodeId(7)));
        let mut nav = Navigator::new();
        let mut path = String::new();

        run_frame(&ctx, &mut nav, &backend, &mut path, false, vec![]);
        run_frame(&ctx, &mut nav, &backend, &mut path, false, vec![key_press(egui::Key::Backspace)]);
        assert_eq!(backend.zoom_calls(), vec![NodeId(7)]);

        let mut consumed = false;
        let _ = ctx.run(
            egui::RawInput {
                events: vec![key_press(egui::Key::Escape)],
                ..Default::default()
            },
            |ctx| {
                consumed = nav.handle_keys(ctx, &backend);
                assert!(!ctx.input(|i| i.key_pressed(egui::Key::Escape)));
                nav.end_frame(ctx);
            },
        );
        assert!(consumed);
        assert_eq!(backend.zoom_calls(), vec![NodeId(7), NodeId(7)]);
    }

    #[test]
    fn test_last_breadcrumb_is_inert() {
        let backend = FakeBackend::new();
        let mut nav = Navigator::new();
        let mut state = ViewState::default();
        state.set_breadcrumbs(vec![
            BreadcrumbItem {
                id: NodeId(0),
                name: "home".into(),
            },
            BreadcrumbItem {
                id: NodeId(3),
                name: "user".into(),
            },
        ]);

        assert!(!nav.select_breadcrumb(1, &state, &backend));
        assert!(!nav.select_breadcrumb(5, &state, &backend));
        assert!(nav.select_breadcrumb(0, &state, &backend));
        assert_eq!(backend.zoom_calls(), vec![NodeId(0)]);
    }

    #[test]
    fn test_context_click_is_suppressed_without_backend_call() {
        let backend = FakeBackend::new();
        let mut nav = Navigator::new();
        let state = state_with_pointer(0.75);
        assert!(nav.context_click(&state));
        assert!(backend.calls().is_empty());
    }
}
