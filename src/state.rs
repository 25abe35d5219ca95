use crate::canvas::Viewport;
use crate::hit_test::hit_test;
use crate::render::Scene;
use crate::treemap::{BreadcrumbItem, Rect, ScanProgress};

/// The one mutable container for everything the view displays.
///
/// Every setter that changes what the canvas shows bumps `revision`, which the
/// render cache uses as its redraw trigger.
#[derive(Debug, Default)]
pub struct ViewState {
    rects: Vec<Rect>,
    breadcrumbs: Vec<BreadcrumbItem>,
    is_scanning: bool,
    progress: Option<ScanProgress>,
    /// Last pointer position in normalized canvas coordinates.
    pointer: Option<(f32, f32)>,
    hovered: Option<usize>,
    viewport: Viewport,
    alert: Option<String>,
    revision: u64,
}

impl ViewState {
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn breadcrumbs(&self) -> &[BreadcrumbItem] {
        &self.breadcrumbs
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning
    }

    pub fn progress(&self) -> Option<&ScanProgress> {
        self.progress.as_ref()
    }

    pub fn hovered(&self) -> Option<&Rect> {
        self.hovered.and_then(|i| self.rects.get(i))
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn scene(&self) -> Scene<'_> {
        Scene {
            rects: &self.rects,
            hovered: self.hovered,
            viewport: self.viewport,
        }
    }

    /// Replace the whole rect set. Hover is re-resolved against the new set.
    pub fn set_rects(&mut self, rects: Vec<Rect>) {
        self.rects = rects;
        self.hovered = self.pointer.and_then(|(x, y)| hit_test(&self.rects, x, y));
        self.bump();
    }

    pub fn set_breadcrumbs(&mut self, items: Vec<BreadcrumbItem>) {
        self.breadcrumbs = items;
    }

    pub fn begin_scan(&mut self) {
        self.is_scanning = true;
        self.progress = Some(ScanProgress::default());
    }

    pub fn end_scan(&mut self) {
        self.is_scanning = false;
        self.progress = None;
    }

    /// Returns `false` (and changes nothing) when no scan is in flight.
    pub fn set_progress(&mut self, progress: ScanProgress) -> bool {
        if !self.is_scanning {
            return false;
        }
        self.progress = Some(progress);
        true
    }

    /// Track the pointer; `None` when it leaves the canvas.
    pub fn set_pointer(&mut self, pointer: Option<(f32, f32)>) {
        self.pointer = pointer;
        let hovered = pointer.and_then(|(x, y)| hit_test(&self.rects, x, y));
        if hovered != self.hovered {
            self.hovered = hovered;
            self.bump();
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.bump();
        }
    }

    pub fn raise_alert(&mut self, message: impl Into<String>) {
        self.alert = Some(message.into());
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
