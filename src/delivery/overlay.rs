//! Transient popups rendered on the UI thread.
//!
//! Worker threads hold an [`OverlayHandle`] and push [`DeliveryRequest`]s into
//! an mpsc channel. The eframe app owns the single [`OverlayQueue`] and drains
//! it on a fixed poll interval, so no producer ever touches the UI directly.

use super::{DeliveryError, DeliveryRequest};
use crate::settings::{Anchor, Margins, OverlaySettings};
use eframe::egui::{self, pos2, Color32, FontId, Pos2, Vec2};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, Instant};

/// Upper bound on requests taken from the queue in one poll.
pub const MAX_REQUESTS_PER_POLL: usize = 16;

/// Producer side of the display queue. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct OverlayHandle {
    tx: Sender<DeliveryRequest>,
}

impl OverlayHandle {
    pub fn send(&self, request: DeliveryRequest) -> Result<(), DeliveryError> {
        self.tx.send(request).map_err(|_| DeliveryError::OverlayClosed)
    }

    pub fn show(
        &self,
        text: impl Into<String>,
        duration: Duration,
        is_error: bool,
    ) -> Result<(), DeliveryError> {
        self.send(DeliveryRequest::new(text, duration, is_error))
    }
}

/// Consumer side of the display queue, owned by the UI thread.
pub struct OverlayQueue {
    rx: Receiver<DeliveryRequest>,
}

impl OverlayQueue {
    /// Take up to `max` pending requests without blocking.
    pub fn drain(&self, max: usize) -> Vec<DeliveryRequest> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.rx.try_recv() {
                Ok(request) => out.push(request),
                Err(_) => break,
            }
        }
        out
    }
}

pub fn overlay_channel() -> (OverlayHandle, OverlayQueue) {
    let (tx, rx) = channel();
    (OverlayHandle { tx }, OverlayQueue { rx })
}

/// Top-left corner for a popup of `size` on a screen of `screen` size.
pub fn popup_position(anchor: Anchor, margins: &Margins, screen: Vec2, size: Vec2) -> Pos2 {
    let (sw, sh) = (screen.x, screen.y);
    let (w, h) = (size.x, size.y);
    let (mut x, mut y) = match anchor {
        Anchor::BottomLeft => (margins.left, sh - h - margins.bottom),
        Anchor::BottomRight => (sw - w - margins.right, sh - h - margins.bottom),
        Anchor::TopLeft => (margins.left, margins.top),
        Anchor::TopRight => (sw - w - margins.right, margins.top),
        Anchor::Center => (((sw - w) / 2.0).floor(), ((sh - h) / 2.0).floor()),
    };
    if y < 0.0 {
        y = margins.bottom;
    }
    if x + w > sw {
        x = sw - w - margins.left;
    }
    pos2(x, y)
}

/// How long the UI may sleep before it must look at the queue or close a popup.
pub fn next_wakeup(deadlines: impl Iterator<Item = Instant>, now: Instant, poll: Duration) -> Duration {
    deadlines
        .map(|d| d.saturating_duration_since(now))
        .fold(poll, Duration::min)
}

fn rgba([r, g, b]: [u8; 3], alpha: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8)
}

struct Popup {
    id: egui::ViewportId,
    text: String,
    is_error: bool,
    size: Vec2,
    position: Pos2,
    deadline: Instant,
}

pub struct OverlayApp {
    queue: OverlayQueue,
    settings: OverlaySettings,
    popups: Vec<Popup>,
    next_id: u64,
}

impl OverlayApp {
    pub fn new(queue: OverlayQueue, settings: OverlaySettings) -> Self {
        Self {
            queue,
            settings,
            popups: Vec::new(),
            next_id: 0,
        }
    }

    fn font(&self) -> FontId {
        FontId::proportional(self.settings.font_size)
    }

    fn open_popup(&mut self, ctx: &egui::Context, request: DeliveryRequest, now: Instant) {
        let (_, fg) = self.settings.palette(request.is_error);
        let galley = ctx.fonts(|f| {
            f.layout(
                request.text.clone(),
                self.font(),
                rgba(fg, 1.0),
                self.settings.wrap_width,
            )
        });
        let size = galley.size() + Vec2::splat(2.0 * self.settings.padding);
        let (fw, fh) = self.settings.fallback_screen_size;
        let screen = ctx
            .input(|i| i.viewport().monitor_size)
            .unwrap_or(Vec2::new(fw, fh));
        let position = popup_position(self.settings.anchor, &self.settings.margins, screen, size);

        self.next_id += 1;
        tracing::debug!(
            id = self.next_id,
            error = request.is_error,
            ?position,
            "showing popup: {}",
            request.text
        );
        self.popups.push(Popup {
            id: egui::ViewportId::from_hash_of(("quick_vision_popup", self.next_id)),
            text: request.text,
            is_error: request.is_error,
            size,
            position,
            deadline: now + request.duration,
        });
    }

    fn render(&self, ctx: &egui::Context, popup: &Popup) {
        let (bg, fg) = self.settings.palette(popup.is_error);
        let alpha = self.settings.alpha;
        let fill = rgba(bg, alpha);
        let text = egui::RichText::new(popup.text.as_str())
            .font(self.font())
            .color(rgba(fg, alpha));
        let padding = self.settings.padding;

        let builder = egui::ViewportBuilder::default()
            .with_title("quick_vision")
            .with_decorations(false)
            .with_always_on_top()
            .with_transparent(true)
            .with_mouse_passthrough(true)
            .with_taskbar(false)
            .with_resizable(false)
            .with_active(false)
            .with_position(popup.position)
            .with_inner_size(popup.size);

        ctx.show_viewport_immediate(popup.id, builder, |ctx, _class| {
            egui::CentralPanel::default()
                .frame(egui::Frame::none().fill(fill).inner_margin(egui::Margin::same(padding)))
                .show(ctx, |ui| {
                    ui.add(egui::Label::new(text).wrap(true));
                });
        });
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        for request in self.queue.drain(MAX_REQUESTS_PER_POLL) {
            self.open_popup(ctx, request, now);
        }
        // Popups no longer shown are closed by egui.
        self.popups.retain(|p| p.deadline > now);
        for popup in &self.popups {
            self.render(ctx, popup);
        }

        let poll = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        ctx.request_repaint_after(next_wakeup(self.popups.iter().map(|p| p.deadline), now, poll));
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }
}

/// Run the overlay event loop on the current thread until the process exits.
pub fn run(queue: OverlayQueue, settings: OverlaySettings) -> anyhow::Result<()> {
    let (x, y) = settings.offscreen_pos;
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("quick_vision")
            .with_inner_size([1.0, 1.0])
            .with_position([x, y])
            .with_decorations(false)
            .with_transparent(true)
            .with_taskbar(false)
            .with_mouse_passthrough(true)
            .with_active(false),
        ..Default::default()
    };
    let app = OverlayApp::new(queue, settings);
    eframe::run_native("quick_vision", native_options, Box::new(move |_cc| Box::new(app)))
        .map_err(|e| anyhow::anyhow!("overlay event loop failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Vec2 = Vec2::new(1920.0, 1080.0);
    const SIZE: Vec2 = Vec2::new(100.0, 20.0);

    #[test]
    fn anchors() {
        let m = Margins::default();
        assert_eq!(popup_position(Anchor::BottomLeft, &m, SCREEN, SIZE), pos2(20.0, 1010.0));
        assert_eq!(popup_position(Anchor::BottomRight, &m, SCREEN, SIZE), pos2(1800.0, 1010.0));
        assert_eq!(popup_position(Anchor::TopLeft, &m, SCREEN, SIZE), pos2(20.0, 50.0));
        assert_eq!(popup_position(Anchor::TopRight, &m, SCREEN, SIZE), pos2(1800.0, 50.0));
        assert_eq!(popup_position(Anchor::Center, &m, SCREEN, SIZE), pos2(910.0, 530.0));
    }

    #[test]
    fn oversized_popups_are_pulled_back_on_screen() {
        let m = Margins::default();
        let tall = Vec2::new(100.0, 1100.0);
        assert_eq!(popup_position(Anchor::BottomLeft, &m, SCREEN, tall).y, 50.0);
        let wide = Vec2::new(1950.0, 20.0);
        assert_eq!(popup_position(Anchor::TopLeft, &m, SCREEN, wide).x, -50.0);
    }

    #[test]
    fn wakeup_is_bounded_by_poll_and_deadlines() {
        let now = Instant::now();
        let poll = Duration::from_millis(100);
        assert_eq!(next_wakeup(std::iter::empty(), now, poll), poll);
        let soon = now + Duration::from_millis(30);
        assert_eq!(next_wakeup([soon].into_iter(), now, poll), Duration::from_millis(30));
        let late = now + Duration::from_secs(3);
        assert_eq!(next_wakeup([late].into_iter(), now, poll), poll);
    }

    #[test]
    fn drain_is_bounded_and_non_blocking() {
        let (handle, queue) = overlay_channel();
        assert!(queue.drain(4).is_empty());
        for i in 0..6 {
            handle.show(format!("{i}"), Duration::from_secs(1), false).unwrap();
        }
        assert_eq!(queue.drain(4).len(), 4);
        assert_eq!(queue.drain(4).len(), 2);
    }

    #[test]
    fn send_fails_once_ui_is_gone() {
        let (handle, queue) = overlay_channel();
        drop(queue);
        let err = handle.show("x", Duration::from_secs(1), true).unwrap_err();
        assert!(matches!(err, DeliveryError::OverlayClosed));
    }
}
