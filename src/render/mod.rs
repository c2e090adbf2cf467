/// Background-cached overlay rendering.
///
/// ```text
///   reset(overlays) / on_surface_invalidated()
///        │  draw static layer once, snapshot it
///        ▼
///   ┌──────────────┐   update(): restore snapshot → draw overlays → present
///   │ RingRenderer  │──────────────────────────────────────────────────────▶ Surface
///   └──────────────┘
/// ```
pub mod raster;

use std::sync::atomic::{AtomicU64, Ordering};

use eframe::egui::Color32;

pub use raster::{GridStyle, PlotView, RasterSurface};

// ---------------------------------------------------------------------------
// Surface seam
// ---------------------------------------------------------------------------

/// Identity of one drawing surface instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// A fresh id, unique for the process.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Something overlays can be blitted onto.
pub trait Surface {
    /// Cached pixels of the static layer.
    type Background;

    fn id(&self) -> SurfaceId;

    /// Redraw the static layer (frame, grid, fixed furniture) from scratch.
    fn draw_static(&mut self);

    /// Copy of the current pixels, taken right after [`Surface::draw_static`].
    fn snapshot(&self) -> Self::Background;

    /// Put cached pixels back, erasing every overlay drawn since.
    fn restore(&mut self, background: &Self::Background);

    fn draw_overlay(&mut self, overlay: &Overlay);

    /// Hand the composed pixels to whoever displays them.
    fn present(&mut self);
}

// ---------------------------------------------------------------------------
// Overlays
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayStyle {
    /// Polyline through all points.
    Line { width: f32 },
    /// Square dots on every `every`-th point.
    Markers { size: f32, every: usize },
    /// Full-height vertical line at the x of the first point.
    VerticalMarker { width: f32 },
}

/// A dynamic element redrawn on every update.
#[derive(Debug, Clone)]
pub struct Overlay {
    surface: SurfaceId,
    pub style: OverlayStyle,
    pub color: Color32,
    points: Vec<[f64; 2]>,
}

impl Overlay {
    pub fn new(surface: SurfaceId, style: OverlayStyle, color: Color32) -> Self {
        Self {
            surface,
            style,
            color,
            points: Vec::new(),
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Replace the whole trace.
    pub fn set_points(&mut self, points: impl IntoIterator<Item = [f64; 2]>) {
        self.points.clear();
        self.points.extend(points);
    }

    /// Extend the trace by one point.
    pub fn push(&mut self, point: [f64; 2]) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.points.reserve(additional);
    }
}

// ---------------------------------------------------------------------------
// RingRenderer
// ---------------------------------------------------------------------------

/// Blit manager: caches the static layer and repaints only overlays.
///
/// The cached background is **not** checked for staleness. After resizing the
/// surface or changing anything it draws in [`Surface::draw_static`], the
/// caller must call [`RingRenderer::on_surface_invalidated`] (or
/// [`RingRenderer::reset`]); until then updates keep compositing over the old
/// pixels.
pub struct RingRenderer<S: Surface> {
    surface: S,
    overlays: Vec<Overlay>,
    background: Option<S::Background>,
    static_draws: u64,
}

impl<S: Surface> RingRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            overlays: Vec::new(),
            background: None,
            static_draws: 0,
        }
    }

    /// Swap in a new overlay set and recapture the background.
    ///
    /// # Panics
    ///
    /// If any overlay was created for a different surface.
    pub fn reset(&mut self, overlays: Vec<Overlay>) {
        let id = self.surface.id();
        for overlay in &overlays {
            assert_eq!(
                overlay.surface, id,
                "overlay registered with a renderer for a different surface"
            );
        }
        self.background = None;
        self.overlays = overlays;
        self.on_surface_invalidated();
    }

    /// Full redraw: static layer, fresh snapshot, overlays on top.
    pub fn on_surface_invalidated(&mut self) {
        self.surface.draw_static();
        self.static_draws += 1;
        self.background = Some(self.surface.snapshot());
        self.draw_overlays();
        self.surface.present();
    }

    /// Restore the cached background, draw overlays, present.
    pub fn update(&mut self) {
        if self.background.is_none() {
            self.on_surface_invalidated();
            return;
        }
        if let Some(background) = &self.background {
            self.surface.restore(background);
        }
        self.draw_overlays();
        self.surface.present();
    }

    fn draw_overlays(&mut self) {
        for overlay in &self.overlays {
            self.surface.draw_overlay(overlay);
        }
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn overlay_mut(&mut self, index: usize) -> Option<&mut Overlay> {
        self.overlays.get_mut(index)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the surface. Changes to static content need a
    /// following [`RingRenderer::on_surface_invalidated`].
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// How many times the static layer has been drawn.
    pub fn static_draw_count(&self) -> u64 {
        self.static_draws
    }
}
