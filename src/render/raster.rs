use anyhow::{Context, Result};
use eframe::egui::{Color32, ColorImage};
use tiny_skia::{Paint, PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform};

use super::{Overlay, OverlayStyle, Surface, SurfaceId};

/// Grid divisions along each axis.
const GRID_DIVISIONS: u32 = 10;

// ---------------------------------------------------------------------------
// Plot view – what the static layer shows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStyle {
    /// Dark dotted grid on a light face (spectrum).
    Dotted,
    /// White solid grid on a grey face (time series).
    Solid,
}

/// Data ranges and furniture of the plot area.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotView {
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub x_label: String,
    pub y_label: String,
    pub grid: GridStyle,
}

impl PlotView {
    /// Pixel position of a data point on a `width` × `height` canvas.
    pub fn to_pixel(&self, point: [f64; 2], width: f32, height: f32) -> Option<(f32, f32)> {
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;
        if !(point[0].is_finite() && point[1].is_finite()) || x1 <= x0 || y1 <= y0 {
            return None;
        }
        let px = (point[0] - x0) / (x1 - x0) * width as f64;
        let py = height as f64 - (point[1] - y0) / (y1 - y0) * height as f64;
        Some((px as f32, py as f32))
    }
}

// ---------------------------------------------------------------------------
// RasterSurface – offscreen pixmap the renderer blits into
// ---------------------------------------------------------------------------

/// CPU raster surface backed by a tiny-skia pixmap.
///
/// The UI uploads the pixels as a texture whenever a frame was presented.
pub struct RasterSurface {
    id: SurfaceId,
    pixmap: Pixmap,
    view: PlotView,
    presented: bool,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32, view: PlotView) -> Result<Self> {
        Ok(Self {
            id: SurfaceId::next(),
            pixmap: new_pixmap(width, height)?,
            view,
            presented: false,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    /// Reallocate at a new size. Returns whether anything changed; if so the
    /// cached background is stale.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool> {
        if (width.max(1), height.max(1)) == self.size() {
            return Ok(false);
        }
        self.pixmap = new_pixmap(width, height)?;
        Ok(true)
    }

    pub fn view(&self) -> &PlotView {
        &self.view
    }

    /// Replace the view. The cached background is stale afterwards.
    pub fn set_view(&mut self, view: PlotView) {
        self.view = view;
    }

    /// The composed frame, if one was presented since the last call.
    pub fn take_presented(&mut self) -> Option<ColorImage> {
        if !std::mem::take(&mut self.presented) {
            return None;
        }
        let size = [self.pixmap.width() as usize, self.pixmap.height() as usize];
        Some(ColorImage::from_rgba_premultiplied(size, self.pixmap.data()))
    }

    fn stroke_segment(&mut self, from: (f32, f32), to: (f32, f32), paint: &Paint, stroke: &Stroke) {
        let mut pb = PathBuilder::new();
        pb.move_to(from.0, from.1);
        pb.line_to(to.0, to.1);
        if let Some(path) = pb.finish() {
            self.pixmap
                .stroke_path(&path, paint, stroke, Transform::identity(), None);
        }
    }
}

fn new_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width.max(1), height.max(1))
        .with_context(|| format!("allocating a {width}x{height} plot surface"))
}

fn paint(color: Color32) -> Paint<'static> {
    let mut paint = Paint::default();
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

impl Surface for RasterSurface {
    type Background = Pixmap;

    fn id(&self) -> SurfaceId {
        self.id
    }

    fn draw_static(&mut self) {
        let (face, grid_color) = match self.view.grid {
            GridStyle::Dotted => (Color32::from_rgb(0xF8, 0xF8, 0xF8), Color32::from_gray(0x4D)),
            GridStyle::Solid => (Color32::from_rgb(0xEB, 0xEB, 0xEB), Color32::WHITE),
        };
        let [r, g, b, a] = face.to_srgba_unmultiplied();
        self.pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));

        let (w, h) = (self.pixmap.width() as f32, self.pixmap.height() as f32);
        let grid_paint = paint(grid_color);
        let mut grid_stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        if self.view.grid == GridStyle::Dotted {
            grid_stroke.dash = StrokeDash::new(vec![1.0, 3.0], 0.0);
        }
        for i in 1..GRID_DIVISIONS {
            let fx = w * i as f32 / GRID_DIVISIONS as f32;
            let fy = h * i as f32 / GRID_DIVISIONS as f32;
            self.stroke_segment((fx, 0.0), (fx, h), &grid_paint, &grid_stroke);
            self.stroke_segment((0.0, fy), (w, fy), &grid_paint, &grid_stroke);
        }

        let frame_paint = paint(Color32::from_gray(0x30));
        let frame_stroke = Stroke {
            width: 1.5,
            ..Stroke::default()
        };
        if let Some(rect) = Rect::from_xywh(0.5, 0.5, w - 1.0, h - 1.0) {
            let path = PathBuilder::from_rect(rect);
            self.pixmap
                .stroke_path(&path, &frame_paint, &frame_stroke, Transform::identity(), None);
        }
    }

    fn snapshot(&self) -> Pixmap {
        self.pixmap.clone()
    }

    fn restore(&mut self, background: &Pixmap) {
        if background.width() == self.pixmap.width() && background.height() == self.pixmap.height() {
            self.pixmap.data_mut().copy_from_slice(background.data());
        } else {
            log::debug!("Cached background no longer matches the surface size");
        }
    }

    fn draw_overlay(&mut self, overlay: &Overlay) {
        let (w, h) = (self.pixmap.width() as f32, self.pixmap.height() as f32);
        let paint = paint(overlay.color);
        match overlay.style {
            OverlayStyle::Line { width } => {
                let mut pb = PathBuilder::new();
                let mut started = false;
                for &p in overlay.points() {
                    match self.view.to_pixel(p, w, h) {
                        Some((x, y)) if started => pb.line_to(x, y),
                        Some((x, y)) => {
                            pb.move_to(x, y);
                            started = true;
                        }
                        None => started = false,
                    }
                }
                if let Some(path) = pb.finish() {
                    let stroke = Stroke {
                        width,
                        ..Stroke::default()
                    };
                    self.pixmap
                        .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
                }
            }
            OverlayStyle::Markers { size, every } => {
                let half = size / 2.0;
                for &p in overlay.points().iter().step_by(every.max(1)) {
                    let Some((x, y)) = self.view.to_pixel(p, w, h) else {
                        continue;
                    };
                    if let Some(rect) = Rect::from_xywh(x - half, y - half, size, size) {
                        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                    }
                }
            }
            OverlayStyle::VerticalMarker { width } => {
                let Some(&[x, _]) = overlay.points().first() else {
                    return;
                };
                let y = self.view.y_range.0;
                if let Some((px, _)) = self.view.to_pixel([x, y], w, h) {
                    let stroke = Stroke {
                        width,
                        ..Stroke::default()
                    };
                    self.stroke_segment((px, 0.0), (px, h), &paint, &stroke);
                }
            }
        }
    }

    fn present(&mut self) {
        self.presented = true;
    }
}
