use super::drop_target::{DragMode, Point};

#[derive(Debug, Clone, PartialEq)]
pub enum DragKind {
    Block { block_id: String },
    /// A new block of `block_kind` pulled out of the toolbar.
    Toolbar { block_kind: String },
    Row { row_id: String },
}

impl DragKind {
    pub fn mode(&self) -> DragMode {
        match self {
            Self::Block { .. } => DragMode::Block,
            Self::Toolbar { .. } => DragMode::Toolbar,
            Self::Row { .. } => DragMode::Row,
        }
    }
}

/// An in-progress drag, fed by whatever produces pointer events.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub kind: DragKind,
    pub origin: Point,
    pub current: Point,
}

impl DragSession {
    pub fn begin(kind: DragKind, origin: Point) -> Self {
        Self {
            kind,
            origin,
            current: origin,
        }
    }

    pub fn move_to(&mut self, point: Point) {
        self.current = point;
    }

    pub fn displacement(&self) -> Point {
        Point::new(
            self.current.x - self.origin.x,
            self.current.y - self.origin.y,
        )
    }
}

/// Bookkeeping for dragging a column divider.
///
/// Pointer displacement is converted to percent of the container width.
/// Only the part not yet fed to the engine is handed out, and the deltas
/// the engine actually applied are summed so an Escape can undo them
/// exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeDrag {
    pub row_id: String,
    pub divider_index: usize,
    origin_x: f64,
    container_width_px: f64,
    fed_percent: f64,
    applied_percent: f64,
}

impl ResizeDrag {
    pub fn begin(
        row_id: String,
        divider_index: usize,
        origin_x: f64,
        container_width_px: f64,
    ) -> Self {
        Self {
            row_id,
            divider_index,
            origin_x,
            container_width_px,
            fed_percent: 0.0,
            applied_percent: 0.0,
        }
    }

    /// Incremental percent delta since the last frame, or `None` when the
    /// pointer has not moved or the container has no width.
    pub fn pointer_moved(&mut self, x: f64) -> Option<f64> {
        if self.container_width_px <= 0.0 || !x.is_finite() {
            return None;
        }
        let cumulative = (x - self.origin_x) * 100.0 / self.container_width_px;
        let delta = cumulative - self.fed_percent;
        if delta == 0.0 {
            return None;
        }
        self.fed_percent = cumulative;
        Some(delta)
    }

    pub fn record_applied(&mut self, actual_delta: f64) {
        self.applied_percent += actual_delta;
    }

    pub fn applied_percent(&self) -> f64 {
        self.applied_percent
    }

    /// The delta that reverses everything applied during this drag.
    pub fn cancel_delta(&self) -> f64 {
        -self.applied_percent
    }
}
