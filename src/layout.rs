mod drag;
mod drop_target;
mod history;
mod model;
mod mutation;
mod resize;

pub use drag::{DragKind, DragSession, ResizeDrag};
pub use drop_target::{
    pick_drop_target, BlockDropTarget, DragMode, DropQuery, DropTarget, Edge, LayoutGeometry,
    Point, Rect, RowReorder, EDGE_ZONE_RATIO,
};
pub use history::{History, MAX_HISTORY};
pub use model::{
    even_widths, finalize_rows, min_column_percent, new_slide, normalize_row_widths, Block,
    DocumentSnapshot, IdSource, InvariantViolation, Row, Slide, UuidIds, DEFAULT_THEME_ID,
    MAX_BLOCKS_PER_ROW, WIDTH_TOLERANCE,
};
pub use mutation::{MutationEngine, NewBlock, ResizeApplied};
pub use resize::{normalize_to_100, resize_row_widths, ResizeOutcome, ResizeRequest};
