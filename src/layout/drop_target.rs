/// Fraction of a row's height, measured from its top and bottom, that
/// targets a new sibling row instead of the row itself.
pub const EDGE_ZONE_RATIO: f64 = 0.22;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box of something rendered on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn contains_y(&self, y: f64) -> bool {
        y >= self.top && y <= self.bottom
    }

    pub fn mid_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn mid_y(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }
}

/// What is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// An existing block.
    Block,
    /// A new block coming from the toolbar.
    Toolbar,
    /// A whole row.
    Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Before,
    After,
}

/// Where a dragged block lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDropTarget {
    /// A fresh row before or after `row_index`.
    NewRow { row_index: usize, edge: Edge },
    /// Next to `block_index` inside `row_index`.
    InRow {
        row_index: usize,
        block_index: usize,
        edge: Edge,
    },
}

/// Where a dragged row lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowReorder {
    pub row_index: usize,
    pub edge: Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Block(BlockDropTarget),
    Row(RowReorder),
}

/// Measured geometry of the rows and blocks of the slide being edited.
/// `None` stands for something that has not been laid out yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutGeometry {
    pub row_rects: Vec<Option<Rect>>,
    pub block_rects_by_row: Vec<Vec<Option<Rect>>>,
}

#[derive(Debug, Clone, Copy)]
pub struct DropQuery<'a> {
    pub mode: DragMode,
    pub point: Point,
    pub row_rects: &'a [Option<Rect>],
    pub block_rects_by_row: &'a [Vec<Option<Rect>>],
    pub max_blocks_per_row: usize,
    pub blocks_count_by_row: &'a [usize],
}

/// Turns a pointer position into a structural edit intent.
///
/// Returns `None` only when no row has been measured yet.
pub fn pick_drop_target(query: &DropQuery<'_>) -> Option<DropTarget> {
    let point = query.point;
    let rows: Vec<(usize, Rect)> = query
        .row_rects
        .iter()
        .enumerate()
        .filter_map(|(index, rect)| rect.map(|rect| (index, rect)))
        .collect();

    let (first_index, first) = *rows.first()?;
    let (last_index, last) = *rows.last()?;

    let row_index = rows
        .iter()
        .find(|(_, rect)| rect.contains_y(point.y))
        .map(|(index, _)| *index)
        .unwrap_or_else(|| nearest_row(&rows, point.y));
    let row = query.row_rects.get(row_index).copied().flatten()?;

    if query.mode == DragMode::Row {
        let edge = if point.y < row.mid_y() {
            Edge::Before
        } else {
            Edge::After
        };
        return Some(DropTarget::Row(RowReorder { row_index, edge }));
    }

    if point.y < first.top {
        return Some(new_row(first_index, Edge::Before));
    }
    if point.y > last.bottom {
        return Some(new_row(last_index, Edge::After));
    }

    let row_height = (row.bottom - row.top).max(1.0);
    let edge_zone = row_height * EDGE_ZONE_RATIO;
    if point.y <= row.top + edge_zone {
        return Some(new_row(row_index, Edge::Before));
    }
    if point.y >= row.bottom - edge_zone {
        return Some(new_row(row_index, Edge::After));
    }

    let blocks_count = query.blocks_count_by_row.get(row_index).copied().unwrap_or(0);
    if blocks_count >= query.max_blocks_per_row {
        return Some(new_row(row_index, Edge::After));
    }

    let block_rects = query
        .block_rects_by_row
        .get(row_index)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if block_rects.is_empty() {
        return Some(in_row(row_index, 0, Edge::After));
    }

    let measured: Vec<(usize, Rect)> = block_rects
        .iter()
        .enumerate()
        .filter_map(|(index, rect)| rect.map(|rect| (index, rect)))
        .collect();
    let Some((last_block, _)) = measured.last().copied() else {
        return Some(new_row(row_index, Edge::After));
    };

    // Block midpoints, not edges, so hovering between two blocks does not flicker.
    let target = measured
        .iter()
        .find(|(_, rect)| point.x < rect.mid_x())
        .map(|(index, _)| in_row(row_index, *index, Edge::Before))
        .unwrap_or_else(|| in_row(row_index, last_block, Edge::After));
    Some(target)
}

/// Row whose top or bottom boundary is closest to `y`, for points that fall
/// outside every row. Above everything picks the first row, below picks the last.
fn nearest_row(rows: &[(usize, Rect)], y: f64) -> usize {
    let (first_index, first) = rows[0];
    let (last_index, last) = rows[rows.len() - 1];
    if y < first.top {
        return first_index;
    }
    if y > last.bottom {
        return last_index;
    }

    let mut best: Option<(f64, usize)> = None;
    for (index, rect) in rows {
        let distance = (y - rect.top).abs().min((y - rect.bottom).abs());
        if best.map_or(true, |(best_distance, _)| distance < best_distance) {
            best = Some((distance, *index));
        }
    }
    best.map_or(first_index, |(_, index)| index)
}

fn new_row(row_index: usize, edge: Edge) -> DropTarget {
    DropTarget::Block(BlockDropTarget::NewRow { row_index, edge })
}

fn in_row(row_index: usize, block_index: usize, edge: Edge) -> DropTarget {
    DropTarget::Block(BlockDropTarget::InRow {
        row_index,
        block_index,
        edge,
    })
}
