use std::sync::Arc;

use serde_json::Value;

use crate::registry::BlockRegistry;

use super::{
    drop_target::{BlockDropTarget, Edge, RowReorder},
    model::{
        finalize_rows, new_slide, normalize_row_widths, Block, DocumentSnapshot, IdSource, Row,
        UuidIds, DEFAULT_THEME_ID,
    },
    resize::{resize_row_widths, ResizeRequest},
};

/// A block that does not exist yet. Missing content is taken from the
/// registry's defaults for `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlock {
    pub kind: String,
    pub content: Option<Value>,
}

impl NewBlock {
    pub fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            content: None,
        }
    }

    pub fn with_content(kind: &str, content: Value) -> Self {
        Self {
            kind: kind.to_string(),
            content: Some(content),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeApplied {
    pub clamped: bool,
    /// How far the divider's left column actually moved, in percent.
    pub actual_delta: f64,
}

impl ResizeApplied {
    const NONE: Self = Self {
        clamped: false,
        actual_delta: 0.0,
    };
}

/// Applies structural edits to a snapshot.
///
/// Every operation reads the given snapshot and returns a new one with the
/// row invariants re-established. Anything that cannot be applied (unknown
/// ids, out-of-range indices) returns an unchanged copy instead of failing.
pub struct MutationEngine<I = UuidIds> {
    ids: I,
    registry: Arc<BlockRegistry>,
}

impl Default for MutationEngine<UuidIds> {
    fn default() -> Self {
        Self::new(UuidIds, Arc::new(BlockRegistry::with_builtin()))
    }
}

impl<I: IdSource> MutationEngine<I> {
    pub fn new(ids: I, registry: Arc<BlockRegistry>) -> Self {
        Self { ids, registry }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Appends to the slide's last row, or starts a new row once it is full.
    pub fn add_block(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_id: &str,
        block: NewBlock,
    ) -> DocumentSnapshot {
        let Some(slide_index) = slide_position(snapshot, slide_id) else {
            return snapshot.clone();
        };
        let block = self.materialize(block);
        let mut rows = snapshot.slides[slide_index].rows.clone();

        match rows.last_mut() {
            Some(last) if !last.is_full() => {
                last.blocks.push(block);
                last.widths.clear();
            }
            _ => rows.push(Row::single(self.ids.row_id(), block)),
        }

        self.with_rows(snapshot, slide_index, rows)
    }

    /// Removes the block from whichever slide holds it, dropping its row if
    /// that leaves the row empty.
    pub fn remove_block(
        &mut self,
        snapshot: &DocumentSnapshot,
        block_id: &str,
    ) -> DocumentSnapshot {
        let Some((slide_index, row_index, block_index)) = locate_block(snapshot, block_id) else {
            return snapshot.clone();
        };
        let mut rows = snapshot.slides[slide_index].rows.clone();
        let row = &mut rows[row_index];
        row.blocks.remove(block_index);
        row.widths.clear();
        self.with_rows(snapshot, slide_index, rows)
    }

    pub fn insert_layout_block(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_id: &str,
        block: NewBlock,
        target: BlockDropTarget,
    ) -> DocumentSnapshot {
        let Some(slide_index) = slide_position(snapshot, slide_id) else {
            return snapshot.clone();
        };
        let rows = &snapshot.slides[slide_index].rows;
        if !target_in_range(rows, target) {
            tracing::debug!(?target, "drop target out of range, ignoring insert");
            return snapshot.clone();
        }

        let block = self.materialize(block);
        let placement = Placement::from_target(target);
        let rows = self.place(rows.clone(), block, placement);
        self.with_rows(snapshot, slide_index, rows)
    }

    /// Relocates an existing block of the slide.
    ///
    /// The block leaves its origin row first and empty rows are dropped; the
    /// target then applies to the rows that remain.
    pub fn move_layout_block(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_id: &str,
        active_block_id: &str,
        target: BlockDropTarget,
    ) -> DocumentSnapshot {
        let Some(slide_index) = slide_position(snapshot, slide_id) else {
            return snapshot.clone();
        };
        let mut rows = snapshot.slides[slide_index].rows.clone();
        let Some((origin_row, origin_block)) = block_position(&rows, active_block_id) else {
            return snapshot.clone();
        };

        let block = rows[origin_row].blocks.remove(origin_block);
        rows[origin_row].widths.clear();
        let rows = finalize_rows(rows, &mut self.ids);
        if !target_in_range(&rows, target) {
            tracing::debug!(?target, "drop target out of range, ignoring move");
            return snapshot.clone();
        }

        let placement = Placement::from_target(target);
        let rows = self.place(rows, block, placement);
        self.with_rows(snapshot, slide_index, rows)
    }

    /// Moves a whole row. The insertion index is computed against the rows
    /// that remain once the active row is taken out.
    pub fn move_layout_row(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_id: &str,
        active_row_id: &str,
        target: RowReorder,
    ) -> DocumentSnapshot {
        let Some(slide_index) = slide_position(snapshot, slide_id) else {
            return snapshot.clone();
        };
        let mut rows = snapshot.slides[slide_index].rows.clone();
        let Some(from) = rows.iter().position(|row| row.id == active_row_id) else {
            return snapshot.clone();
        };

        let active = rows.remove(from);
        let insert_at = match target.edge {
            Edge::Before => target.row_index,
            Edge::After => target.row_index + 1,
        }
        .min(rows.len());
        rows.insert(insert_at, active);

        self.with_rows(snapshot, slide_index, rows)
    }

    pub fn resize_layout_row_divider(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_id: &str,
        row_id: &str,
        divider_index: usize,
        delta_percent: f64,
    ) -> (DocumentSnapshot, ResizeApplied) {
        let Some(slide_index) = slide_position(snapshot, slide_id) else {
            return (snapshot.clone(), ResizeApplied::NONE);
        };
        let mut rows = snapshot.slides[slide_index].rows.clone();
        let Some(row) = rows.iter_mut().find(|row| row.id == row_id) else {
            return (snapshot.clone(), ResizeApplied::NONE);
        };

        *row = normalize_row_widths(row.clone());
        let before = row.widths.clone();
        let outcome = resize_row_widths(&ResizeRequest {
            widths: &before,
            divider_index,
            delta_percent,
            min_percent: None,
        });
        let actual_delta = match (outcome.widths.get(divider_index), before.get(divider_index)) {
            (Some(next), Some(previous)) => next - previous,
            _ => 0.0,
        };
        row.widths = outcome.widths;

        let applied = ResizeApplied {
            clamped: outcome.clamped,
            actual_delta,
        };
        (self.with_rows(snapshot, slide_index, rows), applied)
    }

    pub fn update_block_content(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_id: &str,
        block_id: &str,
        content: Value,
    ) -> DocumentSnapshot {
        let Some(slide_index) = slide_position(snapshot, slide_id) else {
            return snapshot.clone();
        };
        let mut next = snapshot.clone();
        let target = next.slides[slide_index]
            .rows
            .iter_mut()
            .flat_map(|row| row.blocks.iter_mut())
            .find(|block| block.id == block_id);
        match target {
            Some(block) => {
                block.content = content;
                next
            }
            None => snapshot.clone(),
        }
    }

    /// Appends `Slide N` holding one empty text block. The theme defaults to
    /// the last slide's.
    pub fn add_slide(
        &mut self,
        snapshot: &DocumentSnapshot,
        theme_id: Option<&str>,
    ) -> DocumentSnapshot {
        let theme_id = theme_id
            .map(str::to_string)
            .or_else(|| snapshot.slides.last().map(|slide| slide.theme_id.clone()))
            .unwrap_or_else(|| DEFAULT_THEME_ID.to_string());
        let title = format!("Slide {}", snapshot.slides.len() + 1);

        let mut next = snapshot.clone();
        next.slides.push(new_slide(&mut self.ids, title, theme_id));
        next
    }

    /// A document always keeps at least one slide.
    pub fn remove_slide(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_id: &str,
    ) -> DocumentSnapshot {
        let Some(slide_index) = slide_position(snapshot, slide_id) else {
            return snapshot.clone();
        };
        if snapshot.slides.len() == 1 {
            return snapshot.clone();
        }
        let mut next = snapshot.clone();
        next.slides.remove(slide_index);
        next
    }

    /// Moves `active_id` to the position currently held by `over_id`.
    pub fn reorder_slides(
        &mut self,
        snapshot: &DocumentSnapshot,
        active_id: &str,
        over_id: &str,
    ) -> DocumentSnapshot {
        let (Some(from), Some(to)) = (
            slide_position(snapshot, active_id),
            slide_position(snapshot, over_id),
        ) else {
            return snapshot.clone();
        };
        if from == to {
            return snapshot.clone();
        }
        let mut next = snapshot.clone();
        let slide = next.slides.remove(from);
        next.slides.insert(to, slide);
        next
    }

    pub fn rename_slide(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_id: &str,
        title: &str,
    ) -> DocumentSnapshot {
        let Some(slide_index) = slide_position(snapshot, slide_id) else {
            return snapshot.clone();
        };
        let mut next = snapshot.clone();
        next.slides[slide_index].title = title.to_string();
        next
    }

    fn materialize(&mut self, block: NewBlock) -> Block {
        let content = block
            .content
            .unwrap_or_else(|| self.registry.default_content(&block.kind));
        Block {
            id: self.ids.block_id(),
            kind: block.kind,
            content,
        }
    }

    fn place(&mut self, mut rows: Vec<Row>, block: Block, placement: Placement) -> Vec<Row> {
        match placement {
            Placement::NewRow { at } => {
                let at = at.min(rows.len());
                rows.insert(at, Row::single(self.ids.row_id(), block));
            }
            Placement::IntoRow { row, at } => {
                if rows.is_empty() {
                    rows.push(Row::single(self.ids.row_id(), block));
                    return rows;
                }
                let row = row.min(rows.len() - 1);
                if rows[row].is_full() {
                    rows.insert(row + 1, Row::single(self.ids.row_id(), block));
                } else {
                    let target = &mut rows[row];
                    let at = at.min(target.blocks.len());
                    target.blocks.insert(at, block);
                    target.widths.clear();
                }
            }
        }
        rows
    }

    fn with_rows(
        &mut self,
        snapshot: &DocumentSnapshot,
        slide_index: usize,
        rows: Vec<Row>,
    ) -> DocumentSnapshot {
        let mut next = snapshot.clone();
        next.slides[slide_index].rows = finalize_rows(rows, &mut self.ids);
        next
    }
}

/// A drop target resolved to insertion indices.
#[derive(Debug, Clone, Copy)]
enum Placement {
    NewRow { at: usize },
    IntoRow { row: usize, at: usize },
}

impl Placement {
    fn from_target(target: BlockDropTarget) -> Self {
        match target {
            BlockDropTarget::NewRow { row_index, edge } => Self::NewRow {
                at: slot(row_index, edge),
            },
            BlockDropTarget::InRow {
                row_index,
                block_index,
                edge,
            } => Self::IntoRow {
                row: row_index,
                at: slot(block_index, edge),
            },
        }
    }
}

fn slot(index: usize, edge: Edge) -> usize {
    match edge {
        Edge::Before => index,
        Edge::After => index + 1,
    }
}

/// Row indices are clamped when placing, so only an in-row `block_index`
/// past the end of a row that still has room is rejected.
fn target_in_range(rows: &[Row], target: BlockDropTarget) -> bool {
    match target {
        BlockDropTarget::NewRow { .. } => true,
        BlockDropTarget::InRow {
            row_index,
            block_index,
            ..
        } => match rows.get(row_index.min(rows.len().saturating_sub(1))) {
            Some(row) => row.is_full() || block_index <= row.blocks.len(),
            None => true,
        },
    }
}

fn slide_position(snapshot: &DocumentSnapshot, slide_id: &str) -> Option<usize> {
    snapshot.slides.iter().position(|slide| slide.id == slide_id)
}

fn block_position(rows: &[Row], block_id: &str) -> Option<(usize, usize)> {
    rows.iter().enumerate().find_map(|(row_index, row)| {
        row.blocks
            .iter()
            .position(|block| block.id == block_id)
            .map(|block_index| (row_index, block_index))
    })
}

fn locate_block(snapshot: &DocumentSnapshot, block_id: &str) -> Option<(usize, usize, usize)> {
    snapshot
        .slides
        .iter()
        .enumerate()
        .find_map(|(slide_index, slide)| {
            block_position(&slide.rows, block_id)
                .map(|(row_index, block_index)| (slide_index, row_index, block_index))
        })
}
