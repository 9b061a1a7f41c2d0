use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use super::resize::normalize_to_100;

/// A row holding this many blocks accepts no more; further blocks spill into a new row.
pub const MAX_BLOCKS_PER_ROW: usize = 4;

/// Allowed deviation of a row's width sum from 100.
pub const WIDTH_TOLERANCE: f64 = 1e-6;

pub const DEFAULT_THEME_ID: &str = "dark-editorial";

/// Smallest percentage a column may be resized to, given the row's column count.
pub fn min_column_percent(columns: usize) -> f64 {
    match columns {
        n if n >= 4 => 6.0,
        3 => 7.0,
        _ => 8.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub blocks: Vec<Block>,
    /// Percentages summing to 100, one per block.
    pub widths: Vec<f64>,
}

impl Row {
    pub fn single(id: String, block: Block) -> Self {
        Self {
            id,
            blocks: vec![block],
            widths: vec![100.0],
        }
    }

    pub fn is_full(&self) -> bool {
        self.blocks.len() >= MAX_BLOCKS_PER_ROW
    }

    pub fn is_well_formed(&self) -> bool {
        !self.blocks.is_empty()
            && self.blocks.len() <= MAX_BLOCKS_PER_ROW
            && self.widths.len() == self.blocks.len()
            && (self.widths.iter().sum::<f64>() - 100.0).abs() < WIDTH_TOLERANCE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    pub title: String,
    pub theme_id: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("row {row_id} has no blocks")]
    EmptyRow { row_id: String },
    #[error("row {row_id} holds {count} blocks")]
    TooManyBlocks { row_id: String, count: usize },
    #[error("row {row_id} has {widths} widths for {blocks} blocks")]
    WidthCount {
        row_id: String,
        blocks: usize,
        widths: usize,
    },
    #[error("row {row_id} widths sum to {sum}")]
    WidthSum { row_id: String, sum: f64 },
}

/// Source of fresh block, row and slide identifiers.
pub trait IdSource {
    fn block_id(&mut self) -> String;
    fn row_id(&mut self) -> String;
    fn slide_id(&mut self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn block_id(&mut self) -> String {
        format!("blk_{}", Uuid::new_v4().simple())
    }

    fn row_id(&mut self) -> String {
        format!("row_{}", Uuid::new_v4().simple())
    }

    fn slide_id(&mut self) -> String {
        format!("slide_{}", Uuid::new_v4().simple())
    }
}

/// Even split of 100 across `count` cells; the last cell absorbs the rounding remainder.
pub fn even_widths(count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let even = 100.0 / count as f64;
    let mut widths = vec![even; count];
    widths[count - 1] = 100.0 - even * (count - 1) as f64;
    widths
}

/// Recomputes widths as an even split when they no longer match the block
/// count or hold a non-positive entry, and rescales them when they do not
/// sum to 100.
pub fn normalize_row_widths(mut row: Row) -> Row {
    if row.blocks.is_empty() {
        row.widths.clear();
    } else if row.widths.len() != row.blocks.len()
        || row.widths.iter().any(|width| !width.is_finite() || *width <= 0.0)
    {
        row.widths = even_widths(row.blocks.len());
    } else if (row.widths.iter().sum::<f64>() - 100.0).abs() >= WIDTH_TOLERANCE {
        row.widths = normalize_to_100(std::mem::take(&mut row.widths));
    }
    row
}

/// Drops empty rows, splits rows holding more than [`MAX_BLOCKS_PER_ROW`]
/// blocks into evenly split rows, and re-establishes the width invariant on
/// the rest.
pub fn finalize_rows(rows: Vec<Row>, ids: &mut impl IdSource) -> Vec<Row> {
    let mut finalized = Vec::with_capacity(rows.len());
    for row in rows {
        if row.blocks.len() <= MAX_BLOCKS_PER_ROW {
            if !row.blocks.is_empty() {
                finalized.push(normalize_row_widths(row));
            }
            continue;
        }
        for (index, chunk) in row.blocks.chunks(MAX_BLOCKS_PER_ROW).enumerate() {
            let id = if index == 0 {
                row.id.clone()
            } else {
                ids.row_id()
            };
            finalized.push(Row {
                id,
                blocks: chunk.to_vec(),
                widths: even_widths(chunk.len()),
            });
        }
    }
    finalized
}

pub fn new_slide(ids: &mut impl IdSource, title: String, theme_id: String) -> Slide {
    let block = Block {
        id: ids.block_id(),
        kind: "text".to_string(),
        content: json!({ "text": "" }),
    };
    Slide {
        id: ids.slide_id(),
        title,
        theme_id,
        rows: vec![Row::single(ids.row_id(), block)],
    }
}

impl DocumentSnapshot {
    /// One slide, one row, one empty text block.
    pub fn empty() -> Self {
        Self::empty_with(&mut UuidIds)
    }

    pub fn empty_with(ids: &mut impl IdSource) -> Self {
        Self {
            slides: vec![new_slide(
                ids,
                "Slide 1".to_string(),
                DEFAULT_THEME_ID.to_string(),
            )],
        }
    }

    /// Decodes whatever the server stored, filling gaps instead of failing.
    ///
    /// Anything that is not a snapshot with at least one slide decodes to
    /// [`DocumentSnapshot::empty`]. Missing ids are generated, missing
    /// titles, themes, block types and contents get defaults, and rows are
    /// brought back in line with the width invariant.
    pub fn from_value(data: Value, ids: &mut impl IdSource) -> Self {
        let loose: LooseSnapshot = match serde_json::from_value(data) {
            Ok(loose) => loose,
            Err(error) => {
                tracing::warn!(%error, "stored snapshot is malformed, starting from an empty one");
                return Self::empty_with(ids);
            }
        };
        if loose.slides.is_empty() {
            return Self::empty_with(ids);
        }

        let slides = loose
            .slides
            .into_iter()
            .map(|slide| {
                let rows = slide
                    .rows
                    .into_iter()
                    .map(|row| Row {
                        id: row.id.unwrap_or_else(|| ids.row_id()),
                        blocks: row
                            .blocks
                            .into_iter()
                            .map(|block| Block {
                                id: block.id.unwrap_or_else(|| ids.block_id()),
                                kind: block.kind.unwrap_or_else(|| "text".to_string()),
                                content: block.content.unwrap_or_else(|| json!({})),
                            })
                            .collect(),
                        widths: row.widths,
                    })
                    .collect();
                Slide {
                    id: slide.id.unwrap_or_else(|| ids.slide_id()),
                    title: slide.title.unwrap_or_else(|| "Slide".to_string()),
                    theme_id: slide
                        .theme_id
                        .unwrap_or_else(|| DEFAULT_THEME_ID.to_string()),
                    rows: finalize_rows(rows, &mut *ids),
                }
            })
            .collect();

        Self { slides }
    }

    pub fn slide(&self, slide_id: &str) -> Option<&Slide> {
        self.slides.iter().find(|slide| slide.id == slide_id)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for row in self.slides.iter().flat_map(|slide| slide.rows.iter()) {
            let row_id = row.id.clone();
            if row.blocks.is_empty() {
                return Err(InvariantViolation::EmptyRow { row_id });
            }
            if row.blocks.len() > MAX_BLOCKS_PER_ROW {
                return Err(InvariantViolation::TooManyBlocks {
                    row_id,
                    count: row.blocks.len(),
                });
            }
            if row.widths.len() != row.blocks.len() {
                return Err(InvariantViolation::WidthCount {
                    row_id,
                    blocks: row.blocks.len(),
                    widths: row.widths.len(),
                });
            }
            let sum: f64 = row.widths.iter().sum();
            if (sum - 100.0).abs() >= WIDTH_TOLERANCE {
                return Err(InvariantViolation::WidthSum { row_id, sum });
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct LooseSnapshot {
    #[serde(default)]
    slides: Vec<LooseSlide>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LooseSlide {
    id: Option<String>,
    title: Option<String>,
    theme_id: Option<String>,
    #[serde(default)]
    rows: Vec<LooseRow>,
}

#[derive(Deserialize)]
struct LooseRow {
    id: Option<String>,
    #[serde(default)]
    blocks: Vec<LooseBlock>,
    #[serde(default)]
    widths: Vec<f64>,
}

#[derive(Deserialize)]
struct LooseBlock {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<Value>,
}
