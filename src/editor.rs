use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::{
    layout::{
        pick_drop_target, DocumentSnapshot, DragKind, DragSession, DropQuery, DropTarget,
        History, IdSource, LayoutGeometry, MutationEngine, NewBlock, Point, ResizeDrag, Slide,
        UuidIds, MAX_BLOCKS_PER_ROW,
    },
    registry::Rendered,
    sync::{
        self, DocumentApi, EditKind, SyncError, SyncEvent, SyncState, SyncTimings,
        SynchronizerHandle,
    },
};

struct ResizeInProgress {
    drag: ResizeDrag,
    before: DocumentSnapshot,
}

/// One open document: the current snapshot plus everything that edits,
/// undoes and saves it.
///
/// Structural edits push a history checkpoint first. A run of keystrokes
/// into the same block shares one checkpoint. Every edit first applies
/// whatever the synchronizer reported, so nothing is built on a snapshot the
/// server has already replaced.
pub struct EditorSession<I = UuidIds> {
    document_id: Uuid,
    snapshot: DocumentSnapshot,
    active_slide_id: String,
    engine: MutationEngine<I>,
    history: History,
    sync: SynchronizerHandle,
    events: UnboundedReceiver<SyncEvent>,
    pending_events: Vec<SyncEvent>,
    typing_block: Option<String>,
    drag: Option<DragSession>,
    resize: Option<ResizeInProgress>,
}

impl EditorSession<UuidIds> {
    /// Loads the document and starts its synchronizer.
    #[tracing::instrument(skip(api, timings))]
    pub async fn open(
        api: Arc<dyn DocumentApi>,
        document_id: Uuid,
        timings: SyncTimings,
    ) -> Result<Self, SyncError> {
        let document = api.get_document(document_id).await?;
        let snapshot = DocumentSnapshot::from_value(document.data, &mut UuidIds);
        tracing::info!(revision = document.revision, "document opened");
        Ok(Self::new(
            MutationEngine::default(),
            api,
            document_id,
            document.revision,
            snapshot,
            timings,
        ))
    }
}

impl<I: IdSource> EditorSession<I> {
    pub fn new(
        engine: MutationEngine<I>,
        api: Arc<dyn DocumentApi>,
        document_id: Uuid,
        revision: i64,
        snapshot: DocumentSnapshot,
        timings: SyncTimings,
    ) -> Self {
        let (sync, events) = sync::spawn(api, document_id, revision, snapshot.clone(), timings);
        let active_slide_id = first_slide_id(&snapshot);
        Self {
            document_id,
            snapshot,
            active_slide_id,
            engine,
            history: History::new(),
            sync,
            events,
            pending_events: Vec::new(),
            typing_block: None,
            drag: None,
            resize: None,
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn snapshot(&self) -> &DocumentSnapshot {
        &self.snapshot
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn active_slide(&self) -> Option<&Slide> {
        self.snapshot.slide(&self.active_slide_id)
    }

    pub fn set_active_slide(&mut self, slide_id: &str) -> bool {
        self.apply_sync_events();
        if self.snapshot.slide(slide_id).is_none() {
            return false;
        }
        self.active_slide_id = slide_id.to_string();
        self.typing_block = None;
        true
    }

    /// Replaces the snapshot after a checkpoint and schedules a save.
    /// Returns false when `next` equals the current snapshot, or when the
    /// server's copy replaced the snapshot `next` was derived from.
    pub fn commit(&mut self, next: DocumentSnapshot, kind: EditKind) -> bool {
        if self.apply_sync_events() {
            tracing::debug!(?kind, "snapshot was reconciled, dropping edit");
            return false;
        }
        if next == self.snapshot {
            return false;
        }
        let previous = std::mem::replace(&mut self.snapshot, next);
        self.history.push_checkpoint(previous);
        if kind == EditKind::Structural {
            self.typing_block = None;
        }
        self.sync.record_edit(self.snapshot.clone(), kind);
        true
    }

    pub fn add_block(&mut self, block: NewBlock) -> bool {
        self.apply_sync_events();
        let next = self
            .engine
            .add_block(&self.snapshot, &self.active_slide_id, block);
        self.commit(next, EditKind::Structural)
    }

    pub fn remove_block(&mut self, block_id: &str) -> bool {
        self.apply_sync_events();
        let next = self.engine.remove_block(&self.snapshot, block_id);
        self.commit(next, EditKind::Structural)
    }

    pub fn add_slide(&mut self, theme_id: Option<&str>) -> bool {
        self.apply_sync_events();
        let next = self.engine.add_slide(&self.snapshot, theme_id);
        let added = next.slides.last().map(|slide| slide.id.clone());
        let committed = self.commit(next, EditKind::Structural);
        if let Some(slide_id) = added.filter(|_| committed) {
            self.active_slide_id = slide_id;
        }
        committed
    }

    pub fn remove_slide(&mut self, slide_id: &str) -> bool {
        self.apply_sync_events();
        let next = self.engine.remove_slide(&self.snapshot, slide_id);
        let committed = self.commit(next, EditKind::Structural);
        self.ensure_active_slide();
        committed
    }

    pub fn rename_slide(&mut self, slide_id: &str, title: &str) -> bool {
        self.apply_sync_events();
        let next = self.engine.rename_slide(&self.snapshot, slide_id, title);
        self.commit(next, EditKind::Structural)
    }

    pub fn reorder_slides(&mut self, active_id: &str, over_id: &str) -> bool {
        self.apply_sync_events();
        let next = self.engine.reorder_slides(&self.snapshot, active_id, over_id);
        self.commit(next, EditKind::Structural)
    }

    /// Routes a text edit through the block's renderer.
    pub fn type_into(&mut self, block_id: &str, text: &str) -> bool {
        self.apply_sync_events();
        let Some(block) = self
            .active_slide()
            .and_then(|slide| {
                slide
                    .rows
                    .iter()
                    .flat_map(|row| row.blocks.iter())
                    .find(|block| block.id == block_id)
            })
            .cloned()
        else {
            return false;
        };

        let mut edited = None;
        self.engine
            .registry()
            .edit_text(&block, text, &mut |content| edited = Some(content));
        let Some(content) = edited else {
            return false;
        };

        let next = self.engine.update_block_content(
            &self.snapshot,
            &self.active_slide_id,
            block_id,
            content,
        );
        if next == self.snapshot {
            return false;
        }

        if self.typing_block.as_deref() == Some(block_id) {
            self.snapshot = next;
            self.sync.record_edit(self.snapshot.clone(), EditKind::Typing);
            return true;
        }
        let committed = self.commit(next, EditKind::Typing);
        self.typing_block = Some(block_id.to_string());
        committed
    }

    pub fn begin_drag(&mut self, kind: DragKind, origin: Point) {
        self.apply_sync_events();
        self.typing_block = None;
        self.drag = Some(DragSession::begin(kind, origin));
    }

    pub fn drag_to(&mut self, point: Point) {
        if let Some(drag) = self.drag.as_mut() {
            drag.move_to(point);
        }
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    /// Ends the drag at its last position. A drop that resolves to nothing,
    /// or to a target of the wrong kind, changes nothing.
    pub fn drop_with(&mut self, geometry: &LayoutGeometry) -> bool {
        self.apply_sync_events();
        let Some(drag) = self.drag.take() else {
            return false;
        };
        let Some(slide) = self.active_slide() else {
            return false;
        };
        let blocks_count_by_row: Vec<usize> =
            slide.rows.iter().map(|row| row.blocks.len()).collect();

        let target = pick_drop_target(&DropQuery {
            mode: drag.kind.mode(),
            point: drag.current,
            row_rects: &geometry.row_rects,
            block_rects_by_row: &geometry.block_rects_by_row,
            max_blocks_per_row: MAX_BLOCKS_PER_ROW,
            blocks_count_by_row: &blocks_count_by_row,
        });
        tracing::debug!(?target, kind = ?drag.kind, "drop");

        let slide_id = self.active_slide_id.clone();
        let next = match (drag.kind, target) {
            (DragKind::Block { block_id }, Some(DropTarget::Block(target))) => self
                .engine
                .move_layout_block(&self.snapshot, &slide_id, &block_id, target),
            (DragKind::Toolbar { block_kind }, Some(DropTarget::Block(target))) => {
                self.engine.insert_layout_block(
                    &self.snapshot,
                    &slide_id,
                    NewBlock::of_kind(&block_kind),
                    target,
                )
            }
            (DragKind::Row { row_id }, Some(DropTarget::Row(target))) => self
                .engine
                .move_layout_row(&self.snapshot, &slide_id, &row_id, target),
            _ => return false,
        };

        let committed = self.commit(next, EditKind::Structural);
        if committed {
            self.sync.flush_now();
        }
        committed
    }

    pub fn begin_resize(
        &mut self,
        row_id: &str,
        divider_index: usize,
        origin_x: f64,
        container_width_px: f64,
    ) {
        self.apply_sync_events();
        self.typing_block = None;
        self.resize = Some(ResizeInProgress {
            drag: ResizeDrag::begin(
                row_id.to_string(),
                divider_index,
                origin_x,
                container_width_px,
            ),
            before: self.snapshot.clone(),
        });
    }

    /// Applies one frame of divider movement. Returns whether the engine
    /// clamped it.
    pub fn resize_to(&mut self, x: f64) -> bool {
        self.apply_sync_events();
        let Some(resize) = self.resize.as_mut() else {
            return false;
        };
        let Some(delta) = resize.drag.pointer_moved(x) else {
            return false;
        };
        let (next, applied) = self.engine.resize_layout_row_divider(
            &self.snapshot,
            &self.active_slide_id,
            &resize.drag.row_id,
            resize.drag.divider_index,
            delta,
        );
        resize.drag.record_applied(applied.actual_delta);
        self.snapshot = next;
        applied.clamped
    }

    /// Keeps the new widths as a single undoable edit and saves right away.
    pub fn end_resize(&mut self) -> bool {
        self.apply_sync_events();
        let Some(resize) = self.resize.take() else {
            return false;
        };
        if resize.before == self.snapshot {
            return false;
        }
        self.history.push_checkpoint(resize.before);
        self.sync
            .record_edit(self.snapshot.clone(), EditKind::Structural);
        self.sync.flush_now();
        true
    }

    /// Rolls the divider back by exactly what was applied during the drag.
    pub fn cancel_resize(&mut self) {
        self.apply_sync_events();
        let Some(resize) = self.resize.take() else {
            return;
        };
        let (next, _) = self.engine.resize_layout_row_divider(
            &self.snapshot,
            &self.active_slide_id,
            &resize.drag.row_id,
            resize.drag.divider_index,
            resize.drag.cancel_delta(),
        );
        self.snapshot = next;
    }

    pub fn undo(&mut self) -> bool {
        self.apply_sync_events();
        let Some(previous) = self.history.undo(self.snapshot.clone()) else {
            return false;
        };
        self.restore(previous);
        true
    }

    pub fn redo(&mut self) -> bool {
        self.apply_sync_events();
        let Some(next) = self.history.redo(self.snapshot.clone()) else {
            return false;
        };
        self.restore(next);
        true
    }

    /// Everything the synchronizer reported since the last call. A conflict
    /// has already replaced the snapshot and forgotten the local history.
    pub fn poll_sync_events(&mut self) -> Vec<SyncEvent> {
        self.apply_sync_events();
        std::mem::take(&mut self.pending_events)
    }

    /// The active slide's blocks, row by row.
    pub fn render_active_slide(&self) -> Vec<Vec<Rendered>> {
        let registry = self.engine.registry();
        self.active_slide()
            .map(|slide| {
                slide
                    .rows
                    .iter()
                    .map(|row| {
                        row.blocks
                            .iter()
                            .map(|block| registry.render_block(block))
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Saves pending edits before the session goes away.
    pub async fn close(self) {
        self.sync.shutdown().await;
    }

    /// Returns whether a conflict replaced the snapshot.
    fn apply_sync_events(&mut self) -> bool {
        let mut reconciled = false;
        while let Ok(event) = self.events.try_recv() {
            if let SyncEvent::Reconciled {
                snapshot,
                generation,
                ..
            } = &event
            {
                self.snapshot = snapshot.clone();
                self.sync.adopt(*generation);
                self.history.clear();
                self.typing_block = None;
                self.drag = None;
                self.resize = None;
                self.ensure_active_slide();
                reconciled = true;
            }
            self.pending_events.push(event);
        }
        reconciled
    }

    fn restore(&mut self, snapshot: DocumentSnapshot) {
        self.snapshot = snapshot;
        self.typing_block = None;
        self.ensure_active_slide();
        self.sync
            .record_edit(self.snapshot.clone(), EditKind::Structural);
    }

    fn ensure_active_slide(&mut self) {
        if self.snapshot.slide(&self.active_slide_id).is_none() {
            self.active_slide_id = first_slide_id(&self.snapshot);
        }
    }
}

fn first_slide_id(snapshot: &DocumentSnapshot) -> String {
    snapshot
        .slides
        .first()
        .map(|slide| slide.id.clone())
        .unwrap_or_default()
}
