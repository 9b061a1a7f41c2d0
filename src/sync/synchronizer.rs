use std::{future::pending, ops::ControlFlow, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::{JoinError, JoinHandle},
    time::Instant,
};
use tracing::{instrument, Instrument};
use uuid::Uuid;

use crate::{
    configuration::SyncSettings,
    document::{UpdateSnapshotRequest, UpdateSnapshotResponse},
    layout::{DocumentSnapshot, UuidIds},
};

use super::{DocumentApi, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Typing,
    Structural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    pub typing_debounce: Duration,
    pub structural_debounce: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncTimings {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            typing_debounce: settings.typing_debounce(),
            structural_debounce: settings.structural_debounce(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved { saved_at: DateTime<Utc> },
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub status: SaveStatus,
    /// Revision the next write will be based on.
    pub revision: i64,
    /// Set after an unauthorized, forbidden or not-found response.
    pub halted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Saved {
        revision: i64,
        saved_at: DateTime<Utc>,
    },
    /// The server's copy replaced the local one after a conflict. Edits
    /// keep being dropped until the handle adopts `generation`.
    Reconciled {
        revision: i64,
        generation: u64,
        snapshot: DocumentSnapshot,
    },
    Failed {
        message: String,
        fatal: bool,
    },
}

#[derive(Debug)]
enum Command {
    Edit {
        snapshot: DocumentSnapshot,
        kind: EditKind,
        generation: u64,
    },
    FlushNow,
    Shutdown(oneshot::Sender<()>),
}

/// Cheap to clone; every clone talks to the same synchronizer.
#[derive(Debug, Clone)]
pub struct SynchronizerHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SyncState>,
    generation: u64,
}

impl SynchronizerHandle {
    /// Edits made before this handle adopted the latest reconciled snapshot
    /// are dropped by the synchronizer.
    pub fn record_edit(&self, snapshot: DocumentSnapshot, kind: EditKind) {
        self.send(Command::Edit {
            snapshot,
            kind,
            generation: self.generation,
        });
    }

    /// Marks the snapshot of a [`SyncEvent::Reconciled`] as the base of
    /// further edits.
    pub fn adopt(&mut self, generation: u64) {
        self.generation = self.generation.max(generation);
    }

    /// Skips the debounce, e.g. when a drag ends.
    pub fn flush_now(&self) {
        self.send(Command::FlushNow);
    }

    /// Sends whatever is still unsaved and waits until the synchronizer is gone.
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Shutdown(reply_tx));
        let _ = reply_rx.await;
    }

    pub fn status(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::debug!("synchronizer already stopped");
        }
    }
}

/// Starts the synchronizer of one document.
///
/// `revision` and `snapshot` are what the server last returned; the snapshot
/// counts as saved.
pub fn spawn(
    api: Arc<dyn DocumentApi>,
    document_id: Uuid,
    revision: i64,
    snapshot: DocumentSnapshot,
    timings: SyncTimings,
) -> (SynchronizerHandle, mpsc::UnboundedReceiver<SyncEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SyncState {
        status: SaveStatus::Idle,
        revision,
        halted: false,
    });

    let synchronizer = Synchronizer {
        api,
        document_id,
        timings,
        rx,
        events: events_tx,
        state: state_tx,
        revision,
        last_saved: serialize(&snapshot).map(|(_, serialized)| serialized),
        current: snapshot,
        typing_deadline: None,
        structural_deadline: None,
        in_flight: None,
        in_flight_payload: None,
        needs_save_again: false,
        halted: false,
        generation: 0,
    };
    synchronizer.run();

    (
        SynchronizerHandle {
            tx,
            state: state_rx,
            generation: 0,
        },
        events_rx,
    )
}

type PutResult = Result<UpdateSnapshotResponse, SyncError>;

struct Synchronizer {
    api: Arc<dyn DocumentApi>,
    document_id: Uuid,
    timings: SyncTimings,
    rx: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SyncEvent>,
    state: watch::Sender<SyncState>,
    revision: i64,
    current: DocumentSnapshot,
    last_saved: Option<String>,
    typing_deadline: Option<Instant>,
    structural_deadline: Option<Instant>,
    in_flight: Option<JoinHandle<PutResult>>,
    in_flight_payload: Option<String>,
    needs_save_again: bool,
    halted: bool,
    /// Bumped whenever a conflict replaces the current snapshot.
    generation: u64,
}

impl Synchronizer {
    #[instrument(
        name = "Synchronizer",
        parent = None,
        skip(self),
        fields(document_id = %self.document_id)
    )]
    fn run(mut self) {
        tokio::spawn(
            async move {
                tracing::info!(revision = self.revision, "starting synchronizer");
                loop {
                    let deadline = self.next_deadline();
                    tokio::select! {
                        command = self.rx.recv() => {
                            let Some(command) = command else {
                                self.finish().await;
                                break;
                            };
                            if self.process_command(command).await.is_break() {
                                break;
                            }
                        }
                        _ = sleep_until(deadline) => self.flush(),
                        result = join_in_flight(&mut self.in_flight) => {
                            self.in_flight = None;
                            self.complete(result);
                        }
                    }
                }
                tracing::info!("stopping synchronizer");
            }
            .instrument(tracing::Span::current()),
        );
    }

    async fn process_command(&mut self, command: Command) -> ControlFlow<(), ()> {
        match command {
            Command::Edit {
                snapshot,
                kind,
                generation,
            } => {
                if self.halted {
                    tracing::debug!(?kind, "synchronizer halted, dropping edit");
                    return ControlFlow::Continue(());
                }
                if generation < self.generation {
                    tracing::debug!(
                        ?kind,
                        generation,
                        current = self.generation,
                        "edit based on a replaced snapshot, dropping it"
                    );
                    return ControlFlow::Continue(());
                }
                self.current = snapshot;
                let now = Instant::now();
                match kind {
                    EditKind::Typing => {
                        self.typing_deadline = Some(now + self.timings.typing_debounce)
                    }
                    EditKind::Structural => {
                        self.structural_deadline = Some(now + self.timings.structural_debounce)
                    }
                }
            }
            Command::FlushNow => self.flush(),
            Command::Shutdown(reply) => {
                self.finish().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.typing_deadline, self.structural_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Sends the latest snapshot unless it is already saved or a write is
    /// outstanding, in which case it is sent once that write completes.
    fn flush(&mut self) {
        self.typing_deadline = None;
        self.structural_deadline = None;
        if self.halted {
            return;
        }
        if self.in_flight.is_some() {
            self.needs_save_again = true;
            return;
        }

        let Some((data, serialized)) = serialize(&self.current) else {
            return;
        };
        if self.last_saved.as_deref() == Some(serialized.as_str()) {
            tracing::debug!("snapshot unchanged, skipping save");
            return;
        }

        let request = UpdateSnapshotRequest {
            base_revision: self.revision,
            data,
        };
        tracing::debug!(base_revision = self.revision, "saving snapshot");
        self.set_status(SaveStatus::Saving);

        let api = self.api.clone();
        let document_id = self.document_id;
        self.in_flight_payload = Some(serialized);
        self.in_flight = Some(tokio::spawn(
            async move { api.put_snapshot(document_id, &request).await }
                .instrument(tracing::Span::current()),
        ));
    }

    fn complete(&mut self, result: Result<PutResult, JoinError>) {
        let payload = self.in_flight_payload.take();
        match result {
            Ok(Ok(response)) => {
                tracing::info!(revision = response.revision, "snapshot saved");
                self.revision = response.revision;
                self.last_saved = payload;
                self.set_status(SaveStatus::Saved {
                    saved_at: response.saved_at,
                });
                self.emit(SyncEvent::Saved {
                    revision: response.revision,
                    saved_at: response.saved_at,
                });
            }
            Ok(Err(SyncError::Conflict {
                current_revision,
                data,
            })) => {
                tracing::warn!(
                    base_revision = self.revision,
                    current_revision,
                    "save conflicted, adopting server snapshot"
                );
                let (snapshot, repaired) = decode_server_snapshot(data);
                if repaired {
                    tracing::warn!(
                        current_revision,
                        "server snapshot needed repairs, reconciled copy differs from it"
                    );
                }
                self.revision = current_revision;
                self.generation += 1;
                self.last_saved = serialize(&snapshot).map(|(_, serialized)| serialized);
                self.current = snapshot.clone();
                self.needs_save_again = false;
                self.set_status(SaveStatus::Error(
                    "Conflict: document was modified elsewhere.".to_string(),
                ));
                self.emit(SyncEvent::Reconciled {
                    revision: current_revision,
                    generation: self.generation,
                    snapshot,
                });
                return;
            }
            Ok(Err(error)) if error.is_fatal() => {
                tracing::error!(%error, "save refused, halting synchronizer");
                self.halted = true;
                self.needs_save_again = false;
                self.set_status(SaveStatus::Error(error.to_string()));
                self.emit(SyncEvent::Failed {
                    message: error.to_string(),
                    fatal: true,
                });
                return;
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "save failed, retrying on next edit");
                self.set_status(SaveStatus::Error(error.to_string()));
                self.emit(SyncEvent::Failed {
                    message: error.to_string(),
                    fatal: false,
                });
            }
            Err(error) => {
                tracing::error!(%error, "save task did not finish");
                self.set_status(SaveStatus::Error(error.to_string()));
                self.emit(SyncEvent::Failed {
                    message: error.to_string(),
                    fatal: false,
                });
            }
        }

        if std::mem::take(&mut self.needs_save_again) {
            self.flush();
        }
    }

    /// Flushes pending edits and waits for every outstanding write.
    async fn finish(&mut self) {
        self.flush();
        while let Some(handle) = self.in_flight.take() {
            let result = handle.await;
            self.complete(result);
        }
    }

    fn set_status(&self, status: SaveStatus) {
        self.state.send_modify(|state| {
            state.status = status;
            state.revision = self.revision;
            state.halted = self.halted;
        });
    }

    fn emit(&self, event: SyncEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

/// Decodes conflict data, reporting whether decoding had to change it.
fn decode_server_snapshot(data: serde_json::Value) -> (DocumentSnapshot, bool) {
    let snapshot = DocumentSnapshot::from_value(data.clone(), &mut UuidIds);
    let repaired = match serde_json::from_value::<DocumentSnapshot>(data) {
        Ok(exact) => exact != snapshot,
        Err(_) => true,
    };
    (snapshot, repaired)
}

fn serialize(snapshot: &DocumentSnapshot) -> Option<(serde_json::Value, String)> {
    match serde_json::to_value(snapshot) {
        Ok(data) => {
            let serialized = data.to_string();
            Some((data, serialized))
        }
        Err(error) => {
            tracing::error!(%error, "snapshot could not be serialized");
            None
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn join_in_flight(
    in_flight: &mut Option<JoinHandle<PutResult>>,
) -> Result<PutResult, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => pending().await,
    }
}
