//! Receiver side of a painting upload.
//!
//! Chunks and the finalize record travel as separate messages and may arrive
//! in either order. The receiver holds whichever half shows up first and
//! commits to the registry only once both the assembled buffer and its
//! finalize record are present.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use crate::config::TransferConfig;
use crate::error::{PixelatorError, TransferError};
use crate::raster::RawImage;
use crate::transfer::{ChunkReceiver, SessionState};
use crate::wire::{DeleteRequest, FinalizeRecord, Message, UploadChunk};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaintingId(pub String);

impl fmt::Display for PaintingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An assembled buffer paired with the metadata that describes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedPainting {
    pub name: String,
    pub tiles_wide: u32,
    pub tiles_high: u32,
    pub tile_resolution: u32,
    pub pixels: Bytes,
}

impl CommittedPainting {
    pub fn width(&self) -> usize {
        self.tiles_wide as usize * self.tile_resolution as usize
    }

    pub fn height(&self) -> usize {
        self.tiles_high as usize * self.tile_resolution as usize
    }

    pub fn to_image(&self) -> Result<RawImage, PixelatorError> {
        RawImage::from_rgba_bytes(self.width(), self.height(), &self.pixels)
    }
}

/// Storage for committed paintings.
pub trait PaintingRegistry {
    fn register(&mut self, painting: CommittedPainting) -> Result<PaintingId, TransferError>;

    /// Returns whether a painting was removed.
    fn delete(&mut self, id: &PaintingId) -> Result<bool, TransferError>;
}

/// In-process registry, handing out sequential ids.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    paintings: BTreeMap<PaintingId, CommittedPainting>,
    next_id: u64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PaintingId) -> Option<&CommittedPainting> {
        self.paintings.get(id)
    }

    pub fn len(&self) -> usize {
        self.paintings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paintings.is_empty()
    }
}

impl PaintingRegistry for MemoryRegistry {
    fn register(&mut self, painting: CommittedPainting) -> Result<PaintingId, TransferError> {
        if painting.name.trim().is_empty() {
            return Err(TransferError::Registry("painting name is empty".into()));
        }
        self.next_id += 1;
        let id = PaintingId(format!("painting-{}", self.next_id));
        self.paintings.insert(id.clone(), painting);
        Ok(id)
    }

    fn delete(&mut self, id: &PaintingId) -> Result<bool, TransferError> {
        Ok(self.paintings.remove(id).is_some())
    }
}

#[derive(Debug)]
pub enum CommitOutcome {
    /// Waiting on more chunks or on the finalize record
    Pending,
    Committed(PaintingId),
    Deleted { id: PaintingId, existed: bool },
    /// Message ignored; nothing committed
    Dropped(TransferError),
}

/// A reassembled buffer and the tile grid its chunks declared.
#[derive(Debug)]
struct AssembledUpload {
    tiles_wide: u32,
    tiles_high: u32,
    pixels: Bytes,
}

/// Pairs reassembled uploads with their finalize records.
#[derive(Debug)]
pub struct UploadReceiver<R> {
    chunks: ChunkReceiver,
    // tile grid declared by the chunks of the open session
    session_tiles: Option<(u32, u32)>,
    finalize: Option<FinalizeRecord>,
    assembled: Option<AssembledUpload>,
    registry: R,
    config: TransferConfig,
}

impl<R: PaintingRegistry> UploadReceiver<R> {
    pub fn new(registry: R, config: TransferConfig) -> Self {
        Self {
            chunks: ChunkReceiver::new(),
            session_tiles: None,
            finalize: None,
            assembled: None,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Decode one JSON message and handle it.
    pub fn handle_json(&mut self, raw: &[u8]) -> Result<CommitOutcome, TransferError> {
        self.handle(Message::from_json(raw)?)
    }

    /// Registry failures are returned as errors; transfer anomalies are
    /// reported as [`CommitOutcome::Dropped`].
    pub fn handle(&mut self, message: Message) -> Result<CommitOutcome, TransferError> {
        match message {
            Message::Upload(chunk) => self.on_chunk(chunk),
            Message::Finalize(record) => self.on_finalize(record),
            Message::Delete(request) => self.on_delete(request),
        }
    }

    fn on_chunk(&mut self, chunk: UploadChunk) -> Result<CommitOutcome, TransferError> {
        let len = chunk.chunk_bytes.len();
        if len > self.config.max_chunk_size {
            let err = TransferError::ChunkTooLarge { len, max: self.config.max_chunk_size };
            log::warn!("dropping chunk {}: {}", chunk.chunk_index, err);
            return Ok(CommitOutcome::Dropped(err));
        }

        // Chunks of one session must agree on the tile grid
        let tiles = (chunk.tiles_wide, chunk.tiles_high);
        let same_session = matches!(self.chunks.progress(), Some((_, total)) if total == chunk.total_chunks);
        if let Some(expected) = self.session_tiles.filter(|&t| same_session && t != tiles) {
            let err = TransferError::TileMismatch {
                expected_wide: expected.0,
                expected_high: expected.1,
                got_wide: tiles.0,
                got_high: tiles.1,
            };
            log::warn!("dropping chunk {}: {}", chunk.chunk_index, err);
            return Ok(CommitOutcome::Dropped(err));
        }

        match self.chunks.accept(chunk.chunk_index, chunk.chunk_bytes, chunk.total_chunks) {
            SessionState::Pending { .. } => {
                self.session_tiles = Some(tiles);
                Ok(CommitOutcome::Pending)
            }
            SessionState::Dropped(err) => Ok(CommitOutcome::Dropped(err)),
            SessionState::Complete(pixels) => {
                self.session_tiles = None;
                let upload = AssembledUpload { tiles_wide: tiles.0, tiles_high: tiles.1, pixels };
                if self.assembled.replace(upload).is_some() {
                    log::warn!("replacing an assembled upload that never received its finalize record");
                }
                self.try_commit()
            }
        }
    }

    fn on_finalize(&mut self, record: FinalizeRecord) -> Result<CommitOutcome, TransferError> {
        if let Err(err) = record.validate() {
            log::warn!("dropping finalize for '{}': {}", record.name, err);
            return Ok(CommitOutcome::Dropped(err));
        }
        if let Some((received, total)) = self.chunks.progress() {
            log::debug!(
                "{}; holding finalize for '{}'",
                TransferError::Incomplete { received, total },
                record.name
            );
        }
        if let Some(previous) = self.finalize.replace(record) {
            log::warn!("finalize for '{}' superseded before commit", previous.name);
        }
        self.try_commit()
    }

    fn on_delete(&mut self, request: DeleteRequest) -> Result<CommitOutcome, TransferError> {
        let id = PaintingId(request.painting_id);
        let existed = self.registry.delete(&id)?;
        log::info!("delete {}: {}", id, if existed { "removed" } else { "not found" });
        Ok(CommitOutcome::Deleted { id, existed })
    }

    fn try_commit(&mut self) -> Result<CommitOutcome, TransferError> {
        let (record, upload) = match (self.finalize.take(), self.assembled.take()) {
            (Some(record), Some(upload)) => (record, upload),
            (record, upload) => {
                self.finalize = record;
                self.assembled = upload;
                return Ok(CommitOutcome::Pending);
            }
        };

        if (upload.tiles_wide, upload.tiles_high) != (record.tiles_wide, record.tiles_high) {
            let err = TransferError::TileMismatch {
                expected_wide: upload.tiles_wide,
                expected_high: upload.tiles_high,
                got_wide: record.tiles_wide,
                got_high: record.tiles_high,
            };
            log::warn!("rejecting upload '{}': {}", record.name, err);
            return Ok(CommitOutcome::Dropped(err));
        }

        // validated records never overflow; saturate just in case
        let expected = record.expected_len().unwrap_or(usize::MAX);
        let actual = upload.pixels.len();
        if expected != actual {
            let err = TransferError::LengthMismatch { expected, actual };
            log::warn!("rejecting upload '{}': {}", record.name, err);
            return Ok(CommitOutcome::Dropped(err));
        }

        let painting = CommittedPainting {
            name: record.name,
            tiles_wide: record.tiles_wide,
            tiles_high: record.tiles_high,
            tile_resolution: record.tile_resolution,
            pixels: upload.pixels,
        };
        let (name, w, h) = (painting.name.clone(), painting.width(), painting.height());
        let id = self.registry.register(painting)?;
        log::info!("committed '{}' ({}x{}) as {}", name, w, h, id);
        Ok(CommitOutcome::Committed(id))
    }

    /// Abandon any partial upload and held finalize record. Idempotent.
    pub fn discard(&mut self) {
        self.chunks.discard();
        self.session_tiles = None;
        self.finalize = None;
        self.assembled = None;
    }

    /// Whether anything is held waiting for its other half.
    pub fn is_idle(&self) -> bool {
        !self.chunks.is_open() && self.finalize.is_none() && self.assembled.is_none()
    }
}

/// [`UploadReceiver`] behind a mutex, for transports that deliver messages
/// from several threads.
#[derive(Debug)]
pub struct SharedUploadReceiver<R> {
    inner: Arc<Mutex<UploadReceiver<R>>>,
}

impl<R> Clone for SharedUploadReceiver<R> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<R: PaintingRegistry> SharedUploadReceiver<R> {
    pub fn new(receiver: UploadReceiver<R>) -> Self {
        Self { inner: Arc::new(Mutex::new(receiver)) }
    }

    /// A panic on another thread leaves the state as it was at the panic
    /// point; the lock is recovered rather than propagated.
    pub fn handle(&self, message: Message) -> Result<CommitOutcome, TransferError> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).handle(message)
    }

    pub fn discard(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).discard();
    }

    pub fn with_registry<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(self.inner.lock().unwrap_or_else(PoisonError::into_inner).registry())
    }
}
