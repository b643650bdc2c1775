//! Chunked transfer over a channel with a per-message size limit.
//!
//! The sender slices a buffer into contiguous chunks in index order. The
//! receiver tolerates any arrival order and duplicates, tracks at most one
//! session at a time, and yields the assembled buffer exactly once, when
//! every index `0..total` is present.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::pipeline::PixelatorParameters;
use crate::raster::OutputImage;
use crate::wire::{FinalizeRecord, Message, UploadChunk};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub index: u32,
    pub total: u32,
    pub bytes: Bytes,
}

/// Split `buffer` into `ceil(len / max_chunk_size)` contiguous chunks.
///
/// Slices share the original allocation. An empty buffer yields no chunks.
pub fn split(buffer: Bytes, max_chunk_size: usize) -> Result<Vec<Chunk>, TransferError> {
    if max_chunk_size == 0 {
        return Err(TransferError::ZeroChunkSize);
    }
    let total = buffer.len().div_ceil(max_chunk_size);
    let total = u32::try_from(total)
        .map_err(|_| TransferError::ChunkTooLarge { len: buffer.len(), max: max_chunk_size })?;

    Ok((0..total)
        .map(|index| {
            let start = index as usize * max_chunk_size;
            let end = (start + max_chunk_size).min(buffer.len());
            Chunk { index, total, bytes: buffer.slice(start..end) }
        })
        .collect())
}

/// Every message needed to upload `output`: the chunks in index order,
/// then the finalize record.
pub fn upload_messages(
    output: &OutputImage,
    params: &PixelatorParameters,
    name: &str,
    config: &TransferConfig,
) -> Result<Vec<Message>, TransferError> {
    let chunks = split(Bytes::from(output.to_rgba_bytes()), config.max_chunk_size)?;
    let mut messages: Vec<Message> = chunks
        .into_iter()
        .map(|c| {
            Message::Upload(UploadChunk {
                tiles_wide: params.tiles_wide,
                tiles_high: params.tiles_high,
                chunk_bytes: c.bytes,
                chunk_index: c.index,
                total_chunks: c.total,
            })
        })
        .collect();
    messages.push(Message::Finalize(FinalizeRecord {
        name: name.to_string(),
        tiles_wide: params.tiles_wide,
        tiles_high: params.tiles_high,
        tile_resolution: params.tile_resolution,
    }));
    Ok(messages)
}

/// Receiver-side outcome of one [`ChunkReceiver::accept`] call
#[derive(Debug)]
pub enum SessionState {
    /// Session open, waiting for more chunks
    Pending { received: u32, total: u32 },
    /// All chunks present; the session is closed and this is the buffer
    Complete(Bytes),
    /// Chunk ignored; any open session is unaffected
    Dropped(TransferError),
}

#[derive(Debug)]
struct TransferSession {
    total: u32,
    // ordered so completion writes out in index order
    chunks: BTreeMap<u32, Bytes>,
}

impl TransferSession {
    fn new(total: u32) -> Self {
        Self { total, chunks: BTreeMap::new() }
    }

    fn received(&self) -> u32 {
        self.chunks.len() as u32
    }

    fn is_complete(&self) -> bool {
        self.received() == self.total
    }

    fn assemble(self) -> Bytes {
        let len = self.chunks.values().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(len);
        for bytes in self.chunks.into_values() {
            out.extend_from_slice(&bytes);
        }
        out.freeze()
    }
}

/// Reassembles one in-flight transfer per sender.
#[derive(Debug, Default)]
pub struct ChunkReceiver {
    session: Option<TransferSession>,
}

impl ChunkReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one chunk.
    ///
    /// A chunk whose `total` differs from the open session's belongs to a
    /// newer upload: the incomplete session is discarded and a fresh one is
    /// opened. Duplicate indices overwrite the earlier bytes.
    pub fn accept(&mut self, index: u32, bytes: Bytes, total: u32) -> SessionState {
        if index >= total {
            let err = TransferError::OutOfRange { index, total };
            log::warn!("dropping chunk: {}", err);
            return SessionState::Dropped(err);
        }

        let mut session = match self.session.take() {
            Some(open) if open.total == total => open,
            Some(open) => {
                log::warn!(
                    "{}; discarding session with {} of {} chunks",
                    TransferError::ForeignChunk { expected: open.total, got: total },
                    open.received(),
                    open.total
                );
                TransferSession::new(total)
            }
            None => TransferSession::new(total),
        };
        session.chunks.insert(index, bytes);

        if session.is_complete() {
            let buffer = session.assemble();
            log::info!("transfer complete: {} chunks, {} bytes", total, buffer.len());
            SessionState::Complete(buffer)
        } else {
            let state = SessionState::Pending { received: session.received(), total };
            self.session = Some(session);
            state
        }
    }

    /// Drop the open session, if any. Returns whether one was open.
    pub fn discard(&mut self) -> bool {
        let had = self.session.take();
        if let Some(s) = &had {
            log::info!("discarding transfer with {} of {} chunks", s.received(), s.total);
        }
        had.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// `(received, total)` for the open session.
    pub fn progress(&self) -> Option<(u32, u32)> {
        self.session.as_ref().map(|s| (s.received(), s.total))
    }
}
