//! Painting Pixelator Library
//!
//! Turns an arbitrary image into a tile-aligned, palette-reduced pixel-art
//! painting, and moves the result over a size-limited channel in chunks.

pub mod color;
pub mod commit;
pub mod config;
pub mod dither;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod quantize;
pub mod raster;
pub mod resample;
pub mod session;
pub mod transfer;
pub mod wire;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export key types for easy usage
pub use color::{Oklab, OklabA, Rgba};
pub use commit::{
    CommitOutcome, CommittedPainting, MemoryRegistry, PaintingId, PaintingRegistry,
    SharedUploadReceiver, UploadReceiver,
};
pub use config::{Config, PixelatorConfig, TransferConfig};
pub use error::{PixelatorError, TransferError};
pub use grid::{detect_cell_size, CellSizeCache};
pub use pipeline::{adapt_to_pixel_art, derive_defaults, Pixelator, PixelatorParameters};
pub use quantize::{quantize, Palette};
pub use raster::{OutputImage, RawImage};
pub use session::EditingSession;
pub use transfer::{split, upload_messages, Chunk, ChunkReceiver, SessionState};
pub use wire::{DeleteRequest, FinalizeRecord, Message, UploadChunk};

pub mod prelude {
    pub use crate::commit::{CommitOutcome, MemoryRegistry, PaintingRegistry, UploadReceiver};
    pub use crate::config::{Config, PixelatorConfig, TransferConfig};
    pub use crate::error::{PixelatorError, TransferError};
    pub use crate::pipeline::{derive_defaults, Pixelator, PixelatorParameters};
    pub use crate::raster::{OutputImage, RawImage};
    pub use crate::session::EditingSession;
    pub use crate::transfer::upload_messages;
    pub use crate::wire::Message;
}
