//! Client-to-server message shapes for painting uploads.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::pipeline::{MAX_TILES, TILE_RESOLUTIONS};

/// One slice of an uploaded pixel buffer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunk {
    pub tiles_wide: u32,
    pub tiles_high: u32,
    pub chunk_bytes: Bytes,
    pub chunk_index: u32,
    pub total_chunks: u32,
}

/// Metadata that turns an assembled buffer into a painting. Sent once,
/// after the chunks, but may arrive before the last of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRecord {
    pub name: String,
    pub tiles_wide: u32,
    pub tiles_high: u32,
    pub tile_resolution: u32,
}

impl FinalizeRecord {
    /// Reject tile dimensions the pixelator could never have produced.
    pub fn validate(&self) -> Result<(), TransferError> {
        if !TILE_RESOLUTIONS.contains(&self.tile_resolution) {
            return Err(TransferError::InvalidMetadata { field: "tileResolution", value: self.tile_resolution });
        }
        if !(1..=MAX_TILES).contains(&self.tiles_wide) {
            return Err(TransferError::InvalidMetadata { field: "tilesWide", value: self.tiles_wide });
        }
        if !(1..=MAX_TILES).contains(&self.tiles_high) {
            return Err(TransferError::InvalidMetadata { field: "tilesHigh", value: self.tiles_high });
        }
        Ok(())
    }

    /// Byte length of the RGBA buffer this record describes, or `None` if
    /// it does not fit in `usize`.
    pub fn expected_len(&self) -> Option<usize> {
        let res = self.tile_resolution as usize;
        res.checked_mul(res)?
            .checked_mul(self.tiles_wide as usize)?
            .checked_mul(self.tiles_high as usize)?
            .checked_mul(4)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub painting_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    Upload(UploadChunk),
    Finalize(FinalizeRecord),
    Delete(DeleteRequest),
}

impl Message {
    pub fn to_json(&self) -> Result<Vec<u8>, TransferError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, TransferError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
