use thiserror::Error;

#[derive(Debug, Error)]
pub enum PixelatorError {
    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch {
        len: usize,
        width: usize,
        height: usize,
    },

    #[error("parameter `{field}` out of range: {value}")]
    ParameterViolation { field: &'static str, value: String },

    #[error("output size {width}x{height} does not fit a signed 32-bit range")]
    OutputTooLarge { width: u64, height: u64 },

    #[error("no image: {0}")]
    Decode(String),
}

impl PixelatorError {
    pub(crate) fn violation(field: &'static str, value: impl ToString) -> Self {
        Self::ParameterViolation { field, value: value.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("chunk index {index} outside 0..{total}")]
    OutOfRange { index: u32, total: u32 },

    #[error("chunk belongs to a transfer of {got} chunks, open session expects {expected}")]
    ForeignChunk { expected: u32, got: u32 },

    #[error("transfer incomplete: {received} of {total} chunks received")]
    Incomplete { received: u32, total: u32 },

    #[error("assembled buffer is {actual} bytes, painting needs {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("finalize field `{field}` out of range: {value}")]
    InvalidMetadata { field: &'static str, value: u32 },

    #[error("tile grid {got_wide}x{got_high} does not match the upload's {expected_wide}x{expected_high}")]
    TileMismatch {
        expected_wide: u32,
        expected_high: u32,
        got_wide: u32,
        got_high: u32,
    },

    #[error("maximum chunk size must be at least one byte")]
    ZeroChunkSize,

    #[error("chunk payload of {len} bytes exceeds the {max} byte limit")]
    ChunkTooLarge { len: usize, max: usize },

    #[error("malformed message: {0}")]
    Wire(#[from] serde_json::Error),

    #[error("registry rejected painting: {0}")]
    Registry(String),
}
