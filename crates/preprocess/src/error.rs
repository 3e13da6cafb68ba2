use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("Image has zero size ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Target layout has zero size ({width}x{height}x{channels})")]
    EmptyLayout {
        width: u32,
        height: u32,
        channels: u32,
    },

    #[error("Channel mismatch: model expects {expected} channels, image has {actual}")]
    ChannelMismatch { expected: u32, actual: u32 },

    #[error("Unsupported channel count {0}: only 1, 3 and 4 channel 8-bit images are handled")]
    UnsupportedChannels(u32),

    #[error(
        "Buffer size mismatch: expected {expected} bytes for {width}x{height}x{channels}, got {actual}"
    )]
    BufferSizeMismatch {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
        channels: u32,
    },

    #[error("Resize failed: {0}")]
    Resize(String),
}
