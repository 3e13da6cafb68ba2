pub mod cpu;
pub mod error;

pub use cpu::CpuPreProcessor;
pub use error::PreprocessError;

/// Width and height the reference detection model was exported with.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Interleaved 8-bit RGB.
pub const RGB_CHANNELS: u32 = 3;

/// Spatial layout of one NHWC model input (the batch dimension is always 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLayout {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl InputLayout {
    pub const fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Bytes (and output floats) in one row of interleaved samples.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    pub fn element_count(&self) -> usize {
        self.row_len() * self.height as usize
    }
}

impl Default for InputLayout {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE.0, DEFAULT_INPUT_SIZE.1, RGB_CHANNELS)
    }
}

/// Trait for image preprocessing implementations
pub trait Preprocess {
    /// Convert an interleaved 8-bit image into the flat, row-major `f32`
    /// buffer the model input expects.
    ///
    /// # Arguments
    /// * `pixels` - Interleaved samples in HWC order
    /// * `width` - Image width
    /// * `height` - Image height
    /// * `channels` - Samples per pixel; must equal the layout's channel count
    ///
    /// # Returns
    /// Exactly `layout().element_count()` floats in `0.0..=255.0`
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<Vec<f32>, PreprocessError>;

    /// Get the input layout this preprocessor targets
    fn layout(&self) -> InputLayout;
}
