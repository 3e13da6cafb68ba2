use crate::{InputLayout, Preprocess, PreprocessError};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};

/// Resizes to the model input size and widens samples to `f32` without any
/// normalisation.
pub struct CpuPreProcessor {
    layout: InputLayout,
    resizer: Resizer,
    options: ResizeOptions,
}

impl CpuPreProcessor {
    pub fn new(layout: InputLayout) -> Self {
        Self {
            layout,
            resizer: Resizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Interpolation(FilterType::Bilinear)),
        }
    }

    pub fn preprocess_from_u8_slice(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<Vec<f32>, PreprocessError> {
        let _s = span!("preprocess_image");

        tracing::trace!(
            width,
            height,
            channels,
            pixel_bytes = pixels.len(),
            "Preprocessing image dimensions"
        );

        self.validate(pixels, width, height, channels)?;
        let pixel_type = pixel_type(channels)?;

        if (width, height) == (self.layout.width, self.layout.height) {
            return Ok(self.widen(pixels));
        }

        let resized = self.resize(pixels, width, height, pixel_type)?;
        Ok(self.widen(resized.buffer()))
    }

    fn validate(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<(), PreprocessError> {
        let layout = self.layout;
        if layout.width == 0 || layout.height == 0 || layout.channels == 0 {
            return Err(PreprocessError::EmptyLayout {
                width: layout.width,
                height: layout.height,
                channels: layout.channels,
            });
        }

        if width == 0 || height == 0 {
            return Err(PreprocessError::EmptyImage { width, height });
        }

        // Row slicing below assumes the image and the model agree on channels.
        if channels != self.layout.channels {
            return Err(PreprocessError::ChannelMismatch {
                expected: self.layout.channels,
                actual: channels,
            });
        }

        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(PreprocessError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
                width,
                height,
                channels,
            });
        }

        Ok(())
    }

    fn resize(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        pixel_type: PixelType,
    ) -> Result<Image<'static>, PreprocessError> {
        let _s = span!("resize");

        let src = ImageRef::new(width, height, pixels, pixel_type)
            .map_err(|e| PreprocessError::Resize(e.to_string()))?;
        let mut dst = Image::new(self.layout.width, self.layout.height, pixel_type);

        self.resizer
            .resize(&src, &mut dst, &self.options)
            .map_err(|e| PreprocessError::Resize(e.to_string()))?;

        Ok(dst)
    }

    /// Walk rows `0..height`, and within each row the raw interleaved samples
    /// `0..width*channels`, widening every byte to `f32`.
    fn widen(&self, pixels: &[u8]) -> Vec<f32> {
        let _s = span!("widen");

        let mut output = Vec::with_capacity(self.layout.element_count());
        for row in pixels
            .chunks_exact(self.layout.row_len())
            .take(self.layout.height as usize)
        {
            output.extend(row.iter().map(|&v| f32::from(v)));
        }
        output
    }
}

fn pixel_type(channels: u32) -> Result<PixelType, PreprocessError> {
    match channels {
        1 => Ok(PixelType::U8),
        3 => Ok(PixelType::U8x3),
        4 => Ok(PixelType::U8x4),
        other => Err(PreprocessError::UnsupportedChannels(other)),
    }
}

impl Default for CpuPreProcessor {
    fn default() -> Self {
        Self::new(InputLayout::default())
    }
}

impl Preprocess for CpuPreProcessor {
    fn preprocess(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<Vec<f32>, PreprocessError> {
        self.preprocess_from_u8_slice(pixels, width, height, channels)
    }

    fn layout(&self) -> InputLayout {
        self.layout
    }
}
