use crate::error::{InferenceError, Result};
use preprocess::InputLayout;
use std::fmt;

/// Four box coordinates plus the objectness score that precede the class
/// scores in every candidate row.
pub const DETECTION_PREFIX_WIDTH: usize = 5;

/// Widest element any [`DataType`] can have; byte lengths are checked against
/// it once, at shape construction.
const MAX_ELEMENT_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Float32,
    Int64,
    Int32,
    UInt8,
}

impl DataType {
    pub const fn size(self) -> usize {
        match self {
            DataType::Float32 | DataType::Int32 => 4,
            DataType::Int64 => 8,
            DataType::UInt8 => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DataType::Float32 => "f32",
            DataType::Int64 => "i64",
            DataType::Int32 => "i32",
            DataType::UInt8 => "u8",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, non-empty list of non-zero dimension sizes.
///
/// The element count is computed once with overflow checks, so
/// [`TensorShape::byte_len`] is infallible for every [`DataType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorShape {
    dims: Vec<usize>,
    element_count: usize,
}

impl TensorShape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Result<Self> {
        let dims = dims.into();

        if dims.is_empty() {
            return Err(InferenceError::InvalidShape(
                "shape must have at least one dimension".to_string(),
            ));
        }

        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(InferenceError::InvalidShape(format!(
                "dimension {axis} of {dims:?} is zero"
            )));
        }

        let element_count = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .filter(|n| n.checked_mul(MAX_ELEMENT_SIZE).is_some())
            .ok_or_else(|| {
                InferenceError::InvalidShape(format!("shape {dims:?} is too large to address"))
            })?;

        Ok(Self {
            dims,
            element_count,
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn byte_len(&self, dtype: DataType) -> usize {
        self.element_count * dtype.size()
    }

    /// Signed dimensions, as native runtimes describe shapes.
    pub fn to_i64(&self) -> Vec<i64> {
        self.dims.iter().map(|&d| d as i64).collect()
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

/// Input and output contract of the detection graph.
///
/// * input: `[1, height, width, channels]` (NHWC)
/// * output: `[1, candidates, features]` where each row is
///   `cx, cy, w, h, objectness, class scores...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelShapes {
    input: TensorShape,
    output: TensorShape,
    layout: InputLayout,
}

impl ModelShapes {
    pub fn new(input: TensorShape, output: TensorShape) -> Result<Self> {
        let layout = match *input.dims() {
            [1, height, width, channels] => InputLayout::new(
                to_u32(width, "input width")?,
                to_u32(height, "input height")?,
                to_u32(channels, "input channels")?,
            ),
            _ => {
                return Err(InferenceError::InvalidShape(format!(
                    "input must be [1, height, width, channels], got {input}"
                )));
            }
        };

        match *output.dims() {
            [1, _, features] if features >= DETECTION_PREFIX_WIDTH => {}
            _ => {
                return Err(InferenceError::InvalidShape(format!(
                    "output must be [1, candidates, features] with at least \
                     {DETECTION_PREFIX_WIDTH} features, got {output}"
                )));
            }
        }

        Ok(Self {
            input,
            output,
            layout,
        })
    }

    /// Convenience constructor from raw NHWC and `[1, N, D]` dims.
    pub fn from_dims(input: &[usize], output: &[usize]) -> Result<Self> {
        Self::new(TensorShape::new(input)?, TensorShape::new(output)?)
    }

    /// The shapes the reference YOLOv5 export declares:
    /// `[1, 640, 640, 3]` in, `[1, 25200, 85]` out.
    pub fn yolov5() -> Result<Self> {
        Self::from_dims(&[1, 640, 640, 3], &[1, 25200, 85])
    }

    pub fn input(&self) -> &TensorShape {
        &self.input
    }

    pub fn output(&self) -> &TensorShape {
        &self.output
    }

    pub fn input_size(&self) -> usize {
        self.input.element_count()
    }

    pub fn output_size(&self) -> usize {
        self.output.element_count()
    }

    pub fn input_layout(&self) -> InputLayout {
        self.layout
    }

    pub fn num_candidates(&self) -> usize {
        self.output.dims()[1]
    }

    pub fn feature_width(&self) -> usize {
        self.output.dims()[2]
    }

    pub fn num_classes(&self) -> usize {
        self.feature_width() - DETECTION_PREFIX_WIDTH
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| InferenceError::InvalidShape(format!("{what} {value} does not fit in u32")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count_and_byte_len() {
        let shape = TensorShape::new(vec![1, 640, 640, 3]).unwrap();
        assert_eq!(shape.rank(), 4);
        assert_eq!(shape.element_count(), 1_228_800);
        assert_eq!(shape.byte_len(DataType::Float32), 1_228_800 * 4);
        assert_eq!(shape.byte_len(DataType::UInt8), 1_228_800);
        assert_eq!(shape.to_string(), "[1, 640, 640, 3]");
    }

    #[test]
    fn test_rejects_degenerate_shapes() {
        assert!(matches!(
            TensorShape::new(Vec::new()),
            Err(InferenceError::InvalidShape(_))
        ));
        assert!(matches!(
            TensorShape::new(vec![1, 0, 3]),
            Err(InferenceError::InvalidShape(_))
        ));
        assert!(matches!(
            TensorShape::new(vec![usize::MAX, 2]),
            Err(InferenceError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_yolov5_shapes() {
        let shapes = ModelShapes::yolov5().unwrap();
        assert_eq!(shapes.input_size(), 640 * 640 * 3);
        assert_eq!(shapes.output_size(), 25200 * 85);
        assert_eq!(shapes.num_candidates(), 25200);
        assert_eq!(shapes.feature_width(), 85);
        assert_eq!(shapes.num_classes(), 80);
        assert_eq!(shapes.input_layout(), InputLayout::new(640, 640, 3));
    }

    #[test]
    fn test_input_layout_maps_nhwc() {
        let shapes = ModelShapes::from_dims(&[1, 480, 320, 3], &[1, 10, 6]).unwrap();
        let layout = shapes.input_layout();
        assert_eq!(layout.width, 320);
        assert_eq!(layout.height, 480);
        assert_eq!(layout.channels, 3);
    }

    #[test]
    fn test_rejects_batched_or_narrow_shapes() {
        assert!(ModelShapes::from_dims(&[2, 640, 640, 3], &[1, 25200, 85]).is_err());
        assert!(ModelShapes::from_dims(&[1, 640, 640], &[1, 25200, 85]).is_err());
        assert!(ModelShapes::from_dims(&[1, 640, 640, 3], &[1, 25200, 4]).is_err());
        assert!(ModelShapes::from_dims(&[1, 640, 640, 3], &[25200, 85]).is_err());
    }
}
