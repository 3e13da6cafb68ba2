use crate::error::{InferenceError, Result};
use crate::tensor::{DETECTION_PREFIX_WIDTH, TensorShape};
use ndarray::{ArrayView3, ShapeError};

/// Raw detection output of one inference call, owned by the caller.
///
/// Values are exactly what the graph produced. Nothing here thresholds,
/// transforms or suppresses candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionTensor {
    values: Vec<f32>,
    shape: TensorShape,
}

impl DetectionTensor {
    /// `shape` must be `[1, candidates, features]` with room for the box and
    /// objectness columns, and must match `values`.
    pub fn new(values: Vec<f32>, shape: TensorShape) -> Result<Self> {
        if shape.rank() != 3 || shape.dims()[0] != 1 || shape.dims()[2] < DETECTION_PREFIX_WIDTH {
            return Err(InferenceError::InvalidShape(format!(
                "detection output must be [1, candidates, features >= {DETECTION_PREFIX_WIDTH}], got {shape}"
            )));
        }
        if values.len() != shape.element_count() {
            return Err(InferenceError::InvalidShape(format!(
                "{} values do not fill shape {shape}",
                values.len()
            )));
        }
        Ok(Self { values, shape })
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }

    pub fn num_candidates(&self) -> usize {
        self.shape.dims()[1]
    }

    pub fn feature_width(&self) -> usize {
        self.shape.dims()[2]
    }

    /// One row per candidate detection.
    pub fn candidates(&self) -> impl ExactSizeIterator<Item = Candidate<'_>> {
        self.values
            .chunks_exact(self.feature_width())
            .map(|row| Candidate { row })
    }

    pub fn view(&self) -> std::result::Result<ArrayView3<'_, f32>, ShapeError> {
        ArrayView3::from_shape(
            (1, self.num_candidates(), self.feature_width()),
            &self.values,
        )
    }
}

/// Borrowed row of a [`DetectionTensor`]: `cx, cy, w, h, objectness, classes...`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    row: &'a [f32],
}

impl<'a> Candidate<'a> {
    pub fn raw(&self) -> &'a [f32] {
        self.row
    }

    pub fn bbox(&self) -> [f32; 4] {
        [self.row[0], self.row[1], self.row[2], self.row[3]]
    }

    pub fn objectness(&self) -> f32 {
        self.row[4]
    }

    pub fn class_scores(&self) -> &'a [f32] {
        &self.row[DETECTION_PREFIX_WIDTH..]
    }
}
