//! Moving raw buffers into and out of native tensors.
//!
//! Every tensor handed out here is wrapped in a [`ScopedTensor`], which
//! releases the native allocation when it goes out of scope. A tensor created
//! during an inference call is therefore released exactly once on every exit
//! path, including early returns through `?`.

use crate::backend::{InferenceBackend, NativeTensor};
use crate::error::{InferenceError, Result};
use crate::tensor::{DataType, TensorShape};
use std::ops::Deref;

/// Owns a native tensor for the duration of one call.
pub struct ScopedTensor<T: NativeTensor> {
    inner: T,
    label: &'static str,
}

impl<T: NativeTensor> ScopedTensor<T> {
    pub fn new(inner: T, label: &'static str) -> Self {
        tracing::trace!(label, shape = %inner.shape(), "Tensor acquired");
        Self { inner, label }
    }

    pub fn native(&self) -> &T {
        &self.inner
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl<T: NativeTensor> Deref for ScopedTensor<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: NativeTensor> Drop for ScopedTensor<T> {
    fn drop(&mut self) {
        tracing::trace!(label = self.label, "Tensor released");
    }
}

/// Release a tensor if there is one; `None` is a no-op.
pub fn release_tensor<T: NativeTensor>(tensor: Option<ScopedTensor<T>>) {
    if let Some(tensor) = tensor {
        tensor.release();
    }
}

/// Allocate a tensor of `dtype`/`shape` and fill it from `buffer`.
///
/// * `byte_len` larger than `buffer` is rejected: it would over-read the source.
/// * `byte_len` larger than the allocation is clamped to the allocation.
/// * `byte_len` smaller than the allocation is rejected: it would leave the
///   tensor partially initialised.
///
/// If the tensor's storage cannot be accessed after allocation, the tensor is
/// released before the error is returned.
pub fn make_tensor<B: InferenceBackend>(
    backend: &B,
    dtype: DataType,
    shape: &TensorShape,
    buffer: &[u8],
    byte_len: usize,
    label: &'static str,
) -> Result<ScopedTensor<B::Tensor>> {
    if byte_len > buffer.len() {
        return Err(InferenceError::TensorAlloc(format!(
            "{label}: declared length {byte_len} exceeds the {} byte source buffer",
            buffer.len()
        )));
    }

    let allocated = shape.byte_len(dtype);
    if byte_len < allocated {
        return Err(InferenceError::TensorAlloc(format!(
            "{label}: {byte_len} bytes cannot fill a {dtype} tensor of shape {shape} ({allocated} bytes)"
        )));
    }
    if byte_len > allocated {
        tracing::warn!(
            label,
            declared = byte_len,
            allocated,
            "Declared length exceeds tensor size, copy clamped"
        );
    }

    let native = backend
        .allocate_tensor(dtype, shape)
        .map_err(|e| InferenceError::TensorAlloc(format!("{label}: {e:#}")))?;
    let mut tensor = ScopedTensor::new(native, label);

    let dst = tensor
        .inner
        .data_mut()
        .map_err(|e| InferenceError::TensorAlloc(format!("{label}: storage unavailable: {e:#}")))?;

    if dst.len() != allocated {
        return Err(InferenceError::TensorAlloc(format!(
            "{label}: backend allocated {} bytes, expected {allocated}",
            dst.len()
        )));
    }

    let count = byte_len.min(dst.len());
    dst[..count].copy_from_slice(&buffer[..count]);

    Ok(tensor)
}

/// [`make_tensor`] for an `f32` buffer, declaring the buffer's full length.
pub fn make_f32_tensor<B: InferenceBackend>(
    backend: &B,
    shape: &TensorShape,
    values: &[f32],
    label: &'static str,
) -> Result<ScopedTensor<B::Tensor>> {
    let bytes: &[u8] = bytemuck::cast_slice(values);
    make_tensor(
        backend,
        DataType::Float32,
        shape,
        bytes,
        bytes.len(),
        label,
    )
}

/// Raw bytes of `tensor`, exactly its declared byte length.
pub fn read_tensor<T: NativeTensor>(tensor: &T) -> Result<&[u8]> {
    let expected = tensor.shape().byte_len(tensor.dtype());
    let data = tensor
        .data()
        .map_err(|e| InferenceError::Execution(format!("output storage unavailable: {e:#}")))?;

    if data.len() != expected {
        return Err(InferenceError::Execution(format!(
            "tensor of shape {} holds {} bytes, expected {expected}",
            tensor.shape(),
            data.len()
        )));
    }

    Ok(data)
}

/// Copy the first `count` floats out of `tensor` into an owned buffer.
pub fn read_f32<T: NativeTensor>(tensor: &T, count: usize) -> Result<Vec<f32>> {
    if tensor.dtype() != DataType::Float32 {
        return Err(InferenceError::Execution(format!(
            "expected an f32 tensor, got {}",
            tensor.dtype()
        )));
    }

    let data = read_tensor(tensor)?;
    let needed = count * DataType::Float32.size();
    if data.len() < needed {
        return Err(InferenceError::Execution(format!(
            "tensor holds {} floats, {count} requested",
            data.len() / DataType::Float32.size()
        )));
    }

    // Native storage is not guaranteed to be f32-aligned
    Ok(data[..needed]
        .chunks_exact(DataType::Float32.size())
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect())
}
