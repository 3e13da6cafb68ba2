use crate::graph::GraphDef;
use crate::session::{NodeRef, NodeRole};
use crate::tensor::{DataType, TensorShape};

#[cfg(feature = "ort-backend")]
pub mod ort;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

/// A tensor owned by a native runtime.
///
/// Dropping the value releases the native allocation.
pub trait NativeTensor {
    fn dtype(&self) -> DataType;

    fn shape(&self) -> &TensorShape;

    /// Raw bytes of the tensor's storage.
    fn data(&self) -> anyhow::Result<&[u8]>;

    /// Mutable view of the tensor's storage; fails if the runtime cannot hand
    /// out its data pointer.
    fn data_mut(&mut self) -> anyhow::Result<&mut [u8]>;
}

/// Native runtime the pipeline drives: imports a serialized graph, binds one
/// session to it, and moves tensors in and out of runs.
///
/// Errors are reported as `anyhow` at this seam and mapped to
/// [`crate::InferenceError`] variants by the callers.
pub trait InferenceBackend {
    type Graph;
    type Session;
    type Tensor: NativeTensor;

    fn name(&self) -> &'static str;

    fn import_graph(&self, definition: &GraphDef) -> anyhow::Result<Self::Graph>;

    /// Whether `graph` exposes `name` with an output slot `index` in `role`.
    fn has_node(&self, graph: &Self::Graph, role: NodeRole, name: &str, index: usize) -> bool;

    fn create_session(&self, graph: &Self::Graph) -> anyhow::Result<Self::Session>;

    /// Allocate a zero-initialised tensor sized from `dtype` and `shape`.
    fn allocate_tensor(&self, dtype: DataType, shape: &TensorShape)
    -> anyhow::Result<Self::Tensor>;

    /// Run one forward pass, producing one tensor per entry of `outputs`.
    fn run(
        &self,
        session: &mut Self::Session,
        inputs: &[(&NodeRef, &Self::Tensor)],
        outputs: &[NodeRef],
    ) -> anyhow::Result<Vec<Self::Tensor>>;
}
