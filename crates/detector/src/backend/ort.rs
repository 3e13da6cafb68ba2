use super::{InferenceBackend, NativeTensor};
use crate::graph::GraphDef;
use crate::session::{NodeRef, NodeRole};
use crate::tensor::{DataType, TensorShape};
use anyhow::{Context, anyhow, bail};
use ort::{
    session::{Session, SessionInputs, builder::GraphOptimizationLevel},
    value::{DynValue, Tensor},
};
use std::borrow::Cow;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct OrtOptions {
    pub intra_threads: usize,
    /// `false` disables graph optimisation, mostly useful when debugging a
    /// freshly exported model.
    pub optimize: bool,
}

impl Default for OrtOptions {
    fn default() -> Self {
        Self {
            intra_threads: 4,
            optimize: true,
        }
    }
}

/// ONNX Runtime on the CPU execution provider.
pub struct OrtBackend {
    options: OrtOptions,
}

impl OrtBackend {
    pub fn new(options: OrtOptions) -> Self {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();
        tracing::info!(
            intra_threads = options.intra_threads,
            optimize = options.optimize,
            "Initializing ONNX Runtime with CPU execution provider"
        );
        Self { options }
    }
}

/// An imported model.
///
/// ONNX Runtime parses a model and binds its execution state in one step, so
/// the graph holds that state until [`InferenceBackend::create_session`]
/// claims it; a graph hands out exactly one session.
pub struct OrtGraph {
    inputs: Vec<String>,
    outputs: Vec<String>,
    session: Mutex<Option<Session>>,
}

pub struct OrtSession {
    session: Session,
}

pub struct OrtTensor {
    value: DynValue,
    dtype: DataType,
    shape: TensorShape,
}

impl NativeTensor for OrtTensor {
    fn dtype(&self) -> DataType {
        self.dtype
    }

    fn shape(&self) -> &TensorShape {
        &self.shape
    }

    fn data(&self) -> anyhow::Result<&[u8]> {
        let (_, data) = self.value.try_extract_tensor::<f32>()?;
        Ok(bytemuck::cast_slice(data))
    }

    fn data_mut(&mut self) -> anyhow::Result<&mut [u8]> {
        let (_, data) = self.value.try_extract_tensor_mut::<f32>()?;
        Ok(bytemuck::cast_slice_mut(data))
    }
}

impl InferenceBackend for OrtBackend {
    type Graph = OrtGraph;
    type Session = OrtSession;
    type Tensor = OrtTensor;

    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    fn import_graph(&self, definition: &GraphDef) -> anyhow::Result<OrtGraph> {
        let level = if self.options.optimize {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Disable
        };

        let session = Session::builder()?
            .with_optimization_level(level)?
            .with_intra_threads(self.options.intra_threads)?
            .commit_from_memory(definition.as_bytes())?;

        let inputs: Vec<String> = session
            .inputs()
            .iter()
            .map(|input| input.name().to_string())
            .collect();
        let outputs: Vec<String> = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();

        tracing::debug!(?inputs, ?outputs, "ONNX graph endpoints");

        Ok(OrtGraph {
            inputs,
            outputs,
            session: Mutex::new(Some(session)),
        })
    }

    fn has_node(&self, graph: &OrtGraph, role: NodeRole, name: &str, index: usize) -> bool {
        // ONNX graph endpoints are single named values
        if index != 0 {
            return false;
        }
        let names = match role {
            NodeRole::Input => &graph.inputs,
            NodeRole::Output => &graph.outputs,
        };
        names.iter().any(|n| n == name)
    }

    fn create_session(&self, graph: &OrtGraph) -> anyhow::Result<OrtSession> {
        let session = graph
            .session
            .lock()
            .map_err(|_| anyhow!("graph session lock poisoned"))?
            .take()
            .context("a session has already been created for this graph")?;

        Ok(OrtSession { session })
    }

    fn allocate_tensor(&self, dtype: DataType, shape: &TensorShape) -> anyhow::Result<OrtTensor> {
        if dtype != DataType::Float32 {
            bail!("onnxruntime backend only allocates f32 tensors, got {dtype}");
        }

        let tensor = Tensor::from_array((shape.to_i64(), vec![0.0f32; shape.element_count()]))?;

        Ok(OrtTensor {
            value: tensor.into_dyn(),
            dtype,
            shape: shape.clone(),
        })
    }

    fn run(
        &self,
        session: &mut OrtSession,
        inputs: &[(&NodeRef, &OrtTensor)],
        outputs: &[NodeRef],
    ) -> anyhow::Result<Vec<OrtTensor>> {
        let values = inputs
            .iter()
            .map(|(node, tensor)| (Cow::Borrowed(node.name()), tensor.value.view().into()))
            .collect::<Vec<_>>();

        let ort_inputs: SessionInputs<'_, '_, 0> = SessionInputs::ValueMap(values);
        let mut produced = session.session.run(ort_inputs)?;

        let mut results = Vec::with_capacity(outputs.len());
        for node in outputs {
            let value = produced
                .remove(node.name())
                .with_context(|| format!("session produced no value for '{}'", node.name()))?;

            let shape = {
                let (shape, _) = value.try_extract_tensor::<f32>()?;
                TensorShape::new(shape.iter().map(|&d| d as usize).collect::<Vec<_>>())?
            };

            results.push(OrtTensor {
                value,
                dtype: DataType::Float32,
                shape,
            });
        }

        Ok(results)
    }
}
