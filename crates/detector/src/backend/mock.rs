//! In-process backend that records every native allocation and release.
//!
//! Graph definitions are plain text, one endpoint per line:
//!
//! ```text
//! input x 1,640,640,3
//! output Identity 1,25200,85
//! ```
//!
//! Runs behave like an identity graph: each output is filled by cycling
//! through the bytes of the first input.

use super::{InferenceBackend, NativeTensor};
use crate::graph::GraphDef;
use crate::session::{NodeRef, NodeRole};
use crate::tensor::{DataType, TensorShape};
use anyhow::{Context, bail};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Counters shared between a [`MockBackend`] and every tensor it creates.
#[derive(Debug, Default)]
pub struct TensorLedger {
    allocated: AtomicUsize,
    released: AtomicUsize,
    sessions: AtomicUsize,
    runs: AtomicUsize,
}

impl TensorLedger {
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Tensors allocated and not yet released.
    pub fn live(&self) -> usize {
        self.allocated() - self.released()
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Run attempts, including the ones that failed.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

/// Failures to inject.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFaults {
    pub fail_session: bool,
    pub fail_allocation: bool,
    pub fail_data_access: bool,
    pub fail_run: bool,
    /// Run succeeds but returns no output tensors.
    pub drop_outputs: bool,
}

#[derive(Debug, Default)]
pub struct MockBackend {
    ledger: Arc<TensorLedger>,
    faults: MockFaults,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: MockFaults) -> Self {
        Self {
            ledger: Arc::default(),
            faults,
        }
    }

    pub fn ledger(&self) -> Arc<TensorLedger> {
        Arc::clone(&self.ledger)
    }
}

#[derive(Debug, Clone)]
struct MockNode {
    role: NodeRole,
    name: String,
    shape: TensorShape,
}

#[derive(Debug)]
pub struct MockGraph {
    nodes: Vec<MockNode>,
    session_created: AtomicBool,
}

#[derive(Debug)]
pub struct MockSession {
    nodes: Vec<MockNode>,
}

impl MockSession {
    fn node(&self, role: NodeRole, name: &str) -> Option<&MockNode> {
        self.nodes
            .iter()
            .find(|n| n.role == role && n.name == name)
    }
}

#[derive(Debug)]
pub struct MockTensor {
    dtype: DataType,
    shape: TensorShape,
    data: Vec<u8>,
    data_access_fails: bool,
    ledger: Arc<TensorLedger>,
}

impl NativeTensor for MockTensor {
    fn dtype(&self) -> DataType {
        self.dtype
    }

    fn shape(&self) -> &TensorShape {
        &self.shape
    }

    fn data(&self) -> anyhow::Result<&[u8]> {
        if self.data_access_fails {
            bail!("data pointer unavailable");
        }
        Ok(&self.data)
    }

    fn data_mut(&mut self) -> anyhow::Result<&mut [u8]> {
        if self.data_access_fails {
            bail!("data pointer unavailable");
        }
        Ok(&mut self.data)
    }
}

impl Drop for MockTensor {
    fn drop(&mut self) {
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Text definition of a one-input, one-output graph.
pub fn graph_definition(input: (&str, &[usize]), output: (&str, &[usize])) -> String {
    fn dims(dims: &[usize]) -> String {
        dims.iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    format!(
        "input {} {}\noutput {} {}\n",
        input.0,
        dims(input.1),
        output.0,
        dims(output.1)
    )
}

fn parse_graph(bytes: &[u8]) -> anyhow::Result<Vec<MockNode>> {
    let text = std::str::from_utf8(bytes).context("graph definition is not UTF-8")?;

    let mut nodes = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [role, name, dims] = fields[..] else {
            bail!("line {}: expected `<role> <name> <dims>`", number + 1);
        };

        let role = match role {
            "input" => NodeRole::Input,
            "output" => NodeRole::Output,
            other => bail!("line {}: unknown role '{other}'", number + 1),
        };

        let dims = dims
            .split(',')
            .map(|d| d.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("line {}: bad dimensions", number + 1))?;

        nodes.push(MockNode {
            role,
            name: name.to_string(),
            shape: TensorShape::new(dims)?,
        });
    }

    if nodes.is_empty() {
        bail!("graph definition declares no nodes");
    }
    Ok(nodes)
}

impl InferenceBackend for MockBackend {
    type Graph = MockGraph;
    type Session = MockSession;
    type Tensor = MockTensor;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn import_graph(&self, definition: &GraphDef) -> anyhow::Result<MockGraph> {
        Ok(MockGraph {
            nodes: parse_graph(definition.as_bytes())?,
            session_created: AtomicBool::new(false),
        })
    }

    fn has_node(&self, graph: &MockGraph, role: NodeRole, name: &str, index: usize) -> bool {
        index == 0 && graph.nodes.iter().any(|n| n.role == role && n.name == name)
    }

    fn create_session(&self, graph: &MockGraph) -> anyhow::Result<MockSession> {
        if self.faults.fail_session {
            bail!("injected session failure");
        }
        if graph.session_created.swap(true, Ordering::SeqCst) {
            bail!("a session is already bound to this graph");
        }

        self.ledger.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            nodes: graph.nodes.clone(),
        })
    }

    fn allocate_tensor(&self, dtype: DataType, shape: &TensorShape) -> anyhow::Result<MockTensor> {
        if self.faults.fail_allocation {
            bail!("injected allocation failure");
        }

        self.ledger.allocated.fetch_add(1, Ordering::SeqCst);
        Ok(MockTensor {
            dtype,
            shape: shape.clone(),
            data: vec![0; shape.byte_len(dtype)],
            data_access_fails: self.faults.fail_data_access,
            ledger: Arc::clone(&self.ledger),
        })
    }

    fn run(
        &self,
        session: &mut MockSession,
        inputs: &[(&NodeRef, &MockTensor)],
        outputs: &[NodeRef],
    ) -> anyhow::Result<Vec<MockTensor>> {
        self.ledger.runs.fetch_add(1, Ordering::SeqCst);

        if self.faults.fail_run {
            bail!("injected run failure");
        }

        for (node, tensor) in inputs {
            let declared = session
                .node(NodeRole::Input, node.name())
                .with_context(|| format!("unknown input '{}'", node.name()))?;
            if declared.shape != *tensor.shape() {
                bail!(
                    "input '{}' expects shape {}, got {}",
                    node.name(),
                    declared.shape,
                    tensor.shape()
                );
            }
        }

        if self.faults.drop_outputs {
            return Ok(Vec::new());
        }

        let source: &[u8] = match inputs.first() {
            Some((_, tensor)) => tensor.data()?,
            None => &[],
        };

        let mut results = Vec::with_capacity(outputs.len());
        for node in outputs {
            let shape = session
                .node(NodeRole::Output, node.name())
                .with_context(|| format!("unknown output '{}'", node.name()))?
                .shape
                .clone();

            let mut tensor = self.allocate_tensor(DataType::Float32, &shape)?;
            if !source.is_empty() {
                for (dst, src) in tensor.data.iter_mut().zip(source.iter().cycle()) {
                    *dst = *src;
                }
            }
            results.push(tensor);
        }

        Ok(results)
    }
}
