use crate::backend::InferenceBackend;
use crate::error::{InferenceError, Result};
use crate::graph::load_graph;
use crate::tensor::ModelShapes;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Input,
    Output,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Input => f.write_str("input"),
            NodeRole::Output => f.write_str("output"),
        }
    }
}

/// A named graph endpoint that has been checked to exist.
///
/// Only [`resolve_node`] creates these, so holding one means resolution
/// succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    name: String,
    index: usize,
    role: NodeRole,
}

impl NodeRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }
}

pub fn resolve_node<B: InferenceBackend>(
    backend: &B,
    graph: &B::Graph,
    role: NodeRole,
    name: &str,
    index: usize,
) -> Result<NodeRef> {
    if !backend.has_node(graph, role, name, index) {
        tracing::error!(%role, name, index, "Graph node not found");
        return Err(InferenceError::NodeNotFound {
            name: name.to_string(),
            index,
        });
    }

    tracing::debug!(%role, name, index, "Resolved graph node");
    Ok(NodeRef {
        name: name.to_string(),
        index,
        role,
    })
}

pub fn create_session<B: InferenceBackend>(backend: &B, graph: &B::Graph) -> Result<B::Session> {
    backend.create_session(graph).map_err(|e| {
        tracing::error!(error = %e, "Session creation failed");
        InferenceError::SessionCreate(format!("{e:#}"))
    })
}

/// Which graph endpoints to bind and what shapes flow through them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub input_node: String,
    pub output_node: String,
    pub output_index: usize,
    pub shapes: ModelShapes,
}

impl ModelSpec {
    pub fn new(
        input_node: impl Into<String>,
        output_node: impl Into<String>,
        shapes: ModelShapes,
    ) -> Self {
        Self {
            input_node: input_node.into(),
            output_node: output_node.into(),
            output_index: 0,
            shapes,
        }
    }

    /// Node names and shapes of the reference YOLOv5 export.
    pub fn yolov5() -> Result<Self> {
        Ok(Self::new("x", "Identity", ModelShapes::yolov5()?))
    }
}

/// Graph, its single session, and the resolved endpoints, loaded once and
/// kept for the life of the process.
pub struct LoadedModel<B: InferenceBackend> {
    // Declared before `graph` so the session is dropped first.
    session: B::Session,
    graph: B::Graph,
    input: NodeRef,
    output: NodeRef,
    shapes: ModelShapes,
}

impl<B: InferenceBackend> LoadedModel<B> {
    /// Read, import and bind the model at `path`.
    pub fn load(backend: &B, path: impl AsRef<Path>, spec: &ModelSpec) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(backend = backend.name(), path = %path.display(), "Loading model");

        let graph = load_graph(backend, path)?;
        Self::from_graph(backend, graph, spec)
    }

    /// Resolve both endpoints, then create the session.
    ///
    /// A missing node fails before any session exists, so nothing can ever
    /// run against an unresolved endpoint.
    pub fn from_graph(backend: &B, graph: B::Graph, spec: &ModelSpec) -> Result<Self> {
        let input = resolve_node(backend, &graph, NodeRole::Input, &spec.input_node, 0)?;
        let output = resolve_node(
            backend,
            &graph,
            NodeRole::Output,
            &spec.output_node,
            spec.output_index,
        )?;

        let session = create_session(backend, &graph)?;

        tracing::info!(
            input = %input.name(),
            output = %output.name(),
            input_shape = %spec.shapes.input(),
            output_shape = %spec.shapes.output(),
            "Model ready"
        );

        Ok(Self {
            session,
            graph,
            input,
            output,
            shapes: spec.shapes.clone(),
        })
    }

    pub fn input(&self) -> &NodeRef {
        &self.input
    }

    pub fn output(&self) -> &NodeRef {
        &self.output
    }

    pub fn shapes(&self) -> &ModelShapes {
        &self.shapes
    }

    pub fn graph(&self) -> &B::Graph {
        &self.graph
    }

    /// One forward pass through the session with the resolved endpoints.
    pub(crate) fn run(&mut self, backend: &B, input: &B::Tensor) -> anyhow::Result<Vec<B::Tensor>> {
        backend.run(
            &mut self.session,
            &[(&self.input, input)],
            std::slice::from_ref(&self.output),
        )
    }
}
