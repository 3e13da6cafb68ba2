use crate::backend::InferenceBackend;
use crate::error::{InferenceError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Serialized graph definition, read whole from storage.
///
/// The bytes are opaque here; only the backend knows the format.
#[derive(Debug, Clone)]
pub struct GraphDef {
    bytes: Vec<u8>,
    source: PathBuf,
}

impl GraphDef {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let bytes = fs::read(path).map_err(|source| InferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_bytes(bytes, path)
    }

    /// Wrap bytes that did not come from a file; `source` is only used in
    /// messages.
    pub fn from_bytes(bytes: Vec<u8>, source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        if bytes.is_empty() {
            return Err(InferenceError::EmptyFile { path: source });
        }
        Ok(Self { bytes, source })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Read `path` and import it as a graph.
///
/// The definition buffer is dropped once import returns, whether it
/// succeeded or not; a failed import leaves nothing behind.
pub fn load_graph<B: InferenceBackend>(backend: &B, path: impl AsRef<Path>) -> Result<B::Graph> {
    let definition = GraphDef::read(path)?;
    import_graph(backend, definition)
}

pub fn import_graph<B: InferenceBackend>(backend: &B, definition: GraphDef) -> Result<B::Graph> {
    tracing::debug!(
        backend = backend.name(),
        source = %definition.source().display(),
        bytes = definition.len(),
        "Importing graph definition"
    );

    let graph = backend.import_graph(&definition).map_err(|e| {
        tracing::error!(
            source = %definition.source().display(),
            error = %e,
            "Graph import failed"
        );
        InferenceError::GraphImport(format!("{}: {e:#}", definition.source().display()))
    })?;

    tracing::info!(source = %definition.source().display(), "Graph imported");
    Ok(graph)
}
