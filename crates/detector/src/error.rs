use preprocess::PreprocessError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InferenceError>;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Model file {path} is empty")]
    EmptyFile { path: PathBuf },

    #[error("Graph import failed: {0}")]
    GraphImport(String),

    #[error("Session creation failed: {0}")]
    SessionCreate(String),

    #[error("Node '{name}' (output {index}) not found in graph")]
    NodeNotFound { name: String, index: usize },

    #[error("Tensor allocation failed: {0}")]
    TensorAlloc(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid tensor shape: {0}")]
    InvalidShape(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
}
