pub mod backend;
pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod marshal;
pub mod output;
pub mod service;
pub mod session;
pub mod tensor;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, NativeTensor};
pub use config::InferenceConfig;
pub use error::{InferenceError, Result};
pub use graph::{GraphDef, load_graph};
pub use output::{Candidate, DetectionTensor};
pub use service::{CycleState, InferenceService};
pub use session::{LoadedModel, ModelSpec, NodeRef, NodeRole};
pub use tensor::{DataType, ModelShapes, TensorShape};
