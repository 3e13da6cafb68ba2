use crate::error::Result;
use crate::session::ModelSpec;
use crate::tensor::ModelShapes;
use common::{env_opt, env_or, env_string};

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub environment: Environment,
    pub model_path: String,
    pub image_path: String,
    pub input_node: String,
    pub output_node: String,
    pub input_size: (u32, u32),
    pub input_channels: u32,
    pub num_candidates: usize,
    pub feature_width: usize,
    pub intra_threads: usize,
    /// Leading values of each candidate row printed by the binary.
    pub print_values: usize,
    pub otel_endpoint: Option<String>,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        Self {
            environment: Environment::from_env(),
            model_path: env_string("MODEL_PATH", "yolov5n.onnx"),
            image_path: env_string("IMAGE_PATH", "image.jpg"),
            input_node: env_string("INPUT_NODE", "x"),
            output_node: env_string("OUTPUT_NODE", "Identity"),
            input_size: (env_or("INPUT_WIDTH", 640), env_or("INPUT_HEIGHT", 640)),
            input_channels: env_or("INPUT_CHANNELS", 3),
            num_candidates: env_or("NUM_CANDIDATES", 25200),
            feature_width: env_or("FEATURE_WIDTH", 85),
            intra_threads: env_or("INTRA_THREADS", 4),
            print_values: env_or("PRINT_VALUES", 6),
            otel_endpoint: env_opt("OTEL_ENDPOINT"),
        }
    }

    /// Node names and NHWC shapes described by this configuration.
    pub fn model_spec(&self) -> Result<ModelSpec> {
        let (width, height) = self.input_size;
        let shapes = ModelShapes::from_dims(
            &[1, height as usize, width as usize, self.input_channels as usize],
            &[1, self.num_candidates, self.feature_width],
        )?;
        Ok(ModelSpec::new(&*self.input_node, &*self.output_node, shapes))
    }

    #[cfg(feature = "ort-backend")]
    pub fn ort_options(&self) -> crate::backend::ort::OrtOptions {
        crate::backend::ort::OrtOptions {
            intra_threads: self.intra_threads,
            ..Default::default()
        }
    }

    /// Create default configuration for testing
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            model_path: "/models/yolov5n.onnx".to_string(),
            image_path: "/images/street.jpg".to_string(),
            input_node: "x".to_string(),
            output_node: "Identity".to_string(),
            input_size: (640, 640),
            input_channels: 3,
            num_candidates: 25200,
            feature_width: 85,
            intra_threads: 4,
            print_values: 6,
            otel_endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const KEYS: [&str; 6] = [
        "MODEL_PATH",
        "INPUT_NODE",
        "INPUT_WIDTH",
        "INPUT_HEIGHT",
        "NUM_CANDIDATES",
        "OTEL_ENDPOINT",
    ];

    fn clear() {
        for key in KEYS {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    fn test_default_spec_is_yolov5() {
        let spec = InferenceConfig::test_default().model_spec().unwrap();
        assert_eq!(spec, ModelSpec::yolov5().unwrap());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear();
        let config = InferenceConfig::from_env();

        assert_eq!(config.model_path, "yolov5n.onnx");
        assert_eq!(config.input_node, "x");
        assert_eq!(config.input_size, (640, 640));
        assert_eq!(config.num_candidates, 25200);
        assert!(config.otel_endpoint.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear();
        unsafe {
            env::set_var("MODEL_PATH", "/tmp/small.onnx");
            env::set_var("INPUT_NODE", "images");
            env::set_var("INPUT_WIDTH", "320");
            env::set_var("INPUT_HEIGHT", "256");
            env::set_var("OTEL_ENDPOINT", "http://collector:4317");
        }

        let config = InferenceConfig::from_env();
        clear();

        assert_eq!(config.model_path, "/tmp/small.onnx");
        assert_eq!(config.input_node, "images");
        assert_eq!(config.otel_endpoint.as_deref(), Some("http://collector:4317"));

        let spec = config.model_spec().unwrap();
        assert_eq!(spec.shapes.input().dims(), &[1, 256, 320, 3]);
    }

    #[test]
    #[serial]
    fn test_unparseable_value_falls_back() {
        clear();
        unsafe { env::set_var("NUM_CANDIDATES", "lots") };
        let config = InferenceConfig::from_env();
        clear();

        assert_eq!(config.num_candidates, 25200);
    }

    #[test]
    fn test_invalid_shape_is_rejected() {
        let mut config = InferenceConfig::test_default();
        config.feature_width = 4;
        assert!(config.model_spec().is_err());

        config.feature_width = 85;
        config.input_channels = 0;
        assert!(config.model_spec().is_err());
    }
}
