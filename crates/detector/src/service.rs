use crate::{
    backend::{InferenceBackend, NativeTensor},
    error::{InferenceError, Result},
    marshal::{self, ScopedTensor},
    output::DetectionTensor,
    session::LoadedModel,
};
use image::RgbImage;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use preprocess::{CpuPreProcessor, Preprocess, RGB_CHANNELS};
use std::time::Instant;

/// Stages of one inference call. Every call walks the states in order and
/// ends back at `Idle`; tensors acquired along the way are released on any
/// early exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Preprocessed,
    MarshalledIn,
    Run,
    MarshalledOut,
    Released,
}

struct CycleMetrics {
    duration: Histogram<f64>,
    calls: Counter<u64>,
    failures: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> CycleMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.005, 0.01, 0.02, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
    ];
    let duration = meter
        .f64_histogram("inference_duration_seconds")
        .with_description("Time for one inference call (preprocess + run + copy out)")
        .with_unit("s")
        .with_boundaries(latency_buckets.to_vec())
        .build();
    let calls = meter
        .u64_counter("inference_calls_total")
        .with_description("Total inference calls")
        .build();
    let failures = meter
        .u64_counter("inference_failures_total")
        .with_description("Inference calls that returned an error")
        .build();

    CycleMetrics {
        duration,
        calls,
        failures,
    }
}

/// Drives single, sequential inference calls against a loaded model.
///
/// `infer` takes `&mut self`: callers on several threads must put the service
/// behind a mutex or give each worker its own.
pub struct InferenceService<B: InferenceBackend> {
    backend: B,
    model: LoadedModel<B>,
    preprocessor: CpuPreProcessor,
    metrics: CycleMetrics,
    calls: u64,
}

impl<B: InferenceBackend> InferenceService<B> {
    pub fn new(backend: B, model: LoadedModel<B>) -> Self {
        let preprocessor = CpuPreProcessor::new(model.shapes().input_layout());
        Self {
            backend,
            model,
            preprocessor,
            metrics: init_metrics("detector"),
            calls: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn model(&self) -> &LoadedModel<B> {
        &self.model
    }

    /// Calls attempted so far, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Run one forward pass on a decoded RGB image of any size.
    pub fn infer(&mut self, image: &RgbImage) -> Result<DetectionTensor> {
        self.infer_pixels(image.as_raw(), image.width(), image.height(), RGB_CHANNELS)
    }

    /// Run one forward pass on interleaved 8-bit samples.
    pub fn infer_pixels(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<DetectionTensor> {
        self.calls += 1;
        let span = tracing::info_span!("inference_call", call = self.calls, width, height);
        let _enter = span.enter();

        let start = Instant::now();
        let result = self.run_cycle(pixels, width, height, channels);
        let elapsed = start.elapsed().as_secs_f64();

        self.metrics.duration.record(elapsed, &[]);
        self.metrics.calls.add(1, &[]);

        match &result {
            Ok(output) => {
                tracing::debug!(
                    elapsed_ms = elapsed * 1000.0,
                    values = output.len(),
                    "Inference complete"
                );
            }
            Err(e) => {
                self.metrics.failures.add(1, &[]);
                tracing::error!(error = %e, "Inference failed");
            }
        }

        result
    }

    fn run_cycle(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<DetectionTensor> {
        let mut state = CycleState::Idle;
        let shapes = self.model.shapes().clone();

        let input_values = self.preprocessor.preprocess(pixels, width, height, channels)?;
        advance(&mut state, CycleState::Preprocessed);

        let input = marshal::make_f32_tensor(&self.backend, shapes.input(), &input_values, "input")?;
        advance(&mut state, CycleState::MarshalledIn);

        let produced = {
            let _s = tracing::info_span!("model_inference").entered();
            self.model.run(&self.backend, input.native())
        }
        .map_err(|e| InferenceError::Execution(format!("{e:#}")))?;

        // Take ownership of everything the run produced before checking it
        let mut outputs: Vec<ScopedTensor<B::Tensor>> = produced
            .into_iter()
            .map(|tensor| ScopedTensor::new(tensor, "output"))
            .collect();
        advance(&mut state, CycleState::Run);

        let output = match (outputs.pop(), outputs.is_empty()) {
            (Some(output), true) => output,
            (popped, _) => {
                return Err(InferenceError::Execution(format!(
                    "expected 1 output tensor, session returned {}",
                    outputs.len() + usize::from(popped.is_some())
                )));
            }
        };

        if output.shape() != shapes.output() {
            tracing::warn!(
                declared = %shapes.output(),
                produced = %output.shape(),
                "Output shape differs from the declared shape"
            );
        }

        let values = marshal::read_f32(output.native(), shapes.output_size())?;
        advance(&mut state, CycleState::MarshalledOut);

        marshal::release_tensor(Some(output));
        marshal::release_tensor(Some(input));
        advance(&mut state, CycleState::Released);

        let detections = DetectionTensor::new(values, shapes.output().clone())?;
        advance(&mut state, CycleState::Idle);

        Ok(detections)
    }
}

fn advance(state: &mut CycleState, next: CycleState) {
    tracing::trace!(from = ?*state, to = ?next, "Inference cycle state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, MockFaults, graph_definition};
    use crate::graph::{GraphDef, import_graph};
    use crate::session::ModelSpec;
    use crate::tensor::ModelShapes;

    fn service(faults: MockFaults) -> InferenceService<MockBackend> {
        let backend = MockBackend::with_faults(faults);
        let text = graph_definition(("x", &[1, 4, 4, 3]), ("Identity", &[1, 8, 6]));
        let definition = GraphDef::from_bytes(text.into_bytes(), "small.graph").unwrap();
        let graph = import_graph(&backend, definition).unwrap();
        let spec = ModelSpec::new(
            "x",
            "Identity",
            ModelShapes::from_dims(&[1, 4, 4, 3], &[1, 8, 6]).unwrap(),
        );
        let model = LoadedModel::from_graph(&backend, graph, &spec).unwrap();
        InferenceService::new(backend, model)
    }

    #[test]
    fn test_identity_graph_echoes_pixels() {
        let mut service = service(MockFaults::default());
        let pixels: Vec<u8> = (0..48).collect();

        let output = service.infer_pixels(&pixels, 4, 4, 3).unwrap();

        // 48 output values, cycled from the 48 widened input samples
        assert_eq!(output.len(), 48);
        assert_eq!(output.as_slice()[0], 0.0);
        assert_eq!(output.as_slice()[47], 47.0);
        assert_eq!(service.calls(), 1);
        assert_eq!(service.backend().ledger().live(), 0);
    }

    #[test]
    fn test_missing_output_is_execution_error() {
        let mut service = service(MockFaults {
            drop_outputs: true,
            ..MockFaults::default()
        });

        let result = service.infer_pixels(&[0u8; 48], 4, 4, 3);

        assert!(matches!(result, Err(InferenceError::Execution(_))));
        let ledger = service.backend().ledger();
        assert_eq!(ledger.allocated(), 1);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_rgb_image_entry_point() {
        let mut service = service(MockFaults::default());
        let image = RgbImage::from_pixel(9, 5, image::Rgb([10, 20, 30]));

        let output = service.infer(&image).unwrap();
        assert_eq!(output.shape().dims(), &[1, 8, 6]);
    }
}
