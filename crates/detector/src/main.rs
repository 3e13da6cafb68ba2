use anyhow::Context;
use common::TelemetryGuard;
use detector::{
    InferenceConfig, InferenceService, LoadedModel, backend::ort::OrtBackend,
    logging::setup_logging,
};
use std::io::{self, BufWriter, Write};

#[cfg(not(feature = "ort-backend"))]
compile_error!("The detector binary needs the 'ort-backend' feature");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = InferenceConfig::from_env();

    // The guard installs its own subscriber
    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init("detector", endpoint, config.environment)?),
        None => {
            setup_logging(&config);
            None
        }
    };

    tracing::info!(config = ?config, "Loaded configuration");

    let spec = config.model_spec()?;
    let backend = OrtBackend::new(config.ort_options());

    tracing::info!(path = %config.model_path, "Loading inference model");
    let model = LoadedModel::load(&backend, &config.model_path, &spec)?;
    tracing::info!("Model loaded successfully");

    let image = image::open(&config.image_path)
        .with_context(|| format!("failed to decode image {}", config.image_path))?
        .to_rgb8();
    tracing::info!(
        path = %config.image_path,
        width = image.width(),
        height = image.height(),
        "Image decoded"
    );

    let mut service = InferenceService::new(backend, model);
    let detections = service.infer(&image)?;

    let mut out = BufWriter::new(io::stdout().lock());
    writeln!(out, "shape: {}", detections.shape())?;
    for (index, candidate) in detections.candidates().enumerate() {
        let shown = &candidate.raw()[..config.print_values.min(candidate.raw().len())];
        let row = shown
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{index}: {row}")?;
    }
    out.flush()?;

    tracing::info!(
        candidates = detections.num_candidates(),
        values = detections.len(),
        "Inference finished"
    );
    Ok(())
}
