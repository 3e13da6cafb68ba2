use detector::backend::mock::{MockBackend, MockFaults, graph_definition};
use detector::{InferenceError, LoadedModel, ModelSpec, load_graph};
use std::fs;
use tempfile::tempdir;

fn yolov5_graph() -> String {
    graph_definition(("x", &[1, 640, 640, 3]), ("Identity", &[1, 25200, 85]))
}

/// Loading a well-formed model binds exactly one session and resolves both
/// endpoints.
#[test]
fn test_load_model_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("yolov5n.graph");
    fs::write(&path, yolov5_graph()).unwrap();

    let backend = MockBackend::new();
    let model = LoadedModel::load(&backend, &path, &ModelSpec::yolov5().unwrap()).unwrap();

    assert_eq!(model.input().name(), "x");
    assert_eq!(model.output().name(), "Identity");
    assert_eq!(model.output().index(), 0);
    assert_eq!(model.shapes().output_size(), 25200 * 85);
    assert_eq!(backend.ledger().sessions_created(), 1);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does_not_exist.onnx");

    let backend = MockBackend::new();
    match LoadedModel::load(&backend, &path, &ModelSpec::yolov5().unwrap()) {
        Err(InferenceError::Io { path: reported, .. }) => assert_eq!(reported, path),
        Err(other) => panic!("Expected Io error, got {other:?}"),
        Ok(_) => panic!("Expected Io error, model loaded"),
    }
    assert_eq!(backend.ledger().sessions_created(), 0);
}

/// A zero-byte model never reaches graph import or session creation.
#[test]
fn test_zero_byte_model_is_empty_file_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.onnx");
    fs::write(&path, b"").unwrap();

    let backend = MockBackend::new();
    let result = LoadedModel::load(&backend, &path, &ModelSpec::yolov5().unwrap());

    assert!(
        matches!(result, Err(InferenceError::EmptyFile { .. })),
        "Zero-byte model should be rejected as empty"
    );
    assert_eq!(backend.ledger().sessions_created(), 0);
}

#[test]
fn test_corrupt_model_is_graph_import_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.onnx");
    fs::write(&path, [0x08, 0x07, 0xff, 0x00, 0x13]).unwrap();

    let backend = MockBackend::new();
    assert!(matches!(
        load_graph(&backend, &path),
        Err(InferenceError::GraphImport(_))
    ));
    assert!(matches!(
        LoadedModel::load(&backend, &path, &ModelSpec::yolov5().unwrap()),
        Err(InferenceError::GraphImport(_))
    ));
    assert_eq!(backend.ledger().sessions_created(), 0);
}

/// A model exported with a different output name fails to load, and no
/// session ever exists to run against it.
#[test]
fn test_missing_output_node_is_reported_by_name() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("renamed.graph");
    fs::write(
        &path,
        graph_definition(("x", &[1, 640, 640, 3]), ("output0", &[1, 25200, 85])),
    )
    .unwrap();

    let backend = MockBackend::new();
    match LoadedModel::load(&backend, &path, &ModelSpec::yolov5().unwrap()) {
        Err(InferenceError::NodeNotFound { name, .. }) => assert_eq!(name, "Identity"),
        Err(other) => panic!("Expected NodeNotFound, got {other:?}"),
        Ok(_) => panic!("Expected NodeNotFound, model loaded"),
    }

    let ledger = backend.ledger();
    assert_eq!(ledger.sessions_created(), 0);
    assert_eq!(ledger.runs(), 0);
    assert_eq!(ledger.allocated(), 0);
}

#[test]
fn test_session_failure_is_session_create_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("yolov5n.graph");
    fs::write(&path, yolov5_graph()).unwrap();

    let backend = MockBackend::with_faults(MockFaults {
        fail_session: true,
        ..MockFaults::default()
    });

    assert!(matches!(
        LoadedModel::load(&backend, &path, &ModelSpec::yolov5().unwrap()),
        Err(InferenceError::SessionCreate(_))
    ));
}
