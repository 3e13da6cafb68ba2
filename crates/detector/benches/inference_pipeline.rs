use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use detector::backend::mock::{MockBackend, graph_definition};
use detector::marshal::{make_f32_tensor, read_f32};
use detector::{
    GraphDef, InferenceService, LoadedModel, ModelSpec, TensorShape, graph::import_graph,
};
use image::{Rgb, RgbImage};

fn yolov5_service() -> InferenceService<MockBackend> {
    let backend = MockBackend::new();
    let text = graph_definition(("x", &[1, 640, 640, 3]), ("Identity", &[1, 25200, 85]));
    let definition = GraphDef::from_bytes(text.into_bytes(), "bench.graph").unwrap();
    let graph = import_graph(&backend, definition).unwrap();
    let model = LoadedModel::from_graph(&backend, graph, &ModelSpec::yolov5().unwrap()).unwrap();
    InferenceService::new(backend, model)
}

/// Gradient image so the resizer has real work to do
fn create_test_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

fn benchmark_inference_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference_cycle");
    group.sample_size(20);

    let mut service = yolov5_service();
    let resolutions = [(640, 640), (1280, 720), (1920, 1080)];

    for (width, height) in resolutions.iter() {
        let image = create_test_image(*width, *height);

        group.bench_with_input(
            BenchmarkId::new("mock_backend", format!("{}x{}", width, height)),
            &image,
            |b, image| {
                b.iter(|| service.infer(black_box(image)).unwrap());
            },
        );
    }

    group.finish();
}

fn benchmark_marshalling(c: &mut Criterion) {
    let mut group = c.benchmark_group("marshalling");

    let backend = MockBackend::new();
    let input_shape = TensorShape::new(vec![1, 640, 640, 3]).unwrap();
    let input = vec![127.0f32; input_shape.element_count()];

    group.bench_function("make_input_tensor", |b| {
        b.iter(|| make_f32_tensor(&backend, black_box(&input_shape), black_box(&input), "input").unwrap());
    });

    let output_shape = TensorShape::new(vec![1, 25200, 85]).unwrap();
    let output = make_f32_tensor(
        &backend,
        &output_shape,
        &vec![0.25f32; output_shape.element_count()],
        "output",
    )
    .unwrap();

    group.bench_function("read_output_tensor", |b| {
        b.iter(|| read_f32(black_box(output.native()), output_shape.element_count()).unwrap());
    });

    group.finish();
}

criterion_group!(benches, benchmark_inference_cycle, benchmark_marshalling);
criterion_main!(benches);
