//! End to end: train a small network into a checkpoint file, then serve it
//! from a fresh model the way the `serve` binary does.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use rand::{rngs::StdRng, SeedableRng};
use tempfile::TempDir;

use ferrite_digits::math::argmax;
use ferrite_digits::{
    CheckpointStore, ConvNet, ConvNetSpec, Dataset, Error, FileCheckpointStore, GatewayResponse, Image,
    ImageShape, InferenceGateway, Model, RunState, TrainConfig, TrainingController,
};

const SHAPE: ImageShape = ImageShape { height: 4, width: 4, channels: 1 };

fn spec() -> ConvNetSpec {
    ConvNetSpec { input: SHAPE, filters: 2, kernel: 3, hidden: 8, num_classes: 2 }
}

/// Class 0 lights the left half, class 1 the right half, over a dim background.
fn halves(n: usize, offset: usize) -> Dataset {
    let mut images = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n {
        let class = i % 2;
        let noise = 0.02 * ((i + offset) % 5) as f64;
        let img = (0..16)
            .map(|p| if (p % 4) / 2 == class { 0.9 + noise } else { noise })
            .collect();
        images.push(img);
        labels.push(class);
    }
    Dataset::new(SHAPE, 2, images, labels).unwrap()
}

fn config(dir: &TempDir) -> TrainConfig {
    TrainConfig {
        batch_size: 4,
        learning_rate: 0.1,
        target_accuracy: 0.95,
        plateau_patience: 5,
        stagnation_limit: 15,
        max_epochs: 60,
        seed: 7,
        checkpoint_path: dir.path().join("run/best.ckpt"),
        model: spec(),
        ..TrainConfig::default()
    }
}

fn fresh_model() -> ConvNet {
    ConvNet::new(spec(), 0.1, &mut StdRng::seed_from_u64(999))
}

#[test]
fn trained_checkpoint_is_served_with_identical_accuracy() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let train = halves(40, 0).shuffled(config.seed);
    let test = halves(10, 3);

    let model = ConvNet::new(spec(), config.learning_rate, &mut StdRng::seed_from_u64(config.seed));
    let store = FileCheckpointStore::new(&config.checkpoint_path);
    let mut controller = TrainingController::new(model, store, config).unwrap();
    let report = controller.run(&train, &test).unwrap();

    assert!(report.state.is_terminal());
    assert_eq!(report.history.len(), report.epochs_run);
    assert!(report.persistence_failures.is_empty());
    assert!(report.best_accuracy >= 0.8, "best accuracy {}", report.best_accuracy);

    // Served from a separate store handle, as a second process would.
    let reader = FileCheckpointStore::new(dir.path().join("run/best.ckpt"));
    let stored = reader.load().unwrap();
    assert_eq!(Some(stored.epoch), report.best_epoch);
    assert_eq!(stored.accuracy, report.best_accuracy);

    let mut gateway = InferenceGateway::open(&reader, fresh_model()).unwrap();
    let correct = (0..test.len())
        .filter(|&i| {
            let image = Image::new(SHAPE, test.image(i).to_vec()).unwrap();
            argmax(&gateway.predict(&image).unwrap()) == test.label(i)
        })
        .count();
    assert_eq!(correct as f64 / test.len() as f64, stored.accuracy);
}

#[test]
fn run_that_reaches_target_stops_there() {
    // Same data, seeds and schedule as the run above, which reaches 0.8.
    let dir = TempDir::new().unwrap();
    let config = TrainConfig { target_accuracy: 0.8, ..config(&dir) };
    let train = halves(40, 0).shuffled(config.seed);
    let test = halves(10, 3);

    let model = ConvNet::new(spec(), config.learning_rate, &mut StdRng::seed_from_u64(config.seed));
    let mut controller =
        TrainingController::new(model, FileCheckpointStore::new(&config.checkpoint_path), config).unwrap();
    let report = controller.run(&train, &test).unwrap();

    assert_eq!(report.state, RunState::ConvergedTarget);
    let (last, earlier) = report.history.split_last().unwrap();
    assert!(last.test_accuracy >= 0.8, "final accuracy {}", last.test_accuracy);
    assert!(earlier.iter().all(|s| s.test_accuracy < 0.8));
    assert_eq!(report.best_epoch, Some(last.epoch));
    assert_eq!(controller.store().load().unwrap().epoch, last.epoch);
}

#[test]
fn gateway_answers_file_requests_from_the_checkpoint() {
    let dir = TempDir::new().unwrap();
    let mut store = FileCheckpointStore::new(dir.path().join("best.ckpt"));
    let trained = fresh_model();
    store
        .save(&ferrite_digits::Checkpoint {
            parameters: trained.export_parameters().unwrap(),
            epoch: 3,
            accuracy: 0.75,
        })
        .unwrap();

    let png = dir.path().join("seven.png");
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(GrayImage::from_pixel(12, 12, Luma([180])))
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    std::fs::write(&png, bytes.into_inner()).unwrap();

    let mut gateway = InferenceGateway::open(&store, fresh_model()).unwrap();
    assert_eq!(gateway.checkpoint().epoch, 3);

    match gateway.handle_request(png.to_str().unwrap()) {
        GatewayResponse::Prediction { chart } => {
            assert_eq!(chart.categories, vec![0, 1]);
            assert!((chart.values.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
        other => panic!("expected prediction, got {other:?}"),
    }
    assert!(matches!(gateway.handle_request(""), GatewayResponse::Placeholder { .. }));
}

#[test]
fn gateway_refuses_empty_store_and_foreign_architecture() {
    let dir = TempDir::new().unwrap();
    let mut store = FileCheckpointStore::new(dir.path().join("best.ckpt"));
    assert!(matches!(
        InferenceGateway::open(&store, fresh_model()),
        Err(Error::NoCheckpointAvailable { .. })
    ));

    let wider = ConvNetSpec { hidden: 16, ..spec() };
    let other = ConvNet::new(wider, 0.1, &mut StdRng::seed_from_u64(0));
    store
        .save(&ferrite_digits::Checkpoint { parameters: other.export_parameters().unwrap(), epoch: 0, accuracy: 0.5 })
        .unwrap();
    assert!(matches!(
        InferenceGateway::open(&store, fresh_model()),
        Err(Error::ShapeMismatch { .. })
    ));
}
