use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointInfo, CheckpointStore};
use crate::data::dataset::{Image, ImageShape};
use crate::error::{Error, Result};
use crate::inference::preprocess::decode_image;
use crate::math::matrix::Matrix;
use crate::model::Model;

/// File extensions accepted for local image paths (case-insensitive).
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Class probabilities shaped for a bar chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub categories: Vec<usize>,
    pub values: Vec<f64>,
}

impl BarChart {
    fn from_probabilities(values: Vec<f64>) -> BarChart {
        BarChart { categories: (0..values.len()).collect(), values }
    }
}

/// Result of one inference request. Serialized with a `status` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GatewayResponse {
    /// No input was supplied; the chart is all zeros and the model was not run.
    Placeholder { chart: BarChart },
    Prediction { chart: BarChart },
    InvalidInput { message: String },
}

/// Serves one loaded checkpoint to single-image requests.
pub struct InferenceGateway<M: Model> {
    model: M,
    checkpoint: CheckpointInfo,
}

impl<M: Model> InferenceGateway<M> {
    /// Loads the latest checkpoint from `store` into `model`.
    ///
    /// Fails with `NoCheckpointAvailable` if nothing was ever saved, and with
    /// `ShapeMismatch` if the checkpoint was trained for another architecture.
    pub fn open<S: CheckpointStore>(store: &S, mut model: M) -> Result<Self> {
        let checkpoint = store.load()?;
        model.import_parameters(&checkpoint.parameters)?;
        info!(
            epoch = checkpoint.epoch,
            accuracy = checkpoint.accuracy,
            "Checkpoint loaded for inference"
        );
        Ok(InferenceGateway { model, checkpoint: checkpoint.info() })
    }

    /// Epoch and accuracy of the checkpoint being served.
    pub fn checkpoint(&self) -> CheckpointInfo {
        self.checkpoint
    }

    /// One forward pass over `image`.
    pub fn predict(&mut self, image: &Image) -> Result<Vec<f64>> {
        let expected = self.model.input_shape();
        if image.shape != expected || image.pixels.len() != expected.len() {
            return Err(Error::shape("inference image", expected, image.shape));
        }
        let probs = self.model.forward(&Matrix::row_vector(image.pixels.clone()))?;
        Ok(probs.row(0).to_vec())
    }

    /// Answers a request naming a local path or an `http(s)` URL.
    ///
    /// Never fails: problems with the input come back as `InvalidInput`.
    pub fn handle_request(&mut self, input: &str) -> GatewayResponse {
        let input = input.trim();
        if input.is_empty() {
            return placeholder(self.model.num_classes());
        }
        let result = load_input(input, self.model.input_shape()).and_then(|image| self.predict(&image));
        respond(input, result)
    }
}

/// A gateway shared between request threads.
///
/// Only the forward pass runs under the lock. Fetching, reading and decoding
/// happen outside it, so a slow remote image never blocks other requests.
pub struct SharedGateway<M: Model> {
    gateway: Mutex<InferenceGateway<M>>,
    shape: ImageShape,
    num_classes: usize,
    checkpoint: CheckpointInfo,
}

impl<M: Model> SharedGateway<M> {
    pub fn new(gateway: InferenceGateway<M>) -> Self {
        SharedGateway {
            shape: gateway.model.input_shape(),
            num_classes: gateway.model.num_classes(),
            checkpoint: gateway.checkpoint,
            gateway: Mutex::new(gateway),
        }
    }

    pub fn checkpoint(&self) -> CheckpointInfo {
        self.checkpoint
    }

    /// Same contract as `InferenceGateway::handle_request`.
    pub fn handle_request(&self, input: &str) -> GatewayResponse {
        let input = input.trim();
        if input.is_empty() {
            return placeholder(self.num_classes);
        }
        let result = load_input(input, self.shape).and_then(|image| self.lock().predict(&image));
        respond(input, result)
    }

    fn lock(&self) -> MutexGuard<'_, InferenceGateway<M>> {
        // A panic in another request leaves the parameters intact.
        self.gateway.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn placeholder(num_classes: usize) -> GatewayResponse {
    GatewayResponse::Placeholder { chart: BarChart::from_probabilities(vec![0.0; num_classes]) }
}

fn respond(input: &str, result: Result<Vec<f64>>) -> GatewayResponse {
    match result {
        Ok(values) => {
            debug!(input, class = crate::math::matrix::argmax(&values), "Prediction served");
            GatewayResponse::Prediction { chart: BarChart::from_probabilities(values) }
        }
        Err(e) => {
            warn!(input, error = %e, "Rejected inference request");
            GatewayResponse::InvalidInput { message: e.to_string() }
        }
    }
}

/// Reads a local path or fetches an `http(s)` URL and decodes it to `shape`.
/// Does not touch the model.
pub fn load_input(input: &str, shape: ImageShape) -> Result<Image> {
    let bytes = if input.starts_with("http://") || input.starts_with("https://") {
        fetch_remote(input)?
    } else {
        read_local(Path::new(input))?
    };
    decode_image(&bytes, shape)
}

fn fetch_remote(input: &str) -> Result<Vec<u8>> {
    let url = Url::parse(input).map_err(|e| Error::InvalidInput(format!("malformed URL {input:?}: {e}")))?;
    let fetch_err = |e: reqwest::Error| Error::InvalidInput(format!("cannot fetch {url}: {e}"));

    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(fetch_err)?;
    let response = client.get(url.clone()).send().and_then(|r| r.error_for_status()).map_err(fetch_err)?;
    let bytes = response.bytes().map_err(fetch_err)?;
    Ok(bytes.to_vec())
}

fn read_local(path: &Path) -> Result<Vec<u8>> {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(Error::InvalidInput(format!(
            "unsupported file type {:?}; expected one of {}",
            path.display().to_string(),
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::InvalidInput(format!("no such file: {}", path.display())),
        _ => Error::InvalidInput(format!("cannot read {}: {e}", path.display())),
    })
}
