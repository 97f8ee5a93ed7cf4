use std::sync::mpsc::Sender;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::data::batcher::partition;
use crate::data::dataset::Dataset;
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;
use crate::metrics::{accuracy, mean_cross_entropy, GroundTruth};
use crate::model::Model;
use crate::train::epoch_stats::EpochStats;
use crate::train::report::{PersistenceFailure, TrainingReport};
use crate::train::state::TrainingState;
use crate::train::train_config::TrainConfig;

/// Drives a model through epochs until a terminal `RunState`.
///
/// Each epoch trains on every minibatch of the training set, evaluates on
/// the test set, then applies (in order) the checkpoint, target, decay,
/// stagnation and budget policies held by `TrainingState`.
pub struct TrainingController<M: Model, S: CheckpointStore> {
    model: M,
    store: S,
    config: TrainConfig,
    state: TrainingState,
    progress_tx: Option<Sender<EpochStats>>,
}

impl<M: Model, S: CheckpointStore> TrainingController<M, S> {
    pub fn new(mut model: M, store: S, config: TrainConfig) -> Result<Self> {
        config.validate()?;
        model.set_learning_rate(config.learning_rate);
        Ok(TrainingController {
            state: TrainingState::new(config.learning_rate),
            model,
            store,
            config,
            progress_tx: None,
        })
    }

    /// Sends one `EpochStats` per completed epoch to `tx`.
    pub fn with_progress(mut self, tx: Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (M, S) {
        (self.model, self.store)
    }

    /// Runs epochs until the run converges, stagnates or exhausts its budget.
    ///
    /// # Errors
    /// - `ShapeMismatch` if either dataset disagrees with the model.
    /// - `TrainingDiverged` if an update fails; the last stored checkpoint
    ///   stays valid.
    ///
    /// Checkpoint write failures do not stop the run; they are logged and
    /// listed in the report.
    pub fn run(&mut self, train: &Dataset, test: &Dataset) -> Result<TrainingReport> {
        self.check_dataset("training set", train)?;
        self.check_dataset("test set", test)?;
        if test.is_empty() {
            warn!("Test set is empty; every epoch scores 0.0 accuracy");
        }

        info!(
            train = train.len(),
            test = test.len(),
            batch_size = self.config.batch_size,
            learning_rate = self.state.learning_rate,
            max_epochs = self.config.max_epochs,
            target = self.config.target_accuracy,
            "Training started"
        );

        let mut history = Vec::new();
        let mut failures = Vec::new();
        let mut checkpoints_written = 0;
        let mut best_epoch = None;

        loop {
            let epoch = self.state.current_epoch;
            let started = Instant::now();
            let learning_rate = self.state.learning_rate;

            let train_loss = self.run_epoch(train).map_err(|e| match e {
                Error::ShapeMismatch { .. } => e,
                other => {
                    error!(epoch, error = %other, "Update failed; stopping run");
                    Error::TrainingDiverged { epoch, reason: other.to_string() }
                }
            })?;
            let (test_accuracy, test_loss) = self.evaluate(test)?;

            let decision = self.state.observe(test_accuracy, &self.config);

            let mut checkpoint_written = false;
            if decision.checkpoint {
                best_epoch = Some(epoch);
                match self.write_checkpoint(epoch, test_accuracy) {
                    Ok(()) => {
                        checkpoints_written += 1;
                        checkpoint_written = true;
                    }
                    Err(e) => {
                        warn!(epoch, error = %e, "Checkpoint write failed; continuing");
                        failures.push(PersistenceFailure { epoch, reason: e.to_string() });
                    }
                }
            }

            if let Some(rate) = decision.decayed_to {
                self.model.set_learning_rate(rate);
                info!(epoch, from = learning_rate, to = rate, "Learning rate decayed");
            }

            let stats = EpochStats {
                epoch,
                max_epochs: self.config.max_epochs,
                train_loss,
                test_loss,
                test_accuracy,
                best_accuracy: self.state.best_accuracy,
                learning_rate,
                checkpoint_written,
                lr_decayed_to: decision.decayed_to,
                state: decision.next,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            info!(
                epoch,
                train_loss,
                test_loss,
                test_accuracy,
                best = self.state.best_accuracy,
                elapsed_ms = stats.elapsed_ms,
                "Epoch complete"
            );

            if let Some(tx) = &self.progress_tx {
                // A dropped receiver only stops the reporting, never the run.
                if tx.send(stats.clone()).is_err() {
                    debug!("Progress receiver dropped");
                    self.progress_tx = None;
                }
            }
            history.push(stats);

            if decision.next.is_terminal() {
                let report = TrainingReport {
                    state: decision.next,
                    epochs_run: epoch + 1,
                    best_accuracy: self.state.best_accuracy,
                    best_epoch,
                    final_learning_rate: self.state.learning_rate,
                    checkpoints_written,
                    persistence_failures: failures,
                    history,
                };
                info!(
                    state = ?report.state,
                    epochs = report.epochs_run,
                    best_accuracy = report.best_accuracy,
                    best_epoch = ?report.best_epoch,
                    "Training finished"
                );
                return Ok(report);
            }
        }
    }

    fn check_dataset(&self, context: &'static str, dataset: &Dataset) -> Result<()> {
        let expected = self.model.input_shape();
        if dataset.shape() != expected {
            return Err(Error::shape(context, expected, dataset.shape()));
        }
        if dataset.num_classes() != self.model.num_classes() {
            return Err(Error::shape(context, self.model.num_classes(), dataset.num_classes()));
        }
        Ok(())
    }

    /// One pass of minibatch updates; returns the example-weighted mean loss.
    fn run_epoch(&mut self, train: &Dataset) -> Result<f64> {
        let mut total_loss = 0.0;
        let mut seen = 0;
        for batch in partition(train, self.config.batch_size)? {
            let loss = self.model.backward_and_update(&batch)?;
            total_loss += loss * batch.len() as f64;
            seen += batch.len();
        }
        Ok(if seen == 0 { 0.0 } else { total_loss / seen as f64 })
    }

    /// Test accuracy and mean cross-entropy, evaluated batch by batch.
    fn evaluate(&mut self, test: &Dataset) -> Result<(f64, f64)> {
        let mut rows = Vec::with_capacity(test.len());
        for batch in partition(test, self.config.batch_size)? {
            let probs = self.model.forward(&batch.images)?;
            rows.extend(probs.data);
        }
        let predictions = if rows.is_empty() {
            Matrix::zeros(0, self.model.num_classes())
        } else {
            Matrix::from_data(rows)
        };
        let truth = GroundTruth::Labels(test.labels());
        Ok((accuracy(&predictions, truth)?, mean_cross_entropy(&predictions, truth)?))
    }

    fn write_checkpoint(&mut self, epoch: usize, accuracy: f64) -> Result<()> {
        let parameters = self.model.export_parameters()?;
        self.store.save(&Checkpoint { parameters, epoch, accuracy })
    }
}
