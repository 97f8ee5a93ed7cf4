use serde::{Serialize, Deserialize};

use crate::train::train_config::TrainConfig;

/// Lifecycle of a training run. Everything except `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    /// Test accuracy reached the target.
    ConvergedTarget,
    /// No improvement for `stagnation_limit` epochs.
    ConvergedStagnant,
    /// `max_epochs` reached.
    Exhausted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        self != RunState::Running
    }
}

/// What the controller must do after an epoch's evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochDecision {
    pub epoch: usize,
    /// Persist the current parameters as the new best checkpoint.
    pub checkpoint: bool,
    /// Accuracy strictly exceeded the previous best.
    pub improved: bool,
    /// New learning rate to hand to the optimizer.
    pub decayed_to: Option<f64>,
    pub next: RunState,
}

/// Mutable bookkeeping for one run, owned by its controller.
///
/// Two clocks drive the policies: `last_improvement_epoch` (stagnation) only
/// moves on a strict improvement, while the plateau clock also restarts at
/// `last_decay_epoch` so each decay gets a fresh patience window.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    pub current_epoch: usize,
    pub best_accuracy: f64,
    pub last_improvement_epoch: usize,
    pub last_decay_epoch: Option<usize>,
    pub learning_rate: f64,
}

impl TrainingState {
    pub fn new(learning_rate: f64) -> TrainingState {
        TrainingState {
            current_epoch: 0,
            best_accuracy: 0.0,
            last_improvement_epoch: 0,
            last_decay_epoch: None,
            learning_rate,
        }
    }

    fn plateau_anchor(&self) -> usize {
        self.last_decay_epoch.map_or(self.last_improvement_epoch, |d| d.max(self.last_improvement_epoch))
    }

    /// Applies the checkpoint, decay and stopping policies to the test
    /// accuracy of `current_epoch`, then advances the epoch if still running.
    pub fn observe(&mut self, accuracy: f64, config: &TrainConfig) -> EpochDecision {
        let epoch = self.current_epoch;
        let mut decision = EpochDecision {
            epoch,
            checkpoint: false,
            improved: false,
            decayed_to: None,
            next: RunState::Running,
        };

        // Ties refresh the checkpoint so it always holds the latest epoch
        // at the best accuracy.
        if accuracy >= self.best_accuracy {
            decision.checkpoint = true;
            decision.improved = accuracy > self.best_accuracy;
            self.best_accuracy = accuracy;
            if decision.improved {
                self.last_improvement_epoch = epoch;
            }
        }

        if accuracy >= config.target_accuracy {
            decision.next = RunState::ConvergedTarget;
            return decision;
        }

        if epoch - self.plateau_anchor() >= config.plateau_patience
            && self.learning_rate > config.lr_floor
        {
            self.learning_rate /= config.lr_decay_factor;
            self.last_decay_epoch = Some(epoch);
            decision.decayed_to = Some(self.learning_rate);
        }

        if epoch - self.last_improvement_epoch >= config.stagnation_limit {
            decision.next = RunState::ConvergedStagnant;
        } else if epoch >= config.max_epochs {
            decision.next = RunState::Exhausted;
        } else {
            self.current_epoch += 1;
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrainConfig {
        TrainConfig {
            target_accuracy: 0.99,
            plateau_patience: 5,
            stagnation_limit: 10,
            lr_decay_factor: 10.0,
            lr_floor: 1e-6,
            max_epochs: 100,
            ..TrainConfig::default()
        }
    }

    fn replay(accuracies: &[f64], config: &TrainConfig) -> (TrainingState, Vec<EpochDecision>) {
        let mut state = TrainingState::new(0.01);
        let mut decisions = Vec::new();
        for &acc in accuracies {
            let d = state.observe(acc, config);
            decisions.push(d);
            if d.next.is_terminal() {
                break;
            }
        }
        (state, decisions)
    }

    #[test]
    fn ties_and_improvements_checkpoint_dips_do_not() {
        let (_, decisions) = replay(&[0.5, 0.5, 0.4, 0.6, 0.6], &config());
        let written: Vec<usize> = decisions.iter().filter(|d| d.checkpoint).map(|d| d.epoch).collect();
        assert_eq!(written, vec![0, 1, 3, 4]);
        assert!(decisions.iter().all(|d| d.next == RunState::Running));
    }

    #[test]
    fn flat_accuracy_decays_once_then_waits_a_full_window() {
        let (state, decisions) = replay(&[0.5; 7], &config());
        let decays: Vec<usize> = decisions.iter().filter(|d| d.decayed_to.is_some()).map(|d| d.epoch).collect();
        assert_eq!(decays, vec![5]);
        assert!((state.learning_rate - 0.001).abs() < 1e-15);
        assert_eq!(state.last_decay_epoch, Some(5));
        assert_eq!(state.last_improvement_epoch, 0);
    }

    #[test]
    fn target_accuracy_stops_the_same_epoch() {
        let (state, decisions) = replay(&[0.3, 0.7, 0.995, 0.2], &config());
        assert_eq!(decisions.len(), 3);
        let last = decisions.last().unwrap();
        assert_eq!(last.next, RunState::ConvergedTarget);
        assert!(last.checkpoint);
        assert_eq!(state.current_epoch, 2);
    }

    #[test]
    fn stagnation_stops_at_limit_despite_decays() {
        let (state, decisions) = replay(&[0.4; 30], &config());
        let last = decisions.last().unwrap();
        assert_eq!(last.epoch, 10);
        assert_eq!(last.next, RunState::ConvergedStagnant);
        let decays = decisions.iter().filter(|d| d.decayed_to.is_some()).count();
        assert_eq!(decays, 2);
        assert_eq!(state.current_epoch, 10);
    }

    #[test]
    fn improvement_restarts_both_clocks() {
        let mut acc = vec![0.5; 5];
        acc.push(0.6); // epoch 5 improves before the patience window closes
        acc.extend([0.6; 4]);
        let (state, decisions) = replay(&acc, &config());
        assert!(decisions.iter().all(|d| d.decayed_to.is_none()));
        assert_eq!(state.last_improvement_epoch, 5);
    }

    #[test]
    fn decay_stops_at_the_floor() {
        let config = TrainConfig { plateau_patience: 1, stagnation_limit: 50, lr_floor: 5e-4, ..config() };
        let (state, decisions) = replay(&[0.1; 20], &config);
        let decays = decisions.iter().filter(|d| d.decayed_to.is_some()).count();
        // 1e-2 -> 1e-3 -> 1e-4, then the rate is no longer above the floor.
        assert_eq!(decays, 2);
        assert!((state.learning_rate - 1e-4).abs() < 1e-15);
    }

    #[test]
    fn budget_exhausts_at_max_epochs() {
        let config = TrainConfig { max_epochs: 3, ..config() };
        let (_, decisions) = replay(&[0.1, 0.2, 0.3, 0.4, 0.5], &config);
        assert_eq!(decisions.len(), 4);
        assert_eq!(decisions.last().unwrap().next, RunState::Exhausted);
    }
}
