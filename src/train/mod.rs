/*!
Training with early stopping and best-model retention
*/
use crate::context::ExecutionContext;
use crate::data::window::WindowSet;
use crate::lstm::{Mode, RegressorDesc, SequenceRegressor};
use crate::{Error, GpuFloat, Result};
use num::NumCast;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use tch::nn::{self, OptimizerConfig, VarStore};
use tch::{Device, Reduction, Tensor};
use tracing::{debug, info, warn};

pub mod early_stop;
pub mod snapshot;

pub use early_stop::{EarlyStopping, Verdict};
pub use snapshot::ParameterSnapshot;

/// Optimizer and loop settings for a [`Trainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Windows per mini-batch
    pub batch_size: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Adam weight decay (L2 regularization)
    pub weight_decay: f64,
    /// Clamp every gradient to `[-grad_clip, grad_clip]` before stepping, if set
    pub grad_clip: Option<f64>,
    /// Shuffle the training batches every epoch. Off by default, to keep temporal order
    pub shuffle: bool,
    /// Seed for the training shuffle
    pub seed: u64,
    /// Upper bound on the number of epochs
    pub max_epochs: usize,
    /// Consecutive non-improving epochs tolerated before stopping
    pub patience: usize,
}

impl Default for TrainConfig {
    fn default() -> TrainConfig {
        TrainConfig {
            batch_size: 64,
            learning_rate: 1e-3,
            weight_decay: 1e-3,
            grad_clip: None,
            shuffle: false,
            seed: 0,
            max_epochs: 150,
            patience: 15,
        }
    }
}

impl TrainConfig {
    /// Check that this configuration can be trained with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be at least one".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "learning rate {} must be positive",
                self.learning_rate
            )));
        }
        if !(self.weight_decay >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "weight decay {} must be non-negative",
                self.weight_decay
            )));
        }
        if let Some(clip) = self.grad_clip {
            if !(clip > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "gradient clip {} must be positive",
                    clip
                )));
            }
        }
        Ok(())
    }
}

/// Costs for one completed epoch
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct EpochRecord {
    /// Zero based epoch index
    pub epoch: usize,
    /// Mean training loss over the epoch's batches
    pub train_cost: f64,
    /// Mean validation loss after the epoch
    pub valid_cost: f64,
    /// Best validation loss seen so far, including this epoch
    pub best_cost: f64,
    /// Consecutive non-improving epochs, including this one
    pub stall_count: usize,
    /// Whether this epoch improved, stalled, or stopped training
    #[serde(skip)]
    pub verdict: Verdict,
}

/// The outcome of [`Trainer::fit`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FitReport {
    /// Mean training cost of every recorded epoch
    pub train_costs: Vec<f64>,
    /// Validation cost of every recorded epoch
    pub valid_costs: Vec<f64>,
    /// The best validation cost after every recorded epoch; non-increasing
    pub best_costs: Vec<f64>,
    /// The epoch whose parameters were restored
    pub best_epoch: Option<usize>,
    /// The validation cost of the restored parameters
    pub best_cost: Option<f64>,
    /// The epoch at which patience ran out, if it did. Its costs are not recorded above
    pub stopped_at: Option<usize>,
}

/// Owns a regressor, its parameters and its optimizer, and trains it on windowed data
pub struct Trainer<M> {
    ctx: ExecutionContext,
    vs: VarStore,
    model: M,
    opt: nn::Optimizer,
    config: TrainConfig,
    rng: StdRng,
    snapshot: Option<ParameterSnapshot>,
}

impl<M: SequenceRegressor> Trainer<M> {
    /// Build a model from its descriptor, with fresh parameters and an Adam optimizer
    pub fn new<D>(ctx: ExecutionContext, desc: &D, config: TrainConfig) -> Result<Trainer<M>>
    where
        D: RegressorDesc<Model = M>,
    {
        config.validate()?;
        let vs = VarStore::new(ctx.device());
        let model = desc.build(&vs.root());
        let opt = nn::Adam {
            wd: config.weight_decay,
            ..Default::default()
        }
        .build(&vs, config.learning_rate)?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Trainer {
            ctx,
            vs,
            model,
            opt,
            config,
            rng,
            snapshot: None,
        })
    }
    /// The model being trained
    pub fn model(&self) -> &M {
        &self.model
    }
    /// The model's parameters
    pub fn var_store(&self) -> &VarStore {
        &self.vs
    }
    /// The training configuration
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }
    /// The best snapshot taken by the last call to [`Trainer::fit`], if any
    pub fn snapshot(&self) -> Option<&ParameterSnapshot> {
        self.snapshot.as_ref()
    }
    /// Copy the current parameters
    pub fn save_snapshot(&self, version: usize) -> ParameterSnapshot {
        ParameterSnapshot::save(&self.vs, version)
    }
    /// Overwrite the current parameters with a snapshot
    pub fn restore_snapshot(&self, snapshot: &ParameterSnapshot) -> Result<()> {
        snapshot.restore(&self.vs)
    }

    fn batch<F: Copy + NumCast>(&self, set: &WindowSet<F>, indices: &[usize]) -> (Tensor, Tensor) {
        let (input, output) = set.stage(indices);
        let batch = indices.len() as i64;
        let xs = self
            .ctx
            .tensor(&input, &[batch, set.lookback as i64, set.width as i64]);
        let ys = self.ctx.tensor(&output, &[batch]);
        (xs, ys)
    }

    fn check_nonempty<F: Copy>(&self, set: &WindowSet<F>) -> Result<()> {
        if set.is_empty() {
            return Err(Error::InsufficientData {
                rows: set.rows.len(),
                lookback: set.lookback,
            });
        }
        Ok(())
    }

    /// Run one pass over the training windows, stepping the optimizer after every batch.
    ///
    /// Returns the mean batch loss. Fails without stepping if a batch loss is not finite.
    pub fn train_epoch<F>(&mut self, epoch: usize, train: &WindowSet<F>) -> Result<f64>
    where
        F: Copy + NumCast,
    {
        self.check_nonempty(train)?;
        let mut order: Vec<usize> = (0..train.len()).collect();
        if self.config.shuffle {
            order.shuffle(&mut self.rng);
        }
        let mut sum_loss = 0.0;
        let mut batches = 0;
        for (batch, indices) in order.chunks(self.config.batch_size).enumerate() {
            let (xs, ys) = self.batch(train, indices);
            let loss = self
                .model
                .forward(&xs, Mode::Train)
                .mse_loss(&ys, Reduction::Mean);
            let value = loss.double_value(&[]);
            if !value.is_finite() {
                return Err(Error::NumericDivergence {
                    epoch,
                    batch: Some(batch),
                    loss: value,
                });
            }
            match self.config.grad_clip {
                Some(clip) => self.opt.backward_step_clip(&loss, clip),
                None => self.opt.backward_step(&loss),
            }
            debug!(epoch, batch, loss = value, "training batch");
            sum_loss += value;
            batches += 1;
        }
        Ok(sum_loss / batches as f64)
    }

    /// Mean loss over a split in evaluation mode, without touching the parameters
    pub fn validate<F>(&self, epoch: usize, valid: &WindowSet<F>) -> Result<f64>
    where
        F: Copy + NumCast,
    {
        self.check_nonempty(valid)?;
        let indices: Vec<usize> = (0..valid.len()).collect();
        let mut sum_loss = 0.0;
        let mut batches = 0;
        tch::no_grad(|| {
            for chunk in indices.chunks(self.config.batch_size) {
                let (xs, ys) = self.batch(valid, chunk);
                let loss = self
                    .model
                    .forward(&xs, Mode::Eval)
                    .mse_loss(&ys, Reduction::Mean)
                    .double_value(&[]);
                sum_loss += loss;
                batches += 1;
            }
        });
        let cost = sum_loss / batches as f64;
        if !cost.is_finite() {
            return Err(Error::NumericDivergence {
                epoch,
                batch: None,
                loss: cost,
            });
        }
        Ok(cost)
    }

    /// Train until `max_epochs` or until validation cost has not improved for more than `patience` epochs, then
    /// restore the parameters with the lowest validation cost
    pub fn fit<F>(
        &mut self,
        train: &WindowSet<F>,
        valid: &WindowSet<F>,
        max_epochs: usize,
        patience: usize,
    ) -> Result<FitReport>
    where
        F: Copy + NumCast,
    {
        self.fit_with(train, valid, max_epochs, patience, |_| {})
    }

    /// [`Trainer::fit`], calling `observer` after every epoch
    pub fn fit_with<F, O>(
        &mut self,
        train: &WindowSet<F>,
        valid: &WindowSet<F>,
        max_epochs: usize,
        patience: usize,
        mut observer: O,
    ) -> Result<FitReport>
    where
        F: Copy + NumCast,
        O: FnMut(&EpochRecord),
    {
        info!(
            train = train.len(),
            valid = valid.len(),
            max_epochs,
            patience,
            "beginning training"
        );
        self.snapshot = None;
        let mut stop = EarlyStopping::new(patience);
        let mut report = FitReport::default();
        for epoch in 0..max_epochs {
            let costs = self
                .train_epoch(epoch, train)
                .and_then(|train_cost| Ok((train_cost, self.validate(epoch, valid)?)));
            let (train_cost, valid_cost) = match costs {
                Ok(costs) => costs,
                Err(err) => {
                    warn!(epoch, %err, "training halted");
                    self.restore_best()?;
                    return Err(err);
                }
            };
            let verdict = stop.observe(epoch, valid_cost);
            observer(&EpochRecord {
                epoch,
                train_cost,
                valid_cost,
                best_cost: stop.best_cost,
                stall_count: stop.stall_count,
                verdict,
            });
            match verdict {
                Verdict::Improved => {
                    info!(epoch, train_cost, valid_cost, "validation cost improved");
                    self.snapshot = Some(self.save_snapshot(epoch));
                }
                Verdict::Stalled => {
                    info!(
                        epoch,
                        train_cost,
                        valid_cost,
                        stalls = stop.stall_count,
                        "validation cost did not improve"
                    );
                }
                Verdict::Stopped => {
                    info!(epoch, best_epoch = ?stop.best_epoch, "patience exhausted, stopping");
                    report.stopped_at = Some(epoch);
                    break;
                }
            }
            report.train_costs.push(train_cost);
            report.valid_costs.push(valid_cost);
            report.best_costs.push(stop.best_cost);
        }
        self.restore_best()?;
        report.best_epoch = stop.best_epoch;
        report.best_cost = report.best_epoch.map(|_| stop.best_cost);
        Ok(report)
    }

    fn restore_best(&self) -> Result<()> {
        if let Some(snapshot) = &self.snapshot {
            debug!(version = snapshot.version, "restoring best parameters");
            self.restore_snapshot(snapshot)?;
        }
        Ok(())
    }

    /// Predict every window of a split, in order
    pub fn predict<F>(&self, split: &WindowSet<F>) -> Result<Vec<GpuFloat>>
    where
        F: Copy + NumCast,
    {
        let indices: Vec<usize> = (0..split.len()).collect();
        let mut predictions = Vec::with_capacity(split.len());
        tch::no_grad(|| -> Result<()> {
            for chunk in indices.chunks(self.config.batch_size) {
                let (xs, _) = self.batch(split, chunk);
                let ys = self.model.forward(&xs, Mode::Eval).to_device(Device::Cpu);
                predictions.extend(Vec::<GpuFloat>::try_from(&ys)?);
            }
            Ok(())
        })?;
        Ok(predictions)
    }
}
