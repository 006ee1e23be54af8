//! Minibatch gradient-descent training.
//!
//! The trainer owns the optimizer state (first- and second-moment
//! accumulators) and mutates network parameters in place through
//! [`Net::params_and_grads`]. Gradients accumulate across calls and are
//! applied and cleared once per `batch_size` examples.

use serde::Deserialize;

use crate::error::NetError;
use crate::layers::LossTarget;
use crate::net::Net;
use crate::vol::Vol;

/// Parameter update rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Plain gradient descent, with classical momentum when `momentum > 0`.
    Sgd,
    /// Nesterov accelerated gradient.
    Nesterov,
    /// Per-parameter learning rates from accumulated squared gradients.
    Adagrad,
    /// Adadelta with decay rate `ro`.
    Adadelta,
}

/// Trainer hyperparameters.
///
/// All fields have conventional defaults, so a config can be built from
/// `TrainerConfig::default()` or deserialized from a partial JSON object.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub method: Method,
    pub learning_rate: f64,
    /// Classical or Nesterov momentum coefficient; ignored by adagrad and
    /// adadelta.
    pub momentum: f64,
    /// Number of examples accumulated before parameters are updated.
    pub batch_size: usize,
    pub l1_decay: f64,
    pub l2_decay: f64,
    /// Adadelta decay rate.
    pub ro: f64,
    /// Denominator fuzz for adagrad and adadelta.
    pub eps: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            method: Method::Sgd,
            learning_rate: 0.01,
            momentum: 0.9,
            batch_size: 1,
            l1_decay: 0.0,
            l2_decay: 0.0,
            ro: 0.95,
            eps: 1e-6,
        }
    }
}

impl TrainerConfig {
    fn validate(&self) -> Result<(), NetError> {
        if !(self.learning_rate > 0.0) {
            return Err(NetError::InvalidTrainerConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(NetError::InvalidTrainerConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.momentum) {
            return Err(NetError::InvalidTrainerConfig(format!(
                "momentum must be in [0, 1], got {}",
                self.momentum
            )));
        }
        if !(0.0..1.0).contains(&self.ro) {
            return Err(NetError::InvalidTrainerConfig(format!(
                "ro must be in [0, 1), got {}",
                self.ro
            )));
        }
        if !(self.eps > 0.0) {
            return Err(NetError::InvalidTrainerConfig(format!(
                "eps must be positive, got {}",
                self.eps
            )));
        }
        if self.l1_decay < 0.0 || self.l2_decay < 0.0 {
            return Err(NetError::InvalidTrainerConfig(
                "decay strengths must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Losses observed for one training example.
#[derive(Debug, Clone, Copy)]
pub struct TrainStats {
    /// Data loss plus both decay losses.
    pub loss: f64,
    /// Data loss reported by the loss layer.
    pub cost_loss: f64,
    /// L1 regularization loss added during the parameter update, zero on
    /// non-update steps.
    pub l1_decay_loss: f64,
    /// L2 regularization loss, zero on non-update steps.
    pub l2_decay_loss: f64,
}

/// Gradient-descent trainer over a [`Net`].
#[derive(Debug)]
pub struct Trainer {
    config: TrainerConfig,
    /// Examples seen so far; an update fires every `batch_size`-th.
    k: usize,
    /// First-moment accumulator per parameter block.
    gsum: Vec<Vec<f64>>,
    /// Second accumulator, used by adadelta only.
    xsum: Vec<Vec<f64>>,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self, NetError> {
        config.validate()?;
        Ok(Self {
            config,
            k: 0,
            gsum: Vec::new(),
            xsum: Vec::new(),
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Present one example: forward in training mode, backward, and if this
    /// completes a batch, apply the parameter update and clear gradients.
    pub fn train(
        &mut self,
        net: &mut Net,
        x: &Vol,
        target: &LossTarget,
    ) -> Result<TrainStats, NetError> {
        net.forward(x, true);
        let cost_loss = net.backward(target)?;

        let mut l1_decay_loss = 0.0;
        let mut l2_decay_loss = 0.0;

        self.k += 1;
        if self.k % self.config.batch_size == 0 {
            let cfg = self.config.clone();
            let blocks = net.params_and_grads();

            // Momentum-free plain sgd keeps no state; everything else tracks
            // one accumulator per parameter (adadelta tracks two).
            let needs_gsum = cfg.method != Method::Sgd || cfg.momentum > 0.0;
            if needs_gsum && self.gsum.len() != blocks.len() {
                self.gsum = blocks.iter().map(|b| vec![0.0; b.params.len()]).collect();
                if cfg.method == Method::Adadelta {
                    self.xsum = blocks.iter().map(|b| vec![0.0; b.params.len()]).collect();
                }
            }

            for (bi, block) in blocks.into_iter().enumerate() {
                let l1_decay = cfg.l1_decay * block.l1_decay_mul;
                let l2_decay = cfg.l2_decay * block.l2_decay_mul;

                for j in 0..block.params.len() {
                    let p = block.params[j];

                    l1_decay_loss += l1_decay * p.abs();
                    l2_decay_loss += l2_decay * p * p / 2.0;

                    let l1_grad = l1_decay * if p > 0.0 { 1.0 } else { -1.0 };
                    let l2_grad = l2_decay * p;
                    let gij =
                        (l1_grad + l2_grad + block.grads[j]) / cfg.batch_size as f64;

                    match cfg.method {
                        Method::Sgd => {
                            if cfg.momentum > 0.0 {
                                let dx = cfg.momentum * self.gsum[bi][j]
                                    - cfg.learning_rate * gij;
                                self.gsum[bi][j] = dx;
                                block.params[j] += dx;
                            } else {
                                block.params[j] -= cfg.learning_rate * gij;
                            }
                        }
                        Method::Nesterov => {
                            let prev = self.gsum[bi][j];
                            self.gsum[bi][j] =
                                cfg.momentum * prev + cfg.learning_rate * gij;
                            let dx = cfg.momentum * prev
                                - (1.0 + cfg.momentum) * self.gsum[bi][j];
                            block.params[j] += dx;
                        }
                        Method::Adagrad => {
                            self.gsum[bi][j] += gij * gij;
                            block.params[j] -=
                                cfg.learning_rate / (self.gsum[bi][j] + cfg.eps).sqrt() * gij;
                        }
                        Method::Adadelta => {
                            self.gsum[bi][j] =
                                cfg.ro * self.gsum[bi][j] + (1.0 - cfg.ro) * gij * gij;
                            let dx = -((self.xsum[bi][j] + cfg.eps)
                                / (self.gsum[bi][j] + cfg.eps))
                                .sqrt()
                                * gij;
                            self.xsum[bi][j] =
                                cfg.ro * self.xsum[bi][j] + (1.0 - cfg.ro) * dx * dx;
                            block.params[j] += dx;
                        }
                    }

                    block.grads[j] = 0.0;
                }
            }
        }

        Ok(TrainStats {
            loss: cost_loss + l1_decay_loss + l2_decay_loss,
            cost_loss,
            l1_decay_loss,
            l2_decay_loss,
        })
    }
}
