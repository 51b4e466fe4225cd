/*!
Sequence regressors, and the LSTM regressor in particular
*/
use crate::context::ExecutionContext;
use serde::{Deserialize, Serialize};
use tch::nn::{self, Init, Linear, Module, Path};
use tch::Tensor;

/// Whether a forward pass is part of training (stochastic regularization on, gradients tracked) or evaluation
/// (deterministic, no gradients)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Training: dropout active
    Train,
    /// Evaluation: dropout disabled
    Eval,
}

impl Mode {
    /// Whether this is the training mode
    #[inline]
    pub fn is_train(self) -> bool {
        self == Mode::Train
    }
}

/// A model mapping a batch of fixed-length windows to one scalar per window
pub trait SequenceRegressor {
    /// Map a `[batch, lookback, features]` input to a `[batch]` output
    fn forward(&self, windows: &Tensor, mode: Mode) -> Tensor;
}

/// Something which can build a [`SequenceRegressor`] with its parameters registered under a `VarStore` path
pub trait RegressorDesc {
    /// The regressor this builds
    type Model: SequenceRegressor;
    /// Build a regressor, registering its parameters under `path`
    fn build(&self, path: &Path) -> Self::Model;
}

/// The parameters of one LSTM layer, in the order libtorch expects them
#[derive(Debug)]
struct LstmLayer {
    w_ih: Tensor,
    w_hh: Tensor,
    b_ih: Tensor,
    b_hh: Tensor,
}

/// Xavier (Glorot) normal initialization for a `[fan_out, fan_in]` weight
fn xavier_normal(fan_in: i64, fan_out: i64) -> Init {
    Init::Randn {
        mean: 0.,
        stdev: (2.0 / (fan_in + fan_out) as f64).sqrt(),
    }
}

/// A stacked LSTM followed by dropout and a linear projection of the last layer's final hidden state
#[derive(Debug)]
pub struct LstmRegressor {
    /// The number of features per time step
    pub inputs: usize,
    /// The hidden size of every LSTM layer
    pub hidden: usize,
    /// The dropout rate between LSTM layers and before the projection
    pub dropout: f64,
    layers: Vec<LstmLayer>,
    /// The output projection
    pub linear_layer: Linear,
    ctx: ExecutionContext,
}

impl LstmRegressor {
    /// The number of stacked LSTM layers
    #[inline]
    pub fn layers(&self) -> usize {
        self.layers.len()
    }
    fn flat_weights(&self) -> Vec<&Tensor> {
        self.layers
            .iter()
            .flat_map(|layer| vec![&layer.w_ih, &layer.w_hh, &layer.b_ih, &layer.b_hh])
            .collect()
    }
    /// Run the LSTM stack, returning the final hidden state of the last layer as a `[batch, hidden]` tensor
    pub fn last_hidden(&self, windows: &Tensor, mode: Mode) -> Tensor {
        let batch = windows.size()[0];
        let state_shape = [self.layers() as i64, batch, self.hidden as i64];
        let h0 = self.ctx.zeros(&state_shape);
        let c0 = self.ctx.zeros(&state_shape);
        let weights = self.flat_weights();
        let (_output, h, _c) = windows.lstm(
            &[&h0, &c0],
            &weights[..],
            true,
            self.layers() as i64,
            self.dropout,
            mode.is_train(),
            false,
            true,
        );
        h.get(self.layers() as i64 - 1)
    }
}

impl SequenceRegressor for LstmRegressor {
    fn forward(&self, windows: &Tensor, mode: Mode) -> Tensor {
        let hidden = self.last_hidden(windows, mode);
        let dropped = hidden.dropout(self.dropout, mode.is_train());
        self.linear_layer.forward(&dropped).squeeze_dim(-1)
    }
}

/// A descriptor for an instance of the [`LstmRegressor`] model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmRegressorDesc {
    /// The number of features per time step
    pub inputs: usize,
    /// The size of the hidden LSTM layers to use
    pub hidden: usize,
    /// The number of hidden LSTM layers to use
    pub layers: usize,
    /// The dropout rate
    pub dropout: f64,
    /// Where the model's parameters live
    #[serde(skip)]
    pub ctx: ExecutionContext,
}

impl RegressorDesc for LstmRegressorDesc {
    type Model = LstmRegressor;
    fn build(&self, path: &Path) -> LstmRegressor {
        let hidden = self.hidden as i64;
        let gates = 4 * hidden;
        let lstm = path / "lstm";
        let layers = (0..self.layers)
            .map(|l| {
                let inputs = if l == 0 { self.inputs as i64 } else { hidden };
                LstmLayer {
                    w_ih: lstm.var(
                        &format!("weight_ih_l{}", l),
                        &[gates, inputs],
                        xavier_normal(inputs, gates),
                    ),
                    w_hh: lstm.var(
                        &format!("weight_hh_l{}", l),
                        &[gates, hidden],
                        xavier_normal(hidden, gates),
                    ),
                    b_ih: lstm.var(&format!("bias_ih_l{}", l), &[gates], Init::Const(0.)),
                    b_hh: lstm.var(&format!("bias_hh_l{}", l), &[gates], Init::Const(0.)),
                }
            })
            .collect();
        let linear_layer = nn::linear(path / "linear", hidden, 1, Default::default());
        LstmRegressor {
            inputs: self.inputs,
            hidden: self.hidden,
            dropout: self.dropout,
            layers,
            linear_layer,
            ctx: self.ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn::VarStore;

    fn small(dropout: f64) -> (VarStore, LstmRegressor) {
        tch::manual_seed(7);
        let ctx = ExecutionContext::cpu();
        let vs = VarStore::new(ctx.device());
        let desc = LstmRegressorDesc {
            inputs: 2,
            hidden: 8,
            layers: 2,
            dropout,
            ctx,
        };
        let model = desc.build(&vs.root());
        (vs, model)
    }

    #[test]
    fn one_output_per_window() {
        let (_vs, model) = small(0.0);
        let xs = Tensor::rand(&[5i64, 4, 2], (tch::Kind::Float, tch::Device::Cpu));
        let ys = model.forward(&xs, Mode::Eval);
        assert_eq!(ys.size(), vec![5]);
    }

    #[test]
    fn biases_start_at_zero() {
        let (vs, model) = small(0.0);
        assert_eq!(model.layers(), 2);
        let variables = vs.variables();
        for l in 0..2 {
            for bias in &["bias_ih_l", "bias_hh_l"] {
                let b = &variables[&format!("lstm.{}{}", bias, l)];
                assert_eq!(b.size(), vec![32]);
                assert_eq!(b.abs().sum(tch::Kind::Double).double_value(&[]), 0.0);
            }
        }
        let w = &variables["lstm.weight_ih_l1"];
        assert_eq!(w.size(), vec![32, 8]);
        assert!(w.abs().sum(tch::Kind::Double).double_value(&[]) > 0.0);
    }

    #[test]
    fn eval_is_deterministic() {
        let (_vs, model) = small(0.5);
        let xs = Tensor::rand(&[3i64, 6, 2], (tch::Kind::Float, tch::Device::Cpu));
        let a = tch::no_grad(|| model.forward(&xs, Mode::Eval));
        let b = tch::no_grad(|| model.forward(&xs, Mode::Eval));
        assert!(a.equal(&b));
    }

    #[test]
    fn batch_rows_are_independent() {
        let (_vs, model) = small(0.0);
        let xs = Tensor::rand(&[4i64, 5, 2], (tch::Kind::Float, tch::Device::Cpu));
        let all = tch::no_grad(|| model.forward(&xs, Mode::Eval));
        let last = tch::no_grad(|| model.forward(&xs.narrow(0, 3, 1), Mode::Eval));
        let diff = (all.get(3) - last.get(0)).abs().double_value(&[]);
        assert!(diff < 1e-6);
    }
}
