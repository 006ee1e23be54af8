//! Layer implementations and the tagged dispatch over them.
//!
//! Every concrete layer lives in its own submodule; [`Layer`] is the closed
//! sum over all 13 kinds. The network drives layers exclusively through the
//! exhaustive matches here, so adding a layer kind is a compile-time-checked
//! change rather than a runtime string convention.

pub mod conv;
pub mod dropout;
pub mod fully_conn;
pub mod input;
pub mod loss;
pub mod lrn;
pub mod maxout;
pub mod nonlinear;
pub mod pool;

pub use conv::ConvLayer;
pub use dropout::DropoutLayer;
pub use fully_conn::FullyConnLayer;
pub use input::InputLayer;
pub use loss::{RegressionLayer, SoftmaxLayer, SvmLayer};
pub use lrn::LrnLayer;
pub use maxout::MaxoutLayer;
pub use nonlinear::{ReluLayer, SigmoidLayer, TanhLayer};
pub use pool::PoolLayer;

use crate::architecture::LayerDef;
use crate::error::NetError;
use crate::json::LayerJson;
use crate::utils::SimpleRng;
use crate::vol::Vol;

/// One parameter block of a layer, exposed to the trainer.
///
/// `params` and `grads` are live views into the layer's own storage: the
/// trainer mutates `params` in place and the next forward pass observes the
/// new values. The decay multipliers scale the trainer's global L1/L2 decay
/// per block (biases carry 0).
#[derive(Debug)]
pub struct ParamsAndGrads<'a> {
    pub params: &'a mut [f64],
    pub grads: &'a mut [f64],
    pub l1_decay_mul: f64,
    pub l2_decay_mul: f64,
}

/// Training target handed to the loss layer's backward pass.
#[derive(Debug, Clone, PartialEq)]
pub enum LossTarget {
    /// Class index (softmax, svm).
    Class(usize),
    /// Full target vector (regression).
    Vector(Vec<f64>),
    /// Single scalar regressing dimension 0 (regression).
    Scalar(f64),
    /// One named dimension (regression).
    Dim { dim: usize, val: f64 },
}

/// A network layer: one of the 13 concrete kinds.
#[derive(Debug)]
pub enum Layer {
    Input(InputLayer),
    Conv(ConvLayer),
    FullyConn(FullyConnLayer),
    Pool(PoolLayer),
    Relu(ReluLayer),
    Sigmoid(SigmoidLayer),
    Tanh(TanhLayer),
    Maxout(MaxoutLayer),
    Dropout(DropoutLayer),
    Lrn(LrnLayer),
    Softmax(SoftmaxLayer),
    Regression(RegressionLayer),
    Svm(SvmLayer),
}

impl Layer {
    /// Instantiate a layer from a desugared definition.
    ///
    /// `index` is only used in error messages; `(in_sx, in_sy, in_depth)` are
    /// the output dimensions of the preceding layer.
    pub fn from_def(
        def: &LayerDef,
        index: usize,
        in_sx: usize,
        in_sy: usize,
        in_depth: usize,
        rng: &mut SimpleRng,
    ) -> Result<Layer, NetError> {
        let missing = |field: &'static str| NetError::MissingField {
            index,
            layer_type: def.layer_type.clone(),
            field,
        };

        let layer = match def.layer_type.as_str() {
            "input" => {
                let sx = def.out_sx.ok_or_else(|| missing("out_sx"))?;
                let sy = def.out_sy.ok_or_else(|| missing("out_sy"))?;
                let depth = def.out_depth.ok_or_else(|| missing("out_depth"))?;
                Layer::Input(InputLayer::new(sx, sy, depth))
            }
            "conv" => {
                let sx = def.sx.ok_or_else(|| missing("sx"))?;
                let sy = def.sy.unwrap_or(sx);
                let filters = def.filters.ok_or_else(|| missing("filters"))?;
                Layer::Conv(ConvLayer::new(
                    in_sx,
                    in_sy,
                    in_depth,
                    sx,
                    sy,
                    filters,
                    def.stride.unwrap_or(1),
                    def.pad.unwrap_or(0),
                    def.l1_decay_mul.unwrap_or(0.0),
                    def.l2_decay_mul.unwrap_or(1.0),
                    def.bias_pref.unwrap_or(0.0),
                    rng,
                ))
            }
            "fc" => {
                let filters = def.filters.ok_or_else(|| missing("filters"))?;
                Layer::FullyConn(FullyConnLayer::new(
                    in_sx,
                    in_sy,
                    in_depth,
                    filters,
                    def.l1_decay_mul.unwrap_or(0.0),
                    def.l2_decay_mul.unwrap_or(1.0),
                    def.bias_pref.unwrap_or(0.0),
                    rng,
                ))
            }
            "pool" => {
                let sx = def.sx.ok_or_else(|| missing("sx"))?;
                let sy = def.sy.unwrap_or(sx);
                Layer::Pool(PoolLayer::new(
                    in_sx,
                    in_sy,
                    in_depth,
                    sx,
                    sy,
                    def.stride.unwrap_or(2),
                    def.pad.unwrap_or(0),
                ))
            }
            "relu" => Layer::Relu(ReluLayer::new(in_sx, in_sy, in_depth)),
            "sigmoid" => Layer::Sigmoid(SigmoidLayer::new(in_sx, in_sy, in_depth)),
            "tanh" => Layer::Tanh(TanhLayer::new(in_sx, in_sy, in_depth)),
            "maxout" => {
                let group_size = def.group_size.unwrap_or(2);
                if group_size == 0 || in_depth % group_size != 0 {
                    return Err(NetError::InvalidField {
                        index,
                        layer_type: def.layer_type.clone(),
                        message: format!(
                            "group_size {} must evenly divide input depth {}",
                            group_size, in_depth
                        ),
                    });
                }
                Layer::Maxout(MaxoutLayer::new(in_sx, in_sy, in_depth, group_size))
            }
            "dropout" => {
                let drop_prob = def.drop_prob.unwrap_or(0.5);
                if !(0.0..1.0).contains(&drop_prob) {
                    return Err(NetError::InvalidField {
                        index,
                        layer_type: def.layer_type.clone(),
                        message: format!("drop_prob {} must be in [0.0, 1.0)", drop_prob),
                    });
                }
                Layer::Dropout(DropoutLayer::new(in_sx, in_sy, in_depth, drop_prob, rng))
            }
            "lrn" => {
                let k = def.k.ok_or_else(|| missing("k"))?;
                let n = def.n.ok_or_else(|| missing("n"))?;
                let alpha = def.alpha.ok_or_else(|| missing("alpha"))?;
                let beta = def.beta.ok_or_else(|| missing("beta"))?;
                if n == 0 {
                    return Err(NetError::InvalidField {
                        index,
                        layer_type: def.layer_type.clone(),
                        message: "n must be greater than 0".to_string(),
                    });
                }
                Layer::Lrn(LrnLayer::new(in_sx, in_sy, in_depth, k, n, alpha, beta))
            }
            "softmax" => Layer::Softmax(SoftmaxLayer::new(in_sx, in_sy, in_depth)),
            "regression" => Layer::Regression(RegressionLayer::new(in_sx, in_sy, in_depth)),
            "svm" => Layer::Svm(SvmLayer::new(in_sx, in_sy, in_depth)),
            other => return Err(NetError::UnknownLayerType(other.to_string())),
        };

        Ok(layer)
    }

    /// Type tag of the layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Input(_) => "input",
            Layer::Conv(_) => "conv",
            Layer::FullyConn(_) => "fc",
            Layer::Pool(_) => "pool",
            Layer::Relu(_) => "relu",
            Layer::Sigmoid(_) => "sigmoid",
            Layer::Tanh(_) => "tanh",
            Layer::Maxout(_) => "maxout",
            Layer::Dropout(_) => "dropout",
            Layer::Lrn(_) => "lrn",
            Layer::Softmax(_) => "softmax",
            Layer::Regression(_) => "regression",
            Layer::Svm(_) => "svm",
        }
    }

    /// Whether this is one of the terminal loss kinds.
    pub fn is_loss(&self) -> bool {
        matches!(
            self,
            Layer::Softmax(_) | Layer::Regression(_) | Layer::Svm(_)
        )
    }

    pub fn out_sx(&self) -> usize {
        match self {
            Layer::Input(l) => l.out_sx,
            Layer::Conv(l) => l.out_sx,
            Layer::FullyConn(l) => l.out_sx,
            Layer::Pool(l) => l.out_sx,
            Layer::Relu(l) => l.out_sx,
            Layer::Sigmoid(l) => l.out_sx,
            Layer::Tanh(l) => l.out_sx,
            Layer::Maxout(l) => l.out_sx,
            Layer::Dropout(l) => l.out_sx,
            Layer::Lrn(l) => l.out_sx,
            Layer::Softmax(l) => l.out_sx,
            Layer::Regression(l) => l.out_sx,
            Layer::Svm(l) => l.out_sx,
        }
    }

    pub fn out_sy(&self) -> usize {
        match self {
            Layer::Input(l) => l.out_sy,
            Layer::Conv(l) => l.out_sy,
            Layer::FullyConn(l) => l.out_sy,
            Layer::Pool(l) => l.out_sy,
            Layer::Relu(l) => l.out_sy,
            Layer::Sigmoid(l) => l.out_sy,
            Layer::Tanh(l) => l.out_sy,
            Layer::Maxout(l) => l.out_sy,
            Layer::Dropout(l) => l.out_sy,
            Layer::Lrn(l) => l.out_sy,
            Layer::Softmax(l) => l.out_sy,
            Layer::Regression(l) => l.out_sy,
            Layer::Svm(l) => l.out_sy,
        }
    }

    pub fn out_depth(&self) -> usize {
        match self {
            Layer::Input(l) => l.out_depth,
            Layer::Conv(l) => l.out_depth,
            Layer::FullyConn(l) => l.out_depth,
            Layer::Pool(l) => l.out_depth,
            Layer::Relu(l) => l.out_depth,
            Layer::Sigmoid(l) => l.out_depth,
            Layer::Tanh(l) => l.out_depth,
            Layer::Maxout(l) => l.out_depth,
            Layer::Dropout(l) => l.out_depth,
            Layer::Lrn(l) => l.out_depth,
            Layer::Softmax(l) => l.out_depth,
            Layer::Regression(l) => l.out_depth,
            Layer::Svm(l) => l.out_depth,
        }
    }

    /// The output volume produced by the last forward pass.
    pub fn out_act(&self) -> &Vol {
        match self {
            Layer::Input(l) => &l.out_act,
            Layer::Conv(l) => &l.out_act,
            Layer::FullyConn(l) => &l.out_act,
            Layer::Pool(l) => &l.out_act,
            Layer::Relu(l) => &l.out_act,
            Layer::Sigmoid(l) => &l.out_act,
            Layer::Tanh(l) => &l.out_act,
            Layer::Maxout(l) => &l.out_act,
            Layer::Dropout(l) => &l.out_act,
            Layer::Lrn(l) => &l.out_act,
            Layer::Softmax(l) => &l.out_act,
            Layer::Regression(l) => &l.out_act,
            Layer::Svm(l) => &l.out_act,
        }
    }

    pub(crate) fn out_act_mut(&mut self) -> &mut Vol {
        match self {
            Layer::Input(l) => &mut l.out_act,
            Layer::Conv(l) => &mut l.out_act,
            Layer::FullyConn(l) => &mut l.out_act,
            Layer::Pool(l) => &mut l.out_act,
            Layer::Relu(l) => &mut l.out_act,
            Layer::Sigmoid(l) => &mut l.out_act,
            Layer::Tanh(l) => &mut l.out_act,
            Layer::Maxout(l) => &mut l.out_act,
            Layer::Dropout(l) => &mut l.out_act,
            Layer::Lrn(l) => &mut l.out_act,
            Layer::Softmax(l) => &mut l.out_act,
            Layer::Regression(l) => &mut l.out_act,
            Layer::Svm(l) => &mut l.out_act,
        }
    }

    /// Forward pass. Only dropout consumes `is_training`; all other layers
    /// ignore it.
    pub fn forward(&mut self, in_act: &Vol, is_training: bool) {
        match self {
            Layer::Input(l) => l.forward(in_act),
            Layer::Conv(l) => l.forward(in_act),
            Layer::FullyConn(l) => l.forward(in_act),
            Layer::Pool(l) => l.forward(in_act),
            Layer::Relu(l) => l.forward(in_act),
            Layer::Sigmoid(l) => l.forward(in_act),
            Layer::Tanh(l) => l.forward(in_act),
            Layer::Maxout(l) => l.forward(in_act),
            Layer::Dropout(l) => l.forward(in_act, is_training),
            Layer::Lrn(l) => l.forward(in_act),
            Layer::Softmax(l) => l.forward(in_act),
            Layer::Regression(l) => l.forward(in_act),
            Layer::Svm(l) => l.forward(in_act),
        }
    }

    /// Backward pass for non-loss layers: reads the gradient the following
    /// layer left on this layer's output and writes gradients into `in_act`.
    /// No-op for input and loss layers (the latter go through
    /// [`Layer::backward_loss`]).
    pub fn backward(&mut self, in_act: &mut Vol) {
        match self {
            Layer::Input(_) => {}
            Layer::Conv(l) => l.backward(in_act),
            Layer::FullyConn(l) => l.backward(in_act),
            Layer::Pool(l) => l.backward(in_act),
            Layer::Relu(l) => l.backward(in_act),
            Layer::Sigmoid(l) => l.backward(in_act),
            Layer::Tanh(l) => l.backward(in_act),
            Layer::Maxout(l) => l.backward(in_act),
            Layer::Dropout(l) => l.backward(in_act),
            Layer::Lrn(l) => l.backward(in_act),
            Layer::Softmax(_) | Layer::Regression(_) | Layer::Svm(_) => {}
        }
    }

    /// Backward pass for the terminal loss layer: seeds gradients into
    /// `in_act` and returns the scalar loss.
    pub fn backward_loss(
        &mut self,
        in_act: &mut Vol,
        target: &LossTarget,
    ) -> Result<f64, NetError> {
        match self {
            Layer::Softmax(l) => l.backward_loss(in_act, target),
            Layer::Regression(l) => l.backward_loss(in_act, target),
            Layer::Svm(l) => l.backward_loss(in_act, target),
            other => Err(NetError::LastLayerNotLoss(other.kind().to_string())),
        }
    }

    /// Parameter/gradient blocks of this layer, in a stable order.
    /// Parameterless layers return an empty list.
    pub fn params_and_grads(&mut self) -> Vec<ParamsAndGrads<'_>> {
        match self {
            Layer::Conv(l) => l.params_and_grads(),
            Layer::FullyConn(l) => l.params_and_grads(),
            _ => Vec::new(),
        }
    }

    /// Serializable record of this layer: configuration and weights, never
    /// gradients or switch/mask state.
    pub(crate) fn to_json(&self) -> LayerJson {
        match self {
            Layer::Input(l) => LayerJson::Input {
                out_sx: l.out_sx,
                out_sy: l.out_sy,
                out_depth: l.out_depth,
            },
            Layer::Conv(l) => l.to_json(),
            Layer::FullyConn(l) => l.to_json(),
            Layer::Pool(l) => l.to_json(),
            Layer::Relu(l) => l.to_json(),
            Layer::Sigmoid(l) => l.to_json(),
            Layer::Tanh(l) => l.to_json(),
            Layer::Maxout(l) => l.to_json(),
            Layer::Dropout(l) => l.to_json(),
            Layer::Lrn(l) => l.to_json(),
            Layer::Softmax(l) => l.to_json(),
            Layer::Regression(l) => l.to_json(),
            Layer::Svm(l) => l.to_json(),
        }
    }

    /// Rebuild a layer from its serialized record. Switches and masks come
    /// back zeroed; they hold no meaningful state until the next forward
    /// pass.
    pub(crate) fn from_json(json: LayerJson, rng: &mut SimpleRng) -> Layer {
        match json {
            LayerJson::Input {
                out_sx,
                out_sy,
                out_depth,
            } => Layer::Input(InputLayer::new(out_sx, out_sy, out_depth)),
            LayerJson::Conv {
                in_sx,
                in_sy,
                in_depth,
                sx,
                sy,
                out_depth,
                stride,
                pad,
                l1_decay_mul,
                l2_decay_mul,
                filters,
                biases,
            } => Layer::Conv(ConvLayer::from_json(
                in_sx,
                in_sy,
                in_depth,
                sx,
                sy,
                out_depth,
                stride,
                pad,
                l1_decay_mul,
                l2_decay_mul,
                filters,
                biases,
            )),
            LayerJson::Fc {
                num_inputs,
                out_depth,
                l1_decay_mul,
                l2_decay_mul,
                filters,
                biases,
            } => Layer::FullyConn(FullyConnLayer::from_json(
                num_inputs,
                out_depth,
                l1_decay_mul,
                l2_decay_mul,
                filters,
                biases,
            )),
            LayerJson::Pool {
                in_sx,
                in_sy,
                in_depth,
                sx,
                sy,
                stride,
                pad,
            } => Layer::Pool(PoolLayer::new(in_sx, in_sy, in_depth, sx, sy, stride, pad)),
            LayerJson::Relu {
                out_sx,
                out_sy,
                out_depth,
            } => Layer::Relu(ReluLayer::new(out_sx, out_sy, out_depth)),
            LayerJson::Sigmoid {
                out_sx,
                out_sy,
                out_depth,
            } => Layer::Sigmoid(SigmoidLayer::new(out_sx, out_sy, out_depth)),
            LayerJson::Tanh {
                out_sx,
                out_sy,
                out_depth,
            } => Layer::Tanh(TanhLayer::new(out_sx, out_sy, out_depth)),
            LayerJson::Maxout {
                out_sx,
                out_sy,
                in_depth,
                group_size,
            } => Layer::Maxout(MaxoutLayer::new(out_sx, out_sy, in_depth, group_size)),
            LayerJson::Dropout {
                out_sx,
                out_sy,
                out_depth,
                drop_prob,
            } => Layer::Dropout(DropoutLayer::new(out_sx, out_sy, out_depth, drop_prob, rng)),
            LayerJson::Lrn {
                out_sx,
                out_sy,
                out_depth,
                k,
                n,
                alpha,
                beta,
            } => Layer::Lrn(LrnLayer::from_json(out_sx, out_sy, out_depth, k, n, alpha, beta)),
            LayerJson::Softmax { num_inputs } => {
                Layer::Softmax(SoftmaxLayer::new(1, 1, num_inputs))
            }
            LayerJson::Regression { num_inputs } => {
                Layer::Regression(RegressionLayer::new(1, 1, num_inputs))
            }
            LayerJson::Svm { num_inputs } => Layer::Svm(SvmLayer::new(1, 1, num_inputs)),
        }
    }
}
