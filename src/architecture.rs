//! Declarative network definitions.
//!
//! A network is described by an ordered list of [`LayerDef`] records, either
//! built in code or loaded from a JSON file. Before layers are instantiated
//! the list goes through a pure desugaring pass ([`desugar`]) that expands
//! the convenience shorthands:
//!
//! - a loss definition (`softmax`, `svm`, `regression`) inserts a preceding
//!   `fc` layer sized to the declared class count,
//! - an `activation` field inserts the matching nonlinearity right after its
//!   owner,
//! - a `drop_prob` field on a non-dropout definition inserts a dropout layer
//!   right after.
//!
//! Desugaring is definitions-in, definitions-out and has no other effect, so
//! it can be tested in isolation from layer construction.

use crate::error::NetError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Definition of a single layer in the network.
///
/// Different layer types read different fields; fields irrelevant to a type
/// are ignored. The first definition must have type `input` with
/// `out_sx`/`out_sy`/`out_depth` (aliases `width`/`height`/`depth` accepted).
///
/// # Example
///
/// ```json
/// {
///   "layers": [
///     { "type": "input", "out_sx": 28, "out_sy": 28, "out_depth": 1 },
///     { "type": "conv", "sx": 5, "filters": 8, "stride": 1, "pad": 2, "activation": "relu" },
///     { "type": "pool", "sx": 2, "stride": 2 },
///     { "type": "softmax", "num_classes": 10 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerDef {
    /// Layer type tag: one of `input`, `conv`, `fc`, `pool`, `relu`,
    /// `sigmoid`, `tanh`, `maxout`, `dropout`, `lrn`, `softmax`, `svm`,
    /// `regression`.
    #[serde(rename = "type")]
    pub layer_type: String,

    /// Output width (input layer only). Alias: `width`.
    #[serde(default, alias = "width")]
    pub out_sx: Option<usize>,
    /// Output height (input layer only). Alias: `height`.
    #[serde(default, alias = "height")]
    pub out_sy: Option<usize>,
    /// Output depth (input layer only). Alias: `depth`.
    #[serde(default, alias = "depth")]
    pub out_depth: Option<usize>,

    /// Filter width (conv, pool).
    #[serde(default)]
    pub sx: Option<usize>,
    /// Filter height (conv, pool); defaults to `sx`.
    #[serde(default)]
    pub sy: Option<usize>,
    /// Stride (conv, pool).
    #[serde(default)]
    pub stride: Option<usize>,
    /// Symmetric zero padding (conv, pool).
    #[serde(default)]
    pub pad: Option<isize>,

    /// Number of filters (conv) or neurons (fc). Alias: `num_neurons`.
    #[serde(default, alias = "num_neurons")]
    pub filters: Option<usize>,
    /// Number of classes (loss layers); sets the size of the auto-inserted
    /// fully-connected layer.
    #[serde(default)]
    pub num_classes: Option<usize>,

    /// Activation shorthand: `relu`, `sigmoid`, `tanh` or `maxout`.
    #[serde(default)]
    pub activation: Option<String>,
    /// Maxout group size (default 2, used when `activation` is `maxout`).
    #[serde(default)]
    pub group_size: Option<usize>,
    /// Dropout probability; on a non-dropout definition this inserts a
    /// dropout layer after it.
    #[serde(default)]
    pub drop_prob: Option<f64>,

    /// L1 weight-decay multiplier for this layer's filters (conv, fc).
    #[serde(default)]
    pub l1_decay_mul: Option<f64>,
    /// L2 weight-decay multiplier for this layer's filters (conv, fc).
    #[serde(default)]
    pub l2_decay_mul: Option<f64>,
    /// Initial bias value (conv, fc).
    #[serde(default)]
    pub bias_pref: Option<f64>,

    /// Additive constant k (lrn).
    #[serde(default)]
    pub k: Option<f64>,
    /// Channel neighborhood size (lrn).
    #[serde(default)]
    pub n: Option<usize>,
    /// Scale of the squared sum (lrn).
    #[serde(default)]
    pub alpha: Option<f64>,
    /// Exponent of the denominator (lrn).
    #[serde(default)]
    pub beta: Option<f64>,
}

impl LayerDef {
    /// Definition with only the type tag set; fields are filled in by the
    /// caller.
    pub fn of_type(layer_type: &str) -> Self {
        Self {
            layer_type: layer_type.to_string(),
            ..Default::default()
        }
    }
}

/// A full network definition, as stored in a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct NetDef {
    /// Ordered layer definitions; desugared by [`desugar`] at build time.
    pub layers: Vec<LayerDef>,
}

/// Loads a network definition from a JSON file.
///
/// The definition is not desugared or validated here; that happens when the
/// network is built.
pub fn load_net_def<P: AsRef<Path>>(path: P) -> Result<NetDef, NetError> {
    let contents = fs::read_to_string(path)?;
    let def: NetDef = serde_json::from_str(&contents)?;
    Ok(def)
}

fn is_loss_type(layer_type: &str) -> bool {
    matches!(layer_type, "softmax" | "svm" | "regression")
}

/// Expand convenience shorthands into explicit layer definitions.
///
/// Checks the two structural invariants (at least two layers, first layer is
/// `input`), then walks the list inserting the implied layers. The resulting
/// list contains only plain definitions that map one-to-one onto concrete
/// layers.
pub fn desugar(defs: &[LayerDef]) -> Result<Vec<LayerDef>, NetError> {
    if defs.len() < 2 {
        return Err(NetError::TooFewLayers);
    }
    if defs[0].layer_type != "input" {
        return Err(NetError::FirstLayerNotInput(defs[0].layer_type.clone()));
    }

    let mut out: Vec<LayerDef> = Vec::with_capacity(defs.len());
    for def in defs {
        let mut def = def.clone();

        if is_loss_type(&def.layer_type) {
            // Regression sizes the inserted fc by `num_neurons` instead.
            if let Some(num_classes) = def.num_classes.or(def.filters) {
                let mut fc = LayerDef::of_type("fc");
                fc.filters = Some(num_classes);
                fc.bias_pref = Some(0.0);
                out.push(fc);
            }
        }

        if matches!(def.layer_type.as_str(), "conv" | "fc") && def.bias_pref.is_none() {
            // ReLU units die with zero bias; start them slightly positive.
            def.bias_pref = Some(match def.activation.as_deref() {
                Some("relu") => 0.1,
                _ => 0.0,
            });
        }

        let activation = def.activation.take();
        let drop_prob = def.drop_prob.take();
        let is_dropout = def.layer_type == "dropout";
        if is_dropout {
            def.drop_prob = drop_prob;
        }
        let group_size = def.group_size;
        out.push(def);

        if let Some(act) = activation {
            match act.as_str() {
                "relu" | "sigmoid" | "tanh" => out.push(LayerDef::of_type(&act)),
                "maxout" => {
                    let mut maxout = LayerDef::of_type("maxout");
                    maxout.group_size = Some(group_size.unwrap_or(2));
                    out.push(maxout);
                }
                other => return Err(NetError::UnsupportedActivation(other.to_string())),
            }
        }

        if !is_dropout {
            if let Some(p) = drop_prob {
                let mut dropout = LayerDef::of_type("dropout");
                dropout.drop_prob = Some(p);
                out.push(dropout);
            }
        }
    }

    match out.last() {
        Some(last) if is_loss_type(&last.layer_type) => Ok(out),
        Some(last) => Err(NetError::LastLayerNotLoss(last.layer_type.clone())),
        None => Err(NetError::TooFewLayers),
    }
}
