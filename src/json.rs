//! Serialized forms of networks, layers and volumes.
//!
//! These mirror the in-memory types field for field but carry only what is
//! needed to reconstruct a trained network: dimensions, hyperparameters and
//! weights. Gradients, pooling switches and dropout masks are transient and
//! never written out.

use serde::{Deserialize, Serialize};

use crate::vol::Vol;

/// Serialized volume: dimensions plus weights, no gradients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolJson {
    pub sx: usize,
    pub sy: usize,
    pub depth: usize,
    pub w: Vec<f64>,
}

impl From<&Vol> for VolJson {
    fn from(vol: &Vol) -> Self {
        Self {
            sx: vol.sx(),
            sy: vol.sy(),
            depth: vol.depth(),
            w: vol.w.clone(),
        }
    }
}

impl VolJson {
    /// Rebuild the volume. Gradients come back zeroed.
    pub fn into_vol(self) -> Vol {
        Vol::from_weights(self.sx, self.sy, self.depth, self.w)
    }
}

/// Serialized network: the layer records in pipeline order.
#[derive(Debug, Serialize, Deserialize)]
pub struct NetJson {
    pub layers: Vec<LayerJson>,
}

/// One serialized layer, tagged by its type string.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "layer_type", rename_all = "snake_case")]
pub enum LayerJson {
    Input {
        out_sx: usize,
        out_sy: usize,
        out_depth: usize,
    },
    Conv {
        in_sx: usize,
        in_sy: usize,
        in_depth: usize,
        sx: usize,
        sy: usize,
        out_depth: usize,
        stride: usize,
        pad: isize,
        l1_decay_mul: f64,
        l2_decay_mul: f64,
        filters: Vec<VolJson>,
        biases: VolJson,
    },
    Fc {
        num_inputs: usize,
        out_depth: usize,
        l1_decay_mul: f64,
        l2_decay_mul: f64,
        filters: Vec<VolJson>,
        biases: VolJson,
    },
    Pool {
        in_sx: usize,
        in_sy: usize,
        in_depth: usize,
        sx: usize,
        sy: usize,
        stride: usize,
        pad: isize,
    },
    Relu {
        out_sx: usize,
        out_sy: usize,
        out_depth: usize,
    },
    Sigmoid {
        out_sx: usize,
        out_sy: usize,
        out_depth: usize,
    },
    Tanh {
        out_sx: usize,
        out_sy: usize,
        out_depth: usize,
    },
    Maxout {
        out_sx: usize,
        out_sy: usize,
        in_depth: usize,
        group_size: usize,
    },
    Dropout {
        out_sx: usize,
        out_sy: usize,
        out_depth: usize,
        drop_prob: f64,
    },
    Lrn {
        out_sx: usize,
        out_sy: usize,
        out_depth: usize,
        k: f64,
        n: usize,
        alpha: f64,
        beta: f64,
    },
    Softmax {
        num_inputs: usize,
    },
    Regression {
        num_inputs: usize,
    },
    Svm {
        num_inputs: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vol_json_round_trip_zeroes_grads() {
        let mut vol = Vol::from_weights(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]);
        vol.dw[0] = 9.0;

        let json = VolJson::from(&vol);
        let back = json.into_vol();

        assert_eq!(back.w, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(back.dw.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn layer_json_is_tagged_by_type() {
        let json = LayerJson::Relu {
            out_sx: 3,
            out_sy: 3,
            out_depth: 2,
        };
        let text = serde_json::to_string(&json).unwrap();
        assert!(text.contains("\"layer_type\":\"relu\""));

        let back: LayerJson = serde_json::from_str(&text).unwrap();
        match back {
            LayerJson::Relu { out_sx, .. } => assert_eq!(out_sx, 3),
            other => panic!("expected relu, got {:?}", other),
        }
    }
}
