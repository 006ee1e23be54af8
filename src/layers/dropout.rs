//! Dropout layer for regularization.

use crate::json::LayerJson;
use crate::utils::SimpleRng;
use crate::vol::Vol;

/// Dropout layer.
///
/// In training mode every unit is independently zeroed with probability
/// `drop_prob`; surviving units pass through unscaled and the drop decisions
/// are recorded for the backward pass. In inference mode every unit passes
/// through scaled by `drop_prob`, which matches the expected value of the
/// training-time output (the scaling happens at inference, not training).
#[derive(Debug)]
pub struct DropoutLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,

    drop_prob: f64,
    dropped: Vec<bool>,
    rng: SimpleRng,
}

impl DropoutLayer {
    pub fn new(
        in_sx: usize,
        in_sy: usize,
        in_depth: usize,
        drop_prob: f64,
        rng: &mut SimpleRng,
    ) -> Self {
        Self {
            out_sx: in_sx,
            out_sy: in_sy,
            out_depth: in_depth,
            out_act: Vol::with_constant(in_sx, in_sy, in_depth, 0.0),
            drop_prob,
            dropped: vec![false; in_sx * in_sy * in_depth],
            rng: rng.clone(),
        }
    }

    pub fn drop_prob(&self) -> f64 {
        self.drop_prob
    }

    pub fn forward(&mut self, in_act: &Vol, is_training: bool) {
        let mut out = in_act.clone_with_zeroed_grads();
        if is_training {
            for i in 0..out.len() {
                if self.rng.next_f64() < self.drop_prob {
                    out.w[i] = 0.0;
                    self.dropped[i] = true;
                } else {
                    self.dropped[i] = false;
                }
            }
        } else {
            for v in &mut out.w {
                *v *= self.drop_prob;
            }
        }
        self.out_act = out;
    }

    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();
        for i in 0..in_act.len() {
            if !self.dropped[i] {
                in_act.dw[i] = self.out_act.dw[i];
            }
        }
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Dropout {
            out_sx: self.out_sx,
            out_sy: self.out_sy,
            out_depth: self.out_depth,
            drop_prob: self.drop_prob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_scales_by_drop_prob() {
        let mut rng = SimpleRng::new(42);
        let mut layer = DropoutLayer::new(1, 1, 4, 0.5, &mut rng);
        let input = Vol::from_flat(&[2.0, 4.0, -2.0, 0.0]);
        layer.forward(&input, false);
        assert_eq!(layer.out_act.w, vec![1.0, 2.0, -1.0, 0.0]);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let mut rng = SimpleRng::new(42);
        let mut layer = DropoutLayer::new(1, 1, 8, 0.3, &mut rng);
        let input = Vol::from_flat(&[1.0; 8]);
        layer.forward(&input, false);
        let first = layer.out_act.w.clone();
        layer.forward(&input, false);
        assert_eq!(layer.out_act.w, first);
    }

    #[test]
    fn test_training_mask_covers_volume() {
        let mut rng = SimpleRng::new(42);
        let mut layer = DropoutLayer::new(2, 2, 3, 0.5, &mut rng);
        let input = Vol::with_constant(2, 2, 3, 1.0);
        layer.forward(&input, true);
        assert_eq!(layer.dropped.len(), input.len());
        for i in 0..input.len() {
            if layer.dropped[i] {
                assert_eq!(layer.out_act.w[i], 0.0);
            } else {
                assert_eq!(layer.out_act.w[i], 1.0);
            }
        }
    }

    #[test]
    fn test_backward_zeroes_dropped_units() {
        let mut rng = SimpleRng::new(42);
        let mut layer = DropoutLayer::new(1, 1, 16, 0.5, &mut rng);
        let mut input = Vol::from_flat(&[1.0; 16]);
        layer.forward(&mut input, true);
        for g in &mut layer.out_act.dw {
            *g = 1.0;
        }
        layer.backward(&mut input);
        for i in 0..16 {
            if layer.dropped[i] {
                assert_eq!(input.dw[i], 0.0);
            } else {
                assert_eq!(input.dw[i], 1.0);
            }
        }
    }
}
