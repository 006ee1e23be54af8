//! Elementwise nonlinearities: ReLU, sigmoid and tanh.
//!
//! All three clone the incoming volume before transforming it so a
//! training-mode perturbation downstream can never corrupt the upstream
//! activation, and all three compute their backward pass from the cached
//! *output* values.

use crate::json::LayerJson;
use crate::vol::Vol;

/// Rectified linear unit: `y = max(0, x)`.
#[derive(Debug)]
pub struct ReluLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,
}

impl ReluLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        Self {
            out_sx: in_sx,
            out_sy: in_sy,
            out_depth: in_depth,
            out_act: Vol::with_constant(in_sx, in_sy, in_depth, 0.0),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = in_act.clone_with_zeroed_grads();
        for v in &mut out.w {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
        self.out_act = out;
    }

    /// The threshold is on the output: units sitting exactly at 0 get zero
    /// gradient.
    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();
        for i in 0..in_act.len() {
            if self.out_act.w[i] <= 0.0 {
                in_act.dw[i] = 0.0;
            } else {
                in_act.dw[i] = self.out_act.dw[i];
            }
        }
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Relu {
            out_sx: self.out_sx,
            out_sy: self.out_sy,
            out_depth: self.out_depth,
        }
    }
}

/// Logistic sigmoid: `y = 1 / (1 + e^-x)`.
#[derive(Debug)]
pub struct SigmoidLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,
}

impl SigmoidLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        Self {
            out_sx: in_sx,
            out_sy: in_sy,
            out_depth: in_depth,
            out_act: Vol::with_constant(in_sx, in_sy, in_depth, 0.0),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = in_act.clone_with_zeroed_grads();
        for v in &mut out.w {
            *v = 1.0 / (1.0 + (-*v).exp());
        }
        self.out_act = out;
    }

    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();
        for i in 0..in_act.len() {
            let y = self.out_act.w[i];
            in_act.dw[i] = y * (1.0 - y) * self.out_act.dw[i];
        }
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Sigmoid {
            out_sx: self.out_sx,
            out_sy: self.out_sy,
            out_depth: self.out_depth,
        }
    }
}

/// Hyperbolic tangent, computed as `(e^{2x} - 1) / (e^{2x} + 1)`.
#[derive(Debug)]
pub struct TanhLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,
}

impl TanhLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        Self {
            out_sx: in_sx,
            out_sy: in_sy,
            out_depth: in_depth,
            out_act: Vol::with_constant(in_sx, in_sy, in_depth, 0.0),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = in_act.clone_with_zeroed_grads();
        for v in &mut out.w {
            let e2x = (2.0 * *v).exp();
            *v = (e2x - 1.0) / (e2x + 1.0);
        }
        self.out_act = out;
    }

    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();
        for i in 0..in_act.len() {
            let y = self.out_act.w[i];
            in_act.dw[i] = (1.0 - y * y) * self.out_act.dw[i];
        }
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Tanh {
            out_sx: self.out_sx,
            out_sy: self.out_sy,
            out_depth: self.out_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relu_forward_and_backward() {
        let mut layer = ReluLayer::new(1, 1, 4);
        let mut input = Vol::from_flat(&[-2.0, -0.0, 0.5, 3.0]);
        layer.forward(&input);
        assert_eq!(layer.out_act.w, vec![0.0, 0.0, 0.5, 3.0]);

        for g in &mut layer.out_act.dw {
            *g = 1.0;
        }
        layer.backward(&mut input);
        assert_eq!(input.dw, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_sigmoid_values_and_derivative() {
        let mut layer = SigmoidLayer::new(1, 1, 1);
        let mut input = Vol::from_flat(&[0.0]);
        layer.forward(&input);
        assert!((layer.out_act.w[0] - 0.5).abs() < 1e-12);

        layer.out_act.dw[0] = 2.0;
        layer.backward(&mut input);
        // y(1-y) at y=0.5 is 0.25.
        assert!((input.dw[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tanh_matches_std() {
        let mut layer = TanhLayer::new(1, 1, 3);
        let mut input = Vol::from_flat(&[-1.5, 0.0, 0.7]);
        layer.forward(&input);
        for i in 0..3 {
            assert!((layer.out_act.w[i] - input.w[i].tanh()).abs() < 1e-12);
        }

        layer.out_act.dw.copy_from_slice(&[1.0, 1.0, 1.0]);
        layer.backward(&mut input);
        for i in 0..3 {
            let y = input.w[i].tanh();
            assert!((input.dw[i] - (1.0 - y * y)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_forward_does_not_mutate_input() {
        let mut layer = ReluLayer::new(1, 1, 2);
        let input = Vol::from_flat(&[-1.0, 1.0]);
        layer.forward(&input);
        assert_eq!(input.w, vec![-1.0, 1.0]);
    }
}
