//! Loss layers: softmax, regression and SVM.
//!
//! Loss layers terminate the network. Their backward pass is the only one
//! that takes an argument (the training target) and returns a value (the
//! scalar loss). Softmax and SVM accept a class index; regression accepts a
//! full target vector, a single scalar (dimension 0), or one named dimension.

use crate::error::NetError;
use crate::json::LayerJson;
use crate::layers::LossTarget;
use crate::vol::Vol;

/// Softmax classifier over the flattened input.
///
/// Forward computes a numerically stable softmax (max subtraction before
/// exponentiation) and caches the probability vector; backward takes a class
/// index and returns the negative log likelihood of that class.
#[derive(Debug)]
pub struct SoftmaxLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,

    es: Vec<f64>,
}

impl SoftmaxLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        let num_inputs = in_sx * in_sy * in_depth;
        Self {
            out_sx: 1,
            out_sy: 1,
            out_depth: num_inputs,
            out_act: Vol::with_constant(1, 1, num_inputs, 0.0),
            es: vec![0.0; num_inputs],
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = Vol::with_constant(1, 1, self.out_depth, 0.0);

        let amax = in_act
            .w
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));

        let mut esum = 0.0;
        for i in 0..self.out_depth {
            let e = (in_act.w[i] - amax).exp();
            self.es[i] = e;
            esum += e;
        }
        for i in 0..self.out_depth {
            self.es[i] /= esum;
            out.w[i] = self.es[i];
        }

        self.out_act = out;
    }

    pub fn backward_loss(
        &mut self,
        in_act: &mut Vol,
        target: &LossTarget,
    ) -> Result<f64, NetError> {
        let y = match target {
            LossTarget::Class(y) => *y,
            _ => {
                return Err(NetError::TargetMismatch {
                    layer: "softmax",
                    expected: "a class index",
                })
            }
        };
        if y >= self.out_depth {
            return Err(NetError::ClassOutOfRange {
                class: y,
                classes: self.out_depth,
            });
        }

        in_act.zero_grads();
        for i in 0..self.out_depth {
            let indicator = if i == y { 1.0 } else { 0.0 };
            in_act.dw[i] = self.es[i] - indicator;
        }

        Ok(-self.es[y].ln())
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Softmax {
            num_inputs: self.out_depth,
        }
    }
}

/// L2 regression over the flattened input. Forward is the identity.
#[derive(Debug)]
pub struct RegressionLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,
}

impl RegressionLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        let num_inputs = in_sx * in_sy * in_depth;
        Self {
            out_sx: 1,
            out_sy: 1,
            out_depth: num_inputs,
            out_act: Vol::with_constant(1, 1, num_inputs, 0.0),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        self.out_act = in_act.clone_with_zeroed_grads();
    }

    /// Accumulates `0.5 * (x_i - y_i)^2` over the covered dimensions and
    /// writes the gradient `x_i - y_i`; dimensions without a target keep a
    /// zero gradient.
    pub fn backward_loss(
        &mut self,
        in_act: &mut Vol,
        target: &LossTarget,
    ) -> Result<f64, NetError> {
        in_act.zero_grads();
        let mut loss = 0.0;

        match target {
            LossTarget::Vector(ys) => {
                if ys.len() != self.out_depth {
                    return Err(NetError::TargetMismatch {
                        layer: "regression",
                        expected: "a target vector matching the output dimension",
                    });
                }
                for i in 0..self.out_depth {
                    let dy = in_act.w[i] - ys[i];
                    in_act.dw[i] = dy;
                    loss += 0.5 * dy * dy;
                }
            }
            LossTarget::Scalar(y) => {
                let dy = in_act.w[0] - y;
                in_act.dw[0] = dy;
                loss += 0.5 * dy * dy;
            }
            LossTarget::Dim { dim, val } => {
                if *dim >= self.out_depth {
                    return Err(NetError::ClassOutOfRange {
                        class: *dim,
                        classes: self.out_depth,
                    });
                }
                let dy = in_act.w[*dim] - val;
                in_act.dw[*dim] = dy;
                loss += 0.5 * dy * dy;
            }
            LossTarget::Class(_) => {
                return Err(NetError::TargetMismatch {
                    layer: "regression",
                    expected: "a value target (vector, scalar or {dim, val})",
                })
            }
        }

        Ok(loss)
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Regression {
            num_inputs: self.out_depth,
        }
    }
}

/// Multiclass hinge loss (one-vs-rest, margin 1.0). Forward is the identity.
#[derive(Debug)]
pub struct SvmLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,
}

impl SvmLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize) -> Self {
        let num_inputs = in_sx * in_sy * in_depth;
        Self {
            out_sx: 1,
            out_sy: 1,
            out_depth: num_inputs,
            out_act: Vol::with_constant(1, 1, num_inputs, 0.0),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        self.out_act = in_act.clone_with_zeroed_grads();
    }

    pub fn backward_loss(
        &mut self,
        in_act: &mut Vol,
        target: &LossTarget,
    ) -> Result<f64, NetError> {
        let y = match target {
            LossTarget::Class(y) => *y,
            _ => {
                return Err(NetError::TargetMismatch {
                    layer: "svm",
                    expected: "a class index",
                })
            }
        };
        if y >= self.out_depth {
            return Err(NetError::ClassOutOfRange {
                class: y,
                classes: self.out_depth,
            });
        }

        in_act.zero_grads();
        let yscore = in_act.w[y];
        let margin = 1.0;
        let mut loss = 0.0;
        for i in 0..self.out_depth {
            if i == y {
                continue;
            }
            let ydiff = -yscore + in_act.w[i] + margin;
            if ydiff > 0.0 {
                in_act.dw[i] += 1.0;
                in_act.dw[y] -= 1.0;
                loss += ydiff;
            }
        }

        Ok(loss)
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Svm {
            num_inputs: self.out_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_probabilities_sum_to_one() {
        let mut layer = SoftmaxLayer::new(1, 1, 4);
        layer.forward(&Vol::from_flat(&[0.1, -2.0, 3.0, 0.0]));
        let sum: f64 = layer.out_act.w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_softmax_is_shift_invariant_and_overflow_safe() {
        let mut layer = SoftmaxLayer::new(1, 1, 3);
        layer.forward(&Vol::from_flat(&[1.0, 2.0, 3.0]));
        let base = layer.out_act.w.clone();

        // Adding a constant to every score changes nothing.
        layer.forward(&Vol::from_flat(&[101.0, 102.0, 103.0]));
        for i in 0..3 {
            assert!((layer.out_act.w[i] - base[i]).abs() < 1e-12);
        }

        // Max subtraction keeps huge scores finite.
        layer.forward(&Vol::from_flat(&[1000.0, 999.0, 998.0]));
        let sum: f64 = layer.out_act.w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(layer.out_act.w.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_softmax_gradient_and_loss() {
        let mut layer = SoftmaxLayer::new(1, 1, 3);
        let mut input = Vol::from_flat(&[1.0, 2.0, 3.0]);
        layer.forward(&input);
        let probs = layer.out_act.w.clone();

        let loss = layer
            .backward_loss(&mut input, &LossTarget::Class(1))
            .unwrap();
        assert!((loss + probs[1].ln()).abs() < 1e-12);
        assert!((input.dw[0] - probs[0]).abs() < 1e-12);
        assert!((input.dw[1] - (probs[1] - 1.0)).abs() < 1e-12);
        assert!((input.dw[2] - probs[2]).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_class_out_of_range() {
        let mut layer = SoftmaxLayer::new(1, 1, 3);
        let mut input = Vol::from_flat(&[1.0, 2.0, 3.0]);
        layer.forward(&input);
        let err = layer
            .backward_loss(&mut input, &LossTarget::Class(7))
            .unwrap_err();
        assert!(matches!(err, NetError::ClassOutOfRange { class: 7, classes: 3 }));
    }

    #[test]
    fn test_softmax_rejects_vector_target() {
        let mut layer = SoftmaxLayer::new(1, 1, 2);
        let mut input = Vol::from_flat(&[1.0, 2.0]);
        layer.forward(&input);
        let err = layer
            .backward_loss(&mut input, &LossTarget::Vector(vec![1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, NetError::TargetMismatch { layer: "softmax", .. }));
    }

    #[test]
    fn test_regression_vector_target() {
        let mut layer = RegressionLayer::new(1, 1, 2);
        let mut input = Vol::from_flat(&[1.0, 3.0]);
        layer.forward(&input);
        let loss = layer
            .backward_loss(&mut input, &LossTarget::Vector(vec![0.0, 1.0]))
            .unwrap();
        assert!((loss - (0.5 + 2.0)).abs() < 1e-12);
        assert_eq!(input.dw, vec![1.0, 2.0]);
    }

    #[test]
    fn test_regression_single_dimension() {
        let mut layer = RegressionLayer::new(1, 1, 3);
        let mut input = Vol::from_flat(&[1.0, 2.0, 3.0]);
        layer.forward(&input);
        let loss = layer
            .backward_loss(&mut input, &LossTarget::Dim { dim: 2, val: 1.0 })
            .unwrap();
        assert!((loss - 2.0).abs() < 1e-12);
        assert_eq!(input.dw, vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_regression_scalar_regresses_dimension_zero() {
        let mut layer = RegressionLayer::new(1, 1, 2);
        let mut input = Vol::from_flat(&[2.0, 9.0]);
        layer.forward(&input);
        let loss = layer
            .backward_loss(&mut input, &LossTarget::Scalar(1.0))
            .unwrap();
        assert!((loss - 0.5).abs() < 1e-12);
        assert_eq!(input.dw, vec![1.0, 0.0]);
    }

    #[test]
    fn test_svm_satisfied_margins_give_zero_loss() {
        let mut layer = SvmLayer::new(1, 1, 3);
        let mut input = Vol::from_flat(&[5.0, 1.0, 0.0]);
        layer.forward(&input);
        let loss = layer
            .backward_loss(&mut input, &LossTarget::Class(0))
            .unwrap();
        assert_eq!(loss, 0.0);
        assert!(input.dw.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_svm_violated_margin() {
        let mut layer = SvmLayer::new(1, 1, 2);
        let mut input = Vol::from_flat(&[1.0, 1.5]);
        layer.forward(&input);
        let loss = layer
            .backward_loss(&mut input, &LossTarget::Class(0))
            .unwrap();
        // Margin violation: 1.5 - 1.0 + 1.0 = 1.5.
        assert!((loss - 1.5).abs() < 1e-12);
        assert_eq!(input.dw, vec![-1.0, 1.0]);
    }
}
