//! Local response normalization layer.

use crate::json::LayerJson;
use crate::vol::Vol;

/// Across-channel local response normalization.
///
/// Each value is divided by `(k + (alpha / n) * S)^beta`, where `S` is the
/// sum of squares over a window of `n` channels centered on the value at the
/// same spatial position (radius `floor(n/2)`, clamped to the depth range).
/// The pre-exponent denominator `k + (alpha/n) * S` is cached per position
/// during forward so the backward pass can apply the analytic derivative
/// without recomputing the windows.
#[derive(Debug)]
pub struct LrnLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,

    k: f64,
    n: usize,
    alpha: f64,
    beta: f64,
    s_cache: Vol,
}

impl LrnLayer {
    pub fn new(
        in_sx: usize,
        in_sy: usize,
        in_depth: usize,
        k: f64,
        n: usize,
        alpha: f64,
        beta: f64,
    ) -> Self {
        Self {
            out_sx: in_sx,
            out_sy: in_sy,
            out_depth: in_depth,
            out_act: Vol::with_constant(in_sx, in_sy, in_depth, 0.0),
            k,
            n,
            alpha,
            beta,
            s_cache: Vol::with_constant(in_sx, in_sy, in_depth, 0.0),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = in_act.clone_and_zero();
        let n2 = (self.n / 2) as isize;

        for x in 0..in_act.sx() {
            for y in 0..in_act.sy() {
                for i in 0..in_act.depth() {
                    let ai = in_act.get(x, y, i);

                    let from = (i as isize - n2).max(0) as usize;
                    let to = ((i as isize + n2) as usize).min(in_act.depth() - 1);
                    let mut den = 0.0;
                    for j in from..=to {
                        let aj = in_act.get(x, y, j);
                        den += aj * aj;
                    }
                    den = self.k + den * self.alpha / self.n as f64;

                    self.s_cache.set(x, y, i, den);
                    out.set(x, y, i, ai / den.powf(self.beta));
                }
            }
        }

        self.out_act = out;
    }

    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();
        let n2 = (self.n / 2) as isize;

        for x in 0..in_act.sx() {
            for y in 0..in_act.sy() {
                for i in 0..in_act.depth() {
                    let chain_grad = self.out_act.get_grad(x, y, i);
                    let s = self.s_cache.get(x, y, i);
                    let sb = s.powf(self.beta);
                    let ai = in_act.get(x, y, i);

                    // d(a_i / S^beta) / d(a_j): the direct 1/S^beta term for
                    // j == i, plus the window term through S for every j.
                    in_act.add_grad(x, y, i, chain_grad / sb);

                    let scale =
                        -2.0 * self.beta * self.alpha / self.n as f64 * ai / (sb * s);
                    let from = (i as isize - n2).max(0) as usize;
                    let to = ((i as isize + n2) as usize).min(in_act.depth() - 1);
                    for j in from..=to {
                        let aj = in_act.get(x, y, j);
                        in_act.add_grad(x, y, j, chain_grad * scale * aj);
                    }
                }
            }
        }
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Lrn {
            out_sx: self.out_sx,
            out_sy: self.out_sy,
            out_depth: self.out_depth,
            k: self.k,
            n: self.n,
            alpha: self.alpha,
            beta: self.beta,
        }
    }

    pub(crate) fn from_json(
        out_sx: usize,
        out_sy: usize,
        out_depth: usize,
        k: f64,
        n: usize,
        alpha: f64,
        beta: f64,
    ) -> Self {
        Self::new(out_sx, out_sy, out_depth, k, n, alpha, beta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_normalizes_by_window() {
        // Window of 1 channel: out = x / (k + alpha*x^2)^beta.
        let mut layer = LrnLayer::new(1, 1, 1, 1.0, 1, 1.0, 0.5);
        let input = Vol::from_flat(&[3.0]);
        layer.forward(&input);
        let expected = 3.0 / (1.0f64 + 9.0).sqrt();
        assert!((layer.out_act.w[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_forward_preserves_shape() {
        let mut layer = LrnLayer::new(2, 2, 4, 2.0, 3, 1e-4, 0.75);
        let input = Vol::with_constant(2, 2, 4, 1.0);
        layer.forward(&input);
        assert_eq!(layer.out_act.sx(), 2);
        assert_eq!(layer.out_act.sy(), 2);
        assert_eq!(layer.out_act.depth(), 4);
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let mut layer = LrnLayer::new(1, 1, 5, 2.0, 3, 0.5, 0.75);
        let values = [0.4, -0.3, 0.8, 0.1, -0.6];
        let mut input = Vol::from_flat(&values);
        layer.forward(&input);

        // Loss = sum of outputs; upstream gradient is all ones.
        for g in &mut layer.out_act.dw {
            *g = 1.0;
        }
        layer.backward(&mut input);

        let eps = 1e-6;
        for i in 0..values.len() {
            let mut plus = values;
            plus[i] += eps;
            let mut minus = values;
            minus[i] -= eps;

            let mut lp = LrnLayer::new(1, 1, 5, 2.0, 3, 0.5, 0.75);
            lp.forward(&Vol::from_flat(&plus));
            let mut lm = LrnLayer::new(1, 1, 5, 2.0, 3, 0.5, 0.75);
            lm.forward(&Vol::from_flat(&minus));

            let sum_p: f64 = lp.out_act.w.iter().sum();
            let sum_m: f64 = lm.out_act.w.iter().sum();
            let numeric = (sum_p - sum_m) / (2.0 * eps);
            assert!(
                (input.dw[i] - numeric).abs() < 1e-5,
                "channel {}: analytic {} vs numeric {}",
                i,
                input.dw[i],
                numeric
            );
        }
    }
}
