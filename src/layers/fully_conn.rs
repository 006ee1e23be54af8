//! Fully connected layer.

use crate::json::{LayerJson, VolJson};
use crate::layers::ParamsAndGrads;
use crate::utils::SimpleRng;
use crate::vol::Vol;

/// Dense layer: flattens its input to `num_inputs` values and computes one
/// full dot product per output unit, plus a bias.
#[derive(Debug)]
pub struct FullyConnLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,

    num_inputs: usize,
    l1_decay_mul: f64,
    l2_decay_mul: f64,
    filters: Vec<Vol>,
    biases: Vol,
}

impl FullyConnLayer {
    /// Create a fully connected layer with `out_depth` units over a
    /// flattened input of `in_sx * in_sy * in_depth` values.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        in_sx: usize,
        in_sy: usize,
        in_depth: usize,
        out_depth: usize,
        l1_decay_mul: f64,
        l2_decay_mul: f64,
        bias_pref: f64,
        rng: &mut SimpleRng,
    ) -> Self {
        let num_inputs = in_sx * in_sy * in_depth;
        let filters = (0..out_depth)
            .map(|_| Vol::new(1, 1, num_inputs, rng))
            .collect();

        Self {
            out_sx: 1,
            out_sy: 1,
            out_depth,
            out_act: Vol::with_constant(1, 1, out_depth, 0.0),
            num_inputs,
            l1_decay_mul,
            l2_decay_mul,
            filters,
            biases: Vol::with_constant(1, 1, out_depth, bias_pref),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = Vol::with_constant(1, 1, self.out_depth, 0.0);
        for i in 0..self.out_depth {
            let filter = &self.filters[i];
            let mut a = 0.0;
            for d in 0..self.num_inputs {
                a += in_act.w[d] * filter.w[d];
            }
            a += self.biases.w[i];
            out.w[i] = a;
        }
        self.out_act = out;
    }

    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();

        for i in 0..self.out_depth {
            let filter = &mut self.filters[i];
            let chain_grad = self.out_act.dw[i];
            for d in 0..self.num_inputs {
                in_act.dw[d] += filter.w[d] * chain_grad;
                filter.dw[d] += in_act.w[d] * chain_grad;
            }
            self.biases.dw[i] += chain_grad;
        }
    }

    pub fn params_and_grads(&mut self) -> Vec<ParamsAndGrads<'_>> {
        let (l1, l2) = (self.l1_decay_mul, self.l2_decay_mul);
        let mut out: Vec<ParamsAndGrads<'_>> = self
            .filters
            .iter_mut()
            .map(|f| ParamsAndGrads {
                params: &mut f.w,
                grads: &mut f.dw,
                l1_decay_mul: l1,
                l2_decay_mul: l2,
            })
            .collect();
        out.push(ParamsAndGrads {
            params: &mut self.biases.w,
            grads: &mut self.biases.dw,
            l1_decay_mul: 0.0,
            l2_decay_mul: 0.0,
        });
        out
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Fc {
            num_inputs: self.num_inputs,
            out_depth: self.out_depth,
            l1_decay_mul: self.l1_decay_mul,
            l2_decay_mul: self.l2_decay_mul,
            filters: self.filters.iter().map(VolJson::from).collect(),
            biases: VolJson::from(&self.biases),
        }
    }

    pub(crate) fn from_json(
        num_inputs: usize,
        out_depth: usize,
        l1_decay_mul: f64,
        l2_decay_mul: f64,
        filters: Vec<VolJson>,
        biases: VolJson,
    ) -> Self {
        Self {
            out_sx: 1,
            out_sy: 1,
            out_depth,
            out_act: Vol::with_constant(1, 1, out_depth, 0.0),
            num_inputs,
            l1_decay_mul,
            l2_decay_mul,
            filters: filters.into_iter().map(VolJson::into_vol).collect(),
            biases: biases.into_vol(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_dot_product() {
        let mut rng = SimpleRng::new(42);
        let mut layer = FullyConnLayer::new(1, 1, 3, 2, 0.0, 1.0, 0.0, &mut rng);
        layer.filters[0].w.copy_from_slice(&[1.0, 2.0, 3.0]);
        layer.filters[1].w.copy_from_slice(&[-1.0, 0.0, 1.0]);
        layer.biases.w.copy_from_slice(&[0.5, -0.5]);

        let input = Vol::from_flat(&[1.0, 1.0, 1.0]);
        layer.forward(&input);
        assert_eq!(layer.out_act.w, vec![6.5, -0.5]);
    }

    #[test]
    fn test_backward_gradients() {
        let mut rng = SimpleRng::new(42);
        let mut layer = FullyConnLayer::new(1, 1, 2, 1, 0.0, 1.0, 0.0, &mut rng);
        layer.filters[0].w.copy_from_slice(&[2.0, -3.0]);

        let mut input = Vol::from_flat(&[4.0, 5.0]);
        layer.forward(&input);
        layer.out_act.dw[0] = 1.0;
        layer.backward(&mut input);

        // dL/dx = filter weight, dL/dw = input value, dL/db = chain.
        assert_eq!(input.dw, vec![2.0, -3.0]);
        assert_eq!(layer.filters[0].dw, vec![4.0, 5.0]);
        assert_eq!(layer.biases.dw[0], 1.0);
    }

    #[test]
    fn test_flattens_spatial_input() {
        let mut rng = SimpleRng::new(42);
        let layer = FullyConnLayer::new(3, 3, 2, 4, 0.0, 1.0, 0.0, &mut rng);
        assert_eq!(layer.num_inputs, 18);
        assert_eq!(layer.filters[0].len(), 18);
        assert_eq!(layer.out_sx, 1);
        assert_eq!(layer.out_sy, 1);
        assert_eq!(layer.out_depth, 4);
    }
}
