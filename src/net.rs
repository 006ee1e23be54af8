//! The network: an ordered pipeline of layers with forward and backward
//! passes over it.

use std::fs;
use std::path::Path;

use log::debug;

use crate::architecture::{desugar, LayerDef};
use crate::error::NetError;
use crate::json::NetJson;
use crate::layers::{Layer, LossTarget, ParamsAndGrads};
use crate::utils::SimpleRng;
use crate::vol::Vol;

/// A feed-forward network.
///
/// Layers are stored in pipeline order; layer `i + 1` reads layer `i`'s
/// output volume. The first layer is always `input` and the last is one of
/// the loss kinds, both enforced at construction.
///
/// # Examples
///
/// ```
/// use convnet::{LayerDef, LossTarget, Net, SimpleRng};
///
/// let mut input = LayerDef::of_type("input");
/// input.out_sx = Some(1);
/// input.out_sy = Some(1);
/// input.out_depth = Some(2);
///
/// let mut hidden = LayerDef::of_type("fc");
/// hidden.filters = Some(4);
/// hidden.activation = Some("tanh".to_string());
///
/// let mut loss = LayerDef::of_type("softmax");
/// loss.num_classes = Some(3);
///
/// let mut rng = SimpleRng::new(1);
/// let mut net = Net::new(&[input, hidden, loss], &mut rng).unwrap();
/// let x = convnet::Vol::from_flat(&[0.5, -1.3]);
/// let probs = net.forward(&x, false);
/// assert_eq!(probs.depth(), 3);
/// ```
#[derive(Debug)]
pub struct Net {
    layers: Vec<Layer>,
}

impl Net {
    /// Build a network from layer definitions.
    ///
    /// The definitions are desugared first, so shorthands like `activation`
    /// fields and implicit pre-loss `fc` layers are accepted. Weighted
    /// layers draw their initial weights from `rng`.
    pub fn new(defs: &[LayerDef], rng: &mut SimpleRng) -> Result<Net, NetError> {
        let defs = desugar(defs)?;

        let mut layers: Vec<Layer> = Vec::with_capacity(defs.len());
        let (mut in_sx, mut in_sy, mut in_depth) = (0, 0, 0);
        for (i, def) in defs.iter().enumerate() {
            let layer = Layer::from_def(def, i, in_sx, in_sy, in_depth, rng)?;
            debug!(
                "layer {}: {} -> {}x{}x{}",
                i,
                layer.kind(),
                layer.out_sx(),
                layer.out_sy(),
                layer.out_depth()
            );
            in_sx = layer.out_sx();
            in_sy = layer.out_sy();
            in_depth = layer.out_depth();
            layers.push(layer);
        }

        Ok(Net { layers })
    }

    /// The layers in pipeline order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Run the forward pass and return the output volume of the last layer.
    ///
    /// `is_training` only affects dropout layers; pass `false` for
    /// inference.
    pub fn forward(&mut self, input: &Vol, is_training: bool) -> &Vol {
        self.layers[0].forward(input, is_training);
        for i in 1..self.layers.len() {
            let (before, after) = self.layers.split_at_mut(i);
            after[0].forward(before[i - 1].out_act(), is_training);
        }
        self.layers[self.layers.len() - 1].out_act()
    }

    /// Run the backward pass for `target` and return the data loss.
    ///
    /// Must be called after [`Net::forward`]; gradients flow from the loss
    /// layer back to (but not into) the input layer.
    pub fn backward(&mut self, target: &LossTarget) -> Result<f64, NetError> {
        let n = self.layers.len();

        let (before, after) = self.layers.split_at_mut(n - 1);
        let loss = after[0].backward_loss(before[n - 2].out_act_mut(), target)?;

        // Input layer carries no gradient, so stop at index 1.
        for i in (1..n - 1).rev() {
            let (before, after) = self.layers.split_at_mut(i);
            after[0].backward(before[i - 1].out_act_mut());
        }

        Ok(loss)
    }

    /// Loss of `input` against `target` without a full backward pass.
    ///
    /// Runs forward in inference mode, then only the loss layer's backward.
    pub fn get_cost_loss(&mut self, input: &Vol, target: &LossTarget) -> Result<f64, NetError> {
        self.forward(input, false);
        let n = self.layers.len();
        let (before, after) = self.layers.split_at_mut(n - 1);
        after[0].backward_loss(before[n - 2].out_act_mut(), target)
    }

    /// All trainable parameter blocks across the network, in layer order.
    pub fn params_and_grads(&mut self) -> Vec<ParamsAndGrads<'_>> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.params_and_grads())
            .collect()
    }

    /// Index of the highest-probability class from the last forward pass.
    ///
    /// Only meaningful when the network ends in softmax; any other loss
    /// layer is an error.
    pub fn prediction(&self) -> Result<usize, NetError> {
        let last = &self.layers[self.layers.len() - 1];
        if !matches!(last, Layer::Softmax(_)) {
            return Err(NetError::PredictionNeedsSoftmax(last.kind().to_string()));
        }

        let probs = &last.out_act().w;
        let mut max_i = 0;
        let mut max_p = probs[0];
        for (i, &p) in probs.iter().enumerate().skip(1) {
            if p > max_p {
                max_p = p;
                max_i = i;
            }
        }
        Ok(max_i)
    }

    /// Serializable snapshot of the network: structure and weights, no
    /// gradients or transient state.
    pub fn to_json(&self) -> NetJson {
        NetJson {
            layers: self.layers.iter().map(Layer::to_json).collect(),
        }
    }

    /// Rebuild a network from a snapshot. Dropout layers draw their masks
    /// from `rng` on the next training forward pass.
    pub fn from_json(json: NetJson, rng: &mut SimpleRng) -> Net {
        Net {
            layers: json
                .layers
                .into_iter()
                .map(|layer| Layer::from_json(layer, rng))
                .collect(),
        }
    }

    /// Save the network snapshot as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NetError> {
        let text = serde_json::to_string_pretty(&self.to_json())?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Load a network snapshot saved by [`Net::save`].
    pub fn load<P: AsRef<Path>>(path: P, rng: &mut SimpleRng) -> Result<Net, NetError> {
        let text = fs::read_to_string(path)?;
        let json: NetJson = serde_json::from_str(&text)?;
        Ok(Net::from_json(json, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::LayerDef;

    fn input_def(sx: usize, sy: usize, depth: usize) -> LayerDef {
        let mut def = LayerDef::of_type("input");
        def.out_sx = Some(sx);
        def.out_sy = Some(sy);
        def.out_depth = Some(depth);
        def
    }

    fn fc_def(filters: usize, activation: Option<&str>) -> LayerDef {
        let mut def = LayerDef::of_type("fc");
        def.filters = Some(filters);
        def.activation = activation.map(str::to_string);
        def
    }

    fn softmax_def(classes: usize) -> LayerDef {
        let mut def = LayerDef::of_type("softmax");
        def.num_classes = Some(classes);
        def
    }

    fn tiny_classifier() -> Net {
        let mut rng = SimpleRng::new(7);
        Net::new(
            &[input_def(1, 1, 2), fc_def(4, Some("tanh")), softmax_def(3)],
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn test_desugared_layer_chain() {
        let net = tiny_classifier();
        let kinds: Vec<&str> = net.layers().iter().map(Layer::kind).collect();
        // fc + tanh, then the implicit fc in front of softmax.
        assert_eq!(kinds, vec!["input", "fc", "tanh", "fc", "softmax"]);
    }

    #[test]
    fn test_forward_produces_distribution() {
        let mut net = tiny_classifier();
        let x = Vol::from_flat(&[0.2, -0.3]);
        let probs = net.forward(&x, false);

        assert_eq!(probs.depth(), 3);
        let sum: f64 = probs.w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(probs.w.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn test_forward_is_deterministic_at_inference() {
        let mut net = tiny_classifier();
        let x = Vol::from_flat(&[0.2, -0.3]);
        let first = net.forward(&x, false).w.clone();
        let second = net.forward(&x, false).w.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_backward_returns_finite_loss() {
        let mut net = tiny_classifier();
        let x = Vol::from_flat(&[0.2, -0.3]);
        net.forward(&x, true);
        let loss = net.backward(&LossTarget::Class(1)).unwrap();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_backward_rejects_out_of_range_class() {
        let mut net = tiny_classifier();
        let x = Vol::from_flat(&[0.2, -0.3]);
        net.forward(&x, true);
        let err = net.backward(&LossTarget::Class(3)).unwrap_err();
        assert!(matches!(err, NetError::ClassOutOfRange { class: 3, classes: 3 }));
    }

    #[test]
    fn test_prediction_matches_argmax() {
        let mut net = tiny_classifier();
        let x = Vol::from_flat(&[0.2, -0.3]);
        let probs = net.forward(&x, false).w.clone();
        let expected = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(net.prediction().unwrap(), expected);
    }

    #[test]
    fn test_prediction_requires_softmax() {
        let mut rng = SimpleRng::new(7);
        let mut reg = LayerDef::of_type("regression");
        reg.num_classes = Some(2);
        let mut net =
            Net::new(&[input_def(1, 1, 2), fc_def(4, None), reg], &mut rng).unwrap();
        net.forward(&Vol::from_flat(&[0.2, -0.3]), false);
        assert!(matches!(
            net.prediction(),
            Err(NetError::PredictionNeedsSoftmax(_))
        ));
    }

    #[test]
    fn test_get_cost_loss_matches_backward_loss() {
        let mut net = tiny_classifier();
        let x = Vol::from_flat(&[0.2, -0.3]);
        let target = LossTarget::Class(0);

        let cost = net.get_cost_loss(&x, &target).unwrap();
        net.forward(&x, false);
        let full = net.backward(&target).unwrap();
        assert!((cost - full).abs() < 1e-12);
    }

    #[test]
    fn test_params_and_grads_counts_weighted_layers() {
        let mut net = tiny_classifier();
        // Two fc layers, each with per-neuron filters plus one bias block:
        // (4 + 1) + (3 + 1).
        assert_eq!(net.params_and_grads().len(), 9);
    }

    #[test]
    fn test_missing_field_is_reported_with_index() {
        let mut rng = SimpleRng::new(7);
        let bad_fc = LayerDef::of_type("fc");
        let err = Net::new(&[input_def(1, 1, 2), bad_fc, softmax_def(2)], &mut rng).unwrap_err();
        match err {
            NetError::MissingField { index, layer_type, field } => {
                assert_eq!(index, 1);
                assert_eq!(layer_type, "fc");
                assert_eq!(field, "filters");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
