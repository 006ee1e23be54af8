//! Numerical gradient checks for the analytic backward passes.
//!
//! Each check runs a full forward/backward to collect analytic parameter
//! gradients, then compares them against central finite differences of the
//! loss. Architectures here use smooth nonlinearities so the finite
//! differences are well behaved.

use convnet::{LayerDef, LossTarget, Net, SimpleRng, Vol};

const EPS: f64 = 1e-5;
const TOL: f64 = 1e-4;

fn input_def(sx: usize, sy: usize, depth: usize) -> LayerDef {
    let mut def = LayerDef::of_type("input");
    def.out_sx = Some(sx);
    def.out_sy = Some(sy);
    def.out_depth = Some(depth);
    def
}

/// Compare analytic parameter gradients against central differences.
fn check_param_gradients(net: &mut Net, x: &Vol, target: &LossTarget) {
    net.forward(x, false);
    net.backward(target).unwrap();

    let analytic: Vec<Vec<f64>> = net
        .params_and_grads()
        .iter()
        .map(|b| b.grads.to_vec())
        .collect();

    for bi in 0..analytic.len() {
        for j in 0..analytic[bi].len() {
            let original = net.params_and_grads()[bi].params[j];

            net.params_and_grads()[bi].params[j] = original + EPS;
            let loss_plus = net.get_cost_loss(x, target).unwrap();

            net.params_and_grads()[bi].params[j] = original - EPS;
            let loss_minus = net.get_cost_loss(x, target).unwrap();

            net.params_and_grads()[bi].params[j] = original;

            let numeric = (loss_plus - loss_minus) / (2.0 * EPS);
            let diff = (numeric - analytic[bi][j]).abs();
            assert!(
                diff < TOL,
                "block {bi} param {j}: analytic {} vs numeric {numeric}",
                analytic[bi][j]
            );
        }
    }
}

#[test]
fn fc_softmax_gradients_match_finite_differences() {
    let mut rng = SimpleRng::new(11);

    let mut hidden = LayerDef::of_type("fc");
    hidden.filters = Some(5);
    hidden.activation = Some("tanh".to_string());

    let mut loss = LayerDef::of_type("softmax");
    loss.num_classes = Some(3);

    let mut net = Net::new(&[input_def(1, 1, 4), hidden, loss], &mut rng).unwrap();

    let x = Vol::from_flat(&[0.4, -0.7, 0.1, 0.9]);
    check_param_gradients(&mut net, &x, &LossTarget::Class(2));
}

#[test]
fn conv_pool_softmax_gradients_match_finite_differences() {
    let mut rng = SimpleRng::new(23);

    let mut conv = LayerDef::of_type("conv");
    conv.sx = Some(3);
    conv.filters = Some(2);
    conv.stride = Some(1);
    conv.pad = Some(1);
    conv.activation = Some("sigmoid".to_string());

    let mut pool = LayerDef::of_type("pool");
    pool.sx = Some(2);
    pool.stride = Some(2);

    let mut loss = LayerDef::of_type("softmax");
    loss.num_classes = Some(2);

    let mut net = Net::new(&[input_def(4, 4, 1), conv, pool, loss], &mut rng).unwrap();

    let mut weights = Vec::with_capacity(16);
    let mut gen = SimpleRng::new(99);
    for _ in 0..16 {
        weights.push(gen.gen_range_f64(-1.0, 1.0));
    }
    let x = Vol::from_weights(4, 4, 1, weights);
    check_param_gradients(&mut net, &x, &LossTarget::Class(0));
}

#[test]
fn fc_regression_gradients_match_finite_differences() {
    let mut rng = SimpleRng::new(31);

    let mut hidden = LayerDef::of_type("fc");
    hidden.filters = Some(4);
    hidden.activation = Some("sigmoid".to_string());

    let mut loss = LayerDef::of_type("regression");
    loss.num_classes = Some(2);

    let mut net = Net::new(&[input_def(1, 1, 3), hidden, loss], &mut rng).unwrap();

    let x = Vol::from_flat(&[0.5, -0.2, 0.8]);
    let target = LossTarget::Vector(vec![0.3, -0.4]);
    check_param_gradients(&mut net, &x, &target);
}

#[test]
fn fc_svm_gradients_match_finite_differences() {
    let mut rng = SimpleRng::new(47);

    let mut hidden = LayerDef::of_type("fc");
    hidden.filters = Some(6);
    hidden.activation = Some("tanh".to_string());

    let mut loss = LayerDef::of_type("svm");
    loss.num_classes = Some(3);

    let mut net = Net::new(&[input_def(1, 1, 2), hidden, loss], &mut rng).unwrap();

    // Margins are piecewise linear; this input sits away from the hinge
    // points for this seed, so the finite differences stay clean.
    let x = Vol::from_flat(&[0.6, -0.9]);
    check_param_gradients(&mut net, &x, &LossTarget::Class(1));
}

#[test]
fn lrn_gradients_match_finite_differences() {
    let mut rng = SimpleRng::new(53);

    let mut conv = LayerDef::of_type("conv");
    conv.sx = Some(1);
    conv.filters = Some(4);
    conv.activation = Some("sigmoid".to_string());

    let mut lrn = LayerDef::of_type("lrn");
    lrn.k = Some(2.0);
    lrn.n = Some(3);
    lrn.alpha = Some(1.0);
    lrn.beta = Some(0.75);

    let mut loss = LayerDef::of_type("softmax");
    loss.num_classes = Some(2);

    let mut net = Net::new(&[input_def(2, 2, 1), conv, lrn, loss], &mut rng).unwrap();

    let x = Vol::from_weights(2, 2, 1, vec![0.4, -0.1, 0.7, 0.2]);
    check_param_gradients(&mut net, &x, &LossTarget::Class(1));
}
