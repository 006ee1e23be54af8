//! Maxout layer.

use crate::json::LayerJson;
use crate::vol::Vol;

/// Maxout nonlinearity: partitions the input channels into groups of
/// `group_size` consecutive channels and forwards the maximum of each group,
/// so `out_depth = floor(in_depth / group_size)`.
///
/// The winning flat input index of every output unit is recorded during
/// forward and the backward pass routes the entire upstream gradient to that
/// index alone. The same position-by-position scan is used for every spatial
/// size, so 1×1 volumes take no special path.
#[derive(Debug)]
pub struct MaxoutLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,

    in_depth: usize,
    group_size: usize,
    switches: Vec<usize>,
}

impl MaxoutLayer {
    pub fn new(in_sx: usize, in_sy: usize, in_depth: usize, group_size: usize) -> Self {
        let out_depth = in_depth / group_size;
        Self {
            out_sx: in_sx,
            out_sy: in_sy,
            out_depth,
            out_act: Vol::with_constant(in_sx, in_sy, out_depth, 0.0),
            in_depth,
            group_size,
            switches: vec![0; in_sx * in_sy * out_depth],
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = Vol::with_constant(self.out_sx, self.out_sy, self.out_depth, 0.0);

        let mut n = 0;
        for y in 0..self.out_sy {
            for x in 0..self.out_sx {
                for i in 0..self.out_depth {
                    let base = ((in_act.sx() * y) + x) * self.in_depth + i * self.group_size;
                    let mut best = in_act.w[base];
                    let mut win = base;
                    for j in 1..self.group_size {
                        let v = in_act.w[base + j];
                        if v > best {
                            best = v;
                            win = base + j;
                        }
                    }
                    out.set(x, y, i, best);
                    self.switches[n] = win;
                    n += 1;
                }
            }
        }

        self.out_act = out;
    }

    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();

        let mut n = 0;
        for y in 0..self.out_sy {
            for x in 0..self.out_sx {
                for i in 0..self.out_depth {
                    let chain_grad = self.out_act.get_grad(x, y, i);
                    in_act.dw[self.switches[n]] = chain_grad;
                    n += 1;
                }
            }
        }
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Maxout {
            out_sx: self.out_sx,
            out_sy: self.out_sy,
            in_depth: self.in_depth,
            group_size: self.group_size,
        }
    }
}
