//! Max-pooling layer.

use crate::json::LayerJson;
use crate::vol::Vol;

/// Max pool over spatial windows, per channel.
///
/// The forward pass records the winning absolute input coordinate of every
/// output unit ("switch"), so the backward pass can route gradients in O(1)
/// per unit. Gradients are accumulated at the winners rather than assigned:
/// with stride smaller than the window size, pooling windows overlap and a
/// single input position can win several of them.
#[derive(Debug)]
pub struct PoolLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,

    in_sx: usize,
    in_sy: usize,
    sx: usize,
    sy: usize,
    stride: usize,
    pad: isize,
    switch_x: Vec<usize>,
    switch_y: Vec<usize>,
}

impl PoolLayer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        in_sx: usize,
        in_sy: usize,
        in_depth: usize,
        sx: usize,
        sy: usize,
        stride: usize,
        pad: isize,
    ) -> Self {
        let out_sx =
            ((in_sx as isize + 2 * pad - sx as isize) / stride as isize + 1) as usize;
        let out_sy =
            ((in_sy as isize + 2 * pad - sy as isize) / stride as isize + 1) as usize;
        let out_len = out_sx * out_sy * in_depth;

        Self {
            out_sx,
            out_sy,
            out_depth: in_depth,
            out_act: Vol::with_constant(out_sx, out_sy, in_depth, 0.0),
            in_sx,
            in_sy,
            sx,
            sy,
            stride,
            pad,
            switch_x: vec![0; out_len],
            switch_y: vec![0; out_len],
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = Vol::with_constant(self.out_sx, self.out_sy, self.out_depth, 0.0);

        let mut n = 0;
        for d in 0..self.out_depth {
            let mut x = -self.pad;
            for ax in 0..self.out_sx {
                let mut y = -self.pad;
                for ay in 0..self.out_sy {
                    let mut best = f64::NEG_INFINITY;
                    let mut win_x = 0usize;
                    let mut win_y = 0usize;
                    for fx in 0..self.sx {
                        for fy in 0..self.sy {
                            let ox = x + fx as isize;
                            let oy = y + fy as isize;
                            if oy >= 0
                                && oy < in_act.sy() as isize
                                && ox >= 0
                                && ox < in_act.sx() as isize
                            {
                                let v = in_act.get(ox as usize, oy as usize, d);
                                if v > best {
                                    best = v;
                                    win_x = ox as usize;
                                    win_y = oy as usize;
                                }
                            }
                        }
                    }
                    self.switch_x[n] = win_x;
                    self.switch_y[n] = win_y;
                    n += 1;
                    out.set(ax, ay, d, best);
                    y += self.stride as isize;
                }
                x += self.stride as isize;
            }
        }

        self.out_act = out;
    }

    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();

        let mut n = 0;
        for d in 0..self.out_depth {
            for ax in 0..self.out_sx {
                for ay in 0..self.out_sy {
                    let chain_grad = self.out_act.get_grad(ax, ay, d);
                    in_act.add_grad(self.switch_x[n], self.switch_y[n], d, chain_grad);
                    n += 1;
                }
            }
        }
    }

    pub(crate) fn to_json(&self) -> LayerJson {
        LayerJson::Pool {
            in_sx: self.in_sx,
            in_sy: self.in_sy,
            in_depth: self.out_depth,
            sx: self.sx,
            sy: self.sy,
            stride: self.stride,
            pad: self.pad,
        }
    }
}
