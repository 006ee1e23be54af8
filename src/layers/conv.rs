//! Convolution layer.
//!
//! Slides `out_depth` filters of shape `(sx, sy, in_depth)` over the input
//! with configurable stride and symmetric zero padding. The output spatial
//! size is `floor((in + 2*pad - filter) / stride + 1)` per axis: a filter
//! application that would run off the padded input is dropped, never padded
//! further. Taps falling outside the input contribute nothing in either
//! direction, which is exactly the zero-padding semantics.

use crate::json::{LayerJson, VolJson};
use crate::layers::ParamsAndGrads;
use crate::utils::SimpleRng;
use crate::vol::Vol;

/// Convolution layer with learnable filters and per-channel biases.
#[derive(Debug)]
pub struct ConvLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,

    in_sx: usize,
    in_sy: usize,
    in_depth: usize,
    sx: usize,
    sy: usize,
    stride: usize,
    pad: isize,
    l1_decay_mul: f64,
    l2_decay_mul: f64,
    filters: Vec<Vol>,
    biases: Vol,
}

impl ConvLayer {
    /// Create a convolution layer.
    ///
    /// `out_depth` filters of shape `(sx, sy, in_depth)` are Gaussian
    /// initialized with variance `1/(sx*sy*in_depth)`; all biases start at
    /// `bias_pref`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
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
        bias_pref: f64,
        rng: &mut SimpleRng,
    ) -> Self {
        let out_sx =
            ((in_sx as isize + 2 * pad - sx as isize) / stride as isize + 1) as usize;
        let out_sy =
            ((in_sy as isize + 2 * pad - sy as isize) / stride as isize + 1) as usize;

        let filters = (0..out_depth)
            .map(|_| Vol::new(sx, sy, in_depth, rng))
            .collect();

        Self {
            out_sx,
            out_sy,
            out_depth,
            out_act: Vol::with_constant(out_sx, out_sy, out_depth, 0.0),
            in_sx,
            in_sy,
            in_depth,
            sx,
            sy,
            stride,
            pad,
            l1_decay_mul,
            l2_decay_mul,
            filters,
            biases: Vol::with_constant(1, 1, out_depth, bias_pref),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        let mut out = Vol::with_constant(self.out_sx, self.out_sy, self.out_depth, 0.0);

        for d in 0..self.out_depth {
            let filter = &self.filters[d];
            let mut y = -self.pad;
            for ay in 0..self.out_sy {
                let mut x = -self.pad;
                for ax in 0..self.out_sx {
                    let mut a = 0.0;
                    for fy in 0..self.sy {
                        let oy = y + fy as isize;
                        if oy < 0 || oy >= self.in_sy as isize {
                            continue;
                        }
                        for fx in 0..self.sx {
                            let ox = x + fx as isize;
                            if ox < 0 || ox >= self.in_sx as isize {
                                continue;
                            }
                            let fi = ((filter.sx() * fy) + fx) * self.in_depth;
                            let vi =
                                ((in_act.sx() * oy as usize) + ox as usize) * self.in_depth;
                            for fd in 0..self.in_depth {
                                a += filter.w[fi + fd] * in_act.w[vi + fd];
                            }
                        }
                    }
                    a += self.biases.w[d];
                    out.set(ax, ay, d, a);
                    x += self.stride as isize;
                }
                y += self.stride as isize;
            }
        }

        self.out_act = out;
    }

    pub fn backward(&mut self, in_act: &mut Vol) {
        in_act.zero_grads();

        for d in 0..self.out_depth {
            let filter = &mut self.filters[d];
            let mut y = -self.pad;
            for ay in 0..self.out_sy {
                let mut x = -self.pad;
                for ax in 0..self.out_sx {
                    let chain_grad = self.out_act.get_grad(ax, ay, d);
                    for fy in 0..self.sy {
                        let oy = y + fy as isize;
                        if oy < 0 || oy >= self.in_sy as isize {
                            continue;
                        }
                        for fx in 0..self.sx {
                            let ox = x + fx as isize;
                            if ox < 0 || ox >= self.in_sx as isize {
                                continue;
                            }
                            let fi = ((filter.sx() * fy) + fx) * self.in_depth;
                            let vi =
                                ((in_act.sx() * oy as usize) + ox as usize) * self.in_depth;
                            for fd in 0..self.in_depth {
                                filter.dw[fi + fd] += in_act.w[vi + fd] * chain_grad;
                                in_act.dw[vi + fd] += filter.w[fi + fd] * chain_grad;
                            }
                        }
                    }
                    self.biases.dw[d] += chain_grad;
                    x += self.stride as isize;
                }
                y += self.stride as isize;
            }
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
        LayerJson::Conv {
            in_sx: self.in_sx,
            in_sy: self.in_sy,
            in_depth: self.in_depth,
            sx: self.sx,
            sy: self.sy,
            out_depth: self.out_depth,
            stride: self.stride,
            pad: self.pad,
            l1_decay_mul: self.l1_decay_mul,
            l2_decay_mul: self.l2_decay_mul,
            filters: self.filters.iter().map(VolJson::from).collect(),
            biases: VolJson::from(&self.biases),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_json(
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
    ) -> Self {
        let out_sx =
            ((in_sx as isize + 2 * pad - sx as isize) / stride as isize + 1) as usize;
        let out_sy =
            ((in_sy as isize + 2 * pad - sy as isize) / stride as isize + 1) as usize;
        Self {
            out_sx,
            out_sy,
            out_depth,
            out_act: Vol::with_constant(out_sx, out_sy, out_depth, 0.0),
            in_sx,
            in_sy,
            in_depth,
            sx,
            sy,
            stride,
            pad,
            l1_decay_mul,
            l2_decay_mul,
            filters: filters.into_iter().map(VolJson::into_vol).collect(),
            biases: biases.into_vol(),
        }
    }
}
