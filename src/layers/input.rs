//! Input layer: presents the external volume to the rest of the pipeline.

use crate::vol::Vol;

/// First layer of every network; copies the presented volume into its output
/// slot and does nothing on the backward pass.
#[derive(Debug)]
pub struct InputLayer {
    pub(crate) out_sx: usize,
    pub(crate) out_sy: usize,
    pub(crate) out_depth: usize,
    pub(crate) out_act: Vol,
}

impl InputLayer {
    pub fn new(out_sx: usize, out_sy: usize, out_depth: usize) -> Self {
        Self {
            out_sx,
            out_sy,
            out_depth,
            out_act: Vol::with_constant(out_sx, out_sy, out_depth, 0.0),
        }
    }

    pub fn forward(&mut self, in_act: &Vol) {
        self.out_act = in_act.clone_with_zeroed_grads();
    }
}
