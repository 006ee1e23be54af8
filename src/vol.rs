//! 3-D activation volume.
//!
//! A `Vol` is the unit of data that flows through the network: a `sx` × `sy`
//! × `depth` block of activations stored flat, with a parallel gradient
//! buffer of the same shape. Every layer reads its input's `w` during the
//! forward pass and writes into its input's `dw` during the backward pass.

use crate::utils::SimpleRng;

/// 3-D volume of activations plus gradients.
///
/// Values are stored depth-minor: the flat index of `(x, y, d)` is
/// `((sx * y) + x) * depth + d`. All layers rely on this layout.
///
/// # Example
///
/// ```
/// use convnet::Vol;
///
/// let mut v = Vol::with_constant(3, 3, 2, 0.0);
/// v.set(1, 2, 0, 5.0);
/// assert_eq!(v.get(1, 2, 0), 5.0);
/// assert_eq!(v.len(), 18);
/// ```
#[derive(Debug)]
pub struct Vol {
    sx: usize,
    sy: usize,
    depth: usize,
    /// Activation values.
    pub w: Vec<f64>,
    /// Gradients with respect to the same positions.
    pub dw: Vec<f64>,
}

impl Vol {
    /// Create a volume with Gaussian-initialized weights.
    ///
    /// Each weight is drawn from N(0, 1/n) where n is the total number of
    /// values in the volume, so that the variance of a unit fed by this
    /// volume stays roughly constant regardless of its size.
    pub fn new(sx: usize, sy: usize, depth: usize, rng: &mut SimpleRng) -> Self {
        let n = sx * sy * depth;
        let scale = (1.0 / n as f64).sqrt();
        let mut w = vec![0.0; n];
        for value in &mut w {
            *value = rng.randn(0.0, scale);
        }
        Self {
            sx,
            sy,
            depth,
            w,
            dw: vec![0.0; n],
        }
    }

    /// Create a volume filled with a constant value.
    pub fn with_constant(sx: usize, sy: usize, depth: usize, c: f64) -> Self {
        let n = sx * sy * depth;
        Self {
            sx,
            sy,
            depth,
            w: vec![c; n],
            dw: vec![0.0; n],
        }
    }

    /// Create a volume from an explicit weight vector.
    ///
    /// # Panics
    ///
    /// Panics if `w.len() != sx * sy * depth`.
    pub fn from_weights(sx: usize, sy: usize, depth: usize, w: Vec<f64>) -> Self {
        assert_eq!(
            w.len(),
            sx * sy * depth,
            "weight vector length does not match volume dimensions"
        );
        let n = w.len();
        Self {
            sx,
            sy,
            depth,
            w,
            dw: vec![0.0; n],
        }
    }

    /// Create a 1×1×n volume from a flat list of values.
    pub fn from_flat(values: &[f64]) -> Self {
        Self::from_weights(1, 1, values.len(), values.to_vec())
    }

    /// Width of the volume.
    pub fn sx(&self) -> usize {
        self.sx
    }

    /// Height of the volume.
    pub fn sy(&self) -> usize {
        self.sy
    }

    /// Depth (number of channels) of the volume.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Total number of values.
    pub fn len(&self) -> usize {
        self.w.len()
    }

    /// Whether the volume holds no values.
    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    #[inline]
    fn index(&self, x: usize, y: usize, d: usize) -> usize {
        ((self.sx * y) + x) * self.depth + d
    }

    /// Read the activation at `(x, y, d)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize, d: usize) -> f64 {
        self.w[self.index(x, y, d)]
    }

    /// Write the activation at `(x, y, d)`.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, d: usize, v: f64) {
        let ix = self.index(x, y, d);
        self.w[ix] = v;
    }

    /// Add into the activation at `(x, y, d)`.
    #[inline]
    pub fn add(&mut self, x: usize, y: usize, d: usize, v: f64) {
        let ix = self.index(x, y, d);
        self.w[ix] += v;
    }

    /// Read the gradient at `(x, y, d)`.
    #[inline]
    pub fn get_grad(&self, x: usize, y: usize, d: usize) -> f64 {
        self.dw[self.index(x, y, d)]
    }

    /// Write the gradient at `(x, y, d)`.
    #[inline]
    pub fn set_grad(&mut self, x: usize, y: usize, d: usize, v: f64) {
        let ix = self.index(x, y, d);
        self.dw[ix] = v;
    }

    /// Add into the gradient at `(x, y, d)`.
    #[inline]
    pub fn add_grad(&mut self, x: usize, y: usize, d: usize, v: f64) {
        let ix = self.index(x, y, d);
        self.dw[ix] += v;
    }

    /// Copy of this volume with the same activations and a zeroed gradient
    /// buffer.
    pub fn clone_with_zeroed_grads(&self) -> Vol {
        Vol {
            sx: self.sx,
            sy: self.sy,
            depth: self.depth,
            w: self.w.clone(),
            dw: vec![0.0; self.w.len()],
        }
    }

    /// Volume of the same shape with zeroed activations and gradients.
    pub fn clone_and_zero(&self) -> Vol {
        Vol::with_constant(self.sx, self.sy, self.depth, 0.0)
    }

    /// Reset all gradients to zero.
    pub fn zero_grads(&mut self) {
        for g in &mut self.dw {
            *g = 0.0;
        }
    }
}
