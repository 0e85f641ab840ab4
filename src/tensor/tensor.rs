use std::fmt;

use crate::error::{LenetError, Result};

/// Dimensions of a 4D tensor in NCHW order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub n: usize,
    pub c: usize,
    pub h: usize,
    pub w: usize,
}

impl Shape {
    pub const fn new(n: usize, c: usize, h: usize, w: usize) -> Self {
        Shape { n, c, h, w }
    }

    /// Shape of a single-sample activation map.
    pub const fn chw(c: usize, h: usize, w: usize) -> Self {
        Shape::new(1, c, h, w)
    }

    pub const fn numel(&self) -> usize {
        self.n * self.c * self.h * self.w
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}x{}", self.n, self.c, self.h, self.w)
    }
}

/// A 4D floating-point tensor.
///
/// Layout is NCHW. Activations use `n = 1`; kernels use `n` for the output
/// channels (or output features of a dense layer). The shape is fixed at
/// construction; only element values change afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub n: usize,
    pub c: usize,
    pub h: usize,
    pub w: usize,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(n: usize, c: usize, h: usize, w: usize) -> Self {
        Tensor {
            n,
            c,
            h,
            w,
            data: vec![0.0; n * c * h * w],
        }
    }

    pub fn zeros(shape: Shape) -> Self {
        Tensor::new(shape.n, shape.c, shape.h, shape.w)
    }

    pub fn empty() -> Self {
        Tensor::new(0, 0, 0, 0)
    }

    pub fn new1(n: usize) -> Self {
        Tensor::new(n, 1, 1, 1)
    }

    /// Wraps an existing buffer, checking that it matches the shape.
    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(LenetError::ShapeMismatch {
                what: "tensor data",
                expected: shape.numel(),
                actual: data.len(),
            });
        }
        Ok(Tensor {
            n: shape.n,
            c: shape.c,
            h: shape.h,
            w: shape.w,
            data,
        })
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.n, self.c, self.h, self.w)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn fill(&mut self, val: f32) {
        self.data.fill(val);
    }

    #[inline]
    fn index(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        n * self.c * self.h * self.w + c * self.h * self.w + h * self.w + w
    }

    #[inline]
    pub fn get(&self, n: usize, c: usize, h: usize, w: usize) -> f32 {
        self.data[self.index(n, c, h, w)]
    }

    #[inline]
    pub fn set(&mut self, n: usize, c: usize, h: usize, w: usize, val: f32) {
        let idx = self.index(n, c, h, w);
        self.data[idx] = val;
    }

    /// Row `n` of the tensor flattened in CHW order.
    ///
    /// For a dense-layer kernel this is the weight vector of output `n`.
    pub fn row(&self, n: usize) -> &[f32] {
        let stride = self.c * self.h * self.w;
        &self.data[n * stride..(n + 1) * stride]
    }

    /// Largest absolute value of any element, `0.0` for an empty tensor.
    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, v| m.max(v.abs()))
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}x{}", self.n, self.c, self.h, self.w)
    }
}
