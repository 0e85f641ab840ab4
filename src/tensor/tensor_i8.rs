use std::fmt;

use super::Shape;

/// A 4D INT8 tensor holding quantized values.
///
/// Layout is NCHW, identical to [`super::Tensor`], so the same `(n, c, h, w)`
/// coordinates address matching elements in the float and quantized copies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorI8 {
    pub n: usize,
    pub c: usize,
    pub h: usize,
    pub w: usize,
    pub data: Vec<i8>,
}

impl TensorI8 {
    pub fn new(n: usize, c: usize, h: usize, w: usize) -> Self {
        TensorI8 {
            n,
            c,
            h,
            w,
            data: vec![0i8; n * c * h * w],
        }
    }

    pub fn zeros(shape: Shape) -> Self {
        Self::new(shape.n, shape.c, shape.h, shape.w)
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.n, self.c, self.h, self.w)
    }

    #[inline]
    pub fn get(&self, n: usize, c: usize, h: usize, w: usize) -> i8 {
        let idx = n * self.c * self.h * self.w + c * self.h * self.w + h * self.w + w;
        self.data[idx]
    }

    #[inline]
    pub fn set(&mut self, n: usize, c: usize, h: usize, w: usize, val: i8) {
        let idx = n * self.c * self.h * self.w + c * self.h * self.w + h * self.w + w;
        self.data[idx] = val;
    }

    pub fn row(&self, n: usize) -> &[i8] {
        let stride = self.c * self.h * self.w;
        &self.data[n * stride..(n + 1) * stride]
    }

    pub fn fill(&mut self, val: i8) {
        self.data.fill(val);
    }

    pub fn memory_bytes(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Display for TensorI8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}x{} (i8)", self.n, self.c, self.h, self.w)
    }
}
