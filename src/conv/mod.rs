//! Direct 2D convolution in FP32 and dynamically calibrated INT8.
//!
//! Both variants share one sliding-window scan: out-of-range input
//! coordinates are skipped rather than read from a padded copy, so zero
//! padding costs nothing and the two paths agree on every output shape.

mod naive;
mod quantized;

use serde::{Deserialize, Serialize};

pub use naive::conv2d;
pub use quantized::{conv2d_i8, conv2d_i8_accumulate};

/// How a convolution pads its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaddingMode {
    /// A fixed pad amount on every spatial edge.
    Legacy { pad: usize },
    /// `(kernel_size - 1) / 2`, preserving spatial size at stride 1 for odd kernels.
    Same,
}

impl PaddingMode {
    pub fn pad(&self, kernel_size: usize) -> usize {
        match *self {
            PaddingMode::Legacy { pad } => pad,
            PaddingMode::Same => kernel_size.saturating_sub(1) / 2,
        }
    }
}

impl Default for PaddingMode {
    fn default() -> Self {
        PaddingMode::Legacy { pad: 0 }
    }
}

/// `floor((input + 2 * pad - kernel) / stride) + 1`, or 0 when the kernel
/// does not fit in the padded input or the padded size overflows `usize`.
pub fn conv_output_size(input: usize, kernel_size: usize, stride: usize, pad: usize) -> usize {
    let Some(padded) = pad.checked_mul(2).and_then(|p| input.checked_add(p)) else {
        return 0;
    };
    if stride == 0 || kernel_size == 0 || padded < kernel_size {
        return 0;
    }
    (padded - kernel_size) / stride + 1
}

/// Input coordinate read by kernel tap `k` of output position `o`, if it
/// lies inside `[0, len)`.
#[inline]
pub(crate) fn tap(o: usize, k: usize, stride: usize, pad: usize, len: usize) -> Option<usize> {
    let pos = (o * stride + k).checked_sub(pad)?;
    (pos < len).then_some(pos)
}
