mod tensor;
mod tensor_i8;

pub use tensor::{Shape, Tensor};
pub use tensor_i8::TensorI8;
