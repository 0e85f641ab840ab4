use lenet_q::tensor::{Shape, Tensor, TensorI8};
use lenet_q::LenetError;

#[test]
fn tensor_get_set() {
    let mut t = Tensor::new(1, 2, 3, 4);
    t.set(0, 1, 2, 3, 42.0);
    assert_eq!(t.get(0, 1, 2, 3), 42.0);
    assert_eq!(t.as_slice()[23], 42.0);
}

#[test]
fn tensor_fill() {
    let mut t = Tensor::new(1, 1, 2, 2);
    t.fill(7.0);
    assert_eq!(t.get(0, 0, 0, 0), 7.0);
    assert_eq!(t.get(0, 0, 1, 1), 7.0);
}

#[test]
fn tensor_empty() {
    let t = Tensor::empty();
    assert!(t.is_empty());
}

#[test]
fn tensor_from_vec_checks_length() {
    let t = Tensor::from_vec(Shape::chw(1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(t.get(0, 0, 1, 0), 3.0);

    let err = Tensor::from_vec(Shape::chw(1, 2, 2), vec![1.0; 3]).unwrap_err();
    assert!(matches!(err, LenetError::ShapeMismatch { expected: 4, actual: 3, .. }));
}

#[test]
fn tensor_row_is_chw_flattening() {
    let mut k = Tensor::new(2, 2, 1, 2);
    k.set(1, 0, 0, 1, 5.0);
    k.set(1, 1, 0, 0, 6.0);
    assert_eq!(k.row(1), &[0.0, 5.0, 6.0, 0.0]);
}

#[test]
fn tensor_max_abs() {
    let t = Tensor::from_vec(Shape::chw(1, 1, 3), vec![0.5, -3.0, 2.0]).unwrap();
    assert_eq!(t.max_abs(), 3.0);
    assert_eq!(Tensor::new(1, 1, 2, 2).max_abs(), 0.0);
}

#[test]
fn tensor_display_shape() {
    let t = Tensor::new(1, 20, 24, 24);
    assert_eq!(t.to_string(), "1x20x24x24");
    assert_eq!(t.shape().numel(), 20 * 24 * 24);
}

#[test]
fn tensor_i8_get_set() {
    let mut t = TensorI8::new(1, 1, 2, 2);
    t.set(0, 0, 0, 0, 127);
    t.set(0, 0, 1, 1, -128);
    assert_eq!(t.get(0, 0, 0, 0), 127);
    assert_eq!(t.get(0, 0, 1, 1), -128);
    assert_eq!(t.memory_bytes(), 4);
}
