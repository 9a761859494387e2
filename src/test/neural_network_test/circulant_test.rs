use super::*;

fn sample_blocks(input_dim: usize, units: usize) -> (Array2<f64>, Array2<f64>) {
    let w_h = Array2::from_shape_fn((units, units), |(i, j)| (i * units + j) as f64 + 1.0);
    let w_x = Array2::from_shape_fn((input_dim, units), |(i, j)| -((i * units + j) as f64) - 1.0);
    (w_h, w_x)
}

#[test]
fn test_synthesize_block_size_one_is_identity() {
    let (w_h, w_x) = sample_blocks(2, 4);
    let derived = synthesize(w_h.view(), w_x.view(), 1).unwrap();

    assert_eq!(derived.dim(), (6, 4));
    assert_eq!(derived.slice(s![..2, ..]), w_x);
    assert_eq!(derived.slice(s![2.., ..]), w_h);
}

#[test]
fn test_synthesize_shape_for_every_divisor() {
    let (w_h, w_x) = sample_blocks(4, 8);
    for block_size in [1, 2, 4] {
        let derived = synthesize(w_h.view(), w_x.view(), block_size).unwrap();
        assert_eq!(derived.dim(), (12, 8));
    }
}

#[test]
fn test_synthesize_rotates_first_tile_row() {
    let w_h = array![
        [1.0, 2.0, 3.0, 4.0],
        [9.0, 9.0, 9.0, 9.0],
        [5.0, 6.0, 7.0, 8.0],
        [9.0, 9.0, 9.0, 9.0]
    ];
    let w_x = Array2::zeros((0, 4));
    let derived = synthesize(w_h.view(), w_x.view(), 2).unwrap();

    // rows below the first row of each tile are never read
    let expected = array![
        [1.0, 2.0, 3.0, 4.0],
        [2.0, 1.0, 4.0, 3.0],
        [5.0, 6.0, 7.0, 8.0],
        [6.0, 5.0, 8.0, 7.0]
    ];
    assert_eq!(derived, expected);
}

#[test]
fn test_synthesize_last_column_moves_to_front() {
    let w_h = array![
        [1.0, 2.0, 3.0],
        [0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0]
    ];
    let w_x = array![[4.0, 5.0, 6.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
    let derived = synthesize(w_h.view(), w_x.view(), 3).unwrap();

    assert_eq!(derived.row(0), array![4.0, 5.0, 6.0]);
    assert_eq!(derived.row(1), array![6.0, 4.0, 5.0]);
    assert_eq!(derived.row(2), array![5.0, 6.0, 4.0]);
    assert_eq!(derived.row(3), array![1.0, 2.0, 3.0]);
    assert_eq!(derived.row(4), array![3.0, 1.0, 2.0]);
    assert_eq!(derived.row(5), array![2.0, 3.0, 1.0]);
}

#[test]
fn test_accumulate_circulant_adds_to_buffer() {
    let (w_h, w_x) = sample_blocks(2, 4);
    let once = synthesize(w_h.view(), w_x.view(), 2).unwrap();

    let mut derived = Array2::zeros((6, 4));
    accumulate_circulant(w_h.view(), w_x.view(), 2, derived.view_mut()).unwrap();
    accumulate_circulant(w_h.view(), w_x.view(), 2, derived.view_mut()).unwrap();

    assert_eq!(derived, &once * 2.0);
}

#[test]
fn test_synthesize_rejects_non_dividing_block_size() {
    let (w_h, w_x) = sample_blocks(4, 6);

    assert!(matches!(
        synthesize(w_h.view(), w_x.view(), 4),
        Err(ModelError::UnsupportedParameter(_))
    ));
    assert!(matches!(
        synthesize(w_h.view(), w_x.view(), 0),
        Err(ModelError::UnsupportedParameter(_))
    ));
    // 3 divides the hidden block but not the 4 input rows
    assert!(matches!(
        synthesize(w_h.view(), w_x.view(), 3),
        Err(ModelError::UnsupportedParameter(_))
    ));
}

#[test]
fn test_synthesize_rejects_mismatched_blocks() {
    let w_h = Array2::zeros((4, 4));
    let w_x = Array2::zeros((2, 3));

    assert!(matches!(
        synthesize(w_h.view(), w_x.view(), 1),
        Err(ModelError::InputValidationError(_))
    ));

    let w_x = Array2::zeros((2, 4));
    let mut wrong = Array2::zeros((4, 4));
    assert!(matches!(
        accumulate_circulant(w_h.view(), w_x.view(), 1, wrong.view_mut()),
        Err(ModelError::InputValidationError(_))
    ));
}

#[test]
fn test_adjoint_matches_synthesis_inner_product() {
    let (input_dim, units, block_size) = (4, 8, 4);
    let w_h = Array2::from_shape_fn((units, units), |(i, j)| ((i * 3 + j) as f64 * 0.71).sin());
    let w_x = Array2::from_shape_fn((input_dim, units), |(i, j)| ((i * 5 + j) as f64 * 0.29).cos());
    let upstream = Array2::from_shape_fn((input_dim + units, units), |(i, j)| {
        ((i * 11 + j * 13) as f64 * 0.17).sin()
    });

    let derived = synthesize(w_h.view(), w_x.view(), block_size).unwrap();
    let lhs = (&derived * &upstream).sum();

    let mut grad_x = Array2::zeros((input_dim, units));
    let mut grad_h = Array2::zeros((units, units));
    accumulate_circulant_adjoint(
        upstream.slice(s![..input_dim, ..]),
        block_size,
        grad_x.view_mut(),
    )
    .unwrap();
    accumulate_circulant_adjoint(
        upstream.slice(s![input_dim.., ..]),
        block_size,
        grad_h.view_mut(),
    )
    .unwrap();
    let rhs = (&w_x * &grad_x).sum() + (&w_h * &grad_h).sum();

    assert_relative_eq!(lhs, rhs, epsilon = 1e-12);
}

#[test]
fn test_adjoint_only_touches_first_tile_rows() {
    let upstream = Array2::ones((4, 4));
    let mut grad = Array2::zeros((4, 4));
    accumulate_circulant_adjoint(upstream.view(), 2, grad.view_mut()).unwrap();

    let expected = array![
        [2.0, 2.0, 2.0, 2.0],
        [0.0, 0.0, 0.0, 0.0],
        [2.0, 2.0, 2.0, 2.0],
        [0.0, 0.0, 0.0, 0.0]
    ];
    assert_eq!(grad, expected);
}

#[test]
fn test_adjoint_rejects_shape_mismatch() {
    let upstream = Array2::ones((4, 4));
    let mut grad = Array2::zeros((4, 2));

    assert!(matches!(
        accumulate_circulant_adjoint(upstream.view(), 2, grad.view_mut()),
        Err(ModelError::InputValidationError(_))
    ));
}
