use super::*;

#[test]
fn test_embedding_forward_looks_up_rows() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut embedding = Embedding::new(5, 3, 0.1, &mut rng).unwrap();
    let table = Array2::from_shape_fn((5, 3), |(v, d)| (v * 10 + d) as f64);
    embedding.set_weights(table.clone()).unwrap();

    let tokens = array![[0, 4, 2], [1, 1, 3]];
    let output = embedding.forward(tokens.view()).unwrap();

    assert_eq!(output.dim(), (2, 3, 3));
    assert_eq!(output.slice(s![0, 1, ..]), table.row(4));
    assert_eq!(output.slice(s![1, 2, ..]), table.row(3));
}

#[test]
fn test_embedding_backward_accumulates_repeated_tokens() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut embedding = Embedding::new(4, 2, 0.1, &mut rng).unwrap();
    let tokens = array![[1, 1], [3, 1]];
    let grad = Array3::ones((2, 2, 2));

    embedding.forward(tokens.view()).unwrap();
    embedding.backward(tokens.view(), grad.view()).unwrap();

    let expected = array![[0.0, 0.0], [3.0, 3.0], [0.0, 0.0], [1.0, 1.0]];
    assert_eq!(embedding.grad_weight(), &expected);

    embedding.zero_gradients();
    assert!(embedding.grad_weight().iter().all(|&g| g == 0.0));
}

#[test]
fn test_embedding_rejects_out_of_vocabulary_token() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut embedding = Embedding::new(4, 2, 0.1, &mut rng).unwrap();
    let tokens = array![[0, 4]];

    assert!(matches!(
        embedding.forward(tokens.view()),
        Err(ModelError::InputValidationError(_))
    ));
}

#[test]
fn test_embedding_rejects_invalid_construction() {
    let mut rng = StdRng::seed_from_u64(3);
    assert!(Embedding::new(0, 2, 0.1, &mut rng).is_err());
    assert!(Embedding::new(4, 2, f64::NAN, &mut rng).is_err());

    let mut embedding = Embedding::new(4, 2, 0.1, &mut rng).unwrap();
    assert!(embedding.set_weights(Array2::zeros((2, 4))).is_err());
}

#[test]
fn test_embedding_init_range() {
    let mut rng = StdRng::seed_from_u64(3);
    let embedding = Embedding::new(16, 8, 0.08, &mut rng).unwrap();
    assert!(embedding.weight().iter().all(|w| w.abs() <= 0.08));
    assert_eq!(embedding.param_count(), 128);
}
