use super::*;

#[test]
fn test_softmax_cross_entropy_uniform_logits() {
    let loss_fn = SoftmaxCrossEntropy::new();
    let logits = Array3::zeros((2, 3, 5));
    let targets = array![[0, 1, 2], [3, 4, 0]];

    let loss = loss_fn.compute_loss(targets.view(), logits.view()).unwrap();
    assert_relative_eq!(loss, (5.0f64).ln(), epsilon = 1e-12);
}

#[test]
fn test_softmax_cross_entropy_known_value() {
    let loss_fn = SoftmaxCrossEntropy::new();
    let logits = array![[[1.0, 2.0, 3.0]]];
    let targets = array![[2]];

    let expected = -(3.0f64.exp() / (1.0f64.exp() + 2.0f64.exp() + 3.0f64.exp())).ln();
    let loss = loss_fn.compute_loss(targets.view(), logits.view()).unwrap();
    assert_relative_eq!(loss, expected, epsilon = 1e-12);
}

#[test]
fn test_softmax_cross_entropy_large_logits_are_stable() {
    let loss_fn = SoftmaxCrossEntropy::new();
    let logits = array![[[1000.0, 0.0], [0.0, 1000.0]]];
    let targets = array![[0, 1]];

    let loss = loss_fn.compute_loss(targets.view(), logits.view()).unwrap();
    assert!(loss.is_finite());
    assert_abs_diff_eq!(loss, 0.0, epsilon = 1e-12);
}

#[test]
fn test_softmax_cross_entropy_gradient() {
    let loss_fn = SoftmaxCrossEntropy::new();
    let logits =
        Array3::from_shape_fn((2, 2, 4), |(b, t, c)| ((b * 8 + t * 4 + c) as f64 * 0.3).sin());
    let targets = array![[1, 3], [0, 2]];

    let grad = loss_fn.compute_grad(targets.view(), logits.view()).unwrap();
    assert_eq!(grad.dim(), logits.dim());

    // every position's gradient sums to zero
    for b in 0..2 {
        for t in 0..2 {
            assert_abs_diff_eq!(grad.slice(s![b, t, ..]).sum(), 0.0, epsilon = 1e-12);
        }
    }

    let epsilon = 1e-6;
    for (index, &analytic) in grad.indexed_iter() {
        let mut plus = logits.clone();
        plus[index] += epsilon;
        let mut minus = logits.clone();
        minus[index] -= epsilon;
        let numeric = (loss_fn.compute_loss(targets.view(), plus.view()).unwrap()
            - loss_fn.compute_loss(targets.view(), minus.view()).unwrap())
            / (2.0 * epsilon);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-8, max_relative = 1e-5);
    }
}

#[test]
fn test_softmax_cross_entropy_rejects_invalid_targets() {
    let loss_fn = SoftmaxCrossEntropy::new();
    let logits = Array3::zeros((1, 2, 3));

    let out_of_range = array![[0, 3]];
    assert!(matches!(
        loss_fn.compute_loss(out_of_range.view(), logits.view()),
        Err(ModelError::InputValidationError(_))
    ));

    let wrong_shape = array![[0, 1, 2]];
    assert!(matches!(
        loss_fn.compute_grad(wrong_shape.view(), logits.view()),
        Err(ModelError::InputValidationError(_))
    ));
}
