use super::*;

#[test]
fn test_adam_new_validation() {
    assert!(Adam::new(0.001, 0.9, 0.999, 1e-8).is_ok());
    assert!(Adam::new(0.0, 0.9, 0.999, 1e-8).is_err());
    assert!(Adam::new(-0.001, 0.9, 0.999, 1e-8).is_err());
    assert!(Adam::new(0.001, 1.0, 0.999, 1e-8).is_err());
    assert!(Adam::new(0.001, 0.9, -0.1, 1e-8).is_err());
    assert!(Adam::new(0.001, 0.9, 0.999, 0.0).is_err());
    assert!(Adam::new(f64::NAN, 0.9, 0.999, 1e-8).is_err());
}

#[test]
fn test_adam_step_sequence() {
    let mut adam = Adam::new(0.01, 0.9, 0.999, 1e-8).unwrap();
    let mut params = array![1.0, 2.0, 3.0];
    let grads = array![0.1, -0.2, 0.0];

    adam.step(params.view_mut(), grads.view()).unwrap();
    adam.step(params.view_mut(), grads.view()).unwrap();

    assert_eq!(adam.timestep(), 2);
    // a constant gradient keeps the bias-corrected ratio at one
    assert_relative_eq!(params[0], 1.0 - 0.02, epsilon = 1e-6);
    assert_relative_eq!(params[1], 2.0 + 0.02, epsilon = 1e-6);
    assert_relative_eq!(params[2], 3.0, epsilon = 1e-12);
}

#[test]
fn test_rms_prop_step() {
    let mut rms = RMSprop::new(0.01, 0.95, 1e-8).unwrap();
    let mut params = array![1.0, -1.0];
    let grads = array![0.5, -2.0];

    rms.step(params.view_mut(), grads.view()).unwrap();

    // s = 0.05 * g^2, so the step is lr / sqrt(0.05) in the direction of -g
    let step = 0.01 / (0.05f64).sqrt();
    assert_relative_eq!(params[0], 1.0 - step, epsilon = 1e-6);
    assert_relative_eq!(params[1], -1.0 + step, epsilon = 1e-6);
}

#[test]
fn test_rms_prop_new_validation() {
    assert!(RMSprop::new(0.002, 0.95, 1e-8).is_ok());
    assert!(RMSprop::new(0.002, 1.5, 1e-8).is_err());
    assert!(RMSprop::new(-0.002, 0.95, 1e-8).is_err());
    assert!(RMSprop::new(0.002, 0.95, -1e-8).is_err());
}

#[test]
fn test_optimizer_rejects_length_change() {
    let mut rms = RMSprop::new(0.01, 0.95, 1e-8).unwrap();
    let mut params = array![1.0, -1.0];
    rms.step(params.view_mut(), array![0.1, 0.1].view()).unwrap();

    let mut longer = array![1.0, -1.0, 0.0];
    assert!(matches!(
        rms.step(longer.view_mut(), array![0.1, 0.1, 0.1].view()),
        Err(ModelError::InputValidationError(_))
    ));
    assert!(matches!(
        rms.step(params.view_mut(), array![0.1].view()),
        Err(ModelError::InputValidationError(_))
    ));
}

#[test]
fn test_set_learning_rate() {
    let mut adam = Adam::new(0.01, 0.9, 0.999, 1e-8).unwrap();
    adam.set_learning_rate(0.005).unwrap();
    assert_eq!(adam.learning_rate(), 0.005);
    assert!(adam.set_learning_rate(0.0).is_err());
    assert_eq!(adam.learning_rate(), 0.005);
}

#[test]
fn test_clip_gradients() {
    let mut grads = array![-10.0, -0.5, 0.0, 3.0, 7.0];
    clip_gradients(grads.view_mut(), 5.0).unwrap();
    assert_eq!(grads, array![-5.0, -0.5, 0.0, 3.0, 5.0]);

    assert!(clip_gradients(grads.view_mut(), 0.0).is_err());
}

#[test]
fn test_clip_gradients_large_vector() {
    let mut grads = Array1::from_shape_fn(4096, |i| i as f64 - 2048.0);
    clip_gradients(grads.view_mut(), 1.0).unwrap();
    assert!(grads.iter().all(|g| (-1.0..=1.0).contains(g)));
    assert_eq!(grads[0], -1.0);
    assert_eq!(grads[2048], 0.0);
}

#[test]
fn test_flatten_and_load_parameters() {
    let mut cell = CirculantGRU::with_seed(2, 2, 1, 4).unwrap();
    let flat = flatten_parameters(&cell);
    assert_eq!(flat.len(), cell.param_count());

    let replaced = Array1::from_shape_fn(flat.len(), |i| i as f64);
    load_flat_parameters(&mut cell, replaced.view()).unwrap();
    assert_eq!(cell.weight()[[0, 0]], 0.0);
    assert_eq!(cell.weight()[[0, 1]], 1.0);
    assert_eq!(cell.bias()[0], 24.0);
    assert_eq!(flatten_parameters(&cell), replaced);

    assert!(load_flat_parameters(&mut cell, array![1.0].view()).is_err());
    assert_eq!(flatten_gradients(&cell).len(), flat.len());
}
