use super::*;

#[test]
fn test_circulant_gru_output_shapes() {
    let (batch, timesteps, input_dim, units) = (3, 5, 4, 8);
    let mut cell = CirculantGRU::with_seed(input_dim, units, 4, 11).unwrap();
    let x = generate_sequence(batch, timesteps, input_dim);
    let h0 = Array2::from_elem((batch, units), 0.1);
    let c0 = Array2::from_elem((batch, units), -0.1);

    let h = cell
        .forward(x.view(), Some(h0.view()), Some(c0.view()))
        .unwrap()
        .to_owned();
    assert_eq!(h.dim(), (batch, timesteps, units));
    assert_eq!(cell.gates().dim(), (batch, timesteps, 3 * units));
    assert_eq!(cell.derived_weight().dim(), (input_dim + units, units));

    let grad_h = Array3::ones((batch, timesteps, units));
    let grads = cell
        .backward(x.view(), Some(h0.view()), Some(c0.view()), grad_h.view(), 1.0)
        .unwrap();
    assert_eq!(grads.input.dim(), x.dim());
    assert_eq!(grads.hidden.unwrap().dim(), h0.dim());
    assert_eq!(grads.cell.unwrap().dim(), c0.dim());
}

#[test]
fn test_circulant_gru_gate_ranges() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 3).unwrap();
    let x = generate_sequence(2, 6, 4).mapv(|v| v * 20.0);
    cell.forward(x.view(), None, None).unwrap();

    let gates = cell.gates();
    let units = cell.units();
    for ((_, _, k), &value) in gates.indexed_iter() {
        if k < 2 * units {
            assert!(value > 0.0 && value < 1.0, "sigmoid gate {} out of range", value);
        } else {
            assert!(value > -1.0 && value < 1.0, "candidate {} out of range", value);
        }
    }
}

#[test]
fn test_circulant_gru_closed_update_gate_keeps_state() {
    let (input_dim, units) = (4, 4);
    let mut cell = CirculantGRU::with_seed(input_dim, units, 2, 5).unwrap();
    let mut bias = Array1::zeros(3 * units);
    bias.slice_mut(s![..units]).fill(-1000.0);
    cell.set_weights(cell.weight().clone(), bias).unwrap();

    let x = generate_sequence(2, 3, input_dim);
    let h0 = Array2::from_shape_fn((2, units), |(b, u)| 0.2 * b as f64 - 0.1 * u as f64);
    let h = cell.forward(x.view(), Some(h0.view()), None).unwrap();

    for t in 0..3 {
        for (&value, &expected) in h.index_axis(Axis(1), t).iter().zip(h0.iter()) {
            assert_abs_diff_eq!(value, expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_circulant_gru_saturated_update_gate_takes_candidate() {
    let (input_dim, units) = (4, 4);
    let mut cell = CirculantGRU::with_seed(input_dim, units, 2, 5).unwrap();
    let mut bias = Array1::from_shape_fn(3 * units, |k| 0.1 * k as f64 - 0.5);
    bias.slice_mut(s![..units]).fill(1000.0);
    cell.set_weights(cell.weight().clone(), bias).unwrap();

    let x = generate_sequence(2, 3, input_dim);
    let h = cell.forward(x.view(), None, None).unwrap().to_owned();
    let gates = cell.gates();

    for t in 0..3 {
        assert_eq!(
            h.index_axis(Axis(1), t),
            gates.slice(s![.., t, 2 * units..])
        );
    }
}

#[test]
fn test_circulant_gru_state_carry_matches_long_sequence() {
    let (batch, timesteps, input_dim, units) = (2, 4, 4, 4);
    let mut carried = CirculantGRU::with_seed(input_dim, units, 2, 21).unwrap();
    let mut single = CirculantGRU::with_seed(input_dim, units, 2, 21).unwrap();
    carried.set_remember_states(true);

    let x = generate_sequence(batch, 2 * timesteps, input_dim);
    let first = x.slice(s![.., ..timesteps, ..]);
    let second = x.slice(s![.., timesteps.., ..]);

    carried.forward(first, None, None).unwrap();
    let split_output = carried.forward(second, None, None).unwrap().to_owned();
    let full_output = single.forward(x.view(), None, None).unwrap();

    for (a, b) in split_output
        .iter()
        .zip(full_output.slice(s![.., timesteps.., ..]).iter())
    {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn test_circulant_gru_without_state_carry_restarts_from_zero() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let x = generate_sequence(2, 3, 4);

    let first = cell.forward(x.view(), None, None).unwrap().to_owned();
    let second = cell.forward(x.view(), None, None).unwrap().to_owned();
    assert_eq!(first, second);
}

#[test]
fn test_circulant_gru_forget_states() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    cell.set_remember_states(true);
    let x = generate_sequence(2, 3, 4);

    let first = cell.forward(x.view(), None, None).unwrap().to_owned();
    let carried = cell.forward(x.view(), None, None).unwrap().to_owned();
    assert_ne!(first, carried);

    cell.forget_states();
    let restarted = cell.forward(x.view(), None, None).unwrap().to_owned();
    assert_eq!(first, restarted);
}

#[test]
fn test_circulant_gru_state_carry_rejects_batch_change() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    cell.set_remember_states(true);

    cell.forward(generate_sequence(2, 3, 4).view(), None, None)
        .unwrap();
    let result = cell.forward(generate_sequence(3, 3, 4).view(), None, None);
    assert!(matches!(result, Err(ModelError::InputValidationError(_))));

    // explicit states override the carried ones
    let h0 = Array2::zeros((3, 4));
    let c0 = Array2::zeros((3, 4));
    assert!(
        cell.forward(
            generate_sequence(3, 3, 4).view(),
            Some(h0.view()),
            Some(c0.view())
        )
        .is_ok()
    );
}

#[test]
fn test_circulant_gru_final_state() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    assert!(cell.final_state().is_none());

    let h = cell
        .forward(generate_sequence(2, 3, 4).view(), None, None)
        .unwrap()
        .to_owned();
    let (hidden, state) = cell.final_state().unwrap();
    assert_eq!(hidden, h.index_axis(Axis(1), 2));
    assert_eq!(state, hidden);
}

#[test]
fn test_circulant_gru_cell_state_does_not_enter_arithmetic() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let x = generate_sequence(2, 3, 4);
    let c0 = Array2::from_elem((2, 4), 5.0);

    let without = cell.forward(x.view(), None, None).unwrap().to_owned();
    let with = cell.forward(x.view(), None, Some(c0.view())).unwrap().to_owned();
    assert_eq!(without, with);
}

#[test]
fn test_circulant_gru_backward_omits_internal_states() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let x = generate_sequence(2, 3, 4);
    let h0 = Array2::zeros((2, 4));
    let grad_h = Array3::ones((2, 3, 4));

    cell.forward(x.view(), Some(h0.view()), None).unwrap();
    let grads = cell
        .backward(x.view(), Some(h0.view()), None, grad_h.view(), 1.0)
        .unwrap();
    assert!(grads.hidden.is_some());
    assert!(grads.cell.is_none());
}

#[test]
fn test_circulant_gru_cell_gradient_aliases_hidden_gradient() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let x = generate_sequence(2, 3, 4);
    let h0 = Array2::from_elem((2, 4), 0.3);
    let grad_h = generate_loss_weights(2, 3, 4);

    cell.forward(x.view(), Some(h0.view()), Some(h0.view()))
        .unwrap();
    let grads = cell
        .backward(x.view(), Some(h0.view()), Some(h0.view()), grad_h.view(), 1.0)
        .unwrap();
    assert_eq!(grads.hidden.unwrap(), grads.cell.unwrap());
}

#[test]
fn test_circulant_gru_backward_rejects_scale() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let x = generate_sequence(2, 3, 4);
    let grad_h = Array3::ones((2, 3, 4));
    cell.forward(x.view(), None, None).unwrap();

    let result = cell.backward(x.view(), None, None, grad_h.view(), 0.5);
    assert!(matches!(result, Err(ModelError::UnsupportedParameter(_))));
    // nothing was accumulated
    assert!(cell.grad_weight().iter().all(|&g| g == 0.0));
}

#[test]
fn test_circulant_gru_backward_requires_forward() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let x = generate_sequence(2, 3, 4);
    let grad_h = Array3::ones((2, 3, 4));

    let result = cell.backward(x.view(), None, None, grad_h.view(), 1.0);
    assert!(matches!(result, Err(ModelError::ProcessingError(_))));

    cell.forward(x.view(), None, None).unwrap();
    cell.clear_state();
    let result = cell.backward(x.view(), None, None, grad_h.view(), 1.0);
    assert!(matches!(result, Err(ModelError::ProcessingError(_))));
}

#[test]
fn test_circulant_gru_backward_rejects_shape_mismatch() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let x = generate_sequence(2, 3, 4);
    cell.forward(x.view(), None, None).unwrap();

    let wrong_grad = Array3::ones((2, 3, 5));
    let result = cell.backward(x.view(), None, None, wrong_grad.view(), 1.0);
    assert!(matches!(result, Err(ModelError::InputValidationError(_))));

    let longer = generate_sequence(2, 4, 4);
    let grad_h = Array3::ones((2, 4, 4));
    let result = cell.backward(longer.view(), None, None, grad_h.view(), 1.0);
    assert!(matches!(result, Err(ModelError::InputValidationError(_))));
}

#[test]
fn test_circulant_gru_backward_accumulates() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let x = generate_sequence(2, 3, 4);
    let grad_h = generate_loss_weights(2, 3, 4);

    cell.forward(x.view(), None, None).unwrap();
    cell.backward(x.view(), None, None, grad_h.view(), 1.0)
        .unwrap();
    let once_weight = cell.grad_weight().clone();
    let once_bias = cell.grad_bias().clone();

    cell.forward(x.view(), None, None).unwrap();
    cell.backward(x.view(), None, None, grad_h.view(), 1.0)
        .unwrap();
    for (twice, once) in cell.grad_weight().iter().zip(once_weight.iter()) {
        assert_relative_eq!(*twice, 2.0 * once, epsilon = 1e-12);
    }
    for (twice, once) in cell.grad_bias().iter().zip(once_bias.iter()) {
        assert_relative_eq!(*twice, 2.0 * once, epsilon = 1e-12);
    }

    cell.zero_gradients();
    assert!(cell.grad_weight().iter().all(|&g| g == 0.0));
    assert!(cell.grad_bias().iter().all(|&g| g == 0.0));
}

#[test]
fn test_circulant_gru_rejects_invalid_configuration() {
    assert!(matches!(
        CirculantGRU::new(0, 4, 1),
        Err(ModelError::InputValidationError(_))
    ));
    assert!(matches!(
        CirculantGRU::new(4, 6, 4),
        Err(ModelError::UnsupportedParameter(_))
    ));
    assert!(matches!(
        CirculantGRU::new(6, 4, 4),
        Err(ModelError::UnsupportedParameter(_))
    ));
}

#[test]
fn test_circulant_gru_rejects_malformed_input() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();

    let wrong_width = generate_sequence(2, 3, 3);
    assert!(cell.forward(wrong_width.view(), None, None).is_err());

    let empty = Array3::zeros((2, 0, 4));
    assert!(cell.forward(empty.view(), None, None).is_err());

    let x = generate_sequence(2, 3, 4);
    let h0 = Array2::zeros((3, 4));
    assert!(cell.forward(x.view(), Some(h0.view()), None).is_err());
}

#[test]
fn test_circulant_gru_seed_reproducible() {
    let a = CirculantGRU::with_seed(4, 8, 4, 99).unwrap();
    let b = CirculantGRU::with_seed(4, 8, 4, 99).unwrap();
    assert_eq!(a.weight(), b.weight());
    assert_eq!(a.weight().dim(), (12, 24));
    assert!(a.bias().iter().all(|&v| v == 0.0));

    let bound = 1.0 / (8.0f64).sqrt();
    assert!(a.weight().iter().all(|w| w.abs() <= bound));
}

#[test]
fn test_circulant_gru_reset_with_range() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    cell.reset(Some(0.01), &mut rng).unwrap();
    assert!(cell.weight().iter().all(|w| w.abs() <= 0.01));
    assert!(cell.reset(Some(-1.0), &mut rng).is_err());
}

#[test]
fn test_circulant_gru_parameter_count() {
    let cell = CirculantGRU::with_seed(4, 8, 4, 1).unwrap();
    assert_eq!(cell.param_count(), 12 * 24 + 24);
}

#[test]
fn test_circulant_gru_clear_state_keeps_parameters() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 8).unwrap();
    let weight = cell.weight().clone();
    cell.forward(generate_sequence(2, 3, 4).view(), None, None)
        .unwrap();

    cell.clear_state();
    assert_eq!(cell.output().len(), 0);
    assert_eq!(cell.gates().len(), 0);
    assert!(cell.final_state().is_none());
    assert_eq!(cell.weight(), &weight);
}
