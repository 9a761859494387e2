use super::*;

const EPSILON: f64 = 1e-6;
const MAX_RELATIVE: f64 = 1e-4;

struct Scenario {
    x: Array3<f64>,
    h0: Array2<f64>,
    upstream: Array3<f64>,
}

impl Scenario {
    fn new(batch: usize, timesteps: usize, input_dim: usize, units: usize) -> Self {
        Self {
            x: generate_sequence(batch, timesteps, input_dim),
            h0: Array2::from_shape_fn((batch, units), |(b, u)| 0.1 * b as f64 - 0.05 * u as f64),
            upstream: generate_loss_weights(batch, timesteps, units),
        }
    }

    /// Scalar loss `sum(h * upstream)` for the given weights and inputs
    fn loss(&self, cell: &mut CirculantGRU, x: &Array3<f64>, h0: &Array2<f64>) -> f64 {
        let h = cell.forward(x.view(), Some(h0.view()), None).unwrap();
        (&h * &self.upstream).sum()
    }

    /// Runs forward and backward once, returning (grad_weight, grad_bias, grad_x, grad_h0)
    fn analytic(
        &self,
        cell: &mut CirculantGRU,
    ) -> (Array2<f64>, Array1<f64>, Array3<f64>, Array2<f64>) {
        cell.zero_gradients();
        cell.forward(self.x.view(), Some(self.h0.view()), None)
            .unwrap();
        let grads = cell
            .backward(
                self.x.view(),
                Some(self.h0.view()),
                None,
                self.upstream.view(),
                1.0,
            )
            .unwrap();
        let grad_x = grads.input.to_owned();
        let grad_h0 = grads.hidden.unwrap().to_owned();
        (
            cell.grad_weight().clone(),
            cell.grad_bias().clone(),
            grad_x,
            grad_h0,
        )
    }
}

fn assert_gradient_close(analytic: f64, numeric: f64, what: &str) {
    assert_relative_eq!(
        analytic,
        numeric,
        epsilon = 1e-7,
        max_relative = MAX_RELATIVE
    );
    assert!(analytic.is_finite(), "{} gradient is not finite", what);
}

fn check_parameter_gradients(cell: &mut CirculantGRU, scenario: &Scenario) {
    let (grad_weight, grad_bias, _, _) = scenario.analytic(cell);
    let weight = cell.weight().clone();
    let bias = cell.bias().clone();

    for (index, &analytic) in grad_weight.indexed_iter() {
        let mut plus = weight.clone();
        plus[index] += EPSILON;
        cell.set_weights(plus, bias.clone()).unwrap();
        let loss_plus = scenario.loss(cell, &scenario.x, &scenario.h0);

        let mut minus = weight.clone();
        minus[index] -= EPSILON;
        cell.set_weights(minus, bias.clone()).unwrap();
        let loss_minus = scenario.loss(cell, &scenario.x, &scenario.h0);

        let numeric = (loss_plus - loss_minus) / (2.0 * EPSILON);
        assert_gradient_close(analytic, numeric, "weight");
    }

    for (index, &analytic) in grad_bias.indexed_iter() {
        let mut plus = bias.clone();
        plus[index] += EPSILON;
        cell.set_weights(weight.clone(), plus).unwrap();
        let loss_plus = scenario.loss(cell, &scenario.x, &scenario.h0);

        let mut minus = bias.clone();
        minus[index] -= EPSILON;
        cell.set_weights(weight.clone(), minus).unwrap();
        let loss_minus = scenario.loss(cell, &scenario.x, &scenario.h0);

        let numeric = (loss_plus - loss_minus) / (2.0 * EPSILON);
        assert_gradient_close(analytic, numeric, "bias");
    }

    cell.set_weights(weight, bias).unwrap();
}

fn check_input_gradients(cell: &mut CirculantGRU, scenario: &Scenario) {
    let (_, _, grad_x, grad_h0) = scenario.analytic(cell);

    for (index, &analytic) in grad_x.indexed_iter() {
        let mut plus = scenario.x.clone();
        plus[index] += EPSILON;
        let loss_plus = scenario.loss(cell, &plus, &scenario.h0);

        let mut minus = scenario.x.clone();
        minus[index] -= EPSILON;
        let loss_minus = scenario.loss(cell, &minus, &scenario.h0);

        let numeric = (loss_plus - loss_minus) / (2.0 * EPSILON);
        assert_gradient_close(analytic, numeric, "input");
    }

    for (index, &analytic) in grad_h0.indexed_iter() {
        let mut plus = scenario.h0.clone();
        plus[index] += EPSILON;
        let loss_plus = scenario.loss(cell, &scenario.x, &plus);

        let mut minus = scenario.h0.clone();
        minus[index] -= EPSILON;
        let loss_minus = scenario.loss(cell, &scenario.x, &minus);

        let numeric = (loss_plus - loss_minus) / (2.0 * EPSILON);
        assert_gradient_close(analytic, numeric, "initial state");
    }
}

#[test]
fn test_gradient_check_block_size_one() {
    let mut cell = CirculantGRU::with_seed(4, 4, 1, 7).unwrap();
    let scenario = Scenario::new(2, 3, 4, 4);

    check_parameter_gradients(&mut cell, &scenario);
    check_input_gradients(&mut cell, &scenario);
}

#[test]
fn test_gradient_check_through_synthesis() {
    let mut cell = CirculantGRU::with_seed(4, 4, 2, 7).unwrap();
    let bias = Array1::from_shape_fn(12, |k| 0.1 * k as f64 - 0.5);
    cell.set_weights(cell.weight().clone(), bias).unwrap();
    let scenario = Scenario::new(2, 3, 4, 4);

    check_parameter_gradients(&mut cell, &scenario);
    check_input_gradients(&mut cell, &scenario);
}

#[test]
fn test_gradient_check_larger_blocks() {
    let mut cell = CirculantGRU::with_seed(4, 8, 4, 13).unwrap();
    let scenario = Scenario::new(3, 4, 4, 8);

    check_parameter_gradients(&mut cell, &scenario);
    check_input_gradients(&mut cell, &scenario);
}

#[test]
fn test_gradient_check_saturated_update_gate() {
    let (input_dim, units) = (4, 4);
    let mut cell = CirculantGRU::with_seed(input_dim, units, 2, 7).unwrap();
    let mut bias = Array1::zeros(3 * units);
    bias.slice_mut(s![..units]).fill(50.0);
    cell.set_weights(Array2::zeros((input_dim + units, 3 * units)), bias)
        .unwrap();
    let scenario = Scenario::new(2, 3, input_dim, units);

    let h = cell
        .forward(scenario.x.view(), None, None)
        .unwrap()
        .to_owned();
    let gates = cell.gates();
    for t in 0..3 {
        for (&value, &candidate) in h
            .index_axis(Axis(1), t)
            .iter()
            .zip(gates.slice(s![.., t, 2 * units..]).iter())
        {
            assert_abs_diff_eq!(value, candidate, epsilon = 1e-12);
        }
    }

    check_parameter_gradients(&mut cell, &scenario);
    check_input_gradients(&mut cell, &scenario);
}

#[test]
fn test_passthrough_matches_exact_for_block_size_one() {
    let scenario = Scenario::new(2, 3, 4, 4);
    let mut exact = CirculantGRU::with_seed(4, 4, 1, 17).unwrap();
    let mut passthrough = CirculantGRU::with_seed(4, 4, 1, 17).unwrap();
    passthrough.set_synthesis_gradient(SynthesisGradient::Passthrough);

    let (exact_weight, exact_bias, exact_x, exact_h0) = scenario.analytic(&mut exact);
    let (pass_weight, pass_bias, pass_x, pass_h0) = scenario.analytic(&mut passthrough);

    for (a, b) in exact_weight.iter().zip(pass_weight.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
    for (a, b) in exact_bias.iter().zip(pass_bias.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
    for (a, b) in exact_x.iter().zip(pass_x.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
    for (a, b) in exact_h0.iter().zip(pass_h0.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn test_passthrough_routes_to_every_base_row() {
    let scenario = Scenario::new(2, 3, 4, 4);
    let mut exact = CirculantGRU::with_seed(4, 4, 2, 17).unwrap();
    let mut passthrough = CirculantGRU::with_seed(4, 4, 2, 17).unwrap();
    passthrough.set_synthesis_gradient(SynthesisGradient::Passthrough);

    let (exact_weight, _, _, _) = scenario.analytic(&mut exact);
    let (pass_weight, _, _, _) = scenario.analytic(&mut passthrough);

    // the second row of every tile never enters the forward pass
    for row in [5, 7] {
        for col in 0..4 {
            assert_eq!(exact_weight[[row, col]], 0.0);
        }
    }
    assert!((0..4).any(|col| pass_weight[[5, col]] != 0.0));
}
