//! Stacked residuals and Jacobian over all receivers.

use super::residual::{ArrivalTimeResidual, PropagationModel, ResidualModel};
use crate::math::differentiation::{DifferentiationMode, Differentiator};
use crate::math::solvers::{Evaluation, LeastSquaresProblem};
use crate::types::{
    validate_receivers, ConfigurationError, NumericalError, Receiver, MIN_RECEIVERS, NUM_UNKNOWNS,
};
use tracing::warn;

/// The localisation least-squares problem: one residual block per receiver,
/// all sharing the unknowns `θ = (x, y, z, t)`.
///
/// Row `i` of the Jacobian is the gradient of block `i`, in receiver order.
///
/// # Example
///
/// ```
/// use locator_core::locate::{LocalisationProblem, PropagationModel};
/// use locator_core::math::differentiation::DifferentiationMode;
/// use locator_core::math::solvers::LeastSquaresProblem;
/// use locator_core::types::Receiver;
///
/// let receivers: Vec<Receiver> = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]
///     .iter()
///     .map(|&p| Receiver::new(p, 0.01))
///     .collect();
///
/// let problem = LocalisationProblem::new(
///     &receivers,
///     PropagationModel::default(),
///     DifferentiationMode::Forward,
/// ).unwrap();
///
/// let eval = problem.evaluate(&[1.0, 1.0, 1.0, 0.0]).unwrap();
/// assert_eq!(eval.residuals.len(), 4);
/// assert_eq!(eval.jacobian[0].len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct LocalisationProblem<E = DifferentiationMode> {
    blocks: Vec<ArrivalTimeResidual>,
    engine: E,
}

impl<E: Differentiator> LocalisationProblem<E> {
    /// Build one residual block per receiver with a shared propagation model.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError::InvalidParameter` - Bad speed of sound or distance guard
    /// * `ConfigurationError::InsufficientReceivers` - Fewer than four receivers
    /// * `ConfigurationError::NonFiniteInput` - NaN or infinite position or timestamp
    pub fn new(
        receivers: &[Receiver],
        propagation: PropagationModel,
        engine: E,
    ) -> Result<Self, ConfigurationError> {
        propagation.validate()?;
        let blocks = receivers
            .iter()
            .map(|rx| ArrivalTimeResidual::new(*rx, propagation))
            .collect();
        Self::from_blocks(blocks, engine)
    }

    /// Assemble pre-built residual blocks.
    pub fn from_blocks(
        blocks: Vec<ArrivalTimeResidual>,
        engine: E,
    ) -> Result<Self, ConfigurationError> {
        let receivers: Vec<Receiver> = blocks.iter().map(|b| *b.receiver()).collect();
        validate_receivers(&receivers)?;
        for block in &blocks {
            block.propagation().validate()?;
        }

        if blocks.len() == MIN_RECEIVERS {
            warn!(
                receivers = blocks.len(),
                "exactly as many receivers as unknowns, no redundancy against timing noise"
            );
        }

        Ok(Self { blocks, engine })
    }

    /// Number of residuals, one per receiver.
    #[inline]
    pub fn num_residuals(&self) -> usize {
        self.blocks.len()
    }

    /// Residual blocks in receiver order.
    #[inline]
    pub fn blocks(&self) -> &[ArrivalTimeResidual] {
        &self.blocks
    }

    /// The differentiation engine.
    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Plain residual values at `theta`.
    pub fn residuals(&self, theta: &[f64; NUM_UNKNOWNS]) -> Vec<f64> {
        self.blocks.iter().map(|b| b.residual(theta)).collect()
    }
}

fn as_unknowns(params: &[f64]) -> Result<[f64; NUM_UNKNOWNS], NumericalError> {
    <[f64; NUM_UNKNOWNS]>::try_from(params).map_err(|_| NumericalError::InconsistentDimensions {
        expected: NUM_UNKNOWNS,
        got: params.len(),
    })
}

impl<E: Differentiator> LeastSquaresProblem for LocalisationProblem<E> {
    fn num_params(&self) -> usize {
        NUM_UNKNOWNS
    }

    fn evaluate(&self, params: &[f64]) -> Result<Evaluation, NumericalError> {
        let theta = as_unknowns(params)?;

        let mut residuals = Vec::with_capacity(self.blocks.len());
        let mut jacobian = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let (value, gradient) = self.engine.value_and_gradient(block, &theta)?;
            residuals.push(value);
            jacobian.push(gradient.to_vec());
        }

        Ok(Evaluation {
            residuals,
            jacobian,
        })
    }

    fn cost(&self, params: &[f64]) -> Result<f64, NumericalError> {
        let theta = as_unknowns(params)?;
        let cost: f64 = self
            .blocks
            .iter()
            .map(|b| {
                let r: f64 = b.residual(&theta);
                r * r
            })
            .sum();
        if cost.is_finite() {
            Ok(cost)
        } else {
            Err(NumericalError::non_finite("cost"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::differentiation::{CentralDifference, ForwardDifferentiator};
    use crate::types::LocatorError;
    use approx::assert_relative_eq;

    fn receivers(source: [f64; 3], t0: f64) -> Vec<Receiver> {
        let model = PropagationModel::default();
        [
            [0.0, 0.0, 0.0],
            [30.0, 0.0, -5.0],
            [0.0, 30.0, -10.0],
            [30.0, 30.0, -2.0],
            [15.0, 15.0, -20.0],
        ]
        .iter()
        .map(|&p| Receiver::new(p, t0 + model.time_of_flight(source, p)))
        .collect()
    }

    #[test]
    fn test_rejects_three_receivers() {
        let rx = &receivers([1.0, 2.0, -3.0], 0.0)[..3];
        let result = LocalisationProblem::new(rx, PropagationModel::default(), ForwardDifferentiator);
        assert!(matches!(
            result,
            Err(ConfigurationError::InsufficientReceivers { got: 3, need: 4 })
        ));
    }

    #[test]
    fn test_rejects_non_finite_timestamp() {
        let mut rx = receivers([1.0, 2.0, -3.0], 0.0);
        rx[2].arrival_timestamp = f64::NAN;
        let result = LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator);
        assert!(matches!(result, Err(ConfigurationError::NonFiniteInput(_))));
    }

    #[test]
    fn test_rejects_bad_propagation() {
        let rx = receivers([1.0, 2.0, -3.0], 0.0);
        let result = LocalisationProblem::new(&rx, PropagationModel::new(-1.0), ForwardDifferentiator);
        assert!(matches!(result, Err(ConfigurationError::InvalidParameter(_))));
    }

    #[test]
    fn test_accepts_exactly_four() {
        let rx = &receivers([1.0, 2.0, -3.0], 0.0)[..4];
        let problem =
            LocalisationProblem::new(rx, PropagationModel::default(), ForwardDifferentiator).unwrap();
        assert_eq!(problem.num_residuals(), 4);
        assert_eq!(problem.num_params(), 4);
    }

    #[test]
    fn test_zero_residuals_at_truth() {
        let source = [12.0, 8.0, -6.0];
        let rx = receivers(source, 0.25);
        let problem =
            LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator).unwrap();

        let theta = [12.0, 8.0, -6.0, 0.25];
        for r in problem.residuals(&theta) {
            assert!(r.abs() < 1e-12);
        }
        assert!(problem.cost(&theta).unwrap() < 1e-24);
    }

    #[test]
    fn test_row_order_matches_receivers() {
        let rx = receivers([5.0, 5.0, -5.0], 0.0);
        let problem =
            LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator).unwrap();
        let theta = [1.0, 2.0, -1.0, 0.01];
        let eval = problem.evaluate(&theta).unwrap();

        for (i, block) in problem.blocks().iter().enumerate() {
            let (value, gradient) = ForwardDifferentiator.value_and_gradient(block, &theta).unwrap();
            assert_eq!(eval.residuals[i], value);
            assert_eq!(eval.jacobian[i], gradient.to_vec());
            // ∂r/∂t = −1 for every block
            assert_relative_eq!(eval.jacobian[i][3], -1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_cost_matches_evaluation() {
        let rx = receivers([5.0, 5.0, -5.0], 0.1);
        let problem =
            LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator).unwrap();
        let theta = [0.0, 0.0, 0.0, 0.0];
        let from_eval = problem.evaluate(&theta).unwrap().cost();
        let direct = problem.cost(&theta).unwrap();
        assert_relative_eq!(from_eval, direct, max_relative = 1e-14);
    }

    #[test]
    fn test_engines_agree() {
        let rx = receivers([5.0, 5.0, -5.0], 0.1);
        let theta = [3.0, -2.0, -1.0, 0.05];
        let ad = LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator)
            .unwrap()
            .evaluate(&theta)
            .unwrap();
        let fd = LocalisationProblem::new(&rx, PropagationModel::default(), CentralDifference::default())
            .unwrap()
            .evaluate(&theta)
            .unwrap();

        for (row_ad, row_fd) in ad.jacobian.iter().zip(&fd.jacobian) {
            for (a, f) in row_ad.iter().zip(row_fd) {
                assert!((a - f).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_wrong_parameter_length() {
        let rx = receivers([5.0, 5.0, -5.0], 0.1);
        let problem =
            LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator).unwrap();
        assert!(matches!(
            problem.evaluate(&[0.0, 0.0, 0.0]),
            Err(NumericalError::InconsistentDimensions { expected: 4, got: 3 })
        ));
    }

    #[test]
    fn test_evaluation_error_lifts_into_locator_error() {
        fn cost_of(problem: &LocalisationProblem<ForwardDifferentiator>, theta: &[f64]) -> Result<f64, LocatorError> {
            Ok(problem.evaluate(theta)?.cost())
        }

        let rx = receivers([5.0, 5.0, -5.0], 0.1);
        let problem =
            LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator).unwrap();

        assert!(cost_of(&problem, &[5.0, 5.0, -5.0, 0.1]).unwrap() < 1e-20);
        assert!(matches!(
            cost_of(&problem, &[0.0, 0.0]),
            Err(LocatorError::Numerical(NumericalError::InconsistentDimensions { expected: 4, got: 2 }))
        ));
    }

    #[test]
    fn test_finite_at_receiver_position() {
        let rx = receivers([5.0, 5.0, -5.0], 0.1);
        let problem =
            LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator).unwrap();
        let theta = [30.0, 0.0, -5.0, 0.0];
        let eval = problem.evaluate(&theta).unwrap();
        assert!(eval.is_finite());
    }
}
