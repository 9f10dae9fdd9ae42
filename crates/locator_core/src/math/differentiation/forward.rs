//! Forward-mode automatic differentiation with dual numbers.

use super::{check_finite, Differentiator};
use crate::locate::ResidualModel;
use crate::types::dual::seeded_unknowns;
use crate::types::{NumericalError, NUM_UNKNOWNS};

/// Exact gradients by propagating `Dual64` through the residual formula.
///
/// One pass per unknown: pass `k` seeds `eps = 1` on unknown `k`, so its
/// dual part is `∂r/∂θ_k`. The real parts of all passes agree; the first is
/// returned as the residual value.
///
/// # Example
///
/// ```
/// use locator_core::locate::{ArrivalTimeResidual, PropagationModel};
/// use locator_core::math::differentiation::{Differentiator, ForwardDifferentiator};
/// use locator_core::types::Receiver;
///
/// let block = ArrivalTimeResidual::new(Receiver::new([0.0; 3], 0.0), PropagationModel::default());
/// let (_, gradient) = ForwardDifferentiator
///     .value_and_gradient(&block, &[3.0, 4.0, 0.0, 0.0])
///     .unwrap();
///
/// // ∂r/∂t = −1
/// assert_eq!(gradient[3], -1.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardDifferentiator;

impl Differentiator for ForwardDifferentiator {
    fn value_and_gradient<M: ResidualModel>(
        &self,
        model: &M,
        theta: &[f64; NUM_UNKNOWNS],
    ) -> Result<(f64, [f64; NUM_UNKNOWNS]), NumericalError> {
        let mut value = 0.0;
        let mut gradient = [0.0; NUM_UNKNOWNS];

        for (k, seed) in seeded_unknowns(theta).iter().enumerate() {
            let r = model.residual(seed);
            if k == 0 {
                value = r.re;
            }
            gradient[k] = r.eps;
        }

        check_finite(value, &gradient, self.name())?;
        Ok((value, gradient))
    }

    fn name(&self) -> &'static str {
        "forward-ad"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::{ArrivalTimeResidual, PropagationModel};
    use crate::types::Receiver;
    use approx::assert_relative_eq;

    #[test]
    fn test_value_matches_plain_evaluation() {
        let block = ArrivalTimeResidual::new(
            Receiver::new([5.0, -3.0, 2.0], 0.125),
            PropagationModel::default(),
        );
        let theta = [1.0, 1.0, -4.0, 0.1];
        let (value, _) = ForwardDifferentiator.value_and_gradient(&block, &theta).unwrap();
        let plain: f64 = block.residual(&theta);
        assert_relative_eq!(value, plain, epsilon = 1e-15);
    }

    #[test]
    fn test_gradient_is_unit_direction_over_speed() {
        let block = ArrivalTimeResidual::new(Receiver::new([0.0; 3], 0.0), PropagationModel::default());
        let (_, g) = ForwardDifferentiator
            .value_and_gradient(&block, &[3.0, 4.0, 0.0, 0.0])
            .unwrap();

        assert_relative_eq!(g[0], -0.6 / 1482.0, epsilon = 1e-15);
        assert_relative_eq!(g[1], -0.8 / 1482.0, epsilon = 1e-15);
        assert_relative_eq!(g[2], 0.0, epsilon = 1e-15);
        assert_relative_eq!(g[3], -1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_finite_at_receiver() {
        let block = ArrivalTimeResidual::new(Receiver::new([2.0, 2.0, 2.0], 0.0), PropagationModel::default());
        let (value, g) = ForwardDifferentiator
            .value_and_gradient(&block, &[2.0, 2.0, 2.0, 0.0])
            .unwrap();
        assert!(value.is_finite());
        assert!(g.iter().all(|v| v.is_finite()));
        assert_eq!(g[0], 0.0);
    }
}
