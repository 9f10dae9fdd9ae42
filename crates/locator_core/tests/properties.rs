//! Property-based tests for the localisation pipeline.

use locator_core::locate::{LocalisationProblem, PropagationModel, SourceLocator};
use locator_core::math::differentiation::{CentralDifference, ForwardDifferentiator};
use locator_core::math::solvers::LeastSquaresProblem;
use locator_core::types::Receiver;
use proptest::prelude::*;

const ARRAY: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [30.0, 0.0, -5.0],
    [0.0, 30.0, -10.0],
    [30.0, 30.0, -2.0],
    [15.0, 15.0, -20.0],
    [-10.0, 20.0, -8.0],
];

fn synthesise(source: [f64; 3], t0: f64) -> Vec<Receiver> {
    let model = PropagationModel::default();
    ARRAY
        .iter()
        .map(|&p| Receiver::new(p, t0 + model.time_of_flight(source, p)))
        .collect()
}

fn source_strategy() -> impl Strategy<Value = [f64; 3]> {
    (0.0..30.0f64, 0.0..30.0f64, -20.0..0.0f64).prop_map(|(x, y, z)| [x, y, z])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Noiseless arrivals from a known source solve back to that source.
    #[test]
    fn test_round_trip_recovery(source in source_strategy(), t0 in -1.0..1.0f64) {
        let rx = synthesise(source, t0);
        let estimate = SourceLocator::default().locate(&rx, None).unwrap();

        prop_assert!(estimate.converged(), "status {:?}", estimate.status);
        for (est, truth) in estimate.position().iter().zip(&source) {
            prop_assert!((est - truth).abs() < 1e-6, "position {} vs {}", est, truth);
        }
        prop_assert!((estimate.t - t0).abs() < 1e-9, "time {} vs {}", estimate.t, t0);
    }

    /// Residuals and Jacobian stay finite on and around every receiver.
    #[test]
    fn test_finite_near_receivers(
        index in 0usize..6,
        offset in prop_oneof![Just(0.0f64), -1e-4..1e-4f64],
        t in -1.0..1.0f64,
    ) {
        let rx = synthesise([12.0, 8.0, -6.0], 0.25);
        let p = ARRAY[index];
        let theta = [p[0] + offset, p[1], p[2] - offset, t];

        let ad = LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator)
            .unwrap()
            .evaluate(&theta)
            .unwrap();
        prop_assert!(ad.is_finite());

        let fd = LocalisationProblem::new(&rx, PropagationModel::default(), CentralDifference::default())
            .unwrap()
            .evaluate(&theta)
            .unwrap();
        prop_assert!(fd.is_finite());
    }

    /// The emission-time column of the Jacobian is identically −1.
    #[test]
    fn test_time_derivative_is_minus_one(source in source_strategy(), t in -1.0..1.0f64) {
        let rx = synthesise([12.0, 8.0, -6.0], 0.25);
        let problem = LocalisationProblem::new(&rx, PropagationModel::default(), ForwardDifferentiator)
            .unwrap();
        let eval = problem.evaluate(&[source[0], source[1], source[2], t]).unwrap();
        for row in &eval.jacobian {
            prop_assert_eq!(row[3], -1.0);
        }
    }
}
