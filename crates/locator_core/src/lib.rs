//! # locator_core: Time-of-Arrival Source Localisation Engine
//!
//! ## Layer Role
//!
//! locator_core is the kernel of the workspace. It estimates the 3D position
//! and emission time of an impulsive sound source from the arrival times
//! observed at a set of fixed receivers (hydrophones):
//! - Per-receiver time-of-flight residuals (`locate::residual`)
//! - Forward-mode AD and central-difference derivatives (`math::differentiation`)
//! - Stacked residual/Jacobian assembly over the shared unknowns (`locate::problem`)
//! - Levenberg-Marquardt nonlinear least squares (`math::solvers`)
//! - A `SourceLocator` facade with initial-guess policy and batch solving (`locate::locator`)
//!
//! ## Unknowns
//!
//! The solver works on `θ = (x, y, z, t)`: source position in metres (same
//! frame as the receivers) and emission time in seconds (same clock as the
//! arrival timestamps).
//!
//! ## Usage Examples
//!
//! ```rust
//! use locator_core::locate::{PropagationModel, SourceLocator};
//! use locator_core::math::solvers::LMConfig;
//! use locator_core::types::ReceiverArray;
//!
//! let array = ReceiverArray::new(vec![
//!     [1.0, 0.0, 0.0],
//!     [0.0, 1.0, 0.0],
//!     [0.0, 0.0, 1.0],
//!     [1.0, 1.0, 1.0],
//!     [0.0, 0.0, 0.0],
//! ]);
//! let propagation = PropagationModel::default();
//!
//! // Arrivals for a source at (0.2, 0.3, 0.4) emitting at t = 0.5 s
//! let source = [0.2, 0.3, 0.4];
//! let arrivals: Vec<f64> = array
//!     .positions()
//!     .iter()
//!     .map(|p| 0.5 + propagation.time_of_flight(source, *p))
//!     .collect();
//!
//! let receivers = array.with_arrivals(&arrivals).unwrap();
//! let locator = SourceLocator::new(propagation, LMConfig::default());
//! let estimate = locator.locate(&receivers, None).unwrap();
//!
//! assert!(estimate.converged());
//! assert!((estimate.x - 0.2).abs() < 1e-6);
//! assert!((estimate.t - 0.5).abs() < 1e-9);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` (default): Run `SourceLocator::locate_batch` on the rayon pool
//! - `serde`: Enable serialisation for receivers, unknowns and estimates

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod locate;
pub mod math;
pub mod types;
