//! Dual number type integration for automatic differentiation.
//!
//! This module provides a type alias for num-dual's Dual64 type, used by
//! [`ForwardDifferentiator`](crate::math::differentiation::ForwardDifferentiator)
//! to differentiate residual models exactly.
//!
//! ## Usage
//!
//! ```
//! use locator_core::types::dual::DualNumber;
//! use num_dual::DualNum;
//!
//! // Seed dx/dx = 1
//! let x = DualNumber::new(3.0, 1.0);
//! let y = (x * x + 16.0).sqrt();
//!
//! // y = 5, dy/dx = x / y = 0.6
//! assert!((y.re - 5.0).abs() < 1e-12);
//! assert!((y.eps - 0.6).abs() < 1e-12);
//! ```

/// Type alias for num-dual's Dual64 (f64-based dual numbers).
///
/// - `re`: Real part (function value)
/// - `eps`: Dual part (directional derivative along the seeded unknown)
///
/// Residual models are written once against `D: DualNum<f64> + Copy`, which
/// both `f64` and `DualNumber` satisfy.
pub type DualNumber = num_dual::Dual64;

/// Build the four seeded dual copies of `theta` used for a full gradient.
///
/// Entry `k` of the returned array carries `eps = 1` on unknown `k` and
/// `eps = 0` elsewhere.
pub fn seeded_unknowns(theta: &[f64; 4]) -> [[DualNumber; 4]; 4] {
    let mut seeds = [[DualNumber::from(0.0); 4]; 4];
    for (k, seed) in seeds.iter_mut().enumerate() {
        for (j, slot) in seed.iter_mut().enumerate() {
            *slot = DualNumber::new(theta[j], if j == k { 1.0 } else { 0.0 });
        }
    }
    seeds
}
