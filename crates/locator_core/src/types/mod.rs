//! Core value types shared by every layer of the locator.
//!
//! This module provides:
//! - `dual`: Dual number type integration with num-dual for automatic differentiation
//! - `receiver`: Receiver records, receiver arrays and the unknowns vector
//! - `error`: Structured error types for configuration and numerical failures
//!
//! # Re-exports
//!
//! For convenience, commonly used types are re-exported at this module level:
//! - [`Receiver`], [`ReceiverArray`], [`Unknowns`] from `receiver`
//! - [`ConfigurationError`], [`NumericalError`], [`LocatorError`] from `error`

pub mod dual;
pub mod error;
pub mod receiver;

// Re-export commonly used types at module level
pub use error::{ConfigurationError, LocatorError, NumericalError};
pub use receiver::{
    validate_receivers, Receiver, ReceiverArray, Unknowns, MIN_RECEIVERS, NUM_UNKNOWNS,
};
