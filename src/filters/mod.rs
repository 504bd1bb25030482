//! State estimation filters
//!
//! - [`ukf`]: single-model Unscented Kalman Filter over the 5-D kinematic
//!   state with 2-D position measurements.
//! - [`imm`]: the Interacting Multiple Model bank that runs three UKFs
//!   (CV, CTRV, RM) in parallel and maintains mode probabilities.

pub mod imm;
pub mod ukf;
