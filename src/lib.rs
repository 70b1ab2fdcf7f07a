//! Core library for the factory and belts planning solvers.
//!
//! Both engines are pure functions of their input: construct a problem
//! from JSON, solve it, return a JSON-serializable outcome. Neither
//! engine touches the filesystem, the clock, or any global state.

pub mod belts;
pub mod error;
pub mod factory;
pub mod tolerance;

pub use error::{PlannerError, Result};
