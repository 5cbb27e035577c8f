//! Numerical core shared by the Retrato family of dynamical-systems
//! simulators.
//!
//! The crate evaluates, never draws: bifurcation diagrams for the
//! canonical one-dimensional maps, phase portraits and direction
//! fields for planar linear and nonlinear systems, Lanchester combat
//! engagements, and Verhulst population growth with parameter fitting.
//! Every analysis is a pure request/response call; the interface layer
//! owns all presentation and interaction state.

pub mod autodiff;
pub mod bifurcation;
pub mod catalog;
pub mod descriptor;
pub mod equilibrium;
pub mod error;
pub mod expr;
pub mod field;
pub mod lanchester;
pub mod linear;
pub mod params;
pub mod solvers;
pub mod trajectory;
pub mod traits;
pub mod verhulst;

pub use descriptor::SystemDescriptor;
pub use error::{EvalError, EvalResult};
pub use solvers::{integrate, probe, StepRule};
pub use trajectory::Trajectory;
pub use traits::{Scalar, Stepper, VectorField};
