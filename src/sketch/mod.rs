pub mod solver;
pub mod system;
pub mod types;

#[cfg(test)]
mod tests_system;

pub use solver::{SketchSolver, SolveError, SolveReport};
pub use types::{EntityId, Sketch, SketchConstraint};
