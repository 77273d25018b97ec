use super::system::EquationSystem;
use super::types::{EntityId, Sketch};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Residual max-norm below which a solve is accepted. Loose by design:
/// interactivity beats precision, and committed coordinates are rounded to
/// one decimal place anyway.
const TOLERANCE: f64 = 1e-2;

/// Iteration budget. A solve runs synchronously on the caller's thread, so
/// it must terminate rather than block the host indefinitely.
const MAX_ITERATIONS: usize = 100;

/// Forward-difference step for the numeric Jacobian.
const FD_STEP: f64 = 1e-7;

const DAMPING_INITIAL: f64 = 1e-3;
const DAMPING_MIN: f64 = 1e-12;
const DAMPING_MAX: f64 = 1e12;

/// Errors a solve can surface. All are local and recoverable; nothing here
/// is fatal to the host application.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    /// A constraint references an entity that is no longer in the sketch.
    /// Rejected before assembly; no point is touched.
    #[error("constraint references entity {id} which is not in the sketch")]
    StaleReference { id: EntityId },

    /// The iterative search failed to drive the residual below tolerance
    /// within the iteration budget. Coordinates keep their pre-solve values.
    #[error("solver failed to converge after {iterations} iterations (residual {residual:.4})")]
    NonConvergence { iterations: usize, residual: f64 },
}

/// Outcome of a successful solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    /// Number of iterations performed.
    pub iterations: usize,
    /// Final maximum residual magnitude.
    pub max_residual: f64,
    /// Number of points in the unknown vector.
    pub point_count: usize,
    /// Number of constraints in the system.
    pub constraint_count: usize,
}

pub struct SketchSolver;

impl SketchSolver {
    /// Simple solve that returns just success/failure.
    pub fn solve(sketch: &mut Sketch) -> bool {
        Self::recompute(sketch).is_ok()
    }

    /// Recompute the sketch: assemble the constraint system, run the
    /// iterative search, and on success commit the resolved coordinates
    /// back onto the shared point entities.
    ///
    /// A sketch with no points and no constraints is a successful no-op.
    /// On failure no coordinate is modified.
    pub fn recompute(sketch: &mut Sketch) -> Result<SolveReport, SolveError> {
        let system = EquationSystem::assemble(sketch)?;
        let dimension = system.dimension();
        if dimension == 0 {
            return Ok(SolveReport {
                iterations: 0,
                max_residual: 0.0,
                point_count: 0,
                constraint_count: 0,
            });
        }

        debug!(
            "sketch solve: {} points, {} constraints, {} unknowns",
            system.point_count(),
            system.constraint_count(),
            dimension
        );

        let mut x = system.initial_guess();
        let mut f = system.residual(&x);
        let mut damping = DAMPING_INITIAL;

        for iteration in 0..MAX_ITERATIONS {
            let max_residual = f.amax();
            if max_residual < TOLERANCE {
                system.commit(sketch, &x);
                debug!(
                    "sketch solve converged after {} iterations (residual {:.2e})",
                    iteration, max_residual
                );
                return Ok(SolveReport {
                    iterations: iteration,
                    max_residual,
                    point_count: system.point_count(),
                    constraint_count: system.constraint_count(),
                });
            }

            let jacobian = numeric_jacobian(&system, &x, &f);
            let jacobian_t = jacobian.transpose();
            let gradient = &jacobian_t * &f;
            let approx_hessian = &jacobian_t * &jacobian;

            // Damped Gauss-Newton step. The zero starting point makes the
            // raw Jacobian singular for some constraint kinds (all gradient
            // terms vanish at the origin), so an undamped Newton step is not
            // an option; escalate the damping until a step actually reduces
            // the residual.
            let mut stepped = false;
            while damping <= DAMPING_MAX {
                let normal = &approx_hessian + DMatrix::identity(dimension, dimension) * damping;
                let rhs = -&gradient;
                let step = match normal.cholesky() {
                    Some(factor) => factor.solve(&rhs),
                    None => {
                        damping *= 4.0;
                        continue;
                    }
                };

                let candidate = &x + &step;
                let f_candidate = system.residual(&candidate);
                if f_candidate.norm() < f.norm() {
                    x = candidate;
                    f = f_candidate;
                    damping = (damping * 0.5).max(DAMPING_MIN);
                    stepped = true;
                    break;
                }
                damping *= 4.0;
            }

            if !stepped {
                // No descent direction even under maximum damping: the
                // system is degenerate (conflicting or redundant constraints
                // yielding an effectively singular Jacobian). Surfaced as
                // non-convergence, logged distinctly for diagnostics.
                let residual = f.amax();
                warn!(
                    "sketch solve degenerate at iteration {}: no descent step found (residual {:.4})",
                    iteration, residual
                );
                return Err(SolveError::NonConvergence {
                    iterations: iteration,
                    residual,
                });
            }
        }

        let residual = f.amax();
        warn!(
            "sketch solve did not converge within {} iterations (residual {:.4})",
            MAX_ITERATIONS, residual
        );
        Err(SolveError::NonConvergence {
            iterations: MAX_ITERATIONS,
            residual,
        })
    }
}

/// Forward-difference Jacobian of the residual at `x`, reusing the already
/// evaluated `f0 = F(x)`.
fn numeric_jacobian(system: &EquationSystem, x: &DVector<f64>, f0: &DVector<f64>) -> DMatrix<f64> {
    let dimension = x.len();
    let mut jacobian = DMatrix::zeros(dimension, dimension);
    let mut probe = x.clone();

    for col in 0..dimension {
        let h = FD_STEP * (1.0 + x[col].abs());
        probe[col] = x[col] + h;
        let f1 = system.residual(&probe);
        probe[col] = x[col];
        jacobian.set_column(col, &((f1 - f0) / h));
    }

    jacobian
}
