use super::solver::SolveError;
use super::types::{EntityId, Sketch, SketchConstraint};
use nalgebra::DVector;
use std::collections::HashMap;

/// A constraint with its entity ids already resolved to unknown-vector slots.
///
/// Resolution happens once at assembly time, so the per-iteration `apply`
/// is pure index arithmetic. Each index here is the x-row of a point
/// (`slot * 2`); the matching y-row is `index + 1`.
#[derive(Debug, Clone)]
enum ResolvedConstraint {
    Horizontal { i1: usize, i2: usize },
    Vertical { i1: usize, i2: usize },
    Parallel { i1: usize, i2: usize, i3: usize, i4: usize },
    Perpendicular { i1: usize, i2: usize, i3: usize, i4: usize },
    Length { i1: usize, i2: usize, value: f64 },
    Angle { i1: usize, i2: usize, tan: f64 },
    CoincidentX { i1: usize, i2: usize },
    CoincidentY { i1: usize, i2: usize },
    FixX { i: usize, value: f64 },
    FixY { i: usize, value: f64 },
}

impl ResolvedConstraint {
    /// Add this constraint's contribution to the residual vector.
    ///
    /// Row `n` is reserved for the constraint equation itself; `x[n]` is the
    /// auxiliary unknown (the Lagrange multiplier) weighting the gradient
    /// terms that go into the touched point rows.
    fn apply(&self, x: &DVector<f64>, y: &mut DVector<f64>, n: usize) {
        let lambda = x[n];
        match *self {
            ResolvedConstraint::Horizontal { i1, i2 } => {
                y[i2 + 1] += lambda;
                y[i1 + 1] -= lambda;
                y[n] = x[i2 + 1] - x[i1 + 1];
            }
            ResolvedConstraint::Vertical { i1, i2 } => {
                y[i2] += lambda;
                y[i1] -= lambda;
                y[n] = x[i2] - x[i1];
            }
            ResolvedConstraint::Parallel { i1, i2, i3, i4 } => {
                y[i1] -= (x[i4 + 1] - x[i3 + 1]) * lambda;
                y[i2] += (x[i4 + 1] - x[i3 + 1]) * lambda;
                y[i3] += (x[i2 + 1] - x[i1 + 1]) * lambda;
                y[i4] -= (x[i2 + 1] - x[i1 + 1]) * lambda;

                y[i1 + 1] += (x[i4] - x[i3]) * lambda;
                y[i2 + 1] -= (x[i4] - x[i3]) * lambda;
                y[i3 + 1] -= (x[i2] - x[i1]) * lambda;
                y[i4 + 1] += (x[i2] - x[i1]) * lambda;

                y[n] = (x[i2] - x[i1]) * (x[i4 + 1] - x[i3 + 1])
                    - (x[i2 + 1] - x[i1 + 1]) * (x[i4] - x[i3]);
            }
            ResolvedConstraint::Perpendicular { i1, i2, i3, i4 } => {
                y[i1] -= (x[i4] - x[i3]) * lambda;
                y[i2] += (x[i4] - x[i3]) * lambda;
                y[i3] -= (x[i2] - x[i1]) * lambda;
                y[i4] += (x[i2] - x[i1]) * lambda;

                y[i1 + 1] -= (x[i4 + 1] - x[i3 + 1]) * lambda;
                y[i2 + 1] += (x[i4 + 1] - x[i3 + 1]) * lambda;
                y[i3 + 1] -= (x[i2 + 1] - x[i1 + 1]) * lambda;
                y[i4 + 1] += (x[i2 + 1] - x[i1 + 1]) * lambda;

                y[n] = (x[i2] - x[i1]) * (x[i4] - x[i3])
                    + (x[i2 + 1] - x[i1 + 1]) * (x[i4 + 1] - x[i3 + 1]);
            }
            ResolvedConstraint::Length { i1, i2, value } => {
                let dx = x[i2] - x[i1];
                let dy = x[i2 + 1] - x[i1 + 1];

                y[i2] += 2.0 * lambda * dx;
                y[i1] -= 2.0 * lambda * dx;
                y[i2 + 1] += 2.0 * lambda * dy;
                y[i1 + 1] -= 2.0 * lambda * dy;

                y[n] = dx * dx + dy * dy - value * value;
            }
            ResolvedConstraint::Angle { i1, i2, tan } => {
                y[i2] -= lambda * tan;
                y[i1] += lambda * tan;
                y[i2 + 1] += lambda;
                y[i1 + 1] -= lambda;

                y[n] = x[i2 + 1] - x[i1 + 1] - (x[i2] - x[i1]) * tan;
            }
            ResolvedConstraint::CoincidentX { i1, i2 } => {
                y[i2] += lambda;
                y[i1] -= lambda;
                y[n] = x[i2] - x[i1];
            }
            ResolvedConstraint::CoincidentY { i1, i2 } => {
                y[i2 + 1] += lambda;
                y[i1 + 1] -= lambda;
                y[n] = x[i2 + 1] - x[i1 + 1];
            }
            ResolvedConstraint::FixX { i, value } => {
                y[i] += lambda;
                y[n] = x[i] - value;
            }
            ResolvedConstraint::FixY { i, value } => {
                y[i + 1] += lambda;
                y[n] = x[i + 1] - value;
            }
        }
    }
}

/// The assembled square system `F(x) = 0` for one solve.
///
/// Unknown layout: all point coordinates first (x, y per point, in arena
/// order), then one auxiliary unknown per constraint, in constraint-list
/// order. `dimension() == 2 * point_count + constraint_count`.
#[derive(Debug)]
pub struct EquationSystem {
    point_ids: Vec<EntityId>,
    /// Current coordinates of every point, flattened; the displacement
    /// objective pulls each unknown toward its entry here.
    targets: Vec<f64>,
    constraints: Vec<ResolvedConstraint>,
}

impl EquationSystem {
    /// Resolve every constraint against the current entity graph.
    ///
    /// Any constraint referencing an entity id that is not in the sketch is
    /// a stale reference and fails the whole assembly before any numeric
    /// work happens.
    pub fn assemble(sketch: &Sketch) -> Result<Self, SolveError> {
        let point_ids: Vec<EntityId> = sketch.points.iter().map(|p| p.id).collect();
        let mut targets = Vec::with_capacity(point_ids.len() * 2);
        for point in &sketch.points {
            targets.push(point.pos[0]);
            targets.push(point.pos[1]);
        }

        let slots: HashMap<EntityId, usize> = point_ids
            .iter()
            .enumerate()
            .map(|(slot, id)| (*id, slot))
            .collect();

        let point_row = |id: EntityId| -> Result<usize, SolveError> {
            slots
                .get(&id)
                .map(|slot| slot * 2)
                .ok_or(SolveError::StaleReference { id })
        };
        let line_rows = |id: EntityId| -> Result<(usize, usize), SolveError> {
            let line = sketch.line(id).ok_or(SolveError::StaleReference { id })?;
            Ok((point_row(line.p1)?, point_row(line.p2)?))
        };

        let mut constraints = Vec::with_capacity(sketch.constraints.len());
        for constraint in &sketch.constraints {
            let resolved = match *constraint {
                SketchConstraint::Horizontal { line } => {
                    let (i1, i2) = line_rows(line)?;
                    ResolvedConstraint::Horizontal { i1, i2 }
                }
                SketchConstraint::Vertical { line } => {
                    let (i1, i2) = line_rows(line)?;
                    ResolvedConstraint::Vertical { i1, i2 }
                }
                SketchConstraint::Parallel { lines } => {
                    let (i1, i2) = line_rows(lines[0])?;
                    let (i3, i4) = line_rows(lines[1])?;
                    ResolvedConstraint::Parallel { i1, i2, i3, i4 }
                }
                SketchConstraint::Perpendicular { lines } => {
                    let (i1, i2) = line_rows(lines[0])?;
                    let (i3, i4) = line_rows(lines[1])?;
                    ResolvedConstraint::Perpendicular { i1, i2, i3, i4 }
                }
                SketchConstraint::Length { line, value } => {
                    let (i1, i2) = line_rows(line)?;
                    ResolvedConstraint::Length { i1, i2, value }
                }
                SketchConstraint::Angle { line, value } => {
                    let (i1, i2) = line_rows(line)?;
                    ResolvedConstraint::Angle { i1, i2, tan: value.to_radians().tan() }
                }
                SketchConstraint::CoincidentX { points } => ResolvedConstraint::CoincidentX {
                    i1: point_row(points[0])?,
                    i2: point_row(points[1])?,
                },
                SketchConstraint::CoincidentY { points } => ResolvedConstraint::CoincidentY {
                    i1: point_row(points[0])?,
                    i2: point_row(points[1])?,
                },
                SketchConstraint::FixX { point, value } => ResolvedConstraint::FixX {
                    i: point_row(point)?,
                    value,
                },
                SketchConstraint::FixY { point, value } => ResolvedConstraint::FixY {
                    i: point_row(point)?,
                    value,
                },
            };
            constraints.push(resolved);
        }

        Ok(Self { point_ids, targets, constraints })
    }

    /// Total unknown count: `2 * points + constraints`.
    pub fn dimension(&self) -> usize {
        self.targets.len() + self.constraints.len()
    }

    pub fn point_count(&self) -> usize {
        self.point_ids.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// All-zero starting point. The displacement rows reference the real
    /// current coordinates as targets, so the first iterations recover the
    /// magnitude; the multipliers genuinely start at zero.
    pub fn initial_guess(&self) -> DVector<f64> {
        DVector::zeros(self.dimension())
    }

    /// Evaluate the residual `F(x)`.
    ///
    /// Point rows carry the stationarity of the minimize-displacement
    /// objective, `2 * (x[n] - target)`, plus the multiplier-weighted
    /// gradients of every constraint touching that point. Constraint rows
    /// carry the constraint equations themselves.
    pub fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut y = DVector::zeros(self.dimension());

        for (n, target) in self.targets.iter().enumerate() {
            y[n] = 2.0 * (x[n] - target);
        }

        let base = self.targets.len();
        for (i, constraint) in self.constraints.iter().enumerate() {
            constraint.apply(x, &mut y, base + i);
        }

        y
    }

    /// Write solved coordinates back onto the owning points, rounded to one
    /// decimal place to match on-screen resolution. Uses the slot order
    /// established at assembly time.
    pub fn commit(&self, sketch: &mut Sketch, x: &DVector<f64>) {
        for (slot, id) in self.point_ids.iter().enumerate() {
            if let Some(point) = sketch.point_mut(*id) {
                point.pos = [round_display(x[slot * 2]), round_display(x[slot * 2 + 1])];
            }
        }
    }
}

fn round_display(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
