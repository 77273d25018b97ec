use crate::sketch::solver::SolveError;
use crate::sketch::system::EquationSystem;
use crate::sketch::types::{EntityId, Sketch, SketchConstraint};
use nalgebra::DVector;

#[test]
fn test_system_dimension_invariant() {
    let mut sketch = Sketch::new();
    let l1 = sketch.add_line_between([0.0, 0.0], [10.0, 0.0]);
    let l2 = sketch.add_line_between([0.0, 5.0], [10.0, 5.0]);
    let center = sketch.add_point([3.0, 3.0]);
    sketch.add_circle(center, 2.0);

    sketch.add_constraint(SketchConstraint::Horizontal { line: l1 });
    sketch.add_constraint(SketchConstraint::Parallel { lines: [l1, l2] });
    sketch.add_constraint(SketchConstraint::FixX { point: center, value: 3.0 });

    let system = EquationSystem::assemble(&sketch).expect("assembly should succeed");

    // len(unknowns) == 2 * num_points + num_constraints
    assert_eq!(system.point_count(), 5);
    assert_eq!(system.constraint_count(), 3);
    assert_eq!(system.dimension(), 2 * 5 + 3);
    assert_eq!(system.initial_guess().len(), system.dimension());
}

#[test]
fn test_initial_guess_is_zero() {
    let mut sketch = Sketch::new();
    sketch.add_line_between([4.0, 4.0], [8.0, 8.0]);

    let system = EquationSystem::assemble(&sketch).expect("assembly should succeed");
    assert!(system.initial_guess().iter().all(|v| *v == 0.0));
}

#[test]
fn test_residual_at_zero_encodes_current_coordinates() {
    // With x = 0 and no constraints, each row is -2 * current coordinate,
    // in point insertion order.
    let mut sketch = Sketch::new();
    sketch.add_point([1.0, 2.0]);
    sketch.add_point([-3.0, 0.5]);

    let system = EquationSystem::assemble(&sketch).expect("assembly should succeed");
    let y = system.residual(&system.initial_guess());

    let expected = [-2.0, -4.0, 6.0, -1.0];
    for (row, want) in expected.iter().enumerate() {
        assert!((y[row] - want).abs() < 1e-12, "row {}: {} != {}", row, y[row], want);
    }
}

#[test]
fn test_residual_zero_at_satisfied_solution() {
    // An already-horizontal line with zero multiplier is an exact root.
    let mut sketch = Sketch::new();
    let l1 = sketch.add_line_between([0.0, 2.0], [8.0, 2.0]);
    sketch.add_constraint(SketchConstraint::Horizontal { line: l1 });

    let system = EquationSystem::assemble(&sketch).expect("assembly should succeed");
    let x = DVector::from_vec(vec![0.0, 2.0, 8.0, 2.0, 0.0]);
    let y = system.residual(&x);

    assert!(y.iter().all(|v| v.abs() < 1e-12), "residual should vanish: {:?}", y);
}

#[test]
fn test_constraint_row_reports_violation() {
    // A diagonal line violates Horizontal; the reserved constraint row holds
    // the constraint equation y2 - y1.
    let mut sketch = Sketch::new();
    let l1 = sketch.add_line_between([0.0, 0.0], [8.0, 3.0]);
    sketch.add_constraint(SketchConstraint::Horizontal { line: l1 });

    let system = EquationSystem::assemble(&sketch).expect("assembly should succeed");
    let x = DVector::from_vec(vec![0.0, 0.0, 8.0, 3.0, 0.0]);
    let y = system.residual(&x);

    assert!((y[4] - 3.0).abs() < 1e-12, "constraint row should carry the violation");
}

#[test]
fn test_stale_point_reference_fails_assembly() {
    let mut sketch = Sketch::new();
    let p1 = sketch.add_point([0.0, 0.0]);
    let ghost = EntityId::new();
    sketch.add_constraint(SketchConstraint::CoincidentX { points: [p1, ghost] });

    let err = EquationSystem::assemble(&sketch).expect_err("stale point must be rejected");
    assert_eq!(err, SolveError::StaleReference { id: ghost });
}

#[test]
fn test_stale_line_endpoint_fails_assembly() {
    // The line exists but one of its endpoints was deleted underneath it.
    let mut sketch = Sketch::new();
    let l1 = sketch.add_line_between([0.0, 0.0], [5.0, 5.0]);
    let dangling = sketch.lines[0].p2;
    sketch.points.retain(|p| p.id != dangling);
    sketch.add_constraint(SketchConstraint::Horizontal { line: l1 });

    let err = EquationSystem::assemble(&sketch).expect_err("dangling endpoint must be rejected");
    assert_eq!(err, SolveError::StaleReference { id: dangling });
}

#[test]
fn test_commit_rounds_to_display_resolution() {
    let mut sketch = Sketch::new();
    sketch.add_point([0.0, 0.0]);

    let system = EquationSystem::assemble(&sketch).expect("assembly should succeed");
    let x = DVector::from_vec(vec![2.3499, -1.2501]);
    system.commit(&mut sketch, &x);

    assert_eq!(sketch.points[0].pos, [2.3, -1.3]);
}
