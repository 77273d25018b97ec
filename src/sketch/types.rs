use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a sketch entity (point, line, circle).
/// Wraps Uuid for strong typing; entities are always referenced by id,
/// never copied, so two points with equal coordinates remain distinct unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a new random EntityId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an ID from a specific UUID (useful for restoration).
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create a deterministic ID based on a string seed (e.g. "Sketch1_Origin").
    pub fn new_deterministic(seed: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A solver-owned 2D point. The only mutable state the solver writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointEntity {
    pub id: EntityId,
    pub pos: [f64; 2],
}

/// A line holds its endpoints by reference; endpoints may be shared with
/// other lines or circles, and mutations through the solver are visible
/// to every holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineEntity {
    pub id: EntityId,
    pub p1: EntityId,
    pub p2: EntityId,
}

/// A circle is a center point reference plus a scalar radius.
/// The radius is not a solver unknown in the current constraint set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleEntity {
    pub id: EntityId,
    pub center: EntityId,
    pub radius: f64,
}

/// The closed set of constraint kinds. Each variant carries the entity ids
/// it touches plus its immutable parameters; the equation assembler matches
/// on the kind to emit the right residual rows and gradient terms, so there
/// is no virtual dispatch in the per-iteration loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SketchConstraint {
    /// Line endpoints share the same y coordinate.
    Horizontal { line: EntityId },
    /// Line endpoints share the same x coordinate.
    Vertical { line: EntityId },
    /// Two lines have parallel directions (zero cross product).
    Parallel { lines: [EntityId; 2] },
    /// Two lines have orthogonal directions (zero dot product).
    Perpendicular { lines: [EntityId; 2] },
    /// Line has the given length.
    Length { line: EntityId, value: f64 },
    /// Line makes the given angle with the x axis, in degrees.
    Angle { line: EntityId, value: f64 },
    /// Two points share the same x coordinate.
    CoincidentX { points: [EntityId; 2] },
    /// Two points share the same y coordinate.
    CoincidentY { points: [EntityId; 2] },
    /// Pin a point's x coordinate to a value.
    FixX { point: EntityId, value: f64 },
    /// Pin a point's y coordinate to a value.
    FixY { point: EntityId, value: f64 },
}

/// The live entity graph plus the ordered constraint list.
///
/// Entities live in `Vec` arenas so iteration order is stable and
/// deterministic: the solver's unknown ordering is point insertion order,
/// and it must not change between the initial guess and any residual
/// evaluation of a single solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Sketch {
    pub points: Vec<PointEntity>,
    pub lines: Vec<LineEntity>,
    pub circles: Vec<CircleEntity>,
    pub constraints: Vec<SketchConstraint>,
}

impl Sketch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, pos: [f64; 2]) -> EntityId {
        let id = EntityId::new();
        self.points.push(PointEntity { id, pos });
        id
    }

    /// Add a line between two existing points. The points may already be
    /// endpoints of other lines; sharing is by id.
    pub fn add_line(&mut self, p1: EntityId, p2: EntityId) -> EntityId {
        let id = EntityId::new();
        self.lines.push(LineEntity { id, p1, p2 });
        id
    }

    /// Convenience: create both endpoints and the line in one call.
    pub fn add_line_between(&mut self, start: [f64; 2], end: [f64; 2]) -> EntityId {
        let p1 = self.add_point(start);
        let p2 = self.add_point(end);
        self.add_line(p1, p2)
    }

    pub fn add_circle(&mut self, center: EntityId, radius: f64) -> EntityId {
        let id = EntityId::new();
        self.circles.push(CircleEntity { id, center, radius });
        id
    }

    pub fn add_constraint(&mut self, constraint: SketchConstraint) {
        self.constraints.push(constraint);
    }

    pub fn point(&self, id: EntityId) -> Option<&PointEntity> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn point_mut(&mut self, id: EntityId) -> Option<&mut PointEntity> {
        self.points.iter_mut().find(|p| p.id == id)
    }

    pub fn line(&self, id: EntityId) -> Option<&LineEntity> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn circle(&self, id: EntityId) -> Option<&CircleEntity> {
        self.circles.iter().find(|c| c.id == id)
    }

    /// Current position of a point, if it exists.
    pub fn position(&self, id: EntityId) -> Option<[f64; 2]> {
        self.point(id).map(|p| p.pos)
    }
}
