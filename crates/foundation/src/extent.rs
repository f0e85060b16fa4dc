/// Map coordinate in projected units (`[x, y]`).
pub type Coordinate = [f64; 2];

/// Axis-aligned extent in projected map units.
///
/// An extent with `min > max` on either axis is empty. `Extent::empty()` is the
/// identity for `extend`.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Extent {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Extent {
    pub fn new(min: Coordinate, max: Coordinate) -> Self {
        Extent { min, max }
    }

    pub fn empty() -> Self {
        Extent {
            min: [f64::INFINITY, f64::INFINITY],
            max: [f64::NEG_INFINITY, f64::NEG_INFINITY],
        }
    }

    /// Degenerate extent around a single coordinate.
    pub fn from_coordinate(c: Coordinate) -> Self {
        Extent { min: c, max: c }
    }

    /// Smallest extent containing all `coords`. Empty when `coords` is empty.
    pub fn bounding(coords: impl IntoIterator<Item = Coordinate>) -> Self {
        let mut out = Extent::empty();
        for c in coords {
            out.extend_coordinate(c);
        }
        out
    }

    /// Extent of the view rectangle centred on `center` at `resolution`,
    /// rotated by `rotation` radians, for a viewport of `size` pixels.
    pub fn for_view(center: Coordinate, resolution: f64, rotation: f64, size: [f64; 2]) -> Self {
        let dx = resolution * size[0] / 2.0;
        let dy = resolution * size[1] / 2.0;
        let (sin, cos) = rotation.sin_cos();
        let corners = [[-dx, -dy], [-dx, dy], [dx, -dy], [dx, dy]];
        Extent::bounding(corners.iter().map(|[x, y]| {
            [
                center[0] + x * cos - y * sin,
                center[1] + x * sin + y * cos,
            ]
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.max[0] < self.min[0] || self.max[1] < self.min[1]
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max[0] - self.min[0] }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max[1] - self.min[1] }
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Coordinate {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }

    pub fn extend_coordinate(&mut self, c: Coordinate) {
        self.min[0] = self.min[0].min(c[0]);
        self.min[1] = self.min[1].min(c[1]);
        self.max[0] = self.max[0].max(c[0]);
        self.max[1] = self.max[1].max(c[1]);
    }

    pub fn extend(&mut self, other: &Extent) {
        if other.is_empty() {
            return;
        }
        self.extend_coordinate(other.min);
        self.extend_coordinate(other.max);
    }

    /// Extent covering both `self` and `other`.
    pub fn union(&self, other: &Extent) -> Extent {
        let mut out = *self;
        out.extend(other);
        out
    }

    /// Area of the union extent of `self` and `other`.
    pub fn enlarged_area(&self, other: &Extent) -> f64 {
        self.union(other).area()
    }

    /// Grow by `value` map units on every side.
    pub fn buffer(&self, value: f64) -> Extent {
        if self.is_empty() {
            return *self;
        }
        Extent {
            min: [self.min[0] - value, self.min[1] - value],
            max: [self.max[0] + value, self.max[1] + value],
        }
    }

    /// Inclusive on all edges.
    pub fn contains(&self, c: Coordinate) -> bool {
        c[0] >= self.min[0] && c[0] <= self.max[0] && c[1] >= self.min[1] && c[1] <= self.max[1]
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min[0] <= other.max[0]
            && self.max[0] >= other.min[0]
            && self.min[1] <= other.max[1]
            && self.max[1] >= other.min[1]
    }

    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }
}
