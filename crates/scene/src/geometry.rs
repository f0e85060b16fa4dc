use foundation::{Coordinate, Extent};
use serde::{Deserialize, Serialize};

/// Feature geometry in projected map units, GeoJSON shaped.
///
/// Polygons are lists of rings; the first ring is the exterior. Holes are
/// handled with the even-odd rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coordinate),
    Polygon(Vec<Vec<Coordinate>>),
    MultiPolygon(Vec<Vec<Vec<Coordinate>>>),
}

impl Geometry {
    pub fn extent(&self) -> Extent {
        match self {
            Geometry::Point(c) => Extent::from_coordinate(*c),
            Geometry::Polygon(rings) => Extent::bounding(rings.iter().flatten().copied()),
            Geometry::MultiPolygon(polys) => {
                Extent::bounding(polys.iter().flatten().flatten().copied())
            }
        }
    }

    fn polygons(&self) -> Vec<&[Vec<Coordinate>]> {
        match self {
            Geometry::Point(_) => Vec::new(),
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polys) => polys.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Whether `c` lies inside the geometry. Points contain only themselves.
    pub fn contains(&self, c: Coordinate) -> bool {
        match self {
            Geometry::Point(p) => *p == c,
            _ => self.polygons().into_iter().any(|rings| polygon_contains(rings, c)),
        }
    }

    /// A point guaranteed to lie inside the geometry (for polygons) found by
    /// scanning the horizontal line through the extent centre and taking the
    /// middle of the widest inside segment. For multipolygons the largest
    /// part by extent area is used.
    pub fn interior_point(&self) -> Coordinate {
        match self {
            Geometry::Point(p) => *p,
            Geometry::Polygon(rings) => polygon_interior_point(rings),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .max_by(|a, b| {
                    let ea = Extent::bounding(a.iter().flatten().copied()).area();
                    let eb = Extent::bounding(b.iter().flatten().copied()).area();
                    ea.total_cmp(&eb)
                })
                .map(|rings| polygon_interior_point(rings))
                .unwrap_or_else(|| self.extent().center()),
        }
    }

    /// Nearest point of the geometry to `c`. Inside an area this is `c`
    /// itself; outside it is the nearest point on a ring.
    pub fn closest_point(&self, c: Coordinate) -> Coordinate {
        if let Geometry::Point(p) = self {
            return *p;
        }
        if self.contains(c) {
            return c;
        }
        let mut best: Option<(f64, Coordinate)> = None;
        for rings in self.polygons() {
            for ring in rings {
                for seg in ring.windows(2) {
                    let p = closest_on_segment(seg[0], seg[1], c);
                    let d = distance_sq(p, c);
                    if best.is_none_or(|(bd, _)| d < bd) {
                        best = Some((d, p));
                    }
                }
            }
        }
        best.map(|(_, p)| p).unwrap_or_else(|| self.extent().center())
    }

    /// Where a click on this feature should centre the view: the clicked
    /// coordinate when it falls inside the geometry, otherwise the interior
    /// point.
    pub fn anchor_for_click(&self, clicked: Coordinate) -> Coordinate {
        if self.contains(clicked) {
            self.closest_point(clicked)
        } else {
            self.interior_point()
        }
    }
}

fn distance_sq(a: Coordinate, b: Coordinate) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

fn closest_on_segment(a: Coordinate, b: Coordinate, p: Coordinate) -> Coordinate {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return a;
    }
    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0);
    [a[0] + t * dx, a[1] + t * dy]
}

fn polygon_contains(rings: &[Vec<Coordinate>], c: Coordinate) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (pi, pj) = (ring[i], ring[j]);
            if (pi[1] > c[1]) != (pj[1] > c[1])
                && c[0] < (pj[0] - pi[0]) * (c[1] - pi[1]) / (pj[1] - pi[1]) + pi[0]
            {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}

fn polygon_interior_point(rings: &[Vec<Coordinate>]) -> Coordinate {
    let extent = Extent::bounding(rings.iter().flatten().copied());
    if extent.is_empty() {
        return [0.0, 0.0];
    }
    let y = extent.center()[1];
    let mut xs: Vec<f64> = Vec::new();
    for ring in rings {
        let n = ring.len();
        if n < 2 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (ring[j], ring[i]);
            if (a[1] <= y && b[1] > y) || (b[1] <= y && a[1] > y) {
                xs.push((y - a[1]) / (b[1] - a[1]) * (b[0] - a[0]) + a[0]);
            }
            j = i;
        }
    }
    xs.sort_by(f64::total_cmp);
    let mut best: Option<(f64, f64)> = None;
    for pair in xs.chunks_exact(2) {
        let width = pair[1] - pair[0];
        if best.is_none_or(|(w, _)| width > w) {
            best = Some((width, (pair[0] + pair[1]) / 2.0));
        }
    }
    match best {
        Some((_, x)) => [x, y],
        None => extent.center(),
    }
}
