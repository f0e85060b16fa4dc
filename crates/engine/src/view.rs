use foundation::{Coordinate, Extent, ResolutionRange};
use layers::{DOOR_RESOLUTION, FLOOR_RESOLUTION};
use scene::{Feature, FeatureKind};
use serde::{Deserialize, Serialize};

/// Resolution of zoom level 0 in Web Mercator.
pub const ZOOM_0_RESOLUTION: f64 = 156543.03392804097;
/// Below this `sqrt(enlarged area)`, clamped moves use the short ratio.
pub const SMALL_MAP_DIAGONAL: f64 = 10000.0;
const MAX_DURATION_RATIO: f64 = 5.0;
const SMALL_MAP_DURATION_RATIO: f64 = 2.5;

/// Resolution geolocation moves end at (zoom 18).
pub const GEOLOCATION_RESOLUTION: f64 = 0.59;
/// Resolution a far geolocation move zooms out to at least (zoom 17).
pub const GEOLOCATION_ZOOM_OUT_RESOLUTION: f64 = 1.19;
/// View extent buffer, in pixels, inside which geolocation skips zooming out.
const GEOLOCATION_BUFFER_PX: f64 = 100.0;

pub fn zoom_to_resolution(zoom: f64) -> f64 {
    ZOOM_0_RESOLUTION / 2f64.powf(zoom)
}

/// The external map view as last reported.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub center: Coordinate,
    pub resolution: f64,
    /// Radians.
    #[serde(default)]
    pub rotation: f64,
    /// Viewport size in pixels.
    pub size: [f64; 2],
}

impl ViewState {
    pub fn extent(&self) -> Extent {
        Extent::for_view(self.center, self.resolution, self.rotation, self.size)
    }

    /// Extent the view would show centred on `center` at `resolution`.
    pub fn extent_at(&self, center: Coordinate, resolution: f64) -> Extent {
        Extent::for_view(center, resolution, self.rotation, self.size)
    }

    /// Resolution at which `extent` just fits the viewport.
    pub fn fit_resolution(&self, extent: &Extent) -> f64 {
        (extent.width() / self.size[0]).max(extent.height() / self.size[1])
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum AnimationTarget {
    Center(Coordinate),
    Extent(Extent),
}

/// One move request for the map view, consumed once.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationRequest {
    /// `None` keeps the current centre.
    pub target: Option<AnimationTarget>,
    pub resolution: Option<f64>,
    pub duration_ms: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CameraMove {
    Single(AnimationRequest),
    /// `second` starts when `first` ends.
    TwoPhase {
        first: AnimationRequest,
        second: AnimationRequest,
    },
}

impl CameraMove {
    pub fn total_duration_ms(&self) -> f64 {
        match self {
            CameraMove::Single(r) => r.duration_ms,
            CameraMove::TwoPhase { first, second } => first.duration_ms + second.duration_ms,
        }
    }
}

/// Move duration between extents `a` and `b`, in milliseconds.
///
/// `ratio = sqrt(enlarged) / sqrt(area(a) + area(b))`, where `enlarged` is
/// the area of their union. Ratios above 5 are clamped to 2.5 for moves
/// within a small map and to 5 otherwise.
pub fn animation_duration(a: &Extent, b: &Extent) -> f64 {
    let diagonal = a.enlarged_area(b).sqrt();
    let mut ratio = diagonal / (a.area() + b.area()).sqrt();
    if ratio.is_nan() {
        ratio = 0.0;
    }
    if ratio > MAX_DURATION_RATIO {
        ratio = if diagonal < SMALL_MAP_DIAGONAL {
            SMALL_MAP_DURATION_RATIO
        } else {
            MAX_DURATION_RATIO
        };
    }
    ratio * 1000.0
}

/// Centres the view on `point` at `resolution`.
pub fn center_on(view: &ViewState, point: Coordinate, resolution: f64) -> AnimationRequest {
    let future = view.extent_at(point, resolution);
    AnimationRequest {
        target: Some(AnimationTarget::Center(point)),
        resolution: Some(resolution),
        duration_ms: animation_duration(&view.extent(), &future),
    }
}

/// Fits the view to `extent`.
pub fn fit(view: &ViewState, extent: Extent) -> AnimationRequest {
    AnimationRequest {
        target: Some(AnimationTarget::Extent(extent)),
        resolution: None,
        duration_ms: animation_duration(&view.extent(), &extent),
    }
}

/// Resolutions at which `feature` shows its indoor detail.
pub fn detail_range(feature: &Feature) -> ResolutionRange {
    if feature.kind() == FeatureKind::Door {
        DOOR_RESOLUTION
    } else {
        FLOOR_RESOLUTION
    }
}

/// Point a single-feature move centres on: the extent centre for point-like
/// features, else the point of the geometry nearest the click.
pub fn feature_anchor(feature: &Feature, clicked: Coordinate) -> Option<Coordinate> {
    let geometry = feature.geometry()?;
    if feature.is_point_like() {
        Some(geometry.extent().center())
    } else {
        Some(geometry.anchor_for_click(clicked))
    }
}

/// Move into the indoor detail of a clicked feature. `None` when the view
/// already shows it.
pub fn feature_move(view: &ViewState, feature: &Feature, clicked: Coordinate) -> Option<CameraMove> {
    let range = detail_range(feature);
    if range.contains(view.resolution) {
        return None;
    }
    let anchor = feature_anchor(feature, clicked)?;
    Some(CameraMove::Single(center_on(view, anchor, range.max)))
}

/// Extent covering every feature with geometry.
pub fn extent_of<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Extent {
    let mut out = Extent::empty();
    for f in features {
        if let Some(e) = f.extent() {
            out.extend(&e);
        }
    }
    out
}

/// Move for a clicked cluster.
///
/// One member behaves like a click on that member, except that custom
/// markers are always zoomed to. Several members fit their common extent,
/// snapped to the indoor resolution around its centre when the extent would
/// be shown closer in than that.
pub fn cluster_move(view: &ViewState, members: &[Feature]) -> Option<CameraMove> {
    match members {
        [] => None,
        [only] => {
            let range = detail_range(only);
            if !only.is_custom_marker() && range.contains(view.resolution) {
                return None;
            }
            let center = only.extent()?.center();
            Some(CameraMove::Single(center_on(view, center, range.max)))
        }
        _ => {
            let extent = extent_of(members);
            if extent.is_empty() {
                return None;
            }
            if view.fit_resolution(&extent) < FLOOR_RESOLUTION.max {
                return Some(CameraMove::Single(center_on(view, extent.center(), FLOOR_RESOLUTION.max)));
            }
            Some(CameraMove::Single(fit(view, extent)))
        }
    }
}

/// Move to a geolocated position.
///
/// A target within the view extent buffered by a hundred pixels is centred on
/// directly. Farther targets first zoom out far enough to show both positions,
/// then zoom in on the target; each phase takes half of the duration. The pan
/// spans both phases, so the first one ends halfway to the target.
pub fn geolocation_move(view: &ViewState, target: Coordinate) -> CameraMove {
    let buffered = view.extent().buffer(view.resolution * GEOLOCATION_BUFFER_PX);
    let duration = animation_duration(&buffered, &Extent::from_coordinate(target));
    if buffered.contains(target) {
        return CameraMove::Single(AnimationRequest {
            target: Some(AnimationTarget::Center(target)),
            resolution: Some(GEOLOCATION_RESOLUTION),
            duration_ms: duration,
        });
    }
    let both = Extent::bounding([target, view.center]);
    let halfway = [(view.center[0] + target[0]) / 2.0, (view.center[1] + target[1]) / 2.0];
    CameraMove::TwoPhase {
        first: AnimationRequest {
            target: Some(AnimationTarget::Center(halfway)),
            resolution: Some(view.fit_resolution(&both).max(GEOLOCATION_ZOOM_OUT_RESOLUTION)),
            duration_ms: duration / 2.0,
        },
        second: AnimationRequest {
            target: Some(AnimationTarget::Center(target)),
            resolution: Some(GEOLOCATION_RESOLUTION),
            duration_ms: duration / 2.0,
        },
    }
}

/// Pixels of margin kept around fitted reset targets.
const RESET_FIT_MARGIN_PX: f64 = 30.0;

/// Initial move after a reset.
///
/// Targets (zoom-to features, else markers) are fitted with a margin unless a
/// centre or zoom was required; a required zoom alone centres on the targets.
/// Custom marker targets are never shown closer in than floor detail. Moves
/// that do not overlap the current view jump without animation.
pub fn reset_move(
    view: &ViewState,
    targets: &[Feature],
    center: Option<Coordinate>,
    resolution: Option<f64>,
) -> Option<CameraMove> {
    let extent = extent_of(targets);
    let (target, future, resolution) = if extent.is_empty() {
        if center.is_none() && resolution.is_none() {
            return None;
        }
        let c = center.unwrap_or(view.center);
        let r = resolution.unwrap_or(view.resolution);
        (AnimationTarget::Center(c), view.extent_at(c, r), Some(r))
    } else if center.is_none() && resolution.is_none() {
        let margin = view.fit_resolution(&extent) * RESET_FIT_MARGIN_PX;
        let fitted = extent.buffer(margin);
        let snap = targets.first().is_some_and(Feature::is_custom_marker)
            && view.fit_resolution(&fitted) < FLOOR_RESOLUTION.max;
        if snap {
            let c = fitted.center();
            (AnimationTarget::Center(c), view.extent_at(c, FLOOR_RESOLUTION.max), Some(FLOOR_RESOLUTION.max))
        } else {
            (AnimationTarget::Extent(fitted), fitted, None)
        }
    } else {
        let c = center.unwrap_or_else(|| extent.center());
        let r = resolution.unwrap_or(view.resolution);
        (AnimationTarget::Center(c), view.extent_at(c, r), Some(r))
    };
    let current = view.extent();
    let duration_ms = if current.intersects(&future) {
        animation_duration(&current, &future)
    } else {
        0.0
    };
    Some(CameraMove::Single(AnimationRequest {
        target: Some(target),
        resolution,
        duration_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::{CustomMarker, Geometry, Room};

    fn view(center: Coordinate, resolution: f64) -> ViewState {
        ViewState {
            center,
            resolution,
            rotation: 0.0,
            size: [1000.0, 500.0],
        }
    }

    fn room(code: &str, min: Coordinate, max: Coordinate) -> Feature {
        Feature::Room(Room {
            code: code.into(),
            title: None,
            detail: None,
            geometry: Some(Geometry::Polygon(vec![vec![min, [max[0], min[1]], max, [min[0], max[1]], min]])),
        })
    }

    #[test]
    fn duration_of_equal_neighbouring_extents() {
        let a = Extent::new([0.0, 0.0], [10.0, 10.0]);
        let b = Extent::new([10.0, 10.0], [20.0, 20.0]);
        let d = animation_duration(&a, &b);
        assert!((d - 1414.2).abs() < 0.1, "{d}");
    }

    #[test]
    fn runaway_ratios_are_clamped() {
        let room = Extent::new([0.0, 0.0], [1.0, 1.0]);
        let near = Extent::new([100.0, 100.0], [101.0, 101.0]);
        assert_eq!(animation_duration(&room, &near), 2500.0);
        let far = Extent::new([20000.0, 20000.0], [20001.0, 20001.0]);
        assert_eq!(animation_duration(&room, &far), 5000.0);
        let p = Extent::from_coordinate([0.0, 0.0]);
        assert_eq!(animation_duration(&p, &p), 0.0);
    }

    #[test]
    fn zoom_levels_halve_resolution() {
        assert_eq!(zoom_to_resolution(0.0), ZOOM_0_RESOLUTION);
        assert!((zoom_to_resolution(18.0) - 0.597).abs() < 0.001);
    }

    #[test]
    fn feature_move_skips_when_detail_is_visible() {
        let r = room("BMB01N02001", [0.0, 0.0], [10.0, 10.0]);
        assert_eq!(feature_move(&view([0.0, 0.0], 0.2), &r, [1.0, 1.0]), None);
        let Some(CameraMove::Single(req)) = feature_move(&view([0.0, 0.0], 5.0), &r, [1.0, 1.0]) else {
            panic!("expected a move");
        };
        assert_eq!(req.target, Some(AnimationTarget::Center([5.0, 5.0])));
        assert_eq!(req.resolution, Some(FLOOR_RESOLUTION.max));
    }

    #[test]
    fn cluster_of_many_fits_or_snaps() {
        let a = room("BMB01N02001", [0.0, 0.0], [10.0, 10.0]);
        let b = room("BMB01N02002", [20.0, 0.0], [30.0, 10.0]);
        // 30 units over 1000 px fit at 0.03, closer than floor detail.
        let Some(CameraMove::Single(req)) = cluster_move(&view([0.0, 0.0], 5.0), &[a.clone(), b]) else {
            panic!("expected a move");
        };
        assert_eq!(req.target, Some(AnimationTarget::Center([15.0, 5.0])));
        assert_eq!(req.resolution, Some(FLOOR_RESOLUTION.max));

        let far = room("BMB01N02003", [2000.0, 0.0], [2010.0, 10.0]);
        let Some(CameraMove::Single(req)) = cluster_move(&view([0.0, 0.0], 5.0), &[a, far]) else {
            panic!("expected a move");
        };
        assert_eq!(req.target, Some(AnimationTarget::Extent(Extent::new([0.0, 0.0], [2010.0, 10.0]))));
        assert_eq!(req.resolution, None);
    }

    #[test]
    fn single_custom_marker_is_always_zoomed_to() {
        let m = Feature::CustomMarker(CustomMarker {
            id: "m".into(),
            label: None,
            detail: None,
            geometry: Geometry::Point([3.0, 4.0]),
        });
        let Some(CameraMove::Single(req)) = cluster_move(&view([0.0, 0.0], 0.1), &[m]) else {
            panic!("expected a move");
        };
        assert_eq!(req.target, Some(AnimationTarget::Center([3.0, 4.0])));
    }

    #[test]
    fn geolocation_nearby_is_one_phase() {
        let v = view([0.0, 0.0], 1.0);
        // View spans 1000 x 500; buffered by 100 units on each side.
        let CameraMove::Single(req) = geolocation_move(&v, [550.0, 0.0]) else {
            panic!("expected one phase");
        };
        assert_eq!(req.target, Some(AnimationTarget::Center([550.0, 0.0])));
        assert_eq!(req.resolution, Some(GEOLOCATION_RESOLUTION));
    }

    #[test]
    fn geolocation_far_away_zooms_out_first() {
        let v = view([0.0, 0.0], 1.0);
        let mv = geolocation_move(&v, [10000.0, 0.0]);
        let CameraMove::TwoPhase { first, second } = mv else {
            panic!("expected two phases");
        };
        assert_eq!(first.target, Some(AnimationTarget::Center([5000.0, 0.0])));
        assert_eq!(second.target, Some(AnimationTarget::Center([10000.0, 0.0])));
        assert_eq!(first.resolution, Some(10.0));
        assert_eq!(second.resolution, Some(GEOLOCATION_RESOLUTION));
        assert_eq!(first.duration_ms, second.duration_ms);

        let close = geolocation_move(&v, [1000.0, 0.0]);
        let CameraMove::TwoPhase { first, .. } = close else {
            panic!("expected two phases");
        };
        assert_eq!(first.resolution, Some(GEOLOCATION_ZOOM_OUT_RESOLUTION));
    }

    #[test]
    fn reset_move_fits_targets_with_margin() {
        let v = view([0.0, 0.0], 1.0);
        let far = room("BMB01N02001", [1e6, 1e6], [1e6 + 1000.0, 1e6 + 10.0]);
        let Some(CameraMove::Single(req)) = reset_move(&v, &[far.clone()], None, None) else {
            panic!("expected a move");
        };
        // Fits at 1.0 per pixel, so the margin is 30 units.
        assert_eq!(
            req.target,
            Some(AnimationTarget::Extent(Extent::new([1e6 - 30.0, 1e6 - 30.0], [1e6 + 1030.0, 1e6 + 40.0])))
        );
        assert_eq!(req.duration_ms, 0.0);

        let Some(CameraMove::Single(req)) = reset_move(&v, &[far], None, Some(0.5)) else {
            panic!("expected a move");
        };
        assert_eq!(req.target, Some(AnimationTarget::Center([1e6 + 500.0, 1e6 + 5.0])));
        assert_eq!(req.resolution, Some(0.5));
    }

    #[test]
    fn reset_move_without_targets_uses_required_view() {
        let v = view([0.0, 0.0], 1.0);
        assert_eq!(reset_move(&v, &[], None, None), None);
        let Some(CameraMove::Single(req)) = reset_move(&v, &[], None, Some(0.5)) else {
            panic!("expected a move");
        };
        assert_eq!(req.target, Some(AnimationTarget::Center([0.0, 0.0])));
        assert!(req.duration_ms > 0.0);
    }

    #[test]
    fn custom_marker_targets_stop_at_floor_detail() {
        let v = view([0.0, 0.0], 1.0);
        let m = Feature::CustomMarker(CustomMarker {
            id: "m".into(),
            label: None,
            detail: None,
            geometry: Geometry::Point([3.0, 4.0]),
        });
        let Some(CameraMove::Single(req)) = reset_move(&v, &[m], None, None) else {
            panic!("expected a move");
        };
        assert_eq!(req.target, Some(AnimationTarget::Center([3.0, 4.0])));
        assert_eq!(req.resolution, Some(FLOOR_RESOLUTION.max));
    }
}
