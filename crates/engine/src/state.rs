use foundation::{Coordinate, FloorLayerId};
use layers::{
    ClusterDelta, ClusterMembership, FLOOR_RESOLUTION, Hit, HitTarget, LayerId, main_features, popup_feature,
};
use runtime::{BatchContext, Reducer};
use scene::selection::{self, ClickTarget, Selection};
use scene::{Feature, FeatureKey, FeatureKind, LocationCode, location};
use streaming::{FeatureLoader, LoadCoordinator};
use tracing::{debug, info, warn};

use crate::action::{Action, Identified, LoadOrigin, MapEvent};
use crate::effects::{self, Effect};
use crate::options::ResetOptions;
use crate::view::{self, CameraMove, ViewState};

type Cx<'a> = BatchContext<'a, Action, MapEvent, Effect>;

/// Outstanding loads of the current reset.
#[derive(Debug, Clone, Default, PartialEq)]
struct ResetProgress {
    markers_pending: bool,
    zoom_to_pending: bool,
    zoom_to: Vec<Feature>,
}

/// Everything one map instance knows besides the feature stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub selection: Selection,
    /// Floors displayed as selected; see [`selection::active_floor_codes`].
    pub active_floors: Vec<LocationCode>,
    pub view: Option<ViewState>,
    pub info_visible: bool,
    pub popup: Option<FeatureKey>,
    pub options: ResetOptions,
    /// Bumped by every reset. Completions from older generations are stale.
    pub generation: u64,
    /// Floor whose layer load is outstanding.
    pub pending_floor: Option<LocationCode>,
    reset: Option<ResetProgress>,
}

impl MapState {
    pub fn selected(&self) -> Option<&LocationCode> {
        self.selection.selected_feature()
    }

    pub fn is_resetting(&self) -> bool {
        self.reset.is_some()
    }
}

/// Applies actions to the map state, starting loads as effects.
///
/// Notes:
/// - Stale completions are dropped here: a completion from an older reset
///   generation, or one whose target no longer matches the selection, leaves
///   state untouched.
/// - The feature stores are mutated only through the load coordinator.
pub struct MapReducer<L> {
    state: MapState,
    loads: LoadCoordinator<L>,
    clusters: ClusterMembership,
}

impl<L: FeatureLoader + 'static> MapReducer<L> {
    pub fn new(loads: LoadCoordinator<L>) -> Self {
        Self {
            state: MapState::default(),
            loads,
            clusters: ClusterMembership::new(),
        }
    }

    pub fn state(&self) -> &MapState {
        &self.state
    }

    pub fn loads(&self) -> &LoadCoordinator<L> {
        &self.loads
    }

    pub fn clusters(&self) -> &ClusterMembership {
        &self.clusters
    }

    fn on_clicked(&mut self, hit: Hit, coordinate: Coordinate, cx: &mut Cx<'_>) {
        match hit.target {
            HitTarget::Feature { key } => self.on_feature_clicked(hit.layer, &key, coordinate, cx),
            HitTarget::Cluster { members } => self.on_cluster_clicked(&members, cx),
        }
    }

    fn on_feature_clicked(&mut self, layer: LayerId, key: &FeatureKey, coordinate: Coordinate, cx: &mut Cx<'_>) {
        let Some(feature) = self.loads.stores().borrow().feature(key) else {
            debug!(%key, "clicked feature is not loaded");
            return;
        };
        let target = {
            let stores = self.loads.stores();
            let stores = stores.borrow();
            selection::click_target(&feature, &stores, &self.state.active_floors)
        };
        let selected = match target {
            ClickTarget::Select(code) => Some(code),
            ClickTarget::Deselect => None,
            ClickTarget::Ignore => {
                debug!(%key, "click outside loaded buildings ignored");
                return;
            }
        };

        let identified = self.state.options.identifies(feature.kind());
        if identified {
            cx.emit(MapEvent::Identified(identify(&feature, coordinate)));
        }

        let popup = (layer == LayerId::Marker && feature.has_detail()).then(|| key.clone());
        if layer == LayerId::Marker {
            self.set_popup(popup.clone(), cx);
        }

        if !identified && let Some(view) = self.state.view {
            let camera = match &feature {
                Feature::Complex(_) => feature.extent().map(|e| CameraMove::Single(view::fit(&view, e))),
                _ => view::feature_move(&view, &feature, coordinate),
            };
            if let Some(camera) = camera {
                cx.emit(MapEvent::Animate { camera });
            }
        }

        // The popup opened by this click survives the selection change.
        self.on_select(selected, popup, cx);
    }

    /// Opens the cluster popup and zooms to its main members. Selection is left alone.
    fn on_cluster_clicked(&mut self, members: &[FeatureKey], cx: &mut Cx<'_>) {
        let (main, popup) = {
            let stores = self.loads.stores();
            let stores = stores.borrow();
            let main: Vec<Feature> = main_features(members, &stores)
                .iter()
                .filter_map(|k| stores.feature(k))
                .collect();
            (main, popup_feature(members, &stores))
        };
        debug!(members = members.len(), main = main.len(), "cluster clicked");
        self.set_popup(popup, cx);

        if let Some(view) = self.state.view
            && let Some(camera) = view::cluster_move(&view, &main)
        {
            cx.emit(MapEvent::Animate { camera });
        }
    }

    fn on_select(&mut self, code: Option<LocationCode>, popup: Option<FeatureKey>, cx: &mut Cx<'_>) {
        let next = code.as_ref().map(Selection::from_code).unwrap_or_default();
        if next == self.state.selection {
            return;
        }
        let previous = std::mem::replace(&mut self.state.selection, next);
        info!(from = ?previous.selected_feature(), to = ?self.state.selected(), "selection changed");
        self.set_popup(popup, cx);
        cx.emit(MapEvent::SelectionChanged {
            selected: self.state.selected().cloned(),
        });

        match self.state.selection.clone() {
            Selection::Unselected => {
                self.state.pending_floor = None;
                if previous.floor().is_some() {
                    self.loads.set_active_floor_layer(None);
                }
                self.refresh_active_floors(cx);
            }
            Selection::Building(code) => {
                self.state.pending_floor = None;
                self.refresh_active_floors(cx);
                cx.spawn(effects::building_floors(&self.loads, code, self.state.generation));
            }
            Selection::Floor(code) => {
                if self.state.active_floors.contains(&code) {
                    self.state.pending_floor = None;
                    self.refresh_active_floors(cx);
                    return;
                }
                debug!(floor = %code, "loading floor layer");
                self.state.pending_floor = Some(code.clone());
                cx.spawn(effects::floor_layer(
                    &self.loads,
                    code,
                    self.state.options.poi_filter.clone(),
                    self.state.generation,
                ));
            }
        }
    }

    fn on_floors_loaded(&mut self, target: LocationCode, cx: &mut Cx<'_>) {
        if self.state.selection != Selection::Building(target.clone()) {
            debug!(%target, "discarding floors for a building no longer selected");
            return;
        }
        let floor = {
            let stores = self.loads.stores();
            let stores = stores.borrow();
            selection::floor_for_building(&target, &stores, &self.state.active_floors)
        };
        match floor {
            Some(floor) => cx.dispatch(Action::Select(Some(floor))),
            None => debug!(%target, "building has no floors"),
        }
    }

    fn on_floor_layer_loaded(&mut self, floor: LocationCode, layer: Option<FloorLayerId>, cx: &mut Cx<'_>) {
        if self.state.selection.floor() != Some(&floor) {
            debug!(%floor, "discarding floor layer for a floor no longer selected");
            return;
        }
        self.state.pending_floor = None;
        self.loads.set_active_floor_layer(layer);
        self.refresh_active_floors(cx);
        self.refresh_clusters(cx);
    }

    fn on_view_changed(&mut self, view: ViewState, cx: &mut Cx<'_>) {
        let first = self.state.view.is_none();
        self.state.view = Some(view);
        let visible = FLOOR_RESOLUTION.contains(view.resolution);
        if first || visible != self.state.info_visible {
            self.state.info_visible = visible;
            cx.emit(MapEvent::InfoPanelVisibility { visible });
        }
        let delta = {
            let stores = self.loads.stores();
            let stores = stores.borrow();
            self.clusters.update(view.resolution, &stores)
        };
        self.emit_clusters(delta, cx);
    }

    fn on_geolocation(&mut self, target: Coordinate, cx: &mut Cx<'_>) {
        match self.state.view {
            Some(view) => cx.emit(MapEvent::Animate {
                camera: view::geolocation_move(&view, target),
            }),
            None => debug!("geolocation before the first view change ignored"),
        }
    }

    fn on_reset(&mut self, options: ResetOptions, cx: &mut Cx<'_>) {
        if let Err(e) = options.validate() {
            warn!(error = %e, "rejecting reset");
            return;
        }
        self.state.generation += 1;
        info!(generation = self.state.generation, "reset");
        self.on_select(None, None, cx);
        self.set_popup(None, cx);
        self.state.options = options;
        self.loads.replace_markers(std::iter::empty());
        self.refresh_clusters(cx);

        let generation = self.state.generation;
        let progress = ResetProgress {
            markers_pending: !self.state.options.markers.is_empty(),
            zoom_to_pending: !self.state.options.zoom_to.is_empty(),
            zoom_to: Vec::new(),
        };
        if progress.markers_pending {
            cx.spawn(effects::markers(&self.loads, &self.state.options, generation));
        }
        if progress.zoom_to_pending {
            cx.spawn(effects::zoom_to(&self.loads, self.state.options.zoom_to.clone(), generation));
        }
        self.state.reset = Some(progress);
        self.finish_reset(cx);
    }

    fn on_markers_loaded(&mut self, markers: Vec<Feature>, not_found: Vec<String>, cx: &mut Cx<'_>) {
        debug!(markers = markers.len(), not_found = not_found.len(), "markers loaded");
        self.loads.replace_markers(markers);
        if !not_found.is_empty() {
            cx.emit(MapEvent::CodesNotFound { codes: not_found });
        }
        self.refresh_clusters(cx);
        if let Some(progress) = &mut self.state.reset {
            progress.markers_pending = false;
        }
        self.finish_reset(cx);
    }

    fn on_zoom_to_loaded(&mut self, features: Vec<Feature>, cx: &mut Cx<'_>) {
        if let Some(progress) = &mut self.state.reset {
            progress.zoom_to_pending = false;
            progress.zoom_to = features;
        }
        self.refresh_clusters(cx);
        self.finish_reset(cx);
    }

    /// Animates to the reset target once markers and zoom-to features are in.
    fn finish_reset(&mut self, cx: &mut Cx<'_>) {
        let Some(progress) = &self.state.reset else {
            return;
        };
        if progress.markers_pending || progress.zoom_to_pending {
            return;
        }
        let Some(progress) = self.state.reset.take() else {
            return;
        };
        let Some(view) = self.state.view else {
            return;
        };
        let targets: Vec<Feature> = if progress.zoom_to.is_empty() {
            self.loads.stores().borrow().markers.iter().cloned().collect()
        } else {
            progress.zoom_to
        };
        let options = &self.state.options;
        let resolution = options.zoom.map(view::zoom_to_resolution);
        if let Some(camera) = view::reset_move(&view, &targets, options.center, resolution) {
            cx.emit(MapEvent::Animate { camera });
        }
    }

    /// Reports a failed load and drops the bookkeeping of that load only.
    fn on_load_failed(&mut self, error: streaming::LoadError, origin: LoadOrigin, cx: &mut Cx<'_>) {
        if error.is_integrity() {
            warn!(%error, ?origin, "backend integrity violation");
        } else {
            warn!(%error, ?origin, "load failed");
        }
        match origin {
            LoadOrigin::FloorLayer(floor) => {
                if self.state.pending_floor.as_ref() == Some(&floor) {
                    self.state.pending_floor = None;
                }
            }
            LoadOrigin::Reset => self.state.reset = None,
            LoadOrigin::Floors(_) => {}
        }
        cx.emit(MapEvent::LoadFailed {
            message: error.to_string(),
        });
    }

    fn set_popup(&mut self, popup: Option<FeatureKey>, cx: &mut Cx<'_>) {
        if self.state.popup != popup {
            self.state.popup = popup.clone();
            cx.emit(MapEvent::PopupChanged { feature: popup });
        }
    }

    fn refresh_active_floors(&mut self, cx: &mut Cx<'_>) {
        let floors = {
            let stores = self.loads.stores();
            let stores = stores.borrow();
            selection::active_floor_codes(&self.state.selection, &stores)
        };
        if floors != self.state.active_floors {
            self.state.active_floors = floors.clone();
            cx.emit(MapEvent::ActiveFloorsChanged { floors });
        }
    }

    fn refresh_clusters(&mut self, cx: &mut Cx<'_>) {
        let delta = {
            let stores = self.loads.stores();
            let stores = stores.borrow();
            self.clusters.refresh(&stores)
        };
        self.emit_clusters(delta, cx);
    }

    fn emit_clusters(&self, delta: Option<ClusterDelta>, cx: &mut Cx<'_>) {
        if let Some(ClusterDelta { removed, added }) = delta {
            cx.emit(MapEvent::ClustersChanged {
                bucket: self.clusters.bucket(),
                removed,
                added,
            });
        }
    }
}

impl<L: FeatureLoader + 'static> Reducer for MapReducer<L> {
    type Action = Action;
    type Event = MapEvent;
    type Effect = Effect;

    fn reduce(&mut self, action: Action, cx: &mut Cx<'_>) {
        if let Some(generation) = action.generation()
            && generation != self.state.generation
        {
            debug!(generation, current = self.state.generation, "discarding stale completion");
            return;
        }
        match action {
            Action::Clicked { hit, coordinate } => self.on_clicked(hit, coordinate, cx),
            Action::ViewChanged(view) => self.on_view_changed(view, cx),
            Action::GeolocationClicked(target) => self.on_geolocation(target, cx),
            Action::PopupClosed => self.set_popup(None, cx),
            Action::Reset(options) => self.on_reset(*options, cx),
            Action::Select(code) => self.on_select(code, None, cx),
            Action::FloorsLoaded { target, .. } => self.on_floors_loaded(target, cx),
            Action::FloorLayerLoaded { floor, layer, .. } => self.on_floor_layer_loaded(floor, layer, cx),
            Action::MarkersLoaded { markers, not_found, .. } => self.on_markers_loaded(markers, not_found, cx),
            Action::ZoomToLoaded { features, .. } => self.on_zoom_to_loaded(features, cx),
            Action::LoadFailed { error, origin, .. } => self.on_load_failed(error, origin, cx),
        }
    }
}

fn identify(feature: &Feature, coordinate: Coordinate) -> Identified {
    let code = feature.location_code().map(LocationCode::as_str);
    let kind = feature.kind();
    let only = |k: FeatureKind| code.filter(|_| kind == k).map(str::to_string);
    Identified {
        kind,
        building_code: code.map(|c| location::building_prefix(c).to_string()),
        room_code: only(FeatureKind::Room),
        door_code: only(FeatureKind::Door),
        coordinate: coordinate.map(|c| (c * 1000.0).round() / 1000.0),
    }
}

