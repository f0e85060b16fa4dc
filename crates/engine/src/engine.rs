use std::cell::RefCell;
use std::rc::Rc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use layers::{
    Cluster, ClusterLabel, ClusterPoint, DEFAULT_CLUSTER_DISTANCE_PX, cluster_label, cluster_points,
};
use runtime::{Batch, Dispatcher};
use scene::Stores;
use serde::Serialize;
use streaming::{FeatureLoader, LoadCoordinator};
use tracing::debug;

use crate::action::{Action, MapEvent};
use crate::effects::Effect;
use crate::options::{ConfigError, ResetOptions};
use crate::state::{MapReducer, MapState};

/// A cluster as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedCluster {
    pub point: foundation::Coordinate,
    pub members: Vec<scene::FeatureKey>,
    pub label: ClusterLabel,
}

/// One map instance: state, stores, and the loads in flight for it.
///
/// Ordering contract:
/// - `dispatch` applies an action and every follow-up it queues before
///   returning. Loads it starts do not run until the caller polls.
/// - Each completed load is dispatched as its own batch, in completion order.
/// - `events` returns everything emitted since the last call, in order.
pub struct MapEngine<L> {
    reducer: MapReducer<L>,
    dispatcher: Dispatcher<MapEvent>,
    effects: FuturesUnordered<Effect>,
}

impl<L: FeatureLoader + 'static> MapEngine<L> {
    pub fn new(loader: L) -> Self {
        let stores = Rc::new(RefCell::new(Stores::new()));
        Self::with_loads(LoadCoordinator::new(loader, stores))
    }

    pub fn with_loads(loads: LoadCoordinator<L>) -> Self {
        Self {
            reducer: MapReducer::new(loads),
            dispatcher: Dispatcher::new(),
            effects: FuturesUnordered::new(),
        }
    }

    pub fn state(&self) -> &MapState {
        self.reducer.state()
    }

    pub fn stores(&self) -> Rc<RefCell<Stores>> {
        self.reducer.loads().stores()
    }

    pub fn loads(&self) -> &LoadCoordinator<L> {
        self.reducer.loads()
    }

    pub fn dispatch(&mut self, action: Action) -> Batch {
        let outcome = self.dispatcher.run(&mut self.reducer, action);
        debug!(
            batch = outcome.batch.index,
            actions = outcome.actions,
            effects = outcome.effects.len(),
            "batch applied"
        );
        self.effects.extend(outcome.effects);
        outcome.batch
    }

    /// Validates `options` and resets the map. Invalid options leave the map
    /// untouched.
    pub fn reset(&mut self, options: ResetOptions) -> Result<Batch, ConfigError> {
        options.validate()?;
        Ok(self.dispatch(Action::Reset(Box::new(options))))
    }

    pub fn pending_loads(&self) -> usize {
        self.effects.len()
    }

    /// Waits for the next load to finish and dispatches its completion.
    /// Returns `false` when nothing is pending.
    pub async fn next_completion(&mut self) -> bool {
        match self.effects.next().await {
            Some(action) => {
                self.dispatch(action);
                true
            }
            None => false,
        }
    }

    /// Runs until no load is pending, including loads started by
    /// completions.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    pub fn events(&mut self) -> Vec<MapEvent> {
        self.dispatcher.bus_mut().drain().into_iter().map(|e| e.payload).collect()
    }

    /// Clusters of the current membership at the current resolution.
    pub fn clusters(&self) -> Vec<RenderedCluster> {
        let (Some(view), Some(bucket)) = (self.state().view, self.reducer.clusters().bucket()) else {
            return Vec::new();
        };
        let stores = self.stores();
        let stores = stores.borrow();
        let points = ClusterPoint::collect(self.reducer.clusters().members(), &stores);
        cluster_points(points, view.resolution, DEFAULT_CLUSTER_DISTANCE_PX)
            .into_iter()
            .map(|Cluster { point, members }| {
                let label = cluster_label(&members, bucket, &stores);
                RenderedCluster { point, members, label }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::{BuildingId, FloorLayerId, UnitId};
    use layers::{ClusterBucket, Hit, LayerId};
    use pretty_assertions::assert_eq;
    use scene::selection::Selection;
    use scene::{Building, Feature, FeatureKey, FeatureKind, Floor, Geometry, Keyed, LocationCode, Room, Unit};
    use streaming::{LoadError, MemoryLoader};

    use crate::action::{Identified, LoadOrigin};
    use crate::view::{CameraMove, ViewState};

    fn square(x: f64, y: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![vec![[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]])
    }

    fn building(id: u64, code: &str, x: f64, default_floor: Option<&str>, detail: Option<&str>) -> Feature {
        Feature::Building(Building {
            id: BuildingId(id),
            code: code.into(),
            title: code.to_string(),
            complex_id: None,
            has_inner_geometry: true,
            default_floor: default_floor.map(LocationCode::from),
            units: Vec::new(),
            detail: detail.map(str::to_string),
            geometry: square(x, 0.0, 100.0),
        })
    }

    fn floor(code: &str, layer: u64) -> Feature {
        Feature::Floor(Floor {
            code: code.into(),
            layer: FloorLayerId(layer),
            label: None,
        })
    }

    fn room(code: &str, x: f64) -> Feature {
        Feature::Room(Room {
            code: code.into(),
            title: Some("Lab".into()),
            detail: None,
            geometry: Some(square(x, 10.0, 10.0)),
        })
    }

    /// Two adjoining buildings; their second floors share a floor layer.
    fn campus() -> Vec<Feature> {
        vec![
            building(1, "BMB01", 0.0, Some("BMB01N01"), Some("/b/bmb01")),
            building(2, "BMA01", 100.0, None, None),
            Feature::Unit(Unit {
                id: UnitId(1),
                title: "Faculty of Informatics".into(),
                abbr: Some("FI".into()),
                priority: 1,
                building_id: Some(BuildingId(1)),
                complex_id: None,
            }),
            floor("BMB01N01", 1),
            floor("BMB01N02", 2),
            floor("BMA01N02", 2),
            room("BMB01N01001", 20.0),
            room("BMB01N02123", 10.0),
        ]
    }

    fn view(resolution: f64) -> ViewState {
        ViewState {
            center: [50.0, 50.0],
            resolution,
            rotation: 0.0,
            size: [800.0, 600.0],
        }
    }

    fn codes(v: &[&str]) -> Vec<LocationCode> {
        v.iter().map(|c| LocationCode::from(*c)).collect()
    }

    async fn engine_with(loader: MemoryLoader) -> MapEngine<MemoryLoader> {
        let engine = MapEngine::new(loader);
        engine
            .loads()
            .features_by_codes(&["BMB01".to_string(), "BMA01".to_string()])
            .await
            .expect("buildings");
        engine
    }

    fn select(code: &str) -> Action {
        Action::Select(Some(code.into()))
    }

    fn click(layer: LayerId, key: FeatureKey, coordinate: foundation::Coordinate) -> Action {
        Action::Clicked {
            hit: Hit::feature(layer, key),
            coordinate,
        }
    }

    fn animations(events: &[MapEvent]) -> usize {
        events.iter().filter(|e| matches!(e, MapEvent::Animate { .. })).count()
    }

    #[tokio::test]
    async fn selecting_a_floor_activates_its_floor_layer() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(select("BMB01N02"));
        assert_eq!(engine.pending_loads(), 1);
        engine.settle().await;

        assert_eq!(engine.state().selection, Selection::Floor("BMB01N02".into()));
        assert_eq!(engine.state().active_floors, codes(&["BMB01N02", "BMA01N02"]));
        assert_eq!(engine.state().pending_floor, None);
        assert_eq!(engine.loads().active_floor_layer(), Some(FloorLayerId(2)));
        assert_eq!(
            engine.events(),
            vec![
                MapEvent::SelectionChanged {
                    selected: Some("BMB01N02".into())
                },
                MapEvent::ActiveFloorsChanged {
                    floors: codes(&["BMB01N02", "BMA01N02"])
                },
            ]
        );
    }

    #[tokio::test]
    async fn clicking_a_room_on_the_selected_floor_changes_nothing() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(Action::ViewChanged(view(0.2)));
        engine.dispatch(select("BMB01N02"));
        engine.settle().await;
        engine.events();
        let requests = engine.loads().loader().requests().len();

        engine.dispatch(click(LayerId::Room, FeatureKey::Room("BMB01N02123".into()), [15.0, 15.0]));
        assert_eq!(engine.pending_loads(), 0);
        engine.settle().await;

        assert_eq!(engine.events(), Vec::<MapEvent>::new());
        assert_eq!(engine.state().selection, Selection::Floor("BMB01N02".into()));
        assert_eq!(engine.loads().loader().requests().len(), requests);
    }

    #[tokio::test]
    async fn adjoining_floor_on_the_active_layer_needs_no_load() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(select("BMB01N02"));
        engine.settle().await;
        engine.events();

        engine.dispatch(select("BMA01N02"));
        assert_eq!(engine.pending_loads(), 0);
        assert_eq!(engine.state().active_floors, codes(&["BMA01N02", "BMB01N02"]));
    }

    #[tokio::test]
    async fn reset_discards_the_pending_floor_load() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(select("BMB01N02"));
        engine.reset(ResetOptions::default()).expect("valid options");
        engine.settle().await;

        assert_eq!(engine.state().generation, 1);
        assert_eq!(engine.state().selection, Selection::Unselected);
        assert!(engine.state().active_floors.is_empty());
        assert_eq!(engine.loads().active_floor_layer(), None);
        assert!(
            !engine
                .events()
                .iter()
                .any(|e| matches!(e, MapEvent::ActiveFloorsChanged { floors } if !floors.is_empty()))
        );
    }

    #[tokio::test]
    async fn superseded_floor_completion_is_ignored() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(select("BMB01N01"));
        engine.dispatch(select("BMB01N02"));
        engine.settle().await;

        assert_eq!(engine.state().selection, Selection::Floor("BMB01N02".into()));
        assert_eq!(engine.state().active_floors, codes(&["BMB01N02", "BMA01N02"]));
        assert_eq!(engine.loads().active_floor_layer(), Some(FloorLayerId(2)));
    }

    #[tokio::test]
    async fn deselecting_clears_the_active_floor_layer() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(select("BMB01N02"));
        engine.settle().await;
        engine.events();

        engine.dispatch(Action::Select(None));
        assert_eq!(engine.loads().active_floor_layer(), None);
        assert_eq!(
            engine.events(),
            vec![
                MapEvent::SelectionChanged { selected: None },
                MapEvent::ActiveFloorsChanged { floors: Vec::new() },
            ]
        );
    }

    #[tokio::test]
    async fn building_without_default_floor_selects_its_first_floor() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(Action::ViewChanged(view(5.0)));
        engine.events();

        engine.dispatch(click(LayerId::Building, FeatureKey::Building("BMA01".into()), [150.0, 50.0]));
        assert_eq!(engine.state().selection, Selection::Building("BMA01".into()));
        engine.settle().await;

        assert_eq!(engine.state().selection, Selection::Floor("BMA01N02".into()));
        assert_eq!(engine.state().active_floors, codes(&["BMA01N02", "BMB01N02"]));
        let events = engine.events();
        assert_eq!(animations(&events), 1);
        assert!(events.contains(&MapEvent::SelectionChanged {
            selected: Some("BMA01".into())
        }));
    }

    #[tokio::test]
    async fn building_click_prefers_the_default_floor() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(click(LayerId::Building, FeatureKey::Building("BMB01".into()), [50.0, 50.0]));
        assert_eq!(engine.state().selection, Selection::Floor("BMB01N01".into()));
        engine.settle().await;
        assert_eq!(engine.state().active_floors, codes(&["BMB01N01"]));
    }

    #[tokio::test]
    async fn identify_replaces_the_zoom() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        let options = ResetOptions::from_json(r#"{"identifyTypes":["building"],"identifyCallback":true}"#)
            .expect("options");
        engine.reset(options).expect("valid options");
        engine.dispatch(Action::ViewChanged(view(5.0)));
        engine.events();

        engine.dispatch(click(
            LayerId::Building,
            FeatureKey::Building("BMA01".into()),
            [150.12345, 50.0],
        ));
        let events = engine.events();
        assert_eq!(animations(&events), 0);
        assert_eq!(
            events.first(),
            Some(&MapEvent::Identified(Identified {
                kind: FeatureKind::Building,
                building_code: Some("BMA01".into()),
                room_code: None,
                door_code: None,
                coordinate: [150.123, 50.0],
            }))
        );
        assert_eq!(engine.state().selection, Selection::Building("BMA01".into()));
    }

    #[tokio::test]
    async fn invalid_reset_leaves_the_map_untouched() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(select("BMB01N02"));
        engine.events();

        let options = ResetOptions {
            zoom: Some(40.0),
            ..ResetOptions::default()
        };
        assert_eq!(engine.reset(options), Err(ConfigError::ZoomOutOfRange(40.0)));
        assert_eq!(engine.state().generation, 0);
        assert_eq!(engine.state().selection, Selection::Floor("BMB01N02".into()));
        assert_eq!(engine.events(), Vec::<MapEvent>::new());
    }

    #[tokio::test]
    async fn markers_report_missing_codes_and_move_the_view() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(Action::ViewChanged(view(5.0)));
        engine.events();

        let options = ResetOptions::from_json(r#"{"markers":["BMB01","BMX99"]}"#).expect("options");
        engine.reset(options).expect("valid options");
        assert!(engine.state().is_resetting());
        engine.settle().await;

        assert!(!engine.state().is_resetting());
        assert_eq!(engine.stores().borrow().markers.len(), 1);
        let events = engine.events();
        assert!(events.contains(&MapEvent::CodesNotFound {
            codes: vec!["BMX99".to_string()]
        }));
        assert!(matches!(events.last(), Some(MapEvent::Animate { camera: CameraMove::Single(_) })));
    }

    #[tokio::test]
    async fn cluster_click_opens_popup_without_selecting() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(Action::ViewChanged(view(5.0)));
        let options = ResetOptions::from_json(r#"{"markers":["BMB01"]}"#).expect("options");
        engine.reset(options).expect("valid options");
        engine.settle().await;
        engine.events();

        engine.dispatch(Action::Clicked {
            hit: Hit::cluster(vec![FeatureKey::Building("BMB01".into()), FeatureKey::Building("BMA01".into())]),
            coordinate: [100.0, 50.0],
        });
        let popup = Some(FeatureKey::Building("BMB01".into()));
        assert_eq!(engine.state().popup, popup);
        assert_eq!(engine.state().selection, Selection::Unselected);
        let events = engine.events();
        assert_eq!(events.first(), Some(&MapEvent::PopupChanged { feature: popup }));
        assert_eq!(animations(&events), 1);

        engine.dispatch(Action::PopupClosed);
        assert_eq!(engine.events(), vec![MapEvent::PopupChanged { feature: None }]);
    }

    #[tokio::test]
    async fn view_changes_toggle_info_panel_and_cluster_buckets() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        let bmb01 = FeatureKey::Building("BMB01".into());

        engine.dispatch(Action::ViewChanged(view(5.0)));
        assert_eq!(
            engine.events(),
            vec![
                MapEvent::InfoPanelVisibility { visible: false },
                MapEvent::ClustersChanged {
                    bucket: Some(ClusterBucket::MarkersAndUnits),
                    removed: Vec::new(),
                    added: vec![bmb01.clone()],
                },
            ]
        );
        let clusters = engine.clusters();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].label.text(), "Faculty of Informatics");

        engine.dispatch(Action::ViewChanged(view(0.2)));
        assert_eq!(
            engine.events(),
            vec![
                MapEvent::InfoPanelVisibility { visible: true },
                MapEvent::ClustersChanged {
                    bucket: Some(ClusterBucket::MarkersOnly),
                    removed: vec![bmb01],
                    added: Vec::new(),
                },
            ]
        );

        engine.dispatch(Action::ViewChanged(view(0.25)));
        assert_eq!(engine.events(), Vec::<MapEvent>::new());
    }

    #[tokio::test]
    async fn load_failure_is_reported_and_clears_pending_floor() {
        let mut engine = engine_with(MemoryLoader::new(campus()).failing(FeatureKind::Room)).await;
        engine.dispatch(select("BMB01N02"));
        engine.settle().await;

        assert_eq!(engine.state().pending_floor, None);
        assert!(engine.state().active_floors.is_empty());
        assert!(
            engine
                .events()
                .iter()
                .any(|e| matches!(e, MapEvent::LoadFailed { .. }))
        );
    }

    #[tokio::test]
    async fn geolocation_before_first_view_is_ignored() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(Action::GeolocationClicked([10.0, 10.0]));
        assert_eq!(engine.events(), Vec::<MapEvent>::new());

        engine.dispatch(Action::ViewChanged(view(1.0)));
        engine.events();
        engine.dispatch(Action::GeolocationClicked([60.0, 60.0]));
        assert_eq!(animations(&engine.events()), 1);
    }

    fn failed(origin: LoadOrigin, generation: u64) -> Action {
        Action::LoadFailed {
            error: LoadError::backend("room", "service unavailable"),
            origin,
            generation,
        }
    }

    #[tokio::test]
    async fn failure_of_another_load_keeps_the_pending_floor() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(select("BMB01N02"));
        let pending = Some(LocationCode::from("BMB01N02"));

        engine.dispatch(failed(LoadOrigin::Reset, 0));
        engine.dispatch(failed(LoadOrigin::FloorLayer("BMB01N01".into()), 0));
        engine.dispatch(failed(LoadOrigin::Floors("BMB01".into()), 0));
        assert_eq!(engine.state().pending_floor, pending);

        engine.settle().await;
        assert_eq!(engine.state().pending_floor, None);
        assert_eq!(engine.state().active_floors, codes(&["BMB01N02", "BMA01N02"]));
    }

    #[tokio::test]
    async fn floor_failure_keeps_the_reset_outstanding() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(Action::ViewChanged(view(5.0)));
        let options = ResetOptions::from_json(r#"{"markers":["BMB01"]}"#).expect("options");
        engine.reset(options).expect("valid options");
        engine.events();

        engine.dispatch(failed(LoadOrigin::FloorLayer("BMB01N02".into()), 1));
        assert!(engine.state().is_resetting());

        engine.settle().await;
        assert!(!engine.state().is_resetting());
        let events = engine.events();
        assert!(matches!(events.first(), Some(MapEvent::LoadFailed { .. })));
        assert!(matches!(events.last(), Some(MapEvent::Animate { .. })));
    }

    #[tokio::test]
    async fn reset_failure_ends_the_reset() {
        let mut engine = engine_with(MemoryLoader::new(campus()).failing(FeatureKind::Room)).await;
        engine.dispatch(Action::ViewChanged(view(5.0)));
        let options = ResetOptions::from_json(r#"{"markers":["BMB01N02123"]}"#).expect("options");
        engine.reset(options).expect("valid options");
        engine.events();
        engine.settle().await;

        assert!(!engine.state().is_resetting());
        let events = engine.events();
        assert!(events.iter().any(|e| matches!(e, MapEvent::LoadFailed { .. })));
        assert_eq!(animations(&events), 0);
    }

    #[tokio::test]
    async fn click_in_an_unloaded_building_does_nothing() {
        let mut features = campus();
        features.push(room("BMC01N01001", 300.0));
        let mut engine = engine_with(MemoryLoader::new(features)).await;
        engine
            .loads()
            .features_by_codes(&["BMC01N01001".to_string()])
            .await
            .expect("room");
        let options = ResetOptions::from_json(r#"{"identifyTypes":["room"],"identifyCallback":true}"#)
            .expect("options");
        engine.reset(options).expect("valid options");
        engine.dispatch(Action::ViewChanged(view(0.2)));
        engine.events();

        engine.dispatch(click(LayerId::Room, FeatureKey::Room("BMC01N01001".into()), [305.0, 15.0]));
        assert_eq!(engine.events(), Vec::<MapEvent>::new());
        assert_eq!(engine.pending_loads(), 0);
        assert_eq!(engine.state().selection, Selection::Unselected);
    }

    #[tokio::test]
    async fn room_code_marker_resolves_to_its_room() {
        let mut engine = engine_with(MemoryLoader::new(campus())).await;
        engine.dispatch(Action::ViewChanged(view(5.0)));
        let options = ResetOptions::from_json(r#"{"markers":["BMB01N02123"]}"#).expect("options");
        engine.reset(options).expect("valid options");
        engine.settle().await;

        let stores = engine.stores();
        let markers: Vec<FeatureKey> = stores.borrow().markers.iter().map(|m| m.key()).collect();
        assert_eq!(markers, vec![FeatureKey::Room("BMB01N02123".into())]);
        let events = engine.events();
        assert!(!events.iter().any(|e| matches!(e, MapEvent::CodesNotFound { .. })));
        assert_eq!(animations(&events), 1);
    }
}
