use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use foundation::{BuildingId, ComplexId, FloorLayerId};
use futures_util::future::{FutureExt, Shared, try_join3};
use scene::location::{self, LikeKind};
use scene::{Feature, FeatureKey, FeatureKind, Floor, Keyed, LocationCode, Stores};
use tracing::{debug, warn};

use crate::loader::{FeatureLoader, LoadError, LocalBoxFuture};
use crate::request::{Filter, LoadRequest, OptPoiCategory, RequestKey};

/// Outcome of one backend query after it has been merged into the stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Loaded {
    /// Every feature the backend returned, in response order.
    pub all: Vec<FeatureKey>,
    /// The subset that was not stored before this load.
    pub new: Vec<FeatureKey>,
}

type SharedLoad = Shared<LocalBoxFuture<'static, Result<Rc<Loaded>, LoadError>>>;

struct Inner<L> {
    loader: L,
    stores: Rc<RefCell<Stores>>,
    in_flight: RefCell<BTreeMap<RequestKey, SharedLoad>>,
    active_floor_layer: Cell<Option<FloorLayerId>>,
}

/// Sequences dependent backend loads and keeps the feature stores consistent.
///
/// Ordering contract:
/// - At most one backend request per `RequestKey` is outstanding; later
///   callers for the same key await the first request's result.
/// - Stores are only appended to, after every stage of a load succeeded.
///   A failed stage leaves the stores untouched for that load.
///
/// Notes:
/// - Cloning is cheap and shares the same stores and in-flight table.
/// - Single-threaded: futures are `!Send`.
pub struct LoadCoordinator<L> {
    inner: Rc<Inner<L>>,
}

impl<L> Clone for LoadCoordinator<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<L: FeatureLoader + 'static> LoadCoordinator<L> {
    pub fn new(loader: L, stores: Rc<RefCell<Stores>>) -> Self {
        Self {
            inner: Rc::new(Inner {
                loader,
                stores,
                in_flight: RefCell::new(BTreeMap::new()),
                active_floor_layer: Cell::new(None),
            }),
        }
    }

    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    pub fn stores(&self) -> Rc<RefCell<Stores>> {
        Rc::clone(&self.inner.stores)
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.borrow().len()
    }

    pub fn active_floor_layer(&self) -> Option<FloorLayerId> {
        self.inner.active_floor_layer.get()
    }

    pub fn set_active_floor_layer(&self, layer: Option<FloorLayerId>) {
        self.inner.active_floor_layer.set(layer);
    }

    /// Runs `request` through the pipeline for its feature kind, joining an
    /// identical in-flight request if there is one.
    pub fn features(&self, request: LoadRequest) -> LocalBoxFuture<'static, Result<Rc<Loaded>, LoadError>> {
        let key = request.key();
        if let Some(pending) = self.inner.in_flight.borrow().get(&key) {
            debug!(request = %key, "joining in-flight load");
            return Box::pin(pending.clone());
        }

        let this = self.clone();
        let done_key = key.clone();
        let fut: LocalBoxFuture<'static, Result<Rc<Loaded>, LoadError>> = Box::pin(async move {
            let result = this.fetch_and_store(request).await;
            this.inner.in_flight.borrow_mut().remove(&done_key);
            result.map(Rc::new)
        });
        let shared = fut.shared();
        debug!(request = %key, "starting load");
        self.inner.in_flight.borrow_mut().insert(key, shared.clone());
        Box::pin(shared)
    }

    async fn fetch_and_store(&self, request: LoadRequest) -> Result<Loaded, LoadError> {
        let kind = request.kind;
        let fetched = self.inner.loader.load(request).await?;
        let (all, fresh) = self.classify(kind, fetched);
        let fresh = match kind {
            FeatureKind::Building => self.prepare_buildings(fresh).await?,
            FeatureKind::Complex => self.prepare_complexes(fresh).await?,
            FeatureKind::Room => self.prepare_rooms(fresh),
            _ => fresh,
        };
        let new = self.inner.stores.borrow_mut().insert_all(fresh);
        debug!(%kind, returned = all.len(), added = new.len(), "load merged");
        Ok(Loaded { all, new })
    }

    /// Stage 1: drop features of the wrong kind and split the response into
    /// all keys and not-yet-stored features.
    fn classify(&self, kind: FeatureKind, fetched: Vec<Feature>) -> (Vec<FeatureKey>, Vec<Feature>) {
        let stores = self.inner.stores.borrow();
        let mut all = Vec::with_capacity(fetched.len());
        let mut fresh: Vec<Feature> = Vec::new();
        for feature in fetched {
            if feature.kind() != kind {
                warn!(expected = %kind, got = %feature.kind(), "loader returned feature of unexpected kind");
                continue;
            }
            let key = feature.key();
            if all.contains(&key) {
                continue;
            }
            all.push(key.clone());
            if !stores.contains(&key) {
                fresh.push(feature);
            }
        }
        (all, fresh)
    }

    /// Stages 2 and 3 for buildings: resolve complexes, then attach units.
    async fn prepare_buildings(&self, mut buildings: Vec<Feature>) -> Result<Vec<Feature>, LoadError> {
        let complex_ids: Vec<ComplexId> = buildings
            .iter()
            .filter_map(|f| f.as_building().and_then(|b| b.complex_id))
            .collect();
        self.ensure_complexes(&complex_ids).await?;

        let building_ids: Vec<BuildingId> = buildings.iter().filter_map(|f| f.as_building().map(|b| b.id)).collect();
        if building_ids.is_empty() {
            return Ok(buildings);
        }
        let units = self
            .features(LoadRequest::new(FeatureKind::Unit, Filter::UnitsByBuildings(building_ids)))
            .await?;
        let stores = self.inner.stores.borrow();
        for feature in &mut buildings {
            if let Feature::Building(b) = feature {
                b.units = units
                    .all
                    .iter()
                    .filter_map(|k| stores.units.get(k))
                    .filter(|u| u.building_id == Some(b.id))
                    .map(|u| u.id)
                    .collect();
            }
        }
        Ok(buildings)
    }

    /// Loads every complex in `ids` that is not stored yet, in one batch.
    ///
    /// Fails with `LoadError::Integrity` when the backend omits a requested
    /// complex.
    pub async fn ensure_complexes(&self, ids: &[ComplexId]) -> Result<(), LoadError> {
        let mut missing: Vec<ComplexId> = Vec::new();
        {
            let stores = self.inner.stores.borrow();
            for id in ids {
                if stores.complex(*id).is_none() && !missing.contains(id) {
                    missing.push(*id);
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        let loaded = self
            .features(LoadRequest::new(FeatureKind::Complex, Filter::ComplexIds(missing.clone())))
            .await?;
        for id in missing {
            if !loaded.all.contains(&FeatureKey::Complex(id)) {
                warn!(complex = %id, "backend response is missing a requested complex");
                return Err(LoadError::Integrity(format!("complex {id} not found")));
            }
        }
        Ok(())
    }

    async fn prepare_complexes(&self, mut complexes: Vec<Feature>) -> Result<Vec<Feature>, LoadError> {
        let ids: Vec<ComplexId> = complexes
            .iter()
            .filter_map(|f| match f {
                Feature::Complex(c) => Some(c.id),
                _ => None,
            })
            .collect();
        if ids.is_empty() {
            return Ok(complexes);
        }
        let units = self
            .features(LoadRequest::new(FeatureKind::Unit, Filter::UnitsByComplexes(ids)))
            .await?;
        let stores = self.inner.stores.borrow();
        for feature in &mut complexes {
            if let Feature::Complex(c) = feature {
                c.units = units
                    .all
                    .iter()
                    .filter_map(|k| stores.units.get(k))
                    .filter(|u| u.complex_id == Some(c.id))
                    .map(|u| u.id)
                    .collect();
            }
        }
        Ok(complexes)
    }

    /// Rooms without a floor plan are placed at their building's interior
    /// point.
    fn prepare_rooms(&self, mut rooms: Vec<Feature>) -> Vec<Feature> {
        let stores = self.inner.stores.borrow();
        for feature in &mut rooms {
            if let Feature::Room(r) = feature
                && r.geometry.is_none()
                && let Some(b) = stores.building(r.code.building_prefix())
            {
                r.geometry = Some(scene::Geometry::Point(b.geometry.interior_point()));
            }
        }
        rooms
    }

    /// Stage 4: every floor of the building `code` belongs to.
    pub async fn ensure_floors_loaded(&self, code: &LocationCode) -> Result<Vec<Floor>, LoadError> {
        let prefix = code.building_prefix().to_string();
        self.features(LoadRequest::new(FeatureKind::Floor, Filter::LocationCodePrefix(prefix)))
            .await?;
        let stores = self.inner.stores.borrow();
        Ok(stores.floors_of_building(code).cloned().collect())
    }

    /// Every floor sharing `layer`. Returns `None` without touching the
    /// backend when `layer` is already the active floor layer.
    pub async fn ensure_floor_layer_loaded(&self, layer: FloorLayerId) -> Result<Option<Vec<Floor>>, LoadError> {
        if self.active_floor_layer() == Some(layer) {
            debug!(%layer, "floor layer already active");
            return Ok(None);
        }
        self.features(LoadRequest::new(FeatureKind::Floor, Filter::FloorLayer(layer)))
            .await?;
        let stores = self.inner.stores.borrow();
        Ok(Some(stores.floors.iter().filter(|f| f.layer == layer).cloned().collect()))
    }

    /// Rooms, doors and POIs located on `floors`.
    pub async fn ensure_floor_contents(&self, floors: &[LocationCode], poi_filter: &[String]) -> Result<(), LoadError> {
        if floors.is_empty() {
            return Ok(());
        }
        let rooms = self.features(LoadRequest::new(FeatureKind::Room, Filter::ActiveFloors(floors.to_vec())));
        let doors = self.features(LoadRequest::new(FeatureKind::Door, Filter::ActiveFloors(floors.to_vec())));
        let pois = self.features(LoadRequest::new(
            FeatureKind::Poi,
            Filter::FloorPois {
                floors: floors.to_vec(),
                poi_filter: poi_filter.to_vec(),
            },
        ));
        try_join3(rooms, doors, pois).await?;
        Ok(())
    }

    /// Loads the features addressed by a list of codes or like-expressions.
    ///
    /// The kind of the first value decides what is loaded: buildings, or
    /// rooms/doors (whose buildings are loaded first). Values of other kinds
    /// are ignored. Returns the matched features in response order.
    pub async fn features_by_codes(&self, values: &[String]) -> Result<Vec<Feature>, LoadError> {
        let Some(first) = values.first() else {
            return Ok(Vec::new());
        };

        if location::is_building_code_or_like(first) {
            let filter = code_filter(values, location::is_building_code, LikeKind::Building);
            let loaded = self
                .features(LoadRequest::new(FeatureKind::Building, filter))
                .await?;
            return Ok(self.lookup(&loaded.all));
        }

        let (kind, is_code, like): (FeatureKind, fn(&str) -> bool, LikeKind) =
            if location::is_room_code_or_like(first) {
                (FeatureKind::Room, location::is_room_code, LikeKind::Room)
            } else if location::is_door_code_or_like(first) {
                (FeatureKind::Door, location::is_door_code, LikeKind::Door)
            } else {
                return Ok(Vec::new());
            };

        let filter = code_filter(values, is_code, like);
        let Filter::LocationCodes { codes, likes } = &filter else {
            return Ok(Vec::new());
        };
        let mut building_codes: Vec<LocationCode> = Vec::new();
        let mut building_likes: Vec<String> = Vec::new();
        for code in codes {
            let b = code.building_code();
            if !building_codes.contains(&b) {
                building_codes.push(b);
            }
        }
        for expr in likes {
            let prefix = location::building_prefix(expr);
            if location::is_building_code(prefix) {
                let b = LocationCode::new(prefix);
                if !building_codes.contains(&b) {
                    building_codes.push(b);
                }
            } else if location::classify_like(prefix) == Some(LikeKind::Building)
                && !building_likes.iter().any(|l| l == prefix)
            {
                building_likes.push(prefix.to_string());
            }
        }
        self.features(LoadRequest::new(
            FeatureKind::Building,
            Filter::LocationCodes {
                codes: building_codes,
                likes: building_likes,
            },
        ))
        .await?;

        let loaded = self.features(LoadRequest::new(kind, filter)).await?;
        Ok(self.lookup(&loaded.all))
    }

    /// Optional POIs of `category`; those located in rooms resolve to the
    /// rooms themselves.
    pub async fn opt_poi_rooms(
        &self,
        category: OptPoiCategory,
        workplaces: &[String],
        poi_filter: &[String],
    ) -> Result<Vec<Feature>, LoadError> {
        let loaded = self
            .features(LoadRequest::new(
                FeatureKind::Marker,
                Filter::OptPoiCategory {
                    category,
                    workplaces: workplaces.to_vec(),
                    poi_filter: poi_filter.to_vec(),
                },
            ))
            .await?;
        let mut room_codes: Vec<String> = Vec::new();
        for feature in self.lookup(&loaded.all) {
            if let Some(code) = feature.location_code()
                && location::is_room_code(code.as_str())
                && !room_codes.iter().any(|c| c == code.as_str())
            {
                room_codes.push(code.to_string());
            }
        }
        if room_codes.is_empty() {
            return Ok(Vec::new());
        }
        let rooms = self.features_by_codes(&room_codes).await?;
        Ok(self.attach_poi_detail(rooms))
    }

    /// Makes the names of the opt-POIs a room holds its popup detail, in the
    /// stored room as well as in the returned copies.
    fn attach_poi_detail(&self, rooms: Vec<Feature>) -> Vec<Feature> {
        let mut stores = self.inner.stores.borrow_mut();
        rooms
            .into_iter()
            .map(|feature| match feature {
                Feature::Room(mut room) => {
                    let names: Vec<String> = stores
                        .opt_pois_in(&room.code)
                        .iter()
                        .filter_map(|m| m.title.clone())
                        .collect();
                    if !names.is_empty() {
                        room.detail = Some(names.join("\n"));
                        if let Some(stored) = stores.rooms.get_mut(&room.key()) {
                            stored.detail = room.detail.clone();
                        }
                    }
                    Feature::Room(room)
                }
                other => other,
            })
            .collect()
    }

    /// Replaces the marked features.
    pub fn replace_markers(&self, markers: impl IntoIterator<Item = Feature>) {
        let mut stores = self.inner.stores.borrow_mut();
        stores.clear_markers();
        for marker in markers {
            stores.markers.insert(marker);
        }
    }

    fn lookup(&self, keys: &[FeatureKey]) -> Vec<Feature> {
        let stores = self.inner.stores.borrow();
        keys.iter().filter_map(|k| stores.feature(k)).collect()
    }
}

fn code_filter(values: &[String], is_code: fn(&str) -> bool, like: LikeKind) -> Filter {
    let mut codes: Vec<LocationCode> = Vec::new();
    let mut likes: Vec<String> = Vec::new();
    for v in values {
        if is_code(v) {
            let code = LocationCode::new(v.as_str());
            if !codes.contains(&code) {
                codes.push(code);
            }
        } else if location::classify_like(v) == Some(like) && !likes.contains(v) {
            likes.push(v.clone());
        }
    }
    Filter::LocationCodes { codes, likes }
}
