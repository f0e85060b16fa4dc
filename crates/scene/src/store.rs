use std::collections::HashMap;

use foundation::{BuildingId, ComplexId, UnitId};

use crate::feature::{Building, Complex, Door, Feature, FeatureKey, Floor, Keyed, Marker, Poi, Room, Unit};
use crate::location::LocationCode;

/// Collection of features keyed by primary key.
///
/// Ordering contract:
/// - Iteration yields features in insertion order.
/// - Inserting a feature whose key is already present is a no-op; the stored
///   copy is kept.
#[derive(Debug, Clone)]
pub struct FeatureStore<T> {
    items: Vec<T>,
    index: HashMap<FeatureKey, usize>,
}

impl<T> Default for FeatureStore<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> FeatureStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &FeatureKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &FeatureKey) -> Option<&T> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, key: &FeatureKey) -> Option<&mut T> {
        self.index.get(key).map(|&i| &mut self.items[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Inserts `item` unless its key is present. Returns `true` if inserted.
    pub fn insert(&mut self, item: T) -> bool {
        let key = item.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.items.len());
        self.items.push(item);
        true
    }

    /// Drops items whose key is already stored, preserving input order and
    /// collapsing duplicates within `items`.
    pub fn not_yet_added(&self, items: Vec<T>) -> Vec<T> {
        let mut seen = std::collections::HashSet::new();
        items
            .into_iter()
            .filter(|item| {
                let key = item.key();
                !self.index.contains_key(&key) && seen.insert(key)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}

/// Every feature collection of one map instance.
///
/// Stores only grow during a session. `clear_markers` is the single removal
/// path and is used on programmatic reset.
#[derive(Debug, Clone, Default)]
pub struct Stores {
    pub buildings: FeatureStore<Building>,
    pub complexes: FeatureStore<Complex>,
    pub units: FeatureStore<Unit>,
    pub floors: FeatureStore<Floor>,
    pub rooms: FeatureStore<Room>,
    pub doors: FeatureStore<Door>,
    pub pois: FeatureStore<Poi>,
    pub opt_pois: FeatureStore<Marker>,
    /// Marked features. Holds copies of features from the other stores,
    /// plus custom markers.
    pub markers: FeatureStore<Feature>,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts each feature into the store for its kind. Returns the keys
    /// that were newly added, in input order.
    pub fn insert_all(&mut self, features: impl IntoIterator<Item = Feature>) -> Vec<FeatureKey> {
        let mut added = Vec::new();
        for feature in features {
            let key = feature.key();
            let inserted = match feature {
                Feature::Building(f) => self.buildings.insert(f),
                Feature::Complex(f) => self.complexes.insert(f),
                Feature::Unit(f) => self.units.insert(f),
                Feature::Floor(f) => self.floors.insert(f),
                Feature::Room(f) => self.rooms.insert(f),
                Feature::Door(f) => self.doors.insert(f),
                Feature::Poi(f) => self.pois.insert(f),
                Feature::Marker(f) => self.opt_pois.insert(f),
                f @ Feature::CustomMarker(_) => self.markers.insert(f),
            };
            if inserted {
                added.push(key);
            }
        }
        added
    }

    pub fn contains(&self, key: &FeatureKey) -> bool {
        match key {
            FeatureKey::Building(_) => self.buildings.contains(key),
            FeatureKey::Complex(_) => self.complexes.contains(key),
            FeatureKey::Unit(_) => self.units.contains(key),
            FeatureKey::Floor(_) => self.floors.contains(key),
            FeatureKey::Room(_) => self.rooms.contains(key),
            FeatureKey::Door(_) => self.doors.contains(key),
            FeatureKey::Poi(_) => self.pois.contains(key),
            FeatureKey::Marker(_) => self.opt_pois.contains(key),
            FeatureKey::CustomMarker(_) => self.markers.contains(key),
        }
    }

    /// Looks `key` up in its kind's store, falling back to the marker store.
    pub fn feature(&self, key: &FeatureKey) -> Option<Feature> {
        let found = match key {
            FeatureKey::Building(_) => self.buildings.get(key).cloned().map(Feature::Building),
            FeatureKey::Complex(_) => self.complexes.get(key).cloned().map(Feature::Complex),
            FeatureKey::Unit(_) => self.units.get(key).cloned().map(Feature::Unit),
            FeatureKey::Floor(_) => self.floors.get(key).cloned().map(Feature::Floor),
            FeatureKey::Room(_) => self.rooms.get(key).cloned().map(Feature::Room),
            FeatureKey::Door(_) => self.doors.get(key).cloned().map(Feature::Door),
            FeatureKey::Poi(_) => self.pois.get(key).cloned().map(Feature::Poi),
            FeatureKey::Marker(_) => self.opt_pois.get(key).cloned().map(Feature::Marker),
            FeatureKey::CustomMarker(_) => None,
        };
        found.or_else(|| self.markers.get(key).cloned())
    }

    pub fn building(&self, code: &str) -> Option<&Building> {
        self.buildings.get(&FeatureKey::Building(LocationCode::new(code)))
    }

    pub fn building_by_id(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn complex(&self, id: ComplexId) -> Option<&Complex> {
        self.complexes.get(&FeatureKey::Complex(id))
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&FeatureKey::Unit(id))
    }

    pub fn floor(&self, code: &str) -> Option<&Floor> {
        self.floors.get(&FeatureKey::Floor(LocationCode::new(code)))
    }

    /// Floors of the building addressed by `code`'s building prefix, in
    /// store order.
    pub fn floors_of_building<'a>(&'a self, code: &'a LocationCode) -> impl Iterator<Item = &'a Floor> + 'a {
        self.floors.iter().filter(move |f| f.code.shares_building(code))
    }

    /// Units headquartered in `building`, in the order they were attached.
    pub fn units_of(&self, building: &Building) -> Vec<&Unit> {
        building.units.iter().filter_map(|id| self.unit(*id)).collect()
    }

    /// Opt-POIs located in the room `code`, one per distinct title.
    pub fn opt_pois_in(&self, code: &LocationCode) -> Vec<&Marker> {
        let mut found: Vec<&Marker> = Vec::new();
        for poi in self.opt_pois.iter().filter(|m| m.location.as_ref() == Some(code)) {
            if !found.iter().any(|f| f.title == poi.title) {
                found.push(poi);
            }
        }
        found
    }

    pub fn is_marked(&self, key: &FeatureKey) -> bool {
        self.markers.contains(key)
    }

    pub fn clear_markers(&mut self) {
        self.markers.clear();
    }
}
