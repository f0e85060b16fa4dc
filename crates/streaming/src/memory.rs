use std::cell::RefCell;

use scene::{Feature, FeatureKind, LocationCode};
use serde::Deserialize;
use tracing::debug;

use crate::loader::{FeatureLoader, LoadError, LocalBoxFuture, decode_features};
use crate::request::{ENTRANCE_PURPOSES, Filter, LoadRequest, RequestKey};

/// Feature service backed by an in-memory data set.
///
/// Evaluates typed filters directly and records every request it serves, so
/// callers can check how often the backend was hit.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    features: Vec<Feature>,
    requests: RefCell<Vec<RequestKey>>,
    failing: Vec<FeatureKind>,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    features: Vec<serde_json::Value>,
}

impl MemoryLoader {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    /// Parses a `{"features": [...]}` document.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let fixture: Fixture = serde_json::from_str(json).map_err(|e| LoadError::Decode(e.to_string()))?;
        Ok(Self::new(decode_features(fixture.features)?))
    }

    /// Makes every request for `kind` fail with a backend error.
    pub fn failing(mut self, kind: FeatureKind) -> Self {
        self.failing.push(kind);
        self
    }

    pub fn requests(&self) -> Vec<RequestKey> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, kind: FeatureKind) -> usize {
        self.requests.borrow().iter().filter(|k| k.kind == kind).count()
    }

    fn query(&self, request: &LoadRequest) -> Vec<Feature> {
        self.features
            .iter()
            .filter(|f| f.kind() == request.kind && matches_filter(f, &request.filter))
            .cloned()
            .collect()
    }
}

impl FeatureLoader for MemoryLoader {
    fn load(&self, request: LoadRequest) -> LocalBoxFuture<'_, Result<Vec<Feature>, LoadError>> {
        Box::pin(async move {
            // One scheduler round trip, like a real request.
            tokio::task::yield_now().await;
            let key = request.key();
            self.requests.borrow_mut().push(key.clone());
            if self.failing.contains(&request.kind) {
                return Err(LoadError::backend(key.to_string(), "service unavailable"));
            }
            let out = self.query(&request);
            debug!(request = %key, count = out.len(), "memory loader served request");
            Ok(out)
        })
    }
}

/// SQL `LIKE`: `_` matches one character, `%` any run. Case-insensitive.
pub fn sql_like(value: &str, pattern: &str) -> bool {
    fn go(v: &[char], p: &[char]) -> bool {
        match p.split_first() {
            None => v.is_empty(),
            Some(('%', rest)) => (0..=v.len()).any(|i| go(&v[i..], rest)),
            Some((&pc, rest)) => match v.split_first() {
                Some((&vc, vrest)) => {
                    (pc == '_' || pc.to_lowercase().eq(vc.to_lowercase())) && go(vrest, rest)
                }
                None => false,
            },
        }
    }
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    go(&v, &p)
}

fn code_on_floors(code: Option<&LocationCode>, floors: &[LocationCode]) -> bool {
    code.is_some_and(|c| floors.iter().any(|f| c.as_str().starts_with(f.as_str())))
}

fn note_allowed(note: Option<&String>, poi_filter: &[String]) -> bool {
    poi_filter.is_empty() || note.is_some_and(|n| poi_filter.contains(n))
}

fn matches_filter(feature: &Feature, filter: &Filter) -> bool {
    match filter {
        Filter::LocationCodes { codes, likes } => feature.location_code().is_some_and(|c| {
            codes.iter().any(|x| x.as_str().eq_ignore_ascii_case(c.as_str()))
                || likes.iter().any(|l| sql_like(c.as_str(), l))
        }),
        Filter::LocationCodePrefix(prefix) => feature
            .location_code()
            .is_some_and(|c| c.as_str().starts_with(prefix.as_str())),
        Filter::ActiveFloors(floors) => code_on_floors(feature.location_code(), floors),
        Filter::FloorLayer(id) => matches!(feature, Feature::Floor(f) if f.layer == *id),
        Filter::ComplexIds(ids) => matches!(feature, Feature::Complex(c) if ids.contains(&c.id)),
        Filter::UnitsByBuildings(ids) => {
            matches!(feature, Feature::Unit(u) if u.building_id.is_some_and(|b| ids.contains(&b)))
        }
        Filter::UnitsByComplexes(ids) => {
            matches!(feature, Feature::Unit(u) if u.complex_id.is_some_and(|c| ids.contains(&c)))
        }
        Filter::FloorPois { floors, poi_filter } => match feature {
            Feature::Poi(p) => {
                (ENTRANCE_PURPOSES.contains(&p.purpose.as_str()) || code_on_floors(p.floor_code.as_ref(), floors))
                    && note_allowed(p.note.as_ref(), poi_filter)
            }
            _ => false,
        },
        Filter::OptPoiCategory {
            category,
            workplaces,
            poi_filter,
        } => match feature {
            Feature::Marker(m) => {
                m.category == category.id()
                    && (workplaces.is_empty() || m.workplace.as_ref().is_some_and(|w| workplaces.contains(w)))
                    && note_allowed(m.note.as_ref(), poi_filter)
            }
            _ => false,
        },
    }
}
