use scene::location::{self, CodeKind};
use scene::{Feature, LocationCode};
use streaming::{FeatureLoader, LoadCoordinator, LoadError, LocalBoxFuture, OptPoiCategory};
use tracing::debug;

use crate::action::{Action, LoadOrigin};
use crate::options::ResetOptions;

/// Asynchronous follow-up of a batch. Resolves to the completion action that
/// is dispatched as a batch of its own.
pub type Effect = LocalBoxFuture<'static, Action>;

fn completion<F>(generation: u64, origin: LoadOrigin, fut: F) -> Effect
where
    F: Future<Output = Result<Action, LoadError>> + 'static,
{
    Box::pin(async move {
        match fut.await {
            Ok(action) => action,
            Err(error) => Action::LoadFailed {
                error,
                origin,
                generation,
            },
        }
    })
}

/// Floors of the building `target` belongs to.
pub fn building_floors<L: FeatureLoader + 'static>(loads: &LoadCoordinator<L>, target: LocationCode, generation: u64) -> Effect {
    let loads = loads.clone();
    completion(generation, LoadOrigin::Floors(target.clone()), async move {
        loads.ensure_floors_loaded(&target).await?;
        Ok(Action::FloorsLoaded { target, generation })
    })
}

/// The floor layer of `floor` and the contents of every floor on it.
///
/// Stages: floors of the building, then the floor layer (skipped when it is
/// already active), then rooms, doors and POIs of the layer's floors.
pub fn floor_layer<L: FeatureLoader + 'static>(
    loads: &LoadCoordinator<L>,
    floor: LocationCode,
    poi_filter: Vec<String>,
    generation: u64,
) -> Effect {
    let loads = loads.clone();
    completion(generation, LoadOrigin::FloorLayer(floor.clone()), async move {
        let floors = loads.ensure_floors_loaded(&floor).await?;
        let Some(layer) = floors.iter().find(|f| f.code == floor).map(|f| f.layer) else {
            debug!(%floor, "floor not found in its building");
            return Ok(Action::FloorLayerLoaded {
                floor,
                layer: None,
                generation,
            });
        };
        let codes: Vec<LocationCode> = match loads.ensure_floor_layer_loaded(layer).await? {
            Some(layer_floors) => layer_floors.into_iter().map(|f| f.code).collect(),
            None => vec![floor.clone()],
        };
        loads.ensure_floor_contents(&codes, &poi_filter).await?;
        Ok(Action::FloorLayerLoaded {
            floor,
            layer: Some(layer),
            generation,
        })
    })
}

/// Resolves the marker option into features.
///
/// Location codes are loaded per kind; exact codes without a match, and
/// strings that are no location code at all, are reported as not found. A
/// `ctg:` category resolves to the rooms its opt-POIs are located in.
pub fn markers<L: FeatureLoader + 'static>(loads: &LoadCoordinator<L>, options: &ResetOptions, generation: u64) -> Effect {
    let loads = loads.clone();
    let codes = options.marker_codes();
    let category = options.category();
    let custom = options.custom_markers();
    let marker_filter = options.marker_filter.clone();
    let poi_filter = options.poi_filter.clone();
    completion(generation, LoadOrigin::Reset, async move {
        let mut groups: [Vec<String>; 3] = Default::default();
        let mut not_found: Vec<String> = Vec::new();
        for code in codes {
            let slot = if location::is_building_code_or_like(&code) {
                0
            } else if location::is_room_code_or_like(&code) {
                1
            } else if location::is_door_code_or_like(&code) {
                2
            } else {
                not_found.push(code);
                continue;
            };
            groups[slot].push(code);
        }

        let mut markers: Vec<Feature> = Vec::new();
        for group in groups.iter().filter(|g| !g.is_empty()) {
            let found = loads.features_by_codes(group).await?;
            for code in group {
                let exact = location::classify(code) != CodeKind::Invalid;
                if exact && !found.iter().any(|f| f.location_code().is_some_and(|c| c.as_str() == code)) {
                    not_found.push(code.clone());
                }
            }
            markers.extend(found);
        }
        if let Some(category) = category {
            markers.extend(opt_poi_markers(&loads, category, &marker_filter, &poi_filter).await?);
        }
        markers.extend(custom.into_iter().map(Feature::CustomMarker));
        Ok(Action::MarkersLoaded {
            markers,
            not_found,
            generation,
        })
    })
}

async fn opt_poi_markers<L: FeatureLoader + 'static>(
    loads: &LoadCoordinator<L>,
    category: OptPoiCategory,
    workplaces: &[String],
    poi_filter: &[String],
) -> Result<Vec<Feature>, LoadError> {
    let rooms = loads.opt_poi_rooms(category, workplaces, poi_filter).await?;
    debug!(category = category.id(), rooms = rooms.len(), "category markers resolved");
    Ok(rooms)
}

/// Features the view is fitted to after a reset.
pub fn zoom_to<L: FeatureLoader + 'static>(loads: &LoadCoordinator<L>, codes: Vec<String>, generation: u64) -> Effect {
    let loads = loads.clone();
    completion(generation, LoadOrigin::Reset, async move {
        let features = loads.features_by_codes(&codes).await?;
        Ok(Action::ZoomToLoaded { features, generation })
    })
}
