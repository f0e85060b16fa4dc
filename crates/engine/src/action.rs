use foundation::{Coordinate, FloorLayerId};
use layers::{ClusterBucket, Hit};
use scene::{Feature, FeatureKey, FeatureKind, LocationCode};
use serde::Serialize;
use streaming::LoadError;

use crate::options::ResetOptions;
use crate::view::{CameraMove, ViewState};

/// Inputs to the map reducer.
///
/// User input arrives as the first group. The rest are completions of
/// asynchronous loads; each carries the reset generation it was started
/// under.
#[derive(Debug, Clone)]
pub enum Action {
    Clicked { hit: Hit, coordinate: Coordinate },
    ViewChanged(ViewState),
    GeolocationClicked(Coordinate),
    PopupClosed,
    Reset(Box<ResetOptions>),

    /// Internal: change the selected code. `None` deselects.
    Select(Option<LocationCode>),

    /// Floors of the building `target` belongs to are in the stores.
    FloorsLoaded { target: LocationCode, generation: u64 },
    /// Floors sharing `layer`, and their contents, are in the stores.
    FloorLayerLoaded {
        floor: LocationCode,
        layer: Option<FloorLayerId>,
        generation: u64,
    },
    MarkersLoaded {
        markers: Vec<Feature>,
        not_found: Vec<String>,
        generation: u64,
    },
    ZoomToLoaded { features: Vec<Feature>, generation: u64 },
    LoadFailed {
        error: LoadError,
        origin: LoadOrigin,
        generation: u64,
    },
}

/// Which load a failure belongs to, so only its own bookkeeping is cleared.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOrigin {
    /// Floors of the building a code belongs to.
    Floors(LocationCode),
    /// Layer and contents of a selected floor.
    FloorLayer(LocationCode),
    /// Marker or zoom-to resolution of a reset.
    Reset,
}

impl Action {
    /// Generation of a load completion; `None` for other actions.
    pub fn generation(&self) -> Option<u64> {
        match self {
            Action::FloorsLoaded { generation, .. }
            | Action::FloorLayerLoaded { generation, .. }
            | Action::MarkersLoaded { generation, .. }
            | Action::ZoomToLoaded { generation, .. }
            | Action::LoadFailed { generation, .. } => Some(*generation),
            _ => None,
        }
    }
}

/// Payload handed to an identify callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub kind: FeatureKind,
    pub building_code: Option<String>,
    pub room_code: Option<String>,
    pub door_code: Option<String>,
    /// Clicked coordinate, rounded to millimetres.
    pub coordinate: Coordinate,
}

/// Observable outcome of a batch, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum MapEvent {
    SelectionChanged { selected: Option<LocationCode> },
    ActiveFloorsChanged { floors: Vec<LocationCode> },
    InfoPanelVisibility { visible: bool },
    ClustersChanged {
        bucket: Option<ClusterBucket>,
        removed: Vec<FeatureKey>,
        added: Vec<FeatureKey>,
    },
    Animate { camera: CameraMove },
    PopupChanged { feature: Option<FeatureKey> },
    Identified(Identified),
    CodesNotFound { codes: Vec<String> },
    LoadFailed { message: String },
}
