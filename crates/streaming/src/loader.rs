pub use futures_util::future::LocalBoxFuture;
use scene::{Feature, FeatureKind};
use serde_json::Value;

use crate::request::LoadRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The feature service failed or was unreachable.
    Backend { request: String, message: String },
    /// The feature service answered but broke its contract (e.g. an id that
    /// was asked for is missing). Not recoverable.
    Integrity(String),
    /// A record's `featureType` names no known feature kind.
    UnknownKind(String),
    /// A record could not be decoded into a feature.
    Decode(String),
}

impl LoadError {
    pub fn backend(request: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Backend {
            request: request.into(),
            message: message.into(),
        }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, LoadError::Integrity(_))
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Backend { request, message } => write!(f, "load {request} failed: {message}"),
            LoadError::Integrity(message) => write!(f, "integrity violation: {message}"),
            LoadError::UnknownKind(kind) => write!(f, "unknown feature kind: {kind:?}"),
            LoadError::Decode(message) => write!(f, "invalid feature record: {message}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Backend feature service.
///
/// Implementations return every feature matching the request; the load
/// coordinator filters out features already present in the stores.
pub trait FeatureLoader {
    fn load(&self, request: LoadRequest) -> LocalBoxFuture<'_, Result<Vec<Feature>, LoadError>>;
}

/// Decodes raw feature records as the feature service sends them.
///
/// The kind tag is checked first so an unsupported `featureType` is reported
/// by name instead of as a generic decode failure.
pub fn decode_features(records: Vec<Value>) -> Result<Vec<Feature>, LoadError> {
    records.into_iter().map(decode_feature).collect()
}

fn decode_feature(record: Value) -> Result<Feature, LoadError> {
    let tag = match record.get("featureType") {
        Some(Value::String(tag)) => tag.clone(),
        _ => return Err(LoadError::Decode("missing featureType".into())),
    };
    if serde_json::from_value::<FeatureKind>(Value::String(tag.clone())).is_err() {
        return Err(LoadError::UnknownKind(tag));
    }
    serde_json::from_value(record).map_err(|e| LoadError::Decode(e.to_string()))
}
