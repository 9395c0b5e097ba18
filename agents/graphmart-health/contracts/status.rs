//! Status payloads returned by the artifact service
//!
//! Mirrors the `status?detail=true` JSON document. Missing fields fall back
//! to their defaults; wrongly typed fields fail decoding.

use serde::{Deserialize, Serialize};

/// State name that marks an artifact as serving
pub const ONLINE_TOKEN: &str = "Online";

/// Whether a status token reports the artifact as online.
///
/// The service embeds the short state name inside a longer namespaced value
/// (`http://.../Graphmart#Online`), so this is a containment test rather
/// than equality.
pub fn is_online_token(token: &str) -> bool {
    token.contains(ONLINE_TOKEN)
}

/// Short state name from a namespaced status value.
///
/// `http://cambridgesemantics.com/ontologies/Graphmarts#Online` becomes
/// `Online`; values without a `#` are returned unchanged.
pub fn short_status_token(value: &str) -> &str {
    match value.split_once('#') {
        Some((_, fragment)) => fragment,
        None => value,
    }
}

/// Detailed artifact status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatus {
    /// Status token, possibly namespaced
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub is_complete: bool,

    #[serde(default)]
    pub failed_layers: u32,

    /// Stale-but-not-failed layers
    #[serde(default)]
    pub dirty_layers: u32,

    #[serde(default)]
    pub child_layer: Vec<LayerStatus>,

    /// AnzoGraph server the artifact is activated against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_azg_server: Option<String>,
}

impl RawStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_complete(mut self, complete: bool) -> Self {
        self.is_complete = complete;
        self
    }

    pub fn with_failed_layers(mut self, failed: u32) -> Self {
        self.failed_layers = failed;
        self
    }

    pub fn with_dirty_layers(mut self, dirty: u32) -> Self {
        self.dirty_layers = dirty;
        self
    }

    pub fn with_layer(mut self, layer: LayerStatus) -> Self {
        self.child_layer.push(layer);
        self
    }

    pub fn with_azg_server(mut self, server: impl Into<String>) -> Self {
        self.static_azg_server = Some(server.into());
        self
    }

    pub fn is_online(&self) -> bool {
        is_online_token(&self.status)
    }

    /// Enabled layers that carry an error
    pub fn failed_enabled_layers(&self) -> impl Iterator<Item = &LayerStatus> {
        self.child_layer
            .iter()
            .filter(|layer| layer.enabled && layer.error.is_some())
    }
}

/// One layer of an artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Steps of this layer
    #[serde(default)]
    pub child: Vec<StepStatus>,
}

impl LayerStatus {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_step(mut self, step: StepStatus) -> Self {
        self.child.push(step);
        self
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }
}

/// One step of a layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepStatus {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }
}

/// Flattened per-layer view for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStatusReport {
    pub uri: String,
    pub title: String,
    pub enabled: bool,
    pub has_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
