//! Provider identity advertised in handshakes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A feature the active provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Drafts,
    Feedback,
    Attachments,
}

/// Which kind of provider backs the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Self-contained provider with no upstream socket.
    Mock,
    /// External Assistants service reached over SSE.
    External,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Provider metadata as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub label: String,
    pub transport: String,
    pub version: String,
}

/// Full description of a provider, including what it can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    pub id: String,
    pub label: String,
    pub transport: String,
    pub version: String,
    pub capabilities: BTreeSet<Capability>,
}

impl ProviderDescriptor {
    /// Built-in provider used when no upstream URL is configured.
    pub fn mock() -> Self {
        Self {
            kind: ProviderKind::Mock,
            id: "mock".to_string(),
            label: "Mock assistants".to_string(),
            transport: "mock".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: BTreeSet::from([Capability::Drafts, Capability::Feedback]),
        }
    }

    /// The external Assistants service.
    pub fn assistants() -> Self {
        Self {
            kind: ProviderKind::External,
            id: "assistants".to_string(),
            label: "Assistants service".to_string(),
            transport: "sse".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: BTreeSet::from([
                Capability::Drafts,
                Capability::Feedback,
                Capability::Attachments,
            ]),
        }
    }

    /// Pick the provider matching whether an upstream URL is configured.
    pub fn for_upstream(base_url: Option<&str>) -> Self {
        match base_url {
            Some(_) => Self::assistants(),
            None => Self::mock(),
        }
    }

    /// Wire metadata without the capability set.
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id.clone(),
            label: self.label.clone(),
            transport: self.transport.clone(),
            version: self.version.clone(),
        }
    }

    /// Whether this provider is backed by a real upstream socket.
    pub const fn is_mock(&self) -> bool {
        matches!(self.kind, ProviderKind::Mock)
    }
}
