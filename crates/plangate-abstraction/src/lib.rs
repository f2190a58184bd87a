//! Collaborator abstraction layer for plangate.
//!
//! This crate defines the narrow interface the complexity gate uses to talk to
//! external analysis services: a structural analyzer (file summaries), a
//! dependency analyzer (module relationships) and a knowledge/pattern store.
//! Production adapters implement [`Collaborator`] against whatever host
//! protocol exists; test doubles return canned data.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when calling a collaborator.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// The service is not configured or cannot be reached at all.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within the allotted time.
    #[error("Collaborator call timed out after {0}ms")]
    Timeout(u64),

    /// The service answered, but the call failed.
    #[error("Collaborator call failed: {0}")]
    Failed(String),

    /// Other unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CollaboratorError {
    /// Returns true when the service as a whole should be treated as unreachable,
    /// as opposed to a single call failing.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Per-file metrics returned by a structural analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    /// Number of lines in the file.
    #[serde(default)]
    pub line_count: u64,
    /// Number of functions declared in the file.
    #[serde(default)]
    pub function_count: u64,
}

/// A single dependency edge reported by a dependency analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The module or file depended upon.
    pub target: String,
    /// Optional relationship kind (e.g. "import", "call").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Dependency {
    /// Creates a dependency on `target` with no kind.
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into(), kind: None }
    }
}

/// A prior entry returned by a similarity query against the pattern store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Node identifier in the pattern store.
    pub id: String,
    /// Similarity in [0, 1], when the store reports one.
    #[serde(default)]
    pub similarity: Option<f64>,
    /// Stored content, when the store returns it.
    #[serde(default)]
    pub content: Option<String>,
}

/// Identifier of a node created in the pattern store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A new observation to write into the pattern store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Node type in the store (always "observation" for gate assessments).
    pub node_type: String,
    /// Human-readable content.
    pub content: String,
    /// Structured metadata attached to the node.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Observation {
    /// Creates an observation node with empty metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { node_type: "observation".to_string(), content: content.into(), metadata: HashMap::new() }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// The interface to every external analysis capability the gate uses.
///
/// Every method has a default body returning [`CollaboratorError::Unavailable`],
/// so an adapter only implements the capabilities its host actually offers.
/// Callers must treat any error as "capability unavailable for this call" and
/// degrade gracefully.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Returns the name of this collaborator, for logging.
    fn name(&self) -> &str {
        "collaborator"
    }

    /// Summarizes a single file (line and function counts).
    async fn summarize(&self, file_path: &str) -> CollaboratorResult<FileSummary> {
        let _ = file_path;
        Err(CollaboratorError::Unavailable("structural analysis not supported".to_string()))
    }

    /// Returns the relationships of `target` for the given query type
    /// (e.g. "module_deps"), resolved relative to `context`.
    async fn relationships(
        &self,
        target: &str,
        query_type: &str,
        context: &str,
    ) -> CollaboratorResult<Vec<Dependency>> {
        let _ = (target, query_type, context);
        Err(CollaboratorError::Unavailable("dependency analysis not supported".to_string()))
    }

    /// Queries the pattern store for entries similar to `pattern`.
    async fn query_similar(
        &self,
        pattern: &str,
        limit: usize,
        min_similarity: f64,
    ) -> CollaboratorResult<Vec<PatternMatch>> {
        let _ = (pattern, limit, min_similarity);
        Err(CollaboratorError::Unavailable("pattern query not supported".to_string()))
    }

    /// Writes a new observation node and returns its id.
    async fn create_observation(&self, observation: &Observation) -> CollaboratorResult<NodeId> {
        let _ = observation;
        Err(CollaboratorError::Unavailable("pattern store not supported".to_string()))
    }

    /// Links two nodes in the pattern store.
    async fn link(
        &self,
        from: &NodeId,
        to: &str,
        link_type: &str,
        strength: f64,
    ) -> CollaboratorResult<()> {
        let _ = (from, to, link_type, strength);
        Err(CollaboratorError::Unavailable("pattern linking not supported".to_string()))
    }
}

/// A collaborator that offers no capabilities. Every call reports
/// `Unavailable`, which drives every stage onto its fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCollaborator;

#[async_trait]
impl Collaborator for NullCollaborator {
    fn name(&self) -> &str {
        "null"
    }
}
