//! Service Definition
//!
//! The service registration document kept on disk next to the service and
//! sent as-is to the agent's register endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::error::{StoreError, SyncError};

/// Environment variable that supplies the service id when the file has none
pub const ENV_SERVICE_ID: &str = "CONSUL_SERVICE_ID";

/// A single service registration record
///
/// Keys follow the agent's JSON schema. Empty optional fields are left out on
/// write, and keys this type does not model are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDefinition {
    /// Logical name of the service, shared by all of its instances
    #[serde(alias = "Name")]
    pub name: String,

    /// Unique id on this agent, defaults to the name
    #[serde(rename = "ID", alias = "id", alias = "Id", skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(alias = "Tags", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Service address; the agent's address is used when empty
    #[serde(alias = "Address", skip_serializing_if = "String::is_empty")]
    pub address: String,

    #[serde(alias = "Meta", skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,

    #[serde(alias = "Port", skip_serializing_if = "is_zero")]
    pub port: u16,

    /// Empty for a typical service, `connect-proxy` for a Connect proxy
    #[serde(rename = "Kind", alias = "kind", skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Connect proxy configuration, passed through as-is
    #[serde(alias = "Proxy", skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Value>,

    /// Connect configuration, passed through as-is
    #[serde(alias = "Connect", skip_serializing_if = "Option::is_none")]
    pub connect: Option<Value>,

    #[serde(alias = "Check", skip_serializing_if = "Option::is_none")]
    pub check: Option<HealthCheck>,

    #[serde(alias = "Checks", skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,

    /// Lets external agents modify the tags in the catalog
    #[serde(alias = "EnableTagOverride", skip_serializing_if = "is_false")]
    pub enable_tag_override: bool,

    #[serde(alias = "Weights", skip_serializing_if = "Option::is_none")]
    pub weights: Option<Weights>,

    /// Keys not modelled above
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A health check attached to the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    #[serde(rename = "HTTP", alias = "http", skip_serializing_if = "String::is_empty")]
    pub http: String,

    #[serde(alias = "Interval", skip_serializing_if = "String::is_empty")]
    pub interval: String,

    #[serde(alias = "Method", skip_serializing_if = "String::is_empty")]
    pub method: String,

    #[serde(alias = "Timeout", skip_serializing_if = "String::is_empty")]
    pub timeout: String,

    /// Script check command and arguments
    #[serde(alias = "Args", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Other check keys (TCP, TTL, Name, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// DNS weights for the service
///
/// Missing values stay missing on disk; the agent treats them as 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    #[serde(alias = "Passing", skip_serializing_if = "Option::is_none")]
    pub passing: Option<i32>,

    #[serde(alias = "Warning", skip_serializing_if = "Option::is_none")]
    pub warning: Option<i32>,
}

impl Weights {
    pub fn new(passing: i32, warning: i32) -> Self {
        Self {
            passing: Some(passing),
            warning: Some(warning),
        }
    }

    pub fn passing(&self) -> i32 {
        self.passing.unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn warning(&self) -> i32 {
        self.warning.unwrap_or(DEFAULT_WEIGHT)
    }
}

const DEFAULT_WEIGHT: i32 = 1;

fn is_zero(port: &u16) -> bool {
    *port == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Result of adding a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Added,
    Duplicate,
    Empty,
}

impl ServiceDefinition {
    /// Create a definition with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load a definition from a JSON file
    ///
    /// When the file carries no id, `id_override` is used, then the name.
    /// On error the caller is expected to carry on with a fresh definition.
    pub fn load<P: AsRef<Path>>(path: P, id_override: Option<&str>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut definition: ServiceDefinition =
            serde_json::from_slice(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        definition.dedup_tags();

        if definition.id.is_empty() {
            definition.id = match id_override {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => definition.name.clone(),
            };
        }

        debug!(path = %path.display(), name = %definition.name, id = %definition.id, "Service definition loaded");
        Ok(definition)
    }

    /// Write the definition to `path`, replacing any previous content
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        let content = self.to_json().map_err(StoreError::Encode)?;

        std::fs::write(path, content).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Service definition saved");
        Ok(())
    }

    /// Compact JSON form, as written to disk and sent to the agent
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Set the name, ignoring empty values
    pub fn set_name(&mut self, name: &str) {
        if !name.is_empty() {
            self.name = name.to_string();
        }
    }

    /// Set the id, ignoring empty values
    pub fn set_id(&mut self, id: &str) {
        if !id.is_empty() {
            self.id = id.to_string();
        }
    }

    /// Append a tag unless it is empty or already present
    pub fn add_tag(&mut self, tag: &str) -> TagOutcome {
        if tag.is_empty() {
            return TagOutcome::Empty;
        }
        if self.tags.iter().any(|t| t == tag) {
            return TagOutcome::Duplicate;
        }
        self.tags.push(tag.to_string());
        TagOutcome::Added
    }

    /// The id the agent knows this service by
    pub fn effective_id(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }

    /// Weights with the agent's 1/1 default filled in
    pub fn effective_weights(&self) -> Weights {
        let weights = self.weights.unwrap_or_default();
        Weights::new(weights.passing(), weights.warning())
    }

    /// Drop repeated tags, keeping the first occurrence
    fn dedup_tags(&mut self) {
        let mut seen = HashSet::new();
        self.tags.retain(|tag| seen.insert(tag.clone()));
    }

    /// Check the definition can be sent to the agent
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.name.is_empty() {
            return Err(SyncError::EmptyName);
        }
        Ok(())
    }
}
