//! The closed set of events a node reacts to.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::role::UnitId;
use crate::state::DatabaseRecord;

/// Relation data as delivered by the host: flat string fields.
pub type RelationFields = BTreeMap<String, String>;

/// One delivery from the host. The host redelivers a deferred event
/// unmodified, so every variant is plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Install,
    ConfigChanged,
    Start,
    UpdateStatus,
    LeaderElected,
    DatabaseCreated(DatabaseFields),
    DatabaseRemoved,
    PeerJoined {
        #[serde(default)]
        unit: Option<UnitId>,
    },
    /// `data` is the sending unit's bag, `app` the application bag the
    /// leader publishes into.
    PeerChanged {
        #[serde(default)]
        unit: Option<UnitId>,
        #[serde(default)]
        data: RelationFields,
        #[serde(default)]
        app: RelationFields,
    },
    PeerDeparted {
        #[serde(default)]
        unit: Option<UnitId>,
    },
    PeerBroken,
    ExternalStorageRelationChanged {
        #[serde(default)]
        fields: RelationFields,
    },
    StorageAttached {
        location: PathBuf,
    },
    StorageDetaching,
    ExternalMountRelationChanged {
        #[serde(default)]
        fields: RelationFields,
    },
    ExternalMountAvailable,
    RedisRelationChanged {
        #[serde(default)]
        fields: RelationFields,
    },
    RedisRelationBroken,
    ProxyJoined {
        address: String,
    },
    ProxyDeparted {
        #[serde(default)]
        remaining: Vec<String>,
    },
    Action(ActionRequest),
}

impl Event {
    /// Stable short name used in logs and the JSON report.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::ConfigChanged => "config_changed",
            Event::Start => "start",
            Event::UpdateStatus => "update_status",
            Event::LeaderElected => "leader_elected",
            Event::DatabaseCreated(_) => "database_created",
            Event::DatabaseRemoved => "database_removed",
            Event::PeerJoined { .. } => "peer_joined",
            Event::PeerChanged { .. } => "peer_changed",
            Event::PeerDeparted { .. } => "peer_departed",
            Event::PeerBroken => "peer_broken",
            Event::ExternalStorageRelationChanged { .. } => "external_storage_relation_changed",
            Event::StorageAttached { .. } => "storage_attached",
            Event::StorageDetaching => "storage_detaching",
            Event::ExternalMountRelationChanged { .. } => "external_mount_relation_changed",
            Event::ExternalMountAvailable => "external_mount_available",
            Event::RedisRelationChanged { .. } => "redis_relation_changed",
            Event::RedisRelationBroken => "redis_relation_broken",
            Event::ProxyJoined { .. } => "proxy_joined",
            Event::ProxyDeparted { .. } => "proxy_departed",
            Event::Action(_) => "action",
        }
    }

    /// True for the events that carry peer-relation traffic.
    pub fn is_peer_event(&self) -> bool {
        matches!(
            self,
            Event::PeerJoined { .. } | Event::PeerChanged { .. } | Event::PeerDeparted { .. }
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operator action invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Database relation data as received. Any field may be blank until the
/// provider has finished setting the database up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseFields {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, alias = "pass")]
    pub password: String,
    #[serde(default, alias = "dbname")]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl DatabaseFields {
    /// Checks every field is present and converts to an endpoint.
    pub fn validate(&self) -> Result<DatabaseEndpoint, ValidationError> {
        for (name, value) in [
            ("host", &self.host),
            ("port", &self.port),
            ("user", &self.user),
            ("password", &self.password),
            ("name", &self.name),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingDatabaseField(name));
            }
        }

        let port = parse_port(&self.port)?;

        Ok(DatabaseEndpoint {
            host: self.host.trim().to_string(),
            port,
            user: self.user.clone(),
            password: SecretString::from(self.password.clone()),
            name: self.name.clone(),
            version: self.version.clone(),
        })
    }
}

/// A validated database endpoint.
#[derive(Debug)]
pub struct DatabaseEndpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
    pub version: String,
}

impl DatabaseEndpoint {
    /// Builds an endpoint from a provider's `host:port` master string.
    pub fn from_relation(
        master: &str,
        user: &str,
        password: &str,
        name: &str,
        version: &str,
    ) -> Result<Self, ValidationError> {
        let (host, port) = master
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ValidationError::InvalidEndpoint(master.to_string()))?;
        if host.is_empty() {
            return Err(ValidationError::InvalidEndpoint(master.to_string()));
        }

        DatabaseFields {
            host: host.to_string(),
            port: port.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        }
        .validate()
    }

    /// The endpoint without its password, as kept in the lifecycle state.
    pub fn record(&self) -> DatabaseRecord {
        DatabaseRecord {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            name: self.name.clone(),
        }
    }

    /// `host:port` as passed to the bootstrap call.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(value: &str) -> Result<u16, ValidationError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ValidationError::InvalidEndpoint(format!("port '{}'", value))),
    }
}
