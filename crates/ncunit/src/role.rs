use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    Follower,
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => f.write_str("leader"),
            Role::Follower => f.write_str("follower"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leader" => Ok(Role::Leader),
            "follower" => Ok(Role::Follower),
            other => Err(format!("unknown role '{}', expected leader or follower", other)),
        }
    }
}

/// Identity of one participant, e.g. `nextcloud/0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Who this node is for the duration of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleContext {
    pub role: Role,
    pub unit: UnitId,
    pub ingress_address: String,
}

impl RoleContext {
    pub fn new(role: Role, unit: impl Into<UnitId>, ingress_address: impl Into<String>) -> Self {
        Self {
            role,
            unit: unit.into(),
            ingress_address: ingress_address.into(),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role.is_leader()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!("Leader".parse::<Role>().unwrap(), Role::Leader);
        assert_eq!("follower".parse::<Role>().unwrap(), Role::Follower);
        assert!("observer".parse::<Role>().is_err());
    }

    #[test]
    fn test_unit_id_serializes_as_string() {
        let json = serde_json::to_string(&UnitId::new("nextcloud/2")).unwrap();
        assert_eq!(json, r#""nextcloud/2""#);
    }
}
