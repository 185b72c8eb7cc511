use serde::{Deserialize, Serialize};
use std::fmt;

/// Acting role behind a bearer credential.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Partner,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Partner, Role::Admin];

    /// Key the credential is persisted under.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Role::User => "token",
            Role::Partner => "partnerToken",
            Role::Admin => "adminToken",
        }
    }

    /// Login entry point the console sends the operator to after a 401.
    pub fn login_path(&self) -> &'static str {
        match self {
            Role::User => "/login",
            Role::Partner => "/partner/login",
            Role::Admin => "/admin/login",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Partner => "partner",
            Role::Admin => "admin",
        }
    }

    pub fn parse_role(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "partner" => Some(Role::Partner),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of partner a payout is settled with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PayoutTarget {
    Gym,
    Event,
}

impl PayoutTarget {
    /// Path segment used by the mark-paid endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutTarget::Gym => "gym",
            PayoutTarget::Event => "event",
        }
    }

    pub fn parse_target(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gym" | "gyms" => Some(PayoutTarget::Gym),
            "event" | "events" => Some(PayoutTarget::Event),
            _ => None,
        }
    }
}

impl fmt::Display for PayoutTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row collection shown by the settlement table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Gyms,
    Events,
}

impl Tab {
    pub fn target(&self) -> PayoutTarget {
        match self {
            Tab::Gyms => PayoutTarget::Gym,
            Tab::Events => PayoutTarget::Event,
        }
    }

    pub fn parse_tab(s: &str) -> Option<Self> {
        PayoutTarget::parse_target(s).map(|t| match t {
            PayoutTarget::Gym => Tab::Gyms,
            PayoutTarget::Event => Tab::Events,
        })
    }
}
