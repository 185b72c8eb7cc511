//! Route classification and credential precedence.
//!
//! Rules are evaluated top to bottom and the first rule whose prefix matches
//! decides which roles may authenticate the request, in order of preference.
//! A path matching no rule is a general route.
use std::fmt;

use crate::model::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Admin,
    Partner,
    General,
}

impl RouteClass {
    /// Role whose credential is cleared when this class of route answers 401.
    /// General routes never clear anything.
    pub fn guarded_role(&self) -> Option<Role> {
        match self {
            RouteClass::Admin => Some(Role::Admin),
            RouteClass::Partner => Some(Role::Partner),
            RouteClass::General => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Admin => "admin",
            RouteClass::Partner => "partner",
            RouteClass::General => "general",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRule {
    pub class: RouteClass,
    /// Path prefixes without the leading slash.
    pub prefixes: &'static [&'static str],
    /// Roles tried in order; the first one holding a token wins.
    pub roles: &'static [Role],
}

impl RouteRule {
    fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// Admin routes never fall back to another role's token.
pub static ROUTE_RULES: &[RouteRule] = &[
    RouteRule {
        class: RouteClass::Admin,
        prefixes: &["admin"],
        roles: &[Role::Admin],
    },
    RouteRule {
        class: RouteClass::Partner,
        prefixes: &[
            "gyms/me",
            "bookings",
            "events/host",
            "events/my",
            "event-bookings",
        ],
        roles: &[Role::Partner, Role::User],
    },
];

pub static GENERAL_RULE: RouteRule = RouteRule {
    class: RouteClass::General,
    prefixes: &[],
    roles: &[Role::User],
};

/// Strip the leading slash so `/admin/x` and `admin/x` classify alike.
pub fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Find the rule governing `path`.
pub fn classify(path: &str) -> &'static RouteRule {
    let path = normalize_path(path);
    ROUTE_RULES
        .iter()
        .find(|rule| rule.matches(path))
        .unwrap_or(&GENERAL_RULE)
}
