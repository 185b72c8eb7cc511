//! Bearer credential storage shared by every role.
//!
//! The store is global and mutable: any part of the console may log a role in
//! or out at any time, so readers must call [`CredentialStore::get`] at the
//! moment they need a token instead of holding on to a copy.
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::api::routing::RouteClass;
use crate::model::Role;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, role: Role) -> Result<Option<String>>;

    async fn set(&self, role: Role, token: &str) -> Result<()>;

    async fn clear(&self, role: Role) -> Result<()>;
}

/// Rejects tokens that could never authenticate anything.
pub fn validate_token(token: &str) -> Result<&str> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("token must be non-empty"));
    }
    Ok(trimmed)
}

/// React to a 401 on a route of `class`: drop the credential guarding that
/// class and return the role whose login entry point should be shown next.
/// General routes clear nothing.
pub async fn revoke_after_unauthorized(
    store: &dyn CredentialStore,
    class: RouteClass,
) -> Result<Option<Role>> {
    let Some(role) = class.guarded_role() else {
        return Ok(None);
    };
    store.clear(role).await?;
    Ok(Some(role))
}

/// Process-local store, used by tests and embedders without persistence.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<HashMap<Role, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (Role, S)>,
        S: Into<String>,
    {
        let map = tokens.into_iter().map(|(r, t)| (r, t.into())).collect();
        Self {
            tokens: RwLock::new(map),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, role: Role) -> Result<Option<String>> {
        let guard = self
            .tokens
            .read()
            .map_err(|_| anyhow!("credential store poisoned"))?;
        Ok(guard.get(&role).cloned())
    }

    async fn set(&self, role: Role, token: &str) -> Result<()> {
        let token = validate_token(token)?;
        let mut guard = self
            .tokens
            .write()
            .map_err(|_| anyhow!("credential store poisoned"))?;
        guard.insert(role, token.to_string());
        Ok(())
    }

    async fn clear(&self, role: Role) -> Result<()> {
        let mut guard = self
            .tokens
            .write()
            .map_err(|_| anyhow!("credential store poisoned"))?;
        guard.remove(&role);
        Ok(())
    }
}
