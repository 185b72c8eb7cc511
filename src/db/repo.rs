use super::model::StoredCredential;
use crate::credentials::{validate_token, CredentialStore};
use crate::model::Role;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{info, instrument};

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open credential database {}", normalized))?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and make sure the file gets created. In-memory URLs pass
/// through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    match query_part {
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_credential(pool: &Pool, key: &str) -> Result<Option<StoredCredential>> {
    let row = sqlx::query_as::<_, StoredCredential>(
        "SELECT key, token, updated_at FROM credentials WHERE key = ?",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[instrument(skip_all)]
pub async fn upsert_credential(pool: &Pool, key: &str, token: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO credentials (key, token) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET token = excluded.token, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(token)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn delete_credential(pool: &Pool, key: &str) -> Result<bool> {
    let res = sqlx::query("DELETE FROM credentials WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn list_credentials(pool: &Pool) -> Result<Vec<StoredCredential>> {
    let rows = sqlx::query_as::<_, StoredCredential>(
        "SELECT key, token, updated_at FROM credentials ORDER BY key",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Credential store persisted in SQLite, the on-disk stand-in for the
/// browser's origin-scoped storage.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: Pool,
}

impl SqliteCredentialStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open (and migrate) the database at `database_url`.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, role: Role) -> Result<Option<String>> {
        Ok(get_credential(&self.pool, role.storage_key())
            .await?
            .map(|c| c.token))
    }

    async fn set(&self, role: Role, token: &str) -> Result<()> {
        let token = validate_token(token)?;
        upsert_credential(&self.pool, role.storage_key(), token).await?;
        info!(%role, "stored credential");
        Ok(())
    }

    async fn clear(&self, role: Role) -> Result<()> {
        if delete_credential(&self.pool, role.storage_key()).await? {
            info!(%role, "cleared credential");
        }
        Ok(())
    }
}
