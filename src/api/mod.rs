use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::{parse_error_message, ApiError};
use crate::model::{PayoutTarget, Role};
use crate::settlement::SettlementOverview;

use self::model::{Envelope, MarkPaidRequest};
use self::routing::{classify, normalize_path, RouteClass};

pub mod model;
pub mod routing;

pub const OVERVIEW_PATH: &str = "/admin/settlements/overview";

static LOCAL_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(localhost|.*\.local|127(\.\d{1,3}){3}|0\.0\.0\.0|::1|\[::1\]|10(\.\d{1,3}){3}|192\.168(\.\d{1,3}){2}|172\.(1[6-9]|2\d|3[01])(\.\d{1,3}){2})$",
    )
    .expect("valid local host pattern")
});

/// Loopback, `.local` and RFC 1918 hosts count as a development machine.
pub fn is_local_hostname(hostname: &str) -> bool {
    LOCAL_HOST.is_match(&hostname.trim().to_ascii_lowercase())
}

/// Pick the backend base URL once at start-up.
///
/// An explicit base wins and gets `/api` appended unless one of its path
/// segments already is `api`. Otherwise the console's own host name decides between the local and the
/// production backend. The result always ends with `/` so relative joins stay
/// beneath it.
pub fn resolve_base_url(
    explicit: Option<&str>,
    hostname: &str,
    local_base_url: &str,
    production_base_url: &str,
) -> Result<Url, ApiError> {
    let raw = match explicit.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => {
            let base = base.trim_end_matches('/');
            let parsed = Url::parse(base)
                .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;
            let has_api = parsed
                .path_segments()
                .map(|mut segments| segments.any(|s| s == "api"))
                .unwrap_or(false);
            if has_api {
                base.to_string()
            } else {
                format!("{}/api", base)
            }
        }
        None if is_local_hostname(hostname) => local_base_url.trim().to_string(),
        None => production_base_url.trim().to_string(),
    };
    let with_slash = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&with_slash).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", with_slash, e)))
}

/// A built request together with the routing decision behind it.
#[derive(Debug)]
pub struct AuthorizedRequest {
    pub request: reqwest::Request,
    pub class: RouteClass,
    /// Role whose token was attached, if any.
    pub role: Option<Role>,
}

/// HTTP client shared by every screen. Attaches at most one bearer token per
/// request, chosen by [`routing::classify`].
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    store: Arc<dyn CredentialStore>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: Url, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, store, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: Url,
        store: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent("passiify-admin/0.1")
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            http,
            base_url,
            store,
        })
    }

    pub fn from_config(cfg: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let explicit = cfg.explicit_base_url();
        let base_url = resolve_base_url(
            explicit.as_deref(),
            &cfg.api.hostname,
            &cfg.api.local_base_url,
            &cfg.api.production_base_url,
        )?;
        debug!(%base_url, "resolved backend base URL");
        Self::with_timeout(
            base_url,
            store,
            Duration::from_secs(cfg.api.timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Absolute URL for a path relative to the base.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(normalize_path(path))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Token to attach for `path`, read from the store right now.
    ///
    /// A store that cannot be read is treated like an empty one: the request
    /// goes out unauthenticated rather than failing.
    pub async fn select_credential(&self, path: &str) -> Option<(Role, String)> {
        let rule = classify(path);
        for role in rule.roles {
            match self.store.get(*role).await {
                Ok(Some(token)) => return Some((*role, token)),
                Ok(None) => {}
                Err(err) => warn!(?err, %role, "failed to read credential"),
            }
        }
        None
    }

    pub async fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<AuthorizedRequest, ApiError> {
        let class = classify(path).class;
        let mut builder = self.http.request(method, self.endpoint(path)?);
        let role = match self.select_credential(path).await {
            Some((role, token)) => {
                builder = builder.header("Authorization", format!("Bearer {}", token));
                Some(role)
            }
            None => None,
        };
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(AuthorizedRequest {
            request: builder.build()?,
            class,
            role,
        })
    }

    /// Send a request and decode a JSON response.
    ///
    /// 401 maps to [`ApiError::Unauthorized`] carrying the route class; the
    /// caller decides which credential to drop. Other non-success statuses
    /// carry the backend's message when it sent one.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let AuthorizedRequest {
            request,
            class,
            role,
        } = self.build_request(method, path, body).await?;
        debug!(method=%request.method(), url=%request.url(), %class, ?role, "sending request");

        let res = self.http.execute(request).await?;
        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(path, %class, ?role, "backend answered 401");
            return Err(ApiError::Unauthorized { class });
        }

        let text = res.text().await?;
        if !status.is_success() {
            let message = parse_error_message(&text);
            warn!(path, %status, ?message, "backend error");
            return Err(ApiError::Status { status, message });
        }

        let text = if text.trim().is_empty() { "null" } else { &text };
        Ok(serde_json::from_str(text)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }
}

/// Path of the mark-paid command for one partner.
pub fn mark_paid_path(target: PayoutTarget, id: &str) -> String {
    format!("/admin/settlements/mark-paid/{}/{}", target.as_str(), id)
}

/// Backend operations behind the settlement screen.
#[async_trait]
pub trait SettlementService: Send + Sync {
    async fn fetch_overview(&self) -> Result<SettlementOverview, ApiError>;

    async fn mark_paid(
        &self,
        target: PayoutTarget,
        id: &str,
        note: &str,
    ) -> Result<Envelope, ApiError>;
}

#[async_trait]
impl SettlementService for ApiClient {
    #[instrument(skip_all)]
    async fn fetch_overview(&self) -> Result<SettlementOverview, ApiError> {
        self.get(OVERVIEW_PATH).await
    }

    #[instrument(skip(self, note))]
    async fn mark_paid(
        &self,
        target: PayoutTarget,
        id: &str,
        note: &str,
    ) -> Result<Envelope, ApiError> {
        let body = serde_json::to_value(MarkPaidRequest {
            note: note.to_string(),
        })?;
        let envelope: Option<Envelope> = self.post(&mark_paid_path(target, id), &body).await?;
        let envelope = envelope.unwrap_or_default();
        if !envelope.is_success() {
            return Err(ApiError::Rejected {
                message: envelope.message,
            });
        }
        Ok(envelope)
    }
}
