//! Client for the hosted auth and data backend (GoTrue auth under `/auth/v1`, PostgREST
//! tables under `/rest/v1`).
//!
//! Each public operation is exactly one backend call. Errors reported by the backend are
//! passed through as `BackendError::Service`; the only local check is that a user is
//! signed in before user-scoped calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::body::Body;
use crate::config::BackendSection;
use crate::error::EdgeError;
use crate::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use crate::http::{HeaderName, HeaderValue, Method, Uri};
use crate::proxy::{ProxyHandle, ProxyRequest, ProxyResponse};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const HISTORY_LIMIT: u32 = 50;
const NOTIFICATION_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Error reported by the backend, passed through unchanged.
    #[error("{message}")]
    Service {
        status: u16,
        message: String,
        code: Option<String>,
    },
    #[error("User not authenticated")]
    NotAuthenticated,
    #[error("backend url and anon key are not configured")]
    NotConfigured,
    #[error("backend request failed: {0}")]
    Transport(#[from] EdgeError),
    #[error("unexpected backend payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: User,
}

/// Result of a sign-up: the session is absent while email confirmation is pending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub session: Option<Session>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
}

pub type AuthListener = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

type ListenerList = Mutex<Vec<(u64, AuthListener)>>;

/// Handle returned by `on_auth_state_change`; dropping it keeps the listener registered.
pub struct AuthSubscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl AuthSubscription {
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredCompany {
    pub id: Value,
    pub user_id: String,
    pub company_number: String,
    pub company_name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub subscription_tier: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl UserProfile {
    pub fn has_credits(&self) -> bool {
        self.credits > 0 || self.subscription_tier.as_deref() != Some("free")
    }
}

/// Partial profile update; absent fields are left untouched.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: Value,
    #[serde(default)]
    pub user_id: Option<String>,
    pub company_number: String,
    pub company_name: String,
    pub file_count: u32,
    #[serde(default)]
    pub stripe_payment_id: Option<String>,
    #[serde(default)]
    pub downloaded_at: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: Value,
    pub user_id: String,
    pub company_number: String,
    pub company_name: String,
    pub download_status: DownloadStatus,
    #[serde(default)]
    pub searched_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Value,
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub notification_sent: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// PostgREST or GoTrue error body; the two services spell their fields differently.
#[derive(Default, Deserialize)]
#[serde(default)]
struct ErrorPayload {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<Value>,
    error_code: Option<String>,
}

pub struct SupabaseClient {
    url: String,
    anon_key: String,
    handle: ProxyHandle,
    session: Mutex<Option<Session>>,
    listeners: Arc<ListenerList>,
    next_listener: AtomicU64,
}

impl SupabaseClient {
    pub fn new(config: &BackendSection, handle: ProxyHandle) -> Result<Self, BackendError> {
        if !config.is_configured() {
            return Err(BackendError::NotConfigured);
        }
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            handle,
            session: Mutex::new(None),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(1),
        })
    }

    // --- auth ---

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        let value: Value = self
            .call(
                Method::POST,
                "/auth/v1/signup",
                Some(json!({ "email": email, "password": password })),
                &[],
            )
            .await?;

        let session = if value.get("access_token").is_some() {
            Some(serde_json::from_value::<Session>(value.clone())?)
        } else {
            None
        };
        let user = match &session {
            Some(session) => Some(session.user.clone()),
            None => match value.get("user") {
                Some(user) => Some(serde_json::from_value(user.clone())?),
                None => serde_json::from_value(value).ok(),
            },
        };

        if let Some(session) = &session {
            self.store_session(Some(session.clone()), AuthEvent::SignedIn);
        }
        Ok(AuthResponse { user, session })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let session: Session = self
            .call(
                Method::POST,
                "/auth/v1/token?grant_type=password",
                Some(json!({ "email": email, "password": password })),
                &[],
            )
            .await?;
        self.store_session(Some(session.clone()), AuthEvent::SignedIn);
        Ok(session)
    }

    /// Browser redirect target that starts an OAuth sign-in.
    pub fn oauth_sign_in_url(&self, provider: OAuthProvider, redirect_to: &str) -> String {
        let query = serde_urlencoded::to_string([
            ("provider", provider.as_str()),
            ("redirect_to", redirect_to),
        ])
        .unwrap_or_default();
        format!("{}/auth/v1/authorize?{}", self.url, query)
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        if self.current_session().is_some() {
            self.call_empty(Method::POST, "/auth/v1/logout", None, &[])
                .await?;
        }
        self.store_session(None, AuthEvent::SignedOut);
        Ok(())
    }

    /// Fetch the signed-in user from the auth service; `None` when signed out.
    pub async fn get_user(&self) -> Result<Option<User>, BackendError> {
        if self.current_session().is_none() {
            return Ok(None);
        }
        let user: User = self.call(Method::GET, "/auth/v1/user", None, &[]).await?;
        Ok(Some(user))
    }

    pub fn on_auth_state_change<F>(&self, listener: F) -> AuthSubscription
    where
        F: Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));
        AuthSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_session().map(|session| session.user)
    }

    // --- monitoring ---

    pub async fn add_monitored_company(
        &self,
        company_number: &str,
        company_name: &str,
    ) -> Result<MonitoredCompany, BackendError> {
        let user = self.require_user()?;
        self.call(
            Method::POST,
            "/rest/v1/monitored_companies",
            Some(json!({
                "user_id": user.id,
                "company_number": company_number,
                "company_name": company_name,
            })),
            &[("prefer", "return=representation"), ("accept", SINGLE_OBJECT)],
        )
        .await
    }

    pub async fn remove_monitored_company(&self, company_number: &str) -> Result<(), BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "monitored_companies",
            &[
                ("user_id", eq(&user.id)),
                ("company_number", eq(company_number)),
            ],
        );
        self.call_empty(Method::DELETE, &path, None, &[]).await
    }

    /// Active monitored companies, newest first.
    pub async fn monitored_companies(&self) -> Result<Vec<MonitoredCompany>, BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "monitored_companies",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(&user.id)),
                ("is_active", "eq.true".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        );
        self.call(Method::GET, &path, None, &[]).await
    }

    /// `false` when signed out or when the lookup fails.
    pub async fn is_monitored(&self, company_number: &str) -> bool {
        let Some(user) = self.current_user() else {
            return false;
        };
        let path = table_path(
            "monitored_companies",
            &[
                ("select", "id".to_string()),
                ("user_id", eq(&user.id)),
                ("company_number", eq(company_number)),
            ],
        );
        match self
            .call::<Value>(Method::GET, &path, None, &[("accept", SINGLE_OBJECT)])
            .await
        {
            Ok(row) => !row.is_null(),
            Err(err) => {
                log::debug!("monitoring check for {} failed: {}", company_number, err);
                false
            }
        }
    }

    // --- profile ---

    pub async fn profile(&self) -> Result<UserProfile, BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "user_profiles",
            &[("select", "*".to_string()), ("id", eq(&user.id))],
        );
        self.call(Method::GET, &path, None, &[("accept", SINGLE_OBJECT)])
            .await
    }

    pub async fn update_profile(&self, updates: &ProfileUpdate) -> Result<UserProfile, BackendError> {
        let user = self.require_user()?;
        let path = table_path("user_profiles", &[("id", eq(&user.id))]);
        self.call(
            Method::PATCH,
            &path,
            Some(serde_json::to_value(updates)?),
            &[("prefer", "return=representation"), ("accept", SINGLE_OBJECT)],
        )
        .await
    }

    /// Credits remain, or the user is on a paid tier.
    pub async fn has_credits(&self) -> Result<bool, BackendError> {
        Ok(self.profile().await?.has_credits())
    }

    /// Remote `decrement_credits` procedure; returns whatever it reports.
    pub async fn use_credit(&self) -> Result<Value, BackendError> {
        let user = self.require_user()?;
        self.call(
            Method::POST,
            "/rest/v1/rpc/decrement_credits",
            Some(json!({ "user_id": user.id })),
            &[],
        )
        .await
    }

    // --- downloads ---

    /// Anonymous downloads are recorded with a null user.
    pub async fn record_download(
        &self,
        company_number: &str,
        company_name: &str,
        file_count: u32,
        stripe_payment_id: Option<&str>,
    ) -> Result<DownloadRecord, BackendError> {
        let user_id = self.current_user().map(|user| user.id);
        self.call(
            Method::POST,
            "/rest/v1/download_history",
            Some(json!({
                "user_id": user_id,
                "company_number": company_number,
                "company_name": company_name,
                "file_count": file_count,
                "stripe_payment_id": stripe_payment_id,
            })),
            &[("prefer", "return=representation"), ("accept", SINGLE_OBJECT)],
        )
        .await
    }

    pub async fn download_history(&self) -> Result<Vec<DownloadRecord>, BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "download_history",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(&user.id)),
                ("order", "downloaded_at.desc".to_string()),
                ("limit", HISTORY_LIMIT.to_string()),
            ],
        );
        self.call(Method::GET, &path, None, &[]).await
    }

    // --- search history ---

    /// Upsert keyed on `(company_number, user_id)`; a repeat search refreshes the row.
    pub async fn record_search(
        &self,
        company_number: &str,
        company_name: &str,
    ) -> Result<SearchRecord, BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "search_history",
            &[("on_conflict", "company_number,user_id".to_string())],
        );
        self.call(
            Method::POST,
            &path,
            Some(json!({
                "user_id": user.id,
                "company_number": company_number,
                "company_name": company_name,
                "download_status": DownloadStatus::Pending,
                "searched_at": chrono::Utc::now().to_rfc3339(),
            })),
            &[
                ("prefer", "resolution=merge-duplicates,return=representation"),
                ("accept", SINGLE_OBJECT),
            ],
        )
        .await
    }

    pub async fn update_download_status(
        &self,
        company_number: &str,
        status: DownloadStatus,
    ) -> Result<(), BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "search_history",
            &[
                ("user_id", eq(&user.id)),
                ("company_number", eq(company_number)),
            ],
        );
        self.call_empty(
            Method::PATCH,
            &path,
            Some(json!({ "download_status": status })),
            &[],
        )
        .await
    }

    pub async fn search_history(&self) -> Result<Vec<SearchRecord>, BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "search_history",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(&user.id)),
                ("order", "searched_at.desc".to_string()),
                ("limit", HISTORY_LIMIT.to_string()),
            ],
        );
        self.call(Method::GET, &path, None, &[]).await
    }

    // --- notifications ---

    pub async fn notifications(&self) -> Result<Vec<Notification>, BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "notifications",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(&user.id)),
                ("order", "created_at.desc".to_string()),
                ("limit", NOTIFICATION_LIMIT.to_string()),
            ],
        );
        self.call(Method::GET, &path, None, &[]).await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<(), BackendError> {
        let user = self.require_user()?;
        let path = table_path(
            "notifications",
            &[("id", eq(notification_id)), ("user_id", eq(&user.id))],
        );
        self.call_empty(
            Method::PATCH,
            &path,
            Some(json!({ "notification_sent": true })),
            &[],
        )
        .await
    }

    // --- transport ---

    fn require_user(&self) -> Result<User, BackendError> {
        self.current_user().ok_or(BackendError::NotAuthenticated)
    }

    fn store_session(&self, session: Option<Session>, event: AuthEvent) {
        *self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = session.clone();
        log::info!("backend auth state changed: {:?}", event);

        let listeners: Vec<AuthListener> = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event, session.as_ref());
        }
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
        extra_headers: &[(&'static str, &'static str)],
    ) -> Result<ProxyRequest, BackendError> {
        let uri: Uri = format!("{}{}", self.url, path)
            .parse()
            .map_err(|err| EdgeError::bad_request(format!("invalid backend url: {err}")))?;
        let mut request = ProxyRequest::new(method, uri);

        let bearer = self
            .current_session()
            .map(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        let headers = request.headers_mut();
        headers.insert(
            HeaderName::from_static("apikey"),
            HeaderValue::from_str(&self.anon_key).map_err(EdgeError::internal)?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {bearer}")).map_err(EdgeError::internal)?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in extra_headers {
            headers.insert(
                HeaderName::from_static(*name),
                HeaderValue::from_static(*value),
            );
        }

        if let Some(payload) = payload {
            request
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            *request.body_mut() = Body::json(&payload)?;
        }
        Ok(request)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
        extra_headers: &[(&'static str, &'static str)],
    ) -> Result<ProxyResponse, BackendError> {
        let request = self.build_request(method, path, payload, extra_headers)?;
        let response = self.handle.send(request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(service_error(&response))
        }
    }

    async fn call<T>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
        extra_headers: &[(&'static str, &'static str)],
    ) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, payload, extra_headers).await?;
        Ok(response.body().to_json()?)
    }

    async fn call_empty(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
        extra_headers: &[(&'static str, &'static str)],
    ) -> Result<(), BackendError> {
        self.send(method, path, payload, extra_headers).await?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn table_path(table: &str, query: &[(&str, String)]) -> String {
    let query = serde_urlencoded::to_string(query).unwrap_or_default();
    if query.is_empty() {
        format!("/rest/v1/{table}")
    } else {
        format!("/rest/v1/{table}?{query}")
    }
}

fn service_error(response: &ProxyResponse) -> BackendError {
    let status = response.status().as_u16();
    let payload: ErrorPayload = response.body().to_json().unwrap_or_default();
    let message = payload
        .message
        .or(payload.msg)
        .or(payload.error_description)
        .or(payload.error)
        .or_else(|| response.body().as_str().map(str::to_string))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("backend returned HTTP {status}"));
    let code = payload.error_code.or(match payload.code {
        Some(Value::String(code)) => Some(code),
        Some(Value::Number(code)) => Some(code.to_string()),
        _ => None,
    });
    BackendError::Service {
        status,
        message,
        code,
    }
}
