//! Hosted backend clients: PostgREST tables and GoTrue accounts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dash_core::error::{DashError, Result};
use dash_core::models::{Session, User};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::http::{HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::identity::{AuthEvent, IdentityProvider, SessionState};
use crate::store::{BoxFuture, Query, TableStore};

/// Where the backend lives and how to authenticate to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// Project URL without a trailing slash.
    pub base_url: String,
    /// Public (anon) key.
    pub api_key: String,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    fn auth(&self, session: &SessionState) -> HttpAuth {
        match session.access_token() {
            Some(access_token) => HttpAuth::User {
                api_key: self.api_key.clone(),
                access_token,
            },
            None => HttpAuth::ApiKey(self.api_key.clone()),
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis().min(u64::MAX as u128) as u64
    }
}

fn transport_error(operation: &str, secs: u64, e: HttpError) -> DashError {
    if e.timed_out() {
        DashError::Timeout {
            operation: operation.to_string(),
            secs,
        }
    } else {
        DashError::Store(e.message().to_string())
    }
}

/// Pull the human-readable message out of a backend error body.
fn error_message(response: &HttpResponse) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        msg: Option<String>,
        error_description: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.message.or(b.msg).or(b.error_description).or(b.error))
        .unwrap_or_else(|| format!("HTTP {}", response.status))
}

// ── RestStore ─────────────────────────────────────────────────────────────────

/// [`TableStore`] speaking the PostgREST wire format under `/rest/v1`.
pub struct RestStore {
    http: Arc<dyn HttpClient>,
    config: RestConfig,
    session: Arc<SessionState>,
}

impl RestStore {
    pub fn new(http: Arc<dyn HttpClient>, config: RestConfig, session: Arc<SessionState>) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, urlencoding::encode(table))
    }

    /// `?select=...&col=eq.val&order=col.asc&limit=n`.
    pub fn query_url(&self, query: &Query) -> String {
        let mut params = vec![format!(
            "select={}",
            urlencoding::encode(&query.select_clause())
        )];
        for (column, value) in &query.filters {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            params.push(format!(
                "{}=eq.{}",
                urlencoding::encode(column),
                urlencoding::encode(&text)
            ));
        }
        if let Some((column, ascending)) = &query.order {
            let dir = if *ascending { "asc" } else { "desc" };
            params.push(format!("order={}.{}", urlencoding::encode(column), dir));
        }
        if let Some(n) = query.limit {
            params.push(format!("limit={}", n));
        }
        format!("{}?{}", self.table_url(&query.table), params.join("&"))
    }

    async fn send(&self, operation: &str, request: HttpRequest) -> Result<HttpResponse> {
        let request = request
            .with_auth(&self.config.auth(&self.session))
            .with_timeout_ms(self.config.timeout_ms());
        debug!(url = %request.url, "{}", operation);
        self.http
            .execute(request)
            .await
            .map_err(|e| transport_error(operation, self.config.timeout.as_secs(), e))
    }
}

impl TableStore for RestStore {
    fn insert<'a>(&'a self, table: &'a str, rows: Vec<Value>) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(async move {
            let request = HttpRequest::post(self.table_url(table))
                .with_json(&Value::Array(rows))
                .with_header("prefer", "return=representation");
            let response = self.send("Inserting rows", request).await?;
            if !response.is_success() {
                return Err(DashError::Store(error_message(&response)));
            }
            if response.body.trim().is_empty() {
                return Ok(Vec::new());
            }
            Ok(serde_json::from_str(&response.body)?)
        })
    }

    fn select<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(async move {
            let request = HttpRequest::get(self.query_url(query));
            let response = self.send("Selecting rows", request).await?;
            if !response.is_success() {
                return Err(DashError::Store(error_message(&response)));
            }
            Ok(serde_json::from_str(&response.body)?)
        })
    }

    fn select_single<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let request = HttpRequest::get(self.query_url(query))
                .with_header("accept", "application/vnd.pgrst.object+json");
            let response = self.send("Selecting row", request).await?;
            match response.status {
                // PostgREST answers 406 when the row count is not exactly one.
                406 => Err(DashError::NotFound(error_message(&response))),
                _ if !response.is_success() => Err(DashError::Store(error_message(&response))),
                _ => Ok(serde_json::from_str(&response.body)?),
            }
        })
    }
}

// ── RestIdentity ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// [`IdentityProvider`] speaking the GoTrue wire format under `/auth/v1`.
pub struct RestIdentity {
    http: Arc<dyn HttpClient>,
    config: RestConfig,
    state: Arc<SessionState>,
}

impl RestIdentity {
    pub fn new(http: Arc<dyn HttpClient>, config: RestConfig, state: Arc<SessionState>) -> Self {
        Self {
            http,
            config,
            state,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.base_url, path)
    }

    async fn send(&self, operation: &str, request: HttpRequest) -> Result<HttpResponse> {
        let request = request
            .with_auth(&self.config.auth(&self.state))
            .with_timeout_ms(self.config.timeout_ms());
        self.http.execute(request).await.map_err(|e| {
            if e.timed_out() {
                DashError::Timeout {
                    operation: operation.to_string(),
                    secs: self.config.timeout.as_secs(),
                }
            } else {
                DashError::Auth(e.message().to_string())
            }
        })
    }
}

impl IdentityProvider for RestIdentity {
    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<User>> {
        Box::pin(async move {
            let request = HttpRequest::post(self.auth_url("signup"))
                .with_json(&json!({ "email": email, "password": password }));
            let response = self.send("Signing up", request).await?;
            if !response.is_success() {
                return Err(DashError::Auth(error_message(&response)));
            }

            // With email confirmation on, the service returns the bare user.
            let body: Value = serde_json::from_str(&response.body)?;
            if body.get("access_token").is_some() {
                let token: TokenResponse = serde_json::from_value(body)?;
                let session = token.into_session();
                let user = session.user.clone();
                self.state.set(session)?;
                Ok(user)
            } else {
                let user: User = match body.get("user") {
                    Some(inner) => serde_json::from_value(inner.clone())?,
                    None => serde_json::from_value(body)?,
                };
                debug!(user = %user.id, "Registered; awaiting email confirmation");
                Ok(user)
            }
        })
    }

    fn sign_in_with_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Session>> {
        Box::pin(async move {
            let request = HttpRequest::post(self.auth_url("token?grant_type=password"))
                .with_json(&json!({ "email": email, "password": password }));
            let response = self.send("Signing in", request).await?;
            if !response.is_success() {
                return Err(DashError::Auth(error_message(&response)));
            }
            let token: TokenResponse = serde_json::from_str(&response.body)?;
            let session = token.into_session();
            self.state.set(session.clone())?;
            Ok(session)
        })
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.state.get().is_some() {
                let request = HttpRequest::post(self.auth_url("logout"));
                match self.send("Signing out", request).await {
                    Ok(response) if !response.is_success() && response.status != 401 => {
                        return Err(DashError::Auth(error_message(&response)));
                    }
                    Ok(_) => {}
                    Err(e) => return Err(e),
                }
            }
            self.state.clear()
        })
    }

    fn current_user(&self) -> BoxFuture<'_, Result<Option<User>>> {
        Box::pin(async move {
            if self.state.get().is_none() {
                return Ok(None);
            }
            let response = self.send("Fetching user", HttpRequest::get(self.auth_url("user"))).await?;
            match response.status {
                401 | 403 => {
                    warn!("Saved session was rejected; signing out locally");
                    self.state.clear()?;
                    Ok(None)
                }
                _ if !response.is_success() => Err(DashError::Auth(error_message(&response))),
                _ => Ok(Some(serde_json::from_str(&response.body)?)),
            }
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::RecordingHttpClient;
    use crate::http::HttpMethod;

    fn config() -> RestConfig {
        RestConfig::new("https://demo.example.co/", "anon-key", Duration::from_secs(5))
    }

    fn store_with(responses: Vec<std::result::Result<HttpResponse, HttpError>>) -> (RestStore, Arc<RecordingHttpClient>) {
        let http = Arc::new(RecordingHttpClient::with_responses(responses));
        let store = RestStore::new(http.clone(), config(), SessionState::ephemeral());
        (store, http)
    }

    // ── RestStore ─────────────────────────────────────────────────────────────

    #[test]
    fn test_query_url_rendering() {
        let (store, _) = store_with(vec![]);
        let q = Query::table("comments")
            .embed("author", "users", "user", &["first_name", "last_name"])
            .eq("forum_id", 3)
            .order("created_at", true)
            .limit(10);

        assert_eq!(
            store.query_url(&q),
            "https://demo.example.co/rest/v1/comments?select=%2A%2Cauthor%3Ausers%21user%28first_name%2Clast_name%29&forum_id=eq.3&order=created_at.asc&limit=10"
        );
    }

    #[tokio::test]
    async fn test_insert_sends_representation_request() {
        let (store, http) = store_with(vec![Ok(HttpResponse::new(201, r#"[{"id":1,"amount":5}]"#))]);

        let rows = store
            .insert("transactions", vec![json!({"amount": 5})])
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({"id": 1, "amount": 5})]);

        let sent = &http.requests()[0];
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.url, "https://demo.example.co/rest/v1/transactions");
        assert_eq!(sent.headers["prefer"], "return=representation");
        assert_eq!(sent.headers["apikey"], "anon-key");
        assert_eq!(sent.headers["authorization"], "Bearer anon-key");
        assert_eq!(sent.body.as_deref(), Some(r#"[{"amount":5}]"#));
        assert_eq!(sent.timeout_ms, 5_000);
    }

    #[tokio::test]
    async fn test_store_error_body_becomes_store_error() {
        let (store, _) = store_with(vec![Ok(HttpResponse::new(
            403,
            r#"{"message":"new row violates row-level security policy","code":"42501"}"#,
        ))]);
        let err = store.insert("forums", vec![json!({})]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Data store error: new row violates row-level security policy"
        );
    }

    #[tokio::test]
    async fn test_select_single_not_found_on_406() {
        let (store, http) = store_with(vec![Ok(HttpResponse::new(
            406,
            r#"{"message":"JSON object requested, multiple (or no) rows returned"}"#,
        ))]);
        let err = store
            .select_single(&Query::table("forums").eq("id", 9))
            .await
            .unwrap_err();
        assert!(matches!(err, DashError::NotFound(_)));
        assert_eq!(
            http.requests()[0].headers["accept"],
            "application/vnd.pgrst.object+json"
        );
    }

    #[tokio::test]
    async fn test_transport_timeout_maps_to_timeout_error() {
        let (store, _) = store_with(vec![Err(HttpError::timeout("request timeout"))]);
        let err = store.select(&Query::table("forums")).await.unwrap_err();
        assert!(matches!(err, DashError::Timeout { secs: 5, .. }));
    }

    #[tokio::test]
    async fn test_store_uses_user_token_when_signed_in() {
        let http = Arc::new(RecordingHttpClient::default());
        let state = SessionState::ephemeral();
        state
            .set(Session {
                access_token: "jwt".into(),
                refresh_token: None,
                expires_at: None,
                user: User { id: "u1".into(), email: None },
            })
            .unwrap();
        let store = RestStore::new(http.clone(), config(), state);

        store.select(&Query::table("forums")).await.unwrap();
        assert_eq!(http.requests()[0].headers["authorization"], "Bearer jwt");
    }

    // ── RestIdentity ──────────────────────────────────────────────────────────

    fn identity_with(responses: Vec<std::result::Result<HttpResponse, HttpError>>) -> (RestIdentity, Arc<RecordingHttpClient>) {
        let http = Arc::new(RecordingHttpClient::with_responses(responses));
        let identity = RestIdentity::new(http.clone(), config(), SessionState::ephemeral());
        (identity, http)
    }

    const TOKEN_BODY: &str = r#"{"access_token":"jwt-1","token_type":"bearer","expires_in":3600,"refresh_token":"r1","user":{"id":"u-1","email":"ada@example.com"}}"#;

    #[tokio::test]
    async fn test_sign_in_posts_password_grant_and_stores_session() {
        let (identity, http) = identity_with(vec![Ok(HttpResponse::new(200, TOKEN_BODY))]);
        let mut events = identity.subscribe();

        let session = identity
            .sign_in_with_password("ada@example.com", "secret")
            .await
            .unwrap();
        assert_eq!(session.access_token, "jwt-1");
        assert!(session.expires_at.is_some());

        let sent = &http.requests()[0];
        assert_eq!(sent.url, "https://demo.example.co/auth/v1/token?grant_type=password");
        let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"email": "ada@example.com", "password": "secret"}));

        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(u) if u.id == "u-1"));
    }

    #[tokio::test]
    async fn test_sign_in_failure_surfaces_description() {
        let (identity, _) = identity_with(vec![Ok(HttpResponse::new(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        ))]);
        let err = identity.sign_in_with_password("a", "b").await.unwrap_err();
        assert_eq!(err.to_string(), "Authentication error: Invalid login credentials");
    }

    #[tokio::test]
    async fn test_sign_up_without_session_awaits_confirmation() {
        let (identity, http) = identity_with(vec![Ok(HttpResponse::new(
            200,
            r#"{"id":"u-2","email":"new@example.com","confirmation_sent_at":"2024-01-01T00:00:00Z"}"#,
        ))]);
        let user = identity.sign_up("new@example.com", "pw").await.unwrap();

        assert_eq!(user.id, "u-2");
        assert!(identity.current_user().await.unwrap().is_none());
        assert_eq!(http.requests()[0].url, "https://demo.example.co/auth/v1/signup");
    }

    #[tokio::test]
    async fn test_current_user_and_sign_out() {
        let (identity, http) = identity_with(vec![
            Ok(HttpResponse::new(200, TOKEN_BODY)),
            Ok(HttpResponse::new(200, r#"{"id":"u-1","email":"ada@example.com"}"#)),
            Ok(HttpResponse::new(204, "")),
        ]);
        identity.sign_in_with_password("ada@example.com", "pw").await.unwrap();

        let user = identity.current_user().await.unwrap().unwrap();
        assert_eq!(user.id, "u-1");

        identity.sign_out().await.unwrap();
        let requests = http.requests();
        assert_eq!(requests[1].headers["authorization"], "Bearer jwt-1");
        assert_eq!(requests[2].url, "https://demo.example.co/auth/v1/logout");
        assert!(identity.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_user_rejected_token_signs_out_locally() {
        let (identity, _) = identity_with(vec![
            Ok(HttpResponse::new(200, TOKEN_BODY)),
            Ok(HttpResponse::new(401, r#"{"msg":"invalid JWT"}"#)),
        ]);
        identity.sign_in_with_password("a", "b").await.unwrap();
        assert!(identity.current_user().await.unwrap().is_none());
    }
}
