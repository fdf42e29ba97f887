use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use lms_auth::{
    account::{password::hash_password, Account, MemoryAccountStore, NewAccount, Role},
    api,
    audit::{AuditAction, MemoryAuditSink},
    service::{AuthConfig, AuthService, ManualClock},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret";
const PASSWORD: &str = "password123";
const FRONTEND: &str = "http://localhost:3000";

struct TestApp {
    router: Router,
    audit: Arc<MemoryAuditSink>,
    clock: Arc<ManualClock>,
}

impl TestApp {
    async fn new(config: AuthConfig) -> Result<Self> {
        let store = Arc::new(MemoryAccountStore::new());
        store
            .put(account("learner@lms.dev", Role::Learner)?)
            .await;
        store.put(account("admin@lms.dev", Role::Administrator)?).await;

        let audit = Arc::new(MemoryAuditSink::new());
        let start = Utc
            .with_ymd_and_hms(2025, 6, 2, 8, 30, 0)
            .single()
            .context("valid start time")?;
        let clock = Arc::new(ManualClock::new(start));
        let service =
            AuthService::new(&config, store, audit.clone()).with_clock(clock.clone());

        Ok(Self {
            router: api::app(Arc::new(service), FRONTEND)?,
            audit,
            clock,
        })
    }

    async fn default() -> Result<Self> {
        Self::new(AuthConfig::new(SecretString::from(SECRET))).await
    }

    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))?;
        self.send(request).await
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty())?).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.post("/login", json!({"email": email, "password": password}))
            .await
    }

    async fn token_for(&self, email: &str) -> Result<String> {
        let (status, body) = self.login(email, PASSWORD).await?;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"]
            .as_str()
            .map(str::to_string)
            .context("login response carries a token")
    }
}

fn account(email: &str, role: Role) -> Result<Account> {
    let hash = hash_password(PASSWORD)?;
    Ok(NewAccount {
        email: email.to_string(),
        employee_id: format!("EMP-{}", email.len()),
        password_hash: SecretString::from(hash),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        role,
        department: "Engineering".to_string(),
    }
    .into_account())
}

#[tokio::test]
async fn fresh_learner_logs_in() -> Result<()> {
    let app = TestApp::default().await?;

    let (status, body) = app.login("Learner@LMS.dev", PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["user"]["role"], "learner");
    assert_eq!(body["data"]["user"]["email"], "learner@lms.dev");
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let token = body["data"]["token"].as_str().context("token")?;
    let mut validation = Validation::default();
    validation.validate_exp = false;
    let claims = decode::<Value>(
        token,
        &DecodingKey::from_secret(SECRET.as_bytes()),
        &validation,
    )?
    .claims;
    assert_eq!(claims["email"], "learner@lms.dev");
    assert_eq!(claims["role"], "learner");
    assert_eq!(claims.as_object().map(serde_json::Map::len), Some(4));

    assert_eq!(app.audit.actions().await, vec![AuditAction::LoginSuccess]);
    Ok(())
}

#[tokio::test]
async fn fifth_failure_locks_the_account() -> Result<()> {
    let app = TestApp::default().await?;

    for _ in 0..5 {
        let (status, body) = app.login("learner@lms.dev", "wrong-password").await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    let (status, body) = app.login("learner@lms.dev", PASSWORD).await?;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(
        body["message"],
        "Account is temporarily locked due to multiple failed login attempts."
    );

    app.clock.advance(Duration::minutes(30) + Duration::seconds(1));
    let (status, _) = app.login("learner@lms.dev", PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() -> Result<()> {
    let app = TestApp::default().await?;

    let unknown = app.login("nobody@lms.dev", PASSWORD).await?;
    let wrong = app.login("learner@lms.dev", "not-the-password").await?;
    assert_eq!(unknown.0, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, wrong);
    Ok(())
}

#[tokio::test]
async fn login_validation_reports_fields() -> Result<()> {
    let app = TestApp::default().await?;

    let (status, body) = app.login("not-an-email", "123").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation failed");
    let errors = body["errors"].as_array().context("errors array")?;
    assert_eq!(errors.len(), 2);
    assert!(app.audit.events().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn forgot_password_does_not_reveal_accounts() -> Result<()> {
    let app = TestApp::default().await?;

    let known = app
        .post("/forgot-password", json!({"email": "learner@lms.dev"}))
        .await?;
    let unknown = app
        .post("/forgot-password", json!({"email": "ghost@lms.dev"}))
        .await?;
    assert_eq!(known.0, StatusCode::OK);
    assert_eq!(known, unknown);
    assert_eq!(
        app.audit.actions().await,
        vec![AuditAction::PasswordResetRequested]
    );

    let (status, body) = app
        .post("/forgot-password", json!({"email": "nope"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a valid email address");
    Ok(())
}

#[tokio::test]
async fn logout_always_succeeds() -> Result<()> {
    let app = TestApp::default().await?;
    let token = app.token_for("learner@lms.dev").await?;

    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let (status, body) = app.send(request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logout successful");

    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .body(Body::empty())?;
    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        app.audit.actions().await,
        vec![AuditAction::LoginSuccess, AuditAction::Logout]
    );

    // Stateless logout: the token keeps working until it expires.
    let (status, _) = app.get("/users/me", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn refresh_requires_a_valid_token() -> Result<()> {
    let app = TestApp::default().await?;

    let (status, body) = app.post("/refresh", json!({})).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Refresh token is required");

    let (status, body) = app.post("/refresh", json!({"token": "garbage"})).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid refresh token");

    let token = app.token_for("learner@lms.dev").await?;
    app.clock.advance(Duration::hours(1));
    let (status, body) = app.post("/refresh", json!({"token": &token})).await?;
    assert_eq!(status, StatusCode::OK);
    let refreshed = body["data"]["token"].as_str().context("refreshed token")?;
    assert_ne!(refreshed, token);

    app.clock.advance(Duration::hours(24));
    let (status, body) = app.post("/refresh", json!({"token": refreshed})).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid refresh token");
    Ok(())
}

#[tokio::test]
async fn bearer_routes_enforce_authentication_and_role() -> Result<()> {
    let app = TestApp::default().await?;

    let (status, body) = app.get("/users/me", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access token is missing or invalid");

    let (status, _) = app.get("/users/me", Some("not.a.token")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let learner = app.token_for("learner@lms.dev").await?;
    let (status, body) = app.get("/users/me", Some(&learner)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "learner@lms.dev");

    let (status, body) = app.get("/users", Some(&learner)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");

    let admin = app.token_for("admin@lms.dev").await?;
    let (status, body) = app.get("/users", Some(&admin)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["users"].as_array().map(Vec::len),
        Some(2)
    );

    app.clock.advance(Duration::hours(25));
    let (status, _) = app.get("/users/me", Some(&admin)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn auth_routes_are_served_under_prefix() -> Result<()> {
    let app = TestApp::default().await?;

    let (status, body) = app
        .post(
            "/api/auth/login",
            json!({"email": "learner@lms.dev", "password": PASSWORD}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_rejected() -> Result<()> {
    let app = TestApp::default().await?;

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = app.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn wrong_field_types_report_validation_errors() -> Result<()> {
    let app = TestApp::default().await?;

    let (status, body) = app.post("/login", json!({"email": 5})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .context("errors array")?
        .iter()
        .filter_map(|error| error["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["email", "password"]);
    Ok(())
}

#[tokio::test]
async fn peer_address_is_audited_without_proxy_headers() -> Result<()> {
    let app = TestApp::default().await?;

    let mut request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"email": "learner@lms.dev", "password": PASSWORD}).to_string(),
        ))?;
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 4], 51234))));
    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::OK);

    let events = app.audit.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source_address.as_deref(), Some("198.51.100.4"));
    Ok(())
}

#[tokio::test]
async fn login_rate_limit_returns_429() -> Result<()> {
    let config = AuthConfig::new(SecretString::from(SECRET)).with_login_rate_limit(2);
    let app = TestApp::new(config).await?;

    for _ in 0..2 {
        let (status, _) = app.login("learner@lms.dev", "wrong-password").await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = app.login("learner@lms.dev", PASSWORD).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["message"],
        "Too many login attempts. Please try again later."
    );
    Ok(())
}

#[tokio::test]
async fn health_reports_store_status() -> Result<()> {
    let app = TestApp::default().await?;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["database"], "ok");
    Ok(())
}
