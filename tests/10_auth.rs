mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get as get_route;
use axum::{Extension, Json, Router};
use serde_json::json;

use bank_report_api::auth::TokenKind;
use bank_report_api::database::DatabaseError;
use bank_report_api::middleware::{bypass_auth, optional_auth, AuthUser};
use common::*;

fn login_db(active: bool) -> std::sync::Arc<FakeDatabase> {
    FakeDatabase::new(move |statement| {
        if sql_text(statement).contains("FROM dbo.Users") {
            let requested = format!("{:?}", statement.params[0].value);
            if requested.contains("alice") {
                return Ok(vec![user_row("alice", active)]);
            }
        }
        Ok(Vec::new())
    })
}

#[tokio::test]
async fn required_auth_without_header_is_401() -> Result<()> {
    let res = send(app(FakeDatabase::empty()), get("/api/me", None)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Access token required");
    Ok(())
}

#[tokio::test]
async fn required_auth_with_garbage_token_is_403() -> Result<()> {
    let res = send(app(FakeDatabase::empty()), get("/api/me", Some("not-a-jwt"))).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["error"], "Invalid or expired token");
    Ok(())
}

#[tokio::test]
async fn required_auth_with_valid_token_attaches_claims() -> Result<()> {
    let token = access_token("user");
    let res = send(app(FakeDatabase::empty()), get("/api/me", Some(&token))).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["data"]["id"], "17");
    assert_eq!(res.body["data"]["role"], "user");
    Ok(())
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() -> Result<()> {
    let tokens = tokens();
    let refresh = tokens.issue_refresh(&identity("admin"), tokens.refresh_ttl())?;
    let res = send(app(FakeDatabase::empty()), get("/api/me", Some(&refresh))).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn bypass_attaches_system_identity_whatever_the_header() -> Result<()> {
    let router = || {
        Router::new()
            .route(
                "/whoami",
                get_route(|Extension(user): Extension<AuthUser>| async move { Json(user) }),
            )
            .layer(from_fn(bypass_auth))
    };

    let admin = access_token("admin");
    for bearer in [None, Some("garbage"), Some(admin.as_str())] {
        let res = send(router(), get("/whoami", bearer)).await?;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["id"], "system");
        assert_eq!(res.body["role"], "system");
    }
    Ok(())
}

#[tokio::test]
async fn optional_auth_attaches_identity_only_for_valid_tokens() -> Result<()> {
    let router = || {
        Router::new()
            .route(
                "/whoami",
                get_route(|user: Option<Extension<AuthUser>>| async move {
                    Json(user.map(|Extension(user)| user))
                }),
            )
            .layer(from_fn_with_state(state(FakeDatabase::empty()), optional_auth))
    };

    let token = access_token("user");
    let res = send(router(), get("/whoami", Some(&token))).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], "17");
    assert_eq!(res.body["role"], "user");

    for bearer in [None, Some("garbage")] {
        let res = send(router(), get("/whoami", bearer)).await?;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.is_null());
    }
    Ok(())
}

#[tokio::test]
async fn login_with_wrong_password_is_401() -> Result<()> {
    let body = json!({ "username": "alice", "password": "wrong" });
    let res = send(app(login_db(true)), post_json("/api/login", None, body)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Invalid username or password");
    Ok(())
}

#[tokio::test]
async fn login_with_unknown_user_is_401() -> Result<()> {
    let body = json!({ "username": "mallory", "password": "correct" });
    let res = send(app(login_db(true)), post_json("/api/login", None, body)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Invalid username or password");
    Ok(())
}

#[tokio::test]
async fn login_requires_both_fields() -> Result<()> {
    let db = login_db(true);
    let res = send(app(db.clone()), post_json("/api/login", None, json!({ "username": "alice" }))).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(db.executes(), 0);
    Ok(())
}

#[tokio::test]
async fn login_to_disabled_account_is_403() -> Result<()> {
    let body = json!({ "username": "alice", "password": "correct" });
    let res = send(app(login_db(false)), post_json("/api/login", None, body)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["error"], "Account is disabled");
    Ok(())
}

#[tokio::test]
async fn login_success_issues_token_and_refresh_cookie() -> Result<()> {
    let body = json!({ "username": "alice", "password": "correct" });
    let res = send(app(login_db(true)), post_json("/api/login", None, body)).await?;
    assert_eq!(res.status, StatusCode::OK);

    let data = &res.body["data"];
    assert_eq!(data["expiresIn"], 3600);
    assert_eq!(data["user"]["username"], "alice");
    assert!(data["user"].get("passwordHash").is_none());

    let token = data["token"].as_str().unwrap();
    let claims = tokens().verify(token, TokenKind::Access)?;
    assert_eq!(claims.sub, "17");

    let cookie = res.headers[header::SET_COOKIE].to_str()?;
    assert!(cookie.starts_with("refreshToken="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/api"));
    assert!(cookie.contains("Max-Age=604800"));
    Ok(())
}

fn refresh_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/refresh");
    if let Some(value) = cookie {
        builder = builder.header(header::COOKIE, format!("refreshToken={}", value));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn refresh_flow() -> Result<()> {
    let tokens = tokens();
    let refresh = tokens.issue_refresh(&identity("user"), tokens.refresh_ttl())?;

    let res = send(app(FakeDatabase::empty()), refresh_request(Some(&refresh))).await?;
    assert_eq!(res.status, StatusCode::OK);
    let token = res.body["data"]["token"].as_str().unwrap();
    assert_eq!(tokens.verify(token, TokenKind::Access)?.name, "Alice");

    let res = send(app(FakeDatabase::empty()), refresh_request(None)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let access = access_token("user");
    let res = send(app(FakeDatabase::empty()), refresh_request(Some(&access))).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn logout_clears_cookie() -> Result<()> {
    let request = Request::post("/api/logout")
        .header(header::COOKIE, "refreshToken=abc")
        .body(Body::empty())?;
    let res = send(app(FakeDatabase::empty()), request).await?;
    assert_eq!(res.status, StatusCode::OK);
    let cookie = res.headers[header::SET_COOKIE].to_str()?;
    assert!(cookie.starts_with("refreshToken="));
    assert!(cookie.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn register_requires_admin() -> Result<()> {
    let db = FakeDatabase::empty();
    let body = json!({ "username": "bob", "password": "long-enough" });
    let res = send(app(db.clone()), post_json("/api/register", Some(&access_token("user")), body)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(db.executes(), 0);
    Ok(())
}

#[tokio::test]
async fn register_creates_user_with_hashed_password() -> Result<()> {
    let db = FakeDatabase::new(|_| Ok(vec![row(json!({ "UserId": 42 }))]));
    let body = json!({ "username": "bob", "password": "long-enough", "name": "Bob" });
    let res = send(app(db.clone()), post_json("/api/register", Some(&access_token("admin")), body)).await?;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["id"], 42);
    assert_eq!(res.body["data"]["role"], "user");

    let calls = db.calls.lock().unwrap();
    let stored = format!("{:?}", calls[0].params[2].value);
    assert!(stored.contains("$argon2id$"));
    assert!(!stored.contains("long-enough"));
    Ok(())
}

#[tokio::test]
async fn register_duplicate_username_is_409() -> Result<()> {
    let db = FakeDatabase::new(|_| {
        Err(DatabaseError::UniqueViolation(
            "Violation of UNIQUE KEY constraint 'UQ_Users_Username'".to_string(),
        ))
    });
    let body = json!({ "username": "alice", "password": "long-enough" });
    let res = send(app(db), post_json("/api/register", Some(&access_token("admin")), body)).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    Ok(())
}
