mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;

use bank_report_api::database::{classify_server_error, DatabaseError, Target};
use common::*;

fn loan_balance(min: u64, max: u64) -> serde_json::Value {
    json!({
        "branch": "001",
        "section": "AG",
        "scheme": "KCC",
        "minAmount": min,
        "maxAmount": max,
        "fromDate": "2024-04-01",
        "toDate": "2025-03-31"
    })
}

#[tokio::test]
async fn inverted_amount_range_is_rejected_before_the_database() -> Result<()> {
    let db = FakeDatabase::empty();
    let res = send(
        app(db.clone()),
        post_json("/api/reports/loan-balance", None, loan_balance(500000, 100000)),
    )
    .await?;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["field"], "minAmount");
    assert_eq!(db.executes(), 0);
    Ok(())
}

#[tokio::test]
async fn report_runs_stored_procedure_without_login() -> Result<()> {
    let db = FakeDatabase::new(|_| {
        Ok(vec![row(json!({ "AccountNo": "0010001", "Balance": "250000.00" }))])
    });
    let res = send(
        app(db.clone()),
        post_json("/api/reports/loan-balance", Some("garbage"), loan_balance(100000, 500000)),
    )
    .await?;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"][0]["AccountNo"], "0010001");

    let calls = db.calls.lock().unwrap();
    assert_eq!(
        calls[0].target,
        Target::Procedure("dbo.usp_LoanBalanceReport".into())
    );
    assert_eq!(calls[0].params[0].name, "BranchCode");
    Ok(())
}

#[tokio::test]
async fn missing_procedure_is_a_specific_500() -> Result<()> {
    let db = FakeDatabase::new(|_| {
        Err(classify_server_error(
            Some(2812),
            "Could not find stored procedure 'dbo.usp_LoanBalanceReport'.",
        ))
    });
    let res = send(
        app(db),
        post_json("/api/reports/loan-balance", None, loan_balance(1, 2)),
    )
    .await?;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], "Stored procedure not found");
    Ok(())
}

#[tokio::test]
async fn database_timeout_is_504() -> Result<()> {
    let db = FakeDatabase::new(|_| Err(DatabaseError::Timeout("30s elapsed".to_string())));
    let body = json!({ "branch": "001", "fromDate": "2024-04-01", "toDate": "2024-04-30" });
    let res = send(app(db), post_json("/api/reports/deposit-summary", None, body)).await?;
    assert_eq!(res.status, StatusCode::GATEWAY_TIMEOUT);
    Ok(())
}

#[tokio::test]
async fn unknown_status_value_is_rejected() -> Result<()> {
    let db = FakeDatabase::empty();
    let body = json!({
        "branch": "001", "status": "frozen",
        "fromDate": "2024-04-01", "toDate": "2024-04-30"
    });
    let res = send(app(db.clone()), post_json("/api/reports/deposit-summary", None, body)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(db.executes(), 0);
    Ok(())
}

#[tokio::test]
async fn non_object_body_is_rejected() -> Result<()> {
    let res = send(
        app(FakeDatabase::empty()),
        post_json("/api/reports/loan-balance", None, json!([1, 2, 3])),
    )
    .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let request = Request::post("/api/reports/loan-balance")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let res = send(app(FakeDatabase::empty()), request).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "INVALID_JSON");
    Ok(())
}

#[tokio::test]
async fn branches_are_a_flat_list_with_or_without_identity() -> Result<()> {
    let db = FakeDatabase::new(|_| {
        Ok(vec![
            row(json!({ "BranchCode": "001" })),
            row(json!({ "BranchCode": "002" })),
        ])
    });

    for bearer in [None, Some("garbage")] {
        let res = send(app(db.clone()), get("/api/branches", bearer)).await?;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"], json!(["001", "002"]));
    }
    Ok(())
}

#[tokio::test]
async fn user_listing_strips_password_hashes() -> Result<()> {
    let db = FakeDatabase::new(|_| {
        Ok(vec![row(json!({
            "UserId": 1, "Username": "alice", "PasswordHash": "$argon2id$v=19$..."
        }))])
    });

    let res = send(app(db.clone()), get("/api/users", None)).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = send(app(db), get("/api/users", Some(&access_token("admin")))).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"], json!([{ "UserId": 1, "Username": "alice" }]));
    Ok(())
}

#[tokio::test]
async fn account_lookup_returns_one_row_or_404() -> Result<()> {
    let token = access_token("user");

    let found = FakeDatabase::new(|_| Ok(vec![row(json!({ "AccountNo": "0010001" }))]));
    let res = send(app(found), get("/api/accounts/lookup?accountNo=0010001", Some(&token))).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"], json!({ "AccountNo": "0010001" }));

    let res = send(
        app(FakeDatabase::empty()),
        get("/api/accounts/lookup?accountNo=0010001", Some(&token)),
    )
    .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let db = FakeDatabase::empty();
    let res = send(app(db.clone()), get("/api/accounts/lookup", Some(&token))).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "accountNo is required");
    assert_eq!(db.executes(), 0);
    Ok(())
}

#[tokio::test]
async fn unavailable_database_is_503() -> Result<()> {
    let db = FakeDatabase::new(|_| Err(DatabaseError::Unavailable("connection refused".to_string())));
    let res = send(app(db), get("/api/schemes", None)).await?;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["error"], "Database temporarily unavailable");
    Ok(())
}
