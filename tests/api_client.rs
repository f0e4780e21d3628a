//! Integration tests for the cached, retrying API client
//!
//! Every test runs against a `ScriptedTransport`, so request counts, query
//! parameters, deadlines and headers are observed directly.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tempfile::TempDir;

use churnctl::api::{customer_cache_key, ApiClient, ApiError, CostClass, TokenStore, SURVIVAL_CURVES_KEY};
use churnctl::cache::ResponseCache;
use churnctl::data::{Customer, CustomerQuery, HistoricalQuery, PerPage, PredictionInput, Role, Segment};
use churnctl::prediction::{PredictionOutcome, PredictionTask};

use common::{analytics_body, client_with, customer_page, survival_body, test_config, ScriptedTransport};

#[tokio::test]
async fn test_repeated_list_is_served_from_cache() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, customer_page(&["7590-VHVEG", "5575-GNVDE"]));
    let (client, _clock) = client_with(transport.clone());

    let query = CustomerQuery::page(1, PerPage::Count(50));
    let first = client.list_customers(&query).await.unwrap();
    let second = client.list_customers(&query).await.unwrap();

    assert_eq!(transport.call_count(), 1);
    assert_eq!(first, second);
    assert_eq!(second.users.len(), 2);
}

#[tokio::test]
async fn test_list_expires_after_five_minutes() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, customer_page(&["1"]));
    transport.push_json(200, customer_page(&["1", "2"]));
    let (client, clock) = client_with(transport.clone());
    let query = CustomerQuery::default();

    client.list_customers(&query).await.unwrap();

    clock.advance(chrono::Duration::seconds(300));
    let at_boundary = client.list_customers(&query).await.unwrap();
    assert_eq!(transport.call_count(), 1, "Exactly five minutes old is still fresh");
    assert_eq!(at_boundary.users.len(), 1);

    clock.advance(chrono::Duration::seconds(1));
    let refreshed = client.list_customers(&query).await.unwrap();
    assert_eq!(transport.call_count(), 2);
    assert_eq!(refreshed.users.len(), 2);
}

#[tokio::test]
async fn test_list_retries_connection_failures_then_succeeds() {
    let transport = ScriptedTransport::new();
    transport.push_connection_error();
    transport.push_connection_error();
    transport.push_json(200, customer_page(&["7590-VHVEG"]));
    let (client, _clock) = client_with(transport.clone());

    let page = client.list_customers(&CustomerQuery::default()).await.unwrap();

    assert_eq!(transport.call_count(), 3);
    assert_eq!(page.users[0].customer_id.as_deref(), Some("7590-VHVEG"));
    assert!(client.cache().peek(&CustomerQuery::default().cache_key()).is_some());
}

#[tokio::test]
async fn test_list_gives_up_after_three_attempts() {
    let transport = ScriptedTransport::new();
    transport.push_timeout(10);
    transport.push_connection_error();
    transport.push_connection_error();
    transport.push_json(200, customer_page(&["never reached"]));
    let (client, _clock) = client_with(transport.clone());

    let result = client.list_customers(&CustomerQuery::default()).await;

    assert!(matches!(result, Err(ApiError::Connection { .. })));
    assert_eq!(transport.call_count(), 3);
    assert!(client.cache().is_empty(), "Failures are never cached");
}

#[tokio::test]
async fn test_server_responses_are_not_retried() {
    let transport = ScriptedTransport::new();
    transport.push_json(400, json!({"error": "Invalid segment"}));
    transport.push_json(500, json!({"message": "database unavailable"}));
    let (client, _clock) = client_with(transport.clone());

    let rejected = client.list_customers(&CustomerQuery::default()).await.unwrap_err();
    match rejected {
        ApiError::Validation { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid segment");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(transport.call_count(), 1);

    let failed = client.list_customers(&CustomerQuery::default()).await.unwrap_err();
    assert!(matches!(failed, ApiError::Server { status: 500, .. }));
    assert_eq!(failed.to_string(), "Server error (500): database unavailable");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_list_query_parameters_and_cost_class() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, customer_page(&[]));
    transport.push_json(200, customer_page(&[]));
    let (client, _clock) = client_with(transport.clone());

    let filtered = CustomerQuery {
        segment: Some(Segment::HighValue),
        page: 2,
        per_page: PerPage::Count(25),
        search: "7590".to_string(),
        year: Some(2023),
        force_refresh: false,
    };
    client.list_customers(&filtered).await.unwrap();

    let everything = CustomerQuery::page(1, PerPage::All);
    client.list_customers(&everything).await.unwrap();

    let requests = transport.requests();
    let first = &requests[0];
    assert_eq!(first.method, Method::GET);
    assert_eq!(first.path, "/users");
    assert_eq!(first.query_value("page"), Some("2"));
    assert_eq!(first.query_value("per_page"), Some("25"));
    assert_eq!(first.query_value("segment"), Some("high-value"));
    assert_eq!(first.query_value("search"), Some("7590"));
    assert_eq!(first.query_value("year"), Some("2023"));
    assert_eq!(first.query_value("_t"), None);
    assert_eq!(first.cost, CostClass::Standard);
    assert_eq!(first.timeout, Duration::from_secs(10));

    let second = &requests[1];
    assert_eq!(second.query_value("per_page"), Some("all"));
    assert_eq!(second.query_value("segment"), None);
    assert_eq!(second.query_value("search"), None);
    assert_eq!(second.cost, CostClass::Extended);
    assert_eq!(second.timeout, Duration::from_secs(60));
}

#[tokio::test]
async fn test_distinct_queries_use_distinct_cache_entries() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, customer_page(&["a"]));
    transport.push_json(200, customer_page(&["b"]));
    let (client, _clock) = client_with(transport.clone());

    let all_years = CustomerQuery::default();
    let year_2024 = CustomerQuery {
        year: Some(2024),
        ..Default::default()
    };

    let a = client.list_customers(&all_years).await.unwrap();
    let b = client.list_customers(&year_2024).await.unwrap();

    assert_eq!(transport.call_count(), 2);
    assert_ne!(a, b);
    assert_eq!(client.cache().len(), 2);
}

#[tokio::test]
async fn test_forced_refresh_always_fetches_and_replaces_entry() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, customer_page(&["old"]));
    transport.push_json(200, customer_page(&["new"]));
    let (client, _clock) = client_with(transport.clone());

    client.list_customers(&CustomerQuery::default()).await.unwrap();
    let forced = CustomerQuery {
        force_refresh: true,
        ..Default::default()
    };
    let refreshed = client.list_customers(&forced).await.unwrap();

    assert_eq!(transport.call_count(), 2);
    assert_eq!(refreshed.users[0].customer_id.as_deref(), Some("new"));
    assert!(transport.requests()[1].query_value("_t").is_some(), "Forced refresh busts HTTP caches");

    // A plain read now sees the refreshed entry
    let cached = client.list_customers(&CustomerQuery::default()).await.unwrap();
    assert_eq!(cached.users[0].customer_id.as_deref(), Some("new"));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_writes_leave_cached_lists_untouched() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, customer_page(&["1"]));
    transport.push_json(201, json!({"message": "Customer created successfully", "customerID": "2"}));
    transport.push_json(200, customer_page(&["1", "2"]));
    let (client, _clock) = client_with(transport.clone());
    let query = CustomerQuery::default();

    client.list_customers(&query).await.unwrap();
    let ack = client
        .create_customer(&Customer {
            customer_id: Some("2".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ack.customer_id.as_deref(), Some("2"));

    let stale = client.list_customers(&query).await.unwrap();
    assert_eq!(stale.users.len(), 1, "The caller is responsible for clearing list keys");
    assert_eq!(transport.calls_to("/users"), 1);

    client.clear_cache(Some(&query.cache_key()));
    let current = client.list_customers(&query).await.unwrap();
    assert_eq!(current.users.len(), 2);
    assert_eq!(transport.calls_to("/users"), 2);
}

#[tokio::test]
async fn test_writes_are_attempted_once() {
    let transport = ScriptedTransport::new();
    transport.push_connection_error();
    transport.push_connection_error();
    transport.push_timeout(10);
    let (client, _clock) = client_with(transport.clone());
    let changes = Customer {
        monthly_charges: Some(99.65),
        ..Default::default()
    };

    let created = client.create_customer(&changes).await;
    assert!(matches!(created, Err(ApiError::Connection { .. })));
    assert_eq!(transport.call_count(), 1);

    let updated = client.update_customer("7590-VHVEG", &changes).await;
    assert!(matches!(updated, Err(ApiError::Connection { .. })));
    assert_eq!(transport.call_count(), 2);

    let deleted = client.delete_customer("7590-VHVEG").await;
    assert!(matches!(deleted, Err(ApiError::Timeout { seconds: 10 })));
    assert_eq!(transport.call_count(), 3);

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].path, "/customer");
    assert_eq!(requests[0].body, Some(json!({"MonthlyCharges": 99.65})));
    assert_eq!(requests[1].method, Method::PUT);
    assert_eq!(requests[1].path, "/customer/7590-VHVEG");
    assert_eq!(requests[2].method, Method::DELETE);
    assert!(requests.iter().all(|r| r.cost == CostClass::Standard));
}

#[tokio::test]
async fn test_customer_details_cached_per_id() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"user": {"customerID": "1"}, "churn_probability": 12.5}));
    transport.push_json(200, json!({"user": {"customerID": "2"}, "churn_probability": 80.0}));
    transport.push_json(200, json!({"user": {"customerID": "1"}, "churn_probability": 13.0}));
    let (client, _clock) = client_with(transport.clone());

    let first = client.get_customer("1", false).await.unwrap();
    client.get_customer("2", false).await.unwrap();
    client.get_customer("1", false).await.unwrap();
    assert_eq!(transport.call_count(), 2);
    assert_eq!(first.churn_probability, 12.5);
    assert!(client.cache().peek(&customer_cache_key("2")).is_some());

    let refreshed = client.get_customer("1", true).await.unwrap();
    assert_eq!(transport.call_count(), 3);
    assert_eq!(refreshed.churn_probability, 13.0);
}

#[tokio::test]
async fn test_analytics_cached_per_year() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, analytics_body(1200));
    transport.push_json(200, analytics_body(1350));
    let (client, _clock) = client_with(transport.clone());

    let y2023 = client.get_analytics(Some(2023), false).await.unwrap();
    let y2024 = client.get_analytics(Some(2024), false).await.unwrap();
    client.get_analytics(Some(2023), false).await.unwrap();

    assert_eq!(transport.call_count(), 2);
    assert_eq!(y2023.total_customers, 1200);
    assert_eq!(y2024.total_customers, 1350);

    let requests = transport.requests();
    assert_eq!(requests[0].query_value("year"), Some("2023"));
    assert_eq!(requests[1].query_value("year"), Some("2024"));
    assert!(requests.iter().all(|r| r.cost == CostClass::Extended));
}

#[tokio::test]
async fn test_analytics_valid_for_ten_minutes() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, analytics_body(1));
    transport.push_json(200, analytics_body(2));
    let (client, clock) = client_with(transport.clone());

    client.get_analytics(None, false).await.unwrap();
    clock.advance(chrono::Duration::seconds(600));
    assert_eq!(client.get_analytics(None, false).await.unwrap().total_customers, 1);

    clock.advance(chrono::Duration::seconds(1));
    assert_eq!(client.get_analytics(None, false).await.unwrap().total_customers, 2);
    assert_eq!(transport.call_count(), 2);
    assert_eq!(transport.requests()[0].query_value("year"), None);
}

#[tokio::test]
async fn test_survival_curves_retry_with_longer_deadline() {
    let transport = ScriptedTransport::new();
    transport.push_timeout(60);
    transport.push_json(200, survival_body());
    let (client, _clock) = client_with(transport.clone());

    let curves = client.get_survival_curves(false).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/survival-curve");
    assert_eq!(requests[0].timeout, Duration::from_secs(60));
    assert_eq!(requests[1].timeout, Duration::from_secs(90));
    assert!(curves.curves.contains_key("Two year"));
    assert!(client.cache().peek(SURVIVAL_CURVES_KEY).is_some());
}

#[tokio::test]
async fn test_survival_curves_stop_after_two_attempts() {
    let transport = ScriptedTransport::new();
    transport.push_timeout(60);
    transport.push_timeout(90);
    transport.push_json(200, survival_body());
    let (client, _clock) = client_with(transport.clone());

    let result = client.get_survival_curves(false).await;

    assert!(matches!(result, Err(ApiError::Timeout { seconds: 90 })));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_risk_factors_cached() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!({
            "risk_factors": [{"factor": "Contract_Two year", "hazard_ratio": 0.12}],
            "model_metrics": {"concordance": 0.86},
            "model_summary": {}
        }),
    );
    let (client, _clock) = client_with(transport.clone());

    let first = client.get_risk_factors(false).await.unwrap();
    client.get_risk_factors(false).await.unwrap();

    assert_eq!(transport.call_count(), 1);
    assert_eq!(first.risk_factors.len(), 1);
    assert_eq!(transport.requests()[0].cost, CostClass::Extended);
}

#[tokio::test]
async fn test_bearer_token_attached_only_when_present() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"valid": false}));
    transport.push_json(200, json!({"valid": true, "user": {"username": "ana", "role": "viewer"}}));
    let (client, _clock) = client_with(transport.clone());

    client.verify_token().await.unwrap();
    client.tokens().set("abc123").unwrap();
    let verified = client.verify_token().await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].bearer, None);
    assert_eq!(requests[1].bearer.as_deref(), Some("abc123"));
    assert!(verified.valid);
    assert_eq!(verified.user.map(|u| u.role), Some(Role::Viewer));
}

#[tokio::test]
async fn test_login_stores_token_without_sending_one() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!({"token": "fresh-token", "user": {"username": "root", "role": "admin"}}),
    );
    transport.push_json(
        200,
        json!({"users": [{"username": "root", "role": "admin", "email": "", "created_at": null}]}),
    );
    let (client, _clock) = client_with(transport.clone());
    client.tokens().set("stale-token").unwrap();

    let login = client.login("root", "hunter2").await.unwrap();
    let users = client.list_admin_users().await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].path, "/auth/login");
    assert_eq!(requests[0].bearer, None);
    assert_eq!(requests[0].body, Some(json!({"username": "root", "password": "hunter2"})));
    assert_eq!(requests[1].path, "/auth/users");
    assert_eq!(requests[1].bearer.as_deref(), Some("fresh-token"));
    assert!(login.user.has_role(&[Role::Admin]));

    assert_eq!(users.len(), 1, "accounts come from the users envelope");
    assert_eq!(users[0].username, "root");
    assert_eq!(users[0].role, Role::Admin);
    assert_eq!(users[0].email.as_deref(), Some(""));
    assert!(users[0].created_at.is_none());
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let transport = ScriptedTransport::new();
    transport.push_json(401, json!({"error": "Token has expired"}));
    let (client, _clock) = client_with(transport.clone());
    client.tokens().set("expired").unwrap();

    let err = client.verify_token().await.unwrap_err();

    assert!(matches!(err, ApiError::Auth { ref message } if message == "Token has expired"));
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_logout_clears_token_and_cache() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, customer_page(&["1"]));
    let (client, _clock) = client_with(transport.clone());
    client.tokens().set("abc123").unwrap();
    client.list_customers(&CustomerQuery::default()).await.unwrap();
    assert!(!client.cache().is_empty());

    client.logout().unwrap();

    assert!(client.tokens().get().is_none());
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn test_admin_user_management_requests() {
    let transport = ScriptedTransport::new();
    transport.push_json(201, json!({"message": "User registered successfully"}));
    transport.push_json(200, json!({"message": "User updated successfully"}));
    transport.push_json(403, json!({"error": "Admin privileges required"}));
    let (client, _clock) = client_with(transport.clone());

    client
        .register_user(&churnctl::data::NewAdminUser {
            username: "ana".into(),
            password: "s3cret".into(),
            role: Role::Editor,
            email: None,
        })
        .await
        .unwrap();
    client
        .update_admin_user(
            "ana",
            &churnctl::data::AdminUserUpdate {
                role: Some(Role::Viewer),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let forbidden = client.delete_admin_user("ana").await.unwrap_err();

    let requests = transport.requests();
    assert_eq!(requests[0].path, "/auth/register");
    assert_eq!(
        requests[0].body,
        Some(json!({"username": "ana", "password": "s3cret", "role": "editor"}))
    );
    assert_eq!(requests[1].method, Method::PUT);
    assert_eq!(requests[1].path, "/auth/users/ana");
    assert_eq!(requests[1].body, Some(json!({"role": "viewer"})));
    assert_eq!(requests[2].method, Method::DELETE);
    assert!(matches!(forbidden, ApiError::Validation { status: 403, .. }));
}

#[tokio::test]
async fn test_ids_with_reserved_characters_stay_one_path_segment() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"message": "Customer updated successfully"}));
    transport.push_json(200, json!({"message": "Customer deleted successfully"}));
    transport.push_json(200, json!({"message": "User deleted successfully"}));
    let (client, _clock) = client_with(transport.clone());

    client
        .update_customer("a/b#c", &Customer::default())
        .await
        .unwrap();
    client.delete_customer("7590 VHVEG?x=1").await.unwrap();
    client.delete_admin_user("ops/admin").await.unwrap();

    let paths: Vec<String> = transport.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec!["/customer/a%2Fb%23c", "/customer/7590%20VHVEG%3Fx%3D1", "/auth/users/ops%2Fadmin"]
    );
}

#[tokio::test]
async fn test_historical_analytics_is_never_cached() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"records": [], "page": 1, "pages": 0, "total": 0}));
    transport.push_json(200, json!({"records": [], "page": 1, "pages": 0, "total": 0}));
    let (client, _clock) = client_with(transport.clone());
    let query = HistoricalQuery {
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        ..Default::default()
    };

    client.get_historical_analytics(&query).await.unwrap();
    client.get_historical_analytics(&query).await.unwrap();

    assert_eq!(transport.call_count(), 2);
    let request = &transport.requests()[0];
    assert_eq!(request.query_value("start_date"), Some("2024-01-01"));
    assert_eq!(request.query_value("end_date"), None);
    assert_eq!(request.query_value("per_page"), Some("10"));
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn test_csv_export_written_to_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let transport = ScriptedTransport::new();
    let csv = b"snapshot_date,total_customers,churn_rate\n2024-01-31,7043,26.5\n";
    transport.push_raw(200, csv);
    let (client, _clock) = client_with(transport.clone());
    client.tokens().set("abc123").unwrap();

    let start = NaiveDate::from_ymd_opt(2024, 1, 1);
    let end = NaiveDate::from_ymd_opt(2024, 1, 31);
    let path = client.download_historical_csv(start, end, temp_dir.path()).await.unwrap();

    assert_eq!(path, temp_dir.path().join("churn_analytics_2024-01-01_to_2024-01-31.csv"));
    assert_eq!(std::fs::read(&path).unwrap(), csv.to_vec());
    let request = &transport.requests()[0];
    assert_eq!(request.path, "/historical-analytics/csv");
    assert_eq!(request.bearer.as_deref(), Some("abc123"));
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn test_prediction_task_prefers_server_and_falls_back() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, json!({"median_survival": 41, "model": "cox"}));
    transport.push_connection_error();
    let (client, _clock) = client_with(transport.clone());
    let task = PredictionTask::spawn(client);
    let input = PredictionInput {
        contract: "One year".into(),
        monthly_charges: 50.0,
        internet_service: "DSL".into(),
    };

    let remote = task.submit(input.clone()).await.unwrap();
    let local = task.submit(input).await.unwrap();

    assert_eq!(remote, PredictionOutcome::Remote(json!({"median_survival": 41, "model": "cox"})));
    match local {
        PredictionOutcome::Local(prediction) => {
            assert_eq!(prediction.median_survival, 32);
            assert_eq!(prediction.lifetime_value, 1600);
        }
        other => panic!("expected local fallback, got {:?}", other),
    }
    assert_eq!(transport.call_count(), 2, "Predictions are never retried");
    assert_eq!(transport.requests()[0].path, "/survival-prediction");
    assert_eq!(transport.requests()[0].cost, CostClass::Extended);
}

#[tokio::test]
async fn test_prediction_task_rejects_work_after_shutdown() {
    let transport = ScriptedTransport::new();
    let (client, _clock) = client_with(transport.clone());
    let task = PredictionTask::spawn(client);

    task.shutdown().await;
    // Give the task a chance to observe the shutdown signal
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = task
        .submit(PredictionInput {
            contract: "Two year".into(),
            monthly_charges: 20.0,
            internet_service: "No".into(),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_clients_sharing_a_cache_see_each_others_entries() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, survival_body());
    let cache = Arc::new(ResponseCache::new());
    let tokens = TokenStore::in_memory();
    let first = ApiClient::with_parts(test_config(), transport.clone(), cache.clone(), tokens.clone());
    let second = ApiClient::with_parts(test_config(), transport.clone(), cache, tokens);

    first.get_survival_curves(false).await.unwrap();
    second.get_survival_curves(false).await.unwrap();

    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_concurrent_reads_for_different_years_each_fetch_once() {
    let transport = ScriptedTransport::new();
    for total in [100, 200, 300] {
        transport.push_json(200, analytics_body(total));
    }
    let (client, _clock) = client_with(transport.clone());

    let years = [2022, 2023, 2024];
    let results = futures::future::join_all(years.iter().map(|&year| client.get_analytics(Some(year), false))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.call_count(), 3);
    assert_eq!(client.cache().len(), 3);

    // Every year is now a cache hit
    let again = futures::future::join_all(years.iter().map(|&year| client.get_analytics(Some(year), false))).await;
    assert!(again.iter().all(|r| r.is_ok()));
    assert_eq!(transport.call_count(), 3);
}
