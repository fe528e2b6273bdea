#![cfg(feature = "web")]
//! Web handler integration tests.
//!
//! Tests cover:
//! - Health check
//! - Successful backtests return weights keyed by date
//! - Malformed bodies, unknown rule tags and invalid parameters are 422 with a
//!   JSON error
//! - Dataset paths and fields cannot leave the data root
//! - Missing data fields are 404
//! - Malformed data is a generic 500
//! - Unknown routes

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rebalancer::adapters::web::{build_router, AppState};
use rebalancer::domain::config_validation::ServiceSettings;
use rebalancer::domain::calendar::RunBoundary;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::*;

fn create_test_app_with(port: MockDataPort, settings: ServiceSettings) -> Router {
    let state = AppState {
        data_port: Arc::new(port),
        settings: Arc::new(settings),
    };
    build_router(state)
}

fn create_test_app() -> Router {
    let port = MockDataPort::new()
        .with_table(dense_table("market_capitalization", date(2024, 1, 1), 366, 40))
        .with_error("broken", "unparseable cell");
    create_test_app_with(port, ServiceSettings::default())
}

fn post_json(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/run-backtest")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn top_n_request(n: i64) -> Value {
    json!({
        "dataset_path": "generated_data",
        "calendar": {"rule_type": "custom", "custom_dates": ["2024-03-29", "2024-06-28"]},
        "filter": {"filter_type": "top_n", "data_field": "market_capitalization", "N": n},
        "weighting": {"method": "equal"}
    })
}

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn health_returns_ok() {
        let app = create_test_app();
        let (status, body) = send(
            app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = create_test_app();
        let (status, body) = send(
            app,
            Request::builder().uri("/nope").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
}

mod run_backtest_tests {
    use super::*;

    #[tokio::test]
    async fn top_n_equal_returns_weights_per_date() {
        let (status, body) = send(create_test_app(), post_json(&top_n_request(5))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["execution_time"].as_f64().unwrap() >= 0.0);
        let weights = body["weights"].as_object().unwrap();
        assert_eq!(
            weights.keys().collect::<Vec<_>>(),
            vec!["2024-03-29", "2024-06-28"]
        );
        for day in weights.values() {
            let day = day.as_object().unwrap();
            assert_eq!(day.len(), 5);
            assert!(day.values().all(|w| w.as_f64() == Some(0.2)));
        }
    }

    #[tokio::test]
    async fn quarterly_optimized_respects_bounds() {
        let body = json!({
            "dataset_path": "generated_data",
            "calendar": {"rule_type": "quarterly", "start_date": "2024-01-01", "end_date": "2024-12-31"},
            "filter": {"filter_type": "value_threshold", "data_field": "market_capitalization", "P": 50.0},
            "weighting": {"method": "optimized", "data_field": "market_capitalization", "lb": 0.0, "ub": 0.2}
        });
        let (status, body) = send(create_test_app(), post_json(&body)).await;

        assert_eq!(status, StatusCode::OK);
        let weights = body["weights"].as_object().unwrap();
        assert_eq!(weights.len(), 4);
        for day in weights.values() {
            let values: Vec<f64> = day
                .as_object()
                .unwrap()
                .values()
                .map(|w| w.as_f64().unwrap())
                .collect();
            assert!(values.iter().all(|&w| (0.0..=0.2 + 1e-12).contains(&w)));
            assert!((values.iter().sum::<f64>() - 1.0).abs() <= 1e-4);
        }
    }

    #[tokio::test]
    async fn threshold_above_all_values_gives_empty_weights() {
        let body = json!({
            "dataset_path": "generated_data",
            "calendar": {"rule_type": "custom", "custom_dates": ["2024-02-01"]},
            "filter": {"filter_type": "value_threshold", "data_field": "market_capitalization", "P": 1000.0},
            "weighting": {"method": "equal"}
        });
        let (status, body) = send(create_test_app(), post_json(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["weights"], json!({}));
    }

    #[tokio::test]
    async fn empty_custom_dates_gives_empty_weights() {
        let mut body = top_n_request(5);
        body["calendar"]["custom_dates"] = json!([]);
        let (status, body) = send(create_test_app(), post_json(&body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["weights"], json!({}));
        assert!(body["execution_time"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn configured_run_end_bounds_quarterly_calendar() {
        let port = MockDataPort::new()
            .with_table(dense_table("market_capitalization", date(2024, 1, 1), 366, 40));
        let settings = ServiceSettings {
            run_end: RunBoundary::Date(date(2024, 6, 30)),
            ..ServiceSettings::default()
        };
        let body = json!({
            "dataset_path": "generated_data",
            "calendar": {"rule_type": "quarterly", "start_date": "2024-01-01"},
            "filter": {"filter_type": "top_n", "data_field": "market_capitalization", "N": 3},
            "weighting": {"method": "equal"}
        });
        let (status, body) = send(create_test_app_with(port, settings), post_json(&body)).await;

        assert_eq!(status, StatusCode::OK);
        let weights = body["weights"].as_object().unwrap();
        assert_eq!(weights.keys().collect::<Vec<_>>(), vec!["2024-03-31", "2024-06-30"]);
    }
}

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn unknown_rule_type_is_422() {
        let mut body = top_n_request(5);
        body["calendar"]["rule_type"] = json!("monthly");
        let (status, body) = send(create_test_app(), post_json(&body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("monthly"));
    }

    #[tokio::test]
    async fn non_positive_n_is_422() {
        let (status, body) = send(create_test_app(), post_json(&top_n_request(0))).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("N"));
    }

    #[tokio::test]
    async fn inverted_bounds_are_422() {
        let mut body = top_n_request(5);
        body["weighting"] = json!({"method": "optimized", "lb": 0.6, "ub": 0.2});
        let (status, _) = send(create_test_app(), post_json(&body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn mismatched_weighting_field_is_422() {
        let mut body = top_n_request(5);
        body["weighting"] = json!({"method": "equal", "data_field": "volume"});
        let (status, body) = send(create_test_app(), post_json(&body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("data_field"));
    }

    #[tokio::test]
    async fn missing_field_is_404() {
        let mut body = top_n_request(5);
        body["filter"]["data_field"] = json!("volume");
        let (status, body) = send(create_test_app(), post_json(&body)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("no data for field volume"));
    }

    #[tokio::test]
    async fn malformed_data_is_generic_500() {
        let mut body = top_n_request(5);
        body["filter"]["data_field"] = json!("broken");
        let (status, body) = send(create_test_app(), post_json(&body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("internal server error"));
    }

    #[tokio::test]
    async fn invalid_json_body_is_422() {
        let req = Request::builder()
            .method("POST")
            .uri("/run-backtest")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ not json"))
            .unwrap();
        let (status, body) = send(create_test_app(), req).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn missing_content_type_is_422() {
        let req = Request::builder()
            .method("POST")
            .uri("/run-backtest")
            .body(Body::from(top_n_request(5).to_string()))
            .unwrap();
        let (status, body) = send(create_test_app(), req).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn dataset_outside_data_root_is_422() {
        for path in ["../generated_data", "/srv/generated_data", "data/../../etc"] {
            let mut body = top_n_request(5);
            body["dataset_path"] = json!(path);
            let (status, body) = send(create_test_app(), post_json(&body)).await;

            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{path}");
            assert!(body["error"].as_str().unwrap().contains("dataset_path"));
        }
    }

    #[tokio::test]
    async fn field_with_path_separator_is_422() {
        for field in ["../market_capitalization", "sub/prices", ".."] {
            let mut body = top_n_request(5);
            body["filter"]["data_field"] = json!(field);
            let (status, body) = send(create_test_app(), post_json(&body)).await;

            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{field}");
            assert!(body["error"].as_str().unwrap().contains("data_field"));
        }
    }
}
