use actix_web::{http::StatusCode, test, web};
use lead_verify_api::{AppConfig, AppState, ManualClock, MetricsConfig, Stores, create_app};
use std::sync::Arc;

fn app_state(config: AppConfig) -> web::Data<AppState> {
    let clock = ManualClock::new(1_700_000_400_000);
    web::Data::new(AppState::new(config, Arc::new(clock), Stores::memory()).unwrap())
}

/// Integration test for the health check endpoint
///
/// Runs against the full application factory so the middleware stack and
/// shared state are exercised as in production.
#[actix_web::test]
async fn test_health_endpoint_integration() {
    let app = test::init_service(create_app(app_state(AppConfig::default()))).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK, "Expected 200 OK status");
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(
        content_type.contains("application/json"),
        "Expected JSON content type, got: {}",
        content_type
    );

    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        json,
        serde_json::json!({ "status": "healthy", "rateLimitStore": "memory" })
    );
}

#[actix_web::test]
async fn test_version_endpoint_integration() {
    let app = test::init_service(create_app(app_state(AppConfig::default()))).await;

    let req = test::TestRequest::get().uri("/api/version").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["commit"].is_string(), "commit should be a string");
    assert!(json["buildTime"].is_string(), "buildTime should be a string");
}

#[actix_web::test]
async fn test_security_headers_present() {
    let app = test::init_service(create_app(app_state(AppConfig::default()))).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    let headers = resp.headers();

    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    assert!(headers.get("content-security-policy").is_some());
    assert!(
        headers
            .get("strict-transport-security")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("max-age=31536000")
    );
}

#[actix_web::test]
async fn test_request_id_header_added() {
    let app = test::init_service(create_app(app_state(AppConfig::default()))).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;

    let request_id = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(
        uuid::Uuid::parse_str(request_id).is_ok(),
        "Generated request id should be a UUID"
    );
}

#[actix_web::test]
async fn test_request_id_header_preserved() {
    let app = test::init_service(create_app(app_state(AppConfig::default()))).await;

    let req = test::TestRequest::get()
        .uri("/api/version")
        .insert_header(("X-Request-ID", "caller-supplied-id"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(
        resp.headers().get("x-request-id").unwrap(),
        "caller-supplied-id"
    );
}

#[actix_web::test]
async fn test_metrics_endpoint_integration() {
    let app = test::init_service(create_app(app_state(AppConfig::default()))).await;

    let req = test::TestRequest::post()
        .uri("/api/otp/send")
        .insert_header(("X-Forwarded-For", "203.0.113.7"))
        .set_json(serde_json::json!({ "phone": "9876543210" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    let metrics = std::str::from_utf8(&body).unwrap();
    assert!(metrics.contains("otp_sent_total 1"));
    assert!(metrics.contains("http_requests_total"));
    assert!(metrics.contains("route=\"/api/otp/send\""));
    assert!(metrics.contains("app_uptime_seconds"));
}

#[actix_web::test]
async fn test_metrics_endpoint_disabled() {
    let config = AppConfig {
        metrics: MetricsConfig { enabled: false },
        ..Default::default()
    };
    let app = test::init_service(create_app(app_state(config))).await;

    let req = test::TestRequest::get().uri("/api/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_openapi_spec_lists_endpoints() {
    let app = test::init_service(create_app(app_state(AppConfig::default()))).await;

    let req = test::TestRequest::get().uri("/api/spec/v2").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let spec: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(spec["info"]["title"], "Lead Verify API");
    for path in ["/api/otp/send", "/api/otp/verify", "/api/leads", "/api/callback"] {
        assert!(spec["paths"].get(path).is_some(), "missing {path}");
    }
}
