use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

use crate::{DeploymentImpl, routes};

pub mod auth;

pub fn router(deployment: DeploymentImpl) -> Router {
    let protected_routes = Router::new()
        .merge(routes::info::router())
        .merge(routes::items::router(&deployment))
        .merge(routes::maintenance::router(&deployment))
        .merge(routes::qr::router())
        .merge(routes::notifications::router())
        .merge(routes::subscription::router())
        .merge(routes::shop::router(&deployment))
        .merge(routes::events::router())
        .merge(routes::admin::router())
        .layer(from_fn_with_state(deployment.clone(), auth::require_user));

    // QR lookups and payment callbacks authenticate on their own terms
    let api_routes = Router::new()
        .merge(routes::qr::public_router(&deployment))
        .merge(routes::subscription::public_router())
        .merge(protected_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use db::DBService;
    use deployment::Deployment;
    use services::services::{
        billing::WEBHOOK_SECRET_HEADER,
        config::{Config, PlanLimits},
    };
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use utils_jwt::{AccessClaims, encode_access_token};
    use uuid::Uuid;

    use crate::{
        DeploymentImpl,
        test_support::{TEST_JWT_SECRET, TestEnvGuard},
    };

    async fn setup_deployment() -> (TestEnvGuard, DeploymentImpl) {
        let temp_root = std::env::temp_dir().join(format!("hk-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&temp_root).unwrap();

        let db_path = temp_root.join("db.sqlite");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let env_guard = TestEnvGuard::new(&temp_root, db_url);

        let deployment = DeploymentImpl::new().await.unwrap();

        (env_guard, deployment)
    }

    /// Builds a deployment around an explicit config, bypassing the env.
    async fn deployment_with_config(mut config: Config) -> (TempDir, DeploymentImpl) {
        let temp = tempfile::tempdir().unwrap();
        config.auth.jwt_secret = Some(TEST_JWT_SECRET.to_string());
        let db = DBService::new_in_memory().await.unwrap();
        let deployment = DeploymentImpl::from_parts(
            temp.path().to_path_buf(),
            temp.path().join("storage"),
            config,
            db,
        );
        (temp, deployment)
    }

    fn json_request(
        method: &str,
        uri: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload_request(uri: &str, token: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        const BOUNDARY: &str = "homekeep-test-boundary";
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn create_item(app: &Router, token: &str, name: &str) -> String {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/items", token, json!({ "name": name })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn token_for(user_id: Uuid, role: Option<&str>) -> String {
        let mut claims = AccessClaims::new(user_id, chrono::Duration::hours(1));
        if let Some(role) = role {
            claims = claims.with_role(role);
        }
        encode_access_token(&claims, TEST_JWT_SECRET).unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let response = app.oneshot(get("/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_info_requires_token() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let response = app.oneshot(get("/api/info", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json.get("success").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(
            json.get("message").and_then(|v| v.as_str()),
            Some("Unauthorized")
        );
    }

    #[tokio::test]
    async fn api_info_accepts_bearer_token_and_redacts_secrets() {
        let (_env_guard, deployment) = setup_deployment().await;
        let user_id = Uuid::new_v4();
        let token = token_for(user_id, None);
        let app = super::router(deployment);

        let response = app
            .oneshot(get("/api/info", Some(&token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = &json["data"];
        assert_eq!(data["user"]["user_id"], user_id.to_string());
        assert_eq!(data["user"]["is_admin"], false);
        assert_eq!(data["config"]["auth"]["jwt_secret"], "***");
        assert_eq!(data["config"]["billing"]["webhook_secret"], "***");
    }

    #[tokio::test]
    async fn events_accept_query_token_but_other_routes_do_not() {
        let (_env_guard, deployment) = setup_deployment().await;
        let token = token_for(Uuid::new_v4(), None);
        let app = super::router(deployment);

        let response = app
            .clone()
            .oneshot(get(&format!("/api/events?token={token}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let response = app
            .oneshot(get(&format!("/api/items?token={token}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let user_token = token_for(Uuid::new_v4(), None);
        let response = app
            .clone()
            .oneshot(get("/api/admin/stats", Some(&user_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin_token = token_for(Uuid::new_v4(), Some("admin"));
        let response = app
            .oneshot(get("/api/admin/stats", Some(&admin_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["items"], 0);
    }

    #[tokio::test]
    async fn webhook_rejects_wrong_secret() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/billing/webhook")
                    .header(WEBHOOK_SECRET_HEADER, "not-the-secret")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"event_id":"evt_1","type":"checkout.completed","data":{}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_qr_code_lookup_reports_not_found_status() {
        let (_env_guard, deployment) = setup_deployment().await;
        let app = super::router(deployment);

        let response = app.oneshot(get("/api/qr/nope1234", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "not_found");
        assert_eq!(json["data"]["code"], "NOPE1234");
    }

    #[tokio::test]
    async fn item_creation_past_plan_cap_is_payment_required() {
        let mut config = Config::default();
        config.plans.free = PlanLimits::capped(1, 1, 1);
        let (_temp, deployment) = deployment_with_config(config).await;
        let token = token_for(Uuid::new_v4(), None);
        let app = super::router(deployment.clone());

        let create =
            |name: &str| json_request("POST", "/api/items", &token, json!({ "name": name }));

        let response = app.clone().oneshot(create("Dishwasher")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(create("Furnace")).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);

        let stored = db::models::item::Item::count(&deployment.db().pool)
            .await
            .unwrap();
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn oversized_document_upload_is_payload_too_large() {
        let mut config = Config::default();
        config.storage.max_upload_bytes = 1024;
        let (_temp, deployment) = deployment_with_config(config).await;
        let token = token_for(Uuid::new_v4(), None);
        let app = super::router(deployment);
        let item_id = create_item(&app, &token, "Water heater").await;
        let uri = format!("/api/items/{item_id}/documents");

        // over the storage cap but inside the body limit
        let response = app
            .clone()
            .oneshot(upload_request(&uri, &token, "manual.pdf", &[b'a'; 2048]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        // past the request body limit itself
        let response = app
            .clone()
            .oneshot(upload_request(
                &uri,
                &token,
                "manual.pdf",
                &vec![b'a'; 200 * 1024],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);

        let response = app
            .oneshot(upload_request(&uri, &token, "manual.pdf", b"%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["file_name"], "manual.pdf");
    }

    #[tokio::test]
    async fn shop_order_flow_uses_pack_product_names() {
        let (_temp, deployment) = deployment_with_config(Config::default()).await;
        let token = token_for(Uuid::new_v4(), None);
        let app = super::router(deployment);

        let response = app
            .clone()
            .oneshot(get("/api/shop/products", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let products: Vec<&str> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|product| product["product"].as_str().unwrap())
            .collect();
        assert_eq!(
            products,
            ["sticker_pack_10", "sticker_pack_25", "sticker_pack_50"]
        );

        let order = json!({
            "product": "sticker_pack_25",
            "quantity": 2,
            "shipping_name": "Sam Doe",
            "shipping_address": "1 Main St",
        });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/shop/orders", &token, order))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["product"], "sticker_pack_25");
        assert_eq!(json["data"]["total_cents"], 1998);
        assert_eq!(json["data"]["status"], "pending");
        let order_id = json["data"]["id"].as_str().unwrap().to_string();

        let cancel_uri = format!("/api/shop/orders/{order_id}/cancel");
        let response = app
            .clone()
            .oneshot(json_request("POST", &cancel_uri, &token, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(json_request("POST", &cancel_uri, &token, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn completing_task_twice_is_conflict() {
        let (_temp, deployment) = deployment_with_config(Config::default()).await;
        let token = token_for(Uuid::new_v4(), None);
        let app = super::router(deployment);

        let task = json!({
            "title": "Replace HVAC filter",
            "due_date": "2025-01-31",
            "recurrence": "monthly",
        });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/maintenance", &token, task))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let task_id = body_json(response).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let complete_uri = format!("/api/maintenance/{task_id}/complete");
        let response = app
            .clone()
            .oneshot(json_request("POST", &complete_uri, &token, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["task"]["status"], "completed");
        assert_eq!(json["data"]["next"]["due_date"], "2025-02-28");

        let response = app
            .clone()
            .oneshot(json_request("POST", &complete_uri, &token, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let skip_uri = format!("/api/maintenance/{task_id}/skip");
        let response = app
            .oneshot(json_request("POST", &skip_uri, &token, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn qr_claim_and_release_over_http() {
        let (_temp, deployment) = deployment_with_config(Config::default()).await;
        let admin = token_for(Uuid::new_v4(), Some("admin"));
        let owner = token_for(Uuid::new_v4(), None);
        let other = token_for(Uuid::new_v4(), None);
        let app = super::router(deployment);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/admin/qr-codes",
                &admin,
                json!({ "count": 1, "batch_label": "spring" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let code = body_json(response).await["data"][0]["code"]
            .as_str()
            .unwrap()
            .to_string();

        let owner_item = create_item(&app, &owner, "Fridge").await;
        let other_item = create_item(&app, &other, "Freezer").await;
        let claim_uri = format!("/api/qr/{code}/claim");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &claim_uri,
                &owner,
                json!({ "item_id": owner_item }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &claim_uri,
                &other,
                json!({ "item_id": other_item }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let lookup_uri = format!("/api/qr/{code}");
        let response = app
            .clone()
            .oneshot(get(&lookup_uri, Some(&owner)))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "claimed_by_you");
        assert_eq!(json["data"]["item"]["id"], owner_item);

        let response = app.clone().oneshot(get(&lookup_uri, None)).await.unwrap();
        assert_eq!(body_json(response).await["data"]["status"], "claimed");

        let release = |token: &str| {
            Request::builder()
                .method("DELETE")
                .uri(&claim_uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(release(&other)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = app.clone().oneshot(release(&owner)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get(&lookup_uri, None)).await.unwrap();
        assert_eq!(body_json(response).await["data"]["status"], "unclaimed");
    }

    #[tokio::test]
    async fn event_stream_ends_when_streams_close() {
        let (_temp, deployment) = deployment_with_config(Config::default()).await;
        let token = token_for(Uuid::new_v4(), None);
        let app = super::router(deployment.clone());

        let response = app
            .oneshot(get(&format!("/api/events?token={token}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        deployment.events().close_streams();

        let body = tokio::time::timeout(
            Duration::from_secs(2),
            to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("stream should finish once closed");
        assert!(body.is_ok());
    }
}
