//! Route tests

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use kubelink_server::{BUNDLE_FIELD, MAX_BUNDLE_BYTES};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::fixtures::kubeconfig;
use tests::mocks::MockClusterClient;
use tower::ServiceExt;
use uuid::Uuid;

use super::{json_body, multipart, TestServer, TestServerOptions};

#[tokio::test]
async fn test_health() {
    let t = TestServer::new();
    let response = t
        .server
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_submit_raw_kubeconfig() {
    let t = TestServer::new();
    let response = t
        .server
        .router()
        .oneshot(
            t.authorized("POST", "/api/system/kubernetes")
                .body(Body::from(kubeconfig(&["alpha", "beta"])))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["registered_contexts"].as_array().unwrap().len(), 2);
    assert_eq!(body["errored_contexts"], json!([]));
    // Credentials never leave the server
    assert!(!body.to_string().contains("alpha-token"));
    assert!(body["registered_contexts"][0]["connection_id"].is_string());
}

#[tokio::test]
async fn test_submit_multipart_kubeconfig() {
    let t = TestServer::new();
    let (content_type, body) = multipart(BUNDLE_FIELD, &kubeconfig(&["alpha"]));
    let response = t
        .server
        .router()
        .oneshot(
            t.authorized("POST", "/api/system/kubernetes")
                .header("Content-Type", content_type)
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["registered_contexts"][0]["name"], "alpha");
}

#[tokio::test]
async fn test_submit_multipart_without_the_kubeconfig_field() {
    let t = TestServer::new();
    let (content_type, body) = multipart("other", &kubeconfig(&["alpha"]));
    let response = t
        .server
        .router()
        .oneshot(
            t.authorized("POST", "/api/system/kubernetes")
                .header("Content-Type", content_type)
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains(BUNDLE_FIELD));
}

#[tokio::test]
async fn test_submit_rejections() {
    let t = TestServer::new();
    let router = t.server.router();

    let no_token = router
        .clone()
        .oneshot(
            Request::post("/api/system/kubernetes")
                .body(Body::from(kubeconfig(&["alpha"])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(no_token.status(), StatusCode::UNAUTHORIZED);

    let empty = router
        .clone()
        .oneshot(
            t.authorized("POST", "/api/system/kubernetes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let bad_user = router
        .clone()
        .oneshot(
            Request::post("/api/system/kubernetes")
                .header("Authorization", "Bearer tok")
                .header("X-User-Id", "not-a-uuid")
                .body(Body::from(kubeconfig(&["alpha"])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bad_user.status(), StatusCode::BAD_REQUEST);

    let oversized = vec![b'#'; MAX_BUNDLE_BYTES + 1];
    let too_large = router
        .oneshot(
            t.authorized("POST", "/api/system/kubernetes")
                .header("Content-Length", oversized.len().to_string())
                .body(Body::from(oversized))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_oversized_body_without_content_length() {
    let t = TestServer::new();
    let request = t
        .authorized("POST", "/api/system/kubernetes")
        .body(Body::from(vec![b'#'; MAX_BUNDLE_BYTES + 1]))
        .unwrap();
    assert!(request.headers().get("Content-Length").is_none());

    let response = t.server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_list_contexts_without_persisting() {
    let t = TestServer::new();
    let router = t.server.router();

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/system/kubernetes/contexts")
                .body(Body::from(kubeconfig(&["alpha", "beta"])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let contexts = body.as_array().unwrap();
    assert_eq!(contexts.len(), 2);
    assert!(contexts.iter().all(|c| c.get("connection_id").is_none()));
    assert!(contexts.iter().all(|c| c.get("auth").is_none()));

    let events = router
        .oneshot(
            Request::get("/api/system/events?limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let events = json_body(events).await;
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["action"], "discovered");
}

async fn submit_one(t: &TestServer) -> Uuid {
    let response = t
        .server
        .router()
        .oneshot(
            t.authorized("POST", "/api/system/kubernetes")
                .body(Body::from(kubeconfig(&["alpha"])))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    body["registered_contexts"][0]["connection_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_ping_routes() {
    let t = TestServer::new();
    let id = submit_one(&t).await;
    let router = t.server.router();

    let ok = router
        .clone()
        .oneshot(
            t.authorized("GET", &format!("/api/system/kubernetes/ping?connection_id={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(json_body(ok).await["server_version"]["gitVersion"], "v1.30.0");

    let missing_id = router
        .clone()
        .oneshot(
            t.authorized("GET", "/api/system/kubernetes/ping")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing_id.status(), StatusCode::BAD_REQUEST);

    let unknown = router
        .clone()
        .oneshot(
            t.authorized(
                "GET",
                &format!("/api/system/kubernetes/ping?connection_id={}", Uuid::new_v4()),
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let no_token = router
        .oneshot(
            Request::get(format!("/api/system/kubernetes/ping?connection_id={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(no_token.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ping_unreachable_cluster_is_bad_gateway() {
    let t = TestServer::with_options(TestServerOptions {
        cluster_client: Arc::new(MockClusterClient::unreachable()),
        ..TestServerOptions::default()
    });
    let id = submit_one(&t).await;

    let response = t
        .server
        .router()
        .oneshot(
            t.authorized("GET", &format!("/api/system/kubernetes/ping?connection_id={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_delete_connection_route() {
    let t = TestServer::new();
    let id = submit_one(&t).await;
    let router = t.server.router();

    let response = router
        .clone()
        .oneshot(
            Request::delete(format!("/api/system/kubernetes?connection_id={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({}));

    // Cleanup runs in the background
    let mut gone = false;
    for _ in 0..50 {
        let ping = router
            .clone()
            .oneshot(
                t.authorized("GET", &format!("/api/system/kubernetes/ping?connection_id={}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        if ping.status() == StatusCode::NOT_FOUND {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gone);

    let invalid = router
        .oneshot(
            Request::delete("/api/system/kubernetes?connection_id=nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_is_accepted() {
    let t = TestServer::new();
    let response = t
        .server
        .router()
        .oneshot(
            t.authorized("POST", "/api/system/kubernetes/register")
                .body(Body::from(kubeconfig(&["alpha"])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_discover_without_any_cluster_is_not_found() {
    let t = TestServer::new();
    let response = t
        .server
        .router()
        .oneshot(
            t.authorized("POST", "/api/system/kubernetes/discover")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
