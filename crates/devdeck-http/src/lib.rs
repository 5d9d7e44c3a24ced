//! HTTP surface (axum).
//!
//! Every handler is a thin wrapper: read the document, run one domain
//! operation, write it back, fire the notification, answer.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use devdeck_core::{notify::Notifier, security::AdminCredentials, store::DocumentStore};

pub mod errors;
pub mod handlers;

pub struct AppState {
    pub store: DocumentStore,
    pub notifier: Notifier,
    pub admin: AdminCredentials,
}

// NOTE: `/api/data` and the resource/settings routes have no auth gate; the
// browser front-end calls them directly.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/login", post(handlers::login))
        .route("/api/data", get(handlers::data))
        .route("/api/live-drop", get(handlers::live_drop))
        .route("/api/admin/resource", post(handlers::upsert_resource))
        .route("/admin/resource", post(handlers::upsert_resource))
        .route("/admin/resource/{id}", delete(handlers::delete_resource))
        .route("/admin/settings", post(handlers::update_settings))
        .route("/admin/login", post(handlers::admin_login))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    address: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("http server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use devdeck_core::{
        domain::{Document, User},
        notify::DeliveryChannel,
        ops::STAT_ADMIN_LOGINS,
    };
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Harness {
        server: TestServer,
        store: DocumentStore,
        _dir: tempfile::TempDir,
    }

    async fn harness_with(doc: Document, notifier: Notifier) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("database.json"))
            .await
            .unwrap();
        store.write(&doc).await.unwrap();

        let state = Arc::new(AppState {
            store: store.clone(),
            notifier,
            admin: AdminCredentials::new("root", "s3cret"),
        });
        Harness {
            server: TestServer::new(router(state)).unwrap(),
            store,
            _dir: dir,
        }
    }

    async fn harness(doc: Document) -> Harness {
        harness_with(doc, Notifier::disabled()).await
    }

    fn seeded() -> Document {
        let mut doc = Document::default();
        doc.users.insert(
            "42".to_string(),
            User {
                username: "neo".to_string(),
                access_code: "123456".to_string(),
                credits: 50,
                is_premium: true,
                is_admin: false,
                last_login: None,
            },
        );
        doc.live_drop_pool = vec!["4111-0000-0000-0001".to_string()];
        doc
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, _destination: &str, html: &str) -> devdeck_core::Result<()> {
            self.sent.lock().unwrap().push(html.to_string());
            Ok(())
        }
    }

    async fn wait_for_messages(channel: &RecordingChannel, n: usize) -> Vec<String> {
        for _ in 0..50 {
            let sent = channel.sent.lock().unwrap().clone();
            if sent.len() >= n {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        channel.sent.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn login_grants_bonus_once() {
        let h = harness(seeded()).await;

        let first = h.server.post("/api/login").json(&json!({ "code": "123456" })).await;
        first.assert_status_ok();
        assert_eq!(
            first.json::<Value>(),
            json!({ "userId": "42", "username": "neo", "credits": 75, "isPremium": true, "isAdmin": false })
        );

        let second = h.server.post("/api/login").json(&json!({ "code": "123456" })).await;
        second.assert_status_ok();
        assert_eq!(second.json::<Value>()["credits"], json!(75));

        let doc = h.store.read().await.unwrap();
        assert!(doc.users["42"].last_login.is_some());
        assert_eq!(doc.stat("logins"), 2);
    }

    #[tokio::test]
    async fn login_with_bad_code_is_401_and_notifies() {
        let channel = Arc::new(RecordingChannel::default());
        let notifier = Notifier::new("-100", vec![channel.clone() as Arc<dyn DeliveryChannel>]);
        let h = harness_with(seeded(), notifier).await;

        let resp = h
            .server
            .post("/api/login")
            .add_header("x-forwarded-for", "198.51.100.4")
            .json(&json!({ "code": "000000" }))
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(resp.json::<Value>(), json!({ "error": "Invalid access code" }));

        let sent = wait_for_messages(&channel, 1).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Failed Login Attempt"));
        assert!(sent[0].contains("198.51.100.4"));
    }

    #[tokio::test]
    async fn malformed_login_body_is_400() {
        let h = harness(seeded()).await;
        let resp = h
            .server
            .post("/api/login")
            .content_type("application/json")
            .text("{ nope")
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(resp.json::<Value>()["message"].is_string());
    }

    #[tokio::test]
    async fn data_returns_whole_document() {
        let h = harness(seeded()).await;
        let resp = h.server.get("/api/data").await;
        resp.assert_status_ok();
        let body = resp.json::<Value>();
        assert_eq!(body["users"]["42"]["access_code"], json!("123456"));
        assert_eq!(body["live_drop_pool"], json!(["4111-0000-0000-0001"]));
    }

    #[tokio::test]
    async fn live_drop_returns_pooled_value_or_404() {
        let h = harness(seeded()).await;
        let resp = h.server.get("/api/live-drop").await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<Value>(), json!({ "cc": "4111-0000-0000-0001" }));

        let empty = harness(Document::default()).await;
        empty
            .server
            .get("/api/live-drop")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resource_upsert_and_delete() {
        let h = harness(Document::default()).await;

        let created = h
            .server
            .post("/api/admin/resource")
            .json(&json!({ "title": "Rust Book", "url": "https://doc.rust-lang.org/book" }))
            .await;
        created.assert_status_ok();
        assert_eq!(
            created.json::<Value>(),
            json!({ "id": 1, "title": "Rust Book", "url": "https://doc.rust-lang.org/book" })
        );

        let second = h
            .server
            .post("/admin/resource")
            .json(&json!({ "title": "Nomicon" }))
            .await;
        assert_eq!(second.json::<Value>()["id"], json!(2));

        let updated = h
            .server
            .post("/admin/resource")
            .json(&json!({ "id": 1, "title": "The Book" }))
            .await;
        updated.assert_status_ok();
        assert_eq!(updated.json::<Value>(), json!({ "id": 1, "title": "The Book" }));

        h.server
            .post("/admin/resource")
            .json(&json!({ "id": 99, "title": "ghost" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        h.server
            .post("/admin/resource")
            .json(&json!({ "url": "no title" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let deleted = h.server.delete("/admin/resource/1").await;
        deleted.assert_status_ok();
        assert_eq!(deleted.json::<Value>(), json!({ "message": "Deleted" }));

        let missing = h.server.delete("/admin/resource/1").await;
        missing.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(missing.json::<Value>(), json!({ "message": "Not Found" }));

        let bad_id = h.server.delete("/admin/resource/abc").await;
        bad_id.assert_status(StatusCode::BAD_REQUEST);
        assert!(bad_id.json::<Value>()["message"].is_string());

        let doc = h.store.read().await.unwrap();
        assert_eq!(doc.resources.len(), 1);
        assert_eq!(doc.resources[0].title, "Nomicon");
    }

    #[tokio::test]
    async fn settings_are_merged_shallowly() {
        let mut doc = Document::default();
        doc.settings = serde_json::from_value(json!({ "a": { "x": 1 }, "b": 2 })).unwrap();
        let h = harness(doc).await;

        let resp = h.server.post("/admin/settings").json(&json!({ "a": 1 })).await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<Value>(), json!({ "a": 1, "b": 2 }));

        h.server
            .post("/admin/settings")
            .json(&json!(["not", "an", "object"]))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_login_checks_credentials_and_counts() {
        let h = harness(Document::default()).await;

        let bad = h
            .server
            .post("/admin/login")
            .json(&json!({ "user": "root", "pass": "wrong" }))
            .await;
        bad.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(bad.json::<Value>(), json!({ "message": "Invalid credentials" }));

        let ok = h
            .server
            .post("/admin/login")
            .json(&json!({ "user": "root", "pass": "s3cret" }))
            .await;
        ok.assert_status_ok();
        assert_eq!(ok.json::<Value>(), json!({ "message": "Admin login successful" }));

        assert_eq!(h.store.read().await.unwrap().stat(STAT_ADMIN_LOGINS), 1);
    }

    #[tokio::test]
    async fn storage_failure_is_500() {
        let h = harness(seeded()).await;
        std::fs::write(h.store.path(), "garbage").unwrap();

        let resp = h.server.get("/api/data").await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.json::<Value>(), json!({ "message": "Internal server error" }));
    }
}
