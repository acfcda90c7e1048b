use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::accounts;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(accounts::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr()?;
    let app = build_app(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestResponse {
        status: StatusCode,
        body: Value,
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, body }
    }

    fn app() -> Router {
        build_app(AppState::in_memory())
    }

    async fn register(app: &Router, email: &str, password: &str, name: &str) -> TestResponse {
        send(
            app,
            Method::POST,
            "/api/user/create",
            None,
            Some(json!({ "email": email, "password": password, "name": name })),
        )
        .await
    }

    async fn token(app: &Router, email: &str, password: &str) -> TestResponse {
        send(
            app,
            Method::POST,
            "/api/user/token",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = app();
        let res = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_user_success() {
        let app = app();
        let res = register(&app, "a@x.com", "longpass1", "A").await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.body, json!({ "email": "a@x.com", "name": "A" }));
        assert!(res.body.get("password").is_none());
    }

    #[tokio::test]
    async fn user_with_email_exists() {
        let app = app();
        register(&app, "a@x.com", "longpass1", "A").await;
        let res = register(&app, "a@x.com", "longpass1", "A").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body["email"].is_array());
    }

    #[tokio::test]
    async fn password_too_short() {
        let app = app();
        let res = register(&app, "short@x.com", "pas", "Test Name").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body["password"].is_array());

        // no record was left behind
        let res = token(&app, "short@x.com", "pas").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body.get("token").is_none());
    }

    #[tokio::test]
    async fn create_token_for_user() {
        let app = app();
        register(&app, "tok@x.com", "longpass1", "T").await;
        let res = token(&app, "tok@x.com", "longpass1").await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body["token"].is_string());
    }

    #[tokio::test]
    async fn create_token_bad_credentials() {
        let app = app();
        register(&app, "bad@x.com", "goodpass", "B").await;

        let res = token(&app, "bad@x.com", "badpass").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body.get("token").is_none());
        assert!(res.body["non_field_errors"].is_array());

        let res = token(&app, "bad@x.com", "").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body.get("token").is_none());

        let res = token(&app, "nobody@x.com", "goodpass").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body.get("token").is_none());
    }

    #[tokio::test]
    async fn retrieve_user_unauthorized() {
        let app = app();
        let res = send(&app, Method::GET, "/api/user/me", None, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);

        let res = send(&app, Method::GET, "/api/user/me", Some("bogus"), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["detail"], "Invalid token.");
    }

    #[tokio::test]
    async fn retrieve_and_update_profile() {
        let app = app();
        register(&app, "me@x.com", "longpass1", "Old Name").await;
        let key = token(&app, "me@x.com", "longpass1").await.body["token"]
            .as_str()
            .unwrap()
            .to_string();

        let res = send(&app, Method::GET, "/api/user/me", Some(&key), None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, json!({ "email": "me@x.com", "name": "Old Name" }));

        let res = send(
            &app,
            Method::PATCH,
            "/api/user/me",
            Some(&key),
            Some(json!({ "name": "New Name", "password": "newpassword" })),
        )
        .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, json!({ "email": "me@x.com", "name": "New Name" }));

        let res = token(&app, "me@x.com", "newpassword").await;
        assert_eq!(res.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn post_and_put_me_not_allowed() {
        let app = app();
        register(&app, "m@x.com", "longpass1", "M").await;
        let key = token(&app, "m@x.com", "longpass1").await.body["token"]
            .as_str()
            .unwrap()
            .to_string();

        let res = send(&app, Method::POST, "/api/user/me", Some(&key), Some(json!({}))).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);

        // method is checked before credentials
        let res = send(&app, Method::POST, "/api/user/me", None, Some(json!({}))).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);

        let res = send(
            &app,
            Method::PUT,
            "/api/user/me",
            Some(&key),
            Some(json!({ "name": "X", "password": "longpass2" })),
        )
        .await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn wrongly_typed_body_is_a_validation_error() {
        let app = app();
        let res = send(
            &app,
            Method::POST,
            "/api/user/create",
            None,
            Some(json!({ "email": 5, "password": "longpass1", "name": "W" })),
        )
        .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body["email"].is_array());

        let res = send(&app, Method::POST, "/api/user/create", None, Some(json!([]))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body["non_field_errors"].is_array());

        let res = send(
            &app,
            Method::POST,
            "/api/user/token",
            None,
            Some(json!({ "email": "w@x.com", "password": true })),
        )
        .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body["password"].is_array());
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_rejected() {
        let app = app();
        let req = Request::post("/api/user/create")
            .body(Body::from(r#"{"email":"a@x.com","password":"longpass1","name":"A"}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn whitespace_password_cannot_register() {
        let app = app();
        let res = register(&app, "w@x.com", "     ", "W").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body["password"].is_array());

        let res = token(&app, "w@x.com", "     ").await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body.get("token").is_none());
    }

    #[tokio::test]
    async fn patch_with_invalid_password_is_rejected() {
        let app = app();
        register(&app, "p@x.com", "longpass1", "P").await;
        let key = token(&app, "p@x.com", "longpass1").await.body["token"]
            .as_str()
            .unwrap()
            .to_string();

        let res = send(
            &app,
            Method::PATCH,
            "/api/user/me",
            Some(&key),
            Some(json!({ "password": "abc" })),
        )
        .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(res.body["password"].is_array());
    }
}
