use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use filmoteka::{
    AppState, MemoryRepository, create_router,
    auth::{Claims, generate_token},
    config::AppConfig,
    models::{NewUser, Role},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use std::sync::Arc;
use tower::ServiceExt;

// --- Test Harness ---

struct TestApp {
    repo: MemoryRepository,
    state: AppState,
    router: Router,
}

fn app() -> TestApp {
    let repo = MemoryRepository::new();
    let state = AppState::new(Arc::new(repo.clone()), AppConfig::default());
    TestApp {
        repo,
        router: create_router(state.clone()),
        state,
    }
}

impl TestApp {
    async fn register(&self, login: &str, role: Role) -> i32 {
        self.state
            .services
            .users
            .create_user(&NewUser {
                login: login.into(),
                password: "pw".into(),
                user_role: role,
            })
            .await
            .unwrap()
    }

    fn token(&self, user_id: i32) -> String {
        generate_token(user_id, &self.state.config.jwt_secret).unwrap()
    }

    /// Sends `method uri` with the raw `Authorization` value, if any.
    async fn call(&self, method: Method, uri: &str, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}

fn signed(claims: &Claims, algorithm: Algorithm, secret: &str) -> String {
    encode(
        &Header::new(algorithm),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn claims(user_id: i32, ttl: i64) -> Claims {
    let now = Utc::now().timestamp();
    Claims {
        user_id,
        iat: now as usize,
        exp: (now + ttl) as usize,
    }
}

// --- Identity Check ---

#[tokio::test]
async fn missing_header_is_401() {
    let app = app();
    let (status, body) = app.call(Method::DELETE, "/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "empty header");
}

#[tokio::test]
async fn malformed_headers_are_401() {
    let app = app();
    let id = app.register("neo", Role::Regular).await;
    let token = app.token(id);

    for value in [
        format!("Token {token}"),
        format!("Bearer {token} extra"),
        format!("bearer {token}"),
        token.clone(),
    ] {
        let (status, body) = app.call(Method::DELETE, "/users", Some(&value)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{value}");
        assert_eq!(body, "invalid auth header");
    }

    let (status, body) = app.call(Method::DELETE, "/users", Some("Bearer ")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "token is empty");
}

#[tokio::test]
async fn foreign_and_expired_tokens_are_401() {
    let app = app();
    let id = app.register("neo", Role::Regular).await;

    let foreign = signed(&claims(id, 3600), Algorithm::HS256, "someone-else");
    let (status, _) = app
        .call(Method::DELETE, "/users", Some(&format!("Bearer {foreign}")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let secret = app.state.config.jwt_secret.clone();
    let expired = signed(&claims(id, -3600), Algorithm::HS256, &secret);
    let (status, _) = app
        .call(Method::DELETE, "/users", Some(&format!("Bearer {expired}")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(app.repo.user_by_login("neo").is_some());
}

#[tokio::test]
async fn any_hmac_algorithm_is_accepted() {
    let app = app();
    let id = app.register("neo", Role::Regular).await;
    let secret = app.state.config.jwt_secret.clone();
    let token = signed(&claims(id, 3600), Algorithm::HS384, &secret);

    let (status, body) = app
        .call(Method::DELETE, "/users", Some(&format!("Bearer {token}")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "\"user successfully deleted\"");
}

#[tokio::test]
async fn tokens_outside_the_hmac_family_are_401() {
    let app = app();
    let id = app.register("neo", Role::Regular).await;
    assert_eq!(id, 1);

    // Header segments announce `none` and `RS256`; the payload carries
    // user_id 1 and an expiry in 2100.
    let claims = "eyJ1c2VyX2lkIjoxLCJpYXQiOjE3MDAwMDAwMDAsImV4cCI6NDEwMjQ0NDgwMH0";
    let genuine = app.token(id);
    let signature = genuine.rsplit('.').next().unwrap();
    let unsigned = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{claims}.");
    let rs256 = format!("eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.{claims}.{signature}");

    for token in [unsigned, rs256] {
        let (status, _) = app
            .call(Method::DELETE, "/users", Some(&format!("Bearer {token}")))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{token}");
    }
    assert!(app.repo.user_by_login("neo").is_some());
}

// --- Role Check ---

#[tokio::test]
async fn admin_routes_lock_out_regular_users() {
    let app = app();
    let id = app.register("neo", Role::Regular).await;
    let bearer = format!("Bearer {}", app.token(id));

    for (method, uri) in [
        (Method::POST, "/actors"),
        (Method::PUT, "/actors?id=1"),
        (Method::DELETE, "/actors?id=1"),
        (Method::POST, "/films"),
        (Method::PUT, "/films?id=1"),
        (Method::DELETE, "/films?id=1"),
    ] {
        let (status, body) = app.call(method.clone(), uri, Some(&bearer)).await;
        assert_eq!(status, StatusCode::LOCKED, "{method} {uri}");
        assert_eq!(body, "this function locked for current user");
    }
}

#[tokio::test]
async fn admin_routes_need_a_token_first() {
    let app = app();
    let (status, _) = app.call(Method::DELETE, "/films?id=1", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_passes_the_guard() {
    let app = app();
    let id = app.register("root", Role::Admin).await;
    let bearer = format!("Bearer {}", app.token(id));

    // The guard lets the request through; the handler then reports the
    // missing id.
    let (status, body) = app.call(Method::DELETE, "/films", Some(&bearer)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "id doesnt specified to delete film");
}

#[tokio::test]
async fn token_of_a_deleted_user_fails_the_role_lookup() {
    let app = app();
    let id = app.register("root", Role::Admin).await;
    let bearer = format!("Bearer {}", app.token(id));
    app.state.services.users.delete_user(id).await.unwrap();

    let (status, _) = app.call(Method::DELETE, "/films?id=1", Some(&bearer)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn public_routes_ignore_the_header() {
    let app = app();
    let (status, body) = app
        .call(Method::GET, "/films/list?page=1", Some("garbage"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "page out of bounds");
}
