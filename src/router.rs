use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};
use tracing::{error, info};

use crate::{
    AppState,
    auth::AuthError,
    error::{ApiError, ApiResult},
    middleware,
};

/// ApiRequest
///
/// Everything a handler may look at. The path has its query string stripped;
/// the query parameters are kept in `query`. `user_id` is filled in by the
/// route's guard and is `None` on public routes.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub user_id: Option<i32>,
}

impl ApiRequest {
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        // An undecodable query string leaves every parameter unset.
        let query = Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|Query(query)| query)
            .unwrap_or_default();
        Self {
            method,
            path: uri.path().to_string(),
            query,
            headers,
            body,
            user_id: None,
        }
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Identity attached by the guard.
    pub fn user_id(&self) -> Result<i32, AuthError> {
        self.user_id.ok_or(AuthError::MissingIdentity)
    }
}

/// ResponseBody
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

/// ApiResponse
///
/// One status and at most one body per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// 200 with `value` serialized as JSON.
    pub fn json<T: Serialize>(value: &T) -> ApiResult<Self> {
        let value =
            serde_json::to_value(value).map_err(|err| ApiError::Internal(err.to_string()))?;
        Ok(Self {
            status: StatusCode::OK,
            body: ResponseBody::Json(value),
        })
    }

    /// 200 with a JSON string message, e.g. `"successfully update"`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Json(serde_json::Value::String(message.into())),
        }
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        Self {
            status: err.status(),
            body: ResponseBody::Text(err.to_string()),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self.body {
            ResponseBody::Json(value) => (self.status, Json(value)).into_response(),
            ResponseBody::Text(text) => (self.status, text).into_response(),
        }
    }
}

/// Guard
///
/// Authorization class of a route, checked before its handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// No check.
    Public,
    /// A valid bearer token.
    Identity,
    /// A valid bearer token whose user holds the admin role.
    Admin,
}

type HandlerFuture = Pin<Box<dyn Future<Output = ApiResult<ApiResponse>> + Send>>;
type BoxedHandler = Arc<dyn Fn(AppState, ApiRequest) -> HandlerFuture + Send + Sync>;

#[derive(Clone)]
struct Route {
    guard: Guard,
    handler: BoxedHandler,
}

/// Dispatcher
///
/// The method -> path -> route table. Built once at startup by
/// `routes::dispatcher`; `add_endpoint` can extend it afterwards.
#[derive(Clone)]
pub struct Dispatcher {
    state: AppState,
    routes: HashMap<Method, HashMap<String, Route>>,
}

impl Dispatcher {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            routes: HashMap::new(),
        }
    }

    /// Registers `handler` for `(method, path)`, replacing any previous one.
    pub fn add_endpoint<H, Fut>(&mut self, method: Method, path: &str, guard: Guard, handler: H)
    where
        H: Fn(AppState, ApiRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<ApiResponse>> + Send + 'static,
    {
        let handler: BoxedHandler = Arc::new(move |state, request| Box::pin(handler(state, request)));
        self.routes
            .entry(method)
            .or_default()
            .insert(path.to_string(), Route { guard, handler });
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Resolves the route, runs its guard, then its handler. Every failure is
    /// turned into its status and message here.
    pub async fn dispatch(&self, mut request: ApiRequest) -> ApiResponse {
        let method = request.method.clone();
        let path = request.path.clone();

        let result = async {
            let paths = self
                .routes
                .get(&method)
                .ok_or(ApiError::MethodNotAllowed)?;
            let route = paths
                .get(path.as_str())
                .ok_or_else(|| ApiError::RouteNotFound(path.clone()))?;

            middleware::guard(&self.state, route.guard, &mut request).await?;
            (route.handler)(self.state.clone(), request).await
        }
        .await;

        match result {
            Ok(response) => {
                info!(%method, %path, status = %response.status, "request handled");
                response
            }
            Err(err) => {
                let response = ApiResponse::from(err);
                error!(%method, %path, status = %response.status, body = ?response.body, "request failed");
                response
            }
        }
    }
}

/// serve
///
/// The only axum handler: every request, whatever its method and path, is
/// turned into an `ApiRequest` and handed to the dispatcher.
pub async fn serve(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResponse {
    dispatcher
        .dispatch(ApiRequest::new(method, &uri, headers, body))
        .await
}
