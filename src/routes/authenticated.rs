use axum::http::Method;

use crate::{
    handlers::users,
    router::{Dispatcher, Guard},
};

/// Authenticated Routes
///
/// Account management. The identity check attaches the caller's user id,
/// which `DELETE /users` acts on.
pub fn register(dispatcher: &mut Dispatcher) {
    dispatcher.add_endpoint(Method::PUT, "/users", Guard::Identity, users::update_user);
    dispatcher.add_endpoint(Method::DELETE, "/users", Guard::Identity, users::delete_user);
}
