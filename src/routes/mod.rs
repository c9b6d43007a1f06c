/// Router Module Index
///
/// The route table is split by the guard each route runs behind, so the
/// access class of an endpoint is decided in exactly one place.
use crate::{AppState, router::Dispatcher};

/// Routes open to anonymous clients: reads, registration and login.
pub mod public;

/// Routes that need a valid bearer token.
pub mod authenticated;

/// Routes that need a bearer token of an admin user.
pub mod admin;

/// dispatcher
///
/// Builds the complete method/path table over `state`.
pub fn dispatcher(state: AppState) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(state);
    public::register(&mut dispatcher);
    authenticated::register(&mut dispatcher);
    admin::register(&mut dispatcher);
    dispatcher
}
