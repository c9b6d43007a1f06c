use axum::http::Method;

use crate::{
    handlers::{actors, films},
    router::{Dispatcher, Guard},
};

/// Admin Routes
///
/// Every actor and film mutation. The guard authenticates the caller and then
/// requires the admin role, answering 423 for anyone else.
pub fn register(dispatcher: &mut Dispatcher) {
    dispatcher.add_endpoint(Method::POST, "/actors", Guard::Admin, actors::create_actor);
    // PUT/DELETE /actors?id=
    dispatcher.add_endpoint(Method::PUT, "/actors", Guard::Admin, actors::update_actor);
    dispatcher.add_endpoint(Method::DELETE, "/actors", Guard::Admin, actors::delete_actor);

    dispatcher.add_endpoint(Method::POST, "/films", Guard::Admin, films::create_film);
    // PUT/DELETE /films?id=
    dispatcher.add_endpoint(Method::PUT, "/films", Guard::Admin, films::update_film);
    dispatcher.add_endpoint(Method::DELETE, "/films", Guard::Admin, films::delete_film);
}
