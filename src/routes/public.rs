use axum::http::Method;

use crate::{
    handlers::{actors, films, users},
    router::{Dispatcher, Guard},
};

/// Public Routes
///
/// Registration, login and every read. No guard runs before these handlers.
pub fn register(dispatcher: &mut Dispatcher) {
    // POST /users: register a new user.
    dispatcher.add_endpoint(Method::POST, "/users", Guard::Public, users::create_user);
    // GET /users: exchange login and password for a token.
    dispatcher.add_endpoint(Method::GET, "/users", Guard::Public, users::auth_user);

    // --- Actors ---
    // GET /actors?id=
    dispatcher.add_endpoint(Method::GET, "/actors", Guard::Public, actors::get_actor_by_id);
    // GET /actors/list?page=
    dispatcher.add_endpoint(Method::GET, "/actors/list", Guard::Public, actors::get_actors_list);
    // GET /actors/search?page= with a search fragment as the body.
    dispatcher.add_endpoint(Method::GET, "/actors/search", Guard::Public, actors::search_actor);

    // --- Films ---
    // GET /films?id=
    dispatcher.add_endpoint(Method::GET, "/films", Guard::Public, films::get_current_film);
    // GET /films/list?sort_by=&page=
    dispatcher.add_endpoint(Method::GET, "/films/list", Guard::Public, films::get_sorted_film_list);
    // GET /films/search?page= with a search fragment as the body.
    dispatcher.add_endpoint(Method::GET, "/films/search", Guard::Public, films::get_search_film_list);
}
