use tracing::info;

use super::{id_param, non_empty_page, non_empty_search, page_param};
use crate::{
    AppState,
    error::ApiResult,
    models::{ActorSearch, ActorUpdate, NewActor},
    router::{ApiRequest, ApiResponse},
    validation::decode,
};

/// create_actor
///
/// [Admin Route] POST /actors.
pub async fn create_actor(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let user_id = request.user_id()?;
    let actor: NewActor = decode(&request.body)?;
    let id = state.services.actors.create_actor(&actor).await?;

    info!(actor_id = id, user_id, "actor created");
    Ok(ApiResponse::message(format!("successfully create actor with id {id}")))
}

/// update_actor
///
/// [Admin Route] PUT /actors?id=. Only the fields present in the body change.
pub async fn update_actor(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let user_id = request.user_id()?;
    let id = id_param(&request, "no id specified for update actor")?;
    let update: ActorUpdate = decode(&request.body)?;
    state.services.actors.update_actor(id, &update).await?;

    info!(actor_id = id, user_id, "actor updated");
    Ok(ApiResponse::message("successfully update"))
}

/// delete_actor
///
/// [Admin Route] DELETE /actors?id=.
pub async fn delete_actor(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let user_id = request.user_id()?;
    let id = id_param(&request, "id doesnt specified to delete actor")?;
    state.services.actors.delete_actor(id).await?;

    info!(actor_id = id, user_id, "actor deleted");
    Ok(ApiResponse::message("successful delete"))
}

pub async fn get_actor_by_id(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let id = id_param(&request, "id not selected")?;
    let actor = state.services.actors.get_actor(id).await?;
    ApiResponse::json(&actor)
}

pub async fn get_actors_list(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let page = page_param(&request, "page not selected")?;
    let actors = state.services.actors.get_actors_list(page).await?;
    ApiResponse::json(&non_empty_page(actors)?)
}

/// search_actor
///
/// [Public Route] GET /actors/search?page=. The body is an actor search
/// fragment; matching is by substring.
pub async fn search_actor(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let page = page_param(&request, "page not selected")?;
    let search: ActorSearch = decode(&request.body)?;
    let actors = state.services.actors.search_actor(&search, page).await?;
    ApiResponse::json(&non_empty_search(actors)?)
}
