use tracing::info;

use super::{id_param, non_empty_page, non_empty_search, page_param};
use crate::{
    AppState,
    error::{ApiError, ApiResult},
    models::{FilmSearch, FilmUpdate, NewFilm, SortKey},
    router::{ApiRequest, ApiResponse},
    validation::decode,
};

/// create_film
///
/// [Admin Route] POST /films. The film and its cast links are written
/// together or not at all.
pub async fn create_film(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let user_id = request.user_id()?;
    let film: NewFilm = decode(&request.body)?;
    let id = state.services.films.create_film(&film).await?;

    info!(film_id = id, user_id, "film created");
    Ok(ApiResponse::message(format!("successfully create film with id {id}")))
}

/// update_film
///
/// [Admin Route] PUT /films?id=. A `cast` in the body replaces the whole cast.
pub async fn update_film(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let user_id = request.user_id()?;
    let id = id_param(&request, "no id specified to update film")?;
    let update: FilmUpdate = decode(&request.body)?;
    state.services.films.update_film(id, &update).await?;

    info!(film_id = id, user_id, "film updated");
    Ok(ApiResponse::message("successfully update"))
}

/// delete_film
///
/// [Admin Route] DELETE /films?id=.
pub async fn delete_film(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let user_id = request.user_id()?;
    let id = id_param(&request, "id doesnt specified to delete film")?;
    state.services.films.delete_film(id).await?;

    info!(film_id = id, user_id, "film deleted");
    Ok(ApiResponse::message("successfully delete"))
}

pub async fn get_current_film(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let id = id_param(&request, "id for get film not specified")?;
    let film = state.services.films.get_cur_film(id).await?;
    ApiResponse::json(&film)
}

/// get_sorted_film_list
///
/// [Public Route] GET /films/list?sort_by=&page=. Descending by the sort key,
/// `rating` when none is given.
pub async fn get_sorted_film_list(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let sort = match request.query_param("sort_by") {
        None | Some("") => SortKey::default(),
        Some(raw) => SortKey::parse(raw)
            .ok_or_else(|| ApiError::bad_request("invalid parameter to sort films list"))?,
    };
    let page = page_param(&request, "no page specified for sorted list")?;
    let films = state.services.films.get_sorted_film_list(sort, page).await?;
    ApiResponse::json(&non_empty_page(films)?)
}

pub async fn get_search_film_list(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let page = page_param(&request, "no page specified for search list")?;
    let search: FilmSearch = decode(&request.body)?;
    let films = state
        .services
        .films
        .get_search_film_list(&search, page)
        .await?
        .ok_or_else(|| ApiError::bad_request("parameters for search not specified"))?;
    ApiResponse::json(&non_empty_search(films)?)
}
