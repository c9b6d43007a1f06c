use tracing::info;

use crate::{
    AppState,
    error::ApiResult,
    models::{Credentials, NewUser, RoleUpdate},
    router::{ApiRequest, ApiResponse},
    validation::decode,
};

/// create_user
///
/// [Public Route] POST /users. Registers a user; the password is stored as
/// its salted hash.
pub async fn create_user(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let user: NewUser = decode(&request.body)?;
    let id = state.services.users.create_user(&user).await?;

    info!(user_id = id, "user registered");
    Ok(ApiResponse::message("successful"))
}

/// auth_user
///
/// [Public Route] GET /users. Answers a valid login and password with a
/// bearer token as a JSON string.
pub async fn auth_user(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let credentials: Credentials = decode(&request.body)?;
    let token = state.services.users.generate_token(&credentials).await?;

    info!(login = %credentials.login, "token issued");
    ApiResponse::json(&token)
}

/// update_user
///
/// [Authenticated Route] PUT /users. Sets the role of the user named in the
/// body.
pub async fn update_user(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let acting = request.user_id()?;
    let update: RoleUpdate = decode(&request.body)?;
    state.services.users.update_user(&update).await?;

    info!(user_id = acting, login = %update.login, role = %update.user_role, "user role updated");
    Ok(ApiResponse::message("successfully update user role"))
}

/// delete_user
///
/// [Authenticated Route] DELETE /users. Deletes the caller's own account.
pub async fn delete_user(state: AppState, request: ApiRequest) -> ApiResult<ApiResponse> {
    let id = request.user_id()?;
    state.services.users.delete_user(id).await?;

    info!(user_id = id, "user deleted");
    Ok(ApiResponse::message("user successfully deleted"))
}
