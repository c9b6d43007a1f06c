use axum::http::{HeaderMap, header};

use crate::{
    AppState,
    auth::AuthError,
    error::{ApiError, ApiResult},
    router::{ApiRequest, Guard},
    service::UserService,
};

/// authenticate
///
/// Identity check. Expects exactly `Authorization: Bearer <token>` and returns
/// the user id carried by a verified token.
pub fn authenticate(users: &UserService, headers: &HeaderMap) -> Result<i32, AuthError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;
    if header.is_empty() {
        return Err(AuthError::MissingHeader);
    }

    let parts: Vec<&str> = header.split(' ').collect();
    let [scheme, token] = parts.as_slice() else {
        return Err(AuthError::InvalidHeader);
    };
    if *scheme != "Bearer" {
        return Err(AuthError::InvalidHeader);
    }
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    users.parse_token(token)
}

/// authorize
///
/// Identity check followed by a role lookup. A regular user gets 423; a failed
/// lookup is a persistence error.
pub async fn authorize(users: &UserService, headers: &HeaderMap) -> ApiResult<i32> {
    let id = authenticate(users, headers)?;
    if users.validate_user(id).await? {
        Ok(id)
    } else {
        Err(ApiError::Locked)
    }
}

/// Runs the check `guard` names and attaches the resolved identity to the
/// request.
pub async fn guard(state: &AppState, guard: Guard, request: &mut ApiRequest) -> ApiResult<()> {
    let users = &state.services.users;
    request.user_id = match guard {
        Guard::Public => return Ok(()),
        Guard::Identity => Some(authenticate(users, &request.headers)?),
        Guard::Admin => Some(authorize(users, &request.headers).await?),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_token;
    use crate::config::AppConfig;
    use crate::models::{NewUser, Role};
    use crate::repository::MemoryRepository;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    fn users() -> (MemoryRepository, UserService) {
        let repo = MemoryRepository::new();
        let users = UserService::new(Arc::new(repo.clone()), &AppConfig::default());
        (repo, users)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn bearer(user_id: i32) -> HeaderMap {
        let token = generate_token(user_id, &AppConfig::default().jwt_secret).unwrap();
        headers(&format!("Bearer {token}"))
    }

    async fn register(users: &UserService, login: &str, role: Role) -> i32 {
        users
            .create_user(&NewUser {
                login: login.into(),
                password: "pw".into(),
                user_role: role,
            })
            .await
            .unwrap()
    }

    #[test]
    fn header_shape_is_checked_in_order() {
        let (_, users) = users();
        assert!(matches!(
            authenticate(&users, &HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            authenticate(&users, &headers("Token abc")),
            Err(AuthError::InvalidHeader)
        ));
        assert!(matches!(
            authenticate(&users, &headers("Bearer a b")),
            Err(AuthError::InvalidHeader)
        ));
        assert!(matches!(
            authenticate(&users, &headers("Bearer ")),
            Err(AuthError::EmptyToken)
        ));
        assert!(matches!(
            authenticate(&users, &headers("Bearer abc")),
            Err(AuthError::Token(_))
        ));
    }

    #[test]
    fn valid_token_yields_its_user() {
        let (_, users) = users();
        assert_eq!(authenticate(&users, &bearer(5)).unwrap(), 5);
    }

    #[tokio::test]
    async fn authorize_distinguishes_roles() {
        let (_, users) = users();
        let admin = register(&users, "admin", Role::Admin).await;
        let regular = register(&users, "regular", Role::Regular).await;

        assert_eq!(authorize(&users, &bearer(admin)).await.unwrap(), admin);

        let err = authorize(&users, &bearer(regular)).await.unwrap_err();
        assert!(matches!(err, ApiError::Locked));
        assert_eq!(err.status().as_u16(), 423);

        let err = authorize(&users, &HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.status().as_u16(), 401);
    }

    #[tokio::test]
    async fn failed_role_lookup_is_a_server_error() {
        let (repo, users) = users();
        let admin = register(&users, "admin", Role::Admin).await;
        repo.fail_on("user_role");

        let err = authorize(&users, &bearer(admin)).await.unwrap_err();
        assert_eq!(err.status().as_u16(), 500);
    }
}
