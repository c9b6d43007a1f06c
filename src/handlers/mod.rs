//! Request handlers.
//!
//! Every handler has the shape `async fn(AppState, ApiRequest) ->
//! ApiResult<ApiResponse>`: read the query, decode the body, call one
//! service operation, and answer with a JSON value or a JSON message string.

use crate::{
    error::{ApiError, ApiResult},
    router::ApiRequest,
};

pub mod actors;
pub mod films;
pub mod users;

/// One-based `?page=`. `missing` is the message for an absent or
/// non-numeric value.
pub(crate) fn page_param(request: &ApiRequest, missing: &str) -> ApiResult<i64> {
    let page: i64 = request
        .query_param("page")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ApiError::bad_request(missing))?;
    if page < 1 {
        return Err(ApiError::bad_request("page out of bounds"));
    }
    Ok(page)
}

/// Positive `?id=`. `missing` is the message for an absent or non-numeric
/// value.
pub(crate) fn id_param(request: &ApiRequest, missing: &str) -> ApiResult<i32> {
    let id: i32 = request
        .query_param("id")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ApiError::bad_request(missing))?;
    if id < 1 {
        return Err(ApiError::bad_request("id out of bounds"));
    }
    Ok(id)
}

/// A listing page past the last row.
pub(crate) fn non_empty_page<T>(rows: Vec<T>) -> ApiResult<Vec<T>> {
    if rows.is_empty() {
        Err(ApiError::bad_request("page out of bounds"))
    } else {
        Ok(rows)
    }
}

/// A search with no match.
pub(crate) fn non_empty_search<T>(rows: Vec<T>) -> ApiResult<Vec<T>> {
    if rows.is_empty() {
        Err(ApiError::bad_request("nothing found"))
    } else {
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Bytes,
        http::{HeaderMap, Method, Uri},
    };

    fn request(uri: &str) -> ApiRequest {
        let uri: Uri = uri.parse().unwrap();
        ApiRequest::new(Method::GET, &uri, HeaderMap::new(), Bytes::new())
    }

    #[test]
    fn page_must_be_a_positive_number() {
        assert_eq!(page_param(&request("/a?page=3"), "page not selected").unwrap(), 3);

        let err = page_param(&request("/a"), "page not selected").unwrap_err();
        assert_eq!(err.to_string(), "page not selected");

        let err = page_param(&request("/a?page=x"), "page not selected").unwrap_err();
        assert_eq!(err.to_string(), "page not selected");

        let err = page_param(&request("/a?page=0"), "page not selected").unwrap_err();
        assert_eq!(err.to_string(), "page out of bounds");
    }

    #[test]
    fn id_must_be_a_positive_number() {
        assert_eq!(id_param(&request("/a?id=7"), "id not selected").unwrap(), 7);
        assert_eq!(
            id_param(&request("/a?id=-1"), "id not selected").unwrap_err().to_string(),
            "id out of bounds"
        );
    }

    #[test]
    fn empty_results_are_bad_requests() {
        assert_eq!(
            non_empty_page(Vec::<i32>::new()).unwrap_err().to_string(),
            "page out of bounds"
        );
        assert_eq!(
            non_empty_search(Vec::<i32>::new()).unwrap_err().to_string(),
            "nothing found"
        );
        assert_eq!(non_empty_page(vec![1]).unwrap(), vec![1]);
    }
}
