//! JSON extractor whose rejections use the API error body

use axum::{
    extract::{rejection::JsonRejection, FromRequest, OptionalFromRequest, Request},
    http::header,
    response::{IntoResponse, Response},
    Json as AxumJson,
};
use serde::{de::DeserializeOwned, Serialize};

use super::error::{ApiError, ApiErrorType};

/// `axum::Json` with rejections rendered as [`ApiError`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match <AxumJson<T> as FromRequest<S>>::from_request(req, state).await {
            Ok(AxumJson(value)) => Ok(Json(value)),
            Err(rejection) => Err(ApiError::new(
                rejection.status(),
                ApiErrorType::InvalidRequestError,
                rejection_message(&rejection),
            )),
        }
    }
}

/// A request without a `Content-Type` header carries no body; any other
/// request must hold valid JSON.
impl<S, T> OptionalFromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            return Ok(None);
        }

        <Self as FromRequest<S>>::from_request(req, state)
            .await
            .map(Some)
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err.body_text()),
        JsonRejection::JsonSyntaxError(err) => {
            format!("Invalid JSON syntax: {}", err.body_text())
        }
        JsonRejection::MissingJsonContentType(_) => {
            "Missing Content-Type header. Expected 'application/json'.".to_string()
        }
        JsonRejection::BytesRejection(err) => {
            format!("Failed to read request body: {}", err.body_text())
        }
        _ => "Invalid JSON request".to_string(),
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        AxumJson(self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct CreateBody {
        name: String,
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let Json(body) = <Json<CreateBody> as FromRequest<()>>::from_request(
            request(Some("application/json"), r#"{"name":"lab"}"#),
            &(),
        )
        .await
        .unwrap();

        assert_eq!(body.name, "lab");
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let err = <Json<CreateBody> as FromRequest<()>>::from_request(
            request(None, r#"{"name":"lab"}"#),
            &(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(err.response.error.message.contains("Content-Type"));
    }

    #[tokio::test]
    async fn test_optional_body() {
        let absent =
            <Json<CreateBody> as OptionalFromRequest<()>>::from_request(request(None, ""), &())
                .await
                .unwrap();
        assert!(absent.is_none());

        let present = <Json<CreateBody> as OptionalFromRequest<()>>::from_request(
            request(Some("application/json"), r#"{"name":"lab"}"#),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(present.map(|Json(body)| body.name), Some("lab".to_string()));

        let invalid = <Json<CreateBody> as OptionalFromRequest<()>>::from_request(
            request(Some("application/json"), "{"),
            &(),
        )
        .await;
        assert!(invalid.is_err());
    }

    #[tokio::test]
    async fn test_missing_field() {
        let err = <Json<CreateBody> as FromRequest<()>>::from_request(
            request(Some("application/json"), "{}"),
            &(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.response.error.error_type, ApiErrorType::InvalidRequestError);
    }
}
