use actix_web::{
    HttpRequest, HttpResponse, ResponseError,
    error::{JsonPayloadError, QueryPayloadError},
    http::StatusCode,
};
use derive_more::Display;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";
pub const REQUIRED_FIELD: &str = "This field is required.";

/// Field name -> messages. Serialises as a bare JSON object, which is the
/// body of every 400 response.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl FieldErrors {
    /// Keys a serde failure by the missing field when serde names one, and
    /// under `non_field_errors` otherwise. Position suffixes are dropped.
    pub fn from_deserialize(message: &str) -> Self {
        let message = message
            .split_once(" at line ")
            .map_or(message, |(head, _)| head);

        match message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.strip_suffix('`'))
        {
            Some(field) => Self::single(field, REQUIRED_FIELD),
            None => Self::single(NON_FIELD_ERRORS, message),
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "validation failed: {}", _0)]
    Validation(FieldErrors),

    #[display(fmt = "unauthorized: {}", _0)]
    Unauthorized(String),

    #[display(fmt = "forbidden: {}", _0)]
    Forbidden(String),

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),

    #[display(fmt = "internal error: {}", _0)]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::single(field, message))
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::Validation(errors) => HttpResponse::build(status).json(errors),
            ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                HttpResponse::build(status).json(json!({ "detail": msg }))
            }
            ApiError::NotFound(entity) => {
                HttpResponse::build(status).json(json!({ "detail": format!("{entity} not found.") }))
            }
            ApiError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                HttpResponse::build(status).json(json!({ "detail": "Internal server error" }))
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                HttpResponse::build(status).json(json!({ "detail": "Internal server error" }))
            }
        }
    }
}

/// `JsonConfig` error handler: undecodable bodies become field errors.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        JsonPayloadError::Deserialize(e) => {
            ApiError::Validation(FieldErrors::from_deserialize(&e.to_string())).into()
        }
        other => other.into(),
    }
}

/// `QueryConfig` error handler, same shape as the JSON one.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        QueryPayloadError::Deserialize(e) => {
            ApiError::Validation(FieldErrors::from_deserialize(&e.to_string())).into()
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn validation_errors_render_as_field_map() {
        let mut errors = FieldErrors::new();
        errors.add("start_date", "Leave dates cannot be in the past.");
        errors.add("end_date", "Leave dates cannot be in the past.");

        let resp = ApiError::Validation(errors).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["start_date"][0], "Leave dates cannot be in the past.");
        assert_eq!(json["end_date"][0], "Leave dates cannot be in the past.");
    }

    #[actix_web::test]
    async fn database_errors_do_not_leak_details() {
        let resp = ApiError::Database(sqlx::Error::PoolTimedOut).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Internal server error");
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
        assert!(FieldErrors::single("reason", "This field may not be blank.")
            .into_result()
            .is_err());
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(ApiError::NotFound("Leave request").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_field_is_keyed_by_name() {
        let errors = FieldErrors::from_deserialize("missing field `reason` at line 1 column 80");
        assert_eq!(errors.get("reason").unwrap(), [REQUIRED_FIELD]);
    }

    #[test]
    fn other_decode_failures_are_non_field_errors() {
        let errors = FieldErrors::from_deserialize(
            "unknown variant `annual`, expected one of `casual`, `sick`, `other` at line 1 column 24",
        );
        assert_eq!(
            errors.get(NON_FIELD_ERRORS).unwrap(),
            ["unknown variant `annual`, expected one of `casual`, `sick`, `other`"]
        );
    }

    #[actix_web::test]
    async fn json_decode_errors_render_as_field_map() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let req = actix_web::test::TestRequest::default().to_http_request();
        let resp = json_error_handler(JsonPayloadError::Deserialize(serde_err), &req).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json[NON_FIELD_ERRORS][0].is_string());
    }
}
