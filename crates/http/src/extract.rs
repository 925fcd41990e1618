//! Request extractors that reject with [`AppError`] instead of Axum's plain-text rejections.

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use shelf_db::DocumentId;
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, Result};

/// JSON body that has been deserialized and passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::validation(
                    vec![json!({ "error": rejection.body_text() })],
                    "Request body is not valid JSON for this operation",
                )
            })?;

        value.validate().map_err(validation_failed)?;
        Ok(Self(value))
    }
}

/// Convert `validator` failures into a 400 with one detail entry per field error.
pub fn validation_failed(errors: ValidationErrors) -> AppError {
    let mut details: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter()
                .map(move |e| (field.to_string(), e.code.to_string()))
        })
        .collect();
    details.sort();

    let message = match details.first() {
        Some((field, _)) if details.len() == 1 => format!("Invalid value for '{}'", field),
        _ => "Request validation failed".to_string(),
    };

    AppError::validation(
        details
            .into_iter()
            .map(|(field, error)| json!({ "field": field, "error": error }))
            .collect(),
        message,
    )
}

/// Parse an identifier taken from the URL path.
pub fn parse_id(raw: &str, what: &str) -> Result<DocumentId> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid {} id", what)))
}
