// ==============================================================================
// extract.rs - Validated Request Bodies
// ==============================================================================
// Description: JSON body extractor that runs `validator` rules and maps every
//              rejection to a ValidationError
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;

/// `Json<T>` that also enforces `T: Validate`
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            debug!("Rejected request body: {}", rejection.body_text());
            ApiError::Validation("invalid input".to_string())
        })?;

        value
            .validate()
            .map_err(|errors| ApiError::Validation(describe(&errors)))?;

        Ok(Self(value))
    }
}

/// Flatten field errors into one short message, ordered by field name
fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let messages: Vec<String> = fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect();

    if messages.is_empty() {
        "invalid input".to_string()
    } else {
        messages.join("; ")
    }
}
