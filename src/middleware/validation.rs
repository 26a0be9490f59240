// src/middleware/validation.rs

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    middleware::i18n::Locale,
};

/// Desserializa o JSON (campos desconhecidos rejeitados pelo serde) e roda o `validator`.
/// Qualquer falha vira 400 com o campo problemático.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_headers(req.headers());

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::from(rejection).to_api_error(&locale))?;

        value
            .validate()
            .map_err(|errors| AppError::from(errors).to_api_error(&locale))?;

        Ok(ValidatedJson(value))
    }
}
