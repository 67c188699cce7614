//! Token issuance endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::data::Scope;
use crate::error::GateError;
use crate::http::extract::ValidatedJson;
use crate::http::handlers::users::user_by_email;
use crate::http::server::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CredentialsInput {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 72, message = "must be between 8 and 72 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EmailInput {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

/// POST /v1/tokens/authentication
pub async fn create_authentication_token(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CredentialsInput>,
) -> Result<(StatusCode, Json<Value>), GateError> {
    let user = user_by_email(&state, &input.email)
        .await?
        .ok_or(GateError::InvalidCredentials)?;
    if !user.password.matches(&input.password)? {
        return Err(GateError::InvalidCredentials);
    }

    let token = state
        .issuer
        .issue(
            Scope::Authentication,
            user.id,
            state.issuer.ttl_for(Scope::Authentication),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}

/// POST /v1/tokens/activation
pub async fn create_activation_token(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<EmailInput>,
) -> Result<(StatusCode, Json<Value>), GateError> {
    let user = user_by_email(&state, &input.email)
        .await?
        .ok_or(GateError::NotFound)?;
    if user.activated {
        return Err(GateError::invalid_field(
            "email",
            "user has already been activated",
        ));
    }

    let token = state
        .issuer
        .issue(Scope::Activation, user.id, state.issuer.ttl_for(Scope::Activation))
        .await?;
    state.deliveries.send(user, token);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "activation instructions will be sent to your email address" })),
    ))
}

/// POST /v1/tokens/password-reset
pub async fn create_password_reset_token(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<EmailInput>,
) -> Result<(StatusCode, Json<Value>), GateError> {
    let user = user_by_email(&state, &input.email)
        .await?
        .ok_or_else(|| GateError::invalid_field("email", "no matching email address found"))?;
    if !user.activated {
        return Err(GateError::invalid_field(
            "email",
            "user account must be activated",
        ));
    }

    let token = state
        .issuer
        .issue(
            Scope::PasswordReset,
            user.id,
            state.issuer.ttl_for(Scope::PasswordReset),
        )
        .await?;
    state.deliveries.send(user, token);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "password reset instructions will be sent to your email address" })),
    ))
}
