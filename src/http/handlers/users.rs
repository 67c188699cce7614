//! Account lifecycle: registration, activation, password reset.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::data::token::validate_plaintext;
use crate::data::{NewUser, PasswordDigest, Scope, User, MOVIES_READ};
use crate::error::GateError;
use crate::http::extract::ValidatedJson;
use crate::http::server::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 256, message = "must be provided and not more than 256 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 72, message = "must be between 8 and 72 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ActivateInput {
    #[validate(custom(function = "validate_plaintext"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordInput {
    #[validate(length(min = 8, max = 72, message = "must be between 8 and 72 characters"))]
    pub password: String,
    #[validate(custom(function = "validate_plaintext"))]
    pub token: String,
}

/// POST /v1/users
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<RegisterInput>,
) -> Result<(StatusCode, Json<Value>), GateError> {
    let password = PasswordDigest::from_plaintext(&input.password)?;
    let user = state
        .store_call(state.stores.users.insert_user(NewUser {
            email: input.email,
            name: input.name,
            password,
            activated: false,
        }))
        .await?;

    state
        .store_call(state.stores.permissions.add_for_user(user.id, &[MOVIES_READ]))
        .await?;

    let token = state
        .issuer
        .issue(Scope::Activation, user.id, state.issuer.ttl_for(Scope::Activation))
        .await?;
    state.deliveries.send(user.clone(), token);

    tracing::info!(user_id = user.id, "User registered");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "user": user,
            "message": "activation instructions will be sent to your email address",
        })),
    ))
}

/// PUT /v1/users/activated
pub async fn activate(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<ActivateInput>,
) -> Result<Json<Value>, GateError> {
    let mut user = user_for_token(&state, Scope::Activation, &input.token)
        .await?
        .ok_or_else(|| GateError::invalid_field("token", "invalid or expired activation token"))?;

    user.activated = true;
    state.guard.update(state.stores.users.as_ref(), &mut user).await?;
    state.issuer.revoke_all(Scope::Activation, user.id).await?;

    tracing::info!(user_id = user.id, "User activated");
    Ok(Json(json!({ "user": user })))
}

/// PUT /v1/users/password
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<ResetPasswordInput>,
) -> Result<Json<Value>, GateError> {
    let mut user = user_for_token(&state, Scope::PasswordReset, &input.token)
        .await?
        .ok_or_else(|| {
            GateError::invalid_field("token", "invalid or expired password reset token")
        })?;
    if !user.activated {
        return Err(GateError::invalid_field("email", "user account must be activated"));
    }

    user.password = PasswordDigest::from_plaintext(&input.password)?;
    state.guard.update(state.stores.users.as_ref(), &mut user).await?;
    state.issuer.revoke_all(Scope::PasswordReset, user.id).await?;

    tracing::info!(user_id = user.id, "Password reset");
    Ok(Json(json!({ "message": "your password was successfully reset" })))
}

/// Owner of an active token in `scope`. `None` if the token does not resolve
/// or its owner is gone.
async fn user_for_token(
    state: &AppState,
    scope: Scope,
    plaintext: &str,
) -> Result<Option<User>, GateError> {
    let Some(record) = state.issuer.find(scope, plaintext).await? else {
        return Ok(None);
    };
    match state.store_call(state.stores.users.get_user(record.user_id)).await {
        Ok(user) => Ok(Some(user)),
        Err(GateError::NotFound) => Ok(None),
        Err(other) => Err(other),
    }
}

pub(crate) async fn user_by_email(state: &AppState, email: &str) -> Result<Option<User>, GateError> {
    match state.store_call(state.stores.users.get_user_by_email(email)).await {
        Ok(user) => Ok(Some(user)),
        Err(GateError::NotFound) => Ok(None),
        Err(other) => Err(other),
    }
}
