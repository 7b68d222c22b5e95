use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use fellowship_db::models::NewUser;
use fellowship_types::api::{AuthResponse, LoginRequest, RegisterRequest};
use fellowship_types::models::{Role, User, UserStatus};

use crate::error::{ApiError, ApiResult};
use crate::extract::ValidJson;
use crate::middleware::{CurrentUser, create_token};
use crate::notify;
use crate::state::{AppState, blocking};
use crate::views;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("stored hash is invalid: {}", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_string();
    let password_hash = hash_password(&req.password)?;

    let user = blocking(&state, {
        let email = email.clone();
        let name = name.clone();
        move |db| {
            db.create_user(&NewUser {
                id: Uuid::new_v4(),
                email: &email,
                name: &name,
                password_hash: &password_hash,
            })
        }
    })
    .await?
    .ok_or_else(|| ApiError::bad_request("Email is already registered"))?;

    info!("New member registered: {}", user.email);
    if user.role != Role::Admin {
        notify::alert_admins(
            &state,
            format!("New member: {}", name),
            format!("{} <{}> just joined the fellowship.", name, email),
        );
    }

    let token = create_token(&state.jwt_secret, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: views::user(&state.storage, user),
            token,
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();
    let user = blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::Unauthorized);
    }
    if user.status == UserStatus::Suspended {
        return Err(ApiError::Forbidden("Account is suspended"));
    }

    let token = create_token(&state.jwt_secret, &user)?;
    Ok(Json(AuthResponse {
        user: views::user(&state.storage, user),
        token,
    }))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, Extension(me): Extension<CurrentUser>) -> ApiResult<Json<User>> {
    let id = me.id;
    let user = blocking(&state, move |db| db.get_user(id))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(views::user(&state.storage, user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }
}
