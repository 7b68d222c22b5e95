use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fellowship_db::models::UserRow;
use fellowship_types::models::{Role, UserStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

const TOKEN_LIFETIME_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

/// The signed-in user, loaded fresh from the database on every request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }

    /// Owners and admins may edit or delete a row.
    pub fn can_modify(&self, owner: Uuid) -> bool {
        self.id == owner || self.is_admin()
    }
}

impl From<&UserRow> for CurrentUser {
    fn from(row: &UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email.clone(),
            name: row.name.clone(),
            role: row.role,
        }
    }
}

pub fn create_token(secret: &str, user: &UserRow) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Validates the bearer token and stores the caller as [`CurrentUser`] in
/// request extensions. Role and status come from the database so that
/// demotions and suspensions apply immediately.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;
    let claims = decode_token(&state.jwt_secret, bearer.token()).ok_or(ApiError::Unauthorized)?;

    let user_id = claims.sub;
    let user = blocking(&state, move |db| db.get_user(user_id))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if user.status == UserStatus::Suspended {
        return Err(ApiError::Forbidden("Account is suspended"));
    }

    req.extensions_mut().insert(CurrentUser::from(&user));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: Role) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "deacon@example.org".into(),
            name: "Deacon".into(),
            password: String::new(),
            role,
            status: UserStatus::Active,
            profile_image_key: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn token_round_trip() {
        let user = row(Role::Member);
        let token = create_token("secret", &user).unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Member);
        assert!(decode_token("other-secret", &token).is_none());
    }

    #[test]
    fn owners_and_admins_can_modify() {
        let member = CurrentUser::from(&row(Role::Member));
        let admin = CurrentUser::from(&row(Role::Admin));
        let someone_else = Uuid::new_v4();

        assert!(member.can_modify(member.id));
        assert!(!member.can_modify(someone_else));
        assert!(admin.can_modify(someone_else));
        assert!(member.require_admin().is_err());
    }
}
