use async_trait::async_trait;
use common_auth::{AuthError, AuthResult, DirectoryUser, Role, UserDirectory};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    enabled: bool,
}

/// User directory backed by the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a user with an already-hashed password.
    pub async fn insert(&self, user: &DirectoryUser) -> AuthResult<()> {
        let roles = user
            .roles
            .iter()
            .map(|role| role.as_str().to_string())
            .collect::<Vec<_>>();

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, roles, enabled) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(roles)
        .bind(user.enabled)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| AuthError::DirectoryUnavailable(err.to_string()))
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn lookup_by_email(&self, email: &str) -> AuthResult<Option<DirectoryUser>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, roles, enabled FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| AuthError::DirectoryUnavailable(err.to_string()))?;

        row.map(|row| {
            Ok(DirectoryUser {
                id: row.id,
                email: row.email,
                password_hash: row.password_hash,
                roles: Role::parse_many(&row.roles)?,
                enabled: row.enabled,
            })
        })
        .transpose()
    }
}
