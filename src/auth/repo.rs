use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Full user row. Never serialized directly; responses go through DTOs.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub token: Option<String>,
    pub is_verified: bool,
    pub verify_otp: Option<String>,
    pub verify_otp_expires_at: Option<OffsetDateTime>,
    pub reset_otp: Option<String>,
    pub reset_otp_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Postgres unique_violation. Raised by the users.email constraint when two
/// registrations race past the exists check.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

const USER_COLUMNS: &str = r#"
    id, name, email, password_hash, token,
    is_verified, verify_otp, verify_otp_expires_at,
    reset_otp, reset_otp_expires_at, created_at, updated_at
"#;

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    /// Session lookup: both the id from the claims and the cookie value must
    /// match the row. A replaced or cleared token fails here.
    pub async fn find_by_session(
        db: &PgPool,
        id: Uuid,
        token: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND token = $2"
        ))
        .bind(id)
        .bind(token)
        .fetch_optional(db)
        .await
        .context("find user by session")?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
        .context("create user")?;
        Ok(user)
    }

    pub async fn store_token(db: &PgPool, id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET token = $1, updated_at = now() WHERE id = $2")
            .bind(token)
            .bind(id)
            .execute(db)
            .await
            .context("store session token")?;
        Ok(())
    }

    pub async fn clear_token(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET token = NULL, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("clear session token")?;
        Ok(())
    }

    pub async fn set_verify_otp(
        db: &PgPool,
        id: Uuid,
        otp: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET verify_otp = $1,
                   verify_otp_expires_at = $2,
                   updated_at = now()
             WHERE id = $3
            "#,
        )
        .bind(otp)
        .bind(expires_at)
        .bind(id)
        .execute(db)
        .await
        .context("set verify otp")?;
        Ok(())
    }

    /// Flip the verified flag and consume the OTP in one statement, so the
    /// code cannot be replayed after a successful verification.
    pub async fn mark_verified(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET is_verified = TRUE,
                   verify_otp = NULL,
                   verify_otp_expires_at = NULL,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await
        .context("mark user verified")?;
        Ok(())
    }

    pub async fn set_reset_otp(
        db: &PgPool,
        id: Uuid,
        otp: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_otp = $1,
                   reset_otp_expires_at = $2,
                   updated_at = now()
             WHERE id = $3
            "#,
        )
        .bind(otp)
        .bind(expires_at)
        .bind(id)
        .execute(db)
        .await
        .context("set reset otp")?;
        Ok(())
    }

    /// Replace the password hash and consume the reset OTP.
    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $1,
                   reset_otp = NULL,
                   reset_otp_expires_at = NULL,
                   updated_at = now()
             WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(db)
        .await
        .context("update password")?;
        Ok(())
    }
}
