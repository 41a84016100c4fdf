//! Database helpers for nonces, accounts and sessions.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::net::IpAddr;
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{generate_session_token, hash_token, is_unique_violation};

/// Request metadata recorded when a nonce is minted, for audit only.
#[derive(Debug)]
pub(super) struct NonceMetadata {
    pub(super) ip_address: Option<IpAddr>,
    pub(super) user_agent: Option<String>,
}

/// Minimal data returned for a valid session cookie.
#[derive(Debug)]
pub(super) struct SessionRecord {
    pub(super) user_id: Uuid,
    pub(super) address: String,
    pub(super) expires_at: DateTime<Utc>,
}

pub(super) async fn insert_nonce(
    pool: &PgPool,
    nonce_hash: &[u8],
    ttl_seconds: i64,
    metadata: &NonceMetadata,
) -> Result<()> {
    let query = r"
        INSERT INTO auth_nonces (nonce_hash, ip_address, user_agent, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(nonce_hash)
        .bind(metadata.ip_address)
        .bind(metadata.user_agent.as_deref())
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert nonce")?;
    Ok(())
}

/// Consume a stored nonce: flips `consumed_at` exactly once while the row is
/// still live. Returns false when the nonce is unknown, expired, or already
/// consumed — the caller must deny in all three cases.
pub(super) async fn consume_nonce(pool: &PgPool, nonce_hash: &[u8]) -> Result<bool> {
    let query = r"
        UPDATE auth_nonces
        SET consumed_at = NOW()
        WHERE nonce_hash = $1
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(nonce_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume nonce")?;
    Ok(row.is_some())
}

async fn lookup_user_id(pool: &PgPool, address: &str) -> Result<Option<Uuid>> {
    let query = "SELECT id FROM users WHERE address = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(address)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by address")?;
    Ok(row.map(|row| row.get("id")))
}

/// Map a verified wallet address to its account id, creating user + linked
/// provider account in one transaction on first sign-in. Existing records
/// are never mutated.
pub(super) async fn find_or_create_account(pool: &PgPool, address: &str) -> Result<Uuid> {
    if let Some(user_id) = lookup_user_id(pool, address).await? {
        return Ok(user_id);
    }

    let mut tx = pool.begin().await.context("begin account transaction")?;

    let user_id = Uuid::now_v7();
    let query = "INSERT INTO users (id, address) VALUES ($1, $2)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(user_id)
        .bind(address)
        .execute(&mut *tx)
        .instrument(span)
        .await;

    if let Err(err) = inserted {
        if is_unique_violation(&err) {
            // Lost a race with a concurrent first sign-in for the same wallet.
            let _ = tx.rollback().await;
            return lookup_user_id(pool, address)
                .await?
                .ok_or_else(|| anyhow!("user vanished after unique violation"));
        }
        return Err(err).context("failed to insert user");
    }

    let query = "INSERT INTO accounts (user_id, provider, provider_account_id) VALUES ($1, $2, $3)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind("ethereum")
        .bind(address)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert provider account")?;

    tx.commit().await.context("commit account transaction")?;

    Ok(user_id)
}

pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    // Generate a random token, store only its hash, and return the raw value
    // so the caller can set the session cookie.
    let query = r"
        INSERT INTO user_sessions (user_id, session_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(super) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    // Only accept unexpired sessions.
    let query = r"
        SELECT users.id, users.address, user_sessions.expires_at
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    let Some(row) = row else {
        return Ok(None);
    };

    // Record activity for audit/visibility without extending the session TTL.
    let query = r"
        UPDATE user_sessions
        SET last_seen_at = NOW()
        WHERE session_hash = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update session last_seen_at")?;

    Ok(Some(SessionRecord {
        user_id: row.get("id"),
        address: row.get("address"),
        expires_at: row.get("expires_at"),
    }))
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}
