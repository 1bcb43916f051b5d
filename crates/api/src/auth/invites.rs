//! Team invites
//!
//! Admins mint invite tokens; a prospective user redeems one during
//! registration. Only the SHA-256 hash of a token is persisted.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use sternblitz_shared::UserRole;
use time::OffsetDateTime;
use uuid::Uuid;

use super::tokens::{generate_token, hash_token};

/// Invite database record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InviteRecord {
    pub id: Uuid,
    pub team_id: Option<Uuid>,
    pub role: String,
    pub max_uses: Option<i32>,
    pub uses_count: i32,
    pub expires_at: OffsetDateTime,
}

/// Whether an invite can still be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    Valid,
    NotFound,
    Expired,
    Exhausted,
}

impl InviteState {
    /// Human-readable rejection reason, `None` when the invite is valid
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            InviteState::Valid => None,
            InviteState::NotFound => Some("Invite not found"),
            InviteState::Expired => Some("Invite expired"),
            InviteState::Exhausted => Some("Invite limit reached"),
        }
    }
}

/// Classify an invite. Expiry is checked before the use cap.
pub fn invite_state(record: Option<&InviteRecord>, now: OffsetDateTime) -> InviteState {
    let Some(invite) = record else {
        return InviteState::NotFound;
    };
    if invite.expires_at <= now {
        return InviteState::Expired;
    }
    match invite.max_uses {
        Some(max) if invite.uses_count >= max => InviteState::Exhausted,
        _ => InviteState::Valid,
    }
}

/// Invite persistence
#[derive(Clone)]
pub struct InviteManager {
    pool: PgPool,
}

impl InviteManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an invite. Returns the raw token, which is never stored.
    pub async fn create(
        &self,
        team_id: Option<Uuid>,
        role: UserRole,
        max_uses: Option<i32>,
        expires_at: OffsetDateTime,
        created_by: Uuid,
    ) -> Result<(String, InviteRecord), sqlx::Error> {
        let raw_token = generate_token();

        let record = sqlx::query_as::<_, InviteRecord>(
            r#"
            INSERT INTO invites (id, token_hash, team_id, role, created_by, max_uses, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, team_id, role, max_uses, uses_count, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(hash_token(&raw_token))
        .bind(team_id)
        .bind(role.as_str())
        .bind(created_by)
        .bind(max_uses)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            invite_id = %record.id,
            team_id = ?team_id,
            role = %role,
            created_by = %created_by,
            "Invite created"
        );

        Ok((raw_token, record))
    }

    /// Look up an invite by its raw token
    pub async fn find(&self, raw_token: &str) -> Result<Option<InviteRecord>, sqlx::Error> {
        sqlx::query_as::<_, InviteRecord>(
            r#"
            SELECT id, team_id, role, max_uses, uses_count, expires_at
            FROM invites
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_token(raw_token))
        .fetch_optional(&self.pool)
        .await
    }

    /// Atomically take one use of an invite inside the caller's transaction.
    ///
    /// Returns `false` when the invite expired or ran out of uses since it was
    /// read, so two registrations can never both take the last use.
    pub async fn consume(conn: &mut PgConnection, invite_id: Uuid) -> Result<bool, sqlx::Error> {
        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE invites
            SET uses_count = uses_count + 1
            WHERE id = $1
              AND expires_at > NOW()
              AND (max_uses IS NULL OR uses_count < max_uses)
            RETURNING id
            "#,
        )
        .bind(invite_id)
        .fetch_optional(conn)
        .await?;

        Ok(claimed.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn invite(max_uses: Option<i32>, uses_count: i32, expires_in: Duration) -> InviteRecord {
        InviteRecord {
            id: Uuid::new_v4(),
            team_id: None,
            role: "sales".to_string(),
            max_uses,
            uses_count,
            expires_at: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[test]
    fn test_invite_state() {
        let now = OffsetDateTime::now_utc();

        assert_eq!(invite_state(None, now), InviteState::NotFound);
        assert_eq!(
            invite_state(Some(&invite(None, 40, Duration::days(1))), now),
            InviteState::Valid
        );
        assert_eq!(
            invite_state(Some(&invite(Some(2), 1, Duration::days(1))), now),
            InviteState::Valid
        );
        assert_eq!(
            invite_state(Some(&invite(Some(1), 0, Duration::days(-1))), now),
            InviteState::Expired
        );
    }

    #[test]
    fn test_single_use_invite_after_use() {
        let now = OffsetDateTime::now_utc();
        let state = invite_state(Some(&invite(Some(1), 1, Duration::days(7))), now);

        assert_eq!(state, InviteState::Exhausted);
        assert_eq!(state.reason(), Some("Invite limit reached"));
    }

    #[test]
    fn test_reasons() {
        assert_eq!(InviteState::Valid.reason(), None);
        assert_eq!(InviteState::NotFound.reason(), Some("Invite not found"));
        assert_eq!(InviteState::Expired.reason(), Some("Invite expired"));
    }
}
