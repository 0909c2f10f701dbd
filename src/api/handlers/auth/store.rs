//! User persistence behind the [`UserStore`] seam.
//!
//! `PgUserStore` is the production implementation; handlers only ever see
//! `Arc<dyn UserStore>`, which keeps the two-factor state machine and the
//! HTTP layer testable against `MemoryUserStore` without a database.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::totp::recovery;

/// Account lifecycle status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }

    pub(crate) fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// Full user row. Never serialized; the wire shape is `types::UserView`.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub status: UserStatus,
    pub photo_url: Option<String>,
    pub two_factor_secret: Option<String>,
    pub two_factor_recovery_codes: Option<Vec<String>>,
    pub two_factor_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Two-factor is on only once the user has confirmed a code.
    #[must_use]
    pub fn two_factor_enabled(&self) -> bool {
        self.two_factor_confirmed_at.is_some()
    }
}

/// Fields needed to create an account.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Clone, Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<UserStatus>,
    pub photo_url: Option<String>,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(UserRecord),
    EmailTaken,
}

/// Outcome for a profile update.
#[derive(Debug)]
pub enum ProfileOutcome {
    Updated(UserRecord),
    EmailTaken,
    NotFound,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn ping(&self) -> Result<()>;
    async fn create(&self, user: NewUser) -> Result<CreateOutcome>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<ProfileOutcome>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()>;

    /// Persist secret, recovery codes, and confirmation stamp in one write.
    async fn enable_two_factor(&self, id: Uuid, secret: &str, codes: &[String]) -> Result<()>;

    /// Clear secret, recovery codes, and confirmation stamp in one write.
    async fn disable_two_factor(&self, id: Uuid) -> Result<()>;

    /// Burn one recovery code; `true` when a code matched and was removed.
    ///
    /// Implementations serialize racing consumers so a code can never be
    /// redeemed twice.
    async fn consume_recovery_code(&self, id: Uuid, code: &str) -> Result<bool>;
}

/// Postgres-backed store.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, status::text AS status, photo_url, \
     two_factor_secret, two_factor_recovery_codes, two_factor_confirmed_at, \
     created_at, updated_at";

fn record_from_row(row: &PgRow) -> Result<UserRecord> {
    let status: String = row.get("status");
    let status = UserStatus::from_str(&status)
        .ok_or_else(|| anyhow!("unknown user status in row: {status}"))?;
    let codes: Option<Json<Vec<String>>> = row.get("two_factor_recovery_codes");
    Ok(UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        status,
        photo_url: row.get("photo_url"),
        two_factor_secret: row.get("two_factor_secret"),
        two_factor_recovery_codes: codes.map(|codes| codes.0),
        two_factor_confirmed_at: row.get("two_factor_confirmed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ping(&self) -> Result<()> {
        let query = "SELECT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("database ping failed")?;
        Ok(())
    }

    async fn create(&self, user: NewUser) -> Result<CreateOutcome> {
        let query = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(CreateOutcome::Created(record_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::EmailTaken),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<ProfileOutcome> {
        let query = format!(
            r"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                status = COALESCE($4::user_status, status),
                photo_url = COALESCE($5, photo_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(changes.name.as_deref())
            .bind(changes.email.as_deref())
            .bind(changes.status.map(UserStatus::as_str))
            .bind(changes.photo_url.as_deref())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(Some(row)) => Ok(ProfileOutcome::Updated(record_from_row(&row)?)),
            Ok(None) => Ok(ProfileOutcome::NotFound),
            Err(err) if is_unique_violation(&err) => Ok(ProfileOutcome::EmailTaken),
            Err(err) => Err(err).context("failed to update profile"),
        }
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let query = "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password hash")?;
        Ok(())
    }

    async fn enable_two_factor(&self, id: Uuid, secret: &str, codes: &[String]) -> Result<()> {
        let query = r"
            UPDATE users SET
                two_factor_secret = $2,
                two_factor_recovery_codes = $3,
                two_factor_confirmed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(secret)
            .bind(Json(codes))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to enable two-factor")?;
        Ok(())
    }

    async fn disable_two_factor(&self, id: Uuid) -> Result<()> {
        let query = r"
            UPDATE users SET
                two_factor_secret = NULL,
                two_factor_recovery_codes = NULL,
                two_factor_confirmed_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to disable two-factor")?;
        Ok(())
    }

    async fn consume_recovery_code(&self, id: Uuid, code: &str) -> Result<bool> {
        // Row lock so two racing requests cannot redeem the same code.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin recovery-code transaction")?;

        let query = "SELECT two_factor_recovery_codes FROM users WHERE id = $1 FOR UPDATE";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lock recovery codes")?;

        let Some(row) = row else {
            let _ = tx.rollback().await;
            return Ok(false);
        };
        let codes: Option<Json<Vec<String>>> = row.get("two_factor_recovery_codes");
        let Some(Json(codes)) = codes else {
            let _ = tx.rollback().await;
            return Ok(false);
        };

        let Some(survivors) = recovery::consume(&codes, code) else {
            let _ = tx.rollback().await;
            return Ok(false);
        };

        let query =
            "UPDATE users SET two_factor_recovery_codes = $2, updated_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(Json(&survivors))
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to shrink recovery codes")?;

        tx.commit().await.context("commit recovery-code consume")?;
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store for handler and state-machine tests.

    use super::{
        CreateOutcome, NewUser, ProfileChanges, ProfileOutcome, UserRecord, UserStatus, UserStore,
    };
    use crate::totp::recovery;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    pub(crate) struct MemoryUserStore {
        users: Mutex<HashMap<Uuid, UserRecord>>,
    }

    impl MemoryUserStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) async fn insert(&self, record: UserRecord) {
            self.users.lock().await.insert(record.id, record);
        }

        pub(crate) async fn get(&self, id: Uuid) -> Option<UserRecord> {
            self.users.lock().await.get(&id).cloned()
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn create(&self, user: NewUser) -> Result<CreateOutcome> {
            let mut users = self.users.lock().await;
            if users.values().any(|record| record.email == user.email) {
                return Ok(CreateOutcome::EmailTaken);
            }
            let now = Utc::now();
            let record = UserRecord {
                id: Uuid::new_v4(),
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                status: UserStatus::Active,
                photo_url: None,
                two_factor_secret: None,
                two_factor_recovery_codes: None,
                two_factor_confirmed_at: None,
                created_at: now,
                updated_at: now,
            };
            users.insert(record.id, record.clone());
            Ok(CreateOutcome::Created(record))
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
            let users = self.users.lock().await;
            Ok(users.values().find(|record| record.email == email).cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
            Ok(self.users.lock().await.get(&id).cloned())
        }

        async fn update_profile(
            &self,
            id: Uuid,
            changes: ProfileChanges,
        ) -> Result<ProfileOutcome> {
            let mut users = self.users.lock().await;
            if let Some(new_email) = changes.email.as_deref() {
                if users
                    .values()
                    .any(|record| record.email == new_email && record.id != id)
                {
                    return Ok(ProfileOutcome::EmailTaken);
                }
            }
            let Some(record) = users.get_mut(&id) else {
                return Ok(ProfileOutcome::NotFound);
            };
            if let Some(name) = changes.name {
                record.name = name;
            }
            if let Some(email) = changes.email {
                record.email = email;
            }
            if let Some(status) = changes.status {
                record.status = status;
            }
            if let Some(photo_url) = changes.photo_url {
                record.photo_url = Some(photo_url);
            }
            record.updated_at = Utc::now();
            Ok(ProfileOutcome::Updated(record.clone()))
        }

        async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
            let mut users = self.users.lock().await;
            if let Some(record) = users.get_mut(&id) {
                record.password_hash = password_hash.to_string();
                record.updated_at = Utc::now();
            }
            Ok(())
        }

        async fn enable_two_factor(&self, id: Uuid, secret: &str, codes: &[String]) -> Result<()> {
            let mut users = self.users.lock().await;
            if let Some(record) = users.get_mut(&id) {
                record.two_factor_secret = Some(secret.to_string());
                record.two_factor_recovery_codes = Some(codes.to_vec());
                record.two_factor_confirmed_at = Some(Utc::now());
                record.updated_at = Utc::now();
            }
            Ok(())
        }

        async fn disable_two_factor(&self, id: Uuid) -> Result<()> {
            let mut users = self.users.lock().await;
            if let Some(record) = users.get_mut(&id) {
                record.two_factor_secret = None;
                record.two_factor_recovery_codes = None;
                record.two_factor_confirmed_at = None;
                record.updated_at = Utc::now();
            }
            Ok(())
        }

        async fn consume_recovery_code(&self, id: Uuid, code: &str) -> Result<bool> {
            let mut users = self.users.lock().await;
            let Some(record) = users.get_mut(&id) else {
                return Ok(false);
            };
            let Some(codes) = record.two_factor_recovery_codes.as_ref() else {
                return Ok(false);
            };
            let Some(survivors) = recovery::consume(codes, code) else {
                return Ok(false);
            };
            record.two_factor_recovery_codes = Some(survivors);
            record.updated_at = Utc::now();
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{UserStatus, memory::MemoryUserStore};
    use super::{CreateOutcome, NewUser, ProfileChanges, ProfileOutcome, UserStore};
    use anyhow::{Result, bail};

    #[test]
    fn user_status_round_trips() {
        for status in [
            UserStatus::Active,
            UserStatus::Inactive,
            UserStatus::Suspended,
        ] {
            assert_eq!(UserStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(UserStatus::from_str("deleted"), None);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() -> Result<()> {
        let store = MemoryUserStore::new();
        let user = NewUser {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
        };
        let CreateOutcome::Created(_) = store.create(user.clone()).await? else {
            bail!("first create should succeed");
        };
        let CreateOutcome::EmailTaken = store.create(user).await? else {
            bail!("second create should conflict");
        };
        Ok(())
    }

    #[tokio::test]
    async fn profile_update_detects_email_conflict() -> Result<()> {
        let store = MemoryUserStore::new();
        let CreateOutcome::Created(alice) = store
            .create(NewUser {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "$argon2id$stub".to_string(),
            })
            .await?
        else {
            bail!("create failed");
        };
        let CreateOutcome::Created(_) = store
            .create(NewUser {
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
                password_hash: "$argon2id$stub".to_string(),
            })
            .await?
        else {
            bail!("create failed");
        };

        let outcome = store
            .update_profile(
                alice.id,
                ProfileChanges {
                    email: Some("bob@example.com".to_string()),
                    ..ProfileChanges::default()
                },
            )
            .await?;
        let ProfileOutcome::EmailTaken = outcome else {
            bail!("expected email conflict");
        };
        Ok(())
    }

    #[tokio::test]
    async fn enable_then_disable_clears_all_two_factor_fields() -> Result<()> {
        let store = MemoryUserStore::new();
        let CreateOutcome::Created(alice) = store
            .create(NewUser {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "$argon2id$stub".to_string(),
            })
            .await?
        else {
            bail!("create failed");
        };

        store
            .enable_two_factor(alice.id, "SECRET", &["AAAAAAAAAA".to_string()])
            .await?;
        let enabled = store.get(alice.id).await.expect("user exists");
        assert!(enabled.two_factor_enabled());
        assert!(enabled.two_factor_secret.is_some());
        assert!(enabled.two_factor_recovery_codes.is_some());

        store.disable_two_factor(alice.id).await?;
        let disabled = store.get(alice.id).await.expect("user exists");
        assert!(!disabled.two_factor_enabled());
        assert!(disabled.two_factor_secret.is_none());
        assert!(disabled.two_factor_recovery_codes.is_none());
        Ok(())
    }
}
