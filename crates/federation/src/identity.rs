//! Identity lookups against the identity service's tables.
//!
//! The engine does not own `identities`, `key_revocations` or
//! `block_events`. It only reads them.

use std::sync::Arc;

use async_trait::async_trait;
use fedinet_common::{AppError, AppResult};
use fedinet_core::IdentityDirectory;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, Value};

const PUBLIC_KEY_SQL: &str = "SELECT public_key FROM identities WHERE user_id = $1";
const KEY_REVOKED_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM key_revocations WHERE key_id = $1) AS found";
const USER_BLOCKED_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM block_events WHERE blocker_id = $1 AND blocked_id = $2) AS found";

/// [`IdentityDirectory`] over raw SQL.
#[derive(Clone)]
pub struct DbIdentityDirectory {
    db: Arc<DatabaseConnection>,
}

impl DbIdentityDirectory {
    /// Create a new identity directory.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn exists(&self, sql: &str, values: Vec<Value>) -> AppResult<bool> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get::<bool>("", "found")
                .map_err(|e| AppError::Database(e.to_string())),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl IdentityDirectory for DbIdentityDirectory {
    async fn resolve_public_key(&self, actor_id: &str) -> AppResult<Option<String>> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                PUBLIC_KEY_SQL,
                [actor_id.into()],
            ))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(|row| row.try_get::<String>("", "public_key"))
            .transpose()
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn is_key_revoked(&self, public_key: &str) -> AppResult<bool> {
        self.exists(KEY_REVOKED_SQL, vec![public_key.into()]).await
    }

    async fn is_user_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        self.exists(USER_BLOCKED_SQL, vec![blocker_id.into(), blocked_id.into()])
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::collections::BTreeMap;

    fn directory(rows: Vec<Vec<BTreeMap<&'static str, Value>>>) -> DbIdentityDirectory {
        DbIdentityDirectory::new(Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results(rows)
                .into_connection(),
        ))
    }

    #[tokio::test]
    async fn test_resolve_public_key() {
        let directory = directory(vec![
            vec![BTreeMap::from([("public_key", Value::from("PEM"))])],
            vec![],
        ]);

        assert_eq!(
            directory.resolve_public_key("carol").await.unwrap().as_deref(),
            Some("PEM")
        );
        assert!(directory.resolve_public_key("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_queries() {
        let directory = directory(vec![
            vec![BTreeMap::from([("found", Value::from(true))])],
            vec![BTreeMap::from([("found", Value::from(false))])],
        ]);

        assert!(directory.is_key_revoked("PEM").await.unwrap());
        assert!(!directory.is_user_blocked("alice", "carol").await.unwrap());
    }
}
