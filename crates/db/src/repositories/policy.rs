//! Federation policy repository.

use std::sync::Arc;

use async_trait::async_trait;
use fedinet_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, sea_query::OnConflict,
};

use crate::entities::{FederationPolicy, federation_policy, federation_policy::POLICY_ID};
use crate::store::PolicyStore;

/// Policy repository for database operations.
#[derive(Clone)]
pub struct PolicyRepository {
    db: Arc<DatabaseConnection>,
}

impl PolicyRepository {
    /// Create a new policy repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PolicyStore for PolicyRepository {
    async fn load(&self) -> AppResult<Option<federation_policy::Model>> {
        FederationPolicy::find_by_id(POLICY_ID)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn compare_and_swap(
        &self,
        expected_version: i64,
        policy: federation_policy::Model,
    ) -> AppResult<bool> {
        let mut model = policy.into_active_model().reset_all();
        model.id = Set(POLICY_ID);

        if expected_version == 0 {
            let inserted = FederationPolicy::insert(model)
                .on_conflict(
                    OnConflict::column(federation_policy::Column::Id)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(inserted == 1);
        }

        let result = FederationPolicy::update_many()
            .set(model)
            .filter(federation_policy::Column::Id.eq(POLICY_ID))
            .filter(federation_policy::Column::Version.eq(expected_version))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::federation_policy::FederationMode;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_policy(version: i64) -> federation_policy::Model {
        federation_policy::Model {
            id: POLICY_ID,
            mode: FederationMode::Soft,
            allow_unknown_servers: true,
            require_capability_negotiation: false,
            strict_validation: false,
            log_unknown_servers: true,
            auto_block_malicious: false,
            version,
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_load_seeded_policy() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_policy(1)]])
                .into_connection(),
        );

        let repo = PolicyRepository::new(db);
        let policy = repo.load().await.unwrap().unwrap();

        assert_eq!(policy.mode, FederationMode::Soft);
        assert_eq!(policy.version, 1);
    }

    #[tokio::test]
    async fn test_compare_and_swap_lost_race() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = PolicyRepository::new(db);
        let swapped = repo
            .compare_and_swap(3, create_test_policy(4))
            .await
            .unwrap();

        assert!(!swapped);
    }
}
