use std::collections::HashSet;

use crate::{error::AppResult, models::FeatureTable};

pub mod sqlite;

pub use sqlite::{create_pool, SqliteFeatureStore};

/// How `insert` treats rows already stored in a feature group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    Append,
    Replace,
}

/// Persistence boundary for named feature groups
///
/// Implementations own the storage format; callers only see `FeatureTable`s.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FeatureStore: Send + Sync {
    /// Writes `features` into `feature_group`, creating it when absent
    async fn insert(
        &self,
        feature_group: &str,
        features: &FeatureTable,
        mode: InsertMode,
    ) -> AppResult<()>;

    /// IDs already stored in `feature_group`; empty when the group does not exist
    async fn fetch_existing_ids(&self, feature_group: &str) -> AppResult<HashSet<i64>>;

    /// Reads `feature_group`, restricted to `columns` when given
    async fn query_features(
        &self,
        feature_group: &str,
        columns: Option<Vec<String>>,
    ) -> AppResult<FeatureTable>;
}
