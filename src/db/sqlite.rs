use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqliteConnection, SqlitePool, TypeInfo, ValueRef,
};
use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use crate::{
    db::{FeatureStore, InsertMode},
    error::{AppError, AppResult},
    models::{ColumnKind, FeatureTable, FeatureValue},
};

/// Creates a SQLite connection pool
///
/// The database file and its parent directory are created when missing.
/// A single connection is enough: every pipeline step runs sequentially.
pub async fn create_pool(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Configuration(format!(
                    "Cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// SQLite's bound-parameter ceiling per statement
const MAX_BIND_PARAMS: usize = 32_766;

/// Quotes a table or column name for direct interpolation into SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Feature store backed by one SQLite table per feature group
///
/// Group tables are created without declared column types so SQLite keeps
/// each value's storage class. Column kinds that SQLite cannot represent
/// (booleans, string lists, score vectors) are tracked in
/// `feature_group_columns`; lists and vectors are stored as JSON array text.
#[derive(Clone)]
pub struct SqliteFeatureStore {
    pool: SqlitePool,
}

impl SqliteFeatureStore {
    pub async fn new(pool: SqlitePool) -> AppResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feature_group_columns (
                feature_group TEXT NOT NULL,
                column_name TEXT NOT NULL,
                kind TEXT,
                PRIMARY KEY (feature_group, column_name)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = create_pool(database_url).await?;
        Self::new(pool).await
    }

    async fn table_exists(conn: &mut SqliteConnection, table: &str) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count > 0)
    }

    async fn table_columns(conn: &mut SqliteConnection, table: &str) -> AppResult<Vec<String>> {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                .bind(table)
                .fetch_all(&mut *conn)
                .await?;
        Ok(columns)
    }

    async fn column_kinds(
        conn: &mut SqliteConnection,
        feature_group: &str,
    ) -> AppResult<HashMap<String, ColumnKind>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT column_name, kind FROM feature_group_columns WHERE feature_group = ?",
        )
        .bind(feature_group)
        .fetch_all(&mut *conn)
        .await?;

        let mut kinds = HashMap::new();
        for (name, kind) in rows {
            if let Some(kind) = kind {
                kinds.insert(name, kind.parse()?);
            }
        }
        Ok(kinds)
    }

    /// Records column kinds; a kind already known for a column is kept
    async fn record_columns(
        conn: &mut SqliteConnection,
        feature_group: &str,
        features: &FeatureTable,
    ) -> AppResult<()> {
        for name in features.columns() {
            let kind = features.column_kind(name)?;
            sqlx::query(
                r#"
                INSERT INTO feature_group_columns (feature_group, column_name, kind)
                VALUES (?, ?, ?)
                ON CONFLICT (feature_group, column_name)
                DO UPDATE SET kind = COALESCE(feature_group_columns.kind, excluded.kind)
                "#,
            )
            .bind(feature_group)
            .bind(name)
            .bind(kind.map(|k| k.as_str()))
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn create_table(
        conn: &mut SqliteConnection,
        feature_group: &str,
        columns: &[String],
    ) -> AppResult<()> {
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "CREATE TABLE {} ({})",
            quote_ident(feature_group),
            column_list
        );
        sqlx::query(&sql).execute(&mut *conn).await?;
        Ok(())
    }

    /// Adds columns of `features` the existing table does not have yet
    async fn add_missing_columns(
        conn: &mut SqliteConnection,
        feature_group: &str,
        features: &FeatureTable,
    ) -> AppResult<()> {
        let existing: HashSet<String> = Self::table_columns(&mut *conn, feature_group)
            .await?
            .into_iter()
            .collect();

        for column in features.columns() {
            if existing.contains(column) {
                continue;
            }
            tracing::debug!(feature_group = %feature_group, column = %column, "Adding column");
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(feature_group),
                quote_ident(column)
            );
            sqlx::query(&sql).execute(&mut *conn).await?;
        }
        Ok(())
    }

    /// Inserts rows with one multi-row statement per chunk
    async fn insert_rows(
        conn: &mut SqliteConnection,
        feature_group: &str,
        features: &FeatureTable,
    ) -> AppResult<()> {
        let width = features.columns().len();
        let column_list = features
            .columns()
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let row_placeholders = format!("({})", vec!["?"; width].join(", "));
        let chunk_size = (MAX_BIND_PARAMS / width.max(1)).max(1);

        for chunk in features.rows().chunks(chunk_size) {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                quote_ident(feature_group),
                column_list,
                vec![row_placeholders.as_str(); chunk.len()].join(", ")
            );

            let mut query = sqlx::query(&sql);
            for cell in chunk.iter().flatten() {
                query = match cell {
                    FeatureValue::Null => query.bind(Option::<i64>::None),
                    FeatureValue::Bool(b) => query.bind(*b),
                    FeatureValue::Integer(i) => query.bind(*i),
                    FeatureValue::Float(f) => query.bind(*f),
                    FeatureValue::Text(s) => query.bind(s.as_str()),
                    FeatureValue::List(items) => query.bind(serde_json::to_string(items)?),
                    FeatureValue::Vector(values) => query.bind(serde_json::to_string(values)?),
                };
            }
            query.execute(&mut *conn).await?;
        }
        Ok(())
    }

    fn decode_cell(
        row: &SqliteRow,
        idx: usize,
        kind: Option<ColumnKind>,
    ) -> AppResult<FeatureValue> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(FeatureValue::Null);
        }
        let storage = raw.type_info().name().to_string();

        let value = match storage.as_str() {
            "INTEGER" => {
                let value: i64 = row.try_get_unchecked(idx)?;
                match kind {
                    Some(ColumnKind::Bool) => FeatureValue::Bool(value != 0),
                    Some(ColumnKind::Float) => FeatureValue::Float(value as f64),
                    _ => FeatureValue::Integer(value),
                }
            }
            "REAL" => FeatureValue::Float(row.try_get_unchecked(idx)?),
            "TEXT" => {
                let value: String = row.try_get_unchecked(idx)?;
                match kind {
                    Some(ColumnKind::List) => FeatureValue::List(serde_json::from_str(&value)?),
                    Some(ColumnKind::Vector) => {
                        FeatureValue::Vector(serde_json::from_str(&value)?)
                    }
                    _ => FeatureValue::Text(value),
                }
            }
            other => {
                return Err(AppError::InvalidInput(format!(
                    "Unsupported stored value type {} in column {}",
                    other, idx
                )))
            }
        };
        Ok(value)
    }
}

#[async_trait::async_trait]
impl FeatureStore for SqliteFeatureStore {
    async fn insert(
        &self,
        feature_group: &str,
        features: &FeatureTable,
        mode: InsertMode,
    ) -> AppResult<()> {
        if feature_group.trim().is_empty() || features.is_empty() {
            return Err(AppError::InvalidInput(
                "Feature group name and features must be provided".to_string(),
            ));
        }

        tracing::info!(
            records = features.len(),
            feature_group = %feature_group,
            mode = ?mode,
            "Storing records in feature group"
        );

        let mut tx = self.pool.begin().await?;

        if mode == InsertMode::Replace {
            let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(feature_group));
            sqlx::query(&sql).execute(&mut *tx).await?;
            sqlx::query("DELETE FROM feature_group_columns WHERE feature_group = ?")
                .bind(feature_group)
                .execute(&mut *tx)
                .await?;
        }

        if Self::table_exists(&mut tx, feature_group).await? {
            Self::add_missing_columns(&mut tx, feature_group, features).await?;
        } else {
            Self::create_table(&mut tx, feature_group, features.columns()).await?;
        }

        Self::record_columns(&mut tx, feature_group, features).await?;
        Self::insert_rows(&mut tx, feature_group, features).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_existing_ids(&self, feature_group: &str) -> AppResult<HashSet<i64>> {
        if feature_group.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Feature group name must be provided".to_string(),
            ));
        }

        tracing::info!(feature_group = %feature_group, "Fetching existing movie IDs");

        let mut conn = self.pool.acquire().await?;
        if !Self::table_exists(&mut conn, feature_group).await? {
            return Ok(HashSet::new());
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {} IS NOT NULL",
            quote_ident("id"),
            quote_ident(feature_group),
            quote_ident("id")
        );
        let ids: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;

        Ok(ids.into_iter().collect())
    }

    async fn query_features(
        &self,
        feature_group: &str,
        columns: Option<Vec<String>>,
    ) -> AppResult<FeatureTable> {
        let mut conn = self.pool.acquire().await?;

        if !Self::table_exists(&mut conn, feature_group).await? {
            tracing::warn!(feature_group = %feature_group, "Feature group does not exist");
            return Ok(FeatureTable::new(columns.unwrap_or_default()));
        }

        let stored = Self::table_columns(&mut conn, feature_group).await?;
        let selected = match columns {
            Some(requested) => {
                if let Some(missing) = requested.iter().find(|c| !stored.contains(c)) {
                    return Err(AppError::InvalidInput(format!(
                        "Column {} not found in feature group {}",
                        missing, feature_group
                    )));
                }
                requested
            }
            None => stored,
        };

        let kinds = Self::column_kinds(&mut conn, feature_group).await?;
        let column_kinds: Vec<Option<ColumnKind>> =
            selected.iter().map(|c| kinds.get(c).copied()).collect();

        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            selected
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            quote_ident(feature_group)
        );
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

        let mut table = FeatureTable::new(selected);
        for row in &rows {
            let values = column_kinds
                .iter()
                .enumerate()
                .map(|(idx, kind)| Self::decode_cell(row, idx, *kind))
                .collect::<AppResult<Vec<_>>>()?;
            table.push_row(values)?;
        }

        tracing::debug!(
            feature_group = %feature_group,
            rows = table.len(),
            "Queried features"
        );

        Ok(table)
    }
}
