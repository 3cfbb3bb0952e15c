use std::str::FromStr;

use sea_query::{ConditionalStatement, Expr, OnConflict, Order, Query, SqliteQueryBuilder, Value};
use sea_query_binder::SqlxBinder;
use serde::Deserialize;
use sqlx::{
    pool::PoolConnection,
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, SqliteConnection, Transaction,
};

use freighter_core::Manifest;

use crate::errors::{Error, Result};
use crate::metadata::{ManifestRow, Manifests};

#[derive(Clone, Deserialize)]
pub struct SqliteConfig {
    connection_string: String,
    max_connections: Option<u32>,
}

impl SqliteConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            max_connections: None,
        }
    }

    pub async fn new_metadata(&self) -> Result<SqliteMetadataPool> {
        let options =
            SqliteConnectOptions::from_str(&self.connection_string)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections.unwrap_or(5))
            .connect_with(options)
            .await?;

        tracing::info!("migrating manifest database");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(SqliteMetadataPool { pool })
    }
}

#[derive(Clone)]
pub struct SqliteMetadataPool {
    pool: Pool<Sqlite>,
}

impl SqliteMetadataPool {
    pub async fn get_conn(&self) -> Result<SqliteMetadataConn> {
        Ok(SqliteMetadataConn {
            conn: self.pool.acquire().await?,
        })
    }

    pub async fn get_tx(&self) -> Result<SqliteMetadataTx> {
        Ok(SqliteMetadataTx {
            tx: Some(self.pool.begin().await?),
        })
    }
}

pub struct SqliteMetadataConn {
    conn: PoolConnection<Sqlite>,
}

// Queries that only need a `&mut SqliteConnection` and don't care whether it came from a
// transaction or a pool connection.
struct Queries {}

impl Queries {
    pub async fn get_manifest(
        executor: &mut SqliteConnection,
        repository: &str,
        target: &str,
    ) -> Result<Option<ManifestRow>> {
        let (sql, values) = Query::select()
            .from(Manifests::Table)
            .columns([
                Manifests::Repository,
                Manifests::Target,
                Manifests::MediaType,
                Manifests::Blob,
            ])
            .and_where(Expr::col(Manifests::Repository).eq(repository))
            .and_where(Expr::col(Manifests::Target).eq(target))
            .build_sqlx(SqliteQueryBuilder);

        Ok(sqlx::query_as_with::<_, ManifestRow, _>(&sql, values)
            .fetch_optional(executor)
            .await?)
    }

    pub async fn get_manifests(
        executor: &mut SqliteConnection,
        repository: &str,
    ) -> Result<Vec<ManifestRow>> {
        let (sql, values) = Query::select()
            .from(Manifests::Table)
            .columns([
                Manifests::Repository,
                Manifests::Target,
                Manifests::MediaType,
                Manifests::Blob,
            ])
            .and_where(Expr::col(Manifests::Repository).eq(repository))
            .order_by(Manifests::Target, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        Ok(sqlx::query_as_with::<_, ManifestRow, _>(&sql, values)
            .fetch_all(executor)
            .await?)
    }

    pub async fn manifest_exists(
        executor: &mut SqliteConnection,
        repository: &str,
        target: &str,
    ) -> Result<bool> {
        let (sql, values) = Query::select()
            .from(Manifests::Table)
            .column(Manifests::Target)
            .and_where(Expr::col(Manifests::Repository).eq(repository))
            .and_where(Expr::col(Manifests::Target).eq(target))
            .limit(1)
            .build_sqlx(SqliteQueryBuilder);

        Ok(sqlx::query_with(&sql, values)
            .fetch_optional(executor)
            .await?
            .is_some())
    }

    pub async fn get_targets(
        executor: &mut SqliteConnection,
        repository: &str,
    ) -> Result<Vec<String>> {
        let (sql, values) = Query::select()
            .from(Manifests::Table)
            .column(Manifests::Target)
            .and_where(Expr::col(Manifests::Repository).eq(repository))
            .order_by(Manifests::Target, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(executor).await?;
        let mut targets = Vec::with_capacity(rows.len());
        for row in rows {
            targets.push(row.try_get("target")?);
        }
        Ok(targets)
    }

    pub async fn get_repositories(executor: &mut SqliteConnection) -> Result<Vec<String>> {
        let (sql, values) = Query::select()
            .distinct()
            .from(Manifests::Table)
            .column(Manifests::Repository)
            .order_by(Manifests::Repository, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(executor).await?;
        let mut repositories = Vec::with_capacity(rows.len());
        for row in rows {
            repositories.push(row.try_get("repository")?);
        }
        Ok(repositories)
    }

    pub async fn upsert_manifest(executor: &mut SqliteConnection, manifest: &Manifest) -> Result<()> {
        let (sql, values) = Query::insert()
            .into_table(Manifests::Table)
            .columns([
                Manifests::Repository,
                Manifests::Target,
                Manifests::MediaType,
                Manifests::Blob,
            ])
            .values([
                Value::from(manifest.repository.as_str()).into(),
                Value::from(manifest.target.as_str()).into(),
                Value::from(manifest.media_type.as_str()).into(),
                Value::from(manifest.blob.to_vec()).into(),
            ])?
            .on_conflict(
                OnConflict::columns([Manifests::Repository, Manifests::Target])
                    .update_columns([Manifests::MediaType, Manifests::Blob])
                    .to_owned(),
            )
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&sql, values).execute(executor).await?;

        Ok(())
    }

    pub async fn delete_manifest(
        executor: &mut SqliteConnection,
        repository: &str,
        target: &str,
    ) -> Result<u64> {
        let (sql, values) = Query::delete()
            .from_table(Manifests::Table)
            .and_where(Expr::col(Manifests::Repository).eq(repository))
            .and_where(Expr::col(Manifests::Target).eq(target))
            .build_sqlx(SqliteQueryBuilder);

        let result = sqlx::query_with(&sql, values).execute(executor).await?;
        Ok(result.rows_affected())
    }
}

// PoolConnection<Sqlite>-based metadata queries.
impl SqliteMetadataConn {
    pub async fn get_manifest(
        &mut self,
        repository: &str,
        target: &str,
    ) -> Result<Option<ManifestRow>> {
        Queries::get_manifest(&mut *self.conn, repository, target).await
    }

    pub async fn get_manifests(&mut self, repository: &str) -> Result<Vec<ManifestRow>> {
        Queries::get_manifests(&mut *self.conn, repository).await
    }

    pub async fn manifest_exists(&mut self, repository: &str, target: &str) -> Result<bool> {
        Queries::manifest_exists(&mut *self.conn, repository, target).await
    }

    pub async fn get_targets(&mut self, repository: &str) -> Result<Vec<String>> {
        Queries::get_targets(&mut *self.conn, repository).await
    }

    pub async fn get_repositories(&mut self) -> Result<Vec<String>> {
        Queries::get_repositories(&mut *self.conn).await
    }
}

// Wrapper around a SQLite transaction with the ability to commit transactions.
pub struct SqliteMetadataTx {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteMetadataTx {
    pub async fn commit(&mut self) -> Result<()> {
        if let Some(t) = self.tx.take() {
            Ok(t.commit().await?)
        } else {
            Ok(())
        }
    }

    pub async fn upsert_manifest(&mut self, manifest: &Manifest) -> Result<()> {
        let tx = self.tx.as_mut().ok_or(Error::SqliteMetadataTxInactive)?;
        Queries::upsert_manifest(&mut **tx, manifest).await
    }

    pub async fn delete_manifest(&mut self, repository: &str, target: &str) -> Result<u64> {
        let tx = self.tx.as_mut().ok_or(Error::SqliteMetadataTxInactive)?;
        Queries::delete_manifest(&mut **tx, repository, target).await
    }
}
