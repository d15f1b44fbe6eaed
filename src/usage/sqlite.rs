//! Durable SQLite usage store backed by sea-orm

use crate::usage::store::UsageStore;
use crate::usage::types::{TokenUsage, UsageStatus};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Schema,
};
use tracing::info;

mod entity {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "token_usage")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub timestamp: DateTimeUtc,
        pub provider: String,
        pub model: String,
        pub function: String,
        pub tokens_input: i64,
        pub tokens_output: i64,
        pub tokens_total: i64,
        pub cost_usd: f64,
        pub response_time_ms: i64,
        pub status: String,
        pub error_message: Option<String>,
        pub fallback_model: Option<String>,
        pub retry_count: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// SQLite-backed implementation of [`UsageStore`].
///
/// One `token_usage` table, insert-only; reads are timestamp range scans with
/// optional function/provider filters.
pub struct SqliteUsageStore {
    db: DatabaseConnection,
}

impl SqliteUsageStore {
    /// Connect to a SQLite database, creating the table if needed.
    ///
    /// `url` is a sea-orm connection string such as
    /// `sqlite://usage_tracking.db?mode=rwc` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let db = Database::connect(url).await?;

        let backend = db.get_database_backend();
        let schema = Schema::new(backend);
        let mut table = schema.create_table_from_entity(entity::Entity);
        table.if_not_exists();
        db.execute(backend.build(&table)).await?;

        info!("usage store ready at {url}");
        Ok(Self { db })
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn insert(&self, row: &TokenUsage) -> Result<()> {
        let active = entity::ActiveModel {
            id: Set(row.id.clone()),
            timestamp: Set(row.timestamp),
            provider: Set(row.provider.clone()),
            model: Set(row.model.clone()),
            function: Set(row.function.clone()),
            tokens_input: Set(row.tokens_input as i64),
            tokens_output: Set(row.tokens_output as i64),
            tokens_total: Set(row.tokens_total as i64),
            cost_usd: Set(row.cost_usd),
            response_time_ms: Set(row.response_time_ms as i64),
            status: Set(row.status.as_str().to_string()),
            error_message: Set(row.error_message.clone()),
            fallback_model: Set(row.fallback_model.clone()),
            retry_count: Set(row.retry_count as i64),
        };

        entity::Entity::insert(active).exec(&self.db).await?;
        Ok(())
    }

    async fn fetch_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        function: Option<&str>,
        provider: Option<&str>,
    ) -> Result<Vec<TokenUsage>> {
        let mut query = entity::Entity::find()
            .filter(entity::Column::Timestamp.gte(start))
            .filter(entity::Column::Timestamp.lt(end));

        if let Some(function) = function {
            query = query.filter(entity::Column::Function.eq(function));
        }
        if let Some(provider) = provider {
            query = query.filter(entity::Column::Provider.eq(provider));
        }

        let models = query
            .order_by_asc(entity::Column::Timestamp)
            .all(&self.db)
            .await?;

        models.into_iter().map(from_model).collect()
    }
}

fn from_model(model: entity::Model) -> Result<TokenUsage> {
    Ok(TokenUsage {
        id: model.id,
        timestamp: model.timestamp,
        provider: model.provider,
        model: model.model,
        function: model.function,
        tokens_input: model.tokens_input.max(0) as u64,
        tokens_output: model.tokens_output.max(0) as u64,
        tokens_total: model.tokens_total.max(0) as u64,
        cost_usd: model.cost_usd,
        response_time_ms: model.response_time_ms.max(0) as u64,
        status: UsageStatus::parse(&model.status)?,
        error_message: model.error_message,
        fallback_model: model.fallback_model,
        retry_count: model.retry_count.max(0) as u32,
    })
}
