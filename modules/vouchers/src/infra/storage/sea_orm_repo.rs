use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, SqlErr,
};
use uuid::Uuid;

use crate::contract::model::Voucher;
use crate::domain::repo::{CodeUniqueViolation, VouchersRepository};
use crate::infra::storage::entity::{Column, Entity};
use crate::infra::storage::mapper::{contract_to_active, entity_to_contract};

/// `VouchersRepository` over any SeaORM connection (pool or transaction).
pub struct SeaOrmVouchersRepository<C> {
    conn: C,
}

impl<C> SeaOrmVouchersRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

fn map_write_err(e: DbErr) -> anyhow::Error {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = e.sql_err() {
        tracing::debug!(%detail, "Voucher code unique constraint hit");
        return CodeUniqueViolation.into();
    }
    anyhow::Error::new(e).context("voucher write failed")
}

#[async_trait]
impl<C> VouchersRepository for SeaOrmVouchersRepository<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Voucher>> {
        let found = Entity::find_by_id(id).one(&self.conn).await?;
        Ok(found.map(entity_to_contract))
    }

    async fn code_exists(&self, code: &str, exclude_id: Option<Uuid>) -> anyhow::Result<bool> {
        let mut query = Entity::find().filter(Column::Code.eq(code));
        if let Some(id) = exclude_id {
            query = query.filter(Column::Id.ne(id));
        }
        Ok(query.count(&self.conn).await? > 0)
    }

    async fn list_newest_first(&self) -> anyhow::Result<Vec<Voucher>> {
        let rows = Entity::find()
            .order_by_desc(Column::CreatedAt)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(entity_to_contract).collect())
    }

    async fn insert(&self, voucher: Voucher) -> anyhow::Result<Voucher> {
        let model = contract_to_active(voucher)
            .insert(&self.conn)
            .await
            .map_err(map_write_err)?;
        Ok(entity_to_contract(model))
    }

    async fn update(&self, voucher: Voucher) -> anyhow::Result<Voucher> {
        let model = contract_to_active(voucher)
            .update(&self.conn)
            .await
            .map_err(map_write_err)?;
        Ok(entity_to_contract(model))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
