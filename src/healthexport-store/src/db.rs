use chrono::Local;
use healthexport_entities::blobs;
use healthexport_migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveValue::Set, ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    sea_query::OnConflict,
};

use crate::{BlobStore, StoreError};

/// Blobs in a `blobs` table of a SQL database.
#[derive(Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Connects and brings the schema up to date.
    pub async fn connect<C>(options: C) -> Result<Self, StoreError>
    where
        C: Into<ConnectOptions>,
    {
        let db = Database::connect(options).await?;
        Migrator::up(&db, None).await?;

        Ok(Self { db })
    }

    pub async fn close(self) -> Result<(), StoreError> {
        Ok(self.db.close().await?)
    }
}

impl BlobStore for DatabaseStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        blobs::Entity::find_by_id(key.to_owned())
            .one(&self.db)
            .await?
            .map(|blob| blob.bytes)
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let blob = blobs::ActiveModel {
            key: Set(key.to_owned()),
            bytes: Set(bytes),
            updated_at: Set(Local::now().naive_local()),
        };

        blobs::Entity::insert(blob)
            .on_conflict(
                OnConflict::column(blobs::Column::Key)
                    .update_column(blobs::Column::Bytes)
                    .update_column(blobs::Column::UpdatedAt)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count = blobs::Entity::find_by_id(key.to_owned())
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }
}
