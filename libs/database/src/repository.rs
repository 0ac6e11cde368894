//! Generic CRUD over SeaORM entities keyed by a `Uuid`.

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PrimaryKeyTrait,
};
use std::marker::PhantomData;
use uuid::Uuid;

/// Shared insert/find/update/delete for one entity.
///
/// Domain repositories wrap it and add their own queries through [`db`](Self::db).
///
/// ```ignore
/// pub struct PgCategoryRepository {
///     base: BaseRepository<category::Entity>,
/// }
///
/// let model = self.base.find_by_id(id).await?;
/// ```
#[derive(Clone)]
pub struct BaseRepository<E> {
    db: DatabaseConnection,
    _entity: PhantomData<E>,
}

impl<E> BaseRepository<E>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
{
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn insert(&self, model: E::ActiveModel) -> Result<E::Model, DbErr> {
        model.insert(&self.db).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<E::Model>, DbErr> {
        E::find_by_id(id).one(&self.db).await
    }

    /// Persist the `Set` columns of `model`. Fails with `RecordNotUpdated` when the row is gone.
    pub async fn update(&self, model: E::ActiveModel) -> Result<E::Model, DbErr> {
        model.update(&self.db).await
    }

    /// Returns the number of deleted rows (0 or 1).
    pub async fn delete_by_id(&self, id: Uuid) -> Result<u64, DbErr> {
        let result = E::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    mod tag {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "tags")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: Uuid,
            pub label: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    #[tokio::test]
    async fn test_find_by_id_returns_model() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![tag::Model {
                id,
                label: "sale".to_string(),
            }]])
            .into_connection();

        let repo = BaseRepository::<tag::Entity>::new(db);
        let found = repo.find_by_id(id).await.unwrap();

        assert_eq!(found.map(|t| t.label).as_deref(), Some("sale"));
    }

    #[tokio::test]
    async fn test_insert_returns_stored_row() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![tag::Model {
                id,
                label: "new".to_string(),
            }]])
            .into_connection();

        let repo = BaseRepository::<tag::Entity>::new(db);
        let inserted = repo
            .insert(tag::ActiveModel {
                id: Set(id),
                label: Set("new".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(inserted.id, id);
    }

    #[tokio::test]
    async fn test_delete_reports_rows_affected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let repo = BaseRepository::<tag::Entity>::new(db);
        assert_eq!(repo.delete_by_id(Uuid::now_v7()).await.unwrap(), 0);
    }
}
