use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::Review;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i16,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub comment: String,
    pub is_verified_purchase: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Review {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            user_name: model.user_name,
            rating: model.rating,
            title: model.title,
            comment: model.comment,
            is_verified_purchase: model.is_verified_purchase,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<Review> for ActiveModel {
    fn from(review: Review) -> Self {
        ActiveModel {
            id: Set(review.id),
            product_id: Set(review.product_id),
            user_id: Set(review.user_id),
            user_name: Set(review.user_name),
            rating: Set(review.rating),
            title: Set(review.title),
            comment: Set(review.comment),
            is_verified_purchase: Set(review.is_verified_purchase),
            created_at: Set(review.created_at.into()),
            updated_at: Set(review.updated_at.into()),
        }
    }
}
