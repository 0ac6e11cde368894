use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::ProductImage;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "product_images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub image: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub position: i32,
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

impl From<Model> for ProductImage {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            image: model.image,
            alt_text: model.alt_text,
            is_primary: model.is_primary,
            position: model.position,
        }
    }
}

impl From<ProductImage> for ActiveModel {
    fn from(image: ProductImage) -> Self {
        ActiveModel {
            id: Set(image.id),
            product_id: Set(image.product_id),
            image: Set(image.image),
            alt_text: Set(image.alt_text),
            is_primary: Set(image.is_primary),
            position: Set(image.position),
        }
    }
}
