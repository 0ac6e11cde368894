use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(StockStatus::Enum)
                    .values([
                        StockStatus::InStock,
                        StockStatus::LowStock,
                        StockStatus::OutOfStock,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(pk_uuid(Categories::Id))
                    .col(string_len(Categories::Name, 255))
                    .col(string_len(Categories::Slug, 255).unique_key())
                    .col(text(Categories::Description).default(""))
                    .col(string_len_null(Categories::Image, 500))
                    .col(boolean(Categories::IsActive).default(true))
                    .col(
                        timestamp_with_time_zone(Categories::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Categories::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(pk_uuid(Products::Id))
                    .col(string_len(Products::Name, 255))
                    .col(string_len(Products::Slug, 255).unique_key())
                    .col(text(Products::Description).default(""))
                    .col(decimal_len(Products::Price, 10, 2))
                    .col(integer(Products::StockQuantity).default(0))
                    .col(
                        ColumnDef::new(Products::StockStatus)
                            .enumeration(
                                StockStatus::Enum,
                                [
                                    StockStatus::InStock,
                                    StockStatus::LowStock,
                                    StockStatus::OutOfStock,
                                ],
                            )
                            .not_null()
                            .default("in_stock"),
                    )
                    .col(string_len(Products::Sku, 100).unique_key())
                    .col(decimal_len_null(Products::Weight, 8, 2))
                    .col(string_len_null(Products::Dimensions, 100))
                    .col(boolean(Products::IsActive).default(true))
                    .col(boolean(Products::IsFeatured).default(false))
                    .col(uuid(Products::CategoryId))
                    .col(
                        timestamp_with_time_zone(Products::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Products::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_products_category_id")
                            .from(Products::Table, Products::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProductImages::Table)
                    .if_not_exists()
                    .col(pk_uuid(ProductImages::Id))
                    .col(uuid(ProductImages::ProductId))
                    .col(string_len(ProductImages::Image, 500))
                    .col(string_len(ProductImages::AltText, 255).default(""))
                    .col(boolean(ProductImages::IsPrimary).default(false))
                    .col(integer(ProductImages::Position).default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_images_product_id")
                            .from(ProductImages::Table, ProductImages::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(pk_uuid(Reviews::Id))
                    .col(uuid(Reviews::ProductId))
                    .col(uuid(Reviews::UserId))
                    .col(string_len(Reviews::UserName, 255))
                    .col(small_integer(Reviews::Rating))
                    .col(string_len(Reviews::Title, 200))
                    .col(text(Reviews::Comment).default(""))
                    .col(boolean(Reviews::IsVerifiedPurchase).default(false))
                    .col(
                        timestamp_with_time_zone(Reviews::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Reviews::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_product_id")
                            .from(Reviews::Table, Reviews::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();
        db.execute_unprepared(
            "ALTER TABLE products ADD CONSTRAINT chk_products_non_negative \
             CHECK (price >= 0 AND stock_quantity >= 0 AND (weight IS NULL OR weight >= 0))",
        )
        .await?;
        db.execute_unprepared(
            "ALTER TABLE reviews ADD CONSTRAINT chk_reviews_rating CHECK (rating BETWEEN 1 AND 5)",
        )
        .await?;

        for (name, table, col) in [
            ("idx_products_category_id", Products::Table, Products::CategoryId),
            ("idx_products_created_at", Products::Table, Products::CreatedAt),
        ] {
            manager
                .create_index(Index::create().name(name).table(table).col(col).to_owned())
                .await?;
        }

        manager
            .create_index(
                Index::create()
                    .name("idx_product_images_product_id")
                    .table(ProductImages::Table)
                    .col(ProductImages::ProductId)
                    .col(ProductImages::Position)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_product_id_created_at")
                    .table(Reviews::Table)
                    .col(Reviews::ProductId)
                    .col(Reviews::CreatedAt)
                    .to_owned(),
            )
            .await?;

        for table in ["categories", "products", "reviews"] {
            db.execute_unprepared(&format!(
                "CREATE TRIGGER {table}_touch_updated_at \
                 BEFORE UPDATE ON {table} \
                 FOR EACH ROW EXECUTE FUNCTION util.touch_updated_at()"
            ))
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for table in ["reviews", "products", "categories"] {
            db.execute_unprepared(&format!(
                "DROP TRIGGER IF EXISTS {table}_touch_updated_at ON {table}"
            ))
            .await?;
        }

        manager
            .drop_table(Table::drop().table(Reviews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProductImages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(StockStatus::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
    Slug,
    Description,
    Image,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Name,
    Slug,
    Description,
    Price,
    StockQuantity,
    StockStatus,
    Sku,
    Weight,
    Dimensions,
    IsActive,
    IsFeatured,
    CategoryId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProductImages {
    Table,
    Id,
    ProductId,
    Image,
    AltText,
    IsPrimary,
    Position,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    ProductId,
    UserId,
    UserName,
    Rating,
    Title,
    Comment,
    IsVerifiedPurchase,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StockStatus {
    #[sea_orm(iden = "stock_status")]
    Enum,
    #[sea_orm(iden = "in_stock")]
    InStock,
    #[sea_orm(iden = "low_stock")]
    LowStock,
    #[sea_orm(iden = "out_of_stock")]
    OutOfStock,
}
