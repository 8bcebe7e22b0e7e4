use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240601_000001_create_materials_table::Migration)]
    }
}

mod m20240601_000001_create_materials_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_materials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::material Model
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Materials::BatchNumber).string().not_null())
                        .col(ColumnDef::new(Materials::MaterialName).string().not_null())
                        .col(ColumnDef::new(Materials::AlertQuantity).double().not_null())
                        .col(ColumnDef::new(Materials::UnitId).big_integer().not_null())
                        .col(ColumnDef::new(Materials::TaxRateId).big_integer().not_null())
                        .to_owned(),
                )
                .await?;

            // Backstop for the duplicate pre-check under concurrent writers
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materials_batch_number_material_name")
                        .table(Materials::Table)
                        .col(Materials::BatchNumber)
                        .col(Materials::MaterialName)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
        BatchNumber,
        MaterialName,
        AlertQuantity,
        UnitId,
        TaxRateId,
    }
}
