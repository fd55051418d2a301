//! Initial metadata schema
//!
//! - `users`: account name, object store bucket and display preferences
//! - `sessions`: signed-in session tokens
//! - `databases`: one row per (owner, database name)
//! - `database_versions`: one row per stored file, never updated

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::PasswordHash).string().null())
                    .col(ColumnDef::new(Users::MinioBucket).string().not_null())
                    .col(
                        ColumnDef::new(Users::PrefMaxRows)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Sessions::SessionToken)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Sessions::Username).string().not_null())
                    .col(
                        ColumnDef::new(Sessions::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sessions_username")
                            .from(Sessions::Table, Sessions::Username)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Databases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Databases::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Databases::Username)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Databases::Folder)
                            .string()
                            .not_null()
                            .default("/"),
                    )
                    .col(ColumnDef::new(Databases::Dbname).string().not_null())
                    .col(
                        ColumnDef::new(Databases::MinioBucket)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Databases::LastModified)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Databases::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_databases_username")
                            .from(Databases::Table, Databases::Username)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_databases_owner_name_unique")
                    .table(Databases::Table)
                    .col(Databases::Username)
                    .col(Databases::Dbname)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DatabaseVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DatabaseVersions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DatabaseVersions::DbId).integer().not_null())
                    .col(
                        ColumnDef::new(DatabaseVersions::Version)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DatabaseVersions::Size)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DatabaseVersions::Sha256).string().not_null())
                    .col(
                        ColumnDef::new(DatabaseVersions::Public)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(DatabaseVersions::MinioId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DatabaseVersions::LastModified)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_database_versions_db")
                            .from(DatabaseVersions::Table, DatabaseVersions::DbId)
                            .to(Databases::Table, Databases::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Versions are unique per database; also serves the "latest" lookup
        manager
            .create_index(
                Index::create()
                    .name("idx_database_versions_db_version_unique")
                    .table(DatabaseVersions::Table)
                    .col(DatabaseVersions::DbId)
                    .col(DatabaseVersions::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DatabaseVersions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Databases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    PasswordHash,
    MinioBucket,
    PrefMaxRows,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Sessions {
    Table,
    Id,
    SessionToken,
    Username,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Databases {
    Table,
    Id,
    Username,
    Folder,
    Dbname,
    MinioBucket,
    LastModified,
    CreatedAt,
}

#[derive(DeriveIden)]
enum DatabaseVersions {
    Table,
    Id,
    DbId,
    Version,
    Size,
    Sha256,
    Public,
    MinioId,
    LastModified,
}
