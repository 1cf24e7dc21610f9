use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 user 表
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(User::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 url 表
        manager
            .create_table(
                Table::create()
                    .table(Url::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Url::ShortUrl)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Url::OriginalUrl).string().not_null())
                    .col(ColumnDef::new(Url::Uuid).string().not_null())
                    .col(ColumnDef::new(Url::UserId).integer().null())
                    .col(
                        ColumnDef::new(Url::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        // original_url 唯一索引：并发插入同一原始链接时由数据库兜底
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_original_url")
                    .table(Url::Table)
                    .col(Url::OriginalUrl)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_user_id")
                    .table(Url::Table)
                    .col(Url::UserId)
                    .to_owned(),
            )
            .await?;

        // 创建 secret_key 表（认证子系统启动时读取）
        manager
            .create_table(
                Table::create()
                    .table(SecretKey::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SecretKey::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_url_user_id").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_url_original_url").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SecretKey::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Url::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Url {
    Table,
    ShortUrl,
    OriginalUrl,
    Uuid,
    UserId,
    IsDeleted,
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SecretKey {
    Table,
    Key,
}
