use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除任务表：每个短码最多一条任务，重复登记覆盖旧任务
        manager
            .create_table(
                Table::create()
                    .table(DeleteTask::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeleteTask::ShortUrl)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeleteTask::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(DeleteTask::Status)
                            .string_len(16)
                            .not_null()
                            .default("Registered"),
                    )
                    .col(
                        ColumnDef::new(DeleteTask::RegisteredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // worker 按状态轮询
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_delete_task_status")
                    .table(DeleteTask::Table)
                    .col(DeleteTask::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_delete_task_status").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(DeleteTask::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DeleteTask {
    Table,
    ShortUrl,
    UserId,
    Status,
    RegisteredAt,
}
