use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ── Create sessions table ──
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sessions::UserId).string().not_null())
                    .col(
                        ColumnDef::new(Sessions::DeviceFingerprint)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Sessions::IpAddress).string().null())
                    .col(ColumnDef::new(Sessions::UserAgent).string().null())
                    .col(ColumnDef::new(Sessions::CreatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Sessions::LastAccessedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Sessions::ExpiresAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Sessions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Sessions::EndedAt).timestamp().null())
                    .col(ColumnDef::new(Sessions::EndReason).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_user_active")
                    .table(Sessions::Table)
                    .col(Sessions::UserId)
                    .col(Sessions::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_user_device")
                    .table(Sessions::Table)
                    .col(Sessions::UserId)
                    .col(Sessions::DeviceFingerprint)
                    .to_owned(),
            )
            .await?;

        // ── Create refresh_tokens table ──
        manager
            .create_table(
                Table::create()
                    .table(RefreshTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RefreshTokens::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RefreshTokens::UserId).string().not_null())
                    .col(
                        ColumnDef::new(RefreshTokens::TokenHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(RefreshTokens::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RefreshTokens::ExpiresAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RefreshTokens::IsUsed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(RefreshTokens::IsRevoked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(RefreshTokens::RevokedReason).string().null())
                    .col(ColumnDef::new(RefreshTokens::CreatedByIp).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_refresh_tokens_user")
                    .table(RefreshTokens::Table)
                    .col(RefreshTokens::UserId)
                    .to_owned(),
            )
            .await?;

        // ── Create login_events table ──
        manager
            .create_table(
                Table::create()
                    .table(LoginEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginEvents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginEvents::UserId).string().not_null())
                    .col(ColumnDef::new(LoginEvents::Success).boolean().not_null())
                    .col(ColumnDef::new(LoginEvents::FailureReason).string().null())
                    .col(ColumnDef::new(LoginEvents::IpAddress).string().null())
                    .col(ColumnDef::new(LoginEvents::UserAgent).string().null())
                    .col(
                        ColumnDef::new(LoginEvents::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LoginEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RefreshTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Sessions {
    Table,
    Id,
    UserId,
    DeviceFingerprint,
    IpAddress,
    UserAgent,
    CreatedAt,
    LastAccessedAt,
    ExpiresAt,
    IsActive,
    EndedAt,
    EndReason,
}

#[derive(Iden)]
enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    CreatedAt,
    ExpiresAt,
    IsUsed,
    IsRevoked,
    RevokedReason,
    CreatedByIp,
}

#[derive(Iden)]
enum LoginEvents {
    Table,
    Id,
    UserId,
    Success,
    FailureReason,
    IpAddress,
    UserAgent,
    CreatedAt,
}
