use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for statement in [
            "ALTER TABLE users ADD COLUMN IF NOT EXISTS refresh_token VARCHAR(64) NULL",
            "ALTER TABLE users ADD COLUMN IF NOT EXISTS failed_login_attempts INTEGER NOT NULL DEFAULT 0",
            "ALTER TABLE users ADD COLUMN IF NOT EXISTS lock_until TIMESTAMP NULL",
            "ALTER TABLE users ADD COLUMN IF NOT EXISTS last_login TIMESTAMP NULL",
            "ALTER TABLE users ADD COLUMN IF NOT EXISTS last_password_change TIMESTAMP NULL",
        ] {
            db.execute_unprepared(statement).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for column in [
            "refresh_token",
            "failed_login_attempts",
            "lock_until",
            "last_login",
            "last_password_change",
        ] {
            db.execute_unprepared(&format!("ALTER TABLE users DROP COLUMN IF EXISTS {column}"))
                .await?;
        }

        Ok(())
    }
}
