use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20240101_000002_add_session_security;
mod m20240101_000003_add_password_reset;
mod m20240101_000004_add_email_verification;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_add_session_security::Migration),
            Box::new(m20240101_000003_add_password_reset::Migration),
            Box::new(m20240101_000004_add_email_verification::Migration),
        ]
    }
}
