//! Hash plaintext values left in `users.password_hash` by older deployments.
//!
//! Reads `DATABASE_URL` and the password hash settings from the environment
//! (and `.env`), runs once, and exits non-zero on failure.

use anyhow::Context;
use proposta_api::auth::password::PasswordConfig;
use proposta_api::config::{env_lookup, DatabaseConfig};
use proposta_api::migration::migrate_legacy_passwords;
use proposta_api::telemetry::init_tracing;
use proposta_db::store::PgCredentialStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("hash_legacy_passwords=info,proposta_api=info");

    let db_config = DatabaseConfig::from_env().context("Invalid database configuration")?;
    let password_config = PasswordConfig::from_lookup(&env_lookup)
        .context("Invalid password hash configuration")?;

    let pool = proposta_db::create_pool(&db_config.url, 1)
        .await
        .context("Failed to connect to database")?;
    let store = PgCredentialStore::new(pool.clone());

    let result = migrate_legacy_passwords(&store, &password_config).await;
    pool.close().await;

    let report = result.context("Failed to migrate legacy passwords")?;
    tracing::info!(
        scanned = report.scanned,
        rehashed = report.rehashed,
        already_hashed = report.already_hashed,
        skipped_foreign = report.skipped_foreign,
        skipped_empty = report.skipped_empty,
        "Legacy password migration finished"
    );
    Ok(())
}
