//! One-off rewrite of legacy `password_hash` values.
//!
//! Older deployments stored plaintext passwords in `password_hash`. Login
//! refuses those rows (they are not in the recognized hash format), so the
//! affected users cannot sign in until this migration has hashed them. It
//! runs offline through the `hash-legacy-passwords` binary, never in the
//! request path.

use proposta_db::store::{CredentialStore, StoreError};
use serde::Serialize;

use crate::auth::password::{hash_password, is_recognized_format, PasswordConfig};

/// What happened to each scanned row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub scanned: usize,
    /// Plaintext values hashed and written back.
    pub rehashed: usize,
    /// Already an accepted hash (Argon2id or bcrypt).
    pub already_hashed: usize,
    /// Other `$`-prefixed values from an unsupported hashing scheme. Left untouched.
    pub skipped_foreign: usize,
    /// Blank values. Left untouched.
    pub skipped_empty: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to hash password for user {user_id}: {message}")]
    Hash { user_id: String, message: String },
}

/// Hash every plaintext `password_hash` value in `store`.
///
/// Idempotent: a second run finds only hashed rows. bcrypt rows are left for
/// login to upgrade. Any other `$`-prefixed value is never treated as
/// plaintext, since hashing a foreign hash would lock that user out for good.
pub async fn migrate_legacy_passwords(
    store: &dyn CredentialStore,
    config: &PasswordConfig,
) -> Result<MigrationReport, MigrationError> {
    let mut report = MigrationReport::default();

    for user in store.list().await? {
        report.scanned += 1;
        let stored = user.password_hash.trim();

        if stored.is_empty() {
            tracing::warn!(user_id = %user.id, "Empty password hash; skipping");
            report.skipped_empty += 1;
            continue;
        }
        if is_recognized_format(stored) {
            report.already_hashed += 1;
            continue;
        }
        if stored.starts_with('$') {
            tracing::warn!(
                user_id = %user.id,
                "Password hash uses an unsupported scheme; user must reset their password"
            );
            report.skipped_foreign += 1;
            continue;
        }

        // Hash the value exactly as stored; plaintext is compared untrimmed at login.
        let hashed = hash_password(&user.password_hash, config).map_err(|e| MigrationError::Hash {
            user_id: user.id.to_string(),
            message: e.to_string(),
        })?;
        if store.update_password(user.id, &hashed).await? {
            report.rehashed += 1;
            tracing::info!(user_id = %user.id, "Rehashed legacy password");
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use proposta_db::models::user::CreateUser;
    use proposta_db::store::MemoryCredentialStore;

    use super::*;
    use crate::auth::password::verify_password;

    fn fast() -> PasswordConfig {
        PasswordConfig {
            cost: 1,
            memory_kib: 1024,
        }
    }

    async fn seed(store: &MemoryCredentialStore, email: &str, password_hash: &str) {
        store
            .insert(&CreateUser {
                name: email.to_string(),
                email: email.to_string(),
                cnpj_access: "12345678000190".to_string(),
                password_hash: password_hash.to_string(),
                role: "employee".to_string(),
            })
            .await
            .expect("seed insert should succeed");
    }

    #[tokio::test]
    async fn classifies_and_rehashes_rows() {
        let store = MemoryCredentialStore::new();
        let already = hash_password("already", &fast()).unwrap();
        seed(&store, "plain@empresa.com", "segredo123").await;
        seed(&store, "hashed@empresa.com", &already).await;
        seed(
            &store,
            "bcrypt@empresa.com",
            "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy",
        )
        .await;
        seed(&store, "md5crypt@empresa.com", "$1$saltsalt$qjXMvbEw8oaL.CzflDugX/").await;
        seed(&store, "blank@empresa.com", "   ").await;

        let report = migrate_legacy_passwords(&store, &fast()).await.unwrap();
        assert_eq!(
            report,
            MigrationReport {
                scanned: 5,
                rehashed: 1,
                already_hashed: 2,
                skipped_foreign: 1,
                skipped_empty: 1,
            }
        );

        let plain = store.find_by_email("plain@empresa.com").await.unwrap().unwrap();
        assert!(is_recognized_format(&plain.password_hash));
        assert!(verify_password("segredo123", &plain.password_hash).unwrap());

        let hashed = store.find_by_email("hashed@empresa.com").await.unwrap().unwrap();
        assert_eq!(hashed.password_hash, already);

        let bcrypt = store.find_by_email("bcrypt@empresa.com").await.unwrap().unwrap();
        assert!(bcrypt.password_hash.starts_with("$2b$"));

        let md5crypt = store.find_by_email("md5crypt@empresa.com").await.unwrap().unwrap();
        assert_eq!(md5crypt.password_hash, "$1$saltsalt$qjXMvbEw8oaL.CzflDugX/");
    }

    #[tokio::test]
    async fn second_run_changes_nothing() {
        let store = MemoryCredentialStore::new();
        seed(&store, "plain@empresa.com", "segredo123").await;

        let first = migrate_legacy_passwords(&store, &fast()).await.unwrap();
        assert_eq!(first.rehashed, 1);

        let second = migrate_legacy_passwords(&store, &fast()).await.unwrap();
        assert_eq!(second.rehashed, 0);
        assert_eq!(second.already_hashed, 1);
    }
}
