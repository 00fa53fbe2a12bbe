use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};

use crate::db::{models::EncryptedSecret, Database};

impl Database {
    /// Last write wins; there is no ciphertext history.
    pub async fn save_secret(&self, secret: EncryptedSecret) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO encrypted_secrets (alias, iv, ciphertext)
                 VALUES (?1, ?2, ?3)",
                params![secret.alias, secret.iv, secret.ciphertext],
            )
            .with_context(|| "failed to save encrypted secret")?;
            Ok(())
        })
        .await
    }

    pub async fn get_secret(&self, alias: &str) -> Result<Option<EncryptedSecret>> {
        let alias = alias.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT alias, iv, ciphertext FROM encrypted_secrets WHERE alias = ?1",
            )?;

            let secret = stmt
                .query_row(params![alias], |row| {
                    Ok(EncryptedSecret {
                        alias: row.get("alias")?,
                        iv: row.get("iv")?,
                        ciphertext: row.get("ciphertext")?,
                    })
                })
                .optional()?;
            Ok(secret)
        })
        .await
    }
}
