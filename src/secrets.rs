use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use vaultrs::auth::approle;
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::kv2;

use crate::config::Config;

/// Gateway keys as stored under `<kv_mount>/newebpay`.
pub struct TradeSecrets {
    pub hash_key: String,
    pub hash_iv: String,
}

/// Admin credentials as stored under `<kv_mount>/admin`.
pub struct AdminSecrets {
    pub password: String,
    pub session_secret: String,
}

/// True when AppRole credentials are present in the environment.
pub fn vault_configured() -> bool {
    ["VAULT_ADDR", "VAULT_ROLE_ID", "VAULT_SECRET_ID"]
        .iter()
        .all(|name| env::var(name).map(|v| !v.is_empty()).unwrap_or(false))
}

pub struct SecretsManager {
    client: VaultClient,
    kv_mount: String,
}

impl SecretsManager {
    pub async fn new() -> Result<Self> {
        let vault_addr = env::var("VAULT_ADDR").context("VAULT_ADDR is required")?;
        let role_id = env::var("VAULT_ROLE_ID").context("VAULT_ROLE_ID is required")?;
        let secret_id = env::var("VAULT_SECRET_ID").context("VAULT_SECRET_ID is required")?;
        let auth_mount = env::var("VAULT_AUTH_MOUNT").unwrap_or_else(|_| "approle".to_string());
        let kv_mount = env::var("VAULT_KV_MOUNT").unwrap_or_else(|_| "secret".to_string());

        let mut client = VaultClient::new(
            VaultClientSettingsBuilder::default()
                .address(&vault_addr)
                .build()
                .context("failed to build Vault client settings")?,
        )
        .context("failed to create Vault client")?;

        let auth = approle::login(&client, &auth_mount, &role_id, &secret_id)
            .await
            .context("failed to authenticate to Vault with AppRole")?;
        client.set_token(&auth.client_token);

        Ok(Self { client, kv_mount })
    }

    async fn read(&self, path: &str) -> Result<HashMap<String, String>> {
        kv2::read(&self.client, &self.kv_mount, path)
            .await
            .with_context(|| format!("failed to read {}/{} from Vault", self.kv_mount, path))
    }

    pub async fn get_trade_secrets(&self) -> Result<TradeSecrets> {
        let mut secret = self.read("newebpay").await?;
        Ok(TradeSecrets {
            hash_key: secret
                .remove("hash_key")
                .context("hash_key not found in Vault secret newebpay")?,
            hash_iv: secret
                .remove("hash_iv")
                .context("hash_iv not found in Vault secret newebpay")?,
        })
    }

    pub async fn get_admin_secrets(&self) -> Result<AdminSecrets> {
        let mut secret = self.read("admin").await?;
        Ok(AdminSecrets {
            password: secret
                .remove("password")
                .context("password not found in Vault secret admin")?,
            session_secret: secret
                .remove("session_secret")
                .context("session_secret not found in Vault secret admin")?,
        })
    }

    /// Overwrites the environment-provided secrets in `config`.
    pub async fn apply(&self, config: &mut Config) -> Result<()> {
        let trade = self.get_trade_secrets().await?;
        config.hash_key = trade.hash_key;
        config.hash_iv = trade.hash_iv;

        let admin = self.get_admin_secrets().await?;
        config.admin_password = admin.password;
        config.admin_session_secret = admin.session_secret;

        tracing::info!(kv_mount = %self.kv_mount, "loaded gateway and admin secrets from Vault");
        Ok(())
    }
}
