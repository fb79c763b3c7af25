use anyhow::{Context, Result};

use crate::config::Config;
use crate::order_service::OrderServiceClient;
use crate::services::SessionSigner;
use crate::trade::{PaymentRequest, TradeCodec};

pub struct ValidationReport {
    pub environment: bool,
    pub codec: bool,
    pub session: bool,
    pub order_service: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.codec && self.session && self.order_service
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Trade Codec:           {}", status(self.codec));
        println!("Admin Session Signer:  {}", status(self.session));
        println!("Order Service:         {}", status(self.order_service));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        codec: true,
        session: true,
        order_service: true,
        errors: Vec::new(),
    };

    if let Err(e) = config.validate() {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_codec(config) {
        report.codec = false;
        report.errors.push(format!("Trade codec: {:#}", e));
    }

    if let Err(e) = SessionSigner::new(&config.admin_session_secret, &config.admin_username) {
        report.session = false;
        report.errors.push(format!("Admin session: {}", e));
    }

    if let Err(e) = validate_order_service(config).await {
        report.order_service = false;
        report.errors.push(format!("Order service: {:#}", e));
    }

    report
}

/// Encrypts a probe request and reads it back with the configured keys.
fn validate_codec(config: &Config) -> Result<()> {
    let codec = TradeCodec::from_config(config)?;
    let probe = PaymentRequest::new(
        codec.merchant_id(),
        codec.version(),
        "STARTUPPROBE",
        1,
        "startup probe",
    );
    let envelope = codec.encode(&probe)?;
    codec
        .verify(&envelope.trade_info, &envelope.trade_sha)
        .context("signature does not verify")?;
    codec
        .decrypt(&envelope.trade_info)
        .context("ciphertext does not decrypt")?;
    Ok(())
}

/// Any HTTP answer counts as reachable; only transport failures fail.
async fn validate_order_service(config: &Config) -> Result<()> {
    let client = OrderServiceClient::from_config(config);
    let status = client
        .ping()
        .await
        .with_context(|| format!("cannot reach {}", client.base_url()))?;
    tracing::info!(status, "order service reachable");
    Ok(())
}
