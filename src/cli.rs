use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::trade::{PaymentRequest, TradeCodec};

#[derive(Parser)]
#[command(name = "giftbox-gateway")]
#[command(about = "Gift box storefront payment gateway bridge", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Print the startup validation report and exit
    Config,

    /// Encrypt or decrypt gateway trade payloads with the configured keys
    #[command(subcommand)]
    Trade(TradeCommands),
}

#[derive(Subcommand)]
pub enum TradeCommands {
    /// Build a payment request and print the signed envelope
    Encode {
        /// Merchant order number
        #[arg(long)]
        order_no: String,

        /// Amount in whole TWD
        #[arg(long)]
        amount: u64,

        /// Item description shown on the gateway page
        #[arg(long, default_value = "禮盒")]
        item_desc: String,

        /// Customer email
        #[arg(long)]
        email: Option<String>,
    },

    /// Decrypt a TradeInfo value and print its contents
    Decode {
        /// Ciphertext as sent by the gateway
        #[arg(value_name = "TRADE_INFO")]
        trade_info: String,

        /// Verify this TradeSha before decrypting
        #[arg(long)]
        trade_sha: Option<String>,
    },
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port:         {}", config.server_port);
    println!("  Merchant ID:         {}", config.merchant_id);
    println!("  Trade Version:       {}", config.trade_version);
    println!("  Trade Encoding:      {}", config.trade_encoding);
    println!("  Hash Key:            {}", mask_secret(&config.hash_key));
    println!("  Hash IV:             {}", mask_secret(&config.hash_iv));
    println!("  Order Service URL:   {}", config.order_service_url);
    println!("  Order Service Wait:  {}s", config.order_service_timeout.as_secs());
    println!("  Payment Result Path: {}", config.payment_result_path);
    println!("  Admin Username:      {}", config.admin_username);

    let report = crate::startup::validate_environment(config).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("configuration is invalid");
    }
    Ok(())
}

pub fn handle_trade_encode(
    config: &Config,
    order_no: &str,
    amount: u64,
    item_desc: &str,
    email: Option<String>,
) -> anyhow::Result<()> {
    let codec = TradeCodec::from_config(config)?;
    let mut request = PaymentRequest::new(
        codec.merchant_id(),
        codec.version(),
        order_no,
        amount,
        item_desc,
    );
    request.email = email;

    let envelope = codec.encode(&request)?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

pub fn handle_trade_decode(
    config: &Config,
    trade_info: &str,
    trade_sha: Option<&str>,
) -> anyhow::Result<()> {
    let codec = TradeCodec::from_config(config)?;
    if let Some(trade_sha) = trade_sha {
        codec.verify(trade_info, trade_sha)?;
        println!("✓ TradeSha verified");
    }

    let plaintext = codec.decrypt(trade_info)?;
    match serde_json::from_slice::<serde_json::Value>(&plaintext) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", String::from_utf8_lossy(&plaintext)),
    }

    let outcome = codec.decode(trade_info)?;
    println!(
        "status={} merchant_order_no={} amount={}",
        outcome.status,
        outcome.merchant_order_no().unwrap_or("-"),
        outcome
            .amount()
            .map(|amount| amount.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    Ok(())
}

fn mask_secret(secret: &str) -> String {
    match secret.len() {
        0 => "(unset)".to_string(),
        len if len <= 4 => "****".to_string(),
        len => format!("{}**** ({} bytes)", secret.chars().take(2).collect::<String>(), len),
    }
}
