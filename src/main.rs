use std::net::SocketAddr;

use clap::Parser;
use giftbox_gateway::cli::{self, Cli, Commands, TradeCommands};
use giftbox_gateway::config::Config;
use giftbox_gateway::secrets::{self, SecretsManager};
use giftbox_gateway::{create_app, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    if secrets::vault_configured() {
        let vault = SecretsManager::new().await?;
        vault.apply(&mut config).await?;
    }

    match cli.command {
        Some(Commands::Config) => cli::handle_config_validate(&config).await,
        Some(Commands::Trade(TradeCommands::Encode {
            order_no,
            amount,
            item_desc,
            email,
        })) => cli::handle_trade_encode(&config, &order_no, amount, &item_desc, email),
        Some(Commands::Trade(TradeCommands::Decode {
            trade_info,
            trade_sha,
        })) => cli::handle_trade_decode(&config, &trade_info, trade_sha.as_deref()),
        Some(Commands::Serve) | None => serve(config).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!(
        merchant_id = %config.merchant_id,
        order_service = %config.order_service_url,
        encoding = %config.trade_encoding,
        "configuration validated"
    );

    let state = AppState::from_config(config)?;
    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
