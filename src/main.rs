use clap::Parser;
use miette::{IntoDiagnostic, Result};
use remittance_engine::application::engine::{
    EngineStores, ExternalServices, RemittanceEngine, SendRemittanceRequest,
};
use remittance_engine::domain::remittance::{Remittance, RemittanceStatus};
use remittance_engine::infrastructure::in_memory::InMemoryStores;
use remittance_engine::infrastructure::providers::{
    InMemoryUserDirectory, SimulatedRemittanceProvider,
};
use remittance_engine::interfaces::cli::Cli;
use remittance_engine::interfaces::csv::command_reader::{Command, CommandReader};
use remittance_engine::interfaces::csv::wallet_writer::WalletWriter;
use remittance_engine::logging::init_logging;
use std::fs::File;
use std::io;
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "storage-rocksdb")]
fn open_stores(cli: &Cli) -> Result<EngineStores> {
    use remittance_engine::infrastructure::rocksdb::RocksDBStore;

    match &cli.db_path {
        Some(db_path) => Ok(RocksDBStore::open(db_path)
            .into_diagnostic()?
            .into_engine_stores()),
        None => Ok(InMemoryStores::new().into_engine_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(cli: &Cli) -> Result<EngineStores> {
    if cli.db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(InMemoryStores::new().into_engine_stores())
}

async fn run(
    engine: &RemittanceEngine,
    users: &InMemoryUserDirectory,
    command: Command,
) -> remittance_engine::error::Result<()> {
    match command {
        Command::Register(profile) => {
            info!(user_id = %profile.id, "registering user");
            users.register(profile).await;
        }
        Command::Deposit {
            request,
            idempotency_key,
        } => {
            engine
                .deposit(request, idempotency_key.as_deref())
                .await?;
        }
        Command::Remit {
            user,
            from,
            to,
            amount,
            recipient_email,
            recipient_name,
            idempotency_key,
        } => {
            let quote = engine.quotes().create(user, &from, &to, amount).await?;
            let response = engine
                .send_remittance(
                    SendRemittanceRequest {
                        quote_id: quote.id,
                        recipient_email,
                        recipient_name,
                        recipient_phone: None,
                    },
                    idempotency_key.as_deref(),
                )
                .await?;
            let remittance: Remittance = response.decode()?;
            if remittance.status == RemittanceStatus::Failed {
                warn!(
                    remittance_id = %remittance.id,
                    reason = remittance.error_message.as_deref().unwrap_or_default(),
                    "remittance failed"
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);
    let config = cli.engine_config();
    config.validate().into_diagnostic()?;

    let stores = open_stores(&cli)?;
    let users = Arc::new(InMemoryUserDirectory::new());
    let provider = SimulatedRemittanceProvider::new(
        cli.provider_success_rate,
        cli.provider_latency_ms.clone(),
    );
    let engine = RemittanceEngine::new(
        stores,
        ExternalServices {
            rates: Arc::new(cli.rate_table()),
            users: users.clone(),
            provider: Arc::new(provider),
        },
        &config,
    );

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = run(&engine, &users, command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let wallets = engine.wallets().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = WalletWriter::new(stdout.lock());
    writer.write_wallets(&wallets).into_diagnostic()?;

    Ok(())
}
