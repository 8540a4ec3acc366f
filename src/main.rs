use clap::Parser;
use ewallet_core::application::wallet_service::WalletService;
use ewallet_core::domain::money::Amount;
use ewallet_core::infrastructure::gateway::SimulatedGateway;
use ewallet_core::infrastructure::in_memory::{
    InMemoryLedgerStore, InMemoryPaymentMethodStore, InMemoryWalletStore,
};
use ewallet_core::infrastructure::kyc::InMemoryKycGate;
use ewallet_core::infrastructure::notify::LoggingNotificationSink;
use ewallet_core::interfaces::csv::balance_writer::BalanceWriter;
use ewallet_core::interfaces::csv::operation_reader::{Operation, OperationReader};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Reject wallet creation for actors without explicit KYC approval,
    /// instead of auto-approving everyone.
    #[arg(long)]
    require_kyc: bool,
}

async fn apply(
    service: &WalletService,
    gateway: &SimulatedGateway,
    op: Operation,
) -> ewallet_core::error::Result<()> {
    match op {
        Operation::Create {
            actor,
            email,
            initial_balance,
        } => {
            service.create_wallet(actor, &email, initial_balance).await?;
        }
        Operation::Deposit {
            actor,
            amount,
            method,
        } => {
            // The simulated gateway recognises any scripted method.
            gateway.register_method(method.clone(), "visa", "4242").await;
            service.add_payment_method(&actor, &method).await?;
            service.deposit(&actor, Amount::new(amount)?, &method).await?;
        }
        Operation::Withdraw { actor, amount } => {
            service.withdraw(&actor, Amount::new(amount)?).await?;
        }
        Operation::Transfer { from, to, amount } => {
            service.transfer(&from, &to, Amount::new(amount)?).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let wallets = Arc::new(InMemoryWalletStore::new());
    let gateway = SimulatedGateway::new();
    let service = WalletService::new(
        wallets.clone(),
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(InMemoryPaymentMethodStore::new()),
        Arc::new(gateway.clone()),
        Arc::new(InMemoryKycGate::new(!cli.require_kyc)),
        Arc::new(LoggingNotificationSink::new()),
    );

    let file = File::open(&cli.input).into_diagnostic()?;
    for op_result in OperationReader::new(file).operations() {
        match op_result {
            Ok(op) => {
                if let Err(e) = apply(&service, &gateway, op).await {
                    tracing::warn!(error = %e, "operation failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not read operation"),
        }
    }

    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_balances(wallets.all().await).into_diagnostic()?;

    Ok(())
}
