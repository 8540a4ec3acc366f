#![allow(dead_code)]

use ewallet_core::application::qr::QrPaymentCoordinator;
use ewallet_core::application::wallet_service::WalletService;
use ewallet_core::domain::payment_method::PaymentMethodId;
use ewallet_core::domain::wallet::ActorId;
use ewallet_core::infrastructure::gateway::SimulatedGateway;
use ewallet_core::infrastructure::in_memory::{
    InMemoryLedgerStore, InMemoryPaymentMethodStore, InMemoryWalletStore,
};
use ewallet_core::infrastructure::kyc::InMemoryKycGate;
use ewallet_core::infrastructure::notify::NullNotificationSink;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Fully wired in-memory stack. Concrete store handles are kept alongside
/// the services so tests can inspect ledger state directly.
pub struct Stack {
    pub service: WalletService,
    pub qr: QrPaymentCoordinator,
    pub wallets: Arc<InMemoryWalletStore>,
    pub ledger: Arc<InMemoryLedgerStore>,
    pub gateway: SimulatedGateway,
    pub kyc: Arc<InMemoryKycGate>,
}

pub fn stack() -> Stack {
    stack_with_ttl(chrono::Duration::minutes(15))
}

pub fn stack_with_ttl(token_ttl: chrono::Duration) -> Stack {
    let wallets = Arc::new(InMemoryWalletStore::new());
    let ledger = Arc::new(InMemoryLedgerStore::new());
    let methods = Arc::new(InMemoryPaymentMethodStore::new());
    let gateway = SimulatedGateway::new();
    let kyc = Arc::new(InMemoryKycGate::new(true));
    let notifier = Arc::new(NullNotificationSink::new());

    let service = WalletService::new(
        wallets.clone(),
        ledger.clone(),
        methods.clone(),
        Arc::new(gateway.clone()),
        kyc.clone(),
        notifier.clone(),
    );
    let qr = QrPaymentCoordinator::with_token_ttl(
        wallets.clone(),
        ledger.clone(),
        methods,
        Arc::new(gateway.clone()),
        notifier,
        token_ttl,
    );

    Stack {
        service,
        qr,
        wallets,
        ledger,
        gateway,
        kyc,
    }
}

pub async fn open_wallet(stack: &Stack, name: &str, opening_balance: Decimal) -> ActorId {
    let actor = ActorId::from(name);
    stack
        .service
        .create_wallet(actor.clone(), &format!("{name}@example.com"), opening_balance)
        .await
        .unwrap();
    actor
}

/// Registers a card at the gateway and attaches it to the actor's wallet.
pub async fn register_card(stack: &Stack, owner: &ActorId, id: &str) -> PaymentMethodId {
    let method = PaymentMethodId(id.to_string());
    stack
        .gateway
        .register_method(method.clone(), "visa", "4242")
        .await;
    stack
        .service
        .add_payment_method(owner, &method)
        .await
        .unwrap();
    method
}
