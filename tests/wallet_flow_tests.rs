mod common;

use common::{open_wallet, register_card, stack};
use ewallet_core::domain::ledger::{EntryKind, EntryStatus};
use ewallet_core::domain::money::Amount;
use ewallet_core::domain::ports::WalletStore;
use ewallet_core::error::{GatewayError, WalletError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_transfer_moves_funds_between_wallets() {
    let stack = stack();
    let alice = open_wallet(&stack, "alice", dec!(100.00)).await;
    let bob = open_wallet(&stack, "bob", Decimal::ZERO).await;

    let receipt = stack
        .service
        .transfer(&alice, &bob, Amount::new(dec!(40.00)).unwrap())
        .await
        .unwrap();

    assert_eq!(receipt.from_balance.value(), dec!(60.00));
    assert_eq!(receipt.to_balance.value(), dec!(40.00));
    assert_eq!(
        stack.service.get_balance(&alice).await.unwrap().value(),
        dec!(60.00)
    );
    assert_eq!(
        stack.service.get_balance(&bob).await.unwrap().value(),
        dec!(40.00)
    );

    let entries = stack.service.get_transactions(&bob).await.unwrap();
    let transfer = entries
        .iter()
        .find(|e| e.kind == EntryKind::Transfer)
        .unwrap();
    assert_eq!(transfer.status, EntryStatus::Completed);
    assert_eq!(transfer.amount.value(), dec!(40.00));
}

#[tokio::test]
async fn test_withdraw_insufficient_funds_leaves_no_entry() {
    let stack = stack();
    let alice = open_wallet(&stack, "alice", dec!(10.00)).await;
    let before = stack.service.get_transactions(&alice).await.unwrap().len();

    let err = stack
        .service
        .withdraw(&alice, Amount::new(dec!(25.00)).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WalletError::InsufficientFunds {
            available,
            requested,
        } if available == dec!(10.00) && requested == dec!(25.00)
    ));
    assert_eq!(
        stack.service.get_balance(&alice).await.unwrap().value(),
        dec!(10.00)
    );
    // The rejection happens before any ledger write.
    let after = stack.service.get_transactions(&alice).await.unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_deposit_settles_and_credits() {
    let stack = stack();
    let alice = open_wallet(&stack, "alice", Decimal::ZERO).await;
    let card = register_card(&stack, &alice, "pm_card_visa").await;

    let receipt = stack
        .service
        .deposit(&alice, Amount::new(dec!(50.00)).unwrap(), &card)
        .await
        .unwrap();

    assert_eq!(receipt.balance.value(), dec!(50.00));
    assert!(receipt.external_ref.starts_with("pi_"));

    let status = stack
        .service
        .get_payment_status(&alice, &receipt.external_ref)
        .await
        .unwrap();
    assert_eq!(status.status, EntryStatus::Completed);
    assert_eq!(status.kind, EntryKind::Deposit);
}

#[tokio::test]
async fn test_declined_deposit_fails_entry_without_credit() {
    let stack = stack();
    let alice = open_wallet(&stack, "alice", dec!(5.00)).await;
    let card = register_card(&stack, &alice, "pm_card_declined").await;
    stack.gateway.decline_method(card.clone()).await;

    let err = stack
        .service
        .deposit(&alice, Amount::new(dec!(50.00)).unwrap(), &card)
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::DepositNotSucceeded { .. }));
    assert_eq!(
        stack.service.get_balance(&alice).await.unwrap().value(),
        dec!(5.00)
    );
    let entries = stack.service.get_transactions(&alice).await.unwrap();
    let deposit = entries
        .iter()
        .find(|e| e.status == EntryStatus::Failed)
        .unwrap();
    assert_eq!(deposit.kind, EntryKind::Deposit);
}

#[tokio::test]
async fn test_gateway_timeout_leaves_entry_pending_and_retry_credits_once() {
    let stack = stack();
    let alice = open_wallet(&stack, "alice", Decimal::ZERO).await;
    let card = register_card(&stack, &alice, "pm_card_visa").await;

    stack.gateway.fail_next_call(GatewayError::Timeout).await;
    let err = stack
        .service
        .deposit(&alice, Amount::new(dec!(30.00)).unwrap(), &card)
        .await
        .unwrap_err();
    let entry_id = match err {
        WalletError::PendingReconciliation { entry } => entry,
        other => panic!("expected pending reconciliation, got {other}"),
    };

    // Indeterminate outcome: no credit, entry still pending.
    assert_eq!(
        stack.service.get_balance(&alice).await.unwrap().value(),
        Decimal::ZERO
    );

    let receipt = stack
        .service
        .retry_deposit(&alice, entry_id, &card)
        .await
        .unwrap();
    assert_eq!(receipt.balance.value(), dec!(30.00));
    assert_eq!(receipt.entry, entry_id);

    // A second retry is a no-op returning the settled receipt.
    let again = stack
        .service
        .retry_deposit(&alice, entry_id, &card)
        .await
        .unwrap();
    assert_eq!(again.external_ref, receipt.external_ref);
    assert_eq!(
        stack.service.get_balance(&alice).await.unwrap().value(),
        dec!(30.00)
    );
}

#[tokio::test]
async fn test_balance_matches_net_of_completed_entries() {
    let stack = stack();
    let alice = open_wallet(&stack, "alice", dec!(100.00)).await;
    let bob = open_wallet(&stack, "bob", Decimal::ZERO).await;
    let card = register_card(&stack, &alice, "pm_card_visa").await;

    stack
        .service
        .deposit(&alice, Amount::new(dec!(20.00)).unwrap(), &card)
        .await
        .unwrap();
    stack
        .service
        .transfer(&alice, &bob, Amount::new(dec!(35.00)).unwrap())
        .await
        .unwrap();
    stack
        .service
        .withdraw(&alice, Amount::new(dec!(15.00)).unwrap())
        .await
        .unwrap();
    // One rejected operation that must not appear in the net.
    stack
        .service
        .withdraw(&alice, Amount::new(dec!(1000.00)).unwrap())
        .await
        .unwrap_err();

    let wallet = stack.wallets.get(&alice).await.unwrap().unwrap();
    let mut net = Decimal::ZERO;
    for entry in stack.service.get_transactions(&alice).await.unwrap() {
        if entry.status != EntryStatus::Completed {
            continue;
        }
        if entry.destination == Some(wallet.id) {
            net += entry.amount.value();
        }
        if entry.source == Some(wallet.id) {
            net -= entry.amount.value();
        }
    }

    assert_eq!(net, dec!(70.00));
    assert_eq!(wallet.balance.value(), net);
}

#[tokio::test]
async fn test_payment_status_hidden_from_third_parties() {
    let stack = stack();
    let alice = open_wallet(&stack, "alice", Decimal::ZERO).await;
    let mallory = open_wallet(&stack, "mallory", Decimal::ZERO).await;
    let card = register_card(&stack, &alice, "pm_card_visa").await;

    let receipt = stack
        .service
        .deposit(&alice, Amount::new(dec!(10.00)).unwrap(), &card)
        .await
        .unwrap();

    let err = stack
        .service
        .get_payment_status(&mallory, &receipt.external_ref)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::TransactionNotFound { .. }));
}
