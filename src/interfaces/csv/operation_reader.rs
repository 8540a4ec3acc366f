use crate::domain::payment_method::PaymentMethodId;
use crate::domain::wallet::ActorId;
use crate::error::{Result, WalletError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// A scripted wallet operation, one CSV row each.
///
/// Columns: `op, actor, counterparty, amount, method`. The counterparty
/// column carries the contact address for `create` and the receiving actor
/// for `transfer`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create {
        actor: ActorId,
        email: String,
        initial_balance: Decimal,
    },
    Deposit {
        actor: ActorId,
        amount: Decimal,
        method: PaymentMethodId,
    },
    Withdraw {
        actor: ActorId,
        amount: Decimal,
    },
    Transfer {
        from: ActorId,
        to: ActorId,
        amount: Decimal,
    },
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    op: String,
    actor: String,
    #[serde(default)]
    counterparty: Option<String>,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    method: Option<String>,
}

impl TryFrom<RawOperation> for Operation {
    type Error = WalletError;

    fn try_from(raw: RawOperation) -> Result<Self> {
        let actor = ActorId::new(raw.actor);
        let require_amount = |field: Option<Decimal>| {
            field.ok_or_else(|| {
                WalletError::InvalidOperation(format!("{} requires an amount", raw.op))
            })
        };
        match raw.op.as_str() {
            "create" => Ok(Operation::Create {
                actor,
                email: raw.counterparty.filter(|s| !s.is_empty()).ok_or_else(|| {
                    WalletError::InvalidOperation("create requires a contact address".to_string())
                })?,
                initial_balance: raw.amount.unwrap_or(Decimal::ZERO),
            }),
            "deposit" => Ok(Operation::Deposit {
                actor,
                amount: require_amount(raw.amount)?,
                method: PaymentMethodId(raw.method.filter(|s| !s.is_empty()).ok_or_else(
                    || {
                        WalletError::InvalidOperation(
                            "deposit requires a payment method".to_string(),
                        )
                    },
                )?),
            }),
            "withdraw" => Ok(Operation::Withdraw {
                actor,
                amount: require_amount(raw.amount)?,
            }),
            "transfer" => Ok(Operation::Transfer {
                from: actor,
                to: raw
                    .counterparty
                    .filter(|s| !s.is_empty())
                    .map(ActorId::new)
                    .ok_or_else(|| {
                        WalletError::InvalidOperation(
                            "transfer requires a counterparty".to_string(),
                        )
                    })?,
                amount: require_amount(raw.amount)?,
            }),
            other => Err(WalletError::InvalidOperation(format!(
                "unknown operation '{other}'"
            ))),
        }
    }
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and tolerating short rows, and
/// yields operations lazily so large scripts stream.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize::<RawOperation>()
            .map(|result| result.map_err(WalletError::from).and_then(Operation::try_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, actor, counterparty, amount, method\n\
                    create, alice, alice@example.com, 100.0,\n\
                    deposit, alice, , 25.0, pm_card_visa\n\
                    withdraw, alice, , 10.0,\n\
                    transfer, alice, bob, 40.0,";
        let ops: Vec<Result<Operation>> = OperationReader::new(data.as_bytes())
            .operations()
            .collect();

        assert_eq!(ops.len(), 4);
        assert_eq!(
            *ops[0].as_ref().unwrap(),
            Operation::Create {
                actor: ActorId::from("alice"),
                email: "alice@example.com".to_string(),
                initial_balance: dec!(100.0),
            }
        );
        assert_eq!(
            *ops[3].as_ref().unwrap(),
            Operation::Transfer {
                from: ActorId::from("alice"),
                to: ActorId::from("bob"),
                amount: dec!(40.0),
            }
        );
    }

    #[test]
    fn test_reader_rejects_unknown_op() {
        let data = "op, actor, counterparty, amount, method\nburn, alice, , 1.0,";
        let ops: Vec<Result<Operation>> = OperationReader::new(data.as_bytes())
            .operations()
            .collect();
        assert!(matches!(ops[0], Err(WalletError::InvalidOperation(_))));
    }

    #[test]
    fn test_reader_requires_deposit_method() {
        let data = "op, actor, counterparty, amount, method\ndeposit, alice, , 1.0,";
        let ops: Vec<Result<Operation>> = OperationReader::new(data.as_bytes())
            .operations()
            .collect();
        assert!(matches!(ops[0], Err(WalletError::InvalidOperation(_))));
    }
}
