//! Wallet instructions: top-up, settlement, withdrawal

use arena_store::{Backend, Money, Store};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{require, ArenaError, Result};
use crate::state::{
    notification_path, transaction_path, user_path, Notification, Transaction, TransactionKind,
    TransactionStatus, User, MAX_DEPOSIT, MAX_ORDER_ID_LEN, MIN_DEPOSIT, MIN_WITHDRAWAL,
    TRANSACTIONS,
};

/// What the gateway says happened to an order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DepositOutcome {
    /// Money received; `amount` when the gateway reports one
    Paid {
        amount: Option<Money>,
        utr: Option<String>,
    },
    Pending,
    Failed { reason: Option<String> },
}

/// Result of one settlement attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Settlement {
    #[serde(rename_all = "camelCase")]
    Credited { amount: Money, balance: Money },
    MarkedFailed,
    StillPending,
    /// The record had already left `pending`; nothing changed
    AlreadyProcessed { status: TransactionStatus },
}

/// Fresh gateway order id: `AC` + UTC timestamp + random suffix
pub fn new_order_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "AC{}{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        suffix[..8].to_ascii_uppercase()
    )
}

fn validate_order_id(order_id: &str) -> Result<()> {
    require!(
        !order_id.is_empty()
            && order_id.len() <= MAX_ORDER_ID_LEN
            && order_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-'),
        ArenaError::invalid("Order id must be 1-40 letters, digits, '_' or '-'")
    );
    Ok(())
}

/// Record a pending deposit before the player is sent to the gateway
pub fn open_deposit<B: Backend>(
    store: &Store<B>,
    uid: &str,
    amount: Money,
    order_id: &str,
) -> Result<Transaction> {
    require!(
        amount >= MIN_DEPOSIT && amount <= MAX_DEPOSIT,
        ArenaError::AmountOutOfRange {
            min: MIN_DEPOSIT,
            max: MAX_DEPOSIT,
        }
    );
    validate_order_id(order_id)?;

    let u_path = user_path(uid);
    let t_path = transaction_path(order_id);

    let record = store.run_transaction(|tx| -> Result<Transaction> {
        require!(tx.exists(&u_path)?, ArenaError::UserNotFound);
        require!(
            !tx.exists(&t_path)?,
            ArenaError::invalid("Order id already used")
        );

        let now = Utc::now();
        let record = Transaction {
            id: order_id.to_string(),
            user_id: uid.to_string(),
            kind: TransactionKind::Deposit,
            amount,
            status: TransactionStatus::Pending,
            gateway_order_id: Some(order_id.to_string()),
            tournament_id: None,
            utr: None,
            upi_id: None,
            description: format!("Wallet top-up of {amount}"),
            created_at: now,
            updated_at: now,
        };
        tx.set(&t_path, &record)?;
        Ok(record)
    })?;

    tracing::info!(uid, order_id, %amount, "deposit opened");
    Ok(record)
}

/// Apply a gateway outcome to a deposit exactly once
///
/// Safe to call from the webhook and the status poll concurrently: the
/// pending check and the credit commit together, so a second caller always
/// sees `AlreadyProcessed`.
pub fn settle_deposit<B: Backend>(
    store: &Store<B>,
    order_id: &str,
    outcome: &DepositOutcome,
) -> Result<Settlement> {
    let t_path = transaction_path(order_id);

    let settlement = store.run_transaction(|tx| -> Result<Settlement> {
        let mut record: Transaction = tx.get(&t_path)?.ok_or(ArenaError::TransactionNotFound)?;
        require!(
            record.kind == TransactionKind::Deposit,
            ArenaError::invalid("Not a deposit")
        );
        if record.status != TransactionStatus::Pending {
            return Ok(Settlement::AlreadyProcessed {
                status: record.status,
            });
        }

        let now = Utc::now();
        match outcome {
            DepositOutcome::Pending => Ok(Settlement::StillPending),
            DepositOutcome::Failed { .. } => {
                record.status = TransactionStatus::Failed;
                record.updated_at = now;
                tx.set(&t_path, &record)?;
                Ok(Settlement::MarkedFailed)
            }
            DepositOutcome::Paid { amount, utr } => {
                let u_path = user_path(&record.user_id);
                let mut user: User = tx.get(&u_path)?.ok_or(ArenaError::UserNotFound)?;

                if let Some(reported) = *amount {
                    require!(
                        reported == record.amount,
                        ArenaError::AmountMismatch {
                            expected: record.amount,
                            reported,
                        }
                    );
                }

                user.wallet_balance = user
                    .wallet_balance
                    .checked_add(record.amount)
                    .ok_or(ArenaError::Overflow)?;
                record.status = TransactionStatus::Success;
                record.utr = utr.clone();
                record.updated_at = now;

                let notice = Notification::new(
                    &record.user_id,
                    "Deposit successful",
                    format!("{} has been added to your wallet", record.amount),
                    now,
                );

                tx.set(&t_path, &record)?;
                tx.set(&u_path, &user)?;
                tx.set(&notification_path(&notice.id), &notice)?;
                Ok(Settlement::Credited {
                    amount: record.amount,
                    balance: user.wallet_balance,
                })
            }
        }
    })?;

    match (&settlement, outcome) {
        (Settlement::Credited { amount, balance }, _) => {
            tracing::info!(order_id, %amount, %balance, "deposit credited");
        }
        (Settlement::MarkedFailed, DepositOutcome::Failed { reason }) => {
            tracing::info!(
                order_id,
                reason = reason.as_deref().unwrap_or("unspecified"),
                "deposit failed"
            );
        }
        (Settlement::AlreadyProcessed { status }, _) => {
            tracing::info!(order_id, ?status, "deposit already settled, ignoring");
        }
        _ => {}
    }
    Ok(settlement)
}

/// Move `amount` out of the wallet into a pending withdrawal
///
/// The balance is held immediately; a rejected withdrawal refunds it.
pub fn request_withdrawal<B: Backend>(
    store: &Store<B>,
    uid: &str,
    amount: Money,
    upi_id: &str,
) -> Result<Transaction> {
    require!(
        amount >= MIN_WITHDRAWAL,
        ArenaError::invalid(format!("Minimum withdrawal is {MIN_WITHDRAWAL}"))
    );
    let upi_id = upi_id.trim();
    require!(
        upi_id.len() >= 3 && upi_id.contains('@') && !upi_id.contains(char::is_whitespace),
        ArenaError::invalid("Enter a valid UPI id")
    );

    let u_path = user_path(uid);
    let record = store.run_transaction(|tx| -> Result<Transaction> {
        let mut user: User = tx.get(&u_path)?.ok_or(ArenaError::UserNotFound)?;
        user.wallet_balance =
            user.wallet_balance
                .checked_sub(amount)
                .ok_or(ArenaError::InsufficientBalance {
                    needed: amount,
                    available: user.wallet_balance,
                })?;

        let now = Utc::now();
        let mut record = Transaction::settled(
            uid,
            TransactionKind::Withdrawal,
            amount,
            format!("Withdrawal to {upi_id}"),
            now,
        );
        record.status = TransactionStatus::Pending;
        record.upi_id = Some(upi_id.to_string());

        tx.set(&u_path, &user)?;
        tx.set(&transaction_path(&record.id), &record)?;
        Ok(record)
    })?;

    tracing::info!(uid, id = %record.id, %amount, "withdrawal requested");
    Ok(record)
}

/// Wallet balance and the caller's ledger, newest first
pub fn wallet_view<B: Backend>(store: &Store<B>, uid: &str) -> Result<(Money, Vec<Transaction>)> {
    let user: User = store.get(&user_path(uid))?.ok_or(ArenaError::UserNotFound)?;
    let mut history: Vec<Transaction> = store
        .list::<Transaction>(TRANSACTIONS)?
        .into_iter()
        .filter(|t| t.user_id == uid)
        .collect();
    history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok((user.wallet_balance, history))
}
