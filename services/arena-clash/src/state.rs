//! Document definitions

use arena_store::{doc_path, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const USERS: &str = "users";
pub const GAMES: &str = "games";
pub const TOURNAMENTS: &str = "tournaments";
pub const PARTICIPANTS: &str = "participants";
pub const TRANSACTIONS: &str = "transactions";
pub const NOTIFICATIONS: &str = "notifications";

/// Smallest wallet top-up
pub const MIN_DEPOSIT: Money = Money::from_rupees(1);

/// Largest single wallet top-up
pub const MAX_DEPOSIT: Money = Money::from_rupees(10_000);

/// Smallest withdrawal request
pub const MIN_WITHDRAWAL: Money = Money::from_rupees(50);

/// Longest order id the gateway accepts
pub const MAX_ORDER_ID_LEN: usize = 40;

pub fn user_path(uid: &str) -> String {
    doc_path(&[USERS, uid])
}

pub fn game_path(id: &str) -> String {
    doc_path(&[GAMES, id])
}

pub fn tournament_path(id: &str) -> String {
    doc_path(&[TOURNAMENTS, id])
}

pub fn participants_path(tournament_id: &str) -> String {
    doc_path(&[TOURNAMENTS, tournament_id, PARTICIPANTS])
}

pub fn participant_path(tournament_id: &str, uid: &str) -> String {
    doc_path(&[TOURNAMENTS, tournament_id, PARTICIPANTS, uid])
}

pub fn transaction_path(id: &str) -> String {
    doc_path(&[TRANSACTIONS, id])
}

pub fn notification_path(id: &str) -> String {
    doc_path(&[NOTIFICATIONS, id])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Player or admin profile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    /// Spendable balance; only changed inside transactions
    pub wallet_balance: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_game: Option<String>,
    /// Set once the first-run profile step is complete
    #[serde(default)]
    pub onboarded: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A game titles can be hosted for, with defaults for new tournaments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub name: String,
    pub cover_image: String,
    pub is_active: bool,
    pub gamemodes: Vec<String>,
    pub default_entry_fee: Money,
    pub default_prize_pool: Money,
    pub default_per_kill: Money,
    pub default_max_players: u32,
}

/// Tournament lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    #[default]
    Upcoming,
    Live,
    Completed,
}

impl TournamentStatus {
    /// Status only moves forward: upcoming -> live -> completed
    pub fn can_become(self, next: TournamentStatus) -> bool {
        use TournamentStatus::*;
        matches!(
            (self, next),
            (Upcoming, Upcoming)
                | (Upcoming, Live)
                | (Upcoming, Completed)
                | (Live, Live)
                | (Live, Completed)
                | (Completed, Completed)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentKind {
    #[default]
    Scrim,
    Championship,
}

/// In-game lobby details, shown to participants only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCredentials {
    pub room_id: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: String,
    /// Game document id
    pub game: String,
    pub title: String,
    pub map: String,
    pub entry_fee: Money,
    pub prize_pool: Money,
    pub per_kill: Money,
    pub starts_at: DateTime<Utc>,
    pub max_players: u32,
    /// Number of participant documents; changed only together with them
    pub current_players: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomCredentials>,
    pub status: TournamentStatus,
    #[serde(rename = "type")]
    pub kind: TournamentKind,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }
}

/// Entry of a user in a tournament, stored under the tournament
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub display_name: String,
    pub ingame_name: String,
    pub joined_at: DateTime<Utc>,
    pub fee_paid: Money,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Entry,
    Prize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// Wallet ledger entry
///
/// Deposits are keyed by their gateway order id so the webhook and the
/// status poll settle the same document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Money,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<String>,
    /// Bank reference reported by the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utr: Option<String>,
    /// Payout address for withdrawals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A completed ledger entry with a fresh id
    pub fn settled(
        user_id: &str,
        kind: TransactionKind,
        amount: Money,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            amount,
            status: TransactionStatus::Success,
            gateway_order_id: None,
            tournament_id: None,
            utr: None,
            upi_id: None,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: &str, title: &str, message: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            message,
            read: false,
            created_at: now,
        }
    }
}
