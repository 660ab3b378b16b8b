//! Admin instructions

use arena_store::{Backend, Money, Store};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{require, ArenaError, Result};
use crate::state::{
    game_path, notification_path, participant_path, participants_path, tournament_path,
    transaction_path, user_path, Game, Notification, Participant, Role, RoomCredentials,
    Tournament, TournamentKind, TournamentStatus, Transaction, TransactionKind,
    TransactionStatus, User, USERS,
};

/// Largest lobby a tournament may be created with
pub const MAX_PLAYERS_LIMIT: u32 = 1_000;

/// Load the caller and fail unless they are an admin
pub fn ensure_admin<B: Backend>(store: &Store<B>, uid: &str) -> Result<User> {
    let user: Option<User> = store.get(&user_path(uid))?;
    match user {
        Some(user) if user.is_admin() => Ok(user),
        _ => Err(ArenaError::Unauthorized),
    }
}

/// Promote `uid` to admin at startup, creating a bare profile if needed
pub fn bootstrap_admin<B: Backend>(store: &Store<B>, uid: &str) -> Result<User> {
    let u_path = user_path(uid);
    let admin = store.run_transaction(|tx| -> Result<User> {
        let user = match tx.get::<User>(&u_path)? {
            Some(user) if user.is_admin() => return Ok(user),
            Some(mut user) => {
                user.role = Role::Admin;
                user
            }
            None => User {
                uid: uid.to_string(),
                email: String::new(),
                display_name: "Admin".to_string(),
                role: Role::Admin,
                wallet_balance: Money::ZERO,
                favorite_game: None,
                onboarded: false,
                created_at: Utc::now(),
            },
        };
        tx.set(&u_path, &user)?;
        Ok(user)
    })?;
    tracing::info!(uid, "bootstrap admin ready");
    Ok(admin)
}

fn validate_slug(id: &str) -> Result<()> {
    require!(
        !id.is_empty()
            && id.len() <= 40
            && id
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_'),
        ArenaError::invalid("Id must be 1-40 lowercase letters, digits, '-' or '_'")
    );
    Ok(())
}

fn validate_max_players(max_players: u32) -> Result<()> {
    require!(
        (1..=MAX_PLAYERS_LIMIT).contains(&max_players),
        ArenaError::invalid(format!("Max players must be between 1 and {MAX_PLAYERS_LIMIT}"))
    );
    Ok(())
}

fn non_blank(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    require!(!value.is_empty(), ArenaError::invalid(format!("{field} is required")));
    Ok(value.to_string())
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameParams {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub gamemodes: Vec<String>,
    pub default_entry_fee: Money,
    pub default_prize_pool: Money,
    pub default_per_kill: Money,
    pub default_max_players: u32,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameParams {
    pub name: Option<String>,
    pub cover_image: Option<String>,
    pub is_active: Option<bool>,
    pub gamemodes: Option<Vec<String>>,
    pub default_entry_fee: Option<Money>,
    pub default_prize_pool: Option<Money>,
    pub default_per_kill: Option<Money>,
    pub default_max_players: Option<u32>,
}

pub fn create_game<B: Backend>(store: &Store<B>, params: CreateGameParams) -> Result<Game> {
    let CreateGameParams {
        id,
        name,
        cover_image,
        is_active,
        gamemodes,
        default_entry_fee,
        default_prize_pool,
        default_per_kill,
        default_max_players,
    } = params;

    validate_slug(&id)?;
    validate_max_players(default_max_players)?;
    let game = Game {
        name: non_blank(&name, "Game name")?,
        id,
        cover_image,
        is_active,
        gamemodes,
        default_entry_fee,
        default_prize_pool,
        default_per_kill,
        default_max_players,
    };

    let g_path = game_path(&game.id);
    store.run_transaction(|tx| -> Result<()> {
        require!(!tx.exists(&g_path)?, ArenaError::invalid("A game with this id already exists"));
        tx.set(&g_path, &game)?;
        Ok(())
    })?;

    tracing::info!(id = %game.id, name = %game.name, "game created");
    Ok(game)
}

pub fn update_game<B: Backend>(
    store: &Store<B>,
    game_id: &str,
    params: UpdateGameParams,
) -> Result<Game> {
    let UpdateGameParams {
        name,
        cover_image,
        is_active,
        gamemodes,
        default_entry_fee,
        default_prize_pool,
        default_per_kill,
        default_max_players,
    } = params;

    let name = name.as_deref().map(|n| non_blank(n, "Game name")).transpose()?;
    if let Some(max) = default_max_players {
        validate_max_players(max)?;
    }

    let g_path = game_path(game_id);
    let game = store.run_transaction(|tx| -> Result<Game> {
        let mut game: Game = tx.get(&g_path)?.ok_or(ArenaError::GameNotFound)?;

        if let Some(n) = &name {
            game.name = n.clone();
        }
        if let Some(url) = &cover_image {
            game.cover_image = url.clone();
        }
        if let Some(active) = is_active {
            game.is_active = active;
        }
        if let Some(modes) = &gamemodes {
            game.gamemodes = modes.clone();
        }
        if let Some(fee) = default_entry_fee {
            game.default_entry_fee = fee;
        }
        if let Some(pool) = default_prize_pool {
            game.default_prize_pool = pool;
        }
        if let Some(per_kill) = default_per_kill {
            game.default_per_kill = per_kill;
        }
        if let Some(max) = default_max_players {
            game.default_max_players = max;
        }

        tx.set(&g_path, &game)?;
        Ok(game)
    })?;

    tracing::info!(id = game_id, active = game.is_active, "game updated");
    Ok(game)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentParams {
    pub game: String,
    pub title: String,
    pub map: String,
    pub starts_at: DateTime<Utc>,
    /// Defaults below fall back to the game's settings
    #[serde(default)]
    pub entry_fee: Option<Money>,
    #[serde(default)]
    pub prize_pool: Option<Money>,
    #[serde(default)]
    pub per_kill: Option<Money>,
    #[serde(default)]
    pub max_players: Option<u32>,
    #[serde(default, rename = "type")]
    pub kind: TournamentKind,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTournamentParams {
    pub title: Option<String>,
    pub map: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub entry_fee: Option<Money>,
    pub prize_pool: Option<Money>,
    pub per_kill: Option<Money>,
    pub max_players: Option<u32>,
    pub status: Option<TournamentStatus>,
    pub room: Option<RoomCredentials>,
}

pub fn create_tournament<B: Backend>(
    store: &Store<B>,
    params: CreateTournamentParams,
) -> Result<Tournament> {
    let title = non_blank(&params.title, "Title")?;
    let map = non_blank(&params.map, "Map")?;
    if let Some(max) = params.max_players {
        validate_max_players(max)?;
    }

    let id = Uuid::new_v4().to_string();
    let t_path = tournament_path(&id);
    let tournament = store.run_transaction(|tx| -> Result<Tournament> {
        let game: Game = tx.get(&game_path(&params.game))?.ok_or(ArenaError::GameNotFound)?;
        require!(game.is_active, ArenaError::GameInactive);

        let tournament = Tournament {
            id: id.clone(),
            game: game.id.clone(),
            title: title.clone(),
            map: map.clone(),
            entry_fee: params.entry_fee.unwrap_or(game.default_entry_fee),
            prize_pool: params.prize_pool.unwrap_or(game.default_prize_pool),
            per_kill: params.per_kill.unwrap_or(game.default_per_kill),
            starts_at: params.starts_at,
            max_players: params.max_players.unwrap_or(game.default_max_players),
            current_players: 0,
            room: None,
            status: TournamentStatus::Upcoming,
            kind: params.kind,
            created_at: Utc::now(),
        };
        tx.set(&t_path, &tournament)?;
        Ok(tournament)
    })?;

    tracing::info!(
        id = %tournament.id,
        game = %tournament.game,
        fee = %tournament.entry_fee,
        max = tournament.max_players,
        "tournament created"
    );
    Ok(tournament)
}

/// Apply admin edits; returns the tournament and how many players were notified
///
/// Status may only move forward and capacity may not drop below the current
/// roster. New room credentials and the participant notifications commit together.
pub fn update_tournament<B: Backend>(
    store: &Store<B>,
    tournament_id: &str,
    params: UpdateTournamentParams,
) -> Result<(Tournament, usize)> {
    let UpdateTournamentParams {
        title,
        map,
        starts_at,
        entry_fee,
        prize_pool,
        per_kill,
        max_players,
        status,
        room,
    } = params;

    let title = title.as_deref().map(|t| non_blank(t, "Title")).transpose()?;
    let map = map.as_deref().map(|m| non_blank(m, "Map")).transpose()?;
    if let Some(max) = max_players {
        validate_max_players(max)?;
    }
    if let Some(creds) = &room {
        require!(
            !creds.room_id.trim().is_empty() && !creds.password.trim().is_empty(),
            ArenaError::invalid("Room id and password are required")
        );
    }

    let t_path = tournament_path(tournament_id);
    let (tournament, notified) = store.run_transaction(|tx| -> Result<(Tournament, usize)> {
        let mut tournament: Tournament =
            tx.get(&t_path)?.ok_or(ArenaError::TournamentNotFound)?;

        if let Some(next) = status {
            require!(
                tournament.status.can_become(next),
                ArenaError::invalid(format!(
                    "Status cannot go from {:?} to {:?}",
                    tournament.status, next
                ))
            );
            tournament.status = next;
        }
        if let Some(max) = max_players {
            require!(
                max >= tournament.current_players,
                ArenaError::invalid(format!(
                    "{} players have already joined",
                    tournament.current_players
                ))
            );
            tournament.max_players = max;
        }
        if let Some(t) = &title {
            tournament.title = t.clone();
        }
        if let Some(m) = &map {
            tournament.map = m.clone();
        }
        if let Some(at) = starts_at {
            tournament.starts_at = at;
        }
        if let Some(fee) = entry_fee {
            tournament.entry_fee = fee;
        }
        if let Some(pool) = prize_pool {
            tournament.prize_pool = pool;
        }
        if let Some(pk) = per_kill {
            tournament.per_kill = pk;
        }
        let published = match &room {
            Some(creds) if tournament.room.as_ref() != Some(creds) => {
                tournament.room = Some(creds.clone());
                true
            }
            _ => false,
        };
        let participants: Vec<Participant> = if published {
            store.list(&participants_path(tournament_id))?
        } else {
            Vec::new()
        };

        tx.set(&t_path, &tournament)?;
        let now = Utc::now();
        let message = format!("Room id and password for {} are now available", tournament.title);
        for p in &participants {
            let note = Notification::new(&p.user_id, "Room details are out", message.clone(), now);
            tx.set(&notification_path(&note.id), &note)?;
        }
        Ok((tournament, participants.len()))
    })?;

    tracing::info!(
        id = tournament_id,
        status = ?tournament.status,
        notified,
        "tournament updated"
    );
    Ok((tournament, notified))
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardPrizeParams {
    pub user_id: String,
    pub amount: Money,
    #[serde(default)]
    pub note: Option<String>,
}

/// Credit a participant's winnings
pub fn award_prize<B: Backend>(
    store: &Store<B>,
    tournament_id: &str,
    params: &AwardPrizeParams,
) -> Result<Transaction> {
    require!(!params.amount.is_zero(), ArenaError::invalid("Prize amount must be positive"));

    let uid = params.user_id.as_str();
    let t_path = tournament_path(tournament_id);
    let u_path = user_path(uid);
    let p_path = participant_path(tournament_id, uid);

    let record = store.run_transaction(|tx| -> Result<Transaction> {
        let tournament: Tournament = tx.get(&t_path)?.ok_or(ArenaError::TournamentNotFound)?;
        let mut user: User = tx.get(&u_path)?.ok_or(ArenaError::UserNotFound)?;
        require!(tx.exists(&p_path)?, ArenaError::NotParticipant);

        user.wallet_balance = user
            .wallet_balance
            .checked_add(params.amount)
            .ok_or(ArenaError::Overflow)?;

        let now = Utc::now();
        let description = match &params.note {
            Some(note) => format!("Prize for {}: {note}", tournament.title),
            None => format!("Prize for {}", tournament.title),
        };
        let mut record =
            Transaction::settled(uid, TransactionKind::Prize, params.amount, description, now);
        record.tournament_id = Some(tournament.id.clone());
        let notice = Notification::new(
            uid,
            "Prize credited",
            format!("{} won in {} has been added to your wallet", params.amount, tournament.title),
            now,
        );

        tx.set(&u_path, &user)?;
        tx.set(&transaction_path(&record.id), &record)?;
        tx.set(&notification_path(&notice.id), &notice)?;
        Ok(record)
    })?;

    tracing::info!(tournament_id, uid, amount = %record.amount, "prize awarded");
    Ok(record)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveWithdrawalParams {
    pub approve: bool,
    /// Payout reference when approving
    #[serde(default)]
    pub utr: Option<String>,
}

/// Close a pending withdrawal; a rejection returns the held amount
pub fn resolve_withdrawal<B: Backend>(
    store: &Store<B>,
    transaction_id: &str,
    params: &ResolveWithdrawalParams,
) -> Result<Transaction> {
    let t_path = transaction_path(transaction_id);
    let record = store.run_transaction(|tx| -> Result<Transaction> {
        let mut record: Transaction = tx.get(&t_path)?.ok_or(ArenaError::TransactionNotFound)?;
        require!(
            record.kind == TransactionKind::Withdrawal,
            ArenaError::invalid("Not a withdrawal")
        );
        require!(
            record.status == TransactionStatus::Pending,
            ArenaError::AlreadyProcessed
        );

        let u_path = user_path(&record.user_id);
        let mut user: User = tx.get(&u_path)?.ok_or(ArenaError::UserNotFound)?;
        let now = Utc::now();
        record.updated_at = now;

        let notice = if params.approve {
            record.status = TransactionStatus::Success;
            record.utr = params.utr.clone().filter(|utr| !utr.is_empty());
            Notification::new(
                &record.user_id,
                "Withdrawal sent",
                format!("{} has been sent to your UPI id", record.amount),
                now,
            )
        } else {
            record.status = TransactionStatus::Failed;
            user.wallet_balance = user
                .wallet_balance
                .checked_add(record.amount)
                .ok_or(ArenaError::Overflow)?;
            tx.set(&u_path, &user)?;
            Notification::new(
                &record.user_id,
                "Withdrawal rejected",
                format!("{} has been returned to your wallet", record.amount),
                now,
            )
        };

        tx.set(&t_path, &record)?;
        tx.set(&notification_path(&notice.id), &notice)?;
        Ok(record)
    })?;

    tracing::info!(
        id = transaction_id,
        uid = %record.user_id,
        amount = %record.amount,
        approved = params.approve,
        "withdrawal resolved"
    );
    Ok(record)
}

pub fn set_role<B: Backend>(
    store: &Store<B>,
    admin_uid: &str,
    uid: &str,
    role: Role,
) -> Result<User> {
    require!(
        admin_uid != uid,
        ArenaError::invalid("You cannot change your own role")
    );
    let u_path = user_path(uid);
    let user = store.run_transaction(|tx| -> Result<User> {
        let mut user: User = tx.get(&u_path)?.ok_or(ArenaError::UserNotFound)?;
        if user.role != role {
            user.role = role;
            tx.set(&u_path, &user)?;
        }
        Ok(user)
    })?;
    tracing::info!(by = admin_uid, uid, ?role, "role changed");
    Ok(user)
}

/// All profiles, oldest first
pub fn list_users<B: Backend>(store: &Store<B>) -> Result<Vec<User>> {
    let mut users: Vec<User> = store.list(USERS)?;
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(users)
}
