//! Player instructions

use arena_store::{Backend, Money, Store};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{require, ArenaError, Result};
use crate::state::{
    game_path, notification_path, participant_path, participants_path, tournament_path,
    transaction_path, user_path, Game, Notification, Participant, Role, Tournament,
    TournamentStatus, Transaction, TransactionKind, User, NOTIFICATIONS, TOURNAMENTS,
};

/// Longest display or in-game name accepted
pub const MAX_NAME_LEN: usize = 32;

fn clean_name(raw: &str, field: &str) -> Result<String> {
    let name = raw.trim();
    require!(
        !name.is_empty() && name.chars().count() <= MAX_NAME_LEN,
        ArenaError::invalid(format!("{field} must be 1-{MAX_NAME_LEN} characters"))
    );
    Ok(name.to_string())
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinParams {
    /// Fee the player saw when they pressed join
    pub expected_fee: Money,
    pub ingame_name: String,
}

/// Join a tournament, paying the entry fee from the wallet
///
/// Capacity, balance and prior entry are checked and the fee deduction,
/// participant record, player count and ledger entry are written in one
/// transaction. Any failed guard leaves every document untouched.
pub fn join_tournament<B: Backend>(
    store: &Store<B>,
    uid: &str,
    tournament_id: &str,
    params: &JoinParams,
) -> Result<Participant> {
    let ingame_name = clean_name(&params.ingame_name, "In-game name")?;

    let t_path = tournament_path(tournament_id);
    let u_path = user_path(uid);
    let p_path = participant_path(tournament_id, uid);

    let joined = store.run_transaction(|tx| -> Result<(Participant, Tournament)> {
        let mut tournament: Tournament = tx.get(&t_path)?.ok_or(ArenaError::TournamentNotFound)?;
        let mut user: User = tx.get(&u_path)?.ok_or(ArenaError::UserNotFound)?;
        let already_joined = tx.exists(&p_path)?;

        require!(
            tournament.status == TournamentStatus::Upcoming,
            ArenaError::RegistrationClosed
        );
        require!(!already_joined, ArenaError::AlreadyJoined);
        require!(!tournament.is_full(), ArenaError::TournamentFull);

        let fee = tournament.entry_fee;
        require!(
            fee == params.expected_fee,
            ArenaError::FeeChanged { current: fee }
        );

        user.wallet_balance = user
            .wallet_balance
            .checked_sub(fee)
            .ok_or(ArenaError::InsufficientBalance {
                needed: fee,
                available: user.wallet_balance,
            })?;
        tournament.current_players = tournament
            .current_players
            .checked_add(1)
            .ok_or(ArenaError::Overflow)?;

        let now = Utc::now();
        let participant = Participant {
            user_id: uid.to_string(),
            display_name: user.display_name.clone(),
            ingame_name: ingame_name.clone(),
            joined_at: now,
            fee_paid: fee,
        };
        let mut entry = Transaction::settled(
            uid,
            TransactionKind::Entry,
            fee,
            format!("Entry fee for {}", tournament.title),
            now,
        );
        entry.tournament_id = Some(tournament.id.clone());

        tx.set(&u_path, &user)?;
        tx.set(&p_path, &participant)?;
        tx.set(&t_path, &tournament)?;
        tx.set(&transaction_path(&entry.id), &entry)?;
        Ok((participant, tournament))
    })?;
    let (participant, tournament) = joined;

    tracing::info!(
        uid,
        tournament_id,
        fee = %participant.fee_paid,
        players = tournament.current_players,
        max = tournament.max_players,
        "player joined tournament"
    );
    Ok(participant)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardParams {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub favorite_game: Option<String>,
}

/// Create the caller's profile, or update names on an existing one
///
/// Role and balance of an existing profile are never touched here.
pub fn onboard<B: Backend>(store: &Store<B>, uid: &str, params: &OnboardParams) -> Result<User> {
    let display_name = clean_name(&params.display_name, "Display name")?;
    let email = params.email.trim().to_string();
    require!(
        email.contains('@') && !email.contains(char::is_whitespace),
        ArenaError::invalid("Enter a valid email address")
    );

    let u_path = user_path(uid);
    let user = store.run_transaction(|tx| -> Result<User> {
        if let Some(game_id) = &params.favorite_game {
            let game: Game = tx.get(&game_path(game_id))?.ok_or(ArenaError::GameNotFound)?;
            require!(game.is_active, ArenaError::GameInactive);
        }
        let existing: Option<User> = tx.get(&u_path)?;

        let user = match existing {
            Some(mut user) => {
                user.display_name = display_name.clone();
                user.email = email.clone();
                user.favorite_game = params.favorite_game.clone();
                user.onboarded = true;
                user
            }
            None => User {
                uid: uid.to_string(),
                email: email.clone(),
                display_name: display_name.clone(),
                role: Role::User,
                wallet_balance: Money::ZERO,
                favorite_game: params.favorite_game.clone(),
                onboarded: true,
                created_at: Utc::now(),
            },
        };
        tx.set(&u_path, &user)?;
        Ok(user)
    })?;

    tracing::info!(uid, "profile saved");
    Ok(user)
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TournamentFilter {
    pub game: Option<String>,
    pub status: Option<TournamentStatus>,
}

/// A tournament as shown to one caller
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentView {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub joined: bool,
}

/// Tournaments matching `filter`, soonest first, without room credentials
pub fn list_tournaments<B: Backend>(
    store: &Store<B>,
    filter: &TournamentFilter,
) -> Result<Vec<Tournament>> {
    let mut tournaments: Vec<Tournament> = store
        .list::<Tournament>(TOURNAMENTS)?
        .into_iter()
        .filter(|t| filter.game.as_ref().map_or(true, |g| &t.game == g))
        .filter(|t| filter.status.map_or(true, |s| t.status == s))
        .map(|mut t| {
            t.room = None;
            t
        })
        .collect();
    tournaments.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
    Ok(tournaments)
}

/// One tournament; room credentials only for participants and admins
pub fn tournament_view<B: Backend>(
    store: &Store<B>,
    uid: &str,
    tournament_id: &str,
) -> Result<TournamentView> {
    let mut tournament: Tournament = store
        .get(&tournament_path(tournament_id))?
        .ok_or(ArenaError::TournamentNotFound)?;
    let joined = store
        .get::<Participant>(&participant_path(tournament_id, uid))?
        .is_some();
    let is_admin = store
        .get::<User>(&user_path(uid))?
        .is_some_and(|u| u.is_admin());
    if !joined && !is_admin {
        tournament.room = None;
    }
    Ok(TournamentView { tournament, joined })
}

/// Roster in join order
pub fn list_participants<B: Backend>(
    store: &Store<B>,
    tournament_id: &str,
) -> Result<Vec<Participant>> {
    require!(
        store.get::<Tournament>(&tournament_path(tournament_id))?.is_some(),
        ArenaError::TournamentNotFound
    );
    let mut participants: Vec<Participant> = store.list(&participants_path(tournament_id))?;
    participants.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
    Ok(participants)
}

/// Caller's notifications, newest first
pub fn list_notifications<B: Backend>(store: &Store<B>, uid: &str) -> Result<Vec<Notification>> {
    let mut notes: Vec<Notification> = store
        .list::<Notification>(NOTIFICATIONS)?
        .into_iter()
        .filter(|n| n.user_id == uid)
        .collect();
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(notes)
}

pub fn mark_notification_read<B: Backend>(
    store: &Store<B>,
    uid: &str,
    notification_id: &str,
) -> Result<Notification> {
    let n_path = notification_path(notification_id);
    store.run_transaction(|tx| -> Result<Notification> {
        let mut note: Notification = tx.get(&n_path)?.ok_or(ArenaError::NotificationNotFound)?;
        // someone else's notification looks the same as a missing one
        require!(note.user_id == uid, ArenaError::NotificationNotFound);
        if !note.read {
            note.read = true;
            tx.set(&n_path, &note)?;
        }
        Ok(note)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::test_support::{
        seed_admin, seed_game, seed_tournament, seed_user, store, FlakyBackend,
    };
    use crate::state::{RoomCredentials, TransactionStatus, TRANSACTIONS};
    use arena_store::StoreError;

    fn join(fee: u64) -> JoinParams {
        JoinParams {
            expected_fee: Money::from_rupees(fee),
            ingame_name: "AceShot".to_string(),
        }
    }

    fn balance<B: Backend>(store: &Store<B>, uid: &str) -> Money {
        store.get::<User>(&user_path(uid)).unwrap().unwrap().wallet_balance
    }

    fn players<B: Backend>(store: &Store<B>, id: &str) -> u32 {
        store
            .get::<Tournament>(&tournament_path(id))
            .unwrap()
            .unwrap()
            .current_players
    }

    #[test]
    fn test_join_applies_every_effect() {
        let store = store();
        seed_user(&store, "u1", Money::from_rupees(100));
        seed_tournament(&store, "t1", Money::from_rupees(50), 10);

        let participant = join_tournament(&store, "u1", "t1", &join(50)).unwrap();
        assert_eq!(participant.fee_paid, Money::from_rupees(50));
        assert_eq!(participant.ingame_name, "AceShot");
        assert_eq!(participant.display_name, "Player u1");

        assert_eq!(balance(&store, "u1"), Money::from_rupees(50));
        assert_eq!(players(&store, "t1"), 1);
        assert!(store
            .get::<Participant>(&participant_path("t1", "u1"))
            .unwrap()
            .is_some());

        let ledger: Vec<Transaction> = store.list(TRANSACTIONS).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::Entry);
        assert_eq!(ledger[0].status, TransactionStatus::Success);
        assert_eq!(ledger[0].tournament_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_insufficient_balance_leaves_balance() {
        let store = store();
        seed_user(&store, "u1", Money::from_rupees(30));
        seed_tournament(&store, "t1", Money::from_rupees(50), 10);

        let err = join_tournament(&store, "u1", "t1", &join(50)).unwrap_err();
        assert!(matches!(
            err,
            ArenaError::InsufficientBalance { needed, available }
                if needed == Money::from_rupees(50) && available == Money::from_rupees(30)
        ));
        assert_eq!(balance(&store, "u1"), Money::from_rupees(30));
        assert_eq!(players(&store, "t1"), 0);
    }

    #[test]
    fn test_full_tournament_rejects_without_side_effects() {
        let store = store();
        seed_user(&store, "u1", Money::from_rupees(100));
        seed_user(&store, "u2", Money::from_rupees(100));
        seed_tournament(&store, "t1", Money::from_rupees(10), 1);

        join_tournament(&store, "u1", "t1", &join(10)).unwrap();
        let err = join_tournament(&store, "u2", "t1", &join(10)).unwrap_err();
        assert!(matches!(err, ArenaError::TournamentFull));

        assert_eq!(balance(&store, "u2"), Money::from_rupees(100));
        assert_eq!(players(&store, "t1"), 1);
        assert!(store
            .get::<Participant>(&participant_path("t1", "u2"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_second_join_rejected() {
        let store = store();
        seed_user(&store, "u1", Money::from_rupees(100));
        seed_tournament(&store, "t1", Money::from_rupees(10), 10);

        join_tournament(&store, "u1", "t1", &join(10)).unwrap();
        let err = join_tournament(&store, "u1", "t1", &join(10)).unwrap_err();
        assert!(matches!(err, ArenaError::AlreadyJoined));
        assert_eq!(balance(&store, "u1"), Money::from_rupees(90));
        assert_eq!(players(&store, "t1"), 1);
    }

    #[test]
    fn test_fee_change_detected() {
        let store = store();
        seed_user(&store, "u1", Money::from_rupees(100));
        seed_tournament(&store, "t1", Money::from_rupees(25), 10);

        let err = join_tournament(&store, "u1", "t1", &join(20)).unwrap_err();
        assert!(matches!(
            err,
            ArenaError::FeeChanged { current } if current == Money::from_rupees(25)
        ));
        assert_eq!(balance(&store, "u1"), Money::from_rupees(100));
    }

    #[test]
    fn test_join_guards() {
        let store = store();
        seed_user(&store, "u1", Money::from_rupees(100));
        assert!(matches!(
            join_tournament(&store, "u1", "nope", &join(10)),
            Err(ArenaError::TournamentNotFound)
        ));

        let mut live = seed_tournament(&store, "t1", Money::from_rupees(10), 10);
        assert!(matches!(
            join_tournament(&store, "ghost", "t1", &join(10)),
            Err(ArenaError::UserNotFound)
        ));

        live.status = TournamentStatus::Live;
        store.set(&tournament_path("t1"), &live).unwrap();
        assert!(matches!(
            join_tournament(&store, "u1", "t1", &join(10)),
            Err(ArenaError::RegistrationClosed)
        ));

        let blank = JoinParams {
            expected_fee: Money::from_rupees(10),
            ingame_name: "   ".to_string(),
        };
        assert!(matches!(
            join_tournament(&store, "u1", "t1", &blank),
            Err(ArenaError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_free_tournament_with_empty_wallet() {
        let store = store();
        seed_user(&store, "u1", Money::ZERO);
        seed_tournament(&store, "t1", Money::ZERO, 10);
        join_tournament(&store, "u1", "t1", &join(0)).unwrap();
        assert_eq!(players(&store, "t1"), 1);
    }

    #[test]
    fn test_last_slot_goes_to_exactly_one_player() {
        let store = store().with_max_attempts(1_000);
        seed_tournament(&store, "t1", Money::from_rupees(10), 1);
        let uids: Vec<String> = (0..6).map(|i| format!("u{i}")).collect();
        for uid in &uids {
            seed_user(&store, uid, Money::from_rupees(10));
        }

        let outcomes: Vec<Result<Participant>> = std::thread::scope(|scope| {
            let handles: Vec<_> = uids
                .iter()
                .map(|uid| {
                    let store = &store;
                    scope.spawn(move || join_tournament(store, uid, "t1", &join(10)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ArenaError::TournamentFull)));
        assert_eq!(players(&store, "t1"), 1);

        let total: u64 = uids.iter().map(|u| balance(&store, u).paise()).sum();
        assert_eq!(total, Money::from_rupees(50).paise());
    }

    #[test]
    fn test_failed_commit_leaves_no_partial_join() {
        let store = Store::new(FlakyBackend::new());
        seed_user(&store, "u1", Money::from_rupees(100));
        seed_tournament(&store, "t1", Money::from_rupees(40), 10);

        store.backend().fail_commits(true);
        let err = join_tournament(&store, "u1", "t1", &join(40)).unwrap_err();
        assert!(matches!(err, ArenaError::Store(StoreError::Unavailable(_))));

        store.backend().fail_commits(false);
        assert_eq!(balance(&store, "u1"), Money::from_rupees(100));
        assert_eq!(players(&store, "t1"), 0);
        assert!(store
            .get::<Participant>(&participant_path("t1", "u1"))
            .unwrap()
            .is_none());
        assert!(store.list::<Transaction>(TRANSACTIONS).unwrap().is_empty());

        // and the same join goes through once the backend recovers
        join_tournament(&store, "u1", "t1", &join(40)).unwrap();
        assert_eq!(balance(&store, "u1"), Money::from_rupees(60));
    }

    #[test]
    fn test_onboard_creates_then_updates() {
        let store = store();
        seed_game(&store, "bg");
        let params = OnboardParams {
            email: "ace@example.com".to_string(),
            display_name: " Ace ".to_string(),
            favorite_game: Some("bg".to_string()),
        };
        let user = onboard(&store, "u1", &params).unwrap();
        assert_eq!(user.display_name, "Ace");
        assert_eq!(user.role, Role::User);
        assert!(user.onboarded);

        // balance and role survive a profile edit
        let mut stored: User = store.get(&user_path("u1")).unwrap().unwrap();
        stored.wallet_balance = Money::from_rupees(70);
        stored.role = Role::Admin;
        store.set(&user_path("u1"), &stored).unwrap();

        let again = onboard(
            &store,
            "u1",
            &OnboardParams {
                display_name: "Ace2".to_string(),
                favorite_game: None,
                ..params.clone()
            },
        )
        .unwrap();
        assert_eq!(again.display_name, "Ace2");
        assert_eq!(again.wallet_balance, Money::from_rupees(70));
        assert_eq!(again.role, Role::Admin);
    }

    #[test]
    fn test_onboard_validation() {
        let store = store();
        let bad_game = OnboardParams {
            email: "ace@example.com".to_string(),
            display_name: "Ace".to_string(),
            favorite_game: Some("missing".to_string()),
        };
        assert!(matches!(onboard(&store, "u1", &bad_game), Err(ArenaError::GameNotFound)));

        let bad_email = OnboardParams {
            email: "nope".to_string(),
            display_name: "Ace".to_string(),
            favorite_game: None,
        };
        assert!(matches!(onboard(&store, "u1", &bad_email), Err(ArenaError::InvalidRequest(_))));
        assert!(store.get::<User>(&user_path("u1")).unwrap().is_none());
    }

    #[test]
    fn test_room_credentials_visibility() {
        let store = store();
        seed_user(&store, "u1", Money::from_rupees(100));
        seed_user(&store, "u2", Money::from_rupees(100));
        seed_admin(&store, "boss");
        let mut t = seed_tournament(&store, "t1", Money::from_rupees(10), 10);
        t.room = Some(RoomCredentials {
            room_id: "R1".to_string(),
            password: "pw".to_string(),
        });
        store.set(&tournament_path("t1"), &t).unwrap();
        join_tournament(&store, "u1", "t1", &join(10)).unwrap();

        let member = tournament_view(&store, "u1", "t1").unwrap();
        assert!(member.joined);
        assert!(member.tournament.room.is_some());

        let outsider = tournament_view(&store, "u2", "t1").unwrap();
        assert!(!outsider.joined);
        assert!(outsider.tournament.room.is_none());

        assert!(tournament_view(&store, "boss", "t1").unwrap().tournament.room.is_some());
        assert!(list_tournaments(&store, &TournamentFilter::default())
            .unwrap()
            .iter()
            .all(|t| t.room.is_none()));
    }

    #[test]
    fn test_list_tournaments_filters() {
        let store = store();
        let mut a = seed_tournament(&store, "a", Money::ZERO, 10);
        a.game = "ff".to_string();
        store.set(&tournament_path("a"), &a).unwrap();
        let mut b = seed_tournament(&store, "b", Money::ZERO, 10);
        b.status = TournamentStatus::Completed;
        store.set(&tournament_path("b"), &b).unwrap();
        seed_tournament(&store, "c", Money::ZERO, 10);

        let by_game = TournamentFilter {
            game: Some("ff".to_string()),
            status: None,
        };
        let ids: Vec<String> = list_tournaments(&store, &by_game)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["a"]);

        let upcoming = TournamentFilter {
            game: None,
            status: Some(TournamentStatus::Upcoming),
        };
        assert_eq!(list_tournaments(&store, &upcoming).unwrap().len(), 2);
    }

    #[test]
    fn test_participants_and_notifications() {
        let store = store();
        seed_user(&store, "u1", Money::from_rupees(100));
        seed_user(&store, "u2", Money::from_rupees(100));
        seed_tournament(&store, "t1", Money::ZERO, 10);
        join_tournament(&store, "u1", "t1", &join(0)).unwrap();
        join_tournament(&store, "u2", "t1", &join(0)).unwrap();

        let roster = list_participants(&store, "t1").unwrap();
        assert_eq!(roster.len(), 2);
        assert!(matches!(list_participants(&store, "zz"), Err(ArenaError::TournamentNotFound)));

        let note = Notification::new("u1", "Hello", "Welcome".to_string(), Utc::now());
        store.set(&notification_path(&note.id), &note).unwrap();
        assert_eq!(list_notifications(&store, "u1").unwrap().len(), 1);
        assert!(list_notifications(&store, "u2").unwrap().is_empty());

        assert!(matches!(
            mark_notification_read(&store, "u2", &note.id),
            Err(ArenaError::NotificationNotFound)
        ));
        let read = mark_notification_read(&store, "u1", &note.id).unwrap();
        assert!(read.read);
        assert!(list_notifications(&store, "u1").unwrap()[0].read);
    }
}
