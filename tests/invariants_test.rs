//! Property tests: random operation sequences never break seat accounting.

mod helpers;

use chrono::Duration;
use helpers::*;
use proptest::prelude::*;
use recruit_registrations::models::*;
use recruit_registrations::ErrorCode;
use uuid::Uuid;

const PLAYERS: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Register(usize),
    Cancel(usize),
    Override(usize, RegistrationStatus),
    Remove(usize),
    SetStatus(EventStatus),
    AdvanceDays(i64),
}

fn arb_registration_status() -> impl Strategy<Value = RegistrationStatus> {
    prop_oneof![
        Just(RegistrationStatus::Pending),
        Just(RegistrationStatus::Confirmed),
        Just(RegistrationStatus::Waitlisted),
        Just(RegistrationStatus::Declined),
        Just(RegistrationStatus::Cancelled),
    ]
}

fn arb_event_status() -> impl Strategy<Value = EventStatus> {
    prop_oneof![
        Just(EventStatus::RegistrationOpen),
        Just(EventStatus::RegistrationClosed),
        Just(EventStatus::InProgress),
    ]
}

fn arb_operation() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..PLAYERS).prop_map(Op::Register),
        2 => (0..PLAYERS).prop_map(Op::Cancel),
        2 => ((0..PLAYERS), arb_registration_status()).prop_map(|(p, s)| Op::Override(p, s)),
        1 => (0..PLAYERS).prop_map(Op::Remove),
        1 => arb_event_status().prop_map(Op::SetStatus),
        1 => (1i64..8).prop_map(Op::AdvanceDays),
    ]
}

/// Checks the counter against the registrations it summarizes
async fn assert_seat_invariants(h: &TestHarness, event_id: Uuid) {
    let event = h.service.get_event(event_id).await.unwrap();
    let registrations = h.service.list_registrations(event_id).await.unwrap();

    let held = registrations.iter().filter(|r| r.status.holds_seat()).count() as i32;
    assert!(event.registered_spots >= 0);
    assert!(event.registered_spots <= event.max_spots);
    assert_eq!(event.registered_spots, held);

    let mut players: Vec<Uuid> = registrations.iter().map(|r| r.player_id).collect();
    players.sort();
    players.dedup();
    assert_eq!(players.len(), registrations.len());
}

async fn registration_of(h: &TestHarness, event_id: Uuid, player: &Principal) -> Option<Registration> {
    h.service
        .list_registrations(event_id)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.player_id == player.id)
}

async fn apply(h: &TestHarness, event_id: Uuid, players: &[Principal], op: Op) {
    let result = match op {
        Op::Register(i) => h
            .service
            .register(&players[i], event_id, players[i].id)
            .await
            .map(|_| ()),
        Op::Cancel(i) => match registration_of(h, event_id, &players[i]).await {
            Some(r) => h.service.cancel_registration(&players[i], r.id).await.map(|_| ()),
            None => Ok(()),
        },
        Op::Override(i, status) => match registration_of(h, event_id, &players[i]).await {
            Some(r) => h
                .service
                .update_registration_status(
                    &h.admin,
                    r.id,
                    RegistrationUpdate {
                        status,
                        qualified: None,
                    },
                )
                .await
                .map(|_| ()),
            None => Ok(()),
        },
        Op::Remove(i) => match registration_of(h, event_id, &players[i]).await {
            Some(r) => h.service.remove_registration(&h.admin, r.id).await.map(|_| ()),
            None => Ok(()),
        },
        Op::SetStatus(status) => h
            .service
            .update_event_status(&h.admin, event_id, status)
            .await
            .map(|_| ()),
        Op::AdvanceDays(days) => {
            h.clock.advance(Duration::days(days));
            Ok(())
        }
    };

    // Domain rejections are fine; nothing may fail internally
    if let Err(e) = result {
        assert_ne!(e.code(), ErrorCode::Internal, "unexpected internal error: {:?}", e);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_counter_matches_registrations(
        max_spots in 1i32..5,
        ops in proptest::collection::vec(arb_operation(), 1..40),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let h = TestHarness::new();
            let event = h.create_open_combine(max_spots).await;
            let players: Vec<Principal> =
                (0..PLAYERS).map(|_| Principal::player(Uuid::new_v4())).collect();

            for op in ops {
                apply(&h, event.id, &players, op).await;
                assert_seat_invariants(&h, event.id).await;
            }
        });
    }

    #[test]
    fn prop_reconcile_restores_counter(
        registrations in 0usize..PLAYERS,
        drifted in -3i32..10,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let h = TestHarness::new();
            let event = h.create_open_combine(PLAYERS as i32).await;
            for _ in 0..registrations {
                h.register_new_player(event.id).await;
            }

            h.repo.force_registered_spots(event.id, drifted).await.unwrap();
            let report = h.service.reconcile_event(&h.admin, event.id).await.unwrap();

            assert_eq!(report.previous, drifted);
            assert_eq!(report.recomputed, registrations as i32);
            assert_seat_invariants(&h, event.id).await;
        });
    }
}
