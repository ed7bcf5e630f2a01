use std::time::Duration;

use freehold::catalog::{BuildingDef, BuildingEffects, Catalog, UnitCost, UnitDef};
use freehold::error::SimError;
use freehold::runtime::{spawn_session, SessionError, SessionSettings};
use freehold::world::{DepositId, Position};

fn fast_catalog() -> Catalog {
    let buildings = vec![BuildingDef {
        id: "camp".into(),
        name: "Camp".into(),
        width: 60.0,
        height: 40.0,
        effects: BuildingEffects {
            happiness: 0,
            gold: 0,
            food: 0,
        },
    }];
    let units = vec![UnitDef {
        id: "militia".into(),
        name: "Militia".into(),
        width: 30.0,
        height: 30.0,
        cost: UnitCost { gold: 5, food: 5 },
        required_building: "camp".into(),
        build_time_secs: 0.3,
        speed: 70.0,
    }];
    Catalog::from_defs(buildings, units).expect("catalog is well-formed")
}

#[tokio::test(flavor = "multi_thread")]
async fn session_trains_a_unit_end_to_end() {
    let handle = spawn_session(SessionSettings::new(fast_catalog(), 42));

    // Tax would trickle gold in during the sleeps below; keep the
    // balance assertions exact.
    handle.set_tax_rate(0).await.expect("intent applies");
    handle
        .place_building("camp", Position::new(300.0, 300.0))
        .await
        .expect("placement succeeds");
    let snapshot = handle.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.economy.building_count, 1);
    assert_eq!(snapshot.available_units, vec!["militia".to_string()]);

    handle
        .start_training("militia", Position::new(310.0, 310.0))
        .await
        .expect("training starts");
    let snapshot = handle.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.training.len(), 1);
    assert_eq!(snapshot.economy.gold, 45.0);
    assert_eq!(snapshot.economy.food, 45.0);

    // Build time is 0.3 s and the completion sweep runs every 0.5 s;
    // well before 1.5 s the job must have become a placed unit.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let snapshot = handle.snapshot().await.expect("snapshot");
    assert!(snapshot.training.is_empty(), "job should have completed");
    assert_eq!(snapshot.economy.military_units, 1);
    let units: Vec<_> = snapshot
        .placements
        .iter()
        .filter(|p| p.kind == "unit")
        .collect();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].type_id, "militia");

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn intents_round_trip_through_the_queue() {
    let handle = spawn_session(SessionSettings::new(Catalog::standard(), 42));

    let err = handle
        .place_building("volcano", Position::new(0.0, 0.0))
        .await
        .expect_err("unknown building must be rejected");
    assert!(matches!(
        err,
        SessionError::Sim(SimError::UnknownBuildingType(_))
    ));

    assert_eq!(
        handle
            .collect_deposit(DepositId::from_raw(404))
            .await
            .expect("intent applies"),
        None
    );
    assert_eq!(handle.set_tax_rate(25).await.expect("intent applies"), 25);
    // 50 food on hand comfortably covers the 20-food trade.
    assert!(handle.convert_food_to_gold().await.expect("intent applies"));

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_are_republished_while_running() {
    let handle = spawn_session(SessionSettings::new(Catalog::standard(), 42));
    let mut frames = handle.subscribe_frames();

    handle
        .place_building("farm", Position::new(400.0, 300.0))
        .await
        .expect("placement succeeds");

    // Frames from pulses before the placement applied may still be
    // queued; wait for one that reflects it.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let frame = tokio::time::timeout_at(deadline, frames.recv())
            .await
            .expect("a frame arrives within two seconds")
            .expect("broadcast stays open");
        if frame.snapshot.economy.building_count == 1 {
            break;
        }
    }

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn handle_reports_closed_after_shutdown() {
    let handle = spawn_session(SessionSettings::new(Catalog::standard(), 42));
    handle.shutdown().await;
    // The driver drains its queue and stops; give it a moment.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(
        handle.snapshot().await,
        Err(SessionError::Closed)
    ));
}
