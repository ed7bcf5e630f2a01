use freehold::catalog::{BuildingDef, BuildingEffects, Catalog, UnitCost, UnitDef};
use freehold::error::SimError;
use freehold::world::{City, Position};

fn training_catalog() -> Catalog {
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
        build_time_secs: 2.0,
        speed: 70.0,
    }];
    Catalog::from_defs(buildings, units).expect("catalog is well-formed")
}

#[test]
fn unknown_unit_type_is_rejected() {
    let mut city = City::new(Catalog::standard());
    let err = city
        .start_training("dragon", Position::new(0.0, 0.0), 0)
        .expect_err("unknown unit must fail");
    assert!(matches!(err, SimError::UnknownUnitType(_)));
    assert!(city.training_jobs().is_empty());
}

#[test]
fn training_without_prerequisite_mutates_nothing() {
    let mut city = City::new(Catalog::standard());
    let err = city
        .start_training("warrior", Position::new(0.0, 0.0), 0)
        .expect_err("no warriorcamp placed");
    assert!(matches!(err, SimError::PrerequisiteMissing { .. }));
    assert!(city.training_jobs().is_empty());
    assert_eq!(city.economy().gold(), 50.0);
    assert_eq!(city.economy().food(), 50.0);
}

#[test]
fn training_without_funds_mutates_nothing() {
    let mut city = City::new(Catalog::standard());
    city.place_building("warriorcamp", Position::new(500.0, 500.0))
        .expect("placement succeeds");
    city.economy_mut().add_gold(-25.0);
    let gold_before = city.economy().gold();
    let food_before = city.economy().food();

    let err = city
        .start_training("warrior", Position::new(500.0, 500.0), 0)
        .expect_err("5 gold cannot pay for a 20 gold warrior");
    assert!(matches!(err, SimError::InsufficientResources { .. }));
    assert!(city.training_jobs().is_empty());
    assert_eq!(city.economy().gold(), gold_before);
    assert_eq!(city.economy().food(), food_before);
}

#[test]
fn training_deducts_cost_at_start() {
    let mut city = City::new(Catalog::standard());
    let camp = city
        .place_building("warriorcamp", Position::new(700.0, 500.0))
        .expect("placement succeeds");

    let job_id = city
        .start_training("warrior", Position::new(710.0, 510.0), 1_000)
        .expect("training starts");
    assert_eq!(city.economy().gold(), 10.0);
    assert_eq!(city.economy().food(), 25.0);

    let job = &city.training_jobs()[0];
    assert_eq!(job.id, job_id);
    assert_eq!(job.building_id, camp);
    assert_eq!(job.origin, Position::new(700.0, 500.0));
    assert_eq!(job.progress, 0.0);
    assert_eq!(job.started_ms, 1_000);
}

#[test]
fn progress_follows_elapsed_time_and_caps_at_one() {
    let mut city = City::new(training_catalog());
    city.place_building("camp", Position::new(200.0, 200.0))
        .expect("placement succeeds");
    city.start_training("militia", Position::new(200.0, 200.0), 1_000)
        .expect("training starts");

    city.progress_tick(1_000);
    assert_eq!(city.training_jobs()[0].progress, 0.0);

    city.progress_tick(2_000);
    assert_eq!(city.training_jobs()[0].progress, 0.5);

    city.progress_tick(9_000);
    assert_eq!(city.training_jobs()[0].progress, 1.0);
}

#[test]
fn completion_emits_exactly_one_unit_per_job() {
    let mut city = City::new(training_catalog());
    city.place_building("camp", Position::new(200.0, 200.0))
        .expect("placement succeeds");
    city.start_training("militia", Position::new(200.0, 200.0), 0)
        .expect("training starts");

    assert_eq!(city.completion_sweep(1_999), 0, "not done yet");
    assert_eq!(city.training_jobs().len(), 1);

    assert_eq!(city.completion_sweep(2_000), 1);
    assert!(city.training_jobs().is_empty());
    assert_eq!(city.derived_military_count(), 1);
    assert_eq!(city.economy().military_units(), 1);

    // Repeated sweeps must not duplicate the unit.
    assert_eq!(city.completion_sweep(2_500), 0);
    assert_eq!(city.completion_sweep(3_000), 0);
    assert_eq!(city.derived_military_count(), 1);
    assert_eq!(city.economy().military_units(), 1);
}

#[test]
fn sweep_completes_a_whole_batch_at_once() {
    let mut city = City::new(training_catalog());
    city.place_building("camp", Position::new(200.0, 200.0))
        .expect("placement succeeds");
    city.start_training("militia", Position::new(200.0, 200.0), 0)
        .expect("first job");
    city.start_training("militia", Position::new(200.0, 200.0), 100)
        .expect("second job");

    assert_eq!(city.completion_sweep(5_000), 2);
    assert!(city.training_jobs().is_empty());
    assert_eq!(city.derived_military_count(), 2);
    assert_eq!(city.economy().military_units(), 2);
}

#[test]
fn tracked_and_derived_military_counts_agree() {
    let mut city = City::new(training_catalog());
    city.place_building("camp", Position::new(200.0, 200.0))
        .expect("placement succeeds");
    for round in 0u64..3 {
        let started = round * 10_000;
        city.start_training("militia", Position::new(200.0, 200.0), started)
            .expect("training starts");
        city.completion_sweep(started + 2_000);
        assert_eq!(
            city.economy().military_units(),
            city.derived_military_count(),
            "fast-path counter drifted from the registry"
        );
    }
    assert_eq!(city.economy().military_units(), 3);
}

#[test]
fn nearest_training_building_wins() {
    let mut city = City::new(training_catalog());
    city.place_building("camp", Position::new(100.0, 100.0))
        .expect("placement succeeds");
    let far_camp = city
        .place_building("camp", Position::new(1_000.0, 1_000.0))
        .expect("placement succeeds");

    let job_id = city
        .start_training("militia", Position::new(900.0, 900.0), 0)
        .expect("training starts");
    let job = city
        .training_jobs()
        .iter()
        .find(|j| j.id == job_id)
        .expect("job exists");
    assert_eq!(job.building_id, far_camp);
    assert_eq!(job.origin, Position::new(1_000.0, 1_000.0));
}

#[test]
fn first_listed_building_wins_exact_ties() {
    let mut city = City::new(training_catalog());
    let first = city
        .place_building("camp", Position::new(0.0, 0.0))
        .expect("placement succeeds");
    city.place_building("camp", Position::new(200.0, 0.0))
        .expect("placement succeeds");

    let job_id = city
        .start_training("militia", Position::new(100.0, 0.0), 0)
        .expect("training starts");
    assert_eq!(city.training_jobs()[0].id, job_id);
    assert_eq!(city.training_jobs()[0].building_id, first);
}

#[test]
fn finished_units_appear_below_their_building() {
    let mut city = City::new(training_catalog());
    city.place_building("camp", Position::new(700.0, 500.0))
        .expect("placement succeeds");
    city.start_training("militia", Position::new(700.0, 500.0), 0)
        .expect("training starts");
    city.completion_sweep(2_000);

    let unit = city
        .placements()
        .iter()
        .find(|e| e.kind.is_unit())
        .expect("unit was placed");
    // Camp footprint is 60x40: centered below the doorway.
    assert_eq!(unit.position, Position::new(730.0, 560.0));
}
