//! End-to-end scenarios driving `Engine::locate` through the public API,
//! without any auxiliary data files on disk.

use neic_locator::core::config::EngineConfig;
use neic_locator::core::craton::{CratonMap, CratonPolygon};
use neic_locator::core::engine::Engine;
use neic_locator::core::error::ExitCode;
use neic_locator::core::hypocenter::Hypocenter;
use neic_locator::core::pick::{AuthorType, Pick};
use neic_locator::core::station::{Station, StationId};
use neic_locator::core::travel_time::Ak135TravelTimeTable;
use neic_locator::core::zone_stats::ZoneStats;
use neic_locator::core::event::Event;

/// A loose ring of stations around a shallow hypothetical event near the
/// Gulf of California, far enough apart to give the rank-sum estimator a
/// well-conditioned design matrix.
fn shallow_event() -> Event {
    let hypo = Hypocenter::new(1_000_000.0, 30.0, -114.0, 8.0, 3);
    let stations = vec![
        Station::new(StationId::new("NN", "AAA", ""), 32.0, -114.0, 0.3),
        Station::new(StationId::new("NN", "BBB", ""), 28.5, -112.5, 0.1),
        Station::new(StationId::new("NN", "CCC", ""), 29.5, -117.0, 0.2),
        Station::new(StationId::new("NN", "DDD", ""), 31.5, -110.5, 0.4),
        Station::new(StationId::new("NN", "EEE", ""), 27.0, -114.5, 0.0),
    ];
    let picks = vec![
        Pick::new(StationId::new("NN", "AAA", ""), "NN", "auto", AuthorType::ContribAuto, 1_000_031.0, "P"),
        Pick::new(StationId::new("NN", "BBB", ""), "NN", "auto", AuthorType::ContribAuto, 1_000_033.0, "P"),
        Pick::new(StationId::new("NN", "CCC", ""), "NN", "auto", AuthorType::ContribAuto, 1_000_038.0, "P"),
        Pick::new(StationId::new("NN", "DDD", ""), "NN", "auto", AuthorType::ContribAuto, 1_000_035.0, "P"),
        Pick::new(StationId::new("NN", "EEE", ""), "NN", "auto", AuthorType::ContribAuto, 1_000_040.0, "P"),
    ];
    Event::new(hypo, stations, picks)
}

fn empty_engine() -> Engine<Ak135TravelTimeTable> {
    Engine::with_ak135_and_empty_aux(EngineConfig::default())
}

#[test]
fn shallow_event_reaches_a_success_family_status() {
    let mut engine = empty_engine();
    let mut event = shallow_event();
    let (status, _) = engine.locate(&mut event);
    assert!(
        status.is_success_family() || status == ExitCode::DidNotConverge,
        "unexpected terminal status: {status:?}"
    );
}

#[test]
fn held_bayesian_depth_keeps_dof_at_two() {
    let mut event = shallow_event();
    event.depth_held = true;
    event.depth_manual = true;
    event.hypocenter.dof = 2;
    event.hypocenter.bayes_depth = Some(12.0);
    event.hypocenter.bayes_spread = Some(4.0);

    let mut engine = empty_engine();
    let (status, _) = engine.locate(&mut event);
    assert_ne!(status, ExitCode::UnknownStatus);
    assert_eq!(event.hypocenter.dof, 2);
}

#[test]
fn fewer_than_minimum_stations_reports_insufficient_data() {
    let mut event = shallow_event();
    event.picks.truncate(2);
    event.groups.retain(|g| !g.pick_indices.is_empty());

    let mut engine = empty_engine();
    let (status, ellipsoid) = engine.locate(&mut event);
    assert_eq!(status, ExitCode::InsufficientData);
    assert!(ellipsoid.is_none());
}

#[test]
fn held_location_never_moves_the_hypocenter() {
    let mut event = shallow_event();
    event.location_held = true;
    let original = (
        event.hypocenter.origin_time,
        event.hypocenter.latitude,
        event.hypocenter.longitude,
        event.hypocenter.depth,
    );

    let mut engine = empty_engine();
    engine.locate(&mut event);

    assert_eq!(event.hypocenter.origin_time, original.0);
    assert_eq!(event.hypocenter.latitude, original.1);
    assert_eq!(event.hypocenter.longitude, original.2);
    assert_eq!(event.hypocenter.depth, original.3);
}

#[test]
fn event_inside_a_craton_polygon_is_flagged_not_tectonic() {
    let craton = CratonPolygon {
        name: "test craton".to_string(),
        vertices: vec![(20.0, -120.0), (20.0, -105.0), (40.0, -105.0), (40.0, -120.0)],
    };
    let mut engine = Engine::new(
        EngineConfig::default(),
        CratonMap::new(vec![craton]),
        ZoneStats::empty(),
        Ak135TravelTimeTable::default(),
    );
    let mut event = shallow_event();
    engine.locate(&mut event);
    assert!(!event.is_tectonic);
}

#[test]
fn event_outside_every_craton_polygon_is_flagged_tectonic() {
    let craton = CratonPolygon {
        name: "far away craton".to_string(),
        vertices: vec![(60.0, 10.0), (60.0, 20.0), (70.0, 20.0), (70.0, 10.0)],
    };
    let mut engine = Engine::new(
        EngineConfig::default(),
        CratonMap::new(vec![craton]),
        ZoneStats::empty(),
        Ak135TravelTimeTable::default(),
    );
    let mut event = shallow_event();
    engine.locate(&mut event);
    assert!(event.is_tectonic);
}
