#![allow(clippy::float_cmp)]

use nodepin::camera::{Point, Size};

use clap::CommandFactory;

use super::*;
use crate::scenario::{Step, parse, replay};

fn sample_reports() -> Vec<scenario::StepReport> {
    let scenario = parse(scenario::SAMPLE).unwrap();
    replay(&scenario, PinConfig::default()).unwrap()
}

#[test]
fn sample_parses_every_step() {
    let scenario = parse(scenario::SAMPLE).unwrap();
    assert_eq!(scenario.steps.len(), 8);
    assert!(matches!(scenario.steps[0], Step::Pin { .. }));
    assert!(matches!(scenario.steps[5], Step::Resize { notify: true, .. }));
}

#[test]
fn sample_drag_folds_into_offset() {
    let reports = sample_reports();
    let state = reports[2].overlays["editor"].state.unwrap();
    assert_eq!(state.offset_x, 400.0);
    assert_eq!(state.offset_y, 0.0);
    assert_eq!(reports[2].t_ms, 200);
}

#[test]
fn sample_zoom_and_pan_follow_node() {
    let reports = sample_reports();
    assert_eq!(reports[3].overlays["editor"].rect.origin(), Point::new(450.0, 200.0));
    assert_eq!(reports[3].overlays["editor"].rect.size(), Size::new(160.0, 120.0));
    assert_eq!(reports[4].overlays["editor"].rect.origin(), Point::new(490.0, 190.0));
}

#[test]
fn sample_resize_folds_while_zoom_settles() {
    let reports = sample_reports();
    assert_eq!(reports[5].overlays["editor"].state.unwrap().size, Some(Size::new(480.0, 320.0)));
    assert_eq!(reports[6].overlays["editor"].state.unwrap().size, Some(Size::new(480.0, 320.0)));
    assert_eq!(reports[6].overlays["editor"].rect.size(), Size::new(240.0, 160.0));
}

#[test]
fn sample_removal_untracks() {
    let reports = sample_reports();
    let last = &reports[7].overlays["editor"];
    assert!(!last.tracked);
    assert!(!last.attached);
    assert!(last.state.is_none());
}

#[test]
fn unknown_overlay_is_an_error() {
    let scenario = parse(r#"{ "steps": [ { "op": "drag", "overlay": "nope", "x": 1, "y": 1 } ] }"#).unwrap();
    let err = replay(&scenario, PinConfig::default()).unwrap_err();
    assert!(matches!(err, CliError::UnknownOverlay(name) if name == "nope"));
}

#[test]
fn pin_failure_is_reported_not_fatal() {
    let raw = r#"{
        "nodes": { "n": { "x": 0, "y": 0, "width": 10, "height": 10 } },
        "overlays": { "o": { "x": 0, "y": 0, "width": 10, "height": 10 } },
        "steps": [
            { "op": "remove_node", "node": "n" },
            { "op": "pin", "overlay": "o", "node": "n" },
            { "op": "unpin_all" }
        ]
    }"#;
    let reports = replay(&parse(raw).unwrap(), PinConfig::default()).unwrap();
    assert_eq!(reports.len(), 3);
    assert!(reports[1].error.as_deref().unwrap().contains("node"));
    assert!(!reports[1].overlays["o"].tracked);
    assert!(matches!(check_failures(&reports), Err(CliError::StepsFailed(1))));
}

#[test]
fn clean_replay_has_no_failures() {
    assert!(check_failures(&sample_reports()).is_ok());
}

#[test]
fn invalid_tuning_fails_replay() {
    let scenario = parse(scenario::SAMPLE).unwrap();
    let config = PinConfig { size_tolerance_px: f64::NAN, ..PinConfig::default() };
    assert!(matches!(replay(&scenario, config), Err(CliError::Config(_))));
}

#[test]
fn tuning_flags_fall_back_to_env() {
    let command = Cli::command();
    let env_of = |id: &str| {
        command
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .and_then(|arg| arg.get_env())
            .map(|env| env.to_string_lossy().into_owned())
    };
    assert_eq!(env_of("poll_ms").as_deref(), Some(ENV_POLL_INTERVAL_MS));
    assert_eq!(env_of("position_tolerance").as_deref(), Some(ENV_POSITION_TOLERANCE_PX));
    assert_eq!(env_of("size_tolerance").as_deref(), Some(ENV_SIZE_TOLERANCE_PX));
    assert_eq!(env_of("settle_ticks").as_deref(), Some(ENV_ZOOM_SETTLE_TICKS));
}

#[test]
fn malformed_scenario_is_invalid_json() {
    assert!(matches!(parse("{ \"steps\": [ { \"op\": \"fly\" } ] }"), Err(CliError::InvalidJson(_))));
}

#[test]
fn tuning_overrides_env_defaults() {
    let tuning = Tuning { poll_ms: Some(150), position_tolerance: None, size_tolerance: Some(8.0), settle_ticks: Some(0) };
    let config = resolve_config(&tuning).unwrap();
    assert_eq!(config.poll_interval, Duration::from_millis(150));
    assert_eq!(config.size_tolerance_px, 8.0);
    assert_eq!(config.zoom_settle_ticks, 0);
}

#[test]
fn tuning_rejects_negative_tolerance() {
    let tuning = Tuning { poll_ms: None, position_tolerance: Some(-1.0), size_tolerance: None, settle_ticks: None };
    assert!(matches!(resolve_config(&tuning), Err(CliError::Config(_))));
}
