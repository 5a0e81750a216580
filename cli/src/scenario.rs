//! Scenario files and their replay against the simulated host.
//!
//! A scenario declares a camera, nodes (graph rects), overlays (screen rects)
//! and a list of steps. Each step is applied, the event loop is drained, and
//! a snapshot of every overlay is recorded.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use nodepin::camera::{Camera, Point, Rect, Size};
use nodepin::config::PinConfig;
use nodepin::host::OverlaySurface;
use nodepin::sim::{SimCanvas, SimNode, SimOverlay};
use nodepin::state::PositionState;
use nodepin::tracker::PinTracker;
use serde::{Deserialize, Serialize};

use crate::CliError;

/// Drag, then zoom, then resize while the zoom is still settling.
pub(crate) const SAMPLE: &str = r#"{
  "camera": { "pan_x": 0, "pan_y": 0, "zoom": 1 },
  "container": { "x": 0, "y": 0 },
  "nodes": { "note": { "x": 500, "y": 400, "width": 200, "height": 100 } },
  "overlays": { "editor": { "x": 800, "y": 350, "width": 320, "height": 240 } },
  "steps": [
    { "op": "pin", "overlay": "editor", "node": "note" },
    { "op": "drag", "overlay": "editor", "x": 900, "y": 400 },
    { "op": "wait", "ms": 200 },
    { "op": "zoom", "zoom": 0.5 },
    { "op": "pan", "dx": 40, "dy": -10 },
    { "op": "resize", "overlay": "editor", "width": 240, "height": 160 },
    { "op": "wait", "ms": 600 },
    { "op": "remove", "overlay": "editor" }
  ]
}"#;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Scenario {
    #[serde(default)]
    pub camera: Camera,
    #[serde(default)]
    pub container: Point,
    #[serde(default)]
    pub nodes: BTreeMap<String, Rect>,
    #[serde(default)]
    pub overlays: BTreeMap<String, Rect>,
    pub steps: Vec<Step>,
}

fn default_notify() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Step {
    Pin { overlay: String, node: String },
    Unpin { overlay: String },
    UnpinAll,
    Pan { dx: f64, dy: f64 },
    Zoom { zoom: f64 },
    MoveNode { node: String, x: f64, y: f64 },
    RemoveNode { node: String },
    Drag { overlay: String, x: f64, y: f64 },
    Resize {
        overlay: String,
        width: f64,
        height: f64,
        /// Whether the native resize signal fires.
        #[serde(default = "default_notify")]
        notify: bool,
    },
    Remove { overlay: String },
    Wait { ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OverlayReport {
    pub tracked: bool,
    pub attached: bool,
    pub rect: Rect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PositionState>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StepReport {
    pub index: usize,
    pub t_ms: u64,
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub overlays: BTreeMap<String, OverlayReport>,
}

/// Parse a scenario from JSON text.
///
/// # Errors
///
/// Returns [`CliError::InvalidJson`] for malformed input.
pub(crate) fn parse(raw: &str) -> Result<Scenario, CliError> {
    Ok(serde_json::from_str(raw)?)
}

struct Stage {
    sim: SimCanvas,
    tracker: PinTracker<SimCanvas>,
    nodes: BTreeMap<String, Rc<SimNode>>,
    overlays: BTreeMap<String, Rc<SimOverlay>>,
}

impl Stage {
    fn node(&self, name: &str) -> Result<&Rc<SimNode>, CliError> {
        self.nodes
            .get(name)
            .ok_or_else(|| CliError::UnknownNode(name.to_owned()))
    }

    fn overlay(&self, name: &str) -> Result<&Rc<SimOverlay>, CliError> {
        self.overlays
            .get(name)
            .ok_or_else(|| CliError::UnknownOverlay(name.to_owned()))
    }

    /// Apply one step. Pin failures are reported, not fatal.
    fn apply(&mut self, step: &Step) -> Result<Option<String>, CliError> {
        match step {
            Step::Pin { overlay, node } => {
                let node = Rc::clone(self.node(node)?);
                let surface = Rc::clone(self.overlay(overlay)?);
                if let Err(e) = self.tracker.pin(overlay, node, surface) {
                    tracing::warn!(error = %e, "pin failed");
                    return Ok(Some(e.to_string()));
                }
            }
            Step::Unpin { overlay } => self.tracker.unpin(overlay),
            Step::UnpinAll => self.tracker.unpin_all(),
            Step::Pan { dx, dy } => self.sim.pan_by(*dx, *dy),
            Step::Zoom { zoom } => self.sim.set_zoom(*zoom),
            Step::MoveNode { node, x, y } => self.node(node)?.move_to(Point::new(*x, *y)),
            Step::RemoveNode { node } => self.node(node)?.remove(),
            Step::Drag { overlay, x, y } => self.overlay(overlay)?.drag_to(Point::new(*x, *y)),
            Step::Resize { overlay, width, height, notify } => {
                let surface = self.overlay(overlay)?;
                let size = Size::new(*width, *height);
                if *notify {
                    surface.resize_to(size);
                } else {
                    surface.resize_unobserved(size);
                }
            }
            Step::Remove { overlay } => self.overlay(overlay)?.detach(),
            Step::Wait { ms } => self
                .sim
                .advance(&mut self.tracker, Duration::from_millis(*ms)),
        }
        Ok(None)
    }

    fn snapshot(&self) -> BTreeMap<String, OverlayReport> {
        self.overlays
            .iter()
            .map(|(id, surface)| {
                let report = OverlayReport {
                    tracked: self.tracker.is_tracked(id),
                    attached: surface.is_attached(),
                    rect: surface.rect(),
                    state: self.tracker.position_state(id),
                };
                (id.clone(), report)
            })
            .collect()
    }
}

/// Replay every step and collect a report after each.
///
/// # Errors
///
/// Returns [`CliError::Config`] for unusable tuning, and
/// [`CliError::UnknownNode`] / [`CliError::UnknownOverlay`] when a step names
/// something the scenario did not declare.
pub(crate) fn replay(scenario: &Scenario, config: PinConfig) -> Result<Vec<StepReport>, CliError> {
    let sim = SimCanvas::with_camera(scenario.camera);
    sim.set_container_origin(scenario.container);
    let tracker = PinTracker::with_config(sim.clone(), config)?;
    let nodes = scenario
        .nodes
        .iter()
        .map(|(name, rect)| (name.clone(), sim.add_node(*rect)))
        .collect();
    let overlays = scenario
        .overlays
        .iter()
        .map(|(name, rect)| (name.clone(), sim.add_overlay(*rect)))
        .collect();
    let mut stage = Stage { sim, tracker, nodes, overlays };

    let mut reports = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let error = stage.apply(step)?;
        stage.sim.run(&mut stage.tracker);
        tracing::debug!(index, ?step, "step applied");
        reports.push(StepReport {
            index,
            t_ms: u64::try_from(stage.sim.now().as_millis()).unwrap_or(u64::MAX),
            step: step.clone(),
            error,
            overlays: stage.snapshot(),
        });
    }
    Ok(reports)
}
