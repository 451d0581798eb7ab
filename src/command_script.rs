use anyhow::{bail, Result};
use glam::DVec3;
use mdholo_core::{SimTick, ViewerId, WorldId};
use serde::Deserialize;
use std::{collections::VecDeque, fs, path::Path};

#[derive(Debug, Deserialize)]
struct ScriptFile {
    steps: Vec<StepDef>,
}

#[derive(Debug, Deserialize)]
struct StepDef {
    pass: u64,
    #[serde(flatten)]
    action: ActionDef,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActionDef {
    Command {
        command: String,
    },
    Viewer {
        viewer: u64,
        #[serde(default)]
        world: Option<String>,
        at: [f64; 3],
    },
}

/// One scripted action, due at a scheduler pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptAction {
    /// A hologram command line, parsed by the command table.
    Command(String),
    /// Pin a simulated viewer to a position; `world: None` keeps its world.
    PlaceViewer {
        viewer: ViewerId,
        world: Option<WorldId>,
        position: DVec3,
    },
}

/// Hologram commands and viewer placements keyed by scheduler pass.
///
/// Steps run in file order and must be sorted by `pass`.
#[derive(Debug)]
pub struct CommandScriptPlayer {
    pending: VecDeque<(SimTick, ScriptAction)>,
}

impl CommandScriptPlayer {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(contents: &str) -> Result<Self> {
        let file: ScriptFile = serde_json::from_str(contents)?;
        if file.steps.is_empty() {
            bail!("command script contains no steps");
        }

        let mut pending = VecDeque::with_capacity(file.steps.len());
        let mut last = 0;
        for (index, step) in file.steps.into_iter().enumerate() {
            if step.pass < last {
                bail!("step {index}: steps must be sorted by pass");
            }
            last = step.pass;

            let action = match step.action {
                ActionDef::Command { command } => {
                    let command = command.trim();
                    if command.is_empty() {
                        bail!("step {index}: empty command");
                    }
                    ScriptAction::Command(command.to_string())
                }
                ActionDef::Viewer { viewer, world, at } => {
                    let position = DVec3::from_array(at);
                    if !position.is_finite() {
                        bail!("step {index}: viewer position must be finite");
                    }
                    ScriptAction::PlaceViewer {
                        viewer: ViewerId(viewer),
                        world: world.map(WorldId::new),
                        position,
                    }
                }
            };
            pending.push_back((SimTick(step.pass), action));
        }

        Ok(Self { pending })
    }

    /// Remove and return every action due at or before `pass`.
    pub fn drain_ready(&mut self, pass: SimTick) -> Vec<ScriptAction> {
        let mut ready = Vec::new();
        while self.pending.front().is_some_and(|(due, _)| *due <= pass) {
            if let Some((_, action)) = self.pending.pop_front() {
                ready.push(action);
            }
        }
        ready
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}
