use crate::command_script::{CommandScriptPlayer, ScriptAction};
use crate::commands::{execute_command, CommandTable};
use anyhow::{Context, Result};
use glam::DVec3;
use mdholo_core::{SimTick, ViewerId, WorldId};
use mdholo_hologram::DataSources;
use mdholo_net::{decode_message, FramedOutbox, HoloMessage};
use mdholo_server::{Host, HostConfig, HostParts, JsonFileStore, LoadedWorlds, ShutdownReport, ViewerSnapshot};
use mdholo_testkit::{EventRecord, JsonlSink};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct HeadlessConfig {
    pub host: HostConfig,
    pub ticks: u64,
    pub viewers: u32,
    pub seed: u64,
    pub command_script: Option<PathBuf>,
    pub events: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounts {
    pub spawns: usize,
    pub despawns: usize,
    pub updates: usize,
    pub moves: usize,
}

impl FrameCounts {
    fn record(&mut self, message: &HoloMessage) {
        match message {
            HoloMessage::SpawnText { .. } | HoloMessage::SpawnItem { .. } => self.spawns += 1,
            HoloMessage::Despawn { .. } => self.despawns += 1,
            HoloMessage::UpdateText { .. } => self.updates += 1,
            HoloMessage::Teleport { .. } => self.moves += 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames: FrameCounts,
    pub shutdown: ShutdownReport,
}

struct Walker {
    id: ViewerId,
    world: WorldId,
    position: DVec3,
    pinned: bool,
}

/// Run the host for `ticks` scheduler passes with random-walking viewers.
pub async fn run(cfg: HeadlessConfig) -> Result<RunSummary> {
    let outbox = Arc::new(FramedOutbox::new());
    let store = Arc::new(JsonFileStore::new(&cfg.host.data_path));
    let worlds = cfg.host.world_ids();
    let home = worlds
        .first()
        .cloned()
        .unwrap_or_else(|| WorldId::new("world"));
    let interval = cfg.host.scheduler_interval();

    let host = Host::start(
        cfg.host.clone(),
        HostParts {
            sink: outbox.clone(),
            store,
            worlds: Arc::new(LoadedWorlds::new(worlds)),
            sources: DataSources::default(),
        },
    )?;
    let service = host.service();
    let table = CommandTable::new();

    let mut script = match &cfg.command_script {
        Some(path) => Some(
            CommandScriptPlayer::from_path(path)
                .with_context(|| format!("Failed to load command script {}", path.display()))?,
        ),
        None => None,
    };
    let mut events = match &cfg.events {
        Some(path) => Some(JsonlSink::create(path)?),
        None => None,
    };

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut walkers: Vec<Walker> = (0..cfg.viewers)
        .map(|i| Walker {
            id: ViewerId(u64::from(i) + 1),
            world: home.clone(),
            position: DVec3::new(
                rng.gen_range(-32.0..32.0),
                64.0,
                rng.gen_range(-32.0..32.0),
            ),
            pinned: false,
        })
        .collect();
    for walker in &walkers {
        outbox.connect(walker.id);
        service.on_viewer_join(ViewerSnapshot::new(
            walker.id,
            walker.world.clone(),
            walker.position,
        ));
    }

    let mut frames = FrameCounts::default();
    for tick in 0..cfg.ticks {
        let tick = SimTick(tick);
        let due = script
            .as_mut()
            .map(|script| script.drain_ready(tick))
            .unwrap_or_default();
        for action in due {
            match action {
                ScriptAction::Command(command) => {
                    let output = match table.parse(&command) {
                        Ok(cmd) => execute_command(&service, cmd).lines,
                        Err(err) => vec![format!("Error: {err}")],
                    };
                    for line in &output {
                        info!(tick = tick.0, "{command}: {line}");
                    }
                    if let Some(events) = events.as_mut() {
                        events.write(&EventRecord {
                            tick,
                            kind: "command",
                            payload: &format!("{command} => {}", output.join(" / ")),
                        })?;
                    }
                }
                ScriptAction::PlaceViewer {
                    viewer,
                    world,
                    position,
                } => match walkers.iter_mut().find(|walker| walker.id == viewer) {
                    Some(walker) => {
                        if let Some(world) = world {
                            walker.world = world;
                        }
                        walker.position = position;
                        walker.pinned = true;
                    }
                    None => warn!(%viewer, "script places an unknown viewer"),
                },
            }
        }

        for walker in walkers.iter_mut() {
            if !walker.pinned {
                walker.position.x += rng.gen_range(-2.0..2.0);
                walker.position.z += rng.gen_range(-2.0..2.0);
            }
            service.update_viewer(walker.id, walker.world.clone(), walker.position);
        }

        tokio::time::sleep(interval).await;
        host.flush().await;

        for walker in &walkers {
            let mut counts = FrameCounts::default();
            for frame in outbox.take(walker.id) {
                match decode_message(&frame) {
                    Ok(message) => counts.record(&message),
                    Err(err) => warn!(viewer = %walker.id, "undecodable frame: {err:#}"),
                }
            }
            frames.spawns += counts.spawns;
            frames.despawns += counts.despawns;
            frames.updates += counts.updates;
            frames.moves += counts.moves;
            if counts == FrameCounts::default() {
                continue;
            }
            if let Some(events) = events.as_mut() {
                events.write(&EventRecord {
                    tick,
                    kind: "frames",
                    payload: &format!(
                        "{} spawn={} despawn={} update={} move={}",
                        walker.id, counts.spawns, counts.despawns, counts.updates, counts.moves
                    ),
                })?;
            }
        }
    }

    if script.as_ref().is_some_and(|script| !script.is_finished()) {
        warn!(ticks = cfg.ticks, "command script has steps past the last tick; skipped");
    }

    for walker in &walkers {
        service.on_viewer_leave(walker.id);
        outbox.disconnect(walker.id);
    }
    let shutdown = host.shutdown().await;
    if let Some(events) = events.as_mut() {
        events.write(&EventRecord {
            tick: SimTick(cfg.ticks),
            kind: "shutdown",
            payload: &format!("{shutdown:?}"),
        })?;
    }

    info!(
        ticks = cfg.ticks,
        spawns = frames.spawns,
        despawns = frames.despawns,
        "headless run finished"
    );
    Ok(RunSummary {
        ticks: cfg.ticks,
        frames,
        shutdown,
    })
}
