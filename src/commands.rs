use std::collections::BTreeMap;
use std::fmt;

use glam::DVec3;
use mdholo_core::WorldId;
use mdholo_hologram::{HoloError, LineContent};
use mdholo_server::HologramService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CommandError {}

#[derive(Debug, Clone, PartialEq)]
pub enum HoloCommand {
    Create {
        id: String,
        world: WorldId,
        position: DVec3,
        line: LineContent,
    },
    AddLine {
        id: String,
        line: LineContent,
    },
    InsertLine {
        id: String,
        index: usize,
        line: LineContent,
    },
    SetLine {
        id: String,
        index: usize,
        line: LineContent,
    },
    RemoveLine {
        id: String,
        index: usize,
    },
    Move {
        id: String,
        position: DVec3,
    },
    Teleport {
        id: String,
        world: WorldId,
        position: DVec3,
    },
    Copy {
        id: String,
        new_id: String,
        world: Option<WorldId>,
        position: DVec3,
    },
    Delete {
        id: String,
    },
    List,
    Near {
        world: WorldId,
        position: DVec3,
        page: usize,
    },
    Info {
        id: String,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub lines: Vec<String>,
}

type ParseFn = fn(&[&str]) -> Result<HoloCommand, CommandError>;

struct CommandSpec {
    usage: &'static str,
    parse: ParseFn,
}

/// Command names resolved to their parsers once, at construction.
pub struct CommandTable {
    commands: BTreeMap<&'static str, CommandSpec>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        let mut table = Self {
            commands: BTreeMap::new(),
        };
        table.register("create", "create <id> <world> <x> <y> <z> <text>", parse_create);
        table.register("addline", "addline <id> <text>", parse_addline);
        table.register("insertline", "insertline <id> <index> <text>", parse_insertline);
        table.register("setline", "setline <id> <index> <text>", parse_setline);
        table.register("removeline", "removeline <id> <index>", parse_removeline);
        table.register("move", "move <id> <x> <y> <z>", parse_move);
        table.register("teleport", "teleport <id> <world> <x> <y> <z>", parse_teleport);
        table.register("copy", "copy <id> <newId> [world] <x> <y> <z>", parse_copy);
        table.register("delete", "delete <id>", parse_delete);
        table.register("list", "list", parse_list);
        table.register("near", "near <world> <x> <y> <z> [page]", parse_near);
        table.register("info", "info <id>", parse_info);
        table
    }

    fn register(&mut self, name: &'static str, usage: &'static str, parse: ParseFn) {
        self.commands.insert(name, CommandSpec { usage, parse });
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    pub fn parse(&self, input: &str) -> Result<HoloCommand, CommandError> {
        let input = input.trim();
        let input = input.strip_prefix('/').unwrap_or(input).trim();
        let input = input
            .strip_prefix("holo ")
            .or_else(|| input.strip_prefix("hd "))
            .unwrap_or(input)
            .trim();

        let mut parts = input.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| CommandError::new("Missing command"))?
            .to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        let spec = self.commands.get(name.as_str()).ok_or_else(|| {
            CommandError::new(format!(
                "Unknown command: {name}. Known: {}",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        (spec.parse)(&args).map_err(|err| CommandError::new(format!("{err}. Usage: {}", spec.usage)))
    }
}

fn parse_create(args: &[&str]) -> Result<HoloCommand, CommandError> {
    if args.len() < 6 {
        return Err(CommandError::new("Missing arguments"));
    }
    Ok(HoloCommand::Create {
        id: args[0].to_string(),
        world: WorldId::new(args[1]),
        position: parse_position(&args[2..5])?,
        line: parse_line(&args[5..])?,
    })
}

fn parse_addline(args: &[&str]) -> Result<HoloCommand, CommandError> {
    if args.len() < 2 {
        return Err(CommandError::new("Missing arguments"));
    }
    Ok(HoloCommand::AddLine {
        id: args[0].to_string(),
        line: parse_line(&args[1..])?,
    })
}

fn parse_insertline(args: &[&str]) -> Result<HoloCommand, CommandError> {
    if args.len() < 3 {
        return Err(CommandError::new("Missing arguments"));
    }
    Ok(HoloCommand::InsertLine {
        id: args[0].to_string(),
        index: parse_index(args[1])?,
        line: parse_line(&args[2..])?,
    })
}

fn parse_setline(args: &[&str]) -> Result<HoloCommand, CommandError> {
    if args.len() < 3 {
        return Err(CommandError::new("Missing arguments"));
    }
    Ok(HoloCommand::SetLine {
        id: args[0].to_string(),
        index: parse_index(args[1])?,
        line: parse_line(&args[2..])?,
    })
}

fn parse_removeline(args: &[&str]) -> Result<HoloCommand, CommandError> {
    if args.len() != 2 {
        return Err(CommandError::new("Expected 2 arguments"));
    }
    Ok(HoloCommand::RemoveLine {
        id: args[0].to_string(),
        index: parse_index(args[1])?,
    })
}

fn parse_move(args: &[&str]) -> Result<HoloCommand, CommandError> {
    if args.len() != 4 {
        return Err(CommandError::new("Expected 4 arguments"));
    }
    Ok(HoloCommand::Move {
        id: args[0].to_string(),
        position: parse_position(&args[1..4])?,
    })
}

fn parse_teleport(args: &[&str]) -> Result<HoloCommand, CommandError> {
    if args.len() != 5 {
        return Err(CommandError::new("Expected 5 arguments"));
    }
    Ok(HoloCommand::Teleport {
        id: args[0].to_string(),
        world: WorldId::new(args[1]),
        position: parse_position(&args[2..5])?,
    })
}

fn parse_copy(args: &[&str]) -> Result<HoloCommand, CommandError> {
    let (world, coords) = match args.len() {
        5 => (None, &args[2..5]),
        6 => (Some(WorldId::new(args[2])), &args[3..6]),
        _ => return Err(CommandError::new("Expected 5 or 6 arguments")),
    };
    Ok(HoloCommand::Copy {
        id: args[0].to_string(),
        new_id: args[1].to_string(),
        world,
        position: parse_position(coords)?,
    })
}

fn parse_delete(args: &[&str]) -> Result<HoloCommand, CommandError> {
    match args {
        [id] => Ok(HoloCommand::Delete { id: id.to_string() }),
        _ => Err(CommandError::new("Expected 1 argument")),
    }
}

fn parse_list(args: &[&str]) -> Result<HoloCommand, CommandError> {
    if !args.is_empty() {
        return Err(CommandError::new("Expected no arguments"));
    }
    Ok(HoloCommand::List)
}

fn parse_near(args: &[&str]) -> Result<HoloCommand, CommandError> {
    let page = match args.len() {
        4 => 1,
        5 => args[4]
            .parse::<usize>()
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| CommandError::new(format!("Invalid page: {}", args[4])))?,
        _ => return Err(CommandError::new("Expected 4 or 5 arguments")),
    };
    Ok(HoloCommand::Near {
        world: WorldId::new(args[0]),
        position: parse_position(&args[1..4])?,
        page,
    })
}

fn parse_info(args: &[&str]) -> Result<HoloCommand, CommandError> {
    match args {
        [id] => Ok(HoloCommand::Info { id: id.to_string() }),
        _ => Err(CommandError::new("Expected 1 argument")),
    }
}

fn parse_index(token: &str) -> Result<usize, CommandError> {
    token
        .parse::<usize>()
        .map_err(|_| CommandError::new(format!("Invalid line index: {token}")))
}

fn parse_position(tokens: &[&str]) -> Result<DVec3, CommandError> {
    let mut coords = [0.0; 3];
    for (slot, token) in coords.iter_mut().zip(tokens) {
        let value = token
            .parse::<f64>()
            .map_err(|_| CommandError::new(format!("Invalid coordinate: {token}")))?;
        if !value.is_finite() {
            return Err(CommandError::new(format!("Invalid coordinate: {token}")));
        }
        *slot = value;
    }
    Ok(DVec3::from_array(coords))
}

/// Line text, or `anim:<ticks>:<frame>|<frame>|...` for an animated line.
fn parse_line(words: &[&str]) -> Result<LineContent, CommandError> {
    let text = words.join(" ");
    let Some(spec) = text.strip_prefix("anim:") else {
        return Ok(LineContent::Text(text));
    };
    let (interval, frames) = spec
        .split_once(':')
        .ok_or_else(|| CommandError::new("Animated lines look like anim:<ticks>:<a>|<b>"))?;
    let interval = interval
        .parse::<u64>()
        .ok()
        .filter(|ticks| *ticks > 0)
        .ok_or_else(|| CommandError::new(format!("Invalid frame interval: {interval}")))?;
    let frames = frames.split('|').map(str::to_string).collect();
    LineContent::animated(frames, interval).map_err(|err| CommandError::new(err.to_string()))
}

fn describe(err: HoloError) -> String {
    format!("Error: {err}")
}

pub fn execute_command(service: &HologramService, cmd: HoloCommand) -> CommandOutput {
    let mut out = CommandOutput::default();
    let result: Result<String, HoloError> = match cmd {
        HoloCommand::Create {
            id,
            world,
            position,
            line,
        } => service
            .create(&id, world, position, vec![line])
            .map(|h| format!("Created hologram {}", h.id())),
        HoloCommand::AddLine { id, line } => service
            .add_line(&id, line)
            .map(|index| format!("Added line {index} to {id}")),
        HoloCommand::InsertLine { id, index, line } => service
            .insert_line(&id, index, line)
            .map(|()| format!("Inserted line {index} into {id}")),
        HoloCommand::SetLine { id, index, line } => service
            .set_line(&id, index, line)
            .map(|()| format!("Set line {index} of {id}")),
        HoloCommand::RemoveLine { id, index } => service
            .remove_line(&id, index)
            .map(|_| format!("Removed line {index} from {id}")),
        HoloCommand::Move { id, position } => service
            .move_to(&id, position)
            .map(|()| format!("Moved {id} to {:.2} {:.2} {:.2}", position.x, position.y, position.z)),
        HoloCommand::Teleport {
            id,
            world,
            position,
        } => {
            let label = world.to_string();
            service.teleport(&id, world, position).map(|()| {
                format!(
                    "Teleported {id} to {label} {:.2} {:.2} {:.2}",
                    position.x, position.y, position.z
                )
            })
        }
        HoloCommand::Copy {
            id,
            new_id,
            world,
            position,
        } => service
            .copy(&id, &new_id, world, position)
            .map(|copy| format!("Copied {id} to {}", copy.id())),
        HoloCommand::Delete { id } => service.delete(&id).map(|()| format!("Deleted {id}")),
        HoloCommand::List => {
            let ids = service.list();
            out.lines.push(format!("{} hologram(s)", ids.len()));
            out.lines.extend(ids.iter().map(|id| format!("- {id}")));
            return out;
        }
        HoloCommand::Near {
            world,
            position,
            page,
        } => {
            let entries = service.near(&world, position, page);
            if entries.is_empty() {
                out.lines.push(format!("No holograms on page {page}"));
            }
            out.lines.extend(
                entries
                    .iter()
                    .map(|entry| format!("{} ({:.1} blocks)", entry.id, entry.distance)),
            );
            return out;
        }
        HoloCommand::Info { id } => match service.info(&id) {
            Ok(info) => {
                let anchor = info.placement.anchor;
                out.lines.push(format!(
                    "{} [{}] in {} at {:.2} {:.2} {:.2}, range {}, {} viewer(s)",
                    info.id,
                    info.kind.label(),
                    info.placement.world,
                    anchor.x,
                    anchor.y,
                    anchor.z,
                    info.placement.range,
                    info.viewers
                ));
                out.lines.extend(
                    info.lines
                        .iter()
                        .enumerate()
                        .map(|(index, text)| format!("{index}: {text}")),
                );
                return out;
            }
            Err(err) => Err(err),
        },
    };
    out.lines.push(result.unwrap_or_else(describe));
    out
}
