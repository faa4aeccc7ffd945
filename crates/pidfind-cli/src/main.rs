//! pidfind - Find which packet definition an unknown opcode uses
//!
//! This tool replays a session script of `fpi` commands and hex-encoded
//! packets through the packet id finder, printing every candidate
//! definition that reproduces an observed packet byte for byte.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pidfind_core::{
    DefinitionRegistry, Direction, HookBus, PacketIdFinder, RawPacket, RegistryConfig,
    SchemaRegistry,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Find which packet definition an unknown opcode uses
#[derive(Parser, Debug)]
#[command(name = "pidfind")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory of NAME.VERSION.def definitions (walked recursively)
    #[arg(short, long, env = "PIDFIND_DEFINITIONS")]
    definitions: PathBuf,

    /// Protocol version whose opcode map (protocol.<VERSION>.map) is loaded
    #[arg(short, long, env = "PIDFIND_PROTOCOL_VERSION", default_value = "0")]
    protocol_version: u32,

    /// Explicit opcode map file
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Session script to replay (defaults to stdin)
    script: Option<PathBuf>,
}

/// One line of a session script
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScriptLine {
    /// `fpi [arg1] [arg2]`
    Command(Option<String>, Option<String>),
    /// `in|out [fake] HEX`
    Packet(RawPacket),
    /// Blank or comment
    Skip,
}

impl ScriptLine {
    fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(ScriptLine::Skip);
        }

        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default();
        match keyword {
            "fpi" => {
                let arg1 = words.next().map(str::to_string);
                let arg2 = words.next().map(str::to_string);
                Ok(ScriptLine::Command(arg1, arg2))
            }
            "in" | "out" => {
                let direction = if keyword == "in" {
                    Direction::Incoming
                } else {
                    Direction::Outgoing
                };
                let mut synthetic = false;
                let mut hex_word = words.next();
                if hex_word == Some("fake") {
                    synthetic = true;
                    hex_word = words.next();
                }
                let Some(hex_word) = hex_word else {
                    bail!("missing packet bytes");
                };
                if words.next().is_some() {
                    bail!("unexpected text after packet bytes");
                }

                let data = hex::decode(hex_word).context("invalid packet hex")?;
                let Some(packet) = RawPacket::from_bytes(data, direction) else {
                    bail!("packet shorter than its 4 byte header");
                };
                Ok(ScriptLine::Packet(packet.synthetic(synthetic)))
            }
            other => bail!("unknown script keyword '{}'", other),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let registry = load_registry(&cli)?;

    match &cli.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open script: {}", path.display()))?;
            run_session(registry, BufReader::new(file))
        }
        None => run_session(registry, io::stdin().lock()),
    }
}

fn load_registry(cli: &Cli) -> Result<DefinitionRegistry> {
    if !cli.definitions.is_dir() {
        bail!(
            "Definitions path is not a directory: {}",
            cli.definitions.display()
        );
    }

    let mut config = RegistryConfig::new().protocol_version(cli.protocol_version);
    if let Some(map) = &cli.map {
        config = config.map_file(map);
    }

    let registry = DefinitionRegistry::load(&cli.definitions, &config).with_context(|| {
        format!(
            "Failed to load definitions from {}",
            cli.definitions.display()
        )
    })?;

    info!(
        "Loaded {} definitions, {} known opcodes (protocol {})",
        registry.schema_names().len(),
        registry.opcodes().len(),
        registry.protocol_version()
    );
    Ok(registry)
}

/// Replays a session script, printing finder output on stdout
fn run_session(registry: DefinitionRegistry, input: impl BufRead) -> Result<()> {
    let sink = |line: &str| println!("{}", line);
    let mut finder = PacketIdFinder::new(Rc::new(registry), Rc::new(sink));
    let mut bus = HookBus::new();

    let result = replay(&mut finder, &mut bus, input);

    finder.shutdown(&mut bus);
    result
}

fn replay(finder: &mut PacketIdFinder, bus: &mut HookBus, input: impl BufRead) -> Result<()> {
    for (index, line) in input.lines().enumerate() {
        let line = line.context("Failed to read script")?;
        let line_number = index + 1;

        let parsed = match ScriptLine::parse(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("line {}: {:#}", line_number, e);
                continue;
            }
        };

        match parsed {
            ScriptLine::Skip => {}
            ScriptLine::Command(arg1, arg2) => {
                if let Err(e) = finder.handle_command(arg1.as_deref(), arg2.as_deref(), bus) {
                    // Operator mistakes are reported, not fatal
                    println!("fpi: {}", e);
                }
            }
            ScriptLine::Packet(packet) => {
                let delivered = bus.deliver(&packet);
                debug!(
                    "line {}: opcode {} {} ({} bytes) -> {} hooks",
                    line_number,
                    packet.opcode,
                    packet.direction,
                    packet.data.len(),
                    delivered
                );
            }
        }
    }
    Ok(())
}
