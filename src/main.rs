#![forbid(unsafe_code)]

//! Headless simulator for the annotation engine.
//!
//! Builds the standard chat and nameplate containers in an in-memory host
//! tree, replays a scripted scenario against them while pumping host
//! events through the engine, and prints every record with its tag chips.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{error, info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use player_tagger::constants::{markup, patterns, selectors};
use player_tagger::host::memory::MemoryTree;
use player_tagger::host::{HostTree, NodeId, Pattern};
use player_tagger::{PlayerTagger, TaggerSettings};

#[derive(Debug, Parser)]
#[command(name = "player-tagger", about = "Replay a tagging scenario against an in-memory host tree")]
struct Args {
    /// JSON scenario file; a built-in demo scenario runs when omitted
    scenario: Option<PathBuf>,

    /// Virtual milliseconds to keep polling after the last step
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,

    /// Tear the engine down at the end and report what is left behind
    #[arg(long)]
    teardown: bool,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    settings: TaggerSettings,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Step {
    /// A chat line appears
    Chat {
        #[serde(default)]
        channel: Channel,
        from: String,
        text: String,
    },
    /// A nameplate appears
    Nameplate { player: String },
    /// A chat line is removed again (index in appearance order)
    RemoveChat { index: usize },
    /// A nameplate disappears
    RemoveNameplate { player: String },
    /// The user edits the settings
    Settings { settings: TaggerSettings },
    /// Let the virtual clock run
    Wait { ms: u64 },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Channel {
    #[default]
    Public,
    Private,
}

struct SimWorld {
    tree: MemoryTree,
    public_container: NodeId,
    private_list: NodeId,
    nameplate_container: NodeId,
    chat_records: Vec<NodeId>,
    nameplates: HashMap<String, NodeId>,
}

fn build_world() -> SimWorld {
    let mut tree = MemoryTree::new();
    let root = tree.root();
    let public_list = tree.add_element(root, Some(selectors::PUBLIC_MESSAGE_LIST), &[], None);
    let public_container = tree.add_element(
        public_list,
        Some(selectors::PUBLIC_MESSAGE_CONTAINER),
        &[],
        None,
    );
    let private_list = tree.add_element(root, Some(selectors::PRIVATE_MESSAGE_LIST), &[], None);
    let nameplate_container = tree.add_element(root, Some(selectors::NAMEPLATE_CONTAINER), &[], None);
    SimWorld {
        tree,
        public_container,
        private_list,
        nameplate_container,
        chat_records: Vec::new(),
        nameplates: HashMap::new(),
    }
}

fn pump(world: &mut SimWorld, tagger: &mut PlayerTagger) {
    while let Some(event) = world.tree.pop_event() {
        let _ = tagger
            .handle_event(&mut world.tree, event)
            .inspect_err(|err| error!("encountered error while handling host event: err={err:#?}"));
    }
}

fn run_for(world: &mut SimWorld, tagger: &mut PlayerTagger, ms: u64) {
    let mut elapsed = 0u64;
    while elapsed < ms {
        world.tree.advance(10);
        elapsed += 10;
        pump(world, tagger);
    }
}

fn apply_step(world: &mut SimWorld, tagger: &mut PlayerTagger, step: Step) -> Result<()> {
    match step {
        Step::Chat { channel, from, text } => {
            let (container, name_text) = match channel {
                Channel::Public => (world.public_container, format!("{from}:")),
                Channel::Private => (world.private_list, format!("From {from}:")),
            };
            let record =
                world
                    .tree
                    .add_element(container, None, &[patterns::MESSAGE_RECORD_CLASS], None);
            world
                .tree
                .add_element(record, None, &[patterns::PLAYER_NAME_CLASS], Some(&name_text));
            world.tree.add_element(record, None, &[], Some(&text));
            world.chat_records.push(record);
        }
        Step::Nameplate { player } => {
            let element_id = format!("{}-{}", patterns::NAMEPLATE_RECORD_PREFIX, player);
            let record = world.tree.add_element(
                world.nameplate_container,
                Some(&element_id),
                &[],
                Some(&player),
            );
            world.nameplates.insert(player, record);
        }
        Step::RemoveChat { index } => {
            if let Some(&record) = world.chat_records.get(index) {
                world.tree.remove_subtree(record);
            }
        }
        Step::RemoveNameplate { player } => {
            if let Some(record) = world.nameplates.remove(&player) {
                world.tree.remove_subtree(record);
            }
        }
        Step::Settings { settings } => {
            tagger.settings_changed(&mut world.tree, settings)?;
        }
        Step::Wait { ms } => {
            run_for(world, tagger, ms);
        }
    }
    Ok(())
}

fn chips_on(tree: &MemoryTree, record: NodeId) -> Vec<(String, String)> {
    tree.query(record, Pattern::Class(markup::CHIP_CLASS))
        .into_iter()
        .map(|chip| {
            (
                tree.own_text(chip).unwrap_or_default(),
                tree.style_of(chip).unwrap_or_default(),
            )
        })
        .collect()
}

fn print_world(world: &SimWorld) {
    println!("chat records:");
    for &record in &world.chat_records {
        if !world.tree.contains(record) {
            continue;
        }
        let name = world
            .tree
            .find_child(record, Pattern::Class(patterns::PLAYER_NAME_CLASS))
            .and_then(|field| world.tree.own_text(field))
            .unwrap_or_default();
        print_record(world, record, &name);
    }

    println!("nameplates:");
    let mut plates: Vec<_> = world.nameplates.iter().collect();
    plates.sort_by(|a, b| a.0.cmp(b.0));
    for (player, &record) in plates {
        if !world.tree.contains(record) {
            continue;
        }
        print_record(world, record, player);
    }
}

fn print_record(world: &SimWorld, record: NodeId, label: &str) {
    let chips = chips_on(&world.tree, record);
    if chips.is_empty() {
        println!("  {record} {label:?}");
        return;
    }
    let rendered: Vec<String> = chips
        .iter()
        .map(|(text, style)| format!("[{text} | {style}]"))
        .collect();
    println!("  {record} {label:?} -> {}", rendered.join(" "));
}

fn builtin_scenario() -> Scenario {
    Scenario {
        settings: TaggerSettings {
            player_tags: "bob:CLAN,VIP;alice:FRIEND".to_string(),
            tag_styles: "+CLAN=color:red; +FRIEND=color:green;".to_string(),
            ..TaggerSettings::default()
        },
        steps: vec![
            Step::Chat {
                channel: Channel::Public,
                from: "Bob".to_string(),
                text: "hello there".to_string(),
            },
            Step::Nameplate {
                player: "Bob".to_string(),
            },
            Step::Wait { ms: 600 },
            Step::Chat {
                channel: Channel::Private,
                from: "Alice".to_string(),
                text: "psst".to_string(),
            },
            Step::Wait { ms: 600 },
        ],
    }
}

fn run(scenario: Scenario, settle_ms: u64, teardown: bool) -> Result<()> {
    let mut world = build_world();
    let mut tagger = PlayerTagger::new(scenario.settings);
    tagger.init(&mut world.tree)?;
    tagger.start();

    for step in scenario.steps {
        apply_step(&mut world, &mut tagger, step)?;
        pump(&mut world, &mut tagger);
    }
    run_for(&mut world, &mut tagger, settle_ms);

    print_world(&world);

    if teardown {
        tagger.stop(&mut world.tree);
        let root = world.tree.root();
        let leftovers = world
            .tree
            .query(root, Pattern::Class(markup::ANNOTATION_CLASS))
            .len();
        println!("after teardown: {leftovers} annotation fragments left in the tree");
    }
    Ok(())
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let scenario = match &args.scenario {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read scenario from {:?}", path))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse scenario JSON from {:?}", path))?
        }
        None => builtin_scenario(),
    };
    info!(steps = scenario.steps.len(), "running scenario");

    run(scenario, args.settle_ms, args.teardown)
}
