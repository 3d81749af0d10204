use std::collections::HashSet;
use std::env;
use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::{resolve_session, ResolvedSession};
use crate::error::{BobbleError, Result};
use crate::graph::builder::build_from_stats;
use crate::graph::{viz, DependencyGraph, NodeId};
use crate::reach::{Cut, ReachabilityEngine};
use crate::stats::{load_stats, StatsIndex};
use crate::util::output;

#[derive(Parser, Debug)]
#[command(name = "bobble")]
#[command(about = "Cut-aware reachability for bundler dependency graphs", long_about = None)]
pub struct Cli {
    #[arg(short, long, env = "BOBBLE_STATS")]
    pub stats: Option<PathBuf>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[arg(short, long)]
    pub quiet: bool,
    #[arg(long)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Groups(GroupsArgs),
    Analyze(AnalyzeArgs),
    Tree(TreeArgs),
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct GroupsArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct SelectionArgs {
    /// Chunk group to include; repeatable.
    #[arg(short = 'g', long = "group")]
    pub groups: Vec<String>,
    /// Include every chunk group whose name matches this regex.
    #[arg(long)]
    pub group_pattern: Option<String>,
    /// Module id, or `parent => child` for an edge; repeatable.
    #[arg(long = "cut")]
    pub cuts: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// tree, flat, dot or json
    #[arg(long)]
    pub format: Option<String>,
    /// Also show cut and unreachable branches.
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run() {
    let cli = Cli::parse();
    output::set_quiet(cli.quiet);
    if cli.no_color {
        output::set_color(false);
    }
    init_tracing(cli.verbose);

    if let Err(err) = dispatch(cli) {
        output::error(&err.to_string());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Groups(args) => handle_groups(args, cli.stats, cli.config),
        Commands::Analyze(args) => handle_analyze(args, cli.stats, cli.config),
        Commands::Tree(args) => handle_tree(args, cli.stats, cli.config),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            generate(args.shell, &mut command, "bobble", &mut io::stdout());
            Ok(())
        }
    }
}

fn handle_groups(
    args: GroupsArgs,
    stats_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let session = load_session(config_path)?;
    let index = load_index(stats_path, &session)?;
    let summaries = index.group_summaries();

    if args.json {
        println!("{}", to_json(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        output::info("no chunk groups in stats file");
        return Ok(());
    }
    let width = summaries
        .iter()
        .map(|summary| summary.name.len())
        .max()
        .unwrap_or(0);
    for summary in &summaries {
        println!(
            "{:<width$}  {:>4} chunks  {:>6} modules  {:>10} bytes",
            summary.name,
            summary.chunks,
            summary.modules,
            summary.size,
            width = width
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct AnalyzeReport {
    selected_modules: usize,
    selected_size: u64,
    reachable_modules: usize,
    reachable_size: u64,
    recomputations: u64,
    cuts: Vec<String>,
    removed: Vec<RemovedModule>,
}

#[derive(Debug, Serialize)]
struct RemovedModule {
    id: String,
    name: String,
    size: u64,
}

fn handle_analyze(
    args: AnalyzeArgs,
    stats_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let session = load_session(config_path)?;
    let engine = prepare_engine(&args.selection, stats_path, &session)?;
    let report = analyze_report(&engine);

    if args.json {
        println!("{}", to_json(&report)?);
        return Ok(());
    }

    println!(
        "selected     {} modules, {} bytes",
        report.selected_modules, report.selected_size
    );
    println!(
        "reachable    {} modules, {} bytes",
        report.reachable_modules, report.reachable_size
    );
    println!("cuts         {}", report.cuts.len());
    for cut in &report.cuts {
        println!("  {cut}");
    }
    println!("removed      {} modules", report.removed.len());
    for module in &report.removed {
        println!("  {} ({} bytes)", module.name, module.size);
    }
    println!("recomputed   {} times", report.recomputations);
    Ok(())
}

fn analyze_report(engine: &ReachabilityEngine) -> AnalyzeReport {
    let reach = engine.reachability();
    let (selected_modules, selected_size, mut removed) = match engine.graph() {
        Some(graph) => {
            let removed: Vec<RemovedModule> = graph
                .nodes()
                .filter(|node| !reach.is_reachable(&node.id))
                .map(|node| RemovedModule {
                    id: node.id.to_string(),
                    name: graph.label(&node.id),
                    size: node.size_or_zero(),
                })
                .collect();
            (graph.len(), graph.total_size(), removed)
        }
        None => (0, 0, Vec::new()),
    };
    removed.sort_by(|a, b| a.id.cmp(&b.id));

    AnalyzeReport {
        selected_modules,
        selected_size,
        reachable_modules: reach.reachable_module_count(),
        reachable_size: reach.reachable_size(),
        recomputations: reach.recomputation_count(),
        cuts: engine.cuts().iter().map(|cut| cut.key()).collect(),
        removed,
    }
}

fn handle_tree(
    args: TreeArgs,
    stats_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let session = load_session(config_path)?;
    let engine = prepare_engine(&args.selection, stats_path, &session)?;
    let show_unreachable = args.all || session.config.output.show_unreachable;
    let format = args
        .format
        .or_else(|| session.config.output.format.clone())
        .unwrap_or_else(|| "tree".to_string());

    match format.to_ascii_lowercase().as_str() {
        "tree" => {
            print!("{}", viz::render_tree(&engine, show_unreachable));
            Ok(())
        }
        "flat" => {
            print!("{}", viz::render_flat(&engine, show_unreachable));
            Ok(())
        }
        "dot" => {
            print!("{}", viz::render_dot(&engine));
            Ok(())
        }
        "json" => {
            println!("{}", to_json(&graph_to_json(&engine))?);
            Ok(())
        }
        other => Err(BobbleError::Other(anyhow::anyhow!(format!(
            "unknown tree format '{}'",
            other
        )))),
    }
}

#[derive(Debug, Serialize)]
struct GraphJson {
    roots: Vec<String>,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

#[derive(Debug, Serialize)]
struct GraphNode {
    id: String,
    label: String,
    size: Option<u64>,
    multiplicity: u32,
    cut: bool,
}

#[derive(Debug, Serialize)]
struct GraphEdge {
    from: String,
    to: String,
    cut: bool,
}

fn graph_to_json(engine: &ReachabilityEngine) -> GraphJson {
    let Some(graph) = engine.graph() else {
        return GraphJson {
            roots: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        };
    };

    let mut nodes: Vec<GraphNode> = graph
        .nodes()
        .map(|node| GraphNode {
            id: node.id.to_string(),
            label: graph.label(&node.id),
            size: node.size,
            multiplicity: engine.reachability().multiplicity(&node.id),
            cut: engine.cuts().is_node_cut(&node.id),
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut edges = Vec::new();
    for node in graph.nodes() {
        for dep in &node.dependencies {
            edges.push(GraphEdge {
                from: node.id.to_string(),
                to: dep.to_string(),
                cut: engine.cuts().is_edge_cut(&node.id, dep),
            });
        }
    }
    edges.sort_by(|a, b| a.from.cmp(&b.from).then(a.to.cmp(&b.to)));

    GraphJson {
        roots: graph.roots().iter().map(NodeId::to_string).collect(),
        nodes,
        edges,
    }
}

fn load_session(config_path: Option<PathBuf>) -> Result<ResolvedSession> {
    let cwd = env::current_dir()?;
    resolve_session(cwd, config_path).map_err(BobbleError::from)
}

fn load_index(stats_path: Option<PathBuf>, session: &ResolvedSession) -> Result<StatsIndex> {
    let path = stats_path.or_else(|| session.stats_path()).ok_or_else(|| {
        BobbleError::Other(anyhow::anyhow!(
            "no stats file given; pass --stats or set `stats` in .bobble.toml"
        ))
    })?;
    let stats = load_stats(&path)?;
    Ok(StatsIndex::new(&stats))
}

/// Loads the stats, builds the graph for the selection and applies every
/// configured and requested cut.
fn prepare_engine(
    selection: &SelectionArgs,
    stats_path: Option<PathBuf>,
    session: &ResolvedSession,
) -> Result<ReachabilityEngine> {
    let index = load_index(stats_path, session)?;
    let selected = select_modules(&index, selection, session)?;
    let cuts = collect_cuts(selection, session)?;

    let graph = build_from_stats(&index, &selected);
    output::info(&format!(
        "selected {} of {} modules ({} roots, {} edges)",
        graph.len(),
        index.module_count(),
        graph.roots().len(),
        graph.edge_count()
    ));
    for cut in &cuts {
        if !cut_matches(&graph, cut) {
            output::warn(&format!("cut '{}' matches nothing in the selection", cut));
        }
    }

    let mut engine = ReachabilityEngine::new();
    engine.install(graph);
    engine.apply_cuts(cuts);
    Ok(engine)
}

/// Selection flags replace the configured selection as a whole.
fn select_modules(
    index: &StatsIndex,
    selection: &SelectionArgs,
    session: &ResolvedSession,
) -> Result<HashSet<NodeId>> {
    let (groups, pattern) = if selection.groups.is_empty() && selection.group_pattern.is_none() {
        (
            session.config.selection.groups.as_slice(),
            session.config.selection.group_pattern.as_deref(),
        )
    } else {
        (
            selection.groups.as_slice(),
            selection.group_pattern.as_deref(),
        )
    };
    index.select(groups, pattern).map_err(BobbleError::from)
}

/// Configured cuts first, then `--cut` flags.
fn collect_cuts(selection: &SelectionArgs, session: &ResolvedSession) -> Result<Vec<Cut>> {
    let configured = &session.config.cuts;
    let mut cuts = Vec::new();

    for node in &configured.nodes {
        let id = node.trim();
        if id.is_empty() {
            return Err(BobbleError::InvalidCut(
                "empty node in [cuts] nodes".to_string(),
            ));
        }
        cuts.push(Cut::node(id));
    }
    for edge in &configured.edges {
        match parse_cut(edge)? {
            cut @ Cut::Edge { .. } => cuts.push(cut),
            Cut::Node(_) => {
                return Err(BobbleError::InvalidCut(format!(
                    "'{}' in [cuts] edges is not of the form 'parent => child'",
                    edge
                )))
            }
        }
    }
    for raw in &selection.cuts {
        cuts.push(parse_cut(raw)?);
    }
    Ok(cuts)
}

fn parse_cut(raw: &str) -> Result<Cut> {
    raw.parse::<Cut>()
        .map_err(|err| BobbleError::InvalidCut(err.to_string()))
}

fn cut_matches(graph: &DependencyGraph, cut: &Cut) -> bool {
    match cut {
        Cut::Node(id) => graph.contains(id),
        Cut::Edge { parent, child } => graph
            .dependencies_of(parent)
            .is_some_and(|deps| deps.contains(child)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|err| BobbleError::Other(anyhow::Error::new(err)))
}
