use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use tutte::prelude::*;

#[derive(Parser)]
#[command(name = "tutte")]
#[command(about = "Compute the Tutte polynomial of a multigraph given as an edge list")]
struct Cmd {
    /// Edge list: integers separated by anything, read as `from to` pairs
    file: PathBuf,

    /// Edge selection: vertex-order, min-degree, max-degree, min-sum-degree,
    /// max-multiplicity or random[:SEED]
    #[arg(long, default_value_t = Heuristic::VertexOrder)]
    heuristic: Heuristic,

    /// Peel parallel edges one at a time instead of a whole bundle per step
    #[arg(long)]
    no_coalesce: bool,

    /// Fork delete and contract branches onto the rayon pool
    #[arg(long)]
    parallel: bool,

    /// Smallest live vertex count worth caching
    #[arg(long, default_value_t = 5)]
    cache_threshold: usize,

    /// Disable memoization
    #[arg(long)]
    no_cache: bool,

    /// Give up after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    let cmd = Cmd::parse();

    let text = std::fs::read_to_string(&cmd.file)
        .with_context(|| format!("reading {}", cmd.file.display()))?;
    let graph = parse_edge_list(&text).with_context(|| format!("parsing {}", cmd.file.display()))?;
    tracing::info!(
        vertices = graph.num_vertices(),
        edges = graph.num_edges(),
        distinct = graph.num_distinct_edges(),
        "graph loaded"
    );

    let solver = Solver::new(SolverConfig {
        selector: EdgeSelector {
            heuristic: cmd.heuristic,
            coalesce_multiedges: !cmd.no_coalesce,
        },
        parallel: cmd.parallel,
        deadline: cmd.timeout_ms.map(Duration::from_millis),
        ..SolverConfig::default()
    });
    let cache = if cmd.no_cache {
        CacheConfig::disabled()
    } else {
        CacheConfig {
            min_vertices: cmd.cache_threshold,
            ..CacheConfig::default()
        }
    };
    let ctx = SolveContext::new(cache);

    let start = Instant::now();
    let result = solver.solve(graph, &ctx).context("computing the Tutte polynomial")?;
    let elapsed = start.elapsed();

    println!("T(X,Y) = {result}");
    println!("       = {}", result.expand());
    println!();
    println!("time:             {:.3}s", elapsed.as_secs_f64());
    println!("{}", ctx.stats());
    Ok(())
}
