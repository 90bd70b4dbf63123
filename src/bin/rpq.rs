//! Minimal CLI for regular path queries
//!
//! Loads a CSV edge list, compiles the pattern, runs the selected solver,
//! and prints the result set as JSON on stdout. Progress and diagnostics
//! go to stderr; `RUST_LOG` controls tracing verbosity.
//!
//! ```text
//! rpq --graph edges.csv --pattern "a b*" [--solver tensor|bfs]
//!     [--mode all|per-source] [--starts 0,1] [--finals 2,3]
//!     [--dot graph.dot] [--info]
//! ```

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::env;
use std::fs::File;

use pathlang::{
    load_graph_csv, rpq_bfs, rpq_tensor, save_graph_dot, BfsResult, Node, RpqMode,
};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn parse_nodes(text: &str) -> anyhow::Result<BTreeSet<Node>> {
    text.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<Node>()
                .map_err(|_| anyhow::anyhow!("node id {s:?} is not an unsigned integer"))
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let graph_path = parse_flag(&args, "--graph")
        .ok_or_else(|| anyhow::anyhow!("--graph <edges.csv> is required"))?;
    let pattern = parse_flag(&args, "--pattern")
        .ok_or_else(|| anyhow::anyhow!("--pattern <regex> is required"))?;

    eprintln!("Loading graph from {graph_path}...");
    let graph = load_graph_csv(&graph_path)?;
    let info = graph.info();
    eprintln!("✓ {} nodes, {} edges, {} labels", info.nodes, info.edges, info.labels.len());

    if has_flag(&args, "--info") {
        println!("{}", serde_json::to_string(&info)?);
        return Ok(());
    }
    if let Some(dot_path) = parse_flag(&args, "--dot") {
        let mut out = File::create(&dot_path)?;
        save_graph_dot(&graph, &mut out)?;
        eprintln!("✓ DOT written to {dot_path}");
        return Ok(());
    }

    let starts = parse_flag(&args, "--starts").map(|s| parse_nodes(&s)).transpose()?;
    let finals = parse_flag(&args, "--finals").map(|s| parse_nodes(&s)).transpose()?;
    let solver = parse_flag(&args, "--solver").unwrap_or_else(|| "tensor".to_owned());

    match solver.as_str() {
        "tensor" => {
            let pairs = rpq_tensor(&graph, &pattern, starts.as_ref(), finals.as_ref())
                .map_err(|e| anyhow::anyhow!("bad pattern: {e}"))?;
            eprintln!("✓ {} pairs", pairs.len());
            println!("{}", serde_json::to_string(&pairs)?);
        }
        "bfs" => {
            let mode = match parse_flag(&args, "--mode").as_deref() {
                None | Some("per-source") => RpqMode::FindReachableForEachStartNode,
                Some("all") => RpqMode::FindAllReachable,
                Some(other) => {
                    return Err(anyhow::anyhow!("unknown mode {other:?} (all | per-source)"))
                }
            };
            let result = rpq_bfs(&graph, &pattern, mode, starts.as_ref(), finals.as_ref())
                .map_err(|e| anyhow::anyhow!("bad pattern: {e}"))?;
            match result {
                BfsResult::Reachable(nodes) => {
                    eprintln!("✓ {} reachable nodes", nodes.len());
                    println!("{}", serde_json::to_string(&nodes)?);
                }
                BfsResult::Pairs(pairs) => {
                    eprintln!("✓ {} pairs", pairs.len());
                    println!("{}", serde_json::to_string(&pairs)?);
                }
            }
        }
        other => return Err(anyhow::anyhow!("unknown solver {other:?} (tensor | bfs)")),
    }
    Ok(())
}
