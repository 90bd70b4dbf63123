//! Minimal CLI for context-free path queries
//!
//! Loads a CSV edge list and a grammar file, runs the selected CFPQ
//! solver, and prints the result pair set as JSON on stdout. Progress and
//! diagnostics go to stderr; `RUST_LOG` controls tracing verbosity.
//!
//! ```text
//! cfpq --graph edges.csv --grammar g.cfg
//!      [--algorithm hellings|matrix|tensor] [--start-symbol S]
//!      [--starts 0,1] [--finals 2,3]
//! ```

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::env;

use pathlang::{cfpq, load_graph_csv, Cfg, CfpqAlgorithm, Node};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
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
    let grammar_path = parse_flag(&args, "--grammar")
        .ok_or_else(|| anyhow::anyhow!("--grammar <file> is required"))?;

    let algorithm = match parse_flag(&args, "--algorithm").as_deref() {
        None | Some("hellings") => CfpqAlgorithm::Hellings,
        Some("matrix") => CfpqAlgorithm::Matrix,
        Some("tensor") => CfpqAlgorithm::Tensor,
        Some(other) => {
            return Err(anyhow::anyhow!(
                "unknown algorithm {other:?} (hellings | matrix | tensor)"
            ))
        }
    };
    let start_symbol = parse_flag(&args, "--start-symbol").unwrap_or_else(|| "S".to_owned());
    let starts = parse_flag(&args, "--starts").map(|s| parse_nodes(&s)).transpose()?;
    let finals = parse_flag(&args, "--finals").map(|s| parse_nodes(&s)).transpose()?;

    eprintln!("Loading graph from {graph_path}...");
    let graph = load_graph_csv(&graph_path)?;
    let info = graph.info();
    eprintln!("✓ {} nodes, {} edges, {} labels", info.nodes, info.edges, info.labels.len());

    eprintln!("Loading grammar from {grammar_path}...");
    let cfg = Cfg::from_file(&grammar_path).map_err(|e| anyhow::anyhow!("bad grammar: {e}"))?;
    eprintln!("✓ {} productions, {} variables", cfg.productions().len(), cfg.variables().len());

    let pairs = cfpq(algorithm, &graph, &cfg, starts.as_ref(), finals.as_ref(), &start_symbol)
        .map_err(|e| anyhow::anyhow!("query failed: {e}"))?;
    eprintln!("✓ {} pairs via {algorithm:?}", pairs.len());
    println!("{}", serde_json::to_string(&pairs)?);
    Ok(())
}
