use hybridnet::model::Network;
use hybridnet::newick::{WriterOptions, to_extended_newick};
use hybridnet::quartets::QuartetTable;
use hybridnet::search::SearchConfig;
use hybridnet::{NetworkError, search};
use std::error::Error;
use std::fs;
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};

// Usage: hybridnet <quartets.json> [search_config.json]
fn main() -> Result<(), Box<dyn Error>> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(format!("warn,hybridnet={log_level}"))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let mut args = std::env::args().skip(1);
    let table_path = args.next().ok_or("missing path to quartet table (JSON)")?;
    let table = QuartetTable::from_json_str(&fs::read_to_string(&table_path)?)?;
    let config = match args.next() {
        Some(path) => SearchConfig::from_json_str(&fs::read_to_string(path)?)?,
        None => SearchConfig::default(),
    };

    let start = caterpillar(&table.taxa().into_iter().collect::<Vec<_>>())?;
    info!(taxa = start.num_leaves(), quartets = table.len(), "loaded {table_path}");

    let outcome = search(&start, &table, config)?;
    println!("{}", to_extended_newick(&outcome.best, &WriterOptions::default())?);
    println!(
        "log pseudo-likelihood: {:.6} ({} iterations, {:?})",
        outcome.best_score, outcome.iterations, outcome.termination
    );
    Ok(())
}

// Start tree (((t1,t2),t3),...) over the given taxa
fn caterpillar(taxa: &[&str]) -> Result<Network, NetworkError> {
    if taxa.len() < 4 {
        return Err(NetworkError::malformed("at least four taxa are required"));
    }
    let mut net = Network::with_capacity(taxa.len());
    let root = net.add_internal();
    net.set_root(root)?;

    let mut current = root;
    for taxon in &taxa[..taxa.len() - 2] {
        let leaf = net.add_leaf(*taxon);
        net.connect(current, leaf, None)?;
        let next = net.add_internal();
        net.connect(current, next, None)?;
        current = next;
    }
    for taxon in &taxa[taxa.len() - 2..] {
        let leaf = net.add_leaf(*taxon);
        net.connect(current, leaf, None)?;
    }
    net.finalize()?;
    Ok(net)
}
