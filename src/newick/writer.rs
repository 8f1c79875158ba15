//! Extended Newick writing for phylogenetic networks.

use crate::error::NetworkError;
use crate::model::{Edge, Network, NodeId};
use std::collections::HashMap;
use std::io::{self, BufWriter, Write};

/// Estimated characters per edge (label or length), used to size the output
const CHARS_PER_EDGE: usize = 12;

/// Options for [to_extended_newick].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Write branch lengths
    pub lengths: bool,
    /// Write γ on hybrid edges (`:length::γ`)
    pub gammas: bool,
    /// Fixed number of decimals; `None` writes the shortest exact form
    pub precision: Option<usize>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            lengths: true,
            gammas: true,
            precision: None,
        }
    }
}

impl WriterOptions {
    /// Topology only: no lengths, no γ.
    pub fn topology_only() -> Self {
        WriterOptions {
            lengths: false,
            gammas: false,
            precision: None,
        }
    }

    pub fn with_precision(mut self, decimals: usize) -> Self {
        self.precision = Some(decimals);
        self
    }
}

/// Returns the extended Newick representation of `net` with closing
/// semicolon.
///
/// Each hybrid node is named `#H<k>` (numbered by node id) and appears twice:
/// with its subtree below its major parent edge, and as a bare reference
/// below its minor parent edge. Hybrid edges carry `:length::γ`.
///
/// # Example
/// ```
/// use hybridnet::model::{BranchLength, Network};
/// use hybridnet::newick::{WriterOptions, to_extended_newick};
///
/// let mut net = Network::new();
/// let a = net.add_leaf("A");
/// let b = net.add_leaf("B");
/// let root = net.add_internal();
/// net.connect(root, a, Some(BranchLength::new(1.0)))?;
/// net.connect(root, b, Some(BranchLength::new(2.0)))?;
/// net.set_root(root)?;
///
/// assert_eq!(to_extended_newick(&net, &WriterOptions::default())?, "(A:1,B:2);");
/// # Ok::<(), hybridnet::NetworkError>(())
/// ```
///
/// # Errors
/// [NetworkError::InvalidTopology] if the network has no root.
pub fn to_extended_newick(net: &Network, options: &WriterOptions) -> Result<String, NetworkError> {
    let root = net.root_id()?;
    let names: HashMap<NodeId, usize> = net
        .hybrids()
        .enumerate()
        .map(|(k, n)| (n.id(), k + 1))
        .collect();

    let mut newick = String::with_capacity(net.num_edges() * CHARS_PER_EDGE + 2);
    build_newick(net, &mut newick, root, None, &names, options)?;
    newick.push(';');
    Ok(newick)
}

/// Writes the given networks, one extended Newick string per line.
///
/// # Errors
/// Returns an I/O error if writing fails; networks without a root are
/// reported as [io::ErrorKind::InvalidData].
pub fn write_networks<W: Write>(
    writer: W,
    networks: &[Network],
    options: &WriterOptions,
) -> io::Result<()> {
    let mut writer = BufWriter::new(writer);
    for net in networks {
        let newick = to_extended_newick(net, options)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.write_all(newick.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

// Recursive helper; `via` is the edge the node is entered through
fn build_newick(
    net: &Network,
    newick: &mut String,
    node: NodeId,
    via: Option<&Edge>,
    names: &HashMap<NodeId, usize>,
    options: &WriterOptions,
) -> Result<(), NetworkError> {
    let vertex = net.node(node)?;
    let hybrid_name = names.get(&node);
    let expand = via.is_none_or(|e| !e.is_hybrid() || e.is_major());

    if let Some(label) = vertex.label() {
        newick.push_str(&escape_label(label));
    } else if expand {
        newick.push('(');
        for (i, edge) in net.child_edges(node).enumerate() {
            if i > 0 {
                newick.push(',');
            }
            let e = net.edge(edge)?;
            build_newick(net, newick, e.child(), Some(e), names, options)?;
        }
        newick.push(')');
    }
    if let Some(k) = hybrid_name {
        newick.push_str(&format!("#H{k}"));
    }
    if let Some(edge) = via {
        build_branch_annotation(newick, edge, options);
    }
    Ok(())
}

// Helper for adding `:length` or `:length::gamma`
fn build_branch_annotation(newick: &mut String, edge: &Edge, options: &WriterOptions) {
    let format = |value: f64| match options.precision {
        Some(p) => format!("{value:.p$}"),
        None => value.to_string(),
    };
    let length = edge
        .length()
        .filter(|_| options.lengths)
        .map(|l| format(l.value()));

    if edge.is_hybrid() && options.gammas {
        newick.push(':');
        if let Some(length) = length {
            newick.push_str(&length);
        }
        newick.push_str("::");
        newick.push_str(&format(edge.gamma()));
    } else if let Some(length) = length {
        newick.push(':');
        newick.push_str(&length);
    }
}

/// Quotes a label if it contains Newick delimiters, doubling inner quotes.
pub fn escape_label(label: &str) -> String {
    if label.chars().any(|c| {
        matches!(c, ' ' | ',' | ';' | '\t' | '\n' | '\r' | '(' | ')' | ':' | '[' | ']' | '\'' | '#')
    }) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}
