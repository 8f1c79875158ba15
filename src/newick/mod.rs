//! Extended Newick writer for phylogenetic networks.
//!
//! Networks are written in the extended Newick format, in which every hybrid
//! node gets a name `#H<k>` and is listed once per parent:
//! * below its major parent with its subtree: `(C:1)#H1:0.5::0.7`
//! * below its minor parent as a bare reference: `#H1:0.1::0.3`
//!
//! The grammar:
//! * `network ::= vertex ';'`
//! * `vertex ::= leaf | internal_vertex | hybrid_reference`
//! * `internal_vertex ::= '(' vertex {',' vertex} ')' [hybrid_name] [annotation]`
//! * `annotation ::= ':' number` (tree edge) `| ':' [number] '::' gamma` (hybrid edge)
//!
//! Labels containing delimiters are single-quoted, see [writer::escape_label].

/// Writer functions and options
pub mod writer;

pub use writer::{WriterOptions, to_extended_newick, write_networks};
