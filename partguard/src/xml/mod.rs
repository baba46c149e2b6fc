//! Document tree plus the parse and serialize collaborators around it.

mod parse;
mod tree;
mod write;

pub use parse::{parse_file, parse_str};
pub use tree::{Document, Element, Node};
pub use write::{to_string, Granularity};
