//! Mechanisms shared by the descriptor and graphic walkers.

mod stack;
mod state;

pub use stack::ContextStack;
pub use state::OneShot;

use crate::xml::Node;

/// Non-whitespace text directly following the element child at `index`.
pub fn tail_text(children: &[Node], index: usize) -> Option<&str> {
    match children.get(index + 1) {
        Some(Node::Text(text)) if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}
