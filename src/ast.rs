use std::fmt;

use crate::charclass::CharRange;

/// Repetition bound of a node. `max == usize::MAX` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub min: usize,
    pub max: usize,
}

impl Quantifier {
    pub const ONE: Quantifier = Quantifier { min: 1, max: 1 };
    pub const ZERO_OR_ONE: Quantifier = Quantifier { min: 0, max: 1 };
    pub const ZERO_OR_MORE: Quantifier = Quantifier { min: 0, max: usize::MAX };
    pub const ONE_OR_MORE: Quantifier = Quantifier { min: 1, max: usize::MAX };

    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

impl Default for Quantifier {
    fn default() -> Self {
        Self::ONE
    }
}

/// A sequence of nodes linked through `next`; `None` is the empty sequence.
pub type Chain = Option<Box<Node>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Literal(u8),
    CharClass {
        negate: bool,
        ranges: Vec<CharRange>,
    },
    /// Branches are tried left to right.
    Alternation(Vec<Chain>),
    /// Capturing group; `index` is its position among opening parens, 0 being
    /// the implicit group around the whole pattern.
    Group {
        index: usize,
        body: Chain,
    },
}

#[derive(PartialEq, Eq)]
pub struct Node {
    pub payload: Payload,
    pub quantifier: Quantifier,
    pub next: Chain,
}

impl Node {
    pub fn new(payload: Payload, quantifier: Quantifier) -> Self {
        Self {
            payload,
            quantifier,
            next: None,
        }
    }

    /// Iterates over this node and the ones chained after it.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        std::iter::successors(Some(self), |node| node.next.as_deref())
    }
}

// Chains can be as long as the pattern, so none of these recurse along `next`.

impl Drop for Node {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        let mut head = Node::new(self.payload.clone(), self.quantifier);
        head.next = link(
            self.next
                .as_deref()
                .into_iter()
                .flat_map(|node| node.iter())
                .map(|node| Node::new(node.payload.clone(), node.quantifier))
                .collect(),
        );
        head
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|node| (&node.payload, node.quantifier)))
            .finish()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Literal(c) => write!(f, "{:?}", char::from(*c)),
            Payload::CharClass { negate: false, ranges } => write!(f, "class of {} ranges", ranges.len()),
            Payload::CharClass { negate: true, ranges } => write!(f, "negated class of {} ranges", ranges.len()),
            Payload::Alternation(branches) => write!(f, "alternation of {}", branches.len()),
            Payload::Group { index, .. } => write!(f, "group {index}"),
        }
    }
}

/// Links `nodes` into a chain, in order.
pub fn link(nodes: Vec<Node>) -> Chain {
    nodes.into_iter().rev().fold(None, |next, mut node| {
        node.next = next;
        Some(Box::new(node))
    })
}
