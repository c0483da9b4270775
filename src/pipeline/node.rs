// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Tree nodes
//!
//! A node is either a [`Job`] leaf or a [`Sequence`] composite. Nodes are
//! shared handles: the owning sequence holds a strong reference to each
//! child, while a child only keeps a weak link back to its parent.

use std::cell::RefCell;
use std::rc::Weak;

use super::document::JobDocument;
use super::identifier::{NodePath, OverrideChain};
use super::job::Job;
use super::sequence::{Sequence, SequenceInner};

/// Weak back-reference from a child to the sequence that owns it
pub(crate) type ParentLink = Option<Weak<RefCell<SequenceInner>>>;

/// A parent only counts while it is still alive.
pub(crate) fn live_parent(link: &ParentLink) -> Option<Sequence> {
    link.as_ref()
        .and_then(Weak::upgrade)
        .map(Sequence::from_inner)
}

/// A job or a sequence, as accepted by `add_children`
#[derive(Debug, Clone)]
pub enum Node {
    Job(Job),
    Sequence(Sequence),
}

impl Node {
    /// Whether the node currently has a parent sequence
    pub fn is_attached(&self) -> bool {
        self.parent().is_some()
    }

    /// The sequence this node was added to, if any
    pub fn parent(&self) -> Option<Sequence> {
        match self {
            Self::Job(job) => job.parent(),
            Self::Sequence(sequence) => sequence.parent(),
        }
    }

    /// Short human readable description used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            Self::Job(job) => job.describe(),
            Self::Sequence(sequence) => sequence.describe(),
        }
    }

    /// Detached deep copy of this node and its subtree
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Job(job) => Self::Job(job.duplicate()),
            Self::Sequence(sequence) => Self::Sequence(sequence.duplicate()),
        }
    }

    /// Whether both handles point at the same node instance
    pub fn same_as(&self, other: &Node) -> bool {
        match (self, other) {
            (Self::Job(a), Self::Job(b)) => a.same_as(b),
            (Self::Sequence(a), Self::Sequence(b)) => a.same_as(b),
            _ => false,
        }
    }

    pub(crate) fn set_parent(&self, parent: Weak<RefCell<SequenceInner>>) {
        match self {
            Self::Job(job) => job.set_parent(parent),
            Self::Sequence(sequence) => sequence.set_parent(parent),
        }
    }

    pub(crate) fn render_into(
        &self,
        chain: &OverrideChain,
        path: &NodePath,
        out: &mut Vec<JobDocument>,
    ) {
        match self {
            Self::Job(job) => out.push(job.render_at(chain, path)),
            Self::Sequence(sequence) => sequence.render_into(chain, path, out),
        }
    }

    pub(crate) fn collect_jobs(&self, out: &mut Vec<Job>) {
        match self {
            Self::Job(job) => out.push(job.clone()),
            Self::Sequence(sequence) => sequence.collect_jobs(out),
        }
    }
}

impl From<Job> for Node {
    fn from(job: Job) -> Self {
        Self::Job(job)
    }
}

impl From<&Job> for Node {
    fn from(job: &Job) -> Self {
        Self::Job(job.clone())
    }
}

impl From<Sequence> for Node {
    fn from(sequence: Sequence) -> Self {
        Self::Sequence(sequence)
    }
}

impl From<&Sequence> for Node {
    fn from(sequence: &Sequence) -> Self {
        Self::Sequence(sequence.clone())
    }
}

impl From<&Node> for Node {
    fn from(node: &Node) -> Self {
        node.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_compare_by_identity() {
        let job = Job::new("build", ["make"]);
        let a = Node::from(&job);
        let b = Node::from(job.clone());
        assert!(a.same_as(&b));

        let copy = a.duplicate();
        assert!(!a.same_as(&copy));
        assert!(!a.same_as(&Node::from(Sequence::new())));
    }

    #[test]
    fn test_describe() {
        assert_eq!(Node::from(Job::new("build", ["make"])).describe(), "job 'build'");
        assert_eq!(Node::from(Sequence::new()).describe(), "sequence with 0 children");
    }
}
