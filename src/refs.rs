//! Reference resolution: turn a branch or tag name into a commit id.
//!
//! Names are looked up with the strategies in [`RESOLUTION_ORDER`], branches
//! first. A strategy that answers "not found" hands over to the next one; any
//! other failure (authentication, network, rate limiting) stops the search
//! and is returned as-is, so [`Error::RefNotFound`] only ever means that every
//! strategy came back empty.

use crate::error::{Error, Result};
use crate::gateway::{BranchGateway, Lookup};
use log::debug;
use std::fmt;

/// What kind of ref a name resolved as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Branch => write!(f, "branch"),
            RefKind::Tag => write!(f, "tag"),
        }
    }
}

/// Strategies tried by [`resolve`], in order.
pub const RESOLUTION_ORDER: [RefKind; 2] = [RefKind::Branch, RefKind::Tag];

/// A ref name pinned to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    pub name: String,
    pub kind: RefKind,
    pub commit: String,
}

fn lookup(gateway: &dyn BranchGateway, kind: RefKind, name: &str) -> Result<Lookup<String>> {
    match kind {
        RefKind::Branch => gateway.find_branch(name),
        RefKind::Tag => gateway.find_tag(name),
    }
}

/// Resolve `name` to a commit id, preferring branches over tags.
pub fn resolve(gateway: &dyn BranchGateway, name: &str) -> Result<ResolvedRef> {
    for kind in RESOLUTION_ORDER {
        match lookup(gateway, kind, name)? {
            Lookup::Found(commit) => {
                debug!("Resolved {} '{}' to {}", kind, name, commit);
                return Ok(ResolvedRef {
                    name: name.to_string(),
                    kind,
                    commit,
                });
            }
            Lookup::NotFound => debug!("No {} named '{}'", kind, name),
        }
    }
    Err(Error::RefNotFound {
        reference: name.to_string(),
    })
}
