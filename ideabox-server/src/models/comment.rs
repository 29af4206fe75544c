//! Comment validation and reply-tree assembly

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use super::validation::trimmed;
use super::ValidationError;

const MAX_COMMENT_LEN: usize = 5_000;

/// Comment body (trimmed, 1..=5000 chars)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBody(String);

impl CommentBody {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        trimmed(s, "comment", MAX_COMMENT_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Anything that can be placed in a reply tree.
pub trait Threaded {
    fn id(&self) -> Uuid;
    fn parent_id(&self) -> Option<Uuid>;
}

/// A comment with its replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode<T> {
    #[serde(flatten)]
    pub comment: T,
    pub replies: Vec<CommentNode<T>>,
}

/// Build a reply tree from a flat, chronologically ordered list.
///
/// Comments whose parent is not in the list are treated as roots, so a
/// reply never disappears because its parent was deleted.
pub fn build_tree<T: Threaded>(comments: Vec<T>) -> Vec<CommentNode<T>> {
    let ids: HashSet<Uuid> = comments.iter().map(|c| c.id()).collect();
    let mut children: HashMap<Uuid, Vec<T>> = HashMap::new();
    let mut roots = Vec::new();

    for comment in comments {
        match comment.parent_id() {
            Some(parent) if ids.contains(&parent) && parent != comment.id() => {
                children.entry(parent).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    roots
        .into_iter()
        .map(|c| attach(c, &mut children))
        .collect()
}

fn attach<T: Threaded>(comment: T, children: &mut HashMap<Uuid, Vec<T>>) -> CommentNode<T> {
    let replies = children
        .remove(&comment.id())
        .unwrap_or_default()
        .into_iter()
        .map(|c| attach(c, children))
        .collect();
    CommentNode { comment, replies }
}
