//! Post store - the ordered set of posts known to a session
//!
//! A [`PostStore`] is a cheap, cloneable handle. One is created per
//! generation run or server session and handed to whoever needs it;
//! every clone sees the same posts. The store is the only writer of
//! its post list and none of its operations can fail.

pub mod pagination;

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::content::Post;

pub use pagination::{FirstPage, PaginationController, PaginationCursor, PaginationError};

/// Shared handle to an ordered list of posts
#[derive(Debug, Clone, Default)]
pub struct PostStore {
    posts: Arc<RwLock<Vec<Post>>>,
}

impl PostStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole post list
    pub fn set_posts(&self, posts: Vec<Post>) {
        warn_duplicates(&posts, &[]);
        *self.write() = posts;
    }

    /// Append posts after everything already held, keeping their order
    pub fn append(&self, posts: Vec<Post>) {
        let mut held = self.write();
        warn_duplicates(&posts, &held);
        held.extend(posts);
    }

    /// Drop every post, ending the session
    pub fn reset(&self) {
        self.write().clear();
    }

    /// The post right before `uid`, if `uid` is held and is not first
    pub fn get_previous_post(&self, uid: &str) -> Option<Post> {
        let posts = self.read();
        let pos = posts.iter().position(|p| p.uid == uid)?;
        if pos > 0 {
            Some(posts[pos - 1].clone())
        } else {
            None
        }
    }

    /// The post right after `uid`, if `uid` is held and is not last
    pub fn get_next_post(&self, uid: &str) -> Option<Post> {
        let posts = self.read();
        let pos = posts.iter().position(|p| p.uid == uid)?;
        posts.get(pos + 1).cloned()
    }

    /// Look up a post by uid
    pub fn get(&self, uid: &str) -> Option<Post> {
        self.read().iter().find(|p| p.uid == uid).cloned()
    }

    /// Number of posts held
    pub fn total_posts(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of the current post list
    pub fn posts(&self) -> Vec<Post> {
        self.read().clone()
    }

    // A panic while holding the lock cannot leave the Vec half-written
    // (every write is a single assignment or extend), so poisoning is
    // ignored.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Post>> {
        self.posts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Post>> {
        self.posts.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Log uids that appear twice; lookups will only ever find the first
fn warn_duplicates(incoming: &[Post], held: &[Post]) {
    let mut seen: HashSet<&str> = held.iter().map(|p| p.uid.as_str()).collect();
    for post in incoming {
        if !seen.insert(post.uid.as_str()) {
            tracing::warn!("Duplicate post uid {:?}, navigation will use the first", post.uid);
        }
    }
}
