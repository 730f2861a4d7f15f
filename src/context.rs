//! Per-request bag of resolved forum handles.
//!
//! A `RequestContext` is never mutated. Each `with_*` call returns a new
//! value differing in one slot; the other slots are shared through `Arc`,
//! so nested scopes (community, board, thread, post) build on their parent
//! without copying it and without affecting any sibling request.

use std::sync::Arc;

use crate::models::{Board, Category, Community, Post, Thread, User};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    current_user: Option<Arc<User>>,
    community: Option<Arc<Community>>,
    category: Option<Arc<Category>>,
    board: Option<Arc<Board>>,
    thread: Option<Arc<Thread>>,
    post: Option<Arc<Post>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_deref()
    }

    pub fn community(&self) -> Option<&Community> {
        self.community.as_deref()
    }

    pub fn category(&self) -> Option<&Category> {
        self.category.as_deref()
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_deref()
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.thread.as_deref()
    }

    pub fn post(&self) -> Option<&Post> {
        self.post.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn with_current_user(&self, user: impl Into<Arc<User>>) -> Self {
        Self {
            current_user: Some(user.into()),
            ..self.clone()
        }
    }

    pub fn with_community(&self, community: impl Into<Arc<Community>>) -> Self {
        Self {
            community: Some(community.into()),
            ..self.clone()
        }
    }

    pub fn with_category(&self, category: impl Into<Arc<Category>>) -> Self {
        Self {
            category: Some(category.into()),
            ..self.clone()
        }
    }

    pub fn with_board(&self, board: impl Into<Arc<Board>>) -> Self {
        Self {
            board: Some(board.into()),
            ..self.clone()
        }
    }

    pub fn with_thread(&self, thread: impl Into<Arc<Thread>>) -> Self {
        Self {
            thread: Some(thread.into()),
            ..self.clone()
        }
    }

    pub fn with_post(&self, post: impl Into<Arc<Post>>) -> Self {
        Self {
            post: Some(post.into()),
            ..self.clone()
        }
    }

    /// Same context with the signed-in user removed, e.g. after logout
    pub fn without_current_user(&self) -> Self {
        Self {
            current_user: None,
            ..self.clone()
        }
    }
}
