//! Comment tree for one idea with replies fetched on demand.

use std::future::Future;

use tracing::debug;

use crate::models::Comment;
use crate::transport::ApiError;

/// Where a thread gets its comments from.
pub trait CommentSource {
    fn top_level(&self, idea_id: &str)
        -> impl Future<Output = Result<Vec<Comment>, ApiError>> + Send;

    fn replies(&self, parent_id: &str)
        -> impl Future<Output = Result<Vec<Comment>, ApiError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replies {
    NotLoaded,
    Loaded(Vec<ThreadNode>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    pub comment: Comment,
    pub replies: Replies,
}

impl ThreadNode {
    fn new(comment: Comment) -> Self {
        // Nothing to fetch for a childless comment.
        let replies = if comment.has_replies() {
            Replies::NotLoaded
        } else {
            Replies::Loaded(Vec::new())
        };
        Self { comment, replies }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self.replies, Replies::Loaded(_))
    }

    pub fn loaded_replies(&self) -> &[ThreadNode] {
        match &self.replies {
            Replies::Loaded(nodes) => nodes,
            Replies::NotLoaded => &[],
        }
    }

    fn count(&self) -> usize {
        1 + self.loaded_replies().iter().map(ThreadNode::count).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentThread {
    idea_id: String,
    roots: Vec<ThreadNode>,
}

impl CommentThread {
    pub async fn load<S: CommentSource>(source: &S, idea_id: &str) -> Result<Self, ApiError> {
        let comments = source.top_level(idea_id).await?;
        debug!(idea_id, count = comments.len(), "comment thread loaded");
        Ok(Self {
            idea_id: idea_id.to_string(),
            roots: comments.into_iter().map(ThreadNode::new).collect(),
        })
    }

    pub fn idea_id(&self) -> &str {
        &self.idea_id
    }

    pub fn roots(&self) -> &[ThreadNode] {
        &self.roots
    }

    /// Number of comments loaded so far.
    pub fn len(&self) -> usize {
        self.roots.iter().map(ThreadNode::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, comment_id: &str) -> Option<&ThreadNode> {
        find_in(&self.roots, comment_id)
    }

    /// Fetch the replies of `comment_id` unless they are already loaded.
    ///
    /// Returns `false` when the comment is not part of the loaded tree.
    pub async fn expand<S: CommentSource>(
        &mut self,
        source: &S,
        comment_id: &str,
    ) -> Result<bool, ApiError> {
        let Some(node) = find_in_mut(&mut self.roots, comment_id) else {
            return Ok(false);
        };
        if node.is_expanded() {
            return Ok(true);
        }
        let replies = source.replies(comment_id).await?;
        debug!(comment_id, count = replies.len(), "replies loaded");
        node.replies = Replies::Loaded(replies.into_iter().map(ThreadNode::new).collect());
        Ok(true)
    }

    /// Expand level by level down to `max_depth` reply levels.
    /// Returns how many reply lists were fetched.
    pub async fn expand_all<S: CommentSource>(
        &mut self,
        source: &S,
        max_depth: usize,
    ) -> Result<usize, ApiError> {
        let mut fetched = 0;
        for depth in 0..max_depth {
            let mut pending = Vec::new();
            collect_pending(&self.roots, 0, depth, &mut pending);
            for id in pending {
                if self.expand(source, &id).await? {
                    fetched += 1;
                }
            }
        }
        Ok(fetched)
    }

    /// Indented plain-text view of the loaded tree.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in &self.roots {
            render_node(node, 0, &mut out);
        }
        out
    }
}

fn find_in<'a>(nodes: &'a [ThreadNode], id: &str) -> Option<&'a ThreadNode> {
    nodes.iter().find_map(|node| {
        if node.comment.id == id {
            Some(node)
        } else {
            find_in(node.loaded_replies(), id)
        }
    })
}

fn find_in_mut<'a>(nodes: &'a mut [ThreadNode], id: &str) -> Option<&'a mut ThreadNode> {
    for node in nodes.iter_mut() {
        if node.comment.id == id {
            return Some(node);
        }
        if let Replies::Loaded(children) = &mut node.replies {
            if let Some(found) = find_in_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn collect_pending(nodes: &[ThreadNode], depth: usize, target: usize, out: &mut Vec<String>) {
    for node in nodes {
        if depth == target {
            if !node.is_expanded() {
                out.push(node.comment.id.clone());
            }
        } else {
            collect_pending(node.loaded_replies(), depth + 1, target, out);
        }
    }
}

fn render_node(node: &ThreadNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!(
        "- {}: {}",
        node.comment.author_name(),
        node.comment.body.trim()
    ));
    if !node.is_expanded() {
        out.push_str(&format!(" [+{} replies]", node.comment.child_count));
    }
    out.push('\n');
    for child in node.loaded_replies() {
        render_node(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        top: Vec<Comment>,
        replies: HashMap<String, Vec<Comment>>,
        reply_calls: AtomicUsize,
    }

    impl CommentSource for FakeSource {
        fn top_level(
            &self,
            _idea_id: &str,
        ) -> impl Future<Output = Result<Vec<Comment>, ApiError>> + Send {
            let top = self.top.clone();
            async move { Ok(top) }
        }

        fn replies(
            &self,
            parent_id: &str,
        ) -> impl Future<Output = Result<Vec<Comment>, ApiError>> + Send {
            self.reply_calls.fetch_add(1, Ordering::SeqCst);
            let found = self.replies.get(parent_id).cloned().unwrap_or_default();
            async move { Ok(found) }
        }
    }

    fn comment(id: &str, parent: Option<&str>, body: &str, children: u64) -> Comment {
        Comment {
            id: id.into(),
            idea_id: "idea".into(),
            parent_id: parent.map(str::to_string),
            body: body.into(),
            author: None,
            child_count: children,
            created_at: None,
        }
    }

    fn source() -> FakeSource {
        let mut replies = HashMap::new();
        replies.insert(
            "c1".to_string(),
            vec![comment("c1a", Some("c1"), "reply", 1)],
        );
        replies.insert(
            "c1a".to_string(),
            vec![comment("c1a1", Some("c1a"), "deep", 0)],
        );
        FakeSource {
            top: vec![comment("c1", None, "first", 1), comment("c2", None, "second", 0)],
            replies,
            reply_calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn replies_start_unloaded() {
        let src = source();
        let thread = CommentThread::load(&src, "idea").await.unwrap();
        assert_eq!(thread.len(), 2);
        assert!(!thread.find("c1").unwrap().is_expanded());
        // childless comments never need a fetch
        assert!(thread.find("c2").unwrap().is_expanded());
    }

    #[tokio::test]
    async fn expand_is_idempotent() {
        let src = source();
        let mut thread = CommentThread::load(&src, "idea").await.unwrap();

        assert!(thread.expand(&src, "c1").await.unwrap());
        assert!(thread.expand(&src, "c1").await.unwrap());
        assert_eq!(src.reply_calls.load(Ordering::SeqCst), 1);
        assert_eq!(thread.len(), 3);
        assert!(thread.find("c1a").is_some());
    }

    #[tokio::test]
    async fn expand_unknown_comment_is_false() {
        let src = source();
        let mut thread = CommentThread::load(&src, "idea").await.unwrap();
        assert!(!thread.expand(&src, "missing").await.unwrap());
        assert_eq!(src.reply_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expand_all_respects_depth() {
        let src = source();
        let mut thread = CommentThread::load(&src, "idea").await.unwrap();
        assert_eq!(thread.expand_all(&src, 1).await.unwrap(), 1);
        assert!(thread.find("c1a1").is_none());

        assert_eq!(thread.expand_all(&src, 5).await.unwrap(), 1);
        assert!(thread.find("c1a1").is_some());
        assert_eq!(thread.len(), 4);
    }

    #[tokio::test]
    async fn render_indents_replies() {
        let src = source();
        let mut thread = CommentThread::load(&src, "idea").await.unwrap();
        thread.expand(&src, "c1").await.unwrap();
        let text = thread.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "- Anonymous User: first",
                "  - Anonymous User: reply [+1 replies]",
                "- Anonymous User: second",
            ]
        );
    }
}
