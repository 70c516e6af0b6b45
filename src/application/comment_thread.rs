use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AppError, AppResult, CommentService};
use crate::domain::*;
use crate::ports::Confirmer;

const LOGIN_TO_COMMENT: &str = "Please log in to comment";
const LOGIN_TO_LIKE: &str = "Please log in to like comments";
const DELETE_PROMPT: &str = "Are you sure you want to delete this comment?";

/// Text being composed, plus what it will be posted as.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composer {
    pub text: String,
    pub reply_to: Option<CommentId>,
    /// Set while the composer was pre-filled from an existing comment.
    pub editing: Option<CommentId>,
}

/// Lifecycle of one optimistic like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTransition {
    /// Applied locally, server has not answered yet.
    Pending { was_liked: bool, previous_count: u32 },
    Committed,
    RolledBack,
}

/// The comment thread of one article as seen by one viewer.
///
/// All methods take `&self` so the thread can be shared behind an `Arc`.
/// Requests are not serialized against each other: whichever refresh lands
/// last owns the tree.
pub struct CommentThread {
    service: Arc<CommentService>,
    article: Option<ArticleId>,
    viewer: Option<Viewer>,

    comments: RwLock<CommentTree>,
    composer: RwLock<Composer>,
    error: RwLock<Option<String>>,

    /// Requests in flight. Overlapping refreshes each hold a count.
    loading: AtomicUsize,
    submitting: AtomicUsize,
    liking: DashMap<CommentId, bool>,
    deleting: DashMap<CommentId, bool>,

    expanded: DashMap<CommentId, bool>,
    like_transitions: DashMap<CommentId, LikeTransition>,
}

impl CommentThread {
    pub fn new(
        service: Arc<CommentService>,
        article: Option<ArticleId>,
        viewer: Option<Viewer>,
    ) -> Self {
        Self {
            service,
            article,
            viewer,
            comments: RwLock::new(CommentTree::default()),
            composer: RwLock::new(Composer::default()),
            error: RwLock::new(None),
            loading: AtomicUsize::new(0),
            submitting: AtomicUsize::new(0),
            liking: DashMap::new(),
            deleting: DashMap::new(),
            expanded: DashMap::new(),
            like_transitions: DashMap::new(),
        }
    }

    pub fn article(&self) -> Option<ArticleId> {
        self.article
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    /// Refetch the flat list and rebuild the tree from scratch. On failure the
    /// previous tree stays in place.
    pub async fn refresh(&self) -> AppResult<()> {
        let Some(article) = self.article else {
            *self.comments.write().await = CommentTree::default();
            return Ok(());
        };

        self.loading.fetch_add(1, Ordering::SeqCst);
        let result = self
            .service
            .list_comments(article, self.viewer.as_ref())
            .await;
        self.loading.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(comments) => {
                let tree = CommentTree::build(comments);
                tracing::debug!("Article {} has {} threads", article, tree.root_count());
                *self.comments.write().await = tree;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to load comments for article {}: {}", article, e);
                self.report(e.user_message("Failed to load comments")).await;
                Err(e)
            }
        }
    }

    pub async fn set_text(&self, text: impl Into<String>) {
        self.composer.write().await.text = text.into();
    }

    pub async fn start_reply(&self, parent: CommentId) {
        let mut composer = self.composer.write().await;
        composer.reply_to = Some(parent);
    }

    pub async fn cancel_reply(&self) {
        self.composer.write().await.reply_to = None;
    }

    /// Pre-fill the composer with an existing comment. Submitting afterwards
    /// goes through the normal create path.
    pub async fn start_edit(&self, id: CommentId) -> AppResult<()> {
        let content = {
            let tree = self.comments.read().await;
            let comment = tree.get(id).ok_or_else(|| not_loaded(id))?;
            if !self.viewer.is_some_and(|v| v.can_modify(comment)) {
                None
            } else {
                Some(comment.content.clone())
            }
        };

        let Some(content) = content else {
            let err = AppError::PermissionDenied("You can only edit your own comments".to_string());
            return Err(self.reject(err).await);
        };

        let mut composer = self.composer.write().await;
        composer.text = content;
        composer.editing = Some(id);
        Ok(())
    }

    pub async fn clear_composer(&self) {
        *self.composer.write().await = Composer::default();
    }

    /// Post the composer's text as a new comment, or as a reply when a reply
    /// target is set. Blank text never reaches the network.
    pub async fn submit(&self) -> AppResult<Comment> {
        self.dismiss_error().await;

        let Some(article) = self.article else {
            let err = AppError::Validation(DomainError::MissingField("article".to_string()));
            return Err(self.reject(err).await);
        };
        let (text, parent) = {
            let composer = self.composer.read().await;
            (composer.text.clone(), composer.reply_to)
        };

        self.submitting.fetch_add(1, Ordering::SeqCst);
        let result = self.service.create_comment(article, &text, parent).await;
        self.submitting.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(comment) => {
                self.clear_composer().await;
                if let Err(e) = self.refresh().await {
                    tracing::warn!("Comment {} posted but refresh failed: {}", comment.id, e);
                }
                Ok(comment)
            }
            Err(e) => {
                let message = match &e {
                    AppError::Validation(v) => v.to_string(),
                    e if e.is_unauthorized() => LOGIN_TO_COMMENT.to_string(),
                    _ => "Failed to post comment".to_string(),
                };
                tracing::warn!("Failed to post comment on article {}: {}", article, e);
                self.report(message).await;
                Err(e)
            }
        }
    }

    /// Flip the like on a top-level comment right away, then tell the server.
    /// A rejected toggle is reconciled by refetching, not by undoing locally.
    pub async fn toggle_like(&self, id: CommentId) -> AppResult<()> {
        self.dismiss_error().await;

        if self.viewer.is_none() {
            self.report(LOGIN_TO_LIKE.to_string()).await;
            return Err(AppError::AuthenticationRequired);
        }

        let pending = {
            let mut tree = self.comments.write().await;
            if tree.get(id).is_none() {
                None
            } else if !tree.is_root(id) {
                Some(Err(AppError::PermissionDenied(
                    "Only top-level comments can be liked".to_string(),
                )))
            } else {
                tree.get_mut(id).map(|comment| {
                    let pending = LikeTransition::Pending {
                        was_liked: comment.is_liked.unwrap_or(false),
                        previous_count: comment.likes_count,
                    };
                    comment.apply_like_toggle();
                    Ok(pending)
                })
            }
        };
        let pending = match pending {
            Some(Ok(pending)) => pending,
            Some(Err(e)) => return Err(self.reject(e).await),
            None => return Err(self.reject(not_loaded(id)).await),
        };

        self.like_transitions.insert(id, pending);
        self.liking.insert(id, true);
        let result = self.service.toggle_like(id).await;
        self.liking.remove(&id);

        match result {
            Ok(()) => {
                self.like_transitions.insert(id, LikeTransition::Committed);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Like on comment {} rejected: {}", id, e);
                let message = if e.is_unauthorized() {
                    LOGIN_TO_LIKE.to_string()
                } else {
                    e.user_message("Failed to update like")
                };
                self.report(message.clone()).await;

                if self.refresh().await.is_err() {
                    // Server state is unreachable; fall back to the snapshot.
                    self.restore(id, pending).await;
                    self.report(message).await;
                }
                self.like_transitions.insert(id, LikeTransition::RolledBack);
                Err(e)
            }
        }
    }

    /// Delete after the viewer confirms. Returns `Ok(false)` when they back
    /// out. Nothing is removed locally until the refetch shows it gone.
    pub async fn delete_comment(&self, id: CommentId, confirmer: &dyn Confirmer) -> AppResult<bool> {
        self.dismiss_error().await;

        let permitted = {
            let tree = self.comments.read().await;
            tree.get(id)
                .map(|comment| self.viewer.is_some_and(|v| v.can_modify(comment)))
        };
        match permitted {
            None => return Err(self.reject(not_loaded(id)).await),
            Some(false) => {
                let err = AppError::PermissionDenied(
                    "You can only delete your own comments".to_string(),
                );
                return Err(self.reject(err).await);
            }
            Some(true) => {}
        }

        if !confirmer.confirm(DELETE_PROMPT) {
            tracing::debug!("Deletion of comment {} cancelled", id);
            return Ok(false);
        }

        self.deleting.insert(id, true);
        let result = self.service.delete_comment(id).await;
        self.deleting.remove(&id);

        match result {
            Ok(()) => {
                if let Err(e) = self.refresh().await {
                    tracing::warn!("Comment {} deleted but refresh failed: {}", id, e);
                }
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Failed to delete comment {}: {}", id, e);
                self.report(e.user_message("Failed to delete comment")).await;
                Err(e)
            }
        }
    }

    pub fn is_expanded(&self, id: CommentId) -> bool {
        self.expanded.get(&id).map(|e| *e).unwrap_or(true)
    }

    pub fn toggle_collapsed(&self, id: CommentId) {
        let expanded = self.is_expanded(id);
        self.expanded.insert(id, !expanded);
    }

    /// Only threads with more than two replies get a collapse control.
    pub async fn shows_collapse_control(&self, id: CommentId) -> bool {
        self.comments
            .read()
            .await
            .thread(id)
            .is_some_and(|thread| thread.reply_count() > 2)
    }

    pub async fn actions_for(&self, id: CommentId) -> Option<CommentActions> {
        let tree = self.comments.read().await;
        let comment = tree.get(id)?;
        Some(CommentActions::for_comment(
            self.viewer.as_ref(),
            comment,
            tree.is_root(id),
        ))
    }

    pub async fn tree(&self) -> CommentTree {
        self.comments.read().await.clone()
    }

    pub async fn composer(&self) -> Composer {
        self.composer.read().await.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    pub async fn dismiss_error(&self) {
        *self.error.write().await = None;
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst) > 0
    }

    pub fn is_liking(&self, id: CommentId) -> bool {
        self.liking.get(&id).map(|v| *v).unwrap_or(false)
    }

    pub fn is_deleting(&self, id: CommentId) -> bool {
        self.deleting.get(&id).map(|v| *v).unwrap_or(false)
    }

    pub fn like_transition(&self, id: CommentId) -> Option<LikeTransition> {
        self.like_transitions.get(&id).map(|t| *t)
    }

    async fn report(&self, message: String) {
        *self.error.write().await = Some(message);
    }

    async fn reject(&self, err: AppError) -> AppError {
        self.report(err.user_message("Action failed")).await;
        err
    }

    async fn restore(&self, id: CommentId, snapshot: LikeTransition) {
        if let LikeTransition::Pending {
            was_liked,
            previous_count,
        } = snapshot
        {
            if let Some(comment) = self.comments.write().await.get_mut(id) {
                comment.is_liked = Some(was_liked);
                comment.likes_count = previous_count;
            }
        }
    }
}

fn not_loaded(id: CommentId) -> AppError {
    AppError::Application(format!("Comment #{id} is not loaded"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::comment_service::test_support::service;
    use crate::domain::comment::fixtures::{by_author, comment};
    use crate::ports::{MockCommentRepository, RepositoryError};
    use mockall::Sequence;
    use std::sync::atomic::AtomicUsize;

    struct Answer(bool, AtomicUsize);

    impl Answer {
        fn yes() -> Self {
            Answer(true, AtomicUsize::new(0))
        }

        fn no() -> Self {
            Answer(false, AtomicUsize::new(0))
        }

        fn asked(&self) -> usize {
            self.1.load(Ordering::SeqCst)
        }
    }

    impl Confirmer for Answer {
        fn confirm(&self, _prompt: &str) -> bool {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0
        }
    }

    fn liked(mut c: Comment, count: u32, is_liked: bool) -> Comment {
        c.likes_count = count;
        c.is_liked = Some(is_liked);
        c
    }

    fn thread(repo: MockCommentRepository, viewer: Option<Viewer>) -> CommentThread {
        CommentThread::new(service(repo), Some(ArticleId(7)), viewer)
    }

    #[tokio::test]
    async fn test_no_article_means_no_fetch() {
        let repo = MockCommentRepository::new();
        let thread = CommentThread::new(service(repo), None, None);

        thread.refresh().await.unwrap();
        assert_eq!(thread.tree().await.len(), 0);
        assert!(thread.tree().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_builds_tree() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments().times(1).returning(|_| {
            Ok(vec![
                comment(1, None, 1),
                comment(2, Some(1), 2),
                comment(3, None, 3),
            ])
        });

        let thread = thread(repo, None);
        thread.refresh().await.unwrap();

        let tree = thread.tree().await;
        let roots: Vec<u64> = tree.roots().map(|t| t.comment().id.0).collect();
        assert_eq!(roots, vec![3, 1]);
        assert_eq!(thread.tree().await.len(), 3);
        assert!(!thread.is_loading());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_tree() {
        let mut repo = MockCommentRepository::new();
        let mut seq = Sequence::new();
        repo.expect_list_comments()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![comment(1, None, 0)]));
        repo.expect_list_comments()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RepositoryError::Network("timeout".to_string())));

        let thread = thread(repo, None);
        thread.refresh().await.unwrap();
        assert!(thread.refresh().await.is_err());

        assert_eq!(thread.tree().await.len(), 1);
        assert_eq!(thread.error().await.as_deref(), Some("Failed to load comments"));
        assert!(!thread.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_error_prefers_server_detail() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments().returning(|_| {
            Err(RepositoryError::Api {
                status: 500,
                detail: Some("Database unavailable".to_string()),
            })
        });

        let thread = thread(repo, None);
        assert!(thread.refresh().await.is_err());
        assert_eq!(thread.error().await.as_deref(), Some("Database unavailable"));

        thread.dismiss_error().await;
        assert_eq!(thread.error().await, None);
    }

    #[tokio::test]
    async fn test_blank_submission_never_hits_network() {
        let repo = MockCommentRepository::new();
        let thread = thread(repo, Some(Viewer::new(1, false)));

        thread.set_text("   \n\t").await;
        let err = thread.submit().await.unwrap_err();

        assert_eq!(err, AppError::Validation(DomainError::EmptyContent));
        assert_eq!(thread.error().await.as_deref(), Some("Comment cannot be empty"));
        assert_eq!(thread.composer().await.text, "   \n\t");
    }

    #[tokio::test]
    async fn test_reply_submission_refetches_once_and_clears_composer() {
        let mut repo = MockCommentRepository::new();
        repo.expect_create_comment()
            .withf(|c| c.parent == Some(CommentId(1)) && c.content == "agreed")
            .times(1)
            .returning(|_| Ok(comment(5, Some(1), 9)));
        repo.expect_list_comments()
            .times(1)
            .returning(|_| Ok(vec![comment(1, None, 0), comment(5, Some(1), 9)]));

        let thread = thread(repo, Some(Viewer::new(1, false)));
        thread.start_reply(CommentId(1)).await;
        thread.set_text(" agreed ").await;

        let created = thread.submit().await.unwrap();
        assert_eq!(created.id, CommentId(5));
        assert_eq!(thread.composer().await, Composer::default());
        let tree = thread.tree().await;
        assert_eq!(tree.thread(CommentId(1)).map(|t| t.reply_count()), Some(1));
        assert!(!thread.is_submitting());
    }

    #[tokio::test]
    async fn test_unauthorized_submission_asks_to_log_in() {
        let mut repo = MockCommentRepository::new();
        repo.expect_create_comment()
            .returning(|_| Err(RepositoryError::Authentication(Some("Invalid token".to_string()))));

        let thread = thread(repo, None);
        thread.set_text("hello").await;
        assert!(thread.submit().await.unwrap_err().is_unauthorized());
        assert_eq!(thread.error().await.as_deref(), Some(LOGIN_TO_COMMENT));
        assert_eq!(thread.composer().await.text, "hello");
    }

    #[tokio::test]
    async fn test_other_submission_failure_is_generic() {
        let mut repo = MockCommentRepository::new();
        repo.expect_create_comment().returning(|_| {
            Err(RepositoryError::Api {
                status: 500,
                detail: None,
            })
        });

        let thread = thread(repo, None);
        thread.set_text("hello").await;
        assert!(thread.submit().await.is_err());
        assert_eq!(thread.error().await.as_deref(), Some("Failed to post comment"));
    }

    #[tokio::test]
    async fn test_like_requires_viewer() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .returning(|_| Ok(vec![comment(1, None, 0)]));

        let thread = thread(repo, None);
        thread.refresh().await.unwrap();

        let err = thread.toggle_like(CommentId(1)).await.unwrap_err();
        assert_eq!(err, AppError::AuthenticationRequired);
        assert_eq!(thread.error().await.as_deref(), Some(LOGIN_TO_LIKE));
        assert_eq!(thread.tree().await.get(CommentId(1)).unwrap().likes_count, 0);
    }

    #[tokio::test]
    async fn test_like_on_reply_is_refused_locally() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .returning(|_| Ok(vec![comment(1, None, 0), comment(2, Some(1), 1)]));

        let thread = thread(repo, Some(Viewer::new(9, false)));
        thread.refresh().await.unwrap();

        assert!(matches!(
            thread.toggle_like(CommentId(2)).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert_eq!(thread.like_transition(CommentId(2)), None);
    }

    #[tokio::test]
    async fn test_like_commits_optimistic_state() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .times(1)
            .returning(|_| Ok(vec![liked(comment(1, None, 0), 3, false)]));
        repo.expect_toggle_like().times(1).returning(|_| Ok(()));

        let thread = thread(repo, Some(Viewer::new(9, false)));
        thread.refresh().await.unwrap();
        thread.toggle_like(CommentId(1)).await.unwrap();

        let tree = thread.tree().await;
        let c = tree.get(CommentId(1)).unwrap();
        assert_eq!(c.is_liked, Some(true));
        assert_eq!(c.likes_count, 4);
        assert_eq!(thread.like_transition(CommentId(1)), Some(LikeTransition::Committed));
        assert!(!thread.is_liking(CommentId(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_like_is_visible_before_server_answers() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .returning(|_| Ok(vec![liked(comment(1, None, 0), 3, true)]));
        let (release, wait) = std::sync::mpsc::channel::<()>();
        let wait = std::sync::Mutex::new(wait);
        repo.expect_toggle_like().times(1).returning(move |_| {
            let _ = wait.lock().unwrap().recv();
            Ok(())
        });

        let thread = Arc::new(thread(repo, Some(Viewer::new(9, false))));
        thread.refresh().await.unwrap();

        let background = {
            let thread = thread.clone();
            tokio::spawn(async move { thread.toggle_like(CommentId(1)).await })
        };

        // the liking flag goes up once the local flip is in place
        while !thread.is_liking(CommentId(1)) {
            tokio::task::yield_now().await;
        }
        let c = thread.tree().await.get(CommentId(1)).cloned().unwrap();
        assert_eq!(c.is_liked, Some(false));
        assert_eq!(c.likes_count, 2);
        assert_eq!(
            thread.like_transition(CommentId(1)),
            Some(LikeTransition::Pending {
                was_liked: true,
                previous_count: 3
            })
        );

        release.send(()).unwrap();
        background.await.unwrap().unwrap();
        assert_eq!(thread.like_transition(CommentId(1)), Some(LikeTransition::Committed));
    }

    #[tokio::test]
    async fn test_failed_like_is_rolled_back_by_refetch() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .times(2)
            .returning(|_| Ok(vec![liked(comment(1, None, 0), 3, false)]));
        repo.expect_toggle_like()
            .times(1)
            .returning(|_| Err(RepositoryError::Network("reset".to_string())));

        let thread = thread(repo, Some(Viewer::new(9, false)));
        thread.refresh().await.unwrap();
        assert!(thread.toggle_like(CommentId(1)).await.is_err());

        let tree = thread.tree().await;
        let c = tree.get(CommentId(1)).unwrap();
        assert_eq!(c.is_liked, Some(false));
        assert_eq!(c.likes_count, 3);
        assert_eq!(thread.like_transition(CommentId(1)), Some(LikeTransition::RolledBack));
        assert_eq!(thread.error().await.as_deref(), Some("Failed to update like"));
    }

    #[tokio::test]
    async fn test_failed_like_restores_snapshot_when_refetch_fails() {
        let mut repo = MockCommentRepository::new();
        let mut seq = Sequence::new();
        repo.expect_list_comments()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![liked(comment(1, None, 0), 3, false)]));
        repo.expect_list_comments()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RepositoryError::Network("down".to_string())));
        repo.expect_toggle_like()
            .returning(|_| Err(RepositoryError::Authentication(Some("expired".to_string()))));

        let thread = thread(repo, Some(Viewer::new(9, false)));
        thread.refresh().await.unwrap();
        assert!(thread.toggle_like(CommentId(1)).await.is_err());

        let c = thread.tree().await.get(CommentId(1)).cloned().unwrap();
        assert_eq!((c.is_liked, c.likes_count), (Some(false), 3));
        assert_eq!(thread.error().await.as_deref(), Some(LOGIN_TO_LIKE));
    }

    #[tokio::test]
    async fn test_delete_by_stranger_is_refused_before_prompt() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .returning(|_| Ok(vec![by_author(comment(1, None, 0), 42)]));

        let thread = thread(repo, Some(Viewer::new(7, false)));
        thread.refresh().await.unwrap();

        let answer = Answer::yes();
        assert!(matches!(
            thread.delete_comment(CommentId(1), &answer).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert_eq!(answer.asked(), 0);
        assert_eq!(
            thread.actions_for(CommentId(1)).await.map(|a| a.can_delete),
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_declined_confirmation_deletes_nothing() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .times(1)
            .returning(|_| Ok(vec![by_author(comment(1, None, 0), 42)]));

        let thread = thread(repo, Some(Viewer::new(42, false)));
        thread.refresh().await.unwrap();

        let answer = Answer::no();
        assert!(!thread.delete_comment(CommentId(1), &answer).await.unwrap());
        assert_eq!(answer.asked(), 1);
        assert_eq!(thread.tree().await.len(), 1);
    }

    #[tokio::test]
    async fn test_staff_delete_refetches() {
        let mut repo = MockCommentRepository::new();
        let mut seq = Sequence::new();
        repo.expect_list_comments()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![by_author(comment(1, None, 0), 42), comment(2, None, 1)]));
        repo.expect_delete_comment()
            .withf(|id| *id == CommentId(1))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        repo.expect_list_comments()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![comment(2, None, 1)]));

        let thread = thread(repo, Some(Viewer::new(7, true)));
        thread.refresh().await.unwrap();
        assert!(thread.delete_comment(CommentId(1), &Answer::yes()).await.unwrap());
        assert!(thread.tree().await.get(CommentId(1)).is_none());
        assert!(!thread.is_deleting(CommentId(1)));
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_tree() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .times(1)
            .returning(|_| Ok(vec![by_author(comment(1, None, 0), 42)]));
        repo.expect_delete_comment().returning(|_| {
            Err(RepositoryError::Api {
                status: 500,
                detail: None,
            })
        });

        let thread = thread(repo, Some(Viewer::new(42, false)));
        thread.refresh().await.unwrap();
        assert!(thread.delete_comment(CommentId(1), &Answer::yes()).await.is_err());
        assert_eq!(thread.tree().await.len(), 1);
        assert_eq!(thread.error().await.as_deref(), Some("Failed to delete comment"));
    }

    #[tokio::test]
    async fn test_delete_of_missing_comment_reports_generic_message() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .times(1)
            .returning(|_| Ok(vec![by_author(comment(1, None, 0), 42)]));
        repo.expect_delete_comment()
            .times(1)
            .returning(|_| Err(RepositoryError::NotFound(None)));

        let thread = thread(repo, Some(Viewer::new(42, false)));
        thread.refresh().await.unwrap();
        assert!(thread.delete_comment(CommentId(1), &Answer::yes()).await.is_err());
        assert_eq!(thread.error().await.as_deref(), Some("Failed to delete comment"));
        assert!(!thread.is_deleting(CommentId(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_refreshes_keep_loading_flag() {
        let mut repo = MockCommentRepository::new();
        let mut seq = Sequence::new();
        let entered = Arc::new(AtomicUsize::new(0));
        let (release, wait) = std::sync::mpsc::channel::<()>();
        let wait = std::sync::Mutex::new(wait);
        {
            let entered = entered.clone();
            repo.expect_list_comments()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| {
                    entered.fetch_add(1, Ordering::SeqCst);
                    let _ = wait.lock().unwrap().recv();
                    Ok(vec![comment(1, None, 0)])
                });
        }
        repo.expect_list_comments()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![comment(1, None, 0)]));

        let thread = Arc::new(thread(repo, None));
        let slow = {
            let thread = thread.clone();
            tokio::spawn(async move { thread.refresh().await })
        };
        while entered.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        thread.refresh().await.unwrap();
        assert!(thread.is_loading(), "the slow refresh is still in flight");

        release.send(()).unwrap();
        slow.await.unwrap().unwrap();
        assert!(!thread.is_loading());
    }

    #[tokio::test]
    async fn test_edit_prefills_composer() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .returning(|_| Ok(vec![by_author(comment(1, None, 0), 42)]));

        let owner = thread(repo, Some(Viewer::new(42, false)));
        owner.refresh().await.unwrap();
        owner.start_edit(CommentId(1)).await.unwrap();

        let composer = owner.composer().await;
        assert_eq!(composer.text, "comment 1");
        assert_eq!(composer.editing, Some(CommentId(1)));
    }

    #[tokio::test]
    async fn test_edit_by_stranger_is_refused() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments()
            .returning(|_| Ok(vec![by_author(comment(1, None, 0), 42)]));

        let stranger = thread(repo, Some(Viewer::new(3, false)));
        stranger.refresh().await.unwrap();
        assert!(stranger.start_edit(CommentId(1)).await.is_err());
        assert_eq!(stranger.composer().await, Composer::default());
    }

    #[tokio::test]
    async fn test_collapse_control_and_state() {
        let mut repo = MockCommentRepository::new();
        repo.expect_list_comments().returning(|_| {
            Ok(vec![
                comment(1, None, 0),
                comment(2, Some(1), 1),
                comment(3, Some(1), 2),
                comment(4, Some(1), 3),
                comment(5, None, 4),
                comment(6, Some(5), 5),
                comment(7, Some(5), 6),
            ])
        });

        let thread = thread(repo, None);
        thread.refresh().await.unwrap();

        assert!(thread.shows_collapse_control(CommentId(1)).await);
        assert!(!thread.shows_collapse_control(CommentId(5)).await);

        assert!(thread.is_expanded(CommentId(1)));
        thread.toggle_collapsed(CommentId(1));
        assert!(!thread.is_expanded(CommentId(1)));
        thread.toggle_collapsed(CommentId(1));
        assert!(thread.is_expanded(CommentId(1)));
    }
}
