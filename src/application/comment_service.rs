use super::AppResult;
use crate::domain::*;
use crate::ports::{ArticleRepository, Cache, CommentQuery, CommentRepository};
use std::sync::Arc;

/// Thin layer over the API ports. Comment lists are never cached: every
/// caller gets what the server has right now.
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    articles: Arc<dyn ArticleRepository>,
    article_cache: Arc<dyn Cache<ArticleId, Article>>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        articles: Arc<dyn ArticleRepository>,
        article_cache: Arc<dyn Cache<ArticleId, Article>>,
    ) -> Self {
        Self {
            comments,
            articles,
            article_cache,
        }
    }

    pub async fn list_comments(
        &self,
        article: ArticleId,
        viewer: Option<&Viewer>,
    ) -> AppResult<Vec<Comment>> {
        let query = CommentQuery {
            article,
            include_likes: viewer.map(|v| v.id),
        };
        let comments = self.comments.list_comments(&query).await?;
        tracing::debug!("Fetched {} comments for article {}", comments.len(), article);
        Ok(comments)
    }

    pub async fn create_comment(
        &self,
        article: ArticleId,
        text: &str,
        parent: Option<CommentId>,
    ) -> AppResult<Comment> {
        let content = validate_content(text)?;
        let request = NewComment {
            article,
            content,
            parent,
        };

        let comment = self.comments.create_comment(&request).await?;
        tracing::info!(
            "Created comment {} on article {} (parent: {:?})",
            comment.id,
            article,
            parent
        );
        Ok(comment)
    }

    pub async fn toggle_like(&self, id: CommentId) -> AppResult<()> {
        self.comments.toggle_like(id).await?;
        tracing::info!("Toggled like on comment {}", id);
        Ok(())
    }

    pub async fn delete_comment(&self, id: CommentId) -> AppResult<()> {
        self.comments.delete_comment(id).await?;
        tracing::info!("Deleted comment {}", id);
        Ok(())
    }

    pub async fn get_article(&self, id: ArticleId, use_cache: bool) -> AppResult<Article> {
        if use_cache {
            if let Some(article) = self.article_cache.get(&id).await {
                return Ok(article);
            }
        }

        let article = self.articles.get_article(id).await?;
        self.article_cache.insert(id, article.clone()).await;
        Ok(article)
    }
}
