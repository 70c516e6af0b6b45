use async_trait::async_trait;
use std::sync::Arc;

use super::{ApiClient, ArticleDto, CommentCreateDto, CommentDto, LikeDto};
use crate::domain::{Article, ArticleId, Comment, CommentId, NewComment};
use crate::ports::{ArticleRepository, CommentQuery, CommentRepository, RepositoryResult};

#[derive(Clone)]
pub struct HttpCommentRepository {
    client: Arc<ApiClient>,
}

impl HttpCommentRepository {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    fn build_comment_query_params(&self, query: &CommentQuery) -> Vec<(String, String)> {
        let mut params = vec![("article".to_string(), query.article.to_string())];

        if let Some(viewer) = query.include_likes {
            params.push(("include_likes".to_string(), viewer.to_string()));
        }

        params
    }

    fn build_query_string(&self, params: &[(String, String)]) -> String {
        if params.is_empty() {
            return String::new();
        }

        format!(
            "?{}",
            params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&")
        )
    }

    pub(crate) fn list_path(&self, query: &CommentQuery) -> String {
        let params = self.build_comment_query_params(query);
        format!("comments/{}", self.build_query_string(&params))
    }
}

#[async_trait]
impl CommentRepository for HttpCommentRepository {
    async fn list_comments(&self, query: &CommentQuery) -> RepositoryResult<Vec<Comment>> {
        let path = self.list_path(query);

        let comment_dtos: Vec<CommentDto> = self.client.get(&path).await?;
        comment_dtos.into_iter().map(Comment::try_from).collect()
    }

    async fn create_comment(&self, comment: &NewComment) -> RepositoryResult<Comment> {
        let create_dto = CommentCreateDto::from(comment);

        let comment_dto: CommentDto = self.client.post("comments/create/", &create_dto).await?;
        comment_dto.try_into()
    }

    async fn toggle_like(&self, id: CommentId) -> RepositoryResult<()> {
        self.client
            .post_unit("like/", &LikeDto { comment_id: id.0 })
            .await
    }

    async fn delete_comment(&self, id: CommentId) -> RepositoryResult<()> {
        self.client.delete(&format!("comments/{}/", id.0)).await
    }
}

#[async_trait]
impl ArticleRepository for HttpCommentRepository {
    async fn get_article(&self, id: ArticleId) -> RepositoryResult<Article> {
        let article_dto: ArticleDto = self.client.get(&format!("articles/{}/", id.0)).await?;
        article_dto.try_into()
    }
}
