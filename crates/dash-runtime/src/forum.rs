//! Community forum: posts and their comments.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dash_core::error::{DashError, Result};
use dash_core::formatting::parse_tags;
use dash_core::models::{Comment, ForumPost, NewComment, NewPost, RecordId, User};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

use crate::deadline::with_timeout;
use crate::identity::{AuthEvent, IdentityProvider};
use crate::store::{Query, TableStore};

pub const POSTS_TABLE: &str = "forums";
pub const COMMENTS_TABLE: &str = "comments";
pub const USERS_TABLE: &str = "users";

pub const LOGIN_TO_POST: &str = "Please login to create a post";
pub const LOGIN_TO_COMMENT: &str = "Please login to comment";

pub struct ForumService {
    store: Arc<dyn TableStore>,
    identity: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl ForumService {
    pub fn new(
        store: Arc<dyn TableStore>,
        identity: Arc<dyn IdentityProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            timeout,
        }
    }

    /// Every post, newest first.
    pub async fn list_posts(&self) -> Result<Vec<ForumPost>> {
        let query = Query::table(POSTS_TABLE).order("created_at", false);
        let rows = with_timeout(self.timeout, "Loading posts", self.store.select(&query)).await?;
        decode_rows(rows)
    }

    pub async fn get_post(&self, id: &RecordId) -> Result<ForumPost> {
        let query = Query::table(POSTS_TABLE).eq("id", id_value(id));
        let row =
            with_timeout(self.timeout, "Loading post", self.store.select_single(&query)).await?;
        Ok(serde_json::from_value(row)?)
    }

    /// Publish a post as the signed-in user. `raw_tags` is comma-separated.
    pub async fn create_post(&self, title: &str, content: &str, raw_tags: &str) -> Result<ForumPost> {
        let user = self.require_user(LOGIN_TO_POST).await?;
        let post = NewPost {
            user: user.id,
            title: title.to_string(),
            content: content.to_string(),
            tags: parse_tags(raw_tags),
            created_at: Utc::now(),
        };
        let row = self.insert_one(POSTS_TABLE, serde_json::to_value(&post)?, "Creating post").await?;
        let created: ForumPost = serde_json::from_value(row)?;
        info!(post = %created.id, "Created post");
        Ok(created)
    }

    /// Comments on `post_id`, oldest first, with author names joined in.
    pub async fn list_comments(&self, post_id: &RecordId) -> Result<Vec<Comment>> {
        let query = Query::table(COMMENTS_TABLE)
            .embed("author", USERS_TABLE, "user", &["first_name", "last_name"])
            .eq("forum_id", id_value(post_id))
            .order("created_at", true);
        let rows =
            with_timeout(self.timeout, "Loading comments", self.store.select(&query)).await?;
        decode_rows(rows)
    }

    pub async fn add_comment(&self, post_id: &RecordId, content: &str) -> Result<Comment> {
        let user = self.require_user(LOGIN_TO_COMMENT).await?;
        let comment = NewComment {
            forum_id: post_id.clone(),
            user: user.id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let row = self
            .insert_one(COMMENTS_TABLE, serde_json::to_value(&comment)?, "Posting comment")
            .await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        with_timeout(self.timeout, "Checking sign-in", self.identity.current_user()).await
    }

    /// Sign-in and sign-out events from the identity provider.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.identity.subscribe()
    }

    async fn require_user(&self, message: &str) -> Result<User> {
        self.current_user()
            .await?
            .ok_or_else(|| DashError::NotSignedIn(message.to_string()))
    }

    async fn insert_one(&self, table: &str, row: Value, operation: &str) -> Result<Value> {
        let mut rows =
            with_timeout(self.timeout, operation, self.store.insert(table, vec![row])).await?;
        if rows.is_empty() {
            return Err(DashError::Store(format!("{} returned no row", operation)));
        }
        Ok(rows.remove(0))
    }
}

fn id_value(id: &RecordId) -> Value {
    match id {
        RecordId::Int(i) => Value::from(*i),
        RecordId::Text(s) => Value::from(s.as_str()),
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(DashError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryIdentity, SessionState};
    use crate::store::MemoryStore;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        identity: Arc<MemoryIdentity>,
        forum: ForumService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(MemoryIdentity::new(SessionState::ephemeral()));
        let forum = ForumService::new(store.clone(), identity.clone(), Duration::from_secs(5));
        Fixture {
            store,
            identity,
            forum,
        }
    }

    #[tokio::test]
    async fn test_create_post_requires_login() {
        let f = fixture();
        let err = f.forum.create_post("t", "c", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Please login to create a post");
        assert!(f.store.is_empty(POSTS_TABLE));
    }

    #[tokio::test]
    async fn test_add_comment_requires_login() {
        let f = fixture();
        let err = f.forum.add_comment(&RecordId::Int(1), "hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Please login to comment");
    }

    #[tokio::test]
    async fn test_create_post_splits_tags_and_sets_author() {
        let f = fixture();
        let user = f.identity.sign_up("ada@example.com", "pw").await.unwrap();

        let post = f
            .forum
            .create_post("Budgeting", "Track every coffee.", " savings, ,coffee ")
            .await
            .unwrap();

        assert_eq!(post.tags, vec!["savings", "coffee"]);
        assert_eq!(post.user.as_deref(), Some(user.id.as_str()));
        assert_eq!(f.forum.get_post(&post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn test_list_posts_newest_first() {
        let f = fixture();
        f.store
            .insert(
                POSTS_TABLE,
                vec![
                    json!({"title": "old", "created_at": "2024-01-01T00:00:00Z"}),
                    json!({"title": "new", "created_at": "2024-03-01T00:00:00Z"}),
                    json!({"title": "mid", "created_at": "2024-02-01T00:00:00Z"}),
                ],
            )
            .await
            .unwrap();

        let titles: Vec<String> = f
            .forum
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_subscribers_see_sign_in_and_out() {
        let f = fixture();
        let mut events = f.forum.subscribe();
        assert_eq!(f.forum.current_user().await.unwrap(), None);

        let user = f.identity.sign_up("ada@example.com", "pw").await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(user.clone()));
        assert_eq!(f.forum.current_user().await.unwrap(), Some(user));

        f.identity.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert_eq!(f.forum.current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_post_not_found() {
        let f = fixture();
        let err = f.forum.get_post(&RecordId::Int(42)).await.unwrap_err();
        assert!(matches!(err, DashError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_comments_oldest_first_with_author_names() {
        let f = fixture();
        let user = f.identity.sign_up("ada@example.com", "pw").await.unwrap();
        f.store
            .insert(
                USERS_TABLE,
                vec![json!({"id": user.id, "first_name": "Ada", "last_name": "Lovelace"})],
            )
            .await
            .unwrap();
        let post = f.forum.create_post("Q", "?", "").await.unwrap();

        f.store
            .insert(
                COMMENTS_TABLE,
                vec![
                    json!({"forum_id": 999, "user": "x", "content": "elsewhere", "created_at": "2024-01-01T00:00:00Z"}),
                    json!({"forum_id": post.id, "user": "ghost", "content": "second", "created_at": "2024-01-03T00:00:00Z"}),
                ],
            )
            .await
            .unwrap();
        f.forum.add_comment(&post.id, "latest").await.unwrap();
        f.store
            .insert(
                COMMENTS_TABLE,
                vec![json!({"forum_id": post.id, "user": user.id, "content": "first", "created_at": "2024-01-02T00:00:00Z"})],
            )
            .await
            .unwrap();

        let comments = f.forum.list_comments(&post.id).await.unwrap();
        let summary: Vec<(String, String)> = comments
            .iter()
            .map(|c| (c.content.clone(), c.author_name()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("first".to_string(), "Ada Lovelace".to_string()),
                ("second".to_string(), "Anonymous".to_string()),
                ("latest".to_string(), "Ada Lovelace".to_string()),
            ]
        );
    }
}
