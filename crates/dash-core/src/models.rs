use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One loosely-typed row as delivered by the CSV or spreadsheet reader.
///
/// Keys are the header-row column names; values are the coerced cell
/// contents (null, bool, number or string).
pub type RawRow = serde_json::Map<String, serde_json::Value>;

// ── Transactions ──────────────────────────────────────────────────────────────

/// Direction of money movement for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in (income).
    Input,
    /// Money going out (expense).
    Output,
}

impl TransactionType {
    /// Match a label case-insensitively against `input` / `output`.
    ///
    /// Surrounding whitespace is significant: `" input"` does not match.
    pub fn from_label(label: &str) -> Option<Self> {
        if label.eq_ignore_ascii_case("input") {
            Some(Self::Input)
        } else if label.eq_ignore_ascii_case("output") {
            Some(Self::Output)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical, validated transaction shape every downstream view consumes.
///
/// Produced only by the normalizer; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// UTC instant of the transaction.
    pub time: DateTime<Utc>,
    /// Income or expense.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Free-text label, possibly empty.
    pub category: String,
    /// Finite amount; never NaN.
    pub amount: f64,
}

impl TransactionRecord {
    pub fn is_input(&self) -> bool {
        self.kind == TransactionType::Input
    }

    pub fn is_output(&self) -> bool {
        self.kind == TransactionType::Output
    }
}

// ── Identity ──────────────────────────────────────────────────────────────────

/// A row identifier as returned by the remote store: integer or text (uuid).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(i) => Self::Int(i),
            Err(_) => Self::Text(s.to_string()),
        }
    }
}

/// An authenticated account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds at which `access_token` stops being accepted.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    /// `true` once `now` has passed `expires_at`. Sessions without an expiry
    /// never expire locally.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|exp| now.timestamp() >= exp)
            .unwrap_or(false)
    }
}

// ── Forum ─────────────────────────────────────────────────────────────────────

/// A forum thread as stored in the `forums` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: RecordId,
    /// Id of the authoring user.
    #[serde(default)]
    pub user: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new forum thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub user: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Name fields joined from the `users` table for a comment's author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A reply attached to a forum thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: RecordId,
    pub forum_id: RecordId,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<Author>,
}

impl Comment {
    /// `"First Last"`, or `"Anonymous"` when no name is on record.
    pub fn author_name(&self) -> String {
        let name = self
            .author
            .as_ref()
            .map(|a| {
                format!(
                    "{} {}",
                    a.first_name.as_deref().unwrap_or(""),
                    a.last_name.as_deref().unwrap_or("")
                )
                .trim()
                .to_string()
            })
            .unwrap_or_default();
        if name.is_empty() {
            "Anonymous".to_string()
        } else {
            name
        }
    }
}

/// Insert payload for a new comment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewComment {
    pub forum_id: RecordId,
    pub user: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
