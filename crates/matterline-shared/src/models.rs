//! serde DTOs for the Mattermost HTTP API.
//!
//! Every response struct defaults its fields (`#[serde(default)]`), so a
//! missing or malformed field degrades to an empty value instead of failing
//! the whole response. Timestamps are millisecond epochs as on the wire;
//! [`timestamp`] converts them for display.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, FileId, PostId, TeamId, UserId};

/// Convert a wire millisecond epoch to a UTC timestamp.
///
/// Zero (the server's "never") maps to `None`.
pub fn timestamp(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: UserId,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    pub username: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    /// Comma-separated on the wire, e.g. `"system_user,system_admin"`.
    pub roles: String,
    pub locale: String,
}

impl UserProfile {
    pub fn role_list(&self) -> Vec<String> {
        self.roles
            .split(',')
            .filter(|r| !r.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsersStats {
    pub total_users_count: u32,
}

// ---------------------------------------------------------------------------
// Teams and channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamData {
    pub id: TeamId,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    pub display_name: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelData {
    pub id: ChannelId,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    pub team_id: TeamId,
    /// One-letter kind code, see [`crate::types::ChannelKind::from_code`].
    #[serde(rename = "type")]
    pub kind: String,
    pub display_name: String,
    pub name: String,
    pub header: String,
    pub purpose: String,
    pub last_post_at: i64,
    pub total_msg_count: i64,
    pub creator_id: UserId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamMemberData {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub roles: String,
}

// ---------------------------------------------------------------------------
// Posts and files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostData {
    pub id: PostId,
    pub create_at: i64,
    pub update_at: i64,
    pub edit_at: i64,
    pub delete_at: i64,
    pub channel_id: ChannelId,
    /// Thread parent; empty for top-level posts.
    pub root_id: PostId,
    pub user_id: UserId,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque plugin/system properties (matterpoll, webhooks, ...).
    pub props: serde_json::Value,
    pub metadata: PostMetadata,
}

impl PostData {
    /// True if the post carries matterpoll properties, i.e. it renders a
    /// poll created on someone's behalf by the poll bot.
    pub fn is_poll(&self) -> bool {
        self.props
            .get("poll_id")
            .and_then(|v| v.as_str())
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMetadata {
    pub files: Vec<FileData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileData {
    pub id: FileId,
    pub post_id: PostId,
    pub name: String,
    pub extension: String,
    pub size: i64,
    pub mime_type: String,
}

/// Paginated post history response. `order` is newest-first; `posts` maps
/// each listed id to its full body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostList {
    pub order: Vec<PostId>,
    pub posts: HashMap<PostId, PostData>,
}

/// Response of the unread-posts query; only the previous-post marker is
/// consumed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnreadPosts {
    pub prev_post_id: PostId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileUploadResponse {
    pub file_infos: Vec<FileData>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub login_id: String,
    pub password: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewPostRequest {
    pub channel_id: ChannelId,
    pub message: String,
    #[serde(skip_serializing_if = "PostId::is_empty")]
    pub root_id: PostId,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<FileId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostPatchRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<FileId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelViewRequest {
    pub channel_id: ChannelId,
}

/// Slash-command execution, used to create polls through matterpoll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    pub channel_id: ChannelId,
    pub command: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewPollData {
    pub question: String,
    pub options: Vec<String>,
    pub anonymous: bool,
    pub show_progress: bool,
    pub allow_add_options: bool,
}

impl NewPollData {
    /// Render the poll as a matterpoll slash command.
    pub fn to_command(&self) -> String {
        let mut command = format!("/poll \"{}\"", self.question);
        for option in &self.options {
            command.push_str(&format!(" \"{}\"", option));
        }
        if self.anonymous {
            command.push_str(" --anonymous");
        }
        if self.show_progress {
            command.push_str(" --progress");
        }
        if self.allow_add_options {
            command.push_str(" --public-add-option");
        }
        command
    }
}
