//! Live entity records owned by the store.
//!
//! Entities are built from the wire DTOs in `matterline-shared` and carry
//! the state the wire does not: lazily fetched avatar and file contents, the
//! unread marker, the deletion tombstone. References to other entities are
//! identity keys only (a post stores its author's id, never the author).

use std::collections::HashSet;

use bytes::Bytes;
use serde_json::Value;

use matterline_shared::models::{
    ChannelData, FileData, PostData, TeamData, TeamMemberData, UserProfile,
};
use matterline_shared::types::{ChannelId, ChannelKind, FileId, PostId, TeamId, UserId};

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// A workspace grouping channels and members.
///
/// Channel ownership is the ordered `channel_ids` list; the channel records
/// themselves live in the storage arena so that lookup by id stays O(1).
#[derive(Debug, Clone, Default)]
pub struct Team {
    pub id: TeamId,
    pub display_name: String,
    pub name: String,
    pub description: String,
    /// Owned channels, insertion order = server-assigned display order.
    pub channel_ids: Vec<ChannelId>,
    pub members: Vec<TeamMember>,
}

impl Team {
    pub fn from_data(data: &TeamData) -> Self {
        Self {
            id: data.id.clone(),
            display_name: data.display_name.clone(),
            name: data.name.clone(),
            description: data.description.clone(),
            channel_ids: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Refresh display metadata, keeping channels and members.
    pub fn update_from(&mut self, data: &TeamData) {
        self.display_name = data.display_name.clone();
        self.name = data.name.clone();
        self.description = data.description.clone();
    }
}

/// Membership record; the user record is resolved via the store when needed.
#[derive(Debug, Clone, Default)]
pub struct TeamMember {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

impl TeamMember {
    pub fn from_data(data: &TeamMemberData) -> Self {
        Self {
            user_id: data.user_id.clone(),
            roles: data
                .roles
                .split(',')
                .filter(|r| !r.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A conversation stream. Owns its posts, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub id: ChannelId,
    /// Empty for direct and group channels (virtual pseudo-team).
    pub team_id: TeamId,
    pub kind: ChannelKind,
    pub display_name: String,
    pub name: String,
    pub header: String,
    pub purpose: String,
    /// High-water mark used for ordering channels in the UI.
    pub last_post_at: i64,
    pub total_msg_count: i64,
    /// Unread marker: the id of the newest post the user has seen.
    pub last_read_post_id: PostId,
    pub(crate) posts: Vec<Post>,
    /// Mirror of `posts` ids, guarding the no-duplicate invariant.
    pub(crate) post_ids: HashSet<PostId>,
}

impl Channel {
    pub fn from_data(data: &ChannelData) -> Self {
        Self {
            id: data.id.clone(),
            team_id: data.team_id.clone(),
            kind: ChannelKind::from_code(&data.kind),
            display_name: data.display_name.clone(),
            name: data.name.clone(),
            header: data.header.clone(),
            purpose: data.purpose.clone(),
            last_post_at: data.last_post_at,
            total_msg_count: data.total_msg_count,
            last_read_post_id: PostId::default(),
            posts: Vec::new(),
            post_ids: HashSet::new(),
        }
    }

    /// Refresh wire metadata. The post sequence and unread marker survive;
    /// re-fetching memberships must never drop already-merged history.
    pub fn update_from(&mut self, data: &ChannelData) {
        self.kind = ChannelKind::from_code(&data.kind);
        self.display_name = data.display_name.clone();
        self.name = data.name.clone();
        self.header = data.header.clone();
        self.purpose = data.purpose.clone();
        self.last_post_at = self.last_post_at.max(data.last_post_at);
        self.total_msg_count = data.total_msg_count;
    }

    /// Posts, oldest to newest.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| &p.id == id)
    }

    pub fn contains_post(&self, id: &PostId) -> bool {
        self.post_ids.contains(id)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known user. Users are never erased; the map lives for the process.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub roles: Vec<String>,
    pub locale: String,
    /// Avatar image bytes, fetched lazily.
    pub avatar: Option<Bytes>,
    /// Set on the one record representing the logged-in user.
    pub is_login_user: bool,
}

impl User {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            username: profile.username.clone(),
            nickname: profile.nickname.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.clone(),
            position: profile.position.clone(),
            roles: profile.role_list(),
            locale: profile.locale.clone(),
            avatar: None,
            is_login_user: false,
        }
    }

    /// First plus last name, falling back to the username when a profile
    /// carries neither.
    pub fn display_name(&self) -> String {
        if self.first_name.is_empty() {
            return self.username.clone();
        }
        if self.last_name.is_empty() {
            return self.first_name.clone();
        }
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A single message. Deletion is a tombstone, never removal, so the UI can
/// keep rendering a "deleted" placeholder in place.
#[derive(Debug, Clone, Default)]
pub struct Post {
    pub id: PostId,
    pub channel_id: ChannelId,
    /// Thread parent; empty for top-level posts.
    pub root_id: PostId,
    /// Author, resolved through the user store at the moment of use. The
    /// record may legitimately not have arrived yet.
    pub user_id: UserId,
    pub message: String,
    pub create_at: i64,
    pub update_at: i64,
    pub edit_at: i64,
    pub deleted: bool,
    pub files: Vec<FileRef>,
    pub props: Value,
}

impl Post {
    pub fn from_data(data: &PostData) -> Self {
        Self {
            id: data.id.clone(),
            channel_id: data.channel_id.clone(),
            root_id: data.root_id.clone(),
            user_id: data.user_id.clone(),
            message: data.message.clone(),
            create_at: data.create_at,
            update_at: data.update_at,
            edit_at: data.edit_at,
            deleted: data.delete_at != 0,
            files: data.metadata.files.iter().map(FileRef::from_data).collect(),
            props: data.props.clone(),
        }
    }

    pub fn is_poll(&self) -> bool {
        self.props
            .get("poll_id")
            .and_then(|v| v.as_str())
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}

/// Attachment reference. Contents are fetched on demand and cached.
#[derive(Debug, Clone, Default)]
pub struct FileRef {
    pub id: FileId,
    pub name: String,
    pub extension: String,
    pub size: i64,
    pub mime_type: String,
    pub contents: Option<Bytes>,
}

impl FileRef {
    pub fn from_data(data: &FileData) -> Self {
        Self {
            id: data.id.clone(),
            name: data.name.clone(),
            extension: data.extension.clone(),
            size: data.size,
            mime_type: data.mime_type.clone(),
            contents: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_display_name_falls_back_to_username() {
        let mut user = User {
            username: "ana".into(),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "ana");

        user.first_name = "Ana".into();
        assert_eq!(user.display_name(), "Ana");

        user.last_name = "Petrova".into();
        assert_eq!(user.display_name(), "Ana Petrova");
    }

    #[test]
    fn channel_update_keeps_high_water_mark() {
        let mut data = ChannelData {
            id: ChannelId::new("c1"),
            last_post_at: 500,
            ..Default::default()
        };
        let mut channel = Channel::from_data(&data);
        assert_eq!(channel.last_post_at, 500);

        // a stale refresh must not move the mark backwards
        data.last_post_at = 300;
        channel.update_from(&data);
        assert_eq!(channel.last_post_at, 500);
    }

    #[test]
    fn deleted_wire_post_is_tombstoned() {
        let data = PostData {
            id: PostId::new("p1"),
            delete_at: 1_000,
            ..Default::default()
        };
        assert!(Post::from_data(&data).deleted);
    }
}
