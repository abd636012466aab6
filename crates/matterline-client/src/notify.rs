//! Notifications sent from the backend task to the UI layer.

use matterline_shared::types::{ChannelId, FileId, PostId, TeamId, UserId};
use matterline_store::MissingPosts;

/// Everything the UI can learn from the backend. Mutations have already
/// been applied to the store when a notification is delivered; payloads
/// carry ids, to be resolved against the store at render time.
#[derive(Debug, Clone)]
pub enum ClientNotification {
    /// Login finished and the event socket is being opened.
    LoggedIn { user_id: UserId },
    /// The event socket dropped; entity state is kept but stale.
    ConnectionLost,
    /// A request failed with an HTTP status the client does not handle
    /// itself (401 triggers re-login instead of surfacing here).
    HttpError { status: u16, body: String },

    /// Every team's channel memberships have been fetched.
    AllTeamChannelsPopulated,
    /// The paged bulk user fetch has drained.
    AllUsersLoaded,

    AddedToTeam { team_id: TeamId },
    LeftTeam { team_id: TeamId },
    ChannelAdded { team_id: TeamId, channel_id: ChannelId },
    ChannelRemoved { channel_id: ChannelId },

    NewPost { channel_id: ChannelId, post_id: PostId },
    /// A history page was merged; the runs to splice into the view.
    PostsReconciled { channel_id: ChannelId, missing: MissingPosts },
    PostDeleted { channel_id: ChannelId, post_id: PostId },
    ChannelViewed { channel_id: ChannelId },
    UserTyping { channel_id: ChannelId, user_id: UserId },
    /// Unread marker fetched at channel-open time; empty id means the
    /// channel has no unread posts.
    UnreadMarker { channel_id: ChannelId, post_id: PostId },

    AvatarLoaded { user_id: UserId },
    FileLoaded { channel_id: ChannelId, file_id: FileId },
    /// Attachment could not be read from disk; the send continues with
    /// the remaining files.
    AttachmentFailed { path: String },
    /// Compose status label ("Sending message...", "Attached file 1 of 3",
    /// empty once the echo arrived).
    SendStatus { text: String },
}
