//! Typed decoding of the real-time event socket messages.
//!
//! Every frame is an [`EventEnvelope`]: an event name, a free-form `data`
//! object and a broadcast envelope with routing ids. [`ServerEvent::decode`]
//! maps the envelope onto one tagged variant; the dispatcher then performs a
//! single exhaustive match instead of per-event handler registration.
//!
//! Decoding never fails on missing fields. The `posted`/`post_edited`/
//! `post_deleted` events carry the post as a nested JSON *string* inside
//! `data.post`; an unparsable nested post degrades to a default body.

use serde::Deserialize;
use tracing::debug;

use crate::models::PostData;
use crate::types::{ChannelId, TeamId, UserId};

/// Routing fields attached to every event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Broadcast {
    pub channel_id: ChannelId,
    pub team_id: TeamId,
    pub user_id: UserId,
}

/// Raw event frame as it arrives on the socket.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventEnvelope {
    pub event: String,
    pub data: serde_json::Value,
    pub broadcast: Broadcast,
    pub seq: i64,
}

/// One decoded real-time event.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Posted {
        team_id: TeamId,
        post: PostData,
    },
    PostEdited {
        post: PostData,
    },
    PostDeleted {
        post: PostData,
    },
    ChannelViewed {
        channel_id: ChannelId,
    },
    Typing {
        channel_id: ChannelId,
        user_id: UserId,
    },
    ChannelCreated {
        team_id: TeamId,
        channel_id: ChannelId,
    },
    DirectAdded {
        channel_id: ChannelId,
    },
    UserAdded {
        team_id: TeamId,
        channel_id: ChannelId,
        user_id: UserId,
    },
    AddedToTeam {
        team_id: TeamId,
        user_id: UserId,
    },
    LeaveTeam {
        team_id: TeamId,
        user_id: UserId,
    },
    UserRemoved {
        channel_id: ChannelId,
        user_id: UserId,
    },
    Hello {
        server_version: String,
    },
    /// Recognized frame with an event kind this client does not consume.
    Unknown {
        name: String,
    },
}

impl ServerEvent {
    pub fn decode(envelope: &EventEnvelope) -> Self {
        let data = &envelope.data;
        let broadcast = &envelope.broadcast;

        match envelope.event.as_str() {
            "posted" => Self::Posted {
                team_id: field_str(data, "team_id")
                    .map(TeamId::new)
                    .unwrap_or_else(|| broadcast.team_id.clone()),
                post: nested_post(data),
            },
            "post_edited" => Self::PostEdited {
                post: nested_post(data),
            },
            "post_deleted" => Self::PostDeleted {
                post: nested_post(data),
            },
            "channel_viewed" => Self::ChannelViewed {
                channel_id: field_str(data, "channel_id")
                    .map(ChannelId::new)
                    .unwrap_or_else(|| broadcast.channel_id.clone()),
            },
            "typing" => Self::Typing {
                channel_id: broadcast.channel_id.clone(),
                user_id: field_str(data, "user_id")
                    .map(UserId::new)
                    .unwrap_or_default(),
            },
            "channel_created" => Self::ChannelCreated {
                team_id: field_str(data, "team_id")
                    .map(TeamId::new)
                    .unwrap_or_default(),
                channel_id: field_str(data, "channel_id")
                    .map(ChannelId::new)
                    .unwrap_or_default(),
            },
            "direct_added" => Self::DirectAdded {
                channel_id: broadcast.channel_id.clone(),
            },
            "user_added" => Self::UserAdded {
                team_id: field_str(data, "team_id")
                    .map(TeamId::new)
                    .unwrap_or_default(),
                channel_id: broadcast.channel_id.clone(),
                user_id: field_str(data, "user_id")
                    .map(UserId::new)
                    .unwrap_or_default(),
            },
            "added_to_team" => Self::AddedToTeam {
                team_id: field_str(data, "team_id")
                    .map(TeamId::new)
                    .unwrap_or_default(),
                user_id: field_str(data, "user_id")
                    .map(UserId::new)
                    .unwrap_or_default(),
            },
            "leave_team" => Self::LeaveTeam {
                team_id: field_str(data, "team_id")
                    .map(TeamId::new)
                    .unwrap_or_default(),
                user_id: field_str(data, "user_id")
                    .map(UserId::new)
                    .unwrap_or_default(),
            },
            "user_removed" => Self::UserRemoved {
                channel_id: field_str(data, "channel_id")
                    .map(ChannelId::new)
                    .unwrap_or_else(|| broadcast.channel_id.clone()),
                user_id: field_str(data, "user_id")
                    .map(UserId::new)
                    .unwrap_or_else(|| broadcast.user_id.clone()),
            },
            "hello" => Self::Hello {
                server_version: field_str(data, "server_version")
                    .map(str::to_owned)
                    .unwrap_or_default(),
            },
            other => Self::Unknown {
                name: other.to_owned(),
            },
        }
    }
}

fn field_str<'a>(data: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Parse the JSON-string-encoded post carried inside `data.post`.
fn nested_post(data: &serde_json::Value) -> PostData {
    let Some(raw) = data.get("post").and_then(|v| v.as_str()) else {
        return PostData::default();
    };

    match serde_json::from_str(raw) {
        Ok(post) => post,
        Err(error) => {
            debug!(%error, "unparsable nested post payload");
            PostData::default()
        }
    }
}
