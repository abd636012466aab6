//! Applies real-time events to the entity store.
//!
//! [`dispatch`] is a plain synchronous function: it mutates the store,
//! collects the notifications the UI should see and the asynchronous
//! follow-up fetches the backend task should run, and returns both. Events
//! referencing entities the store does not know are dropped silently — the
//! event stream races the bulk fetches, and a later full fetch
//! reconstructs whatever was missed.

use tracing::debug;

use matterline_shared::events::ServerEvent;
use matterline_shared::types::{ChannelId, FileId, TeamId, UserId};
use matterline_store::Storage;

use crate::notify::ClientNotification;

/// Asynchronous work a dispatched event asks the backend task to do.
/// Follow-up completions re-resolve their targets by id; the entity may be
/// gone again by then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Fetch channel details and add the channel under `team_id` (empty id
    /// = the direct pseudo-team).
    FetchChannel {
        team_id: TeamId,
        channel_id: ChannelId,
    },
    /// Fetch a full team the user was just added to, channels included.
    FetchTeam { team_id: TeamId },
    FetchUser { user_id: UserId },
    FetchFile {
        channel_id: ChannelId,
        file_id: FileId,
    },
}

/// The result of applying one event.
#[derive(Debug, Default)]
pub struct Outcome {
    pub notifications: Vec<ClientNotification>,
    pub follow_ups: Vec<FollowUp>,
}

impl Outcome {
    fn notify(mut self, notification: ClientNotification) -> Self {
        self.notifications.push(notification);
        self
    }

    fn follow_up(mut self, follow_up: FollowUp) -> Self {
        self.follow_ups.push(follow_up);
        self
    }
}

pub fn dispatch(storage: &mut Storage, event: ServerEvent) -> Outcome {
    let outcome = Outcome::default();

    match event {
        ServerEvent::Posted { team_id, post } => {
            let Some(channel) = storage.channel_mut(&post.channel_id) else {
                debug!(channel = %post.channel_id, "post for unknown channel dropped");
                return outcome;
            };

            // at-least-once stream: a replayed post must not re-append
            let Some(appended) = channel.append_post(&post) else {
                return outcome;
            };

            let channel_id = appended.channel_id.clone();
            let post_id = appended.id.clone();
            debug!(team = %team_id, channel = %channel_id, author = %post.user_id, "new post");

            let mut outcome = outcome;
            for file in &post.metadata.files {
                outcome = outcome.follow_up(FollowUp::FetchFile {
                    channel_id: channel_id.clone(),
                    file_id: file.id.clone(),
                });
            }
            outcome.notify(ClientNotification::NewPost { channel_id, post_id })
        }

        ServerEvent::PostEdited { post } => {
            if let Some(channel) = storage.channel_mut(&post.channel_id) {
                channel.edit_post(&post);
            }
            outcome
        }

        ServerEvent::PostDeleted { post } => {
            let Some(channel) = storage.channel_mut(&post.channel_id) else {
                return outcome;
            };
            if !channel.tombstone_post(&post.id) {
                return outcome;
            }
            outcome.notify(ClientNotification::PostDeleted {
                channel_id: post.channel_id,
                post_id: post.id,
            })
        }

        ServerEvent::ChannelViewed { channel_id } => {
            match storage.channel_mut(&channel_id) {
                Some(channel) => {
                    channel.clear_unread();
                    outcome.notify(ClientNotification::ChannelViewed { channel_id })
                }
                None => outcome,
            }
        }

        ServerEvent::Typing { channel_id, user_id } => {
            // transient, no storage mutation
            if storage.channel(&channel_id).is_some() && storage.user(&user_id).is_some() {
                outcome.notify(ClientNotification::UserTyping { channel_id, user_id })
            } else {
                outcome
            }
        }

        ServerEvent::ChannelCreated { team_id, channel_id } => {
            if storage.team(&team_id).is_none() {
                return outcome;
            }
            if storage.channel(&channel_id).is_some() {
                return outcome;
            }
            outcome.follow_up(FollowUp::FetchChannel { team_id, channel_id })
        }

        ServerEvent::DirectAdded { channel_id } => {
            if storage.channel(&channel_id).is_some() {
                return outcome;
            }
            // direct channels always have a home: the virtual pseudo-team
            outcome.follow_up(FollowUp::FetchChannel {
                team_id: TeamId::default(),
                channel_id,
            })
        }

        ServerEvent::UserAdded {
            team_id,
            channel_id,
            user_id,
        } => {
            if storage.team(&team_id).is_none() {
                return outcome;
            }

            let mut outcome = outcome;
            if !channel_id.is_empty() && storage.channel(&channel_id).is_none() {
                outcome = outcome.follow_up(FollowUp::FetchChannel {
                    team_id: team_id.clone(),
                    channel_id,
                });
            }
            if !user_id.is_empty() && storage.user(&user_id).is_none() {
                outcome = outcome.follow_up(FollowUp::FetchUser { user_id });
            }
            outcome
        }

        ServerEvent::AddedToTeam { team_id, user_id } => {
            debug!(team = %team_id, user = %user_id, "added to team");
            if storage.team(&team_id).is_some() {
                return outcome;
            }
            // unknown team: the full fetch brings its channels along
            outcome.follow_up(FollowUp::FetchTeam { team_id })
        }

        ServerEvent::LeaveTeam { team_id, user_id } => {
            debug!(team = %team_id, user = %user_id, "left team");
            if storage.erase_team(&team_id) {
                outcome.notify(ClientNotification::LeftTeam { team_id })
            } else {
                outcome
            }
        }

        ServerEvent::UserRemoved { channel_id, user_id } => {
            debug!(channel = %channel_id, user = %user_id, "removed from channel");
            if storage.remove_channel(&channel_id) {
                outcome.notify(ClientNotification::ChannelRemoved { channel_id })
            } else {
                outcome
            }
        }

        ServerEvent::Hello { server_version } => {
            debug!(server_version, "server hello");
            outcome
        }

        ServerEvent::Unknown { name } => {
            debug!(event = name, "unhandled event kind");
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matterline_shared::models::{ChannelData, FileData, PostData, TeamData, UserProfile};
    use matterline_shared::types::PostId;

    fn storage_with_channel() -> Storage {
        let mut storage = Storage::new();
        storage.upsert_team(&TeamData {
            id: TeamId::new("t1"),
            ..Default::default()
        });
        storage.upsert_channel(
            &TeamId::new("t1"),
            &ChannelData {
                id: ChannelId::new("c1"),
                team_id: TeamId::new("t1"),
                kind: "O".into(),
                ..Default::default()
            },
        );
        storage
    }

    fn post(id: &str, channel: &str) -> PostData {
        PostData {
            id: PostId::new(id),
            channel_id: ChannelId::new(channel),
            user_id: UserId::new("u1"),
            message: "hello".into(),
            create_at: 1,
            ..Default::default()
        }
    }

    #[test]
    fn posted_appends_and_notifies() {
        let mut storage = storage_with_channel();

        let outcome = dispatch(
            &mut storage,
            ServerEvent::Posted {
                team_id: TeamId::new("t1"),
                post: post("p1", "c1"),
            },
        );

        assert_eq!(outcome.notifications.len(), 1);
        assert!(matches!(
            &outcome.notifications[0],
            ClientNotification::NewPost { post_id, .. } if post_id.as_str() == "p1"
        ));
        let channel = storage.channel(&ChannelId::new("c1")).unwrap();
        assert_eq!(channel.posts().len(), 1);
    }

    #[test]
    fn posted_requests_attachment_fetches() {
        let mut storage = storage_with_channel();
        let mut data = post("p1", "c1");
        data.metadata.files.push(FileData {
            id: FileId::new("f1"),
            ..Default::default()
        });

        let outcome = dispatch(
            &mut storage,
            ServerEvent::Posted {
                team_id: TeamId::new("t1"),
                post: data,
            },
        );

        assert_eq!(
            outcome.follow_ups,
            vec![FollowUp::FetchFile {
                channel_id: ChannelId::new("c1"),
                file_id: FileId::new("f1"),
            }]
        );
    }

    #[test]
    fn replayed_post_event_is_ignored() {
        let mut storage = storage_with_channel();
        let event = ServerEvent::Posted {
            team_id: TeamId::new("t1"),
            post: post("p1", "c1"),
        };

        dispatch(&mut storage, event.clone());
        let outcome = dispatch(&mut storage, event);

        assert!(outcome.notifications.is_empty());
        assert_eq!(storage.channel(&ChannelId::new("c1")).unwrap().posts().len(), 1);
    }

    #[test]
    fn events_for_unknown_entities_are_noops() {
        let mut storage = Storage::new();

        let events = vec![
            ServerEvent::Posted {
                team_id: TeamId::new("t?"),
                post: post("p1", "c?"),
            },
            ServerEvent::PostEdited { post: post("p1", "c?") },
            ServerEvent::PostDeleted { post: post("p1", "c?") },
            ServerEvent::ChannelViewed {
                channel_id: ChannelId::new("c?"),
            },
            ServerEvent::Typing {
                channel_id: ChannelId::new("c?"),
                user_id: UserId::new("u?"),
            },
            ServerEvent::ChannelCreated {
                team_id: TeamId::new("t?"),
                channel_id: ChannelId::new("c?"),
            },
            ServerEvent::LeaveTeam {
                team_id: TeamId::new("t?"),
                user_id: UserId::new("u?"),
            },
            ServerEvent::UserRemoved {
                channel_id: ChannelId::new("c?"),
                user_id: UserId::new("u?"),
            },
            ServerEvent::UserAdded {
                team_id: TeamId::new("t?"),
                channel_id: ChannelId::new("c?"),
                user_id: UserId::new("u?"),
            },
        ];

        for event in events {
            let outcome = dispatch(&mut storage, event);
            assert!(outcome.notifications.is_empty());
            assert!(outcome.follow_ups.is_empty());
        }

        // nothing got created along the way
        assert_eq!(storage.teams_ordered().count(), 0);
        assert_eq!(storage.user_count(), 0);
    }

    #[test]
    fn edited_post_changes_text_without_notification() {
        let mut storage = storage_with_channel();
        dispatch(
            &mut storage,
            ServerEvent::Posted {
                team_id: TeamId::new("t1"),
                post: post("p1", "c1"),
            },
        );

        let mut edited = post("p1", "c1");
        edited.message = "corrected".into();
        let outcome = dispatch(&mut storage, ServerEvent::PostEdited { post: edited });

        assert!(outcome.notifications.is_empty());
        let channel = storage.channel(&ChannelId::new("c1")).unwrap();
        assert_eq!(channel.post(&PostId::new("p1")).unwrap().message, "corrected");
    }

    #[test]
    fn deleted_post_is_tombstoned_in_place() {
        let mut storage = storage_with_channel();
        dispatch(
            &mut storage,
            ServerEvent::Posted {
                team_id: TeamId::new("t1"),
                post: post("p1", "c1"),
            },
        );

        let outcome = dispatch(
            &mut storage,
            ServerEvent::PostDeleted { post: post("p1", "c1") },
        );

        assert_eq!(outcome.notifications.len(), 1);
        let channel = storage.channel(&ChannelId::new("c1")).unwrap();
        assert_eq!(channel.posts().len(), 1);
        assert!(channel.post(&PostId::new("p1")).unwrap().deleted);
    }

    #[test]
    fn typing_requires_both_user_and_channel() {
        let mut storage = storage_with_channel();

        let outcome = dispatch(
            &mut storage,
            ServerEvent::Typing {
                channel_id: ChannelId::new("c1"),
                user_id: UserId::new("u1"),
            },
        );
        assert!(outcome.notifications.is_empty());

        storage.upsert_user(
            &UserProfile {
                id: UserId::new("u1"),
                ..Default::default()
            },
            false,
        );
        let outcome = dispatch(
            &mut storage,
            ServerEvent::Typing {
                channel_id: ChannelId::new("c1"),
                user_id: UserId::new("u1"),
            },
        );
        assert_eq!(outcome.notifications.len(), 1);
    }

    #[test]
    fn leave_team_erases_and_cascades() {
        let mut storage = storage_with_channel();

        let outcome = dispatch(
            &mut storage,
            ServerEvent::LeaveTeam {
                team_id: TeamId::new("t1"),
                user_id: UserId::new("u1"),
            },
        );

        assert!(matches!(
            &outcome.notifications[0],
            ClientNotification::LeftTeam { team_id } if team_id.as_str() == "t1"
        ));
        assert!(storage.team(&TeamId::new("t1")).is_none());
        assert!(storage.channel(&ChannelId::new("c1")).is_none());
    }

    #[test]
    fn added_to_unknown_team_requests_a_full_fetch() {
        let mut storage = Storage::new();

        let outcome = dispatch(
            &mut storage,
            ServerEvent::AddedToTeam {
                team_id: TeamId::new("t9"),
                user_id: UserId::new("u1"),
            },
        );

        assert_eq!(
            outcome.follow_ups,
            vec![FollowUp::FetchTeam {
                team_id: TeamId::new("t9"),
            }]
        );
    }

    #[test]
    fn new_channel_in_known_team_is_backfilled() {
        let mut storage = storage_with_channel();

        let outcome = dispatch(
            &mut storage,
            ServerEvent::ChannelCreated {
                team_id: TeamId::new("t1"),
                channel_id: ChannelId::new("c2"),
            },
        );
        assert_eq!(
            outcome.follow_ups,
            vec![FollowUp::FetchChannel {
                team_id: TeamId::new("t1"),
                channel_id: ChannelId::new("c2"),
            }]
        );

        // already-known channel: nothing to do
        let outcome = dispatch(
            &mut storage,
            ServerEvent::ChannelCreated {
                team_id: TeamId::new("t1"),
                channel_id: ChannelId::new("c1"),
            },
        );
        assert!(outcome.follow_ups.is_empty());
    }

    #[test]
    fn direct_added_targets_the_pseudo_team() {
        let mut storage = Storage::new();

        let outcome = dispatch(
            &mut storage,
            ServerEvent::DirectAdded {
                channel_id: ChannelId::new("d1"),
            },
        );

        assert_eq!(
            outcome.follow_ups,
            vec![FollowUp::FetchChannel {
                team_id: TeamId::default(),
                channel_id: ChannelId::new("d1"),
            }]
        );
    }

    #[test]
    fn user_removed_drops_the_channel_from_its_team() {
        let mut storage = storage_with_channel();

        let outcome = dispatch(
            &mut storage,
            ServerEvent::UserRemoved {
                channel_id: ChannelId::new("c1"),
                user_id: UserId::new("u1"),
            },
        );

        assert!(matches!(
            &outcome.notifications[0],
            ClientNotification::ChannelRemoved { channel_id } if channel_id.as_str() == "c1"
        ));
        assert!(storage.channel(&ChannelId::new("c1")).is_none());
        assert!(storage.team(&TeamId::new("t1")).unwrap().channel_ids.is_empty());
    }

    #[test]
    fn channel_viewed_clears_the_unread_marker() {
        let mut storage = storage_with_channel();
        dispatch(
            &mut storage,
            ServerEvent::Posted {
                team_id: TeamId::new("t1"),
                post: post("p1", "c1"),
            },
        );

        let outcome = dispatch(
            &mut storage,
            ServerEvent::ChannelViewed {
                channel_id: ChannelId::new("c1"),
            },
        );

        assert_eq!(outcome.notifications.len(), 1);
        let channel = storage.channel(&ChannelId::new("c1")).unwrap();
        assert_eq!(channel.last_read_post_id, PostId::new("p1"));
    }
}
