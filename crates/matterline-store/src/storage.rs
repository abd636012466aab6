//! The entity arena and its identity-keyed lookups.

use std::collections::HashMap;

use matterline_shared::types::{ChannelId, TeamId, UserId};

use crate::models::{Channel, Team, User};

/// Canonical owner of all teams, channels and users known to the client.
///
/// Channels live in a single arena keyed by id; a team owns the *ordered
/// list* of its channel ids. Direct and group conversations belong to a
/// virtual pseudo-team that exists outside the `teams` map and is never
/// erased.
///
/// Lookups return `Option`: an absent entity is a normal condition while
/// the event stream races the bulk fetches, never an error.
#[derive(Debug, Default)]
pub struct Storage {
    pub(crate) teams: HashMap<TeamId, Team>,
    /// Insertion order of `teams`, the order the server listed them in.
    pub(crate) team_order: Vec<TeamId>,
    pub(crate) channels: HashMap<ChannelId, Channel>,
    pub(crate) users: HashMap<UserId, User>,
    /// Virtual home of direct/group channels.
    pub(crate) direct_team: Team,
    pub(crate) login_user_id: UserId,
    pub total_users_count: u32,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entity. Used on logout and before a full re-fetch.
    pub fn reset(&mut self) {
        self.teams.clear();
        self.team_order.clear();
        self.channels.clear();
        self.users.clear();
        self.direct_team = Team::default();
        self.login_user_id = UserId::default();
        self.total_users_count = 0;
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn team(&self, id: &TeamId) -> Option<&Team> {
        self.teams.get(id)
    }

    pub fn team_mut(&mut self, id: &TeamId) -> Option<&mut Team> {
        self.teams.get_mut(id)
    }

    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn channel_mut(&mut self, id: &ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn user_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.get_mut(id)
    }

    /// Teams in the order the server listed them.
    pub fn teams_ordered(&self) -> impl Iterator<Item = &Team> {
        self.team_order.iter().filter_map(|id| self.teams.get(id))
    }

    /// The virtual pseudo-team holding direct and group channels.
    pub fn direct_team(&self) -> &Team {
        &self.direct_team
    }

    pub fn login_user_id(&self) -> &UserId {
        &self.login_user_id
    }

    pub fn login_user(&self) -> Option<&User> {
        self.users.get(&self.login_user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matterline_shared::models::{ChannelData, TeamData, UserProfile};

    fn team_data(id: &str) -> TeamData {
        TeamData {
            id: TeamId::new(id),
            display_name: format!("Team {id}"),
            ..Default::default()
        }
    }

    fn channel_data(id: &str, team_id: &str, kind: &str) -> ChannelData {
        ChannelData {
            id: ChannelId::new(id),
            team_id: TeamId::new(team_id),
            kind: kind.into(),
            display_name: format!("Channel {id}"),
            ..Default::default()
        }
    }

    #[test]
    fn lookups_return_none_for_unknown_ids() {
        let storage = Storage::new();
        assert!(storage.team(&TeamId::new("nope")).is_none());
        assert!(storage.channel(&ChannelId::new("nope")).is_none());
        assert!(storage.user(&UserId::new("nope")).is_none());
    }

    #[test]
    fn reset_restores_empty_state() {
        let mut storage = Storage::new();
        storage.upsert_team(&team_data("t1"));
        storage.upsert_channel(&TeamId::new("t1"), &channel_data("c1", "t1", "O"));
        storage.upsert_user(
            &UserProfile {
                id: UserId::new("u1"),
                ..Default::default()
            },
            true,
        );
        storage.total_users_count = 7;

        storage.reset();

        assert!(storage.team(&TeamId::new("t1")).is_none());
        assert!(storage.channel(&ChannelId::new("c1")).is_none());
        assert!(storage.user(&UserId::new("u1")).is_none());
        assert!(storage.login_user().is_none());
        assert_eq!(storage.total_users_count, 0);
        assert_eq!(storage.teams_ordered().count(), 0);
    }

    #[test]
    fn teams_keep_server_order() {
        let mut storage = Storage::new();
        storage.upsert_team(&team_data("tb"));
        storage.upsert_team(&team_data("ta"));
        storage.upsert_team(&team_data("tc"));

        let order: Vec<_> = storage.teams_ordered().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["tb", "ta", "tc"]);
    }
}
