//! Channel operations: upsert with team routing, removal.

use tracing::debug;

use matterline_shared::models::ChannelData;
use matterline_shared::types::{ChannelId, ChannelKind, TeamId};

use crate::models::Channel;
use crate::storage::Storage;

impl Storage {
    /// Insert a channel under its owning team, or refresh it in place.
    ///
    /// Direct and group channels (and any channel arriving with an empty
    /// team id) are routed to the virtual direct pseudo-team. A channel of
    /// an unknown real team is refused with `None`; callers drop the data
    /// and rely on a later team fetch to bring the channel back.
    ///
    /// Refreshing never discards the existing post sequence.
    pub fn upsert_channel(
        &mut self,
        team_id: &TeamId,
        data: &ChannelData,
    ) -> Option<&mut Channel> {
        if let Some(existing) = self.channels.get_mut(&data.id) {
            existing.update_from(data);
            return self.channels.get_mut(&data.id);
        }

        let kind = ChannelKind::from_code(&data.kind);
        let direct = kind.is_direct() || team_id.is_empty();

        let owner = if direct {
            &mut self.direct_team
        } else {
            match self.teams.get_mut(team_id) {
                Some(team) => team,
                None => {
                    debug!(channel = %data.id, team = %team_id, "channel for unknown team dropped");
                    return None;
                }
            }
        };

        owner.channel_ids.push(data.id.clone());

        let mut channel = Channel::from_data(data);
        if direct {
            channel.team_id = TeamId::default();
        }
        self.channels.insert(data.id.clone(), channel);
        self.channels.get_mut(&data.id)
    }

    /// Remove a channel from its owning team (or the direct pseudo-team)
    /// and from the arena. Returns `false` when unknown.
    pub fn remove_channel(&mut self, channel_id: &ChannelId) -> bool {
        let Some(channel) = self.channels.remove(channel_id) else {
            return false;
        };

        let owner = if channel.team_id.is_empty() {
            Some(&mut self.direct_team)
        } else {
            self.teams.get_mut(&channel.team_id)
        };

        if let Some(team) = owner {
            team.channel_ids.retain(|id| id != channel_id);
        }
        true
    }
}
