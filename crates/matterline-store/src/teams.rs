//! Team operations: upsert, membership, erase-with-cascade.

use tracing::debug;

use matterline_shared::models::{TeamData, TeamMemberData};
use matterline_shared::types::TeamId;

use crate::models::{Team, TeamMember};
use crate::storage::Storage;

impl Storage {
    /// Insert a team or refresh its metadata. An existing team keeps its
    /// channel list and members.
    pub fn upsert_team(&mut self, data: &TeamData) -> &mut Team {
        if !self.teams.contains_key(&data.id) {
            self.team_order.push(data.id.clone());
            self.teams.insert(data.id.clone(), Team::from_data(data));
        } else if let Some(team) = self.teams.get_mut(&data.id) {
            team.update_from(data);
        }

        self.teams.get_mut(&data.id).expect("team just inserted")
    }

    /// Replace a team's membership list. Member user records are resolved
    /// through the user map at the moment of use, so members whose profile
    /// has not arrived yet are kept as ids.
    pub fn set_team_members(&mut self, team_id: &TeamId, members: &[TeamMemberData]) {
        if let Some(team) = self.teams.get_mut(team_id) {
            team.members = members.iter().map(TeamMember::from_data).collect();
        }
    }

    /// Erase a team and every channel it owns. Returns `false` when the
    /// team was not known, which callers treat as a no-op.
    pub fn erase_team(&mut self, team_id: &TeamId) -> bool {
        let Some(team) = self.teams.remove(team_id) else {
            return false;
        };

        for channel_id in &team.channel_ids {
            self.channels.remove(channel_id);
        }
        self.team_order.retain(|id| id != team_id);

        debug!(team = %team_id, channels = team.channel_ids.len(), "team erased");
        true
    }
}
