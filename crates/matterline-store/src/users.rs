//! User operations. Users are a process-lifetime cache: created by any
//! fetch that returns an unknown profile, never erased.

use bytes::Bytes;

use matterline_shared::models::UserProfile;
use matterline_shared::types::UserId;

use crate::models::User;
use crate::storage::Storage;

impl Storage {
    /// Insert or refresh a user from a wire profile. A refreshed record
    /// keeps its cached avatar. Passing `is_login_user` marks this record
    /// as the logged-in user and remembers its id.
    pub fn upsert_user(&mut self, profile: &UserProfile, is_login_user: bool) -> &mut User {
        let user = self
            .users
            .entry(profile.id.clone())
            .and_modify(|existing| {
                let avatar = existing.avatar.take();
                *existing = User::from_profile(profile);
                existing.avatar = avatar;
            })
            .or_insert_with(|| User::from_profile(profile));

        if is_login_user {
            user.is_login_user = true;
            self.login_user_id = profile.id.clone();
        } else {
            user.is_login_user = self.login_user_id == profile.id;
        }

        self.users.get_mut(&profile.id).expect("user just inserted")
    }

    /// Cache freshly fetched avatar bytes. Unknown user: silent no-op (the
    /// fetch may have raced a reset).
    pub fn set_avatar(&mut self, user_id: &UserId, avatar: Bytes) {
        if let Some(user) = self.users.get_mut(user_id) {
            user.avatar = Some(avatar);
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
