//! Typed REST endpoints. Each method maps to one server API call; paths and
//! query parameters mirror the Mattermost v4 API.

use bytes::Bytes;

use matterline_shared::models::{
    ChannelData, ChannelViewRequest, CommandRequest, FileUploadResponse, LoginRequest,
    NewPostRequest, PostData, PostList, PostPatchRequest, TeamData, TeamMemberData, UnreadPosts,
    UserProfile, UsersStats,
};
use matterline_shared::types::{ChannelId, FileId, PostId, TeamId, UserId};

use crate::error::{NetError, Result};
use crate::http::HttpClient;

impl HttpClient {
    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Authenticate. The session token arrives in the `Token` response
    /// header, not in the body.
    pub async fn login(&self, request: &LoginRequest) -> Result<(UserProfile, String)> {
        let response = self.post_json_raw("users/login", request).await?;

        let token = response
            .headers()
            .get("Token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        if token.is_empty() {
            return Err(NetError::EmptyToken);
        }

        let user: UserProfile = response.json().await?;
        Ok((user, token))
    }

    pub async fn logout(&self) -> Result<()> {
        self.post_json_discard("users/logout", &serde_json::json!({})).await
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn get_user(&self, user_id: &UserId) -> Result<UserProfile> {
        self.get_json(&format!("users/{user_id}")).await
    }

    pub async fn get_users_stats(&self) -> Result<UsersStats> {
        self.get_json("users/stats").await
    }

    pub async fn get_users_page(&self, page: u32, per_page: u32) -> Result<Vec<UserProfile>> {
        self.get_json(&format!("users?per_page={per_page}&page={page}"))
            .await
    }

    pub async fn get_user_image(&self, user_id: &UserId) -> Result<Bytes> {
        self.get_bytes(&format!("users/{user_id}/image")).await
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    pub async fn get_my_teams(&self) -> Result<Vec<TeamData>> {
        self.get_json("users/me/teams").await
    }

    pub async fn get_team(&self, team_id: &TeamId) -> Result<TeamData> {
        self.get_json(&format!("teams/{team_id}")).await
    }

    pub async fn get_team_members(&self, team_id: &TeamId) -> Result<Vec<TeamMemberData>> {
        self.get_json(&format!("teams/{team_id}/members")).await
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    pub async fn get_my_channels(&self, team_id: &TeamId) -> Result<Vec<ChannelData>> {
        self.get_json(&format!("users/me/teams/{team_id}/channels"))
            .await
    }

    pub async fn get_channel(&self, channel_id: &ChannelId) -> Result<ChannelData> {
        self.get_json(&format!("channels/{channel_id}")).await
    }

    pub async fn get_channel_posts(
        &self,
        channel_id: &ChannelId,
        page: u32,
        per_page: u32,
    ) -> Result<PostList> {
        self.get_json(&format!(
            "channels/{channel_id}/posts?page={page}&per_page={per_page}"
        ))
        .await
    }

    pub async fn get_channel_unread(&self, channel_id: &ChannelId) -> Result<UnreadPosts> {
        self.get_json(&format!(
            "users/me/channels/{channel_id}/posts/unread?limit_before=0&limit_after=1"
        ))
        .await
    }

    /// Mark a channel read. No reply payload is consumed; the server
    /// confirms with a `channel_viewed` event.
    pub async fn view_channel(&self, channel_id: &ChannelId) -> Result<()> {
        self.post_json_discard(
            "channels/members/me/view",
            &ChannelViewRequest {
                channel_id: channel_id.clone(),
            },
        )
        .await
    }

    // ------------------------------------------------------------------
    // Posts and files
    // ------------------------------------------------------------------

    pub async fn create_post(&self, request: &NewPostRequest) -> Result<PostData> {
        self.post_json("posts", request).await
    }

    pub async fn patch_post(
        &self,
        post_id: &PostId,
        request: &PostPatchRequest,
    ) -> Result<PostData> {
        self.put_json(&format!("posts/{post_id}/patch"), request).await
    }

    pub async fn upload_file(
        &self,
        channel_id: &ChannelId,
        filename: &str,
        contents: Bytes,
    ) -> Result<FileUploadResponse> {
        self.post_bytes(
            &format!("files?channel_id={channel_id}&filename={filename}"),
            contents,
        )
        .await
    }

    pub async fn get_file(&self, file_id: &FileId) -> Result<Bytes> {
        self.get_bytes(&format!("files/{file_id}")).await
    }

    /// Execute a slash command (the poll path goes through here).
    pub async fn execute_command(&self, request: &CommandRequest) -> Result<()> {
        self.post_json_discard("commands/execute", request).await
    }
}
