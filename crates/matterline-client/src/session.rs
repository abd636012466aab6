//! Session lifecycle: login, the initial snapshot, channel opening, and
//! the silent re-login after a session expiry.
//!
//! The snapshot order mirrors the data flow the UI depends on: teams →
//! channel memberships and team members → unread markers and history pages
//! (on channel open) → bulk users. Completion counters are local to each
//! operation, so two overlapping snapshot runs cannot corrupt each other's
//! progress tracking.

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use matterline_net::{spawn_socket, HttpClient, SocketNotification};
use matterline_shared::constants::{
    page_count, DEVICE_ID, POSTS_PER_PAGE, RELOGIN_BACKOFF, USERS_PER_PAGE,
};
use matterline_shared::models::LoginRequest;
use matterline_shared::types::{ChannelId, TeamId};

use crate::backend::BackendTask;
use crate::error::Result;
use crate::notify::ClientNotification;
use crate::settings::LoginSettings;

impl BackendTask {
    // ------------------------------------------------------------------
    // Login / logout
    // ------------------------------------------------------------------

    /// Authenticate, open the event socket and pull the initial snapshot.
    ///
    /// Returns the socket notification receiver for the select loop. A
    /// failed snapshot is reported but does not tear the session down;
    /// whatever was fetched stays usable and events keep flowing.
    pub(crate) async fn login(
        &mut self,
        domain: String,
        username: String,
        password: String,
    ) -> Result<mpsc::Receiver<SocketNotification>> {
        let mut http = HttpClient::new(&domain);
        let request = LoginRequest {
            login_id: username.clone(),
            password,
            device_id: DEVICE_ID.to_owned(),
        };

        let (profile, token) = http.login(&request).await?;
        http.set_token(token.clone());
        info!(user = %profile.username, "logged in");

        // a re-login through the login command starts a fresh graph
        self.close_socket().await;
        self.storage.reset();
        let user_id = self.storage.upsert_user(&profile, true).id.clone();

        self.settings = LoginSettings {
            domain: domain.clone(),
            username,
            token: token.clone(),
        };
        if let Err(error) = self.settings.save() {
            warn!(%error, "could not persist login settings");
        }

        let (socket_cmd, socket_rx) = spawn_socket(&domain, &token).await?;
        self.socket_cmd = Some(socket_cmd);
        self.http = Some(http);
        self.credentials = Some(request);
        self.is_logged_in = true;

        self.notify(ClientNotification::LoggedIn { user_id }).await;

        if let Err(error) = self.load_initial_snapshot().await {
            self.report_error(error).await;
        }

        Ok(socket_rx)
    }

    pub(crate) async fn logout(&mut self) {
        if let Ok(http) = self.http() {
            if let Err(error) = http.logout().await {
                debug!(%error, "logout request failed");
            }
        }

        self.close_socket().await;
        self.storage.reset();
        self.is_logged_in = false;
        self.http = None;
        self.credentials = None;

        self.settings.token.clear();
        if let Err(error) = self.settings.save() {
            warn!(%error, "could not persist login settings");
        }
    }

    /// Silent re-login after the server reported an expired session. Runs
    /// behind a fixed backoff so a broken server cannot drive a tight
    /// failure loop. Entity state is kept; the event socket is reopened.
    pub(crate) async fn relogin(&mut self) -> Option<mpsc::Receiver<SocketNotification>> {
        let request = self.credentials.clone()?;

        self.close_socket().await;
        if let Some(http) = self.http.as_mut() {
            http.clear_token();
        }

        sleep(RELOGIN_BACKOFF).await;
        debug!("login retry");

        let http = self.http.as_mut()?;
        let (_, token) = match http.login(&request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "login retry failed");
                self.notify(ClientNotification::ConnectionLost).await;
                return None;
            }
        };
        http.set_token(token.clone());

        self.settings.token = token.clone();
        if let Err(error) = self.settings.save() {
            warn!(%error, "could not persist login settings");
        }

        match spawn_socket(&self.settings.domain, &token).await {
            Ok((socket_cmd, socket_rx)) => {
                self.socket_cmd = Some(socket_cmd);
                info!("login retry successful");
                Some(socket_rx)
            }
            Err(error) => {
                warn!(%error, "event socket reconnect failed");
                self.notify(ClientNotification::ConnectionLost).await;
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Initial snapshot
    // ------------------------------------------------------------------

    /// Teams, their channel memberships and members, then the bulk user
    /// list.
    pub(crate) async fn load_initial_snapshot(&mut self) -> Result<()> {
        let teams = self.http()?.get_my_teams().await?;
        for data in &teams {
            self.storage.upsert_team(data);
        }

        // this run's own completion counter
        let mut unfilled_teams = teams.len();
        for data in &teams {
            self.populate_team(&data.id).await?;
            unfilled_teams -= 1;
            if unfilled_teams == 0 {
                self.notify(ClientNotification::AllTeamChannelsPopulated).await;
            }
        }

        self.load_all_users().await
    }

    /// Channel memberships and the member list of one team.
    pub(crate) async fn populate_team(&mut self, team_id: &TeamId) -> Result<()> {
        let channels = self.http()?.get_my_channels(team_id).await?;
        for data in &channels {
            // an unknown kind code still lands under the team; only a
            // vanished team makes this drop the channel
            self.storage.upsert_channel(team_id, data);
        }
        debug!(team = %team_id, channels = channels.len(), "team channels populated");

        let members = self.http()?.get_team_members(team_id).await?;
        self.storage.set_team_members(team_id, &members);
        Ok(())
    }

    /// The paged bulk user fetch. Pages are requested concurrently; the
    /// obtained-pages count lives in this call frame, never in shared
    /// state.
    pub(crate) async fn load_all_users(&mut self) -> Result<()> {
        let stats = self.http()?.get_users_stats().await?;
        self.storage.total_users_count = stats.total_users_count;

        let total_pages = page_count(stats.total_users_count, USERS_PER_PAGE);
        let http = self.http()?;
        let pages = join_all(
            (0..total_pages).map(|page| http.get_users_page(page, USERS_PER_PAGE)),
        )
        .await;

        let mut obtained_pages = 0;
        for result in pages {
            let profiles = result?;
            for profile in &profiles {
                self.storage.upsert_user(profile, false);
            }
            obtained_pages += 1;
            debug!(
                page = obtained_pages,
                of = total_pages,
                users = self.storage.user_count(),
                "user page merged"
            );
        }

        if obtained_pages == total_pages {
            self.notify(ClientNotification::AllUsersLoaded).await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Channel history
    // ------------------------------------------------------------------

    /// Unread marker first (so the UI can place its separator), then the
    /// newest history page.
    pub(crate) async fn open_channel(&mut self, channel_id: ChannelId) -> Result<()> {
        let unread = self.http()?.get_channel_unread(&channel_id).await?;

        if let Some(channel) = self.storage.channel_mut(&channel_id) {
            channel.set_last_read_post(unread.prev_post_id.clone());
        }
        self.notify(ClientNotification::UnreadMarker {
            channel_id: channel_id.clone(),
            post_id: unread.prev_post_id,
        })
        .await;

        self.fetch_channel_posts(channel_id, 0).await
    }

    /// Fetch one history page and reconcile it into the channel.
    pub(crate) async fn fetch_channel_posts(
        &mut self,
        channel_id: ChannelId,
        page: u32,
    ) -> Result<()> {
        let list = self
            .http()?
            .get_channel_posts(&channel_id, page, POSTS_PER_PAGE)
            .await?;

        // re-resolve: the channel may have been erased mid-flight
        let Some(channel) = self.storage.channel_mut(&channel_id) else {
            debug!(channel = %channel_id, "history page for vanished channel dropped");
            return Ok(());
        };

        let missing = channel.reconcile_posts(&list.order, &list.posts);
        debug!(
            channel = %channel_id,
            page,
            new_posts = missing.post_count(),
            "history page reconciled"
        );

        if !missing.is_empty() {
            self.notify(ClientNotification::PostsReconciled {
                channel_id,
                missing,
            })
            .await;
        }
        Ok(())
    }
}
