//! The backend task: one tokio task owning the entity store.
//!
//! External code talks to the backend over a typed command channel and
//! listens on a notification channel; every store mutation happens inside
//! this task, strictly sequentially, so the store needs no locking and its
//! invariants hold at every observation point.
//!
//! Completion handlers always re-resolve entities by id against the store:
//! a channel or team captured when a request was issued may have been
//! erased by the time the response arrives, and "not found" is a normal,
//! silently-ignored outcome.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use matterline_net::{HttpClient, SocketCommand, SocketNotification};
use matterline_shared::constants::SEND_RETRY_INTERVAL;
use matterline_shared::events::ServerEvent;
use matterline_shared::models::{LoginRequest, NewPollData};
use matterline_shared::types::{ChannelId, FileId, PostId, UserId};
use matterline_store::Storage;

use crate::dispatcher::{dispatch, FollowUp};
use crate::error::{ClientError, Result};
use crate::notify::ClientNotification;
use crate::outgoing::{OutgoingPostCreator, SendAction};
use crate::settings::LoginSettings;

/// Commands sent *into* the backend task.
#[derive(Debug)]
pub enum BackendCommand {
    Login {
        domain: String,
        username: String,
        password: String,
    },
    Logout,
    /// Fetch the unread marker and the newest history page of a channel.
    OpenChannel { channel_id: ChannelId },
    /// Fetch an older history page (page 0 is the newest).
    FetchOlderPosts { channel_id: ChannelId, page: u32 },
    /// Tell the server the channel was read; the confirmation arrives as
    /// a `channel_viewed` event.
    MarkChannelViewed { channel_id: ChannelId },
    Attach { paths: Vec<PathBuf> },
    BeginEdit { post_id: PostId },
    CancelEdit,
    Send {
        channel_id: ChannelId,
        message: String,
        root_id: PostId,
    },
    SendPoll {
        channel_id: ChannelId,
        poll: NewPollData,
    },
    FetchAvatar { user_id: UserId },
    FetchFile {
        channel_id: ChannelId,
        file_id: FileId,
    },
    Shutdown,
}

pub struct Backend;

impl Backend {
    /// Spawn the backend task.
    ///
    /// Returns the command sender and the notification receiver. The task
    /// terminates on `Shutdown` or when every command sender is dropped.
    pub fn spawn(
        settings: LoginSettings,
    ) -> (
        mpsc::Sender<BackendCommand>,
        mpsc::Receiver<ClientNotification>,
    ) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<BackendCommand>(64);
        let (notif_tx, notif_rx) = mpsc::channel::<ClientNotification>(256);

        tokio::spawn(async move {
            let mut task = BackendTask::new(settings, notif_tx);
            let mut socket_rx: Option<mpsc::Receiver<SocketNotification>> = None;

            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(BackendCommand::Shutdown) | None => break,
                            Some(cmd) => {
                                if let Some(rx) = task.handle_command(cmd).await {
                                    socket_rx = Some(rx);
                                }
                            }
                        }
                    }

                    notif = maybe_recv(&mut socket_rx) => {
                        match notif {
                            Some(SocketNotification::Connected) => {
                                debug!("event socket ready");
                            }
                            Some(SocketNotification::Event(event)) => {
                                task.handle_event(event).await;
                            }
                            Some(SocketNotification::Disconnected) | None => {
                                socket_rx = None;
                                task.notify(ClientNotification::ConnectionLost).await;
                            }
                        }
                    }

                    _ = maybe_sleep(task.retry_at) => {
                        task.handle_retry().await;
                    }
                }

                // a 401 seen anywhere above queues a re-login here, off the
                // failing call path and behind a fixed backoff
                if task.needs_relogin {
                    task.needs_relogin = false;
                    if let Some(rx) = task.relogin().await {
                        socket_rx = Some(rx);
                    }
                }
            }

            task.close_socket().await;
            info!("backend task terminated");
        });

        (cmd_tx, notif_rx)
    }
}

async fn maybe_recv(
    rx: &mut Option<mpsc::Receiver<SocketNotification>>,
) -> Option<SocketNotification> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn maybe_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// State owned by the backend task.
pub(crate) struct BackendTask {
    pub(crate) storage: Storage,
    pub(crate) http: Option<HttpClient>,
    pub(crate) settings: LoginSettings,
    /// Kept for the silent re-login after a session expiry.
    pub(crate) credentials: Option<LoginRequest>,
    pub(crate) pipeline: OutgoingPostCreator,
    pub(crate) socket_cmd: Option<mpsc::Sender<SocketCommand>>,
    pub(crate) notif_tx: mpsc::Sender<ClientNotification>,
    pub(crate) is_logged_in: bool,
    pub(crate) needs_relogin: bool,
    /// Next firing of the outgoing-post retry timer.
    pub(crate) retry_at: Option<Instant>,
}

impl BackendTask {
    fn new(settings: LoginSettings, notif_tx: mpsc::Sender<ClientNotification>) -> Self {
        Self {
            storage: Storage::new(),
            http: None,
            settings,
            credentials: None,
            pipeline: OutgoingPostCreator::new(),
            socket_cmd: None,
            notif_tx,
            is_logged_in: false,
            needs_relogin: false,
            retry_at: None,
        }
    }

    pub(crate) fn http(&self) -> Result<&HttpClient> {
        self.http.as_ref().ok_or(ClientError::NotLoggedIn)
    }

    pub(crate) async fn notify(&self, notification: ClientNotification) {
        let _ = self.notif_tx.send(notification).await;
    }

    pub(crate) async fn close_socket(&mut self) {
        if let Some(cmd) = self.socket_cmd.take() {
            let _ = cmd.send(SocketCommand::Close).await;
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Run one command. Returns a socket receiver when the command opened
    /// a fresh event socket (login).
    async fn handle_command(
        &mut self,
        command: BackendCommand,
    ) -> Option<mpsc::Receiver<SocketNotification>> {
        match command {
            BackendCommand::Login {
                domain,
                username,
                password,
            } => match self.login(domain, username, password).await {
                Ok(socket_rx) => return Some(socket_rx),
                Err(error) => self.report_error(error).await,
            },

            BackendCommand::Logout => self.logout().await,

            BackendCommand::OpenChannel { channel_id } => {
                if let Err(error) = self.open_channel(channel_id).await {
                    self.report_error(error).await;
                }
            }

            BackendCommand::FetchOlderPosts { channel_id, page } => {
                if let Err(error) = self.fetch_channel_posts(channel_id, page).await {
                    self.report_error(error).await;
                }
            }

            BackendCommand::MarkChannelViewed { channel_id } => {
                let result = match self.http() {
                    Ok(http) => http.view_channel(&channel_id).await.map_err(Into::into),
                    Err(error) => Err(error),
                };
                if let Err(error) = result {
                    self.report_error(error).await;
                }
            }

            BackendCommand::Attach { paths } => {
                self.pipeline.attach(paths);
            }

            BackendCommand::BeginEdit { post_id } => {
                self.pipeline.begin_edit(post_id);
            }

            BackendCommand::CancelEdit => self.pipeline.cancel(),

            BackendCommand::Send {
                channel_id,
                message,
                root_id,
            } => {
                if let Some(action) = self.pipeline.send(channel_id, message, root_id) {
                    self.arm_retry();
                    self.send_status().await;
                    self.run_send_action(action).await;
                }
            }

            BackendCommand::SendPoll { channel_id, poll } => {
                if let Some(action) = self.pipeline.send_poll(channel_id, poll) {
                    self.arm_retry();
                    self.send_status().await;
                    self.run_send_action(action).await;
                }
            }

            BackendCommand::FetchAvatar { user_id } => {
                if let Err(error) = self.fetch_avatar(user_id).await {
                    self.report_error(error).await;
                }
            }

            BackendCommand::FetchFile {
                channel_id,
                file_id,
            } => {
                if let Err(error) = self.fetch_file(channel_id, file_id).await {
                    self.report_error(error).await;
                }
            }

            // consumed by the select loop
            BackendCommand::Shutdown => {}
        }

        None
    }

    // ------------------------------------------------------------------
    // Real-time events
    // ------------------------------------------------------------------

    pub(crate) async fn handle_event(&mut self, event: ServerEvent) {
        // the echo check runs regardless of whether the channel is known;
        // the send must unlock even if the target channel vanished
        if let ServerEvent::Posted { post, .. } = &event {
            let login_user = self.storage.login_user_id().clone();
            if self.pipeline.post_received(post, &login_user) {
                self.retry_at = None;
                self.send_status().await;
            }
        }

        let outcome = dispatch(&mut self.storage, event);
        for notification in outcome.notifications {
            self.notify(notification).await;
        }
        for follow_up in outcome.follow_ups {
            if let Err(error) = self.run_follow_up(follow_up).await {
                self.report_error(error).await;
            }
        }
    }

    async fn run_follow_up(&mut self, follow_up: FollowUp) -> Result<()> {
        match follow_up {
            FollowUp::FetchChannel {
                team_id,
                channel_id,
            } => {
                let data = self.http()?.get_channel(&channel_id).await?;
                // the team is re-resolved by id; it may be gone by now
                if self.storage.upsert_channel(&team_id, &data).is_some() {
                    self.notify(ClientNotification::ChannelAdded {
                        team_id,
                        channel_id,
                    })
                    .await;
                }
            }

            FollowUp::FetchTeam { team_id } => {
                let data = self.http()?.get_team(&team_id).await?;
                self.storage.upsert_team(&data);
                self.populate_team(&team_id).await?;
                self.notify(ClientNotification::AddedToTeam { team_id }).await;
            }

            FollowUp::FetchUser { user_id } => {
                let profile = self.http()?.get_user(&user_id).await?;
                self.storage.upsert_user(&profile, false);
            }

            FollowUp::FetchFile {
                channel_id,
                file_id,
            } => {
                self.fetch_file(channel_id, file_id).await?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Outgoing pipeline plumbing
    // ------------------------------------------------------------------

    fn arm_retry(&mut self) {
        self.retry_at = Some(Instant::now() + SEND_RETRY_INTERVAL);
    }

    async fn send_status(&self) {
        self.notify(ClientNotification::SendStatus {
            text: self.pipeline.status_text().to_owned(),
        })
        .await;
    }

    async fn handle_retry(&mut self) {
        match self.pipeline.retry_tick() {
            Some(action) => {
                self.arm_retry();
                self.run_send_action(action).await;
            }
            None => self.retry_at = None,
        }
    }

    /// Run pipeline actions until it hands control back (an upload chain
    /// runs to the final create/edit request in one go).
    async fn run_send_action(&mut self, action: SendAction) {
        let mut next = Some(action);

        while let Some(action) = next.take() {
            match action {
                SendAction::UploadFile { channel_id, path } => {
                    let bytes = match tokio::fs::read(&path).await {
                        Ok(bytes) => Bytes::from(bytes),
                        Err(error) => {
                            warn!(path = %path.display(), %error, "cannot read attachment");
                            self.notify(ClientNotification::AttachmentFailed {
                                path: path.display().to_string(),
                            })
                            .await;
                            next = self.pipeline.upload_failed();
                            continue;
                        }
                    };

                    let filename = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "attachment".to_owned());

                    let uploaded = match self.http() {
                        Ok(http) => http.upload_file(&channel_id, &filename, bytes).await,
                        Err(error) => {
                            self.report_error(error).await;
                            return;
                        }
                    };

                    match uploaded {
                        Ok(response) => {
                            let file_id = response
                                .file_infos
                                .first()
                                .map(|f| f.id.clone())
                                .unwrap_or_default();
                            next = self.pipeline.file_uploaded(file_id);
                            self.send_status().await;
                        }
                        Err(error) => {
                            // leave the file queued; the retry timer will
                            // re-issue this step
                            self.report_error(error.into()).await;
                        }
                    }
                }

                SendAction::CreatePost(request) => {
                    // the response body is not consumed; the authoritative
                    // copy arrives as the echo on the event socket
                    let result = match self.http() {
                        Ok(http) => http.create_post(&request).await.map(|_| ()),
                        Err(error) => {
                            self.report_error(error).await;
                            return;
                        }
                    };
                    if let Err(error) = result {
                        self.report_error(error.into()).await;
                    }
                }

                SendAction::EditPost { post_id, request } => {
                    let result = match self.http() {
                        Ok(http) => http.patch_post(&post_id, &request).await.map(|_| ()),
                        Err(error) => {
                            self.report_error(error).await;
                            return;
                        }
                    };
                    if let Err(error) = result {
                        self.report_error(error.into()).await;
                    }
                }

                SendAction::CreatePoll(request) => {
                    let result = match self.http() {
                        Ok(http) => http.execute_command(&request).await,
                        Err(error) => {
                            self.report_error(error).await;
                            return;
                        }
                    };
                    if let Err(error) = result {
                        self.report_error(error.into()).await;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Small fetches
    // ------------------------------------------------------------------

    async fn fetch_avatar(&mut self, user_id: UserId) -> Result<()> {
        let avatar = self.http()?.get_user_image(&user_id).await?;
        // silently dropped if the user record is gone
        self.storage.set_avatar(&user_id, avatar);
        if self.storage.user(&user_id).is_some() {
            self.notify(ClientNotification::AvatarLoaded { user_id }).await;
        }
        Ok(())
    }

    async fn fetch_file(&mut self, channel_id: ChannelId, file_id: FileId) -> Result<()> {
        let contents = self.http()?.get_file(&file_id).await?;
        if self
            .storage
            .cache_file_contents(&channel_id, &file_id, contents)
        {
            self.notify(ClientNotification::FileLoaded {
                channel_id,
                file_id,
            })
            .await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Error funnel
    // ------------------------------------------------------------------

    pub(crate) async fn report_error(&mut self, error: ClientError) {
        if error.is_unauthorized() && self.is_logged_in {
            // expired session: queue the re-login instead of surfacing
            info!("session expired, re-login queued");
            self.needs_relogin = true;
            return;
        }

        match &error {
            ClientError::Net(matterline_net::NetError::Status { status, body }) => {
                self.notify(ClientNotification::HttpError {
                    status: *status,
                    body: body.clone(),
                })
                .await;
            }
            ClientError::Net(_) => {
                self.notify(ClientNotification::ConnectionLost).await;
            }
            other => {
                warn!(error = %other, "backend operation failed");
            }
        }
    }
}
