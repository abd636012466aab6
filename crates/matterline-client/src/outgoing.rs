//! The outgoing post pipeline.
//!
//! `Idle → Composing → Uploading(k/n) → AwaitingEcho → Idle`, with an
//! edit branch when the user recalls one of their own posts. The state
//! machine is synchronous; every transition returns the [`SendAction`] the
//! backend task must run next, so the machinery is testable without a
//! network.
//!
//! Attachments upload strictly one at a time. While a send is outstanding
//! the input stays locked and a 10 s retry timer re-issues the current
//! step unconditionally (at-least-once; the server deduplicates, or the
//! UI shows a duplicate — a known limitation).
//!
//! The echo is not correlated by request id: any incoming post authored by
//! the login user (or the login user's poll post) closes the outstanding
//! send. This breaks down if the same account sends from two clients at
//! once; kept as a documented limitation.

use std::collections::VecDeque;
use std::path::PathBuf;

use tracing::debug;
use uuid::Uuid;

use matterline_shared::models::{
    CommandRequest, NewPollData, NewPostRequest, PostData, PostPatchRequest,
};
use matterline_shared::types::{ChannelId, FileId, PostId, UserId};

/// One step of network work requested by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SendAction {
    UploadFile {
        channel_id: ChannelId,
        path: PathBuf,
    },
    CreatePost(NewPostRequest),
    EditPost {
        post_id: PostId,
        request: PostPatchRequest,
    },
    CreatePoll(CommandRequest),
}

/// Everything belonging to the send currently in flight.
#[derive(Debug)]
struct OutgoingPostData {
    /// Correlates the retries of one send in the logs.
    attempt_id: Uuid,
    channel_id: ChannelId,
    /// Post to be edited; `None` starts a new post.
    edit_target: Option<PostId>,
    poll: Option<NewPollData>,
    message: String,
    root_id: PostId,
    /// Attachment paths still waiting for upload, front first.
    pending_paths: VecDeque<PathBuf>,
    /// Server-issued ids of the attachments uploaded so far.
    uploaded_ids: Vec<FileId>,
    total_files: usize,
}

impl OutgoingPostData {
    /// The next step: the front upload if any file is still pending, the
    /// create/edit/poll request otherwise. The current path stays queued
    /// until its upload confirms, so a retry repeats the same step.
    fn next_action(&self) -> SendAction {
        if let Some(path) = self.pending_paths.front() {
            return SendAction::UploadFile {
                channel_id: self.channel_id.clone(),
                path: path.clone(),
            };
        }

        if let Some(post_id) = &self.edit_target {
            return SendAction::EditPost {
                post_id: post_id.clone(),
                request: PostPatchRequest {
                    message: self.message.clone(),
                    file_ids: self.uploaded_ids.clone(),
                },
            };
        }

        if let Some(poll) = &self.poll {
            return SendAction::CreatePoll(CommandRequest {
                channel_id: self.channel_id.clone(),
                command: poll.to_command(),
            });
        }

        SendAction::CreatePost(NewPostRequest {
            channel_id: self.channel_id.clone(),
            message: self.message.clone(),
            root_id: self.root_id.clone(),
            file_ids: self.uploaded_ids.clone(),
        })
    }
}

#[derive(Debug, Default)]
pub struct OutgoingPostCreator {
    staged_paths: Vec<PathBuf>,
    edit_target: Option<PostId>,
    outgoing: Option<OutgoingPostData>,
    status: String,
}

impl OutgoingPostCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True from the send action until the echo arrives. Input is locked
    /// while this holds.
    pub fn is_waiting_for_server(&self) -> bool {
        self.outgoing.is_some()
    }

    /// Compose status label; empty when there is nothing to show.
    pub fn status_text(&self) -> &str {
        &self.status
    }

    pub fn staged_attachments(&self) -> &[PathBuf] {
        &self.staged_paths
    }

    pub fn edit_target(&self) -> Option<&PostId> {
        self.edit_target.as_ref()
    }

    /// Stage attachments. Refused while a send is outstanding.
    pub fn attach(&mut self, paths: Vec<PathBuf>) -> bool {
        if self.is_waiting_for_server() {
            debug!("cannot attach files while sending a post");
            return false;
        }
        self.staged_paths.extend(paths);
        true
    }

    pub fn detach_all(&mut self) {
        self.staged_paths.clear();
    }

    /// Recall an own post for editing. Refused while a send is outstanding.
    pub fn begin_edit(&mut self, post_id: PostId) -> bool {
        if self.is_waiting_for_server() {
            return false;
        }
        self.edit_target = Some(post_id);
        true
    }

    /// Escape: clears a pending edit selection. Never cancels an in-flight
    /// send.
    pub fn cancel(&mut self) {
        if self.outgoing.is_none() {
            self.edit_target = None;
        }
    }

    /// Fire a send. Returns the first action to run, or `None` when there
    /// is nothing to send (empty message, no attachments) or a send is
    /// already outstanding.
    pub fn send(
        &mut self,
        channel_id: ChannelId,
        message: String,
        root_id: PostId,
    ) -> Option<SendAction> {
        if self.is_waiting_for_server() {
            return None;
        }
        // do not send empty messages
        if message.is_empty() && self.staged_paths.is_empty() {
            return None;
        }

        let pending: VecDeque<PathBuf> = self.staged_paths.drain(..).collect();
        let data = OutgoingPostData {
            attempt_id: Uuid::new_v4(),
            channel_id,
            edit_target: self.edit_target.take(),
            poll: None,
            message,
            root_id,
            total_files: pending.len(),
            pending_paths: pending,
            uploaded_ids: Vec::new(),
        };

        debug!(attempt = %data.attempt_id, files = data.total_files, "sending post");
        self.status = "Sending message...".into();
        let action = data.next_action();
        self.outgoing = Some(data);
        Some(action)
    }

    /// Fire a poll creation. Same lifecycle as a post; the echo is the
    /// poll bot's post carrying matterpoll properties.
    pub fn send_poll(&mut self, channel_id: ChannelId, poll: NewPollData) -> Option<SendAction> {
        if self.is_waiting_for_server() {
            return None;
        }

        let data = OutgoingPostData {
            attempt_id: Uuid::new_v4(),
            channel_id,
            edit_target: None,
            poll: Some(poll),
            message: String::new(),
            root_id: PostId::default(),
            pending_paths: VecDeque::new(),
            uploaded_ids: Vec::new(),
            total_files: 0,
        };

        debug!(attempt = %data.attempt_id, "sending poll");
        self.status = "Sending message...".into();
        let action = data.next_action();
        self.outgoing = Some(data);
        Some(action)
    }

    /// One attachment finished uploading; move to the next step.
    pub fn file_uploaded(&mut self, file_id: FileId) -> Option<SendAction> {
        let outgoing = self.outgoing.as_mut()?;

        outgoing.pending_paths.pop_front();
        outgoing.uploaded_ids.push(file_id);
        self.status = format!(
            "Attached file {} of {}",
            outgoing.uploaded_ids.len(),
            outgoing.total_files
        );

        Some(outgoing.next_action())
    }

    /// The current attachment could not be read or uploaded; skip it and
    /// continue with the remaining ones.
    pub fn upload_failed(&mut self) -> Option<SendAction> {
        let outgoing = self.outgoing.as_mut()?;

        outgoing.pending_paths.pop_front();
        outgoing.total_files = outgoing.total_files.saturating_sub(1);

        Some(outgoing.next_action())
    }

    /// The retry timer fired with no echo yet: re-issue the current step.
    pub fn retry_tick(&mut self) -> Option<SendAction> {
        let outgoing = self.outgoing.as_ref()?;
        debug!(attempt = %outgoing.attempt_id, "post send retry");
        Some(outgoing.next_action())
    }

    /// An incoming post event. Any post authored by the login user — or
    /// the login user's poll — closes the outstanding send and unlocks
    /// compose.
    pub fn post_received(&mut self, post: &PostData, login_user: &UserId) -> bool {
        let Some(outgoing) = &self.outgoing else {
            return false;
        };

        let own_post = !login_user.is_empty() && post.user_id == *login_user;
        let own_poll = outgoing.poll.is_some() && post.is_poll();
        if !own_post && !own_poll {
            return false;
        }

        debug!(attempt = %outgoing.attempt_id, post = %post.id, "send confirmed by echo");
        self.outgoing = None;
        self.staged_paths.clear();
        self.status.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator() -> OutgoingPostCreator {
        OutgoingPostCreator::new()
    }

    fn channel() -> ChannelId {
        ChannelId::new("c1")
    }

    fn echo_post(author: &str) -> PostData {
        PostData {
            id: PostId::new("p-echo"),
            channel_id: channel(),
            user_id: UserId::new(author),
            message: "hello".into(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_message_without_attachments_is_not_sent() {
        let mut pipeline = creator();
        assert!(pipeline.send(channel(), String::new(), PostId::default()).is_none());
        assert!(!pipeline.is_waiting_for_server());
    }

    #[test]
    fn plain_send_issues_create_immediately() {
        let mut pipeline = creator();

        let action = pipeline.send(channel(), "hello".into(), PostId::default());

        match action {
            Some(SendAction::CreatePost(request)) => {
                assert_eq!(request.channel_id, channel());
                assert_eq!(request.message, "hello");
                assert!(request.file_ids.is_empty());
            }
            other => panic!("expected CreatePost, got {other:?}"),
        }
        assert!(pipeline.is_waiting_for_server());
        assert_eq!(pipeline.status_text(), "Sending message...");
    }

    #[test]
    fn second_send_is_locked_out_until_echo() {
        let mut pipeline = creator();
        pipeline.send(channel(), "one".into(), PostId::default());

        assert!(pipeline.send(channel(), "two".into(), PostId::default()).is_none());
        assert!(!pipeline.attach(vec![PathBuf::from("x.png")]));
        assert!(!pipeline.begin_edit(PostId::new("p1")));
    }

    #[test]
    fn echo_from_login_user_closes_the_send() {
        let mut pipeline = creator();
        pipeline.send(channel(), "hello".into(), PostId::default());

        // someone else's post is not the echo
        assert!(!pipeline.post_received(&echo_post("other"), &UserId::new("me")));
        assert!(pipeline.is_waiting_for_server());

        assert!(pipeline.post_received(&echo_post("me"), &UserId::new("me")));
        assert!(!pipeline.is_waiting_for_server());
        assert!(pipeline.status_text().is_empty());
        assert!(pipeline.staged_attachments().is_empty());
        // the pipeline is usable again
        assert!(pipeline.send(channel(), "next".into(), PostId::default()).is_some());
    }

    #[test]
    fn retry_reissues_the_request_until_the_echo_arrives() {
        let mut pipeline = creator();
        let first = pipeline.send(channel(), "hello".into(), PostId::default()).unwrap();

        let retry = pipeline.retry_tick().unwrap();
        assert_eq!(retry, first);
        let retry = pipeline.retry_tick().unwrap();
        assert_eq!(retry, first);

        pipeline.post_received(&echo_post("me"), &UserId::new("me"));
        assert!(pipeline.retry_tick().is_none());
    }

    #[test]
    fn attachments_upload_sequentially_then_send_carries_their_ids() {
        let mut pipeline = creator();
        assert!(pipeline.attach(vec![PathBuf::from("a.png"), PathBuf::from("b.pdf")]));

        let action = pipeline.send(channel(), "with files".into(), PostId::default());
        match action {
            Some(SendAction::UploadFile { path, .. }) => {
                assert_eq!(path, PathBuf::from("a.png"));
            }
            other => panic!("expected UploadFile, got {other:?}"),
        }

        let action = pipeline.file_uploaded(FileId::new("f-a"));
        assert_eq!(pipeline.status_text(), "Attached file 1 of 2");
        match action {
            Some(SendAction::UploadFile { path, .. }) => {
                assert_eq!(path, PathBuf::from("b.pdf"));
            }
            other => panic!("expected UploadFile, got {other:?}"),
        }

        let action = pipeline.file_uploaded(FileId::new("f-b"));
        assert_eq!(pipeline.status_text(), "Attached file 2 of 2");
        match action {
            Some(SendAction::CreatePost(request)) => {
                assert_eq!(
                    request.file_ids,
                    vec![FileId::new("f-a"), FileId::new("f-b")]
                );
            }
            other => panic!("expected CreatePost, got {other:?}"),
        }
    }

    #[test]
    fn attachment_only_send_is_allowed() {
        let mut pipeline = creator();
        pipeline.attach(vec![PathBuf::from("a.png")]);

        let action = pipeline.send(channel(), String::new(), PostId::default());
        assert!(matches!(action, Some(SendAction::UploadFile { .. })));
    }

    #[test]
    fn failed_upload_skips_the_file_and_continues() {
        let mut pipeline = creator();
        pipeline.attach(vec![PathBuf::from("bad.bin"), PathBuf::from("good.txt")]);
        pipeline.send(channel(), "msg".into(), PostId::default());

        let action = pipeline.upload_failed();
        match action {
            Some(SendAction::UploadFile { path, .. }) => {
                assert_eq!(path, PathBuf::from("good.txt"));
            }
            other => panic!("expected UploadFile, got {other:?}"),
        }

        let action = pipeline.file_uploaded(FileId::new("f-good"));
        match action {
            Some(SendAction::CreatePost(request)) => {
                assert_eq!(request.file_ids, vec![FileId::new("f-good")]);
            }
            other => panic!("expected CreatePost, got {other:?}"),
        }
    }

    #[test]
    fn retry_during_upload_repeats_the_current_file() {
        let mut pipeline = creator();
        pipeline.attach(vec![PathBuf::from("a.png")]);
        pipeline.send(channel(), "msg".into(), PostId::default());

        match pipeline.retry_tick() {
            Some(SendAction::UploadFile { path, .. }) => {
                assert_eq!(path, PathBuf::from("a.png"));
            }
            other => panic!("expected UploadFile, got {other:?}"),
        }
    }

    #[test]
    fn edit_flow_patches_the_recalled_post() {
        let mut pipeline = creator();
        assert!(pipeline.begin_edit(PostId::new("p7")));

        let action = pipeline.send(channel(), "fixed typo".into(), PostId::default());
        match action {
            Some(SendAction::EditPost { post_id, request }) => {
                assert_eq!(post_id, PostId::new("p7"));
                assert_eq!(request.message, "fixed typo");
            }
            other => panic!("expected EditPost, got {other:?}"),
        }

        pipeline.post_received(&echo_post("me"), &UserId::new("me"));
        // the edit target does not leak into the next send
        let action = pipeline.send(channel(), "fresh".into(), PostId::default());
        assert!(matches!(action, Some(SendAction::CreatePost(_))));
    }

    #[test]
    fn escape_clears_edit_selection_only_while_idle() {
        let mut pipeline = creator();
        pipeline.begin_edit(PostId::new("p7"));
        pipeline.cancel();
        assert!(pipeline.edit_target().is_none());

        pipeline.begin_edit(PostId::new("p8"));
        pipeline.send(channel(), "editing".into(), PostId::default());
        pipeline.cancel();
        // in-flight send unaffected
        assert!(pipeline.is_waiting_for_server());
    }

    #[test]
    fn poll_send_and_poll_echo() {
        let mut pipeline = creator();
        let poll = NewPollData {
            question: "Lunch?".into(),
            options: vec!["Yes".into()],
            ..Default::default()
        };

        let action = pipeline.send_poll(channel(), poll);
        match action {
            Some(SendAction::CreatePoll(request)) => {
                assert!(request.command.starts_with("/poll \"Lunch?\""));
            }
            other => panic!("expected CreatePoll, got {other:?}"),
        }

        // the poll bot authors the echo, not the login user
        let mut bot_post = echo_post("poll-bot");
        bot_post.props = serde_json::json!({"poll_id": "xyz"});
        assert!(pipeline.post_received(&bot_post, &UserId::new("me")));
        assert!(!pipeline.is_waiting_for_server());
    }

    #[test]
    fn unrelated_posts_do_not_close_an_idle_pipeline() {
        let mut pipeline = creator();
        assert!(!pipeline.post_received(&echo_post("me"), &UserId::new("me")));
    }
}
