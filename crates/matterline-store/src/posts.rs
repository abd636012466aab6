//! Post operations on a channel: single-post mutations driven by the event
//! dispatcher, and the gap reconciler that merges paginated history fetches
//! into the local sequence.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

use matterline_shared::models::PostData;
use matterline_shared::types::{ChannelId, FileId, PostId};

use crate::models::{Channel, Post};
use crate::storage::Storage;

/// A contiguous run of posts that the server has and the local sequence did
/// not, anchored to the neighbouring post that was already present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingPostSequence {
    /// Insert the run after this post; empty means "at the very front".
    pub previous_post_id: PostId,
    /// Newly inserted posts, oldest to newest.
    pub post_ids: Vec<PostId>,
}

/// All missing-post runs produced by one reconciliation pass. The UI splices
/// each run in as one contiguous block, adding its own separators.
#[derive(Debug, Clone, Default)]
pub struct MissingPosts {
    pub sequences: Vec<MissingPostSequence>,
}

impl MissingPosts {
    fn add_sequence(&mut self, sequence: MissingPostSequence) {
        // do not record empty sequences
        if sequence.post_ids.is_empty() {
            return;
        }
        self.sequences.push(sequence);
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn post_count(&self) -> usize {
        self.sequences.iter().map(|s| s.post_ids.len()).sum()
    }
}

impl Channel {
    /// Append a post arriving from the event stream. Duplicate ids (the
    /// stream is at-least-once) are ignored.
    pub fn append_post(&mut self, data: &PostData) -> Option<&Post> {
        if self.post_ids.contains(&data.id) {
            return None;
        }

        let post = Post::from_data(data);
        self.last_post_at = self.last_post_at.max(post.create_at);
        self.post_ids.insert(post.id.clone());
        self.posts.push(post);
        self.posts.last()
    }

    /// Update an edited post's text in place. Unknown id: no-op.
    pub fn edit_post(&mut self, data: &PostData) -> bool {
        let Some(post) = self.posts.iter_mut().find(|p| p.id == data.id) else {
            return false;
        };

        post.message = data.message.clone();
        post.update_at = data.update_at;
        post.edit_at = data.edit_at;
        post.props = data.props.clone();
        true
    }

    /// Mark a post as deleted. The record stays in the sequence so the UI
    /// can render a tombstone in place.
    pub fn tombstone_post(&mut self, post_id: &PostId) -> bool {
        let Some(post) = self.posts.iter_mut().find(|p| &p.id == post_id) else {
            return false;
        };
        post.deleted = true;
        true
    }

    /// Record the unread marker fetched at channel-open time.
    pub fn set_last_read_post(&mut self, post_id: PostId) {
        self.last_read_post_id = post_id;
    }

    /// Mark everything read, i.e. move the unread marker to the newest post.
    pub fn clear_unread(&mut self) {
        self.last_read_post_id = self
            .posts
            .last()
            .map(|p| p.id.clone())
            .unwrap_or_default();
    }

    /// Cache fetched contents on the post attachment that owns the file.
    pub fn set_file_contents(&mut self, file_id: &FileId, contents: Bytes) -> bool {
        for post in self.posts.iter_mut().rev() {
            if let Some(file) = post.files.iter_mut().find(|f| &f.id == file_id) {
                file.contents = Some(contents);
                return true;
            }
        }
        false
    }

    /// Merge one fetched history page into the local sequence.
    ///
    /// `order` is newest-first, as the paginated API returns it; `posts`
    /// maps each listed id to its body. The local sequence is walked from
    /// its newest end in lock-step with `order`:
    ///
    /// - the id at the cursor matches: the post is already present
    ///   (tombstoned ones included), close out the accumulated run and step
    ///   both sides;
    /// - the local sequence is exhausted: everything still listed is
    ///   missing and goes to the front;
    /// - otherwise the post is missing and is spliced in just above the
    ///   cursor. A fetch window lying entirely below the newest local posts
    ///   (pages completing out of order) first skips the local posts newer
    ///   than the incoming one.
    ///
    /// Existing posts are never removed or reordered, and reconciling the
    /// same page twice yields no sequences the second time.
    pub fn reconcile_posts(
        &mut self,
        order: &[PostId],
        posts: &HashMap<PostId, PostData>,
    ) -> MissingPosts {
        let mut missing = MissingPosts::default();
        // run being accumulated; filled front-first since we walk newest
        // to oldest
        let mut pending: VecDeque<PostId> = VecDeque::new();
        // index of the local post the walk is at; -1 = exhausted
        let mut cursor: isize = self.posts.len() as isize - 1;

        for fetched_id in order {
            // already present at the cursor
            if cursor >= 0 && self.posts[cursor as usize].id == *fetched_id {
                Self::close_run(&mut missing, &mut pending, fetched_id.clone());
                cursor -= 1;
                continue;
            }

            // present elsewhere in the sequence: an out-of-order replay.
            // Treat as present and continue the walk below the known copy.
            if self.post_ids.contains(fetched_id) {
                Self::close_run(&mut missing, &mut pending, fetched_id.clone());
                if let Some(pos) = self.posts.iter().rposition(|p| &p.id == fetched_id) {
                    cursor = pos as isize - 1;
                }
                continue;
            }

            // a listed id without a body cannot be materialized
            let Some(body) = posts.get(fetched_id) else {
                continue;
            };

            // window skip: this page is older than where the cursor stands
            if cursor >= 0 && self.posts[cursor as usize].create_at > body.create_at {
                let anchor = self.posts[cursor as usize].id.clone();
                Self::close_run(&mut missing, &mut pending, anchor);
                while cursor >= 0 && self.posts[cursor as usize].create_at > body.create_at {
                    cursor -= 1;
                }
            }

            let post = Post::from_data(body);
            self.last_post_at = self.last_post_at.max(post.create_at);
            self.post_ids.insert(post.id.clone());
            self.posts.insert((cursor + 1) as usize, post);
            pending.push_front(fetched_id.clone());
        }

        let final_anchor = if cursor >= 0 {
            self.posts[cursor as usize].id.clone()
        } else {
            PostId::default()
        };
        Self::close_run(&mut missing, &mut pending, final_anchor);

        missing
    }

    fn close_run(missing: &mut MissingPosts, pending: &mut VecDeque<PostId>, anchor: PostId) {
        if pending.is_empty() {
            return;
        }
        missing.add_sequence(MissingPostSequence {
            previous_post_id: anchor,
            post_ids: pending.drain(..).collect(),
        });
    }
}

impl Storage {
    /// Cache file contents on the owning channel, if both still exist.
    pub fn cache_file_contents(
        &mut self,
        channel_id: &ChannelId,
        file_id: &FileId,
        contents: Bytes,
    ) -> bool {
        match self.channel_mut(channel_id) {
            Some(channel) => channel.set_file_contents(file_id, contents),
            None => false,
        }
    }
}
