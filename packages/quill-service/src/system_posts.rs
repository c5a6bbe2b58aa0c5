use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{QuillService, Result};
use quill_storage::models::{POST_TYPE_JOIN_LEAVE, Post, User};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
	Joined,
	Left,
}
impl MembershipChange {
	fn message(self, username: &str) -> String {
		match self {
			Self::Joined => format!("{username} joined the channel."),
			Self::Left => format!("{username} left the channel."),
		}
	}
}

impl QuillService {
	/// Records a join or leave notice in the background. The caller never waits for the write, so
	/// readers may observe the post with a delay.
	pub fn spawn_membership_post(
		self: &Arc<Self>,
		user: &User,
		channel_id: Uuid,
		change: MembershipChange,
	) -> JoinHandle<()> {
		let service = Arc::clone(self);
		let user = user.clone();

		tokio::spawn(async move {
			match service.insert_membership_post(&user, channel_id, change).await {
				Ok(post) => tracing::info!(
					post_id = %post.post_id,
					%channel_id,
					user_id = %user.user_id,
					?change,
					"Membership post recorded."
				),
				Err(err) => tracing::warn!(
					error = %err,
					%channel_id,
					user_id = %user.user_id,
					?change,
					"Failed to record membership post."
				),
			}
		})
	}

	async fn insert_membership_post(
		&self,
		user: &User,
		channel_id: Uuid,
		change: MembershipChange,
	) -> Result<Post> {
		let now = self.clock.tick();
		let message = change.message(&user.username);
		let post = Post {
			post_id: quill_domain::id::new_id(),
			create_at: now,
			update_at: now,
			edit_at: 0,
			delete_at: 0,
			user_id: user.user_id,
			channel_id,
			root_id: None,
			parent_id: None,
			hashtags: quill_domain::hashtag::render(&message),
			message,
			file_ids: Vec::new(),
			post_type: POST_TYPE_JOIN_LEAVE.to_string(),
		};

		self.backends.posts.insert_post(&post).await?;

		Ok(post)
	}
}
