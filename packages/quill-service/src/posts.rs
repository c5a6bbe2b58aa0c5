use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	Actor, Caller, Conditional, Error, QuillService, Result, TeamRole,
	access::{optional_id, require_id},
	etag,
};
use quill_config::{DeletePolicy, EditPolicy};
use quill_storage::models::{Channel, POST_TYPE_NORMAL, Post, SYSTEM_POST_TYPE_PREFIX};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreatePostRequest {
	pub channel_id: String,
	#[serde(default)]
	pub message: String,
	#[serde(default)]
	pub root_id: Option<String>,
	#[serde(default)]
	pub parent_id: Option<String>,
	#[serde(default)]
	pub file_ids: Vec<String>,
	/// Empty for regular posts, or a `system_*` kind. System posts cannot be edited afterwards.
	#[serde(default, rename = "type")]
	pub post_type: String,
	/// Honored for system administrators only; zero or negative means "now".
	#[serde(default)]
	pub create_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdatePostRequest {
	pub message: String,
}

struct ThreadLink {
	root_id: Option<Uuid>,
	parent_id: Option<Uuid>,
}

impl QuillService {
	pub async fn create_post(&self, caller: &Caller, req: CreatePostRequest) -> Result<Post> {
		let actor = caller.actor()?;
		let channel_id = require_id(&req.channel_id, "channel_id")?;
		let root_id = optional_id(req.root_id.as_deref(), "root_id")?;
		let parent_id = optional_id(req.parent_id.as_deref(), "parent_id")?;
		let mut file_ids = Vec::with_capacity(req.file_ids.len());

		for raw in &req.file_ids {
			let file_id = require_id(raw, "file_id")?;

			if !file_ids.contains(&file_id) {
				file_ids.push(file_id);
			}
		}

		require_message(&req.message, !file_ids.is_empty())?;

		let channel = self.authorize_channel(actor, channel_id).await?;

		self.check_message_length(&req.message)?;

		if file_ids.len() > self.cfg.posts.max_file_ids as usize {
			return Err(Error::invalid(format!(
				"A post may carry at most {} files.",
				self.cfg.posts.max_file_ids
			)));
		}
		if req.post_type != POST_TYPE_NORMAL && !req.post_type.starts_with(SYSTEM_POST_TYPE_PREFIX) {
			return Err(Error::invalid("Post type is not allowed."));
		}

		let link = self.resolve_thread_link(&channel, root_id, parent_id).await?;
		let claimable = self.backends.files.claimable_files(actor.user_id, &file_ids).await?;

		if claimable.len() != file_ids.len() {
			tracing::warn!(
				channel_id = %channel_id,
				requested = file_ids.len(),
				claimable = claimable.len(),
				"Dropping files the author cannot attach."
			);

			file_ids.retain(|file_id| claimable.contains(file_id));
			require_message(&req.message, !file_ids.is_empty())?;
		}

		let now = self.clock.tick();
		let create_at = if actor.system_admin && req.create_at > 0 { req.create_at } else { now };
		let post = Post {
			post_id: quill_domain::id::new_id(),
			create_at,
			update_at: now,
			edit_at: 0,
			delete_at: 0,
			user_id: actor.user_id,
			channel_id,
			root_id: link.root_id,
			parent_id: link.parent_id,
			hashtags: quill_domain::hashtag::render(&req.message),
			message: req.message,
			file_ids,
			post_type: req.post_type,
		};

		self.backends.posts.insert_post(&post).await?;

		if !post.file_ids.is_empty() {
			let attached =
				self.backends.files.attach_files(post.post_id, actor.user_id, &post.file_ids).await?;

			if attached != post.file_ids.len() as u64 {
				tracing::warn!(
					post_id = %post.post_id,
					requested = post.file_ids.len(),
					attached,
					"Some files could not be attached to the post."
				);
			}
		}

		tracing::info!(
			post_id = %post.post_id,
			channel_id = %post.channel_id,
			root_id = ?post.root_id,
			"Post created."
		);

		Ok(post)
	}

	/// Replaces the message of a post and re-derives its hashtags.
	pub async fn update_post(
		&self,
		caller: &Caller,
		post_id: &str,
		req: UpdatePostRequest,
	) -> Result<Post> {
		let actor = caller.actor()?;
		let post_id = require_id(post_id, "post_id")?;

		require_message(&req.message, false)?;

		let (mut post, _) = self.readable_post(actor, post_id).await?;

		if post.is_deleted() {
			return Err(Error::not_found("Post not found."));
		}
		if !actor.system_admin && post.user_id != actor.user_id {
			return Err(Error::denied("Only the author may edit this post."));
		}
		if post.is_system() {
			return Err(Error::invalid("System posts cannot be edited."));
		}

		let now = self.clock.tick();

		if !actor.system_admin {
			self.check_edit_policy(&post, now)?;
		}

		self.check_message_length(&req.message)?;

		post.hashtags = quill_domain::hashtag::render(&req.message);
		post.message = req.message;
		post.edit_at = now;
		post.update_at = now;

		if !self.backends.posts.update_post(&post).await? {
			return Err(Error::not_found("Post not found."));
		}

		tracing::info!(post_id = %post.post_id, "Post updated.");

		Ok(post)
	}

	/// Tombstones a single post. Replies stay addressable.
	pub async fn delete_post(&self, caller: &Caller, post_id: &str) -> Result<()> {
		let actor = caller.actor()?;

		if post_id.trim().is_empty() {
			return Err(Error::not_found("Post not found."));
		}

		let post_id = require_id(post_id, "post_id")?;
		let (post, channel) = self.readable_post(actor, post_id).await?;

		if post.is_deleted() {
			return Err(Error::not_found("Post not found."));
		}
		if !self.may_delete(actor, &post, &channel).await? {
			return Err(Error::denied("Post cannot be deleted by this user."));
		}

		self.backends.posts.delete_post(post.post_id, self.clock.tick()).await?;

		tracing::info!(post_id = %post.post_id, channel_id = %post.channel_id, "Post deleted.");

		Ok(())
	}

	pub async fn get_post(
		&self,
		caller: &Caller,
		post_id: &str,
		if_none_match: Option<&str>,
	) -> Result<Conditional<Post>> {
		let actor = caller.actor()?;

		if post_id.trim().is_empty() {
			return Err(Error::not_found("Post not found."));
		}

		let post_id = require_id(post_id, "post_id")?;
		let (post, _) = self.readable_post(actor, post_id).await?;

		if post.is_deleted() {
			return Err(Error::not_found("Post not found."));
		}

		Ok(Conditional::new(etag::for_post(&post), if_none_match, post))
	}

	fn check_message_length(&self, message: &str) -> Result<()> {
		let max = self.cfg.posts.max_message_chars as usize;

		if message.chars().count() > max {
			return Err(Error::invalid(format!("Message is longer than {max} characters.")));
		}

		Ok(())
	}

	fn check_edit_policy(&self, post: &Post, now: i64) -> Result<()> {
		match self.cfg.posts.edit_policy {
			EditPolicy::Always => Ok(()),
			EditPolicy::Never => Err(Error::denied("Editing posts is disabled.")),
			EditPolicy::TimeLimit => {
				let limit_ms = self.cfg.posts.edit_time_limit_secs.saturating_mul(1_000);

				if now.saturating_sub(post.create_at) > limit_ms {
					return Err(Error::invalid("The edit time limit for this post has passed."));
				}

				Ok(())
			},
		}
	}

	async fn may_delete(&self, actor: &Actor, post: &Post, channel: &Channel) -> Result<bool> {
		if actor.system_admin {
			return Ok(true);
		}

		let allowed = match self.cfg.posts.delete_policy {
			DeletePolicy::SystemAdmin => false,
			DeletePolicy::TeamAdmin => self.is_team_admin(actor, channel).await?,
			DeletePolicy::All =>
				post.user_id == actor.user_id || self.is_team_admin(actor, channel).await?,
		};

		Ok(allowed)
	}

	async fn is_team_admin(&self, actor: &Actor, channel: &Channel) -> Result<bool> {
		let role = self.backends.members.team_role(channel.team_id, actor.user_id).await?;

		Ok(role == Some(TeamRole::Admin))
	}

	async fn resolve_thread_link(
		&self,
		channel: &Channel,
		root_id: Option<Uuid>,
		parent_id: Option<Uuid>,
	) -> Result<ThreadLink> {
		let Some(root_id) = root_id else {
			if parent_id.is_some() {
				return Err(Error::invalid("parent_id requires root_id."));
			}

			return Ok(ThreadLink { root_id: None, parent_id: None });
		};
		let root = self.backends.posts.get_post(root_id).await?;
		let Some(root) = root.filter(|root| !root.is_deleted()) else {
			return Err(Error::invalid("Root post does not exist."));
		};

		if root.root_id.is_some() {
			return Err(Error::invalid("Root post is itself a reply."));
		}
		if root.channel_id != channel.channel_id {
			return Err(Error::invalid("Root post belongs to another channel."));
		}

		let Some(parent_id) = parent_id.filter(|parent_id| *parent_id != root_id) else {
			return Ok(ThreadLink { root_id: Some(root_id), parent_id: Some(root_id) });
		};
		let parent = self.backends.posts.get_post(parent_id).await?;
		let Some(parent) = parent.filter(|parent| !parent.is_deleted()) else {
			return Err(Error::invalid("Parent post does not exist."));
		};

		if parent.channel_id != channel.channel_id || parent.root_id != Some(root_id) {
			return Err(Error::invalid("Parent post is not part of the thread."));
		}

		Ok(ThreadLink { root_id: Some(root_id), parent_id: Some(parent_id) })
	}
}

/// A post needs text unless it carries files. Edits always carry text.
fn require_message(message: &str, has_files: bool) -> Result<()> {
	if message.trim().is_empty() && !has_files {
		return Err(Error::invalid("Message must not be empty."));
	}

	Ok(())
}
