use uuid::Uuid;

use crate::{Actor, Error, QuillService, Result, TeamRole};
use quill_storage::models::{Channel, Post};

/// Parses a caller-supplied identifier. Empty and malformed ids are both rejected as invalid input.
pub(crate) fn require_id(raw: &str, field: &str) -> Result<Uuid> {
	if raw.trim().is_empty() {
		return Err(Error::invalid(format!("{field} is required.")));
	}

	quill_domain::id::parse_id(raw).ok_or_else(|| Error::invalid(format!("{field} is malformed.")))
}

pub(crate) fn optional_id(raw: Option<&str>, field: &str) -> Result<Option<Uuid>> {
	match raw {
		Some(raw) if !raw.trim().is_empty() => require_id(raw, field).map(Some),
		_ => Ok(None),
	}
}

impl QuillService {
	/// Grants read and write access to a channel for its members and for system administrators.
	///
	/// A missing channel is indistinguishable from a foreign one unless the actor is a system
	/// administrator.
	pub(crate) async fn authorize_channel(&self, actor: &Actor, channel_id: Uuid) -> Result<Channel> {
		let Some(channel) = self.backends.members.channel(channel_id).await? else {
			if actor.system_admin {
				return Err(Error::not_found("Channel not found."));
			}

			return Err(Error::denied("Channel is not accessible."));
		};

		if actor.system_admin {
			return Ok(channel);
		}
		if !self.backends.members.channel_member(channel_id, actor.user_id).await? {
			return Err(Error::denied("Channel is not accessible."));
		}

		Ok(channel)
	}

	pub(crate) async fn authorize_team(&self, actor: &Actor, team_id: Uuid) -> Result<Option<TeamRole>> {
		let role = self.backends.members.team_role(team_id, actor.user_id).await?;

		if role.is_none() && !actor.system_admin {
			return Err(Error::denied("Team is not accessible."));
		}

		Ok(role)
	}

	/// Loads a post, tombstones included, after checking that its channel is readable.
	pub(crate) async fn readable_post(&self, actor: &Actor, post_id: Uuid) -> Result<(Post, Channel)> {
		let Some(post) = self.backends.posts.get_post(post_id).await? else {
			if actor.system_admin {
				return Err(Error::not_found("Post not found."));
			}

			return Err(Error::denied("Post is not accessible."));
		};
		let channel = self.authorize_channel(actor, post.channel_id).await?;

		Ok((post, channel))
	}
}
