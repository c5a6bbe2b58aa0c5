use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quill_domain::hashtag;

pub const POST_TYPE_NORMAL: &str = "";
pub const POST_TYPE_JOIN_LEAVE: &str = "system_join_leave";
pub const SYSTEM_POST_TYPE_PREFIX: &str = "system_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
	pub post_id: Uuid,
	pub create_at: i64,
	pub update_at: i64,
	pub edit_at: i64,
	pub delete_at: i64,
	pub user_id: Uuid,
	pub channel_id: Uuid,
	pub root_id: Option<Uuid>,
	pub parent_id: Option<Uuid>,
	pub message: String,
	pub hashtags: String,
	pub file_ids: Vec<Uuid>,
	#[serde(rename = "type")]
	pub post_type: String,
}
impl Post {
	pub fn is_system(&self) -> bool {
		self.post_type.starts_with(SYSTEM_POST_TYPE_PREFIX)
	}

	pub fn is_deleted(&self) -> bool {
		self.delete_at != 0
	}

	/// The id of the thread this post belongs to: its root, or itself for a root post.
	pub fn thread_id(&self) -> Uuid {
		self.root_id.unwrap_or(self.post_id)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
	pub channel_id: Uuid,
	pub team_id: Uuid,
	pub name: String,
	pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
	pub user_id: Uuid,
	pub username: String,
	pub system_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileInfo {
	pub file_id: Uuid,
	pub post_id: Option<Uuid>,
	pub user_id: Uuid,
	pub name: String,
	pub extension: String,
	pub size: i64,
	pub mime_type: String,
	pub create_at: i64,
	pub delete_at: i64,
}

/// A fully resolved search: every name in the query has already been mapped to ids.
#[derive(Clone, Debug, Default)]
pub struct PostSearch {
	pub channel_ids: Vec<Uuid>,
	/// `None` leaves authors unrestricted.
	pub author_ids: Option<Vec<Uuid>>,
	pub terms: Vec<String>,
	pub hashtags: Vec<String>,
	pub match_all_terms: bool,
	pub limit: u32,
}
impl PostSearch {
	/// Reference predicate for the search contract. Stores that cannot push the search down
	/// evaluate it per post.
	pub fn matches(&self, post: &Post) -> bool {
		if post.is_deleted() || post.is_system() || !self.channel_ids.contains(&post.channel_id) {
			return false;
		}
		if let Some(author_ids) = self.author_ids.as_ref()
			&& !author_ids.contains(&post.user_id)
		{
			return false;
		}
		if self.terms.is_empty() && self.hashtags.is_empty() {
			return true;
		}

		let message = post.message.to_lowercase();
		let mut checks = self
			.terms
			.iter()
			.map(|term| message.contains(&term.to_lowercase()))
			.chain(self.hashtags.iter().map(|tag| {
				let key = hashtag::tag_key(tag);

				post.hashtags.split_whitespace().any(|stored| hashtag::tag_key(stored) == key)
			}));

		if self.match_all_terms { checks.all(|hit| hit) } else { checks.any(|hit| hit) }
	}
}
