use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Caller, Conditional, PostList, QuillService, Result, access::require_id, etag};
use quill_storage::models::Post;

/// Zero-indexed page window. A `per_page` of zero selects the configured default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
	#[serde(default)]
	pub page: u32,
	#[serde(default)]
	pub per_page: u32,
}
impl Page {
	pub fn new(page: u32, per_page: u32) -> Self {
		Self { page, per_page }
	}
}

enum Direction {
	Before,
	After,
}

impl QuillService {
	/// Newest first, `page` windows of `per_page` posts.
	pub async fn get_posts_for_channel(
		&self,
		caller: &Caller,
		channel_id: &str,
		page: Page,
		if_none_match: Option<&str>,
	) -> Result<Conditional<PostList>> {
		let actor = caller.actor()?;
		let channel_id = require_id(channel_id, "channel_id")?;

		self.authorize_channel(actor, channel_id).await?;

		let (offset, limit) = self.window(page);
		let posts = self.backends.posts.channel_page(channel_id, offset, limit).await?;
		let list = self.with_thread_roots(posts).await?;

		tracing::debug!(%channel_id, page = page.page, count = list.len(), "Listed channel page.");

		Ok(Conditional::new(etag::for_post_list(&list), if_none_match, list))
	}

	/// Every live post created at or after `since`, newest first.
	pub async fn get_posts_since(
		&self,
		caller: &Caller,
		channel_id: &str,
		since: i64,
		if_none_match: Option<&str>,
	) -> Result<Conditional<PostList>> {
		let actor = caller.actor()?;
		let channel_id = require_id(channel_id, "channel_id")?;

		self.authorize_channel(actor, channel_id).await?;

		let posts = self.backends.posts.channel_since(channel_id, since).await?;
		let list = self.with_thread_roots(posts).await?;

		tracing::debug!(%channel_id, since, count = list.len(), "Listed channel posts since.");

		Ok(Conditional::new(etag::for_post_list(&list), if_none_match, list))
	}

	pub async fn get_posts_before(
		&self,
		caller: &Caller,
		channel_id: &str,
		anchor_id: &str,
		page: Page,
		if_none_match: Option<&str>,
	) -> Result<Conditional<PostList>> {
		self.anchored_page(caller, channel_id, anchor_id, page, Direction::Before, if_none_match)
			.await
	}

	pub async fn get_posts_after(
		&self,
		caller: &Caller,
		channel_id: &str,
		anchor_id: &str,
		page: Page,
		if_none_match: Option<&str>,
	) -> Result<Conditional<PostList>> {
		self.anchored_page(caller, channel_id, anchor_id, page, Direction::After, if_none_match)
			.await
	}

	async fn anchored_page(
		&self,
		caller: &Caller,
		channel_id: &str,
		anchor_id: &str,
		page: Page,
		direction: Direction,
		if_none_match: Option<&str>,
	) -> Result<Conditional<PostList>> {
		let actor = caller.actor()?;
		let channel_id = require_id(channel_id, "channel_id")?;

		self.authorize_channel(actor, channel_id).await?;

		let Some(anchor) = self.anchor_key(channel_id, anchor_id).await? else {
			tracing::debug!(%channel_id, anchor_id, "Anchor is not a post of this channel.");

			let list = PostList::default();

			return Ok(Conditional::new(etag::for_post_list(&list), if_none_match, list));
		};
		let (offset, limit) = self.window(page);
		let posts = match direction {
			Direction::Before =>
				self.backends.posts.channel_before(channel_id, anchor, offset, limit).await?,
			Direction::After => {
				let mut posts =
					self.backends.posts.channel_after(channel_id, anchor, offset, limit).await?;

				posts.reverse();

				posts
			},
		};
		let list = self.with_thread_roots(posts).await?;

		tracing::debug!(%channel_id, page = page.page, count = list.len(), "Listed anchored page.");

		Ok(Conditional::new(etag::for_post_list(&list), if_none_match, list))
	}

	// Deleted anchors still bound a page; unknown, malformed or foreign ones do not.
	async fn anchor_key(&self, channel_id: Uuid, anchor_id: &str) -> Result<Option<(i64, Uuid)>> {
		let Some(anchor_id) = quill_domain::id::parse_id(anchor_id.trim()) else {
			return Ok(None);
		};
		let anchor = self.backends.posts.get_post(anchor_id).await?;

		Ok(anchor
			.filter(|anchor| anchor.channel_id == channel_id)
			.map(|anchor| (anchor.create_at, anchor.post_id)))
	}

	fn window(&self, page: Page) -> (u64, u64) {
		let pagination = &self.cfg.pagination;
		let per_page = match page.per_page {
			0 => pagination.default_per_page,
			per_page => per_page.min(pagination.max_per_page),
		};

		(u64::from(page.page) * u64::from(per_page), u64::from(per_page))
	}

	/// Builds a list in the given order and adds the roots of listed replies as context.
	pub(crate) async fn with_thread_roots(&self, posts: Vec<Post>) -> Result<PostList> {
		let mut list = PostList::default();

		for post in posts {
			list.push(post);
		}

		let missing: Vec<Uuid> = list
			.ordered()
			.filter_map(|post| post.root_id)
			.filter(|root_id| !list.posts.contains_key(root_id))
			.collect::<HashSet<_>>()
			.into_iter()
			.collect();

		if !missing.is_empty() {
			for root in self.backends.posts.get_posts(&missing).await? {
				list.add_context(root);
			}
		}

		Ok(list)
	}
}
