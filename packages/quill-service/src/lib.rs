pub mod access;
pub mod etag;
pub mod files;
pub mod list;
pub mod memory;
pub mod pg;
pub mod posts;
pub mod search;
pub mod system_posts;
pub mod thread;

mod error;

pub use error::{Error, Result};
pub use files::FileInfoList;
pub use list::Page;
pub use memory::MemoryBackend;
pub use pg::PgBackend;
pub use posts::{CreatePostRequest, UpdatePostRequest};
pub use search::SearchRequest;
pub use system_posts::MembershipChange;

use std::{
	collections::HashMap,
	future::Future,
	pin::Pin,
	sync::{
		Arc,
		atomic::{AtomicI64, Ordering},
	},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use quill_config::Config;
use quill_storage::models::{Channel, FileInfo, Post, PostSearch, User};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type StoreResult<T> = quill_storage::Result<T>;

/// Raw post persistence. Listing methods return live posts only; `get_post` includes tombstones.
pub trait PostStore
where
	Self: Send + Sync,
{
	fn insert_post<'a>(&'a self, post: &'a Post) -> BoxFuture<'a, StoreResult<()>>;

	/// Persists `message`, `hashtags`, `edit_at` and `update_at` in one write. Returns false when
	/// the post no longer exists or was tombstoned.
	fn update_post<'a>(&'a self, post: &'a Post) -> BoxFuture<'a, StoreResult<bool>>;

	fn delete_post(&self, post_id: Uuid, now: i64) -> BoxFuture<'_, StoreResult<()>>;

	fn get_post(&self, post_id: Uuid) -> BoxFuture<'_, StoreResult<Option<Post>>>;

	fn get_posts<'a>(&'a self, post_ids: &'a [Uuid]) -> BoxFuture<'a, StoreResult<Vec<Post>>>;

	/// Newest first, skipping `offset` posts.
	fn channel_page(
		&self,
		channel_id: Uuid,
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>>;

	fn channel_since(&self, channel_id: Uuid, since: i64) -> BoxFuture<'_, StoreResult<Vec<Post>>>;

	/// Strictly older than `anchor` (`create_at`, id), nearest first.
	fn channel_before(
		&self,
		channel_id: Uuid,
		anchor: (i64, Uuid),
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>>;

	/// Strictly newer than `anchor` (`create_at`, id), nearest first.
	fn channel_after(
		&self,
		channel_id: Uuid,
		anchor: (i64, Uuid),
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>>;

	fn thread_replies(&self, root_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<Post>>>;

	fn search<'a>(&'a self, search: &'a PostSearch) -> BoxFuture<'a, StoreResult<Vec<Post>>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
	Member,
	Admin,
}

pub trait MembershipProvider
where
	Self: Send + Sync,
{
	fn channel(&self, channel_id: Uuid) -> BoxFuture<'_, StoreResult<Option<Channel>>>;

	fn channel_member(&self, channel_id: Uuid, user_id: Uuid) -> BoxFuture<'_, StoreResult<bool>>;

	fn team_role(&self, team_id: Uuid, user_id: Uuid)
	-> BoxFuture<'_, StoreResult<Option<TeamRole>>>;

	/// Channels of `team_id` the user belongs to.
	fn channels_for_user(
		&self,
		team_id: Uuid,
		user_id: Uuid,
	) -> BoxFuture<'_, StoreResult<Vec<Channel>>>;
}

pub trait UserDirectory
where
	Self: Send + Sync,
{
	/// Case-insensitive lookup.
	fn user_by_username<'a>(&'a self, username: &'a str)
	-> BoxFuture<'a, StoreResult<Option<User>>>;
}

pub trait SessionProvider
where
	Self: Send + Sync,
{
	fn user_for_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>>;
}

pub trait FileStore
where
	Self: Send + Sync,
{
	/// The subset of `file_ids` that `user_id` owns and that no post has claimed yet.
	fn claimable_files<'a>(
		&'a self,
		user_id: Uuid,
		file_ids: &'a [Uuid],
	) -> BoxFuture<'a, StoreResult<Vec<Uuid>>>;

	fn attach_files<'a>(
		&'a self,
		post_id: Uuid,
		user_id: Uuid,
		file_ids: &'a [Uuid],
	) -> BoxFuture<'a, StoreResult<u64>>;

	fn file_infos(&self, post_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<FileInfo>>>;
}

#[derive(Clone)]
pub struct Backends {
	pub posts: Arc<dyn PostStore>,
	pub members: Arc<dyn MembershipProvider>,
	pub users: Arc<dyn UserDirectory>,
	pub sessions: Arc<dyn SessionProvider>,
	pub files: Arc<dyn FileStore>,
}
impl Backends {
	pub fn new(
		posts: Arc<dyn PostStore>,
		members: Arc<dyn MembershipProvider>,
		users: Arc<dyn UserDirectory>,
		sessions: Arc<dyn SessionProvider>,
		files: Arc<dyn FileStore>,
	) -> Self {
		Self { posts, members, users, sessions, files }
	}

	/// Uses one backend for every collaborator.
	pub fn shared<B>(backend: Arc<B>) -> Self
	where
		B: PostStore + MembershipProvider + UserDirectory + SessionProvider + FileStore + 'static,
	{
		Self {
			posts: backend.clone(),
			members: backend.clone(),
			users: backend.clone(),
			sessions: backend.clone(),
			files: backend,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub user_id: Uuid,
	pub system_admin: bool,
}
impl From<&User> for Actor {
	fn from(user: &User) -> Self {
		Self { user_id: user.user_id, system_admin: user.system_admin }
	}
}

/// Who is asking. Every entry point rejects `Anonymous` before looking at anything else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caller {
	Anonymous,
	Authenticated(Actor),
}
impl Caller {
	pub fn actor(&self) -> Result<&Actor> {
		match self {
			Self::Anonymous => Err(Error::Unauthenticated),
			Self::Authenticated(actor) => Ok(actor),
		}
	}
}

/// Read-path envelope. `order` is authoritative for display; `posts` may also hold thread roots
/// of listed replies that are not part of `order`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostList {
	pub order: Vec<Uuid>,
	pub posts: HashMap<Uuid, Post>,
}
impl PostList {
	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub fn get(&self, post_id: &Uuid) -> Option<&Post> {
		self.posts.get(post_id)
	}

	/// Posts in display order.
	pub fn ordered(&self) -> impl Iterator<Item = &Post> {
		self.order.iter().filter_map(|post_id| self.posts.get(post_id))
	}

	pub(crate) fn push(&mut self, post: Post) {
		if self.posts.contains_key(&post.post_id) {
			return;
		}

		self.order.push(post.post_id);
		self.posts.insert(post.post_id, post);
	}

	pub(crate) fn add_context(&mut self, post: Post) {
		self.posts.entry(post.post_id).or_insert(post);
	}
}

/// Result of a read that honored a caller-supplied cache token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Conditional<T> {
	Modified { etag: String, body: T },
	NotModified { etag: String },
}
impl<T> Conditional<T> {
	pub(crate) fn new(etag: String, if_none_match: Option<&str>, body: T) -> Self {
		if etag::matches(&etag, if_none_match) {
			Self::NotModified { etag }
		} else {
			Self::Modified { etag, body }
		}
	}

	pub fn etag(&self) -> &str {
		match self {
			Self::Modified { etag, .. } | Self::NotModified { etag } => etag,
		}
	}

	pub fn is_not_modified(&self) -> bool {
		matches!(self, Self::NotModified { .. })
	}

	pub fn into_body(self) -> Option<T> {
		match self {
			Self::Modified { body, .. } => Some(body),
			Self::NotModified { .. } => None,
		}
	}
}

/// Millisecond wall clock that never hands out the same write timestamp twice.
#[derive(Debug, Default)]
pub(crate) struct WriteClock {
	last: AtomicI64,
}
impl WriteClock {
	pub(crate) fn tick(&self) -> i64 {
		let now = now_millis();
		let mut last = self.last.load(Ordering::Relaxed);

		loop {
			let next = now.max(last + 1);

			match self.last.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
			{
				Ok(_) => return next,
				Err(current) => last = current,
			}
		}
	}
}

pub struct QuillService {
	pub cfg: Config,
	pub backends: Backends,
	clock: WriteClock,
}
impl QuillService {
	pub fn new(cfg: Config, backends: Backends) -> Self {
		Self { cfg, backends, clock: WriteClock::default() }
	}

	/// Resolves a bearer token to a caller. A missing, unknown or expired token is `Anonymous`.
	pub async fn caller_for_token(&self, token: Option<&str>) -> Result<Caller> {
		let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) else {
			return Ok(Caller::Anonymous);
		};
		let user = self.backends.sessions.user_for_token(token).await?;

		Ok(user.map(|user| Caller::Authenticated(Actor::from(&user))).unwrap_or(Caller::Anonymous))
	}
}

pub(crate) fn now_millis() -> i64 {
	let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;

	i64::try_from(nanos).unwrap_or(i64::MAX)
}
