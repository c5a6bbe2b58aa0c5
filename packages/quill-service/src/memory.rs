//! In-process backend for tests and local runs. Implements every collaborator trait over one
//! lock-guarded state.

use std::{
	cmp::Reverse,
	collections::{HashMap, HashSet},
	sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use uuid::Uuid;

use crate::{
	BoxFuture, FileStore, MembershipProvider, PostStore, SessionProvider, StoreResult, TeamRole,
	UserDirectory,
};
use quill_storage::{
	Error,
	models::{Channel, FileInfo, Post, PostSearch, User},
};

const SESSION_TTL_MS: i64 = 24 * 60 * 60 * 1_000;

#[derive(Default)]
struct State {
	users: HashMap<Uuid, User>,
	sessions: HashMap<String, (Uuid, i64)>,
	channels: HashMap<Uuid, Channel>,
	team_members: HashMap<(Uuid, Uuid), TeamRole>,
	channel_members: HashSet<(Uuid, Uuid)>,
	posts: HashMap<Uuid, Post>,
	files: HashMap<Uuid, FileInfo>,
}
impl State {
	fn channel_posts(&self, channel_id: Uuid) -> impl Iterator<Item = &Post> {
		self.posts.values().filter(move |post| post.channel_id == channel_id && !post.is_deleted())
	}
}

#[derive(Default)]
pub struct MemoryBackend {
	state: RwLock<State>,
}
impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_user(&self, username: &str, system_admin: bool) -> User {
		let user =
			User { user_id: Uuid::new_v4(), username: username.to_string(), system_admin };

		self.write().users.insert(user.user_id, user.clone());

		user
	}

	/// Issues a session token valid for a day.
	pub fn add_session(&self, user_id: Uuid) -> String {
		let token = Uuid::new_v4().simple().to_string();

		self.write().sessions.insert(token.clone(), (user_id, crate::now_millis() + SESSION_TTL_MS));

		token
	}

	pub fn expire_session(&self, token: &str) {
		if let Some((_, expires_at)) = self.write().sessions.get_mut(token) {
			*expires_at = 0;
		}
	}

	pub fn add_channel(&self, team_id: Uuid, name: &str) -> Channel {
		let channel = Channel {
			channel_id: Uuid::new_v4(),
			team_id,
			name: name.to_string(),
			display_name: name.to_string(),
		};

		self.write().channels.insert(channel.channel_id, channel.clone());

		channel
	}

	pub fn add_team_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) {
		self.write().team_members.insert((team_id, user_id), role);
	}

	pub fn add_channel_member(&self, channel_id: Uuid, user_id: Uuid) {
		self.write().channel_members.insert((channel_id, user_id));
	}

	pub fn remove_channel_member(&self, channel_id: Uuid, user_id: Uuid) {
		self.write().channel_members.remove(&(channel_id, user_id));
	}

	/// Registers an uploaded file that is not attached to any post yet.
	pub fn add_file(&self, user_id: Uuid, name: &str) -> FileInfo {
		let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_string()).unwrap_or_default();
		let info = FileInfo {
			file_id: Uuid::new_v4(),
			post_id: None,
			user_id,
			name: name.to_string(),
			extension,
			size: 0,
			mime_type: "application/octet-stream".to_string(),
			create_at: crate::now_millis(),
			delete_at: 0,
		};

		self.write().files.insert(info.file_id, info.clone());

		info
	}

	pub fn post_count(&self) -> usize {
		self.read().posts.len()
	}

	fn read(&self) -> RwLockReadGuard<'_, State> {
		self.state.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, State> {
		self.state.write().unwrap_or_else(PoisonError::into_inner)
	}
}

fn page(mut posts: Vec<Post>, offset: u64, limit: u64) -> Vec<Post> {
	let offset = usize::try_from(offset).unwrap_or(usize::MAX);
	let limit = usize::try_from(limit).unwrap_or(usize::MAX);

	if offset >= posts.len() {
		return Vec::new();
	}

	posts.drain(..offset);
	posts.truncate(limit);

	posts
}

fn newest_first(posts: &mut [Post]) {
	posts.sort_by_key(|post| Reverse((post.create_at, post.post_id)));
}

fn oldest_first(posts: &mut [Post]) {
	posts.sort_by_key(|post| (post.create_at, post.post_id));
}

impl PostStore for MemoryBackend {
	fn insert_post<'a>(&'a self, post: &'a Post) -> BoxFuture<'a, StoreResult<()>> {
		Box::pin(async move {
			let mut state = self.write();

			if state.posts.contains_key(&post.post_id) {
				return Err(Error::Conflict(format!("Post {} already exists.", post.post_id)));
			}

			state.posts.insert(post.post_id, post.clone());

			Ok(())
		})
	}

	fn update_post<'a>(&'a self, post: &'a Post) -> BoxFuture<'a, StoreResult<bool>> {
		Box::pin(async move {
			let mut state = self.write();
			let Some(stored) = state.posts.get_mut(&post.post_id) else {
				return Ok(false);
			};

			if stored.is_deleted() {
				return Ok(false);
			}

			stored.message = post.message.clone();
			stored.hashtags = post.hashtags.clone();
			stored.edit_at = post.edit_at;
			stored.update_at = post.update_at;

			Ok(true)
		})
	}

	fn delete_post(&self, post_id: Uuid, now: i64) -> BoxFuture<'_, StoreResult<()>> {
		Box::pin(async move {
			let mut state = self.write();

			match state.posts.get_mut(&post_id) {
				Some(post) if !post.is_deleted() => {
					post.delete_at = now;
					post.update_at = now;

					Ok(())
				},
				_ => Err(Error::NotFound(format!("Post {post_id} is not live."))),
			}
		})
	}

	fn get_post(&self, post_id: Uuid) -> BoxFuture<'_, StoreResult<Option<Post>>> {
		Box::pin(async move { Ok(self.read().posts.get(&post_id).cloned()) })
	}

	fn get_posts<'a>(&'a self, post_ids: &'a [Uuid]) -> BoxFuture<'a, StoreResult<Vec<Post>>> {
		Box::pin(async move {
			let state = self.read();

			Ok(post_ids
				.iter()
				.filter_map(|post_id| state.posts.get(post_id))
				.filter(|post| !post.is_deleted())
				.cloned()
				.collect())
		})
	}

	fn channel_page(
		&self,
		channel_id: Uuid,
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(async move {
			let mut posts: Vec<Post> = self.read().channel_posts(channel_id).cloned().collect();

			newest_first(&mut posts);

			Ok(page(posts, offset, limit))
		})
	}

	fn channel_since(&self, channel_id: Uuid, since: i64) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(async move {
			let mut posts: Vec<Post> = self
				.read()
				.channel_posts(channel_id)
				.filter(|post| post.create_at >= since)
				.cloned()
				.collect();

			newest_first(&mut posts);

			Ok(posts)
		})
	}

	fn channel_before(
		&self,
		channel_id: Uuid,
		anchor: (i64, Uuid),
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(async move {
			let mut posts: Vec<Post> = self
				.read()
				.channel_posts(channel_id)
				.filter(|post| (post.create_at, post.post_id) < anchor)
				.cloned()
				.collect();

			newest_first(&mut posts);

			Ok(page(posts, offset, limit))
		})
	}

	fn channel_after(
		&self,
		channel_id: Uuid,
		anchor: (i64, Uuid),
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(async move {
			let mut posts: Vec<Post> = self
				.read()
				.channel_posts(channel_id)
				.filter(|post| (post.create_at, post.post_id) > anchor)
				.cloned()
				.collect();

			oldest_first(&mut posts);

			Ok(page(posts, offset, limit))
		})
	}

	fn thread_replies(&self, root_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(async move {
			let mut posts: Vec<Post> = self
				.read()
				.posts
				.values()
				.filter(|post| post.root_id == Some(root_id) && !post.is_deleted())
				.cloned()
				.collect();

			oldest_first(&mut posts);

			Ok(posts)
		})
	}

	fn search<'a>(&'a self, search: &'a PostSearch) -> BoxFuture<'a, StoreResult<Vec<Post>>> {
		Box::pin(async move {
			let mut posts: Vec<Post> =
				self.read().posts.values().filter(|post| search.matches(post)).cloned().collect();

			newest_first(&mut posts);
			posts.truncate(search.limit as usize);

			Ok(posts)
		})
	}
}

impl MembershipProvider for MemoryBackend {
	fn channel(&self, channel_id: Uuid) -> BoxFuture<'_, StoreResult<Option<Channel>>> {
		Box::pin(async move { Ok(self.read().channels.get(&channel_id).cloned()) })
	}

	fn channel_member(&self, channel_id: Uuid, user_id: Uuid) -> BoxFuture<'_, StoreResult<bool>> {
		Box::pin(async move { Ok(self.read().channel_members.contains(&(channel_id, user_id))) })
	}

	fn team_role(
		&self,
		team_id: Uuid,
		user_id: Uuid,
	) -> BoxFuture<'_, StoreResult<Option<TeamRole>>> {
		Box::pin(async move { Ok(self.read().team_members.get(&(team_id, user_id)).copied()) })
	}

	fn channels_for_user(
		&self,
		team_id: Uuid,
		user_id: Uuid,
	) -> BoxFuture<'_, StoreResult<Vec<Channel>>> {
		Box::pin(async move {
			let state = self.read();
			let mut channels: Vec<Channel> = state
				.channels
				.values()
				.filter(|channel| {
					channel.team_id == team_id
						&& state.channel_members.contains(&(channel.channel_id, user_id))
				})
				.cloned()
				.collect();

			channels.sort_by(|a, b| a.name.cmp(&b.name));

			Ok(channels)
		})
	}
}

impl UserDirectory for MemoryBackend {
	fn user_by_username<'a>(
		&'a self,
		username: &'a str,
	) -> BoxFuture<'a, StoreResult<Option<User>>> {
		Box::pin(async move {
			let wanted = username.to_lowercase();

			Ok(self.read().users.values().find(|user| user.username.to_lowercase() == wanted).cloned())
		})
	}
}

impl SessionProvider for MemoryBackend {
	fn user_for_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>> {
		Box::pin(async move {
			let state = self.read();
			let Some((user_id, expires_at)) = state.sessions.get(token) else {
				return Ok(None);
			};

			if *expires_at <= crate::now_millis() {
				return Ok(None);
			}

			Ok(state.users.get(user_id).cloned())
		})
	}
}

impl FileStore for MemoryBackend {
	fn claimable_files<'a>(
		&'a self,
		user_id: Uuid,
		file_ids: &'a [Uuid],
	) -> BoxFuture<'a, StoreResult<Vec<Uuid>>> {
		Box::pin(async move {
			let state = self.read();

			Ok(file_ids
				.iter()
				.filter(|file_id| {
					state.files.get(file_id).is_some_and(|info| {
						info.user_id == user_id && info.post_id.is_none() && info.delete_at == 0
					})
				})
				.copied()
				.collect())
		})
	}

	fn attach_files<'a>(
		&'a self,
		post_id: Uuid,
		user_id: Uuid,
		file_ids: &'a [Uuid],
	) -> BoxFuture<'a, StoreResult<u64>> {
		Box::pin(async move {
			let mut state = self.write();
			let mut attached = 0;

			for file_id in file_ids {
				if let Some(info) = state.files.get_mut(file_id)
					&& info.user_id == user_id
					&& info.post_id.is_none()
					&& info.delete_at == 0
				{
					info.post_id = Some(post_id);
					attached += 1;
				}
			}

			Ok(attached)
		})
	}

	fn file_infos(&self, post_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<FileInfo>>> {
		Box::pin(async move {
			let mut infos: Vec<FileInfo> = self
				.read()
				.files
				.values()
				.filter(|info| info.post_id == Some(post_id) && info.delete_at == 0)
				.cloned()
				.collect();

			infos.sort_by_key(|info| (info.create_at, info.file_id));

			Ok(infos)
		})
	}
}
