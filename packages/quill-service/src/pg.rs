use uuid::Uuid;

use crate::{
	BoxFuture, FileStore, MembershipProvider, PostStore, SessionProvider, StoreResult, TeamRole,
	UserDirectory,
};
use quill_storage::{
	db::Db,
	models::{Channel, FileInfo, Post, PostSearch, User},
	queries,
};

/// Collaborator implementations over the Postgres store.
pub struct PgBackend {
	pub db: Db,
}
impl PgBackend {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}

impl PostStore for PgBackend {
	fn insert_post<'a>(&'a self, post: &'a Post) -> BoxFuture<'a, StoreResult<()>> {
		Box::pin(queries::insert_post(&self.db.pool, post))
	}

	fn update_post<'a>(&'a self, post: &'a Post) -> BoxFuture<'a, StoreResult<bool>> {
		Box::pin(queries::update_post_content(&self.db, post))
	}

	fn delete_post(&self, post_id: Uuid, now: i64) -> BoxFuture<'_, StoreResult<()>> {
		Box::pin(queries::soft_delete_post(&self.db.pool, post_id, now))
	}

	fn get_post(&self, post_id: Uuid) -> BoxFuture<'_, StoreResult<Option<Post>>> {
		Box::pin(queries::get_post(&self.db.pool, post_id))
	}

	fn get_posts<'a>(&'a self, post_ids: &'a [Uuid]) -> BoxFuture<'a, StoreResult<Vec<Post>>> {
		Box::pin(queries::get_live_posts(&self.db.pool, post_ids))
	}

	fn channel_page(
		&self,
		channel_id: Uuid,
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(queries::channel_page(&self.db.pool, channel_id, offset, limit))
	}

	fn channel_since(&self, channel_id: Uuid, since: i64) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(queries::channel_since(&self.db.pool, channel_id, since))
	}

	fn channel_before(
		&self,
		channel_id: Uuid,
		anchor: (i64, Uuid),
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(queries::channel_before(&self.db.pool, channel_id, anchor, offset, limit))
	}

	fn channel_after(
		&self,
		channel_id: Uuid,
		anchor: (i64, Uuid),
		offset: u64,
		limit: u64,
	) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(queries::channel_after(&self.db.pool, channel_id, anchor, offset, limit))
	}

	fn thread_replies(&self, root_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<Post>>> {
		Box::pin(queries::thread_replies(&self.db.pool, root_id))
	}

	fn search<'a>(&'a self, search: &'a PostSearch) -> BoxFuture<'a, StoreResult<Vec<Post>>> {
		Box::pin(queries::search_posts(&self.db.pool, search))
	}
}

impl MembershipProvider for PgBackend {
	fn channel(&self, channel_id: Uuid) -> BoxFuture<'_, StoreResult<Option<Channel>>> {
		Box::pin(queries::get_channel(&self.db.pool, channel_id))
	}

	fn channel_member(&self, channel_id: Uuid, user_id: Uuid) -> BoxFuture<'_, StoreResult<bool>> {
		Box::pin(queries::is_channel_member(&self.db.pool, channel_id, user_id))
	}

	fn team_role(
		&self,
		team_id: Uuid,
		user_id: Uuid,
	) -> BoxFuture<'_, StoreResult<Option<TeamRole>>> {
		Box::pin(async move {
			let team_admin = queries::team_membership(&self.db.pool, team_id, user_id).await?;

			Ok(team_admin.map(|admin| if admin { TeamRole::Admin } else { TeamRole::Member }))
		})
	}

	fn channels_for_user(
		&self,
		team_id: Uuid,
		user_id: Uuid,
	) -> BoxFuture<'_, StoreResult<Vec<Channel>>> {
		Box::pin(queries::channels_for_user(&self.db.pool, team_id, user_id))
	}
}

impl UserDirectory for PgBackend {
	fn user_by_username<'a>(
		&'a self,
		username: &'a str,
	) -> BoxFuture<'a, StoreResult<Option<User>>> {
		Box::pin(queries::user_by_username(&self.db.pool, username))
	}
}

impl SessionProvider for PgBackend {
	fn user_for_token<'a>(&'a self, token: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>> {
		Box::pin(queries::session_user(&self.db.pool, token, crate::now_millis()))
	}
}

impl FileStore for PgBackend {
	fn claimable_files<'a>(
		&'a self,
		user_id: Uuid,
		file_ids: &'a [Uuid],
	) -> BoxFuture<'a, StoreResult<Vec<Uuid>>> {
		Box::pin(queries::claimable_files(&self.db.pool, user_id, file_ids))
	}

	fn attach_files<'a>(
		&'a self,
		post_id: Uuid,
		user_id: Uuid,
		file_ids: &'a [Uuid],
	) -> BoxFuture<'a, StoreResult<u64>> {
		Box::pin(queries::attach_files(&self.db.pool, post_id, user_id, file_ids))
	}

	fn file_infos(&self, post_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<FileInfo>>> {
		Box::pin(queries::file_infos_for_post(&self.db.pool, post_id))
	}
}
