use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{Channel, FileInfo, Post, PostSearch, User},
};
use quill_domain::hashtag;

const POST_COLUMNS: &str = "post_id, create_at, update_at, edit_at, delete_at, user_id, channel_id, root_id, parent_id, message, hashtags, file_ids, post_type";

pub async fn insert_post<'e, E>(executor: E, post: &Post) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO posts (
	post_id,
	create_at,
	update_at,
	edit_at,
	delete_at,
	user_id,
	channel_id,
	root_id,
	parent_id,
	message,
	hashtags,
	file_ids,
	post_type
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
ON CONFLICT (post_id) DO NOTHING",
	)
	.bind(post.post_id)
	.bind(post.create_at)
	.bind(post.update_at)
	.bind(post.edit_at)
	.bind(post.delete_at)
	.bind(post.user_id)
	.bind(post.channel_id)
	.bind(post.root_id)
	.bind(post.parent_id)
	.bind(post.message.as_str())
	.bind(post.hashtags.as_str())
	.bind(post.file_ids.as_slice())
	.bind(post.post_type.as_str())
	.execute(executor)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::Conflict(format!("Post {} already exists.", post.post_id)));
	}

	Ok(())
}

/// Writes the editable fields of a live post. Returns false when the post is gone or tombstoned.
pub async fn update_post_content(db: &Db, post: &Post) -> Result<bool> {
	let mut tx = db.pool.begin().await?;
	let live: Option<i64> =
		sqlx::query_scalar("SELECT delete_at FROM posts WHERE post_id = $1 FOR UPDATE")
			.bind(post.post_id)
			.fetch_optional(&mut *tx)
			.await?;

	if live != Some(0) {
		tx.rollback().await?;

		return Ok(false);
	}

	sqlx::query(
		"\
UPDATE posts
SET
	message = $1,
	hashtags = $2,
	edit_at = $3,
	update_at = $4
WHERE post_id = $5",
	)
	.bind(post.message.as_str())
	.bind(post.hashtags.as_str())
	.bind(post.edit_at)
	.bind(post.update_at)
	.bind(post.post_id)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(true)
}

pub async fn soft_delete_post<'e, E>(executor: E, post_id: Uuid, now: i64) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"UPDATE posts SET delete_at = $1, update_at = $1 WHERE post_id = $2 AND delete_at = 0",
	)
	.bind(now)
	.bind(post_id)
	.execute(executor)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Post {post_id} is not live.")));
	}

	Ok(())
}

/// Fetches a post by id, tombstones included.
pub async fn get_post<'e, E>(executor: E, post_id: Uuid) -> Result<Option<Post>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE post_id = $1");
	let post = sqlx::query_as::<_, Post>(&sql).bind(post_id).fetch_optional(executor).await?;

	Ok(post)
}

pub async fn get_live_posts<'e, E>(executor: E, post_ids: &[Uuid]) -> Result<Vec<Post>>
where
	E: PgExecutor<'e>,
{
	if post_ids.is_empty() {
		return Ok(Vec::new());
	}

	let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE post_id = ANY($1) AND delete_at = 0");
	let posts = sqlx::query_as::<_, Post>(&sql).bind(post_ids).fetch_all(executor).await?;

	Ok(posts)
}

pub async fn channel_page<'e, E>(
	executor: E,
	channel_id: Uuid,
	offset: u64,
	limit: u64,
) -> Result<Vec<Post>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {POST_COLUMNS}
FROM posts
WHERE channel_id = $1 AND delete_at = 0
ORDER BY create_at DESC, post_id DESC
OFFSET $2
LIMIT $3"
	);
	let posts = sqlx::query_as::<_, Post>(&sql)
		.bind(channel_id)
		.bind(clamp_i64(offset))
		.bind(clamp_i64(limit))
		.fetch_all(executor)
		.await?;

	Ok(posts)
}

pub async fn channel_since<'e, E>(executor: E, channel_id: Uuid, since: i64) -> Result<Vec<Post>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {POST_COLUMNS}
FROM posts
WHERE channel_id = $1 AND delete_at = 0 AND create_at >= $2
ORDER BY create_at DESC, post_id DESC"
	);
	let posts =
		sqlx::query_as::<_, Post>(&sql).bind(channel_id).bind(since).fetch_all(executor).await?;

	Ok(posts)
}

/// Posts strictly older than the anchor key, nearest first.
pub async fn channel_before<'e, E>(
	executor: E,
	channel_id: Uuid,
	anchor: (i64, Uuid),
	offset: u64,
	limit: u64,
) -> Result<Vec<Post>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {POST_COLUMNS}
FROM posts
WHERE channel_id = $1 AND delete_at = 0 AND (create_at, post_id) < ($2, $3)
ORDER BY create_at DESC, post_id DESC
OFFSET $4
LIMIT $5"
	);
	let posts = sqlx::query_as::<_, Post>(&sql)
		.bind(channel_id)
		.bind(anchor.0)
		.bind(anchor.1)
		.bind(clamp_i64(offset))
		.bind(clamp_i64(limit))
		.fetch_all(executor)
		.await?;

	Ok(posts)
}

/// Posts strictly newer than the anchor key, nearest first.
pub async fn channel_after<'e, E>(
	executor: E,
	channel_id: Uuid,
	anchor: (i64, Uuid),
	offset: u64,
	limit: u64,
) -> Result<Vec<Post>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {POST_COLUMNS}
FROM posts
WHERE channel_id = $1 AND delete_at = 0 AND (create_at, post_id) > ($2, $3)
ORDER BY create_at ASC, post_id ASC
OFFSET $4
LIMIT $5"
	);
	let posts = sqlx::query_as::<_, Post>(&sql)
		.bind(channel_id)
		.bind(anchor.0)
		.bind(anchor.1)
		.bind(clamp_i64(offset))
		.bind(clamp_i64(limit))
		.fetch_all(executor)
		.await?;

	Ok(posts)
}

pub async fn thread_replies<'e, E>(executor: E, root_id: Uuid) -> Result<Vec<Post>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {POST_COLUMNS}
FROM posts
WHERE root_id = $1 AND delete_at = 0
ORDER BY create_at ASC, post_id ASC"
	);
	let posts = sqlx::query_as::<_, Post>(&sql).bind(root_id).fetch_all(executor).await?;

	Ok(posts)
}

pub async fn search_posts<'e, E>(executor: E, search: &PostSearch) -> Result<Vec<Post>>
where
	E: PgExecutor<'e>,
{
	if search.channel_ids.is_empty() {
		return Ok(Vec::new());
	}

	let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");

	builder.push(POST_COLUMNS);
	builder.push(" FROM posts WHERE delete_at = 0 AND post_type NOT LIKE 'system\\_%' AND channel_id = ANY(");
	builder.push_bind(search.channel_ids.clone());
	builder.push(")");

	if let Some(author_ids) = search.author_ids.as_ref() {
		builder.push(" AND user_id = ANY(");
		builder.push_bind(author_ids.clone());
		builder.push(")");
	}
	if !search.terms.is_empty() || !search.hashtags.is_empty() {
		let joiner = if search.match_all_terms { " AND " } else { " OR " };
		let mut first = true;

		builder.push(" AND (");

		for term in &search.terms {
			if !first {
				builder.push(joiner);
			}

			first = false;

			builder.push("message ILIKE ");
			builder.push_bind(format!("%{}%", escape_like(term)));
			builder.push(" ESCAPE '\\'");
		}
		for tag in &search.hashtags {
			if !first {
				builder.push(joiner);
			}

			first = false;

			builder.push("(' ' || lower(hashtags) || ' ') LIKE ");
			builder.push_bind(format!("% {} %", escape_like(&hashtag::tag_key(tag))));
			builder.push(" ESCAPE '\\'");
		}

		builder.push(")");
	}

	builder.push(" ORDER BY create_at DESC, post_id DESC LIMIT ");
	builder.push_bind(i64::from(search.limit));

	let posts = builder.build_query_as::<Post>().fetch_all(executor).await?;

	Ok(posts)
}

pub async fn get_channel<'e, E>(executor: E, channel_id: Uuid) -> Result<Option<Channel>>
where
	E: PgExecutor<'e>,
{
	let channel = sqlx::query_as::<_, Channel>(
		"\
SELECT channel_id, team_id, name, display_name
FROM channels
WHERE channel_id = $1 AND delete_at = 0",
	)
	.bind(channel_id)
	.fetch_optional(executor)
	.await?;

	Ok(channel)
}

pub async fn is_channel_member<'e, E>(executor: E, channel_id: Uuid, user_id: Uuid) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let found: Option<i32> = sqlx::query_scalar(
		"SELECT 1 FROM channel_members WHERE channel_id = $1 AND user_id = $2",
	)
	.bind(channel_id)
	.bind(user_id)
	.fetch_optional(executor)
	.await?;

	Ok(found.is_some())
}

/// Returns `None` when the user is not on the team, otherwise whether they administer it.
pub async fn team_membership<'e, E>(executor: E, team_id: Uuid, user_id: Uuid) -> Result<Option<bool>>
where
	E: PgExecutor<'e>,
{
	let team_admin: Option<bool> = sqlx::query_scalar(
		"SELECT team_admin FROM team_members WHERE team_id = $1 AND user_id = $2",
	)
	.bind(team_id)
	.bind(user_id)
	.fetch_optional(executor)
	.await?;

	Ok(team_admin)
}

pub async fn channels_for_user<'e, E>(executor: E, team_id: Uuid, user_id: Uuid) -> Result<Vec<Channel>>
where
	E: PgExecutor<'e>,
{
	let channels = sqlx::query_as::<_, Channel>(
		"\
SELECT c.channel_id, c.team_id, c.name, c.display_name
FROM channels c
JOIN channel_members m ON m.channel_id = c.channel_id
WHERE c.team_id = $1 AND m.user_id = $2 AND c.delete_at = 0
ORDER BY c.name",
	)
	.bind(team_id)
	.bind(user_id)
	.fetch_all(executor)
	.await?;

	Ok(channels)
}

pub async fn user_by_username<'e, E>(executor: E, username: &str) -> Result<Option<User>>
where
	E: PgExecutor<'e>,
{
	let user = sqlx::query_as::<_, User>(
		"SELECT user_id, username, system_admin FROM users WHERE lower(username) = lower($1)",
	)
	.bind(username)
	.fetch_optional(executor)
	.await?;

	Ok(user)
}

pub async fn session_user<'e, E>(executor: E, token: &str, now: i64) -> Result<Option<User>>
where
	E: PgExecutor<'e>,
{
	let user = sqlx::query_as::<_, User>(
		"\
SELECT u.user_id, u.username, u.system_admin
FROM sessions s
JOIN users u ON u.user_id = s.user_id
WHERE s.token = $1 AND s.expires_at > $2",
	)
	.bind(token)
	.bind(now)
	.fetch_optional(executor)
	.await?;

	Ok(user)
}

/// Files among `file_ids` that `user_id` uploaded and that are not attached to a post yet.
pub async fn claimable_files<'e, E>(executor: E, user_id: Uuid, file_ids: &[Uuid]) -> Result<Vec<Uuid>>
where
	E: PgExecutor<'e>,
{
	if file_ids.is_empty() {
		return Ok(Vec::new());
	}

	let claimable = sqlx::query_scalar::<_, Uuid>(
		"\
SELECT file_id
FROM file_infos
WHERE file_id = ANY($1) AND user_id = $2 AND post_id IS NULL AND delete_at = 0",
	)
	.bind(file_ids)
	.bind(user_id)
	.fetch_all(executor)
	.await?;

	Ok(claimable)
}

/// Claims unattached files for a post. Files owned by other users or already attached are skipped.
pub async fn attach_files<'e, E>(
	executor: E,
	post_id: Uuid,
	user_id: Uuid,
	file_ids: &[Uuid],
) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	if file_ids.is_empty() {
		return Ok(0);
	}

	let result = sqlx::query(
		"\
UPDATE file_infos
SET post_id = $1
WHERE file_id = ANY($2) AND user_id = $3 AND post_id IS NULL AND delete_at = 0",
	)
	.bind(post_id)
	.bind(file_ids)
	.bind(user_id)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn file_infos_for_post<'e, E>(executor: E, post_id: Uuid) -> Result<Vec<FileInfo>>
where
	E: PgExecutor<'e>,
{
	let infos = sqlx::query_as::<_, FileInfo>(
		"\
SELECT file_id, post_id, user_id, name, extension, size, mime_type, create_at, delete_at
FROM file_infos
WHERE post_id = $1 AND delete_at = 0
ORDER BY create_at ASC, file_id ASC",
	)
	.bind(post_id)
	.fetch_all(executor)
	.await?;

	Ok(infos)
}

fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for c in raw.chars() {
		if matches!(c, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(c);
	}

	out
}

fn clamp_i64(value: u64) -> i64 {
	i64::try_from(value).unwrap_or(i64::MAX)
}
