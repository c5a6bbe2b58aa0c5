//! Cache tokens for read results.
//!
//! Tokens are deterministic: the same result yields the same token across calls and processes,
//! and any create, edit or delete touching a contained post changes it.

use uuid::Uuid;

use crate::PostList;
use quill_storage::models::{FileInfo, Post};

const TOKEN_VERSION: &str = "v1";

pub fn for_post_list(list: &PostList) -> String {
	let mut hasher = blake3::Hasher::new();
	let mut ids: Vec<&Uuid> = list.posts.keys().collect();
	let mut max = [0_i64; 4];

	hasher.update(TOKEN_VERSION.as_bytes());
	hasher.update(&(list.order.len() as u64).to_le_bytes());

	for post_id in &list.order {
		hasher.update(post_id.as_bytes());
	}

	ids.sort();

	for post_id in ids {
		let Some(post) = list.posts.get(post_id) else {
			continue;
		};

		hash_post(&mut hasher, post);

		for (slot, value) in
			max.iter_mut().zip([post.create_at, post.update_at, post.edit_at, post.delete_at])
		{
			*slot = (*slot).max(value);
		}
	}

	for value in max {
		hasher.update(&value.to_le_bytes());
	}

	render(hasher)
}

pub fn for_post(post: &Post) -> String {
	let mut hasher = blake3::Hasher::new();

	hasher.update(TOKEN_VERSION.as_bytes());
	hash_post(&mut hasher, post);
	hasher.update(&post.create_at.to_le_bytes());

	render(hasher)
}

pub fn for_file_infos(post_id: Uuid, infos: &[FileInfo]) -> String {
	let mut hasher = blake3::Hasher::new();

	hasher.update(TOKEN_VERSION.as_bytes());
	hasher.update(post_id.as_bytes());

	for info in infos {
		hasher.update(info.file_id.as_bytes());
		hasher.update(&info.create_at.to_le_bytes());
		hasher.update(&info.delete_at.to_le_bytes());
	}

	render(hasher)
}

/// Whether an `If-None-Match` value names `etag`. Accepts quoted, weak and comma-separated forms.
pub fn matches(etag: &str, if_none_match: Option<&str>) -> bool {
	let Some(header) = if_none_match else {
		return false;
	};

	header.split(',').map(str::trim).any(|candidate| {
		if candidate == "*" {
			return true;
		}

		let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);

		candidate.trim_matches('"') == etag
	})
}

fn hash_post(hasher: &mut blake3::Hasher, post: &Post) {
	hasher.update(post.post_id.as_bytes());
	hasher.update(&post.update_at.to_le_bytes());
	hasher.update(&post.edit_at.to_le_bytes());
	hasher.update(&post.delete_at.to_le_bytes());
}

fn render(hasher: blake3::Hasher) -> String {
	format!("{TOKEN_VERSION}.{}", hasher.finalize().to_hex())
}
