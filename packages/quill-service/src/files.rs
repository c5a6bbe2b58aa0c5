use crate::{Caller, Conditional, Error, QuillService, Result, access::require_id, etag};
use quill_storage::models::FileInfo;

pub type FileInfoList = Vec<FileInfo>;

impl QuillService {
	/// File metadata of a post in the order of its `file_ids`.
	pub async fn get_file_infos_for_post(
		&self,
		caller: &Caller,
		post_id: &str,
		if_none_match: Option<&str>,
	) -> Result<Conditional<FileInfoList>> {
		let actor = caller.actor()?;
		let post_id = require_id(post_id, "post_id")?;
		let (post, _) = self.readable_post(actor, post_id).await?;

		if post.is_deleted() {
			return Err(Error::not_found("Post not found."));
		}

		let mut infos = if post.file_ids.is_empty() {
			Vec::new()
		} else {
			self.backends.files.file_infos(post.post_id).await?
		};

		infos.retain(|info| info.delete_at == 0);
		infos.sort_by_key(|info| {
			post.file_ids.iter().position(|file_id| *file_id == info.file_id).unwrap_or(usize::MAX)
		});

		Ok(Conditional::new(etag::for_file_infos(post.post_id, &infos), if_none_match, infos))
	}
}
