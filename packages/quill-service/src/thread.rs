use crate::{Caller, Conditional, Error, PostList, QuillService, Result, access::require_id, etag};

impl QuillService {
	/// The root post followed by its live replies, oldest first. A reply id resolves to its root.
	pub async fn get_post_thread(
		&self,
		caller: &Caller,
		post_id: &str,
		if_none_match: Option<&str>,
	) -> Result<Conditional<PostList>> {
		let actor = caller.actor()?;
		let post_id = require_id(post_id, "post_id")?;
		let (post, _) = self.readable_post(actor, post_id).await?;
		let root = match post.root_id {
			None => post,
			Some(root_id) => self
				.backends
				.posts
				.get_post(root_id)
				.await?
				.ok_or_else(|| Error::not_found("Thread root not found."))?,
		};

		if root.is_deleted() {
			return Err(Error::not_found("Thread root not found."));
		}

		let mut replies = self.backends.posts.thread_replies(root.post_id).await?;

		replies.retain(|reply| !reply.is_deleted());
		replies.sort_by(|a, b| (a.create_at, a.post_id).cmp(&(b.create_at, b.post_id)));

		let mut list = PostList::default();
		let root_id = root.post_id;

		list.push(root);

		for reply in replies {
			list.push(reply);
		}

		tracing::debug!(%root_id, count = list.len(), "Assembled thread.");

		Ok(Conditional::new(etag::for_post_list(&list), if_none_match, list))
	}
}
