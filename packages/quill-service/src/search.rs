use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Actor, Caller, Conditional, Error, PostList, QuillService, Result, access::require_id, etag};
use quill_domain::query::{self, SearchQuery};
use quill_storage::models::PostSearch;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
	pub terms: String,
	/// AND across free-text terms when true, OR when false.
	#[serde(default = "default_match_all_terms")]
	pub match_all_terms: bool,
}
impl SearchRequest {
	pub fn new(terms: impl Into<String>, match_all_terms: bool) -> Self {
		Self { terms: terms.into(), match_all_terms }
	}
}

fn default_match_all_terms() -> bool {
	true
}

impl QuillService {
	/// Searches the posts of a team that the caller can read, newest first.
	pub async fn search_posts(
		&self,
		caller: &Caller,
		team_id: &str,
		req: SearchRequest,
		if_none_match: Option<&str>,
	) -> Result<Conditional<PostList>> {
		let actor = caller.actor()?;
		let team_id = require_id(team_id, "team_id")?;

		if req.terms.trim().is_empty() {
			return Err(Error::invalid("Search terms are required."));
		}

		let query = query::parse(&req.terms, req.match_all_terms)
			.map_err(|err| Error::invalid(err.to_string()))?;

		self.authorize_team(actor, team_id).await?;

		let list = match self.plan_search(actor, team_id, &query).await? {
			Some(search) => {
				let mut posts = self.backends.posts.search(&search).await?;

				posts.sort_by_key(|post| Reverse((post.create_at, post.post_id)));
				posts.truncate(search.limit as usize);

				let mut list = PostList::default();

				for post in posts {
					list.push(post);
				}

				list
			},
			None => PostList::default(),
		};

		tracing::debug!(%team_id, count = list.len(), "Search finished.");

		Ok(Conditional::new(etag::for_post_list(&list), if_none_match, list))
	}

	/// Resolves channel and user names. `None` means the query cannot match anything.
	async fn plan_search(
		&self,
		actor: &Actor,
		team_id: Uuid,
		query: &SearchQuery,
	) -> Result<Option<PostSearch>> {
		if query.is_empty() || query.wildcard_only {
			return Ok(None);
		}

		let visible = self.backends.members.channels_for_user(team_id, actor.user_id).await?;
		let mut channel_ids = Vec::new();
		let mut scoped = false;

		for name in query.channel_names() {
			scoped = true;

			for channel in visible.iter().filter(|channel| channel.name.eq_ignore_ascii_case(name)) {
				if !channel_ids.contains(&channel.channel_id) {
					channel_ids.push(channel.channel_id);
				}
			}
		}

		if !scoped {
			channel_ids = visible.iter().map(|channel| channel.channel_id).collect();
		}
		if channel_ids.is_empty() {
			return Ok(None);
		}

		let mut author_ids: Option<Vec<Uuid>> = None;

		for name in query.author_names() {
			let authors = author_ids.get_or_insert_with(Vec::new);

			if let Some(user) = self.backends.users.user_by_username(name).await?
				&& !authors.contains(&user.user_id)
			{
				authors.push(user.user_id);
			}
		}

		if author_ids.as_ref().is_some_and(Vec::is_empty) {
			return Ok(None);
		}

		Ok(Some(PostSearch {
			channel_ids,
			author_ids,
			terms: query.terms().map(str::to_string).collect(),
			hashtags: query.hashtags().map(str::to_string).collect(),
			match_all_terms: query.match_all_terms,
			limit: self.cfg.search.max_results,
		}))
	}
}
