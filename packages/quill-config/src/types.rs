use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub posts: Posts,
	#[serde(default)]
	pub pagination: Pagination,
	#[serde(default)]
	pub search: Search,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Posts {
	pub max_message_chars: u32,
	pub max_file_ids: u32,
	pub edit_policy: EditPolicy,
	/// Only consulted when `edit_policy` is `time_limit`.
	pub edit_time_limit_secs: i64,
	pub delete_policy: DeletePolicy,
}
impl Default for Posts {
	fn default() -> Self {
		Self {
			max_message_chars: 16_383,
			max_file_ids: 5,
			edit_policy: EditPolicy::Always,
			edit_time_limit_secs: 300,
			delete_policy: DeletePolicy::TeamAdmin,
		}
	}
}

/// Who may edit a post after it was created. System administrators bypass the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
	Always,
	Never,
	TimeLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
	/// Authors delete their own posts; team and system administrators delete any post.
	All,
	/// Team and system administrators only. The default.
	TeamAdmin,
	SystemAdmin,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Pagination {
	pub default_per_page: u32,
	pub max_per_page: u32,
}
impl Default for Pagination {
	fn default() -> Self {
		Self { default_per_page: 60, max_per_page: 200 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub max_results: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self { max_results: 100 }
	}
}
