mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, DeletePolicy, EditPolicy, Pagination, Posts, Postgres, Search, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.posts.max_message_chars == 0 {
		return Err(Error::Validation {
			message: "posts.max_message_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.posts.edit_policy == EditPolicy::TimeLimit && cfg.posts.edit_time_limit_secs <= 0 {
		return Err(Error::Validation {
			message: "posts.edit_time_limit_secs must be greater than zero when posts.edit_policy is time_limit."
				.to_string(),
		});
	}
	if cfg.pagination.default_per_page == 0 {
		return Err(Error::Validation {
			message: "pagination.default_per_page must be greater than zero.".to_string(),
		});
	}
	if cfg.pagination.max_per_page < cfg.pagination.default_per_page {
		return Err(Error::Validation {
			message: "pagination.max_per_page must be at least pagination.default_per_page."
				.to_string(),
		});
	}
	if cfg.search.max_results == 0 {
		return Err(Error::Validation {
			message: "search.max_results must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let level = cfg.service.log_level.trim();

	cfg.service.log_level = if level.is_empty() { "info".to_string() } else { level.to_string() };
}
