use std::sync::Arc;

use quill_service::{Backends, PgBackend, QuillService};
use quill_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<QuillService>,
}
impl AppState {
	pub async fn new(config: quill_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let backends = Backends::shared(Arc::new(PgBackend::new(db)));

		Ok(Self::with_service(Arc::new(QuillService::new(config, backends))))
	}

	pub fn with_service(service: Arc<QuillService>) -> Self {
		Self { service }
	}
}
