use uuid::Uuid;

use quill_service::{Caller, Error};

use super::{Fixture, caller, messages, modified};

#[tokio::test]
async fn thread_lists_root_then_replies_oldest_first() {
	let fx = Fixture::new();
	let root = fx.post(&fx.alice, &fx.town, "root").await;
	let first = fx.reply(&fx.bob, &root, "first reply").await;

	fx.post(&fx.alice, &fx.town, "unrelated").await;
	fx.reply(&fx.alice, &root, "second reply").await;

	let alice = caller(&fx.alice);
	let (_, by_root) = modified(
		fx.service
			.get_post_thread(&alice, &root.post_id.to_string(), None)
			.await
			.expect("Failed to load thread."),
	);

	assert_eq!(messages(&by_root), vec!["root", "first reply", "second reply"]);

	let (_, by_reply) = modified(
		fx.service
			.get_post_thread(&alice, &first.post_id.to_string(), None)
			.await
			.expect("Failed to load thread through a reply."),
	);

	assert_eq!(by_reply.order, by_root.order);
}

#[tokio::test]
async fn lone_posts_and_deleted_replies() {
	let fx = Fixture::new();
	let root = fx.post(&fx.alice, &fx.town, "alone").await;
	let alice = caller(&fx.alice);
	let (_, lone) = modified(
		fx.service
			.get_post_thread(&alice, &root.post_id.to_string(), None)
			.await
			.expect("Failed to load thread."),
	);

	assert_eq!(lone.order, vec![root.post_id]);

	let reply = fx.reply(&fx.bob, &root, "gone soon").await;

	fx.service
		.delete_post(&caller(&fx.team_admin), &reply.post_id.to_string())
		.await
		.expect("Failed to delete reply.");

	let (_, after_delete) = modified(
		fx.service
			.get_post_thread(&alice, &root.post_id.to_string(), None)
			.await
			.expect("Failed to load thread."),
	);

	assert_eq!(after_delete.order, vec![root.post_id]);

	fx.service
		.delete_post(&caller(&fx.team_admin), &root.post_id.to_string())
		.await
		.expect("Failed to delete root.");

	assert!(matches!(
		fx.service.get_post_thread(&alice, &root.post_id.to_string(), None).await,
		Err(Error::NotFound { .. })
	));
}

#[tokio::test]
async fn thread_error_precedence() {
	let fx = Fixture::new();
	let root = fx.post(&fx.alice, &fx.private, "secret").await;

	assert!(matches!(
		fx.service.get_post_thread(&Caller::Anonymous, "junk", None).await,
		Err(Error::Unauthenticated)
	));
	assert!(matches!(
		fx.service.get_post_thread(&caller(&fx.bob), "junk", None).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		fx.service.get_post_thread(&caller(&fx.bob), &root.post_id.to_string(), None).await,
		Err(Error::ScopeDenied { .. })
	));
	assert!(matches!(
		fx.service.get_post_thread(&caller(&fx.bob), &Uuid::new_v4().to_string(), None).await,
		Err(Error::ScopeDenied { .. })
	));
	assert!(matches!(
		fx.service.get_post_thread(&caller(&fx.admin), &Uuid::new_v4().to_string(), None).await,
		Err(Error::NotFound { .. })
	));
}
