use std::time::Duration;

use tokio::time;

use quill_service::{MembershipChange, Page, PostList, SearchRequest};
use quill_storage::models::POST_TYPE_JOIN_LEAVE;

use super::{Fixture, caller, modified};

async fn town_posts(fx: &Fixture) -> PostList {
	let (_, list) = modified(
		fx.service
			.get_posts_for_channel(
				&caller(&fx.alice),
				&fx.town.channel_id.to_string(),
				Page::default(),
				None,
			)
			.await
			.expect("Failed to list channel."),
	);

	list
}

#[tokio::test]
async fn membership_posts_become_visible_eventually() {
	let fx = Fixture::new();

	fx.service.spawn_membership_post(&fx.bob, fx.town.channel_id, MembershipChange::Joined);

	let mut found = None;

	for _ in 0..50 {
		let list = town_posts(&fx).await;

		if let Some(post) = list.ordered().find(|post| post.post_type == POST_TYPE_JOIN_LEAVE) {
			found = Some(post.clone());

			break;
		}

		time::sleep(Duration::from_millis(20)).await;
	}

	let post = found.expect("Join post never became visible.");

	assert_eq!(post.user_id, fx.bob.user_id);
	assert_eq!(post.message, "Bob joined the channel.");
	assert!(post.is_system());
}

#[tokio::test]
async fn membership_posts_stay_out_of_search() {
	let fx = Fixture::new();

	fx.post(&fx.bob, &fx.town, "Bob says hi").await;
	fx.service
		.spawn_membership_post(&fx.bob, fx.town.channel_id, MembershipChange::Left)
		.await
		.expect("Membership task panicked.");

	assert_eq!(town_posts(&fx).await.len(), 2);

	let (_, results) = modified(
		fx.service
			.search_posts(
				&caller(&fx.alice),
				&fx.team_id.to_string(),
				SearchRequest::new("from:bob", false),
				None,
			)
			.await
			.expect("Search failed."),
	);

	assert_eq!(results.len(), 1);
}
