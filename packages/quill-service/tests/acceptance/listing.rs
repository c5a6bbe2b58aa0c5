use std::{collections::HashSet, time::Duration};

use uuid::Uuid;

use quill_service::{Caller, Conditional, Error, Page, PostStore, UpdatePostRequest};
use quill_storage::models::Post;

use super::{Fixture, caller, messages, modified};

#[tokio::test]
async fn channel_pages_are_newest_first() {
	let fx = Fixture::new();

	for n in 1..=5 {
		fx.post(&fx.alice, &fx.town, &format!("post {n}")).await;
	}

	let alice = caller(&fx.alice);
	let channel_id = fx.town.channel_id.to_string();
	let (_, first) = modified(
		fx.service
			.get_posts_for_channel(&alice, &channel_id, Page::new(0, 3), None)
			.await
			.expect("Failed to list page 0."),
	);

	assert_eq!(messages(&first), vec!["post 5", "post 4", "post 3"]);

	let (_, second) = modified(
		fx.service
			.get_posts_for_channel(&alice, &channel_id, Page::new(1, 3), None)
			.await
			.expect("Failed to list page 1."),
	);

	assert_eq!(messages(&second), vec!["post 2", "post 1"]);

	let (_, beyond) = modified(
		fx.service
			.get_posts_for_channel(&alice, &channel_id, Page::new(100, 3), None)
			.await
			.expect("Failed to list a page beyond the data."),
	);

	assert!(beyond.is_empty());
	assert!(beyond.posts.is_empty());

	let (_, everything) = modified(
		fx.service
			.get_posts_for_channel(&alice, &channel_id, Page::default(), None)
			.await
			.expect("Failed to list with defaults."),
	);
	let stamps: Vec<i64> = everything.ordered().map(|post| post.create_at).collect();

	assert_eq!(stamps.len(), 5);
	assert!(stamps.windows(2).all(|pair| pair[0] > pair[1]));
}

#[tokio::test]
async fn listed_replies_carry_their_root_as_context() {
	let fx = Fixture::new();
	let root = fx.post(&fx.alice, &fx.town, "root").await;

	for n in 0..3 {
		fx.post(&fx.bob, &fx.town, &format!("filler {n}")).await;
	}

	let reply = fx.reply(&fx.bob, &root, "reply").await;
	let (_, list) = modified(
		fx.service
			.get_posts_for_channel(
				&caller(&fx.alice),
				&fx.town.channel_id.to_string(),
				Page::new(0, 2),
				None,
			)
			.await
			.expect("Failed to list channel."),
	);

	assert_eq!(list.order.len(), 2);
	assert_eq!(list.order[0], reply.post_id);
	assert!(!list.order.contains(&root.post_id));
	assert_eq!(list.get(&root.post_id).map(|post| post.message.as_str()), Some("root"));
}

#[tokio::test]
async fn since_returns_posts_at_or_after_the_timestamp() {
	let fx = Fixture::new();
	let first = fx.post(&fx.alice, &fx.town, "first").await;
	let second = fx.post(&fx.alice, &fx.town, "second").await;

	fx.post(&fx.alice, &fx.town, "third").await;

	let (_, list) = modified(
		fx.service
			.get_posts_since(&caller(&fx.bob), &fx.town.channel_id.to_string(), second.create_at, None)
			.await
			.expect("Failed to list since."),
	);

	assert_eq!(messages(&list), vec!["third", "second"]);
	assert!(!list.posts.contains_key(&first.post_id));
}

#[tokio::test]
async fn since_scales_to_large_channels() {
	const POSTS: i64 = 20_000;

	let fx = Fixture::new();

	for n in 1..=POSTS {
		let post = Post {
			post_id: Uuid::new_v4(),
			create_at: n,
			update_at: n,
			edit_at: 0,
			delete_at: 0,
			user_id: fx.alice.user_id,
			channel_id: fx.town.channel_id,
			root_id: None,
			parent_id: None,
			message: format!("bulk {n}"),
			hashtags: String::new(),
			file_ids: Vec::new(),
			post_type: String::new(),
		};

		fx.backend.insert_post(&post).await.expect("Failed to seed post.");
	}

	let bob = caller(&fx.bob);
	let channel_id = fx.town.channel_id.to_string();
	let listing = fx.service.get_posts_since(
		&bob,
		&channel_id,
		1,
		None,
	);
	let (_, list) = modified(
		tokio::time::timeout(Duration::from_secs(30), listing)
			.await
			.expect("Listing a large channel took too long.")
			.expect("Failed to list since."),
	);

	assert_eq!(list.len(), POSTS as usize);
	assert_eq!(list.posts.len(), POSTS as usize);
	assert_eq!(list.ordered().next().map(|post| post.create_at), Some(POSTS));
}

#[tokio::test]
async fn before_and_after_never_overlap() {
	let fx = Fixture::new();
	let mut posts = Vec::new();

	for n in 0..9 {
		posts.push(fx.post(&fx.alice, &fx.town, &format!("post {n}")).await);
	}

	let anchor = posts[4].clone();
	let alice = caller(&fx.alice);
	let channel_id = fx.town.channel_id.to_string();
	let anchor_id = anchor.post_id.to_string();
	let mut before_ids: Vec<Uuid> = Vec::new();
	let mut after_ids: Vec<Uuid> = Vec::new();

	for page in 0..4 {
		let (_, before) = modified(
			fx.service
				.get_posts_before(&alice, &channel_id, &anchor_id, Page::new(page, 2), None)
				.await
				.expect("Failed to list before."),
		);
		let (_, after) = modified(
			fx.service
				.get_posts_after(&alice, &channel_id, &anchor_id, Page::new(page, 2), None)
				.await
				.expect("Failed to list after."),
		);
		let before_stamps: Vec<i64> = before.ordered().map(|post| post.create_at).collect();
		let after_stamps: Vec<i64> = after.ordered().map(|post| post.create_at).collect();

		assert!(before_stamps.windows(2).all(|pair| pair[0] > pair[1]));
		assert!(after_stamps.windows(2).all(|pair| pair[0] > pair[1]));

		before_ids.extend(before.order);
		after_ids.extend(after.order);
	}

	let before_set: HashSet<Uuid> = before_ids.iter().copied().collect();
	let after_set: HashSet<Uuid> = after_ids.iter().copied().collect();
	let older: HashSet<Uuid> = posts[..4].iter().map(|post| post.post_id).collect();
	let newer: HashSet<Uuid> = posts[5..].iter().map(|post| post.post_id).collect();

	assert_eq!(before_ids.len(), before_set.len(), "Before pages repeat a post.");
	assert_eq!(after_ids.len(), after_set.len(), "After pages repeat a post.");
	assert!(before_set.is_disjoint(&after_set));
	assert_eq!(before_set, older);
	assert_eq!(after_set, newer);
	assert!(!before_set.contains(&anchor.post_id) && !after_set.contains(&anchor.post_id));

	let (_, nearest_after) = modified(
		fx.service
			.get_posts_after(&alice, &channel_id, &anchor_id, Page::new(0, 2), None)
			.await
			.expect("Failed to list after."),
	);

	assert_eq!(messages(&nearest_after), vec!["post 6", "post 5"]);
}

#[tokio::test]
async fn unusable_anchors_yield_empty_pages() {
	let fx = Fixture::new();
	let foreign_anchor = fx.post(&fx.alice, &fx.off_topic, "elsewhere").await;

	fx.post(&fx.alice, &fx.town, "here").await;

	let alice = caller(&fx.alice);
	let channel_id = fx.town.channel_id.to_string();

	for anchor in [
		"junk".to_string(),
		Uuid::new_v4().to_string(),
		foreign_anchor.post_id.to_string(),
	] {
		let (_, list) = modified(
			fx.service
				.get_posts_before(&alice, &channel_id, &anchor, Page::default(), None)
				.await
				.expect("Anchored listing should not fail."),
		);

		assert!(list.is_empty(), "Anchor {anchor} should produce an empty page.");
	}
}

#[tokio::test]
async fn deleted_posts_leave_listings_but_replies_stay_addressable() {
	let fx = Fixture::new();
	let root = fx.post(&fx.alice, &fx.town, "root").await;
	let reply = fx.reply(&fx.bob, &root, "reply").await;
	let alice = caller(&fx.alice);

	fx.service
		.delete_post(&caller(&fx.team_admin), &root.post_id.to_string())
		.await
		.expect("Failed to delete root.");

	let (_, list) = modified(
		fx.service
			.get_posts_for_channel(&alice, &fx.town.channel_id.to_string(), Page::default(), None)
			.await
			.expect("Failed to list channel."),
	);

	assert_eq!(list.order, vec![reply.post_id]);
	assert!(!list.posts.contains_key(&root.post_id));
	assert!(matches!(
		fx.service.get_post(&alice, &root.post_id.to_string(), None).await,
		Err(Error::NotFound { .. })
	));
	assert!(matches!(
		fx.service.get_post(&caller(&fx.outsider), &root.post_id.to_string(), None).await,
		Err(Error::ScopeDenied { .. })
	));

	let (_, fetched) = modified(
		fx.service
			.get_post(&alice, &reply.post_id.to_string(), None)
			.await
			.expect("Reply stays addressable."),
	);

	assert_eq!(fetched, reply);
}

#[tokio::test]
async fn create_then_get_round_trips() {
	let fx = Fixture::new();
	let post = fx.post(&fx.alice, &fx.town, "hello #world").await;
	let (etag, fetched) = modified(
		fx.service
			.get_post(&caller(&fx.bob), &post.post_id.to_string(), None)
			.await
			.expect("Failed to get post."),
	);

	assert_eq!(fetched, post);

	let again = fx
		.service
		.get_post(&caller(&fx.bob), &post.post_id.to_string(), Some(format!("\"{etag}\"").as_str()))
		.await
		.expect("Failed to get post.");

	assert!(again.is_not_modified());
}

#[tokio::test]
async fn cache_tokens_track_edits() {
	let fx = Fixture::new();
	let target = fx.post(&fx.alice, &fx.town, "one").await;

	fx.post(&fx.alice, &fx.town, "two").await;

	let alice = caller(&fx.alice);
	let channel_id = fx.town.channel_id.to_string();
	let list = |inm: Option<String>| {
		let service = fx.service.clone();
		let channel_id = channel_id.clone();
		let alice = alice.clone();

		async move {
			service
				.get_posts_for_channel(&alice, &channel_id, Page::default(), inm.as_deref())
				.await
				.expect("Failed to list channel.")
		}
	};
	let first = list(None).await;
	let second = list(None).await;

	assert_eq!(first.etag(), second.etag());

	let revalidated = list(Some(first.etag().to_string())).await;

	assert!(matches!(revalidated, Conditional::NotModified { .. }));

	fx.service
		.update_post(
			&alice,
			&target.post_id.to_string(),
			UpdatePostRequest { message: "one, edited".to_string() },
		)
		.await
		.expect("Failed to edit post.");

	let after_edit = list(Some(first.etag().to_string())).await;

	assert_ne!(after_edit.etag(), first.etag());
	assert!(!after_edit.is_not_modified());
}

#[tokio::test]
async fn listing_error_precedence() {
	let fx = Fixture::new();

	assert!(matches!(
		fx.service.get_posts_for_channel(&Caller::Anonymous, "junk", Page::default(), None).await,
		Err(Error::Unauthenticated)
	));
	assert!(matches!(
		fx.service.get_posts_for_channel(&caller(&fx.alice), "junk", Page::default(), None).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		fx.service
			.get_posts_for_channel(
				&caller(&fx.bob),
				&fx.private.channel_id.to_string(),
				Page::default(),
				None,
			)
			.await,
		Err(Error::ScopeDenied { .. })
	));
	assert!(matches!(
		fx.service
			.get_posts_for_channel(
				&caller(&fx.bob),
				&Uuid::new_v4().to_string(),
				Page::default(),
				None,
			)
			.await,
		Err(Error::ScopeDenied { .. })
	));
	assert!(matches!(
		fx.service
			.get_posts_for_channel(
				&caller(&fx.admin),
				&Uuid::new_v4().to_string(),
				Page::default(),
				None,
			)
			.await,
		Err(Error::NotFound { .. })
	));

	let (_, visible) = modified(
		fx.service
			.get_posts_for_channel(
				&caller(&fx.admin),
				&fx.private.channel_id.to_string(),
				Page::default(),
				None,
			)
			.await
			.expect("System admins read every channel."),
	);

	assert!(visible.is_empty());
}
