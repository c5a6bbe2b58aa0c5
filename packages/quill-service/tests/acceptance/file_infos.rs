use quill_service::{CreatePostRequest, Error};

use super::{Fixture, caller, modified};

#[tokio::test]
async fn file_infos_follow_post_order() {
	let fx = Fixture::new();
	let first = fx.backend.add_file(fx.alice.user_id, "first.png");
	let second = fx.backend.add_file(fx.alice.user_id, "second.txt");
	let foreign = fx.backend.add_file(fx.bob.user_id, "bob.pdf");
	let alice = caller(&fx.alice);
	let post = fx
		.service
		.create_post(
			&alice,
			CreatePostRequest {
				channel_id: fx.town.channel_id.to_string(),
				file_ids: vec![
					second.file_id.to_string(),
					first.file_id.to_string(),
					foreign.file_id.to_string(),
				],
				..Default::default()
			},
		)
		.await
		.expect("A post with files may have an empty message.");

	assert_eq!(post.file_ids, vec![second.file_id, first.file_id]);

	let (etag, infos) = modified(
		fx.service
			.get_file_infos_for_post(&caller(&fx.bob), &post.post_id.to_string(), None)
			.await
			.expect("Failed to load file infos."),
	);
	let names: Vec<&str> = infos.iter().map(|info| info.name.as_str()).collect();

	assert_eq!(names, vec!["second.txt", "first.png"]);
	assert_eq!(infos[0].extension, "txt");

	let again = fx
		.service
		.get_file_infos_for_post(&caller(&fx.bob), &post.post_id.to_string(), Some(etag.as_str()))
		.await
		.expect("Failed to revalidate file infos.");

	assert!(again.is_not_modified());
}

#[tokio::test]
async fn posts_without_files_have_no_infos() {
	let fx = Fixture::new();
	let post = fx.post(&fx.alice, &fx.town, "text only").await;
	let (_, infos) = modified(
		fx.service
			.get_file_infos_for_post(&caller(&fx.alice), &post.post_id.to_string(), None)
			.await
			.expect("Failed to load file infos."),
	);

	assert!(infos.is_empty());
	assert!(matches!(
		fx.service.get_file_infos_for_post(&caller(&fx.alice), "junk", None).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		fx.service
			.get_file_infos_for_post(&caller(&fx.outsider), &post.post_id.to_string(), None)
			.await,
		Err(Error::ScopeDenied { .. })
	));
}

#[tokio::test]
async fn too_many_files_are_rejected() {
	let fx = Fixture::new();
	let file_ids = (0..6)
		.map(|n| fx.backend.add_file(fx.alice.user_id, &format!("{n}.txt")).file_id.to_string())
		.collect();
	let result = fx
		.service
		.create_post(
			&caller(&fx.alice),
			CreatePostRequest {
				channel_id: fx.town.channel_id.to_string(),
				message: "bulk".to_string(),
				file_ids,
				..Default::default()
			},
		)
		.await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn claimed_and_foreign_files_are_dropped() {
	let fx = Fixture::new();
	let mine = fx.backend.add_file(fx.alice.user_id, "mine.png");
	let foreign = fx.backend.add_file(fx.bob.user_id, "bob.pdf");
	let alice = caller(&fx.alice);
	let request = |file_ids: Vec<String>, message: &str| CreatePostRequest {
		channel_id: fx.town.channel_id.to_string(),
		message: message.to_string(),
		file_ids,
		..Default::default()
	};
	let only_foreign =
		fx.service.create_post(&alice, request(vec![foreign.file_id.to_string()], "")).await;

	assert!(matches!(only_foreign, Err(Error::InvalidRequest { .. })));

	let with_text = fx
		.service
		.create_post(&alice, request(vec![foreign.file_id.to_string()], "see attached"))
		.await
		.expect("Text posts survive dropped files.");

	assert!(with_text.file_ids.is_empty());

	let first = fx
		.service
		.create_post(&alice, request(vec![mine.file_id.to_string()], ""))
		.await
		.expect("Failed to attach an owned file.");

	assert_eq!(first.file_ids, vec![mine.file_id]);

	let reused = fx
		.service
		.create_post(&alice, request(vec![mine.file_id.to_string()], "again"))
		.await
		.expect("Failed to create post.");

	assert!(reused.file_ids.is_empty());

	let (_, infos) = modified(
		fx.service
			.get_file_infos_for_post(&alice, &first.post_id.to_string(), None)
			.await
			.expect("Failed to load file infos."),
	);

	assert_eq!(infos.len(), 1);
	assert_eq!(infos[0].name, "mine.png");
}
