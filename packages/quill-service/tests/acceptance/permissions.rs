use uuid::Uuid;

use quill_service::{Caller, Error, UpdatePostRequest};

use super::{Fixture, caller, modified};

#[tokio::test]
async fn sessions_resolve_to_callers() {
	let fx = Fixture::new();
	let token = fx.backend.add_session(fx.alice.user_id);
	let resolved = fx
		.service
		.caller_for_token(Some(token.as_str()))
		.await
		.expect("Failed to resolve session.");

	assert_eq!(resolved, caller(&fx.alice));
	assert_eq!(
		fx.service.caller_for_token(Some("unknown")).await.expect("Lookup failed."),
		Caller::Anonymous
	);
	assert_eq!(fx.service.caller_for_token(None).await.expect("Lookup failed."), Caller::Anonymous);

	fx.backend.expire_session(&token);

	assert_eq!(
		fx.service.caller_for_token(Some(token.as_str())).await.expect("Lookup failed."),
		Caller::Anonymous
	);
}

#[tokio::test]
async fn get_post_precedence() {
	let fx = Fixture::new();
	let secret = fx.post(&fx.alice, &fx.private, "secret").await;

	assert!(matches!(
		fx.service.get_post(&Caller::Anonymous, "", None).await,
		Err(Error::Unauthenticated)
	));
	assert!(matches!(
		fx.service.get_post(&caller(&fx.bob), "", None).await,
		Err(Error::NotFound { .. })
	));
	assert!(matches!(
		fx.service.get_post(&caller(&fx.bob), "junk", None).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		fx.service.get_post(&caller(&fx.bob), &secret.post_id.to_string(), None).await,
		Err(Error::ScopeDenied { .. })
	));
	assert!(matches!(
		fx.service.get_post(&caller(&fx.bob), &Uuid::new_v4().to_string(), None).await,
		Err(Error::ScopeDenied { .. })
	));
	assert!(matches!(
		fx.service.get_post(&caller(&fx.admin), &Uuid::new_v4().to_string(), None).await,
		Err(Error::NotFound { .. })
	));

	let (_, seen_by_admin) = modified(
		fx.service
			.get_post(&caller(&fx.admin), &secret.post_id.to_string(), None)
			.await
			.expect("System admins read every post."),
	);

	assert_eq!(seen_by_admin.post_id, secret.post_id);
}

#[tokio::test]
async fn leaving_a_channel_revokes_read_access() {
	let fx = Fixture::new();
	let post = fx.post(&fx.alice, &fx.town, "before leaving").await;

	fx.backend.remove_channel_member(fx.town.channel_id, fx.bob.user_id);

	assert!(matches!(
		fx.service.get_post(&caller(&fx.bob), &post.post_id.to_string(), None).await,
		Err(Error::ScopeDenied { .. })
	));
}

#[tokio::test]
async fn update_precedence() {
	let fx = Fixture::new();
	let post = fx.post(&fx.alice, &fx.town, "original").await;
	let request = || UpdatePostRequest { message: "changed".to_string() };

	assert!(matches!(
		fx.service.update_post(&Caller::Anonymous, "junk", request()).await,
		Err(Error::Unauthenticated)
	));
	assert!(matches!(
		fx.service.update_post(&caller(&fx.alice), "junk", request()).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		fx.service
			.update_post(
				&caller(&fx.outsider),
				&post.post_id.to_string(),
				UpdatePostRequest { message: "  ".to_string() },
			)
			.await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		fx.service.update_post(&caller(&fx.outsider), &post.post_id.to_string(), request()).await,
		Err(Error::ScopeDenied { .. })
	));
	assert!(matches!(
		fx.service.update_post(&caller(&fx.bob), &post.post_id.to_string(), request()).await,
		Err(Error::ScopeDenied { .. })
	));
	assert!(matches!(
		fx.service
			.update_post(
				&caller(&fx.alice),
				&post.post_id.to_string(),
				UpdatePostRequest { message: String::new() },
			)
			.await,
		Err(Error::InvalidRequest { .. })
	));

	fx.service
		.delete_post(&caller(&fx.team_admin), &post.post_id.to_string())
		.await
		.expect("Failed to delete post.");

	assert!(matches!(
		fx.service.update_post(&caller(&fx.alice), &post.post_id.to_string(), request()).await,
		Err(Error::NotFound { .. })
	));
}
