use axum::{
	Json, Router,
	extract::{Path, Query, State, rejection::JsonRejection},
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use quill_service::{
	Caller, Conditional, CreatePostRequest, Error as ServiceError, Page, SearchRequest,
	UpdatePostRequest,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/v4/posts", post(create_post))
		.route("/api/v4/posts/{post_id}", get(get_post).put(update_post).delete(delete_post))
		.route("/api/v4/posts/{post_id}/thread", get(get_post_thread))
		.route("/api/v4/posts/{post_id}/files/info", get(get_file_infos))
		.route("/api/v4/channels/{channel_id}/posts", get(get_channel_posts))
		.route("/api/v4/teams/{team_id}/posts/search", post(search_posts))
		.with_state(state)
}

/// Query string of the channel listing. `since` wins over `after`, which wins over `before`;
/// without any of them the plain page window applies.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChannelPostsQuery {
	pub page: u32,
	pub per_page: u32,
	pub since: i64,
	pub before: String,
	pub after: String,
}

#[derive(Debug, Serialize)]
struct StatusBody {
	status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::Unauthenticated =>
				Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string()),
			ServiceError::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::ScopeDenied { message } =>
				Self::new(StatusCode::FORBIDDEN, "scope_denied", message),
			ServiceError::NotFound { message } =>
				Self::new(StatusCode::NOT_FOUND, "not_found", message),
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage failure while serving a request.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Internal storage error.")
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn create_post(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
	let caller = caller(&state, &headers).await?;
	let payload = json_body(payload)?;
	let post = state.service.create_post(&caller, payload).await?;

	Ok((StatusCode::CREATED, Json(post)).into_response())
}

async fn get_post(
	State(state): State<AppState>,
	Path(post_id): Path<String>,
	headers: HeaderMap,
) -> Result<Response, ApiError> {
	let caller = caller(&state, &headers).await?;
	let result = state.service.get_post(&caller, &post_id, if_none_match(&headers)).await?;

	Ok(conditional(result))
}

async fn update_post(
	State(state): State<AppState>,
	Path(post_id): Path<String>,
	headers: HeaderMap,
	payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
	let caller = caller(&state, &headers).await?;
	let payload = json_body(payload)?;
	let post = state.service.update_post(&caller, &post_id, payload).await?;

	Ok(Json(post).into_response())
}

async fn delete_post(
	State(state): State<AppState>,
	Path(post_id): Path<String>,
	headers: HeaderMap,
) -> Result<Response, ApiError> {
	let caller = caller(&state, &headers).await?;

	state.service.delete_post(&caller, &post_id).await?;

	Ok(Json(StatusBody { status: "OK" }).into_response())
}

async fn get_post_thread(
	State(state): State<AppState>,
	Path(post_id): Path<String>,
	headers: HeaderMap,
) -> Result<Response, ApiError> {
	let caller = caller(&state, &headers).await?;
	let result = state.service.get_post_thread(&caller, &post_id, if_none_match(&headers)).await?;

	Ok(conditional(result))
}

async fn get_file_infos(
	State(state): State<AppState>,
	Path(post_id): Path<String>,
	headers: HeaderMap,
) -> Result<Response, ApiError> {
	let caller = caller(&state, &headers).await?;
	let result =
		state.service.get_file_infos_for_post(&caller, &post_id, if_none_match(&headers)).await?;

	Ok(conditional(result))
}

async fn get_channel_posts(
	State(state): State<AppState>,
	Path(channel_id): Path<String>,
	Query(query): Query<ChannelPostsQuery>,
	headers: HeaderMap,
) -> Result<Response, ApiError> {
	let caller = caller(&state, &headers).await?;
	let inm = if_none_match(&headers);
	let page = Page::new(query.page, query.per_page);
	let service = &state.service;
	let result = if query.since > 0 {
		service.get_posts_since(&caller, &channel_id, query.since, inm).await?
	} else if !query.after.is_empty() {
		service.get_posts_after(&caller, &channel_id, &query.after, page, inm).await?
	} else if !query.before.is_empty() {
		service.get_posts_before(&caller, &channel_id, &query.before, page, inm).await?
	} else {
		service.get_posts_for_channel(&caller, &channel_id, page, inm).await?
	};

	Ok(conditional(result))
}

async fn search_posts(
	State(state): State<AppState>,
	Path(team_id): Path<String>,
	headers: HeaderMap,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
	let caller = caller(&state, &headers).await?;
	let payload = json_body(payload)?;
	let result =
		state.service.search_posts(&caller, &team_id, payload, if_none_match(&headers)).await?;

	Ok(conditional(result))
}

async fn caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
	let token = headers
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(session_token);

	Ok(state.service.caller_for_token(token).await?)
}

/// Body rejections are reported after authentication so anonymous callers still see 401.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
	match payload {
		Ok(Json(payload)) => Ok(payload),
		Err(rejection) =>
			Err(ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())),
	}
}

/// Accepts `Bearer <token>` and `Token <token>`.
fn session_token(value: &str) -> Option<&str> {
	let (scheme, token) = value.trim().split_once(' ')?;

	if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token") {
		Some(token.trim())
	} else {
		None
	}
}

fn if_none_match(headers: &HeaderMap) -> Option<&str> {
	headers.get(header::IF_NONE_MATCH).and_then(|value| value.to_str().ok())
}

fn conditional<T>(result: Conditional<T>) -> Response
where
	T: Serialize,
{
	match result {
		Conditional::Modified { etag, body } =>
			([(header::ETAG, format!("\"{etag}\""))], Json(body)).into_response(),
		Conditional::NotModified { etag } =>
			(StatusCode::NOT_MODIFIED, [(header::ETAG, format!("\"{etag}\""))]).into_response(),
	}
}
