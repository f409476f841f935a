use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use roster::Grade;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    database::{
        add_points, all_events, all_houses, all_users, delete_event, delete_user, get_event,
        get_house, get_user, get_user_by_provider, insert_event, insert_user, put_event,
        put_house_profile, put_user, put_users,
    },
    error::AppError,
    events::{Event, EventView, NewEvent, ResultUpdate, StatusFilter},
    houses::{HouseProfile, PointsDelta, leaders, parse_house},
    state::AppState,
    users::{Identity, User, UserUpdate, check_leader},
};

type AppResult<T> = Result<T, AppError>;

#[derive(Deserialize)]
pub struct IdentityQuery {
    name: String,
    email: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    name: String,
}

pub async fn identity_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdentityQuery>,
) -> impl IntoResponse {
    Json(state.resolver.resolve(&query.name, &query.email))
}

pub async fn compile_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let summary = state.compile_roster().await?;

    Ok(Json(summary))
}

pub async fn reload_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let keys = state.reload_roster().await?;

    Ok(Json(json!({ "keys": keys })))
}

pub async fn provision_handler(
    State(state): State<Arc<AppState>>,
    Json(identity): Json<Identity>,
) -> AppResult<impl IntoResponse> {
    identity.validate()?;
    let mut conn = state.redis();

    if let Some(user) = get_user_by_provider(&mut conn, &identity.id).await? {
        return Ok((StatusCode::OK, Json(user)));
    }

    let descriptor = state.resolver.resolve(&identity.name, &identity.email);
    info!("New user {} resolved to {descriptor}", identity.email);

    let user = insert_user(&mut conn, User::provision(identity, descriptor, Utc::now())).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn users_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let mut users = all_users(&mut state.redis()).await?;
    users.sort_by_key(|user| user.created_at);

    Ok(Json(users))
}

pub async fn search_users_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<impl IntoResponse> {
    if query.name.trim().is_empty() {
        return Err(AppError::MalformedPayload("Search query is missing".to_string()));
    }

    let users: Vec<User> = all_users(&mut state.redis())
        .await?
        .into_iter()
        .filter(|user| user.matches(&query.name))
        .collect();

    Ok(Json(users))
}

pub async fn user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(get_user(&mut state.redis(), id).await?))
}

pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<UserUpdate>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.redis();
    let mut user = get_user(&mut conn, id).await?;

    check_leader(id, &update, &all_users(&mut conn).await?)?;

    user.apply(update);
    put_user(&mut conn, &user).await?;

    Ok(Json(user))
}

pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.redis();
    let user = get_user(&mut conn, id).await?;

    delete_user(&mut conn, &user).await?;

    Ok(Json(json!({ "message": format!("User {id} removed") })))
}

pub async fn promote_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let mut conn = state.redis();

    let promoted: Vec<User> = all_users(&mut conn)
        .await?
        .into_iter()
        .filter_map(|mut user| user.promote().then_some(user))
        .collect();

    put_users(&mut conn, &promoted).await?;
    info!("Promoted {} students", promoted.len());

    Ok(Json(json!({ "promoted": promoted.len() })))
}

pub async fn graduate_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let mut conn = state.redis();

    let seniors: Vec<User> = all_users(&mut conn)
        .await?
        .into_iter()
        .filter(|user| user.grade == Grade::Twelve)
        .collect();

    for senior in &seniors {
        delete_user(&mut conn, senior).await?;
    }
    info!("Graduated {} seniors", seniors.len());

    Ok(Json(json!({ "graduated": seniors.len() })))
}

pub async fn houses_handler(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    Ok(Json(all_houses(&mut state.redis()).await?))
}

pub async fn house_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let house = parse_house(&name)?;

    Ok(Json(get_house(&mut state.redis(), house).await?))
}

pub async fn update_house_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(profile): Json<HouseProfile>,
) -> AppResult<impl IntoResponse> {
    let house = parse_house(&name)?;
    let mut conn = state.redis();

    put_house_profile(&mut conn, house, &profile).await?;

    Ok(Json(get_house(&mut conn, house).await?))
}

pub async fn points_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(delta): Json<PointsDelta>,
) -> AppResult<impl IntoResponse> {
    let house = parse_house(&name)?;
    let mut conn = state.redis();

    let points = add_points(&mut conn, house, delta.points).await?;
    info!("{house} {:+} points, now {points}", delta.points);

    Ok(Json(get_house(&mut conn, house).await?))
}

pub async fn members_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let house = parse_house(&name)?;

    let members: Vec<User> = all_users(&mut state.redis())
        .await?
        .into_iter()
        .filter(|user| user.house == house)
        .collect();

    Ok(Json(members))
}

pub async fn leaders_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let house = parse_house(&name)?;

    Ok(Json(leaders(house, all_users(&mut state.redis()).await?)))
}

pub async fn create_event_handler(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewEvent>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.redis();

    if let Some(author) = new.author {
        get_user(&mut conn, author).await.map_err(|e| match e {
            AppError::NotFound(_) => AppError::MalformedPayload("Author doesn't exist".to_string()),
            other => other,
        })?;
    }

    let now = Utc::now();
    let event = Event::create(new, now)?;
    insert_event(&mut conn, &event).await?;

    Ok((StatusCode::CREATED, Json(EventView::at(event, now))))
}

pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<StatusFilter>,
) -> AppResult<impl IntoResponse> {
    let now = Utc::now();
    let mut events = all_events(&mut state.redis()).await?;
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let views: Vec<EventView> = events
        .into_iter()
        .map(|event| EventView::at(event, now))
        .filter(|view| filter.status.is_none_or(|status| view.status == status))
        .collect();

    Ok(Json(views))
}

pub async fn event_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    let event = get_event(&mut state.redis(), &slug).await?;

    Ok(Json(EventView::at(event, Utc::now())))
}

pub async fn post_result_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(update): Json<ResultUpdate>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.redis();
    let mut event = get_event(&mut conn, &slug).await?;
    let now = Utc::now();

    event.post_result(update, now);
    put_event(&mut conn, &event).await?;

    Ok(Json(EventView::at(event, now)))
}

pub async fn delete_event_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    delete_event(&mut state.redis(), &slug).await?;

    Ok(Json(json!({ "message": format!("Event {slug} removed") })))
}
