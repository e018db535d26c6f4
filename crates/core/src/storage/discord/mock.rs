//! In-process fake of the Discord REST API and CDN for adapter tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::models::{CHANNEL_CATEGORY, CHANNEL_TEXT, CHANNEL_VOICE};
use crate::storage::{StorageConfig, StorageProvider, sanitize_filename};

pub const TOKEN: &str = "test-token";
pub const BOT_ID: &str = "900";
pub const APP_ID: &str = "777";
pub const APP_NAME: &str = "Debris Bot";
pub const ICON_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nicon";

#[derive(Debug, Clone)]
pub struct MockGuild {
    pub id: String,
    pub name: String,
    pub owner: bool,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MockChannel {
    pub id: String,
    pub guild_id: String,
    pub kind: u8,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub id: String,
    pub channel_id: String,
    pub attachment_id: String,
    pub filename: String,
    pub content: String,
    pub bytes: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub guilds: Vec<MockGuild>,
    pub channels: Vec<MockChannel>,
    pub messages: Vec<MockMessage>,
    pub left: Vec<String>,
    pub deleted_guilds: Vec<String>,
    pub app_icon: Option<String>,
    /// Answer this many upcoming requests with 429.
    pub rate_limit_next: u32,
    /// Artificial latency of every request.
    pub delay_ms: u64,
    /// Latency added after the handler ran: the effect lands, the answer is late.
    pub reply_delay_ms: u64,
    pub requests: u32,
    /// Messages that are listed but answer 404 on delete.
    pub undeletable: Vec<String>,
    next_id: u64,
}

impl MockState {
    fn id(&mut self) -> String {
        self.next_id += 1;
        (1_000_000 + self.next_id).to_string()
    }

    pub fn add_guild(&mut self, name: &str, owner: bool) -> String {
        let id = self.id();
        self.guilds.push(MockGuild {
            id: id.clone(),
            name: name.to_string(),
            owner,
            icon: None,
        });
        id
    }

    pub fn add_channel(&mut self, guild_id: &str, kind: u8, name: &str) -> String {
        let id = self.id();
        self.channels.push(MockChannel {
            id: id.clone(),
            guild_id: guild_id.to_string(),
            kind,
            name: name.to_string(),
        });
        id
    }

    pub fn add_message(&mut self, channel_id: &str, filename: &str, bytes: &[u8]) -> String {
        let id = self.id();
        let attachment_id = self.id();
        self.messages.push(MockMessage {
            id: id.clone(),
            channel_id: channel_id.to_string(),
            attachment_id,
            filename: filename.to_string(),
            content: String::new(),
            bytes: bytes.to_vec(),
            timestamp: Utc::now(),
        });
        id
    }

    pub fn owned_guilds(&self) -> Vec<&MockGuild> {
        self.guilds.iter().filter(|g| g.owner).collect()
    }

    pub fn channels_of(&self, guild_id: &str) -> Vec<&MockChannel> {
        self.channels
            .iter()
            .filter(|c| c.guild_id == guild_id)
            .collect()
    }
}

#[derive(Clone)]
struct Shared {
    state: Arc<Mutex<MockState>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

pub struct MockDiscord {
    pub base: String,
    shared: Shared,
}

impl MockDiscord {
    pub async fn start() -> Self {
        let shared = Shared {
            state: Arc::new(Mutex::new(MockState::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/api/users/@me", get(current_user))
            .route("/api/users/@me/guilds", get(my_guilds))
            .route("/api/users/@me/guilds/{id}", delete(leave_guild))
            .route("/api/guilds", post(create_guild))
            .route("/api/guilds/{id}", patch(modify_guild).delete(delete_guild))
            .route(
                "/api/guilds/{id}/channels",
                get(guild_channels).post(create_channel),
            )
            .route(
                "/api/channels/{id}",
                patch(modify_channel).delete(delete_channel),
            )
            .route(
                "/api/channels/{id}/messages",
                get(list_messages).post(create_message),
            )
            .route("/api/channels/{id}/messages/{mid}", delete(delete_message))
            .route("/api/channels/{id}/invites", post(create_invite))
            .route("/api/oauth2/applications/@me", get(application))
            .route("/cdn/attachments/{cid}/{aid}/{name}", get(cdn_attachment))
            .route("/cdn/app-icons/{app}/{file}", get(cdn_icon))
            .layer(middleware::from_fn_with_state(shared.clone(), gate))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base: format!("http://{addr}"),
            shared,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.shared.lock()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.shared.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> StorageConfig {
        StorageConfig::new(StorageProvider::discord(
            TOKEN,
            format!("{}/api", self.base),
            format!("{}/cdn", self.base),
        ))
        .with_request_timeout(Duration::from_secs(2))
        .with_max_retries(2)
    }
}

fn not_found(code: u32, message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "code": code, "message": message })),
    )
        .into_response()
}

async fn gate(State(shared): State<Shared>, request: Request, next: Next) -> Response {
    let (delay_ms, reply_delay_ms, limited) = {
        let mut state = shared.lock();
        state.requests += 1;
        let limited = state.rate_limit_next > 0;
        if limited {
            state.rate_limit_next -= 1;
        }
        (state.delay_ms, state.reply_delay_ms, limited)
    };

    if limited {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": 0.01,
                "global": false
            })),
        )
            .into_response();
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bot {TOKEN}").as_str());
    if request.uri().path().starts_with("/api") && !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": 0, "message": "401: Unauthorized" })),
        )
            .into_response();
    }

    let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    shared.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    let response = next.run(request).await;
    shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    if reply_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(reply_delay_ms)).await;
    }
    response
}

async fn current_user() -> Json<Value> {
    Json(json!({ "id": BOT_ID, "username": "debris" }))
}

async fn my_guilds(State(shared): State<Shared>) -> Json<Value> {
    let state = shared.lock();
    let guilds: Vec<Value> = state
        .guilds
        .iter()
        .map(|g| json!({ "id": g.id, "name": g.name, "owner": g.owner }))
        .collect();
    Json(Value::Array(guilds))
}

async fn leave_guild(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = shared.lock();
    let Some(pos) = state.guilds.iter().position(|g| g.id == id && !g.owner) else {
        return not_found(10004, "Unknown Guild");
    };
    state.guilds.remove(pos);
    state.left.push(id);
    StatusCode::NO_CONTENT.into_response()
}

async fn create_guild(State(shared): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = shared.lock();
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let id = state.add_guild(&name, true);
    state.add_channel(&id, CHANNEL_CATEGORY, "Text Channels");
    state.add_channel(&id, CHANNEL_TEXT, "general");
    state.add_channel(&id, CHANNEL_CATEGORY, "Voice Channels");
    state.add_channel(&id, CHANNEL_VOICE, "General");
    Json(json!({ "id": id, "name": name }))
}

async fn modify_guild(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = shared.lock();
    let Some(guild) = state.guilds.iter_mut().find(|g| g.id == id) else {
        return not_found(10004, "Unknown Guild");
    };
    if let Some(name) = body["name"].as_str() {
        guild.name = name.to_string();
    }
    guild.icon = body["icon"].as_str().map(str::to_string);
    Json(json!({ "id": guild.id, "name": guild.name })).into_response()
}

async fn delete_guild(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = shared.lock();
    let Some(pos) = state.guilds.iter().position(|g| g.id == id && g.owner) else {
        return not_found(10004, "Unknown Guild");
    };
    state.guilds.remove(pos);
    state.channels.retain(|c| c.guild_id != id);
    state.deleted_guilds.push(id);
    StatusCode::NO_CONTENT.into_response()
}

async fn guild_channels(State(shared): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    let state = shared.lock();
    let channels: Vec<Value> = state
        .channels_of(&id)
        .into_iter()
        .map(|c| json!({ "id": c.id, "type": c.kind, "name": c.name }))
        .collect();
    Json(Value::Array(channels))
}

async fn create_channel(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut state = shared.lock();
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let kind = u8::try_from(body["type"].as_u64().unwrap_or(0)).unwrap_or(0);
    let channel_id = state.add_channel(&id, kind, &name);
    Json(json!({ "id": channel_id, "type": kind, "name": name }))
}

async fn modify_channel(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = shared.lock();
    let Some(channel) = state.channels.iter_mut().find(|c| c.id == id) else {
        return not_found(10003, "Unknown Channel");
    };
    if let Some(name) = body["name"].as_str() {
        channel.name = name.to_string();
    }
    Json(json!({ "id": channel.id, "type": channel.kind, "name": channel.name })).into_response()
}

async fn delete_channel(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = shared.lock();
    let Some(pos) = state.channels.iter().position(|c| c.id == id) else {
        return not_found(10003, "Unknown Channel");
    };
    state.channels.remove(pos);
    StatusCode::NO_CONTENT.into_response()
}

fn message_json(message: &MockMessage) -> Value {
    json!({
        "id": message.id,
        "channel_id": message.channel_id,
        "content": message.content,
        "timestamp": message.timestamp.to_rfc3339(),
        "attachments": [{
            "id": message.attachment_id,
            "filename": message.filename,
            "size": message.bytes.len(),
            "url": format!(
                "https://cdn.discordapp.com/attachments/{}/{}/{}",
                message.channel_id, message.attachment_id, message.filename
            )
        }]
    })
}

async fn create_message(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut content = String::new();
    let mut filename = None;
    let mut bytes = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("payload_json") => {
                let text = field.text().await.unwrap_or_default();
                let payload: Value = serde_json::from_str(&text).unwrap_or_default();
                content = payload["content"].as_str().unwrap_or_default().to_string();
            }
            Some("files[0]") => {
                filename = field.file_name().map(str::to_string);
                bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            }
            _ => {}
        }
    }

    let Some(filename) = filename else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": 50006, "message": "Cannot send an empty message" })),
        )
            .into_response();
    };

    let mut state = shared.lock();
    if !state.channels.iter().any(|c| c.id == id) {
        return not_found(10003, "Unknown Channel");
    }
    let message_id = state.add_message(&id, &sanitize_filename(&filename), &bytes);
    let message = state
        .messages
        .iter_mut()
        .find(|m| m.id == message_id)
        .unwrap();
    message.content = content;
    Json(message_json(message)).into_response()
}

async fn list_messages(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let limit = query
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(50);
    let state = shared.lock();
    let messages: Vec<Value> = state
        .messages
        .iter()
        .filter(|m| m.channel_id == id)
        .take(limit)
        .map(message_json)
        .collect();
    Json(Value::Array(messages))
}

async fn delete_message(
    State(shared): State<Shared>,
    Path((id, mid)): Path<(String, String)>,
) -> Response {
    let mut state = shared.lock();
    if state.undeletable.contains(&mid) {
        return not_found(10008, "Unknown Message");
    }
    let Some(pos) = state
        .messages
        .iter()
        .position(|m| m.channel_id == id && m.id == mid)
    else {
        return not_found(10008, "Unknown Message");
    };
    state.messages.remove(pos);
    StatusCode::NO_CONTENT.into_response()
}

async fn create_invite() -> Json<Value> {
    Json(json!({ "code": "debrisinv" }))
}

async fn application(State(shared): State<Shared>) -> Json<Value> {
    let state = shared.lock();
    Json(json!({ "id": APP_ID, "name": APP_NAME, "icon": state.app_icon }))
}

async fn cdn_attachment(
    State(shared): State<Shared>,
    Path((cid, aid, name)): Path<(String, String, String)>,
) -> Response {
    let state = shared.lock();
    let Some(message) = state
        .messages
        .iter()
        .find(|m| m.channel_id == cid && m.attachment_id == aid && m.filename == name)
    else {
        return StatusCode::NOT_FOUND.into_response();
    };
    (
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::CACHE_CONTROL, "public, max-age=31536000"),
            (header::ETAG, "\"mock-etag\""),
        ],
        message.bytes.clone(),
    )
        .into_response()
}

async fn cdn_icon() -> Response {
    ([(header::CONTENT_TYPE, "image/png")], ICON_BYTES).into_response()
}
