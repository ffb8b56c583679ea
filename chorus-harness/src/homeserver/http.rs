//! HTTP implementation of the `Homeserver` boundary.
//!
//! Speaks the client-server API with JSON bodies and per-user bearer
//! tokens. The client carries no global request timeout: sync long-polls
//! set a per-request budget of the server-side wait plus a margin.

use super::Homeserver;
use crate::error::{HarnessError, HarnessResult};
use async_trait::async_trait;
use chorus_types::{
    Cursor, EventId, EventTemplate, HistoryQuery, Membership, MessagesPage, MxcUri, RoomId,
    RoomOptions, RoomView, SyncSnapshot, TimelineEvent, UserId,
};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Query parameter linking restricted media to the event being sent.
const ATTACH_MEDIA_PARAM: &str = "org.matrix.msc3911.attach_media";

/// Configuration for the HTTP homeserver client.
#[derive(Debug, Clone)]
pub struct HomeserverConfig {
    /// Base URL of the server under test, without trailing slash.
    pub base_url: String,
    /// Extra client-side margin on top of the server-side long-poll wait.
    pub request_margin: Duration,
}

impl HomeserverConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_margin: Duration::from_secs(5),
        }
    }
}

/// HTTP client for one homeserver deployment.
pub struct HttpHomeserver {
    client: Client,
    config: HomeserverConfig,
    /// Access tokens keyed by actor identity.
    tokens: RwLock<HashMap<UserId, String>>,
}

// ── Wire types ──

#[derive(Deserialize)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: RoomsSection,
}

#[derive(Deserialize, Default)]
struct RoomsSection {
    #[serde(default)]
    join: HashMap<String, JoinedRoom>,
    #[serde(default)]
    invite: HashMap<String, InvitedRoom>,
    #[serde(default)]
    leave: HashMap<String, JoinedRoom>,
}

#[derive(Deserialize)]
struct JoinedRoom {
    #[serde(default)]
    timeline: Timeline,
    #[serde(default)]
    state: StateSection,
}

#[derive(Deserialize, Default)]
struct Timeline {
    #[serde(default)]
    events: Vec<TimelineEvent>,
    #[serde(default)]
    prev_batch: Option<String>,
}

#[derive(Deserialize, Default)]
struct StateSection {
    #[serde(default)]
    events: Vec<TimelineEvent>,
}

#[derive(Deserialize)]
struct InvitedRoom {
    #[serde(default)]
    invite_state: StateSection,
}

#[derive(Deserialize)]
struct EventIdResponse {
    event_id: String,
}

#[derive(Deserialize)]
struct RoomIdResponse {
    room_id: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    content_uri: String,
}

#[derive(Deserialize, Default)]
struct MessagesResponse {
    #[serde(default)]
    chunk: Vec<TimelineEvent>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

impl HttpHomeserver {
    pub fn new(config: HomeserverConfig) -> Self {
        // No global timeout: long-polls manage their own budget.
        let client = Client::builder()
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            config,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Registers the access token for an actor identity. The harness does
    /// not perform registration or login itself.
    pub async fn set_access_token(&self, user: UserId, token: impl Into<String>) {
        self.tokens.write().await.insert(user, token.into());
    }

    async fn token(&self, user: &UserId) -> HarnessResult<String> {
        self.tokens
            .read()
            .await
            .get(user)
            .cloned()
            .ok_or_else(|| HarnessError::UnknownActor(user.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn room_path(&self, room: &RoomId, suffix: &str) -> String {
        self.url(&format!(
            "/_matrix/client/v3/rooms/{}{}",
            urlencoding::encode(room.as_str()),
            suffix
        ))
    }

    /// Returns the response on 2xx, `UnexpectedStatus` otherwise.
    async fn expect_success(resp: reqwest::Response) -> HarnessResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(HarnessError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }

    fn decode_snapshot(resp: SyncResponse) -> (SyncSnapshot, Cursor) {
        let mut snapshot = SyncSnapshot::default();

        for (room_id, joined) in resp.rooms.join.into_iter().chain(resp.rooms.leave) {
            let mut view = RoomView {
                prev_batch: joined.timeline.prev_batch.map(Cursor::new),
                ..Default::default()
            };
            for event in joined
                .state
                .events
                .iter()
                .chain(joined.timeline.events.iter())
            {
                apply_membership(&mut view, event);
            }
            view.timeline = joined.timeline.events;
            snapshot.rooms.insert(RoomId::new(room_id), view);
        }

        for (room_id, invited) in resp.rooms.invite {
            let mut view = RoomView::default();
            for event in &invited.invite_state.events {
                apply_membership(&mut view, event);
            }
            snapshot.rooms.insert(RoomId::new(room_id), view);
        }

        (snapshot, Cursor::new(resp.next_batch))
    }
}

fn apply_membership(view: &mut RoomView, event: &TimelineEvent) {
    if event.kind != "m.room.member" {
        return;
    }
    let Some(state_key) = &event.state_key else {
        return;
    };
    let membership = match event.content.get("membership").and_then(|m| m.as_str()) {
        Some("invite") => Membership::Invite,
        Some("join") => Membership::Join,
        Some("leave") => Membership::Leave,
        _ => return,
    };
    view.membership.insert(UserId::new(state_key), membership);
}

#[async_trait]
impl Homeserver for HttpHomeserver {
    async fn sync(
        &self,
        user: &UserId,
        since: Option<&Cursor>,
        wait: Duration,
    ) -> HarnessResult<(SyncSnapshot, Cursor)> {
        let token = self.token(user).await?;
        let mut query: Vec<(&str, String)> =
            vec![("timeout", wait.as_millis().to_string())];
        if let Some(cursor) = since {
            query.push(("since", cursor.to_string()));
        }

        debug!("[HTTP] sync for {} since {:?}", user, since);
        let resp = self
            .client
            .get(self.url("/_matrix/client/v3/sync"))
            .bearer_auth(&token)
            .query(&query)
            .timeout(wait + self.config.request_margin)
            .send()
            .await?;
        let resp: SyncResponse = Self::expect_success(resp).await?.json().await?;
        Ok(Self::decode_snapshot(resp))
    }

    async fn create_room(&self, user: &UserId, options: &RoomOptions) -> HarnessResult<RoomId> {
        let token = self.token(user).await?;
        let mut body = serde_json::Map::new();
        if let Some(preset) = &options.preset {
            body.insert("preset".into(), serde_json::json!(preset));
        }
        if let Some(name) = &options.name {
            body.insert("name".into(), serde_json::json!(name));
        }
        if let Some(version) = &options.room_version {
            body.insert("room_version".into(), serde_json::json!(version));
        }
        if let Some(visibility) = &options.history_visibility {
            body.insert(
                "initial_state".into(),
                serde_json::json!([{
                    "type": "m.room.history_visibility",
                    "state_key": "",
                    "content": { "history_visibility": visibility.as_str() },
                }]),
            );
        }

        let resp = self
            .client
            .post(self.url("/_matrix/client/v3/createRoom"))
            .bearer_auth(&token)
            .json(&serde_json::Value::Object(body))
            .send()
            .await?;
        let resp: RoomIdResponse = Self::expect_success(resp).await?.json().await?;
        Ok(RoomId::new(resp.room_id))
    }

    async fn invite(&self, user: &UserId, room: &RoomId, invitee: &UserId) -> HarnessResult<()> {
        let token = self.token(user).await?;
        let resp = self
            .client
            .post(self.room_path(room, "/invite"))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "user_id": invitee.as_str() }))
            .send()
            .await?;
        Self::expect_success(resp).await?;
        Ok(())
    }

    async fn join_room(&self, user: &UserId, room: &RoomId) -> HarnessResult<()> {
        let token = self.token(user).await?;
        let resp = self
            .client
            .post(self.room_path(room, "/join"))
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::expect_success(resp).await?;
        Ok(())
    }

    async fn leave_room(&self, user: &UserId, room: &RoomId) -> HarnessResult<()> {
        let token = self.token(user).await?;
        let resp = self
            .client
            .post(self.room_path(room, "/leave"))
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::expect_success(resp).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        user: &UserId,
        room: &RoomId,
        body: &str,
    ) -> HarnessResult<EventId> {
        let event = EventTemplate::new(
            "m.room.message",
            serde_json::json!({ "msgtype": "m.text", "body": body }),
        );
        self.send_event(user, room, &event).await
    }

    async fn send_event(
        &self,
        user: &UserId,
        room: &RoomId,
        event: &EventTemplate,
    ) -> HarnessResult<EventId> {
        let token = self.token(user).await?;
        let path = match &event.state_key {
            Some(state_key) => self.room_path(
                room,
                &format!(
                    "/state/{}/{}",
                    urlencoding::encode(&event.kind),
                    urlencoding::encode(state_key)
                ),
            ),
            None => self.room_path(
                room,
                &format!(
                    "/send/{}/{}",
                    urlencoding::encode(&event.kind),
                    Uuid::new_v4()
                ),
            ),
        };

        let mut request = self.client.put(path).bearer_auth(&token).json(&event.content);
        if let Some(mxc) = &event.attached_media {
            request = request.query(&[(ATTACH_MEDIA_PARAM, mxc.as_str())]);
        }

        let resp: EventIdResponse = Self::expect_success(request.send().await?)
            .await?
            .json()
            .await?;
        Ok(EventId::new(resp.event_id))
    }

    async fn messages(
        &self,
        user: &UserId,
        room: &RoomId,
        query: &HistoryQuery,
    ) -> HarnessResult<MessagesPage> {
        let token = self.token(user).await?;
        let mut params: Vec<(&str, String)> = vec![("dir", query.dir.as_query().to_string())];
        if let Some(from) = &query.from {
            params.push(("from", from.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(types) = &query.types {
            params.push((
                "filter",
                serde_json::to_string(&serde_json::json!({ "types": types }))?,
            ));
        }

        let resp = self
            .client
            .get(self.room_path(room, "/messages"))
            .bearer_auth(&token)
            .query(&params)
            .send()
            .await?;
        let resp: MessagesResponse = Self::expect_success(resp).await?.json().await?;
        Ok(MessagesPage {
            chunk: resp.chunk,
            start: resp.start.map(Cursor::new),
            end: resp.end.map(Cursor::new),
        })
    }

    async fn state_event_content(
        &self,
        user: &UserId,
        room: &RoomId,
        kind: &str,
        state_key: &str,
    ) -> HarnessResult<serde_json::Value> {
        let token = self.token(user).await?;
        let resp = self
            .client
            .get(self.room_path(
                room,
                &format!(
                    "/state/{}/{}",
                    urlencoding::encode(kind),
                    urlencoding::encode(state_key)
                ),
            ))
            .bearer_auth(&token)
            .send()
            .await?;
        Ok(Self::expect_success(resp).await?.json().await?)
    }

    async fn upload_media(
        &self,
        user: &UserId,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> HarnessResult<MxcUri> {
        let token = self.token(user).await?;
        let resp = self
            .client
            .post(self.url("/_matrix/media/v3/upload"))
            .bearer_auth(&token)
            .query(&[("filename", filename)])
            .header("Content-Type", content_type)
            .body(bytes.to_vec())
            .send()
            .await?;
        let resp: UploadResponse = Self::expect_success(resp).await?.json().await?;
        Ok(MxcUri::new(resp.content_uri))
    }

    async fn download_media(&self, user: &UserId, mxc: &MxcUri) -> HarnessResult<Vec<u8>> {
        let token = self.token(user).await?;
        let (server, media_id) = match (mxc.server_name(), mxc.media_id()) {
            (Some(server), Some(media_id)) => (server, media_id),
            _ => {
                return Err(HarnessError::UnexpectedStatus {
                    status: 400,
                    body: format!("malformed mxc uri: {mxc}"),
                })
            }
        };

        let resp = self
            .client
            .get(self.url(&format!(
                "/_matrix/client/v1/media/download/{}/{}",
                urlencoding::encode(server),
                urlencoding::encode(media_id)
            )))
            .bearer_auth(&token)
            .send()
            .await?;
        Ok(Self::expect_success(resp).await?.bytes().await?.to_vec())
    }

    async fn set_avatar(&self, user: &UserId, mxc: &MxcUri) -> HarnessResult<()> {
        let token = self.token(user).await?;
        let resp = self
            .client
            .put(self.url(&format!(
                "/_matrix/client/v3/profile/{}/avatar_url",
                urlencoding::encode(user.as_str())
            )))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "avatar_url": mxc.as_str() }))
            .send()
            .await?;
        Self::expect_success(resp).await?;
        Ok(())
    }
}
