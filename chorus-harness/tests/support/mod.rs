//! Shared test double: an in-process homeserver with real long-poll
//! semantics and restricted-media visibility gating.
//!
//! State transitions are deterministic and serialized under one lock;
//! the only concurrency is the long-poll wait, driven by a `Notify` so
//! sync callers wake exactly when a mutation lands. An optional join
//! delay widens the invite/join race window for choreography tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chorus_harness::error::{HarnessError, HarnessResult};
use chorus_harness::{Actor, Homeserver};
use chorus_types::{
    Cursor, Direction, EventId, EventTemplate, HistoryQuery, HistoryVisibility, Membership,
    MessagesPage, MxcUri, RoomId, RoomOptions, RoomView, SyncSnapshot, TimelineEvent, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

pub const SERVER_NAME: &str = "mock.hs";

/// Tiny stand-ins for the image fixtures.
pub const PNG_FIXTURE: &[u8] = b"\x89PNG\r\n\x1a\nmock-png-payload";
pub const SVG_FIXTURE: &[u8] = b"<svg xmlns='http://www.w3.org/2000/svg'/>";

struct MockMedia {
    bytes: Vec<u8>,
    /// Room whose history visibility scopes this medium; `None` until the
    /// medium is attached to an event (profile avatars stay unattached).
    attached_room: Option<RoomId>,
}

struct MockRoom {
    visibility: HistoryVisibility,
    public: bool,
    membership: HashMap<UserId, Membership>,
    /// Stream position of each member's latest membership change.
    member_pos: HashMap<UserId, u64>,
    /// Current membership event content per member.
    member_content: HashMap<UserId, serde_json::Value>,
    timeline: Vec<(u64, TimelineEvent)>,
}

struct Inner {
    stream_pos: u64,
    counter: u64,
    rooms: HashMap<RoomId, MockRoom>,
    media: HashMap<MxcUri, MockMedia>,
    profiles: HashMap<UserId, MxcUri>,
}

/// In-process server under test.
pub struct MockHomeserver {
    inner: Mutex<Inner>,
    notify: Notify,
    join_delay: Mutex<Option<Duration>>,
}

fn denied(status: u16, body: &str) -> HarnessError {
    HarnessError::UnexpectedStatus {
        status,
        body: body.to_string(),
    }
}

impl Inner {
    fn next_event_id(&mut self) -> EventId {
        self.counter += 1;
        EventId::new(format!("$e{}:{}", self.counter, SERVER_NAME))
    }

    fn next_mxc(&mut self) -> MxcUri {
        self.counter += 1;
        MxcUri::new(format!("mxc://{}/m{}", SERVER_NAME, self.counter))
    }

    fn next_room_id(&mut self) -> RoomId {
        self.counter += 1;
        RoomId::new(format!("!r{}:{}", self.counter, SERVER_NAME))
    }

    fn append_event(
        &mut self,
        room_id: &RoomId,
        sender: &UserId,
        kind: &str,
        state_key: Option<String>,
        content: serde_json::Value,
    ) -> EventId {
        let event_id = self.next_event_id();
        self.stream_pos += 1;
        let pos = self.stream_pos;
        let event = TimelineEvent {
            event_id: event_id.clone(),
            sender: sender.clone(),
            kind: kind.to_string(),
            state_key,
            content,
        };
        let room = self.rooms.get_mut(room_id).expect("room exists");
        room.timeline.push((pos, event));
        event_id
    }

    /// Copies the user's global profile avatar into room-scoped media, the
    /// way the server materializes a per-room membership avatar.
    fn copy_profile_avatar(&mut self, user: &UserId, room_id: &RoomId) -> Option<MxcUri> {
        let global = self.profiles.get(user)?.clone();
        let bytes = self.media.get(&global)?.bytes.clone();
        let copy = self.next_mxc();
        self.media.insert(
            copy.clone(),
            MockMedia {
                bytes,
                attached_room: Some(room_id.clone()),
            },
        );
        Some(copy)
    }

    fn set_membership(
        &mut self,
        room_id: &RoomId,
        sender: &UserId,
        target: &UserId,
        membership: Membership,
        avatar: Option<&MxcUri>,
    ) -> EventId {
        let mut content = serde_json::json!({ "membership": membership.as_str() });
        if let Some(mxc) = avatar {
            content["avatar_url"] = serde_json::json!(mxc.as_str());
        }
        let event_id = self.append_event(
            room_id,
            sender,
            "m.room.member",
            Some(target.to_string()),
            content.clone(),
        );
        let pos = self.stream_pos;
        let room = self.rooms.get_mut(room_id).expect("room exists");
        room.membership.insert(target.clone(), membership);
        room.member_pos.insert(target.clone(), pos);
        room.member_content.insert(target.clone(), content);
        event_id
    }

    fn snapshot_for(&self, user: &UserId, since: Option<u64>) -> SyncSnapshot {
        let mut snapshot = SyncSnapshot::default();
        let since_pos = since.unwrap_or(0);

        for (room_id, room) in &self.rooms {
            let Some(my_membership) = room.membership.get(user) else {
                continue;
            };

            let membership_changed = since.is_none()
                || room.member_pos.values().any(|pos| *pos > since_pos);
            let timeline: Vec<TimelineEvent> = if *my_membership == Membership::Join {
                room.timeline
                    .iter()
                    .filter(|(pos, _)| *pos > since_pos)
                    .map(|(_, event)| event.clone())
                    .collect()
            } else {
                Vec::new()
            };

            if !membership_changed && timeline.is_empty() {
                continue;
            }

            let prev_batch = room
                .timeline
                .iter()
                .map(|(pos, _)| *pos)
                .find(|pos| *pos > since_pos)
                .map(|first| Cursor::new(first.saturating_sub(1).to_string()))
                .or_else(|| Some(Cursor::new(self.stream_pos.to_string())));

            snapshot.rooms.insert(
                room_id.clone(),
                RoomView {
                    membership: room.membership.clone(),
                    timeline,
                    prev_batch,
                },
            );
        }

        snapshot
    }

    fn may_view_media(&self, user: &UserId, media: &MockMedia) -> bool {
        let Some(room_id) = &media.attached_room else {
            // Unattached media (e.g. a fresh profile avatar) is visible to
            // any authenticated user.
            return true;
        };
        let Some(room) = self.rooms.get(room_id) else {
            return false;
        };
        match room.visibility {
            HistoryVisibility::Joined => {
                room.membership.get(user) == Some(&Membership::Join)
            }
            HistoryVisibility::Invited => matches!(
                room.membership.get(user),
                Some(Membership::Join) | Some(Membership::Invite)
            ),
            // Shared behaves world-viewable here, matching the deployed
            // server behavior the scenarios document.
            HistoryVisibility::Shared | HistoryVisibility::WorldReadable => true,
        }
    }
}

impl MockHomeserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                stream_pos: 0,
                counter: 0,
                rooms: HashMap::new(),
                media: HashMap::new(),
                profiles: HashMap::new(),
            }),
            notify: Notify::new(),
            join_delay: Mutex::new(None),
        })
    }

    /// Delays join application to widen the invite/join race window.
    pub fn set_join_delay(&self, delay: Duration) {
        *self.join_delay.lock().unwrap() = Some(delay);
    }

    pub fn user(localpart: &str) -> UserId {
        UserId::new(format!("@{localpart}:{SERVER_NAME}"))
    }

    pub fn actor(self: &Arc<Self>, localpart: &str) -> Actor {
        Actor::new(self.clone() as Arc<dyn Homeserver>, Self::user(localpart))
            .with_server_wait(Duration::from_millis(200))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn wake(&self) {
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl Homeserver for MockHomeserver {
    async fn sync(
        &self,
        user: &UserId,
        since: Option<&Cursor>,
        wait: Duration,
    ) -> HarnessResult<(SyncSnapshot, Cursor)> {
        let since_pos = since.map(|c| c.as_str().parse::<u64>().unwrap_or(0));
        let deadline = Instant::now() + wait;

        loop {
            let notified = self.notify.notified();
            {
                let inner = self.lock();
                let snapshot = inner.snapshot_for(user, since_pos);
                let cursor = Cursor::new(inner.stream_pos.to_string());
                let expired = Instant::now() >= deadline;
                if !snapshot.is_empty() || since_pos.is_none() || expired {
                    return Ok((snapshot, cursor));
                }
            }
            // Wait for a mutation or the server-side budget, then re-check.
            let _ = tokio::time::timeout_at(deadline, notified).await;
        }
    }

    async fn create_room(&self, user: &UserId, options: &RoomOptions) -> HarnessResult<RoomId> {
        let room_id = {
            let mut inner = self.lock();
            let room_id = inner.next_room_id();
            inner.rooms.insert(
                room_id.clone(),
                MockRoom {
                    visibility: options
                        .history_visibility
                        .unwrap_or(HistoryVisibility::Shared),
                    public: options.preset.as_deref() == Some("public_chat"),
                    membership: HashMap::new(),
                    member_pos: HashMap::new(),
                    member_content: HashMap::new(),
                    timeline: Vec::new(),
                },
            );
            inner.append_event(
                &room_id,
                user,
                "m.room.create",
                Some(String::new()),
                serde_json::json!({ "creator": user.as_str() }),
            );
            let avatar = inner.copy_profile_avatar(user, &room_id);
            inner.set_membership(&room_id, user, user, Membership::Join, avatar.as_ref());
            room_id
        };
        self.wake();
        Ok(room_id)
    }

    async fn invite(&self, user: &UserId, room: &RoomId, invitee: &UserId) -> HarnessResult<()> {
        {
            let mut inner = self.lock();
            let room_state = inner.rooms.get(room).ok_or_else(|| denied(404, "no room"))?;
            if room_state.membership.get(user) != Some(&Membership::Join) {
                return Err(denied(403, "inviter is not in the room"));
            }
            inner.set_membership(room, user, invitee, Membership::Invite, None);
        }
        self.wake();
        Ok(())
    }

    async fn join_room(&self, user: &UserId, room: &RoomId) -> HarnessResult<()> {
        let delay = *self.join_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut inner = self.lock();
            let room_state = inner.rooms.get(room).ok_or_else(|| denied(404, "no room"))?;
            let invited = room_state.membership.get(user) == Some(&Membership::Invite);
            if !invited && !room_state.public {
                return Err(denied(403, "not invited to a private room"));
            }
            let avatar = inner.copy_profile_avatar(user, room);
            inner.set_membership(room, user, user, Membership::Join, avatar.as_ref());
        }
        self.wake();
        Ok(())
    }

    async fn leave_room(&self, user: &UserId, room: &RoomId) -> HarnessResult<()> {
        {
            let mut inner = self.lock();
            let room_state = inner.rooms.get(room).ok_or_else(|| denied(404, "no room"))?;
            if !room_state.membership.contains_key(user) {
                return Err(denied(403, "not in the room"));
            }
            inner.set_membership(room, user, user, Membership::Leave, None);
        }
        self.wake();
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
        let event_id = {
            let mut inner = self.lock();
            let room_state = inner.rooms.get(room).ok_or_else(|| denied(404, "no room"))?;
            if room_state.membership.get(user) != Some(&Membership::Join) {
                return Err(denied(403, "sender is not in the room"));
            }

            if let Some(mxc) = &event.attached_media {
                let media = inner
                    .media
                    .get_mut(mxc)
                    .ok_or_else(|| denied(404, "no such media"))?;
                media.attached_room = Some(room.clone());
            }

            let event_id = inner.append_event(
                room,
                user,
                &event.kind,
                event.state_key.clone(),
                event.content.clone(),
            );

            // State membership events also update current state.
            if event.kind == "m.room.member" {
                if let Some(state_key) = &event.state_key {
                    let target = UserId::new(state_key.clone());
                    let pos = inner.stream_pos;
                    let room_state = inner.rooms.get_mut(room).expect("room exists");
                    room_state
                        .member_content
                        .insert(target.clone(), event.content.clone());
                    room_state.member_pos.insert(target, pos);
                }
            }
            event_id
        };
        self.wake();
        Ok(event_id)
    }

    async fn messages(
        &self,
        user: &UserId,
        room: &RoomId,
        query: &HistoryQuery,
    ) -> HarnessResult<MessagesPage> {
        let inner = self.lock();
        let room_state = inner.rooms.get(room).ok_or_else(|| denied(404, "no room"))?;
        let is_member = room_state.membership.get(user) == Some(&Membership::Join);
        if !is_member && room_state.visibility != HistoryVisibility::WorldReadable {
            return Err(denied(403, "not allowed to read history"));
        }

        let from = query
            .from
            .as_ref()
            .and_then(|c| c.as_str().parse::<u64>().ok());
        let limit = query.limit.unwrap_or(10) as usize;

        let mut selected: Vec<(u64, TimelineEvent)> = room_state
            .timeline
            .iter()
            .filter(|(pos, event)| {
                let in_range = match (query.dir, from) {
                    (Direction::Backward, Some(from)) => *pos <= from,
                    (Direction::Forward, Some(from)) => *pos > from,
                    _ => true,
                };
                let type_ok = query
                    .types
                    .as_ref()
                    .is_none_or(|types| types.contains(&event.kind));
                in_range && type_ok
            })
            .cloned()
            .collect();

        match query.dir {
            Direction::Backward => selected.sort_by(|a, b| b.0.cmp(&a.0)),
            Direction::Forward => selected.sort_by(|a, b| a.0.cmp(&b.0)),
        }
        selected.truncate(limit);

        let end = selected.last().map(|(pos, _)| match query.dir {
            Direction::Backward => Cursor::new(pos.saturating_sub(1).to_string()),
            Direction::Forward => Cursor::new(pos.to_string()),
        });
        let start = query.from.clone();

        Ok(MessagesPage {
            chunk: selected.into_iter().map(|(_, event)| event).collect(),
            start,
            end,
        })
    }

    async fn state_event_content(
        &self,
        _user: &UserId,
        room: &RoomId,
        kind: &str,
        state_key: &str,
    ) -> HarnessResult<serde_json::Value> {
        let inner = self.lock();
        let room_state = inner.rooms.get(room).ok_or_else(|| denied(404, "no room"))?;
        match kind {
            "m.room.member" => room_state
                .member_content
                .get(&UserId::new(state_key))
                .cloned()
                .ok_or_else(|| denied(404, "no such membership")),
            "m.room.history_visibility" => Ok(serde_json::json!({
                "history_visibility": room_state.visibility.as_str(),
            })),
            _ => Err(denied(404, "no such state event")),
        }
    }

    async fn upload_media(
        &self,
        _user: &UserId,
        bytes: &[u8],
        _filename: &str,
        _content_type: &str,
    ) -> HarnessResult<MxcUri> {
        let mut inner = self.lock();
        let mxc = inner.next_mxc();
        inner.media.insert(
            mxc.clone(),
            MockMedia {
                bytes: bytes.to_vec(),
                attached_room: None,
            },
        );
        Ok(mxc)
    }

    async fn download_media(&self, user: &UserId, mxc: &MxcUri) -> HarnessResult<Vec<u8>> {
        let inner = self.lock();
        let media = inner
            .media
            .get(mxc)
            .ok_or_else(|| denied(404, "no such media"))?;
        if !inner.may_view_media(user, media) {
            return Err(denied(403, "media not visible to this user"));
        }
        Ok(media.bytes.clone())
    }

    async fn set_avatar(&self, user: &UserId, mxc: &MxcUri) -> HarnessResult<()> {
        let mut inner = self.lock();
        if !inner.media.contains_key(mxc) {
            return Err(denied(404, "no such media"));
        }
        inner.profiles.insert(user.clone(), mxc.clone());
        Ok(())
    }
}

// ── Scenario glue ──

/// Creates a room with the given history visibility, the way the
/// restricted-media scenarios set up their fixtures.
pub async fn create_room_with_visibility(
    actor: &Actor,
    visibility: HistoryVisibility,
) -> HarnessResult<RoomId> {
    actor
        .create_room(
            &RoomOptions::new()
                .preset("public_chat")
                .name("Room")
                .room_version("11")
                .history_visibility(visibility),
        )
        .await
}

/// Uploads an image, attaches it to an `m.image` message and sends it.
/// Returns the media URI and the message's event id.
pub async fn upload_and_send_image(
    actor: &Actor,
    room: &RoomId,
) -> HarnessResult<(MxcUri, EventId)> {
    let mxc = actor
        .upload_media(PNG_FIXTURE, "test.png", "image/png")
        .await?;
    let event = EventTemplate::new(
        "m.room.message",
        serde_json::json!({
            "msgtype": "m.image",
            "body": "test.png",
            "url": mxc.as_str(),
        }),
    )
    .with_attached_media(mxc.clone());
    let event_id = actor.send_event(room, &event).await?;
    Ok((mxc, event_id))
}

/// Uploads an image and attaches it to the sender's own membership event
/// as an avatar. Returns the media URI and the membership event id.
pub async fn upload_and_send_membership_avatar(
    actor: &Actor,
    room: &RoomId,
) -> HarnessResult<(MxcUri, EventId)> {
    let mxc = actor
        .upload_media(PNG_FIXTURE, "test.png", "image/png")
        .await?;
    let event = EventTemplate::new(
        "m.room.member",
        serde_json::json!({
            "membership": "join",
            "avatar_url": mxc.as_str(),
        }),
    )
    .with_state_key(actor.user().to_string())
    .with_attached_media(mxc.clone());
    let event_id = actor.send_event(room, &event).await?;
    Ok((mxc, event_id))
}

/// Joins a bystander actor to the room. Its only job is to exist in the
/// room so its sync stream can confirm delivery before an assertion runs.
pub async fn join_sentinel(
    server: &Arc<MockHomeserver>,
    inviter: &Actor,
    room: &RoomId,
) -> HarnessResult<Actor> {
    let mut sentinel = server.actor("tank");
    sentinel.prime(Duration::from_secs(5)).await?;
    inviter.invite(room, sentinel.user()).await?;
    sentinel
        .sync_until(
            chorus_harness::invited_to(sentinel.user().clone(), room.clone()),
            Duration::from_secs(5),
        )
        .await?;
    sentinel.join_room(room).await?;
    Ok(sentinel)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
