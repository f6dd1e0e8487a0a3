//! `get`, `getLink`, `send`, the three read-only/messaging actions. None
//! of them append to the local chain; `get`/`getLink` round-trip to
//! whichever peer the router assigns the key to, and `send` hands a
//! message straight to a zome's `receive` handler.

use crate::action::{GetMask, GetResult, LinkResult};
use crate::context::Context;
use crate::dht::StatusMask;
use crate::error::{CoreError, CoreResult};
use crate::transport::{
    AckBody, AppMsgBody, GetLinkRequestBody, GetLinkResponseBody, GetRequestBody, GetResponseBody, LinkResultWire, Message,
    MessageKind, StatusWire,
};
use ribochain_types::{EntryType, Hash, PeerId};

/// Unwrap a reply that may be a genuine response or an `Ack{ok: false}`
/// carrying an error, the wire protocol's stand-in for a dedicated error
/// `MessageKind`.
fn into_result(msg: Message) -> CoreResult<Message> {
    if msg.kind == MessageKind::Ack {
        let ack: AckBody = msg.body_as()?;
        if !ack.ok {
            return Err(CoreError::Transport(ack.message));
        }
    }
    Ok(msg)
}

/// `get`: ask the hash's owning peer for the record, filtered by
/// `status_mask`/`get_mask`. A `Modified` record is always surfaced as
/// `HashModified{old, new}` rather than a plain result, regardless of the
/// mask, so the caller can chase the replacement instead of treating the
/// hash as live data.
pub async fn do_get(ctx: &Context, hash: &Hash, status_mask: StatusMask, get_mask: GetMask) -> CoreResult<GetResult> {
    let owner = ctx.router.owner_of(hash);
    let request = Message::new(
        MessageKind::GetRequest,
        ctx.self_peer_id.clone(),
        GetRequestBody { h: hash.clone(), status_mask: status_mask.bits(), get_mask: get_mask.bits() },
    );
    let reply = into_result(ctx.transport.send(&owner, request).await?)?;
    let body: GetResponseBody = reply.body_as()?;

    if matches!(body.status, Some(StatusWire::Modified)) {
        let new = body
            .follow_hash
            .ok_or_else(|| CoreError::Transport("modified record missing its follow hash".into()))?;
        return Err(CoreError::HashModified { old: hash.clone(), new });
    }

    Ok(GetResult {
        entry: body.entry,
        entry_type: body.entry_type,
        sources: body.sources,
        follow_hash: body.follow_hash,
        status: body.status.map(|s| match s {
            StatusWire::Live => crate::dht::Status::Live,
            StatusWire::Rejected => crate::dht::Status::Rejected,
            StatusWire::Modified => crate::dht::Status::Modified,
            StatusWire::Deleted => crate::dht::Status::Deleted,
        }),
    })
}

/// `GET_REQUEST` receive: look the hash up in the local DHT store, apply
/// `StatusMask`, and refuse to serve `DNA` entries at all. A hash absent or
/// masked out is reported as not found, same as a genuinely unknown hash,
/// the mask is meant to make non-matching records indistinguishable from
/// absent ones. A `Modified` record is the one exception: it's always
/// returned with its `FollowHash` set, even if the caller's mask excludes
/// `Modified`, so the caller can learn about the replacement.
pub async fn receive_get(ctx: &Context, _from: PeerId, body: GetRequestBody) -> CoreResult<Message> {
    let record = ctx.dht.get(&body.h).await.ok_or_else(|| CoreError::HashNotFound(body.h.clone()))?;
    if matches!(record.entry_type, EntryType::Dna) {
        return Err(CoreError::ValidationFailed("DNA entries are never served".into()));
    }

    let mask = crate::transport::status_mask_from_wire(body.status_mask);
    if record.status != crate::dht::Status::Modified && !mask.matches(record.status) {
        return Err(CoreError::HashNotFound(body.h.clone()));
    }

    let get_mask = GetMask::new(body.get_mask);
    let response = GetResponseBody {
        entry: get_mask.wants_entry().then(|| record.bytes.clone()),
        entry_type: get_mask.wants_entry_type().then(|| record.entry_type.clone()),
        sources: get_mask.wants_sources().then(|| record.sources.iter().cloned().collect()),
        follow_hash: record.follow_hash.clone(),
        status: Some(record.status.into()),
    };
    Ok(Message::new(MessageKind::GetResponse, ctx.self_peer_id.clone(), response))
}

/// `getLink`: ask the base's owning peer for every link under `tag` whose
/// status matches `status_mask`.
pub async fn do_get_link(ctx: &Context, base: &Hash, tag: &str, status_mask: StatusMask) -> CoreResult<Vec<LinkResult>> {
    let owner = ctx.router.owner_of(base);
    let request = Message::new(
        MessageKind::GetLinkRequest,
        ctx.self_peer_id.clone(),
        GetLinkRequestBody { base: base.clone(), tag: tag.to_string(), status_mask: status_mask.bits() },
    );
    let reply = into_result(ctx.transport.send(&owner, request).await?)?;
    let body: GetLinkResponseBody = reply.body_as()?;
    Ok(body.links.into_iter().map(|l| LinkResult { hash: l.h, tag: l.tag }).collect())
}

/// `GETLINK_REQUEST` receive: filter the local links index by base, tag,
/// and status mask.
pub async fn receive_get_link(ctx: &Context, _from: PeerId, body: GetLinkRequestBody) -> CoreResult<Message> {
    let mask = crate::transport::status_mask_from_wire(body.status_mask);
    let links = ctx.dht.get_link(&body.base, &body.tag, mask).await;
    let response = GetLinkResponseBody {
        links: links.into_iter().map(|l| LinkResultWire { h: l.link, tag: l.tag }).collect(),
    };
    Ok(Message::new(MessageKind::GetLinkResponse, ctx.self_peer_id.clone(), response))
}

/// `send`: route an application message to `to`'s zome and return the
/// reply body.
pub async fn do_send(ctx: &Context, to: &PeerId, zome: &str, body: Vec<u8>) -> CoreResult<Vec<u8>> {
    let request = Message::new(
        MessageKind::AppMessage,
        ctx.self_peer_id.clone(),
        AppMsgBody { zome_type: zome.to_string(), body },
    );
    let reply = into_result(ctx.transport.send(to, request).await?)?;
    let reply_body: AppMsgBody = reply.body_as()?;
    Ok(reply_body.body)
}

/// `AppMessage` receive: hand the body to the addressed zome's ribosome and
/// wrap its reply back in the same envelope shape.
pub async fn receive_send(ctx: &Context, from: PeerId, body: AppMsgBody) -> CoreResult<Message> {
    let ribosome = ctx
        .ribosome_for_zome(&body.zome_type)
        .ok_or_else(|| CoreError::UnknownEntryType(body.zome_type.clone()))?;
    let reply = ribosome.receive(from, body.body).await;
    Ok(Message::new(
        MessageKind::AppMessage,
        ctx.self_peer_id.clone(),
        AppMsgBody { zome_type: body.zome_type, body: reply },
    ))
}
