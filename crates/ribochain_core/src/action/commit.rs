//! `commit`, `mod`, `del`, the three actions that append to the local
//! chain, plus the receive-side handlers for the wire requests they
//! trigger on other peers.

use crate::action::reject_links_entry_type;
use crate::context::Context;
use crate::dht::{RetryReason, Status};
use crate::error::{CoreError, CoreResult};
use crate::transport::{
    AckBody, DelRequestBody, LinkRequestBody, Message, MessageKind, ModRequestBody, PutRequestBody, ValidateRequestBody,
    ValidateResponseBody,
};
use crate::validation::{assemble_package, get_validation_response, ValidationDriver, ValidationResponseData};
use ribochain_types::{Change, ChangeAction, DelEntry, Entry, EntryDef, EntryType, Hash, LinkAction, Links, PeerId};

/// Prepare, validate, and append one entry to the local chain. Shared by
/// `commit`, `mod`, and `del`: they differ only in the entry they build and
/// the `change` they attach. Validation sources the committing agent as the
/// sole source, since nobody else has seen this record yet, and assembles
/// the `ValidationPackage` proactively from the chain already in hand rather
/// than negotiating it over the wire.
async fn commit_locally(
    ctx: &Context,
    entry: Entry,
    change: Option<Change>,
    check_validation_request: impl Fn(&EntryDef) -> CoreResult<()>,
) -> CoreResult<(Hash, Option<EntryDef>)> {
    let entry_type = entry.entry_type();
    let self_peer = ctx.self_peer_id.clone();

    let mut chain = ctx.chain.write().await;
    let prepared = chain.prepare_header(chrono::Utc::now(), &entry, change);
    let entry_hash = prepared.header.entry_link.clone();
    let header = prepared.header.clone();

    let package = if let EntryType::App(name) = &entry_type {
        ctx.registry
            .lookup(name)
            .and_then(|def| ctx.ribosome_for_zome(&def.zome).map(|ribosome| (ribosome, def.clone())))
            .map(|(ribosome, def)| {
                let req = ribosome.packaging_req("commit", &def);
                assemble_package(&chain, &entry_type, &entry, &header, &req)
            })
    } else {
        None
    };

    let driver = ValidationDriver::from_context(ctx);
    let outcome = driver
        .validate_action(
            "commit",
            &entry_type,
            Some(&entry),
            package.as_ref(),
            std::slice::from_ref(&self_peer),
            check_validation_request,
        )
        .await?;

    chain.add_entry(prepared, entry)?;

    Ok((entry_hash, outcome.into_def()))
}

/// Send a `PUT_REQUEST` for `hash` to whichever peer the router assigns it
/// to, then wait for the `Ack`.
async fn notify_put(ctx: &Context, hash: &Hash) -> CoreResult<()> {
    let owner = ctx.router.owner_of(hash);
    let msg = Message::new(MessageKind::PutRequest, ctx.self_peer_id.clone(), PutRequestBody { h: hash.clone() });
    ctx.transport.send(&owner, msg).await?;
    Ok(())
}

async fn notify_mod(ctx: &Context, old_hash: &Hash, new_hash: &Hash) -> CoreResult<()> {
    let owner = ctx.router.owner_of(old_hash);
    let msg = Message::new(
        MessageKind::ModRequest,
        ctx.self_peer_id.clone(),
        ModRequestBody { h: old_hash.clone(), n: new_hash.clone() },
    );
    ctx.transport.send(&owner, msg).await?;
    Ok(())
}

async fn notify_del(ctx: &Context, target: &Hash, by: &Hash) -> CoreResult<()> {
    let owner = ctx.router.owner_of(target);
    let msg = Message::new(
        MessageKind::DelRequest,
        ctx.self_peer_id.clone(),
        DelRequestBody { h: target.clone(), by: by.clone() },
    );
    ctx.transport.send(&owner, msg).await?;
    Ok(())
}

/// One `LINK_REQUEST` per distinct base referenced by the committed `Links`
/// batch, regardless of how many individual links share that base.
async fn notify_links(ctx: &Context, links_hash: &Hash, links: &Links) -> CoreResult<()> {
    for base in links.distinct_bases() {
        let owner = ctx.router.owner_of(&base);
        let msg = Message::new(
            MessageKind::LinkRequest,
            ctx.self_peer_id.clone(),
            LinkRequestBody { base, links: links_hash.clone() },
        );
        ctx.transport.send(&owner, msg).await?;
    }
    Ok(())
}

/// `commit`: append `entry` to the local chain, then publish it (and any
/// links it asserts) to the DHT if its declared sharing is public.
pub async fn do_commit(ctx: &Context, entry: Entry) -> CoreResult<Hash> {
    let links_snapshot = entry.as_links().cloned();

    let (entry_hash, def) = commit_locally(ctx, entry, None, |_def| Ok(())).await?;

    let publish = match &def {
        Some(def) => def.is_public(),
        // System types (including the synthetic %links/%deletion records)
        // always publish; there is no sharing policy to consult.
        None => true,
    };

    if publish {
        notify_put(ctx, &entry_hash).await?;
    }
    if let Some(links) = links_snapshot {
        notify_links(ctx, &entry_hash, &links).await?;
    }

    Ok(entry_hash)
}

/// `mod`: commit `new_entry` as a fresh record carrying `Change::Mod(old_hash)`,
/// then publish it and tell the DHT to transition `old_hash` to `Modified`.
pub async fn do_mod(ctx: &Context, old_hash: Hash, new_entry: Entry) -> CoreResult<Hash> {
    if let Some((_, old_type)) = ctx.chain.read().await.get_entry(&old_hash) {
        if old_type != new_entry.entry_type() {
            return Err(CoreError::EntryTypeMismatch {
                expected: old_type.to_string(),
                actual: new_entry.entry_type().to_string(),
            });
        }
    }

    let change = Change { action: ChangeAction::Mod, hash: old_hash.clone() };
    let (new_hash, _def) = commit_locally(ctx, new_entry, Some(change), reject_links_entry_type).await?;

    notify_put(ctx, &new_hash).await?;
    notify_mod(ctx, &old_hash, &new_hash).await?;
    Ok(new_hash)
}

/// `del`: commit a `Deletion` record naming `target`, then publish it and
/// tell the DHT to transition `target` to `Deleted`.
pub async fn do_del(ctx: &Context, target: Hash, message: String) -> CoreResult<Hash> {
    if let Some((_, old_type)) = ctx.chain.read().await.get_entry(&target) {
        reject_links_entry_type_for_app(ctx, &old_type)?;
    }

    let del_entry = Entry::Deletion(DelEntry { hash: target.clone(), message });
    let change = Change { action: ChangeAction::Del, hash: target.clone() };
    let (del_hash, _def) = commit_locally(ctx, del_entry, Some(change), |_def| Ok(())).await?;

    notify_put(ctx, &del_hash).await?;
    notify_del(ctx, &target, &del_hash).await?;
    Ok(del_hash)
}

/// `del`'s version of the links-rejection check: only meaningful when the
/// target is a registered application type, since system/synthetic types
/// have no `EntryDef` to inspect.
fn reject_links_entry_type_for_app(ctx: &Context, entry_type: &EntryType) -> CoreResult<()> {
    if let EntryType::App(name) = entry_type {
        if let Some(def) = ctx.registry.lookup(name) {
            return reject_links_entry_type(def);
        }
    }
    Ok(())
}

/// Answers a `VALIDATE_*_REQUEST`: the origin peer (who actually holds the
/// record) runs `getValidationResponse` against its own chain and ships the
/// result back. This is what a receiver calls `fetch_validation_data`
/// against on the other end of the wire.
pub async fn receive_validate_request(ctx: &Context, hash: Hash) -> CoreResult<Message> {
    let data = get_validation_response(ctx, &hash, |_def| Ok(())).await?;
    let body = ValidateResponseBody {
        entry_type: data.entry_type,
        entry: data.entry,
        header: data.header,
        package: data.package.into(),
    };
    Ok(Message::new(MessageKind::ValidateResponse, ctx.self_peer_id.clone(), body))
}

/// The receiver's half of the validate round-trip: ask `from` (who
/// actually holds the record) to justify `hash`, over the wire.
async fn fetch_validation_data(ctx: &Context, from: &PeerId, kind: MessageKind, hash: Hash) -> CoreResult<ValidationResponseData> {
    let request = Message::new(kind, ctx.self_peer_id.clone(), ValidateRequestBody { h: hash });
    let reply = ctx.transport.send(from, request).await?;
    let body: ValidateResponseBody = reply.body_as()?;
    Ok(ValidationResponseData {
        entry_type: body.entry_type,
        entry: body.entry,
        header: body.header,
        package: body.package.into(),
    })
}

/// `PUT_REQUEST` receive: pull the record's justification from `from` over
/// the validate back-channel, validate with `from` as the sole source, then
/// persist live or rejected accordingly. Never errors back to the sender
/// for a validation failure: that's recorded as `Rejected` rather than
/// bounced back to the sender.
pub async fn receive_put(ctx: &Context, from: PeerId, body: PutRequestBody) -> CoreResult<Message> {
    let source_data = fetch_validation_data(ctx, &from, MessageKind::ValidatePutRequest, body.h.clone()).await?;

    let driver = ValidationDriver::from_context(ctx);
    let validated = driver
        .validate_action(
            "commit",
            &source_data.entry_type,
            Some(&source_data.entry),
            Some(&source_data.package),
            std::slice::from_ref(&from),
            |_def| Ok(()),
        )
        .await;

    let status = if validated.is_ok() { Status::Live } else { Status::Rejected };
    ctx.dht
        .put(body.h.clone(), source_data.entry_type, source_data.entry.content_bytes(), from, status)
        .await?;

    if status == Status::Live {
        drain_retries(ctx, &body.h).await;
    }

    Ok(Message::new(MessageKind::Ack, ctx.self_peer_id.clone(), AckBody::ok(format!("{status:?}"))))
}

/// Fetch `new_hash`'s justification, validate it, and transition `old_hash`
/// to `Modified`. Shared by `receive_mod` and its deferred replay.
async fn apply_mod(ctx: &Context, old_hash: &Hash, new_hash: Hash, from: PeerId) -> CoreResult<()> {
    let source_data = fetch_validation_data(ctx, &from, MessageKind::ValidateModRequest, new_hash.clone()).await?;
    let driver = ValidationDriver::from_context(ctx);
    driver
        .validate_action(
            "mod",
            &source_data.entry_type,
            Some(&source_data.entry),
            Some(&source_data.package),
            std::slice::from_ref(&from),
            |_def| Ok(()),
        )
        .await?;

    ctx.dht.mod_(old_hash, new_hash, from).await?;
    Ok(())
}

/// Fetch `by`'s justification, validate it, and transition `target` to
/// `Deleted`. Shared by `receive_del` and its deferred replay.
async fn apply_del(ctx: &Context, target: &Hash, by: Hash, from: PeerId) -> CoreResult<()> {
    let source_data = fetch_validation_data(ctx, &from, MessageKind::ValidateDelRequest, by).await?;
    let driver = ValidationDriver::from_context(ctx);
    driver
        .validate_action(
            "del",
            &source_data.entry_type,
            Some(&source_data.entry),
            Some(&source_data.package),
            std::slice::from_ref(&from),
            |_def| Ok(()),
        )
        .await?;

    ctx.dht.del(target, from).await?;
    Ok(())
}

/// Fetch `links_hash`'s justification, validate it, and apply every link in
/// the batch targeting `base`, all-or-nothing. Shared by `receive_link` and
/// its deferred replay.
async fn apply_link(ctx: &Context, base: &Hash, links_hash: Hash, from: PeerId) -> CoreResult<()> {
    let source_data = fetch_validation_data(ctx, &from, MessageKind::ValidateLinkRequest, links_hash).await?;
    let driver = ValidationDriver::from_context(ctx);
    driver
        .validate_action(
            "link",
            &source_data.entry_type,
            Some(&source_data.entry),
            Some(&source_data.package),
            std::slice::from_ref(&from),
            |_def| Ok(()),
        )
        .await?;

    let links = source_data
        .entry
        .as_links()
        .ok_or(CoreError::ValidationFailed("expected a Links entry".into()))?;

    for link in links.for_base(base) {
        match link.link_action {
            LinkAction::Add => {
                ctx.dht.put_link(link.base.clone(), link.link.clone(), link.tag.clone(), from.clone()).await?;
            }
            LinkAction::Del => {
                ctx.dht.del_link(&link.base, &link.link, &link.tag, from.clone()).await?;
            }
        }
    }
    Ok(())
}

/// Replay every `MOD`/`DEL`/`LINK_REQUEST` that was deferred waiting on
/// `hash`, now that it has just been `PUT`. A replay that still fails (the
/// source peer went away, or validation now rejects it) is logged and
/// dropped rather than propagated, there is no requester left to answer.
pub async fn drain_retries(ctx: &Context, hash: &Hash) {
    for reason in ctx.retry_queue.due(hash).await {
        let result = match reason {
            RetryReason::Mod { new_hash, source } => apply_mod(ctx, hash, new_hash, source).await,
            RetryReason::Del { by, source } => apply_del(ctx, hash, by, source).await,
            RetryReason::Link { links_hash, source } => apply_link(ctx, hash, links_hash, source).await,
        };
        if let Err(err) = result {
            tracing::warn!(%hash, error = %err, "deferred retry replay failed");
        }
    }
}

/// `MOD_REQUEST` receive: `old_hash` must already have a record; if it's
/// missing, enqueue a bounded retry instead of failing outright. Otherwise
/// fetch the new record's justification, validate it, and transition the
/// DHT's status.
pub async fn receive_mod(ctx: &Context, from: PeerId, body: ModRequestBody) -> CoreResult<Message> {
    if ctx.dht.get(&body.h).await.is_none() {
        ctx.retry_queue
            .enqueue(body.h.clone(), RetryReason::Mod { new_hash: body.n.clone(), source: from })
            .await;
        return Ok(Message::new(MessageKind::Ack, ctx.self_peer_id.clone(), AckBody::ok("deferred")));
    }

    apply_mod(ctx, &body.h, body.n, from).await?;
    Ok(Message::new(MessageKind::Ack, ctx.self_peer_id.clone(), AckBody::ok("Modified")))
}

/// `DEL_REQUEST` receive: same missing-precondition retry as `mod`, then
/// fetch the deletion record's justification, validate it, and transition
/// the target to `Deleted`.
pub async fn receive_del(ctx: &Context, from: PeerId, body: DelRequestBody) -> CoreResult<Message> {
    if ctx.dht.get(&body.h).await.is_none() {
        ctx.retry_queue
            .enqueue(body.h.clone(), RetryReason::Del { by: body.by.clone(), source: from })
            .await;
        return Ok(Message::new(MessageKind::Ack, ctx.self_peer_id.clone(), AckBody::ok("deferred")));
    }

    apply_del(ctx, &body.h, body.by, from).await?;
    Ok(Message::new(MessageKind::Ack, ctx.self_peer_id.clone(), AckBody::ok("Deleted")))
}

/// `LINK_REQUEST` receive: `base` must already be `Live`; on success every
/// link in the batch targeting this base is applied, all-or-nothing, rather
/// than accepting some links from a batch and rejecting others.
pub async fn receive_link(ctx: &Context, from: PeerId, body: LinkRequestBody) -> CoreResult<Message> {
    let Some(base_record) = ctx.dht.get(&body.base).await else {
        ctx.retry_queue
            .enqueue(body.base.clone(), RetryReason::Link { links_hash: body.links.clone(), source: from })
            .await;
        return Ok(Message::new(MessageKind::Ack, ctx.self_peer_id.clone(), AckBody::ok("deferred")));
    };
    if base_record.status != Status::Live {
        return Err(CoreError::Dht(crate::dht::DhtError::BaseNotLive(body.base)));
    }

    apply_link(ctx, &body.base, body.links, from).await?;
    Ok(Message::new(MessageKind::Ack, ctx.self_peer_id.clone(), AckBody::ok("linked")))
}
