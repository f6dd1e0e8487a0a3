//! The inbound message router: one `Context`-bound `Inbox` that maps every
//! `MessageKind` to the action receive handler that owns it (the
//! dispatch table). Anything a handler returns as an `Err` is turned into
//! an `Ack{ok: false}` rather than propagated, since `TransportT::send`'s
//! reply is infallible once it reaches the wire.

use crate::action;
use crate::context::Context;
use crate::transport::{AckBody, Inbox, Message, MessageKind, ValidateRequestBody};
use async_trait::async_trait;
use tracing::warn;

pub struct MessageDispatcher {
    pub ctx: Context,
}

impl MessageDispatcher {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    async fn route(&self, msg: Message) -> crate::error::CoreResult<Message> {
        let from = msg.from.clone();
        match msg.kind {
            MessageKind::PutRequest => action::receive_put(&self.ctx, from, msg.body_as()?).await,
            MessageKind::ModRequest => action::receive_mod(&self.ctx, from, msg.body_as()?).await,
            MessageKind::DelRequest => action::receive_del(&self.ctx, from, msg.body_as()?).await,
            MessageKind::LinkRequest => action::receive_link(&self.ctx, from, msg.body_as()?).await,
            MessageKind::GetRequest => action::receive_get(&self.ctx, from, msg.body_as()?).await,
            MessageKind::GetLinkRequest => action::receive_get_link(&self.ctx, from, msg.body_as()?).await,
            MessageKind::AppMessage => action::receive_send(&self.ctx, from, msg.body_as()?).await,
            MessageKind::ValidatePutRequest
            | MessageKind::ValidateModRequest
            | MessageKind::ValidateDelRequest
            | MessageKind::ValidateLinkRequest => {
                let body: ValidateRequestBody = msg.body_as()?;
                action::receive_validate_request(&self.ctx, body.h).await
            }
            // Reply-only kinds never arrive as a request to dispatch.
            MessageKind::ValidateResponse | MessageKind::GetResponse | MessageKind::GetLinkResponse | MessageKind::Ack => {
                Err(crate::error::CoreError::NonCallableAction)
            }
        }
    }
}

#[async_trait]
impl Inbox for MessageDispatcher {
    async fn handle(&self, msg: Message) -> Message {
        match self.route(msg).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "message dispatch failed");
                Message::new(MessageKind::Ack, self.ctx.self_peer_id.clone(), AckBody::err(e.to_string()))
            }
        }
    }
}
