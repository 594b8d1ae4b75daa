// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::ready;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite;

use crate::{
    backend::{ChangeEvent, ChangeKind},
    error::{self, Result},
};

/// A Phoenix channel message, as spoken by the Realtime service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(super) struct Message {
    pub(super) topic: String,
    pub(super) event: String,
    pub(super) payload: Value,
    #[serde(rename = "ref")]
    pub(super) reference: Option<String>,
}

impl Message {
    pub(super) fn join(topic: &str, table: &str, access_token: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_owned(),
            event: "phx_join".to_owned(),
            payload: json!({
                "config": {
                    "postgres_changes": [
                        { "event": "*", "schema": "public", "table": table },
                    ],
                },
                "access_token": access_token,
            }),
            reference: Some(reference.to_string()),
        }
    }

    pub(super) fn heartbeat(reference: u64) -> Self {
        Self {
            topic: "phoenix".to_owned(),
            event: "heartbeat".to_owned(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    /// The status of a reply to the message with the given reference, if
    /// this is one.
    pub(super) fn reply_status(&self, reference: u64) -> Option<&str> {
        if self.event != "phx_reply" || self.reference.as_deref() != Some(&reference.to_string()) {
            return None;
        }
        self.payload.get("status").and_then(Value::as_str)
    }

    /// The row change this message announces, if any.
    pub(super) fn change(&self) -> Option<ChangeEvent> {
        let (kind, table) = match self.event.as_str() {
            "postgres_changes" => {
                let data = self.payload.get("data")?;
                (data.get("type")?.as_str()?, data.get("table")?.as_str()?)
            }
            kind @ ("INSERT" | "UPDATE" | "DELETE") => (kind, self.payload.get("table")?.as_str()?),
            _ => return None,
        };
        let kind = match kind {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => return None,
        };
        Some(ChangeEvent {
            kind,
            table: table.to_owned(),
        })
    }
}

pub(super) struct WebSocketStream<S>(tokio_tungstenite::WebSocketStream<S>);

impl<S: AsyncRead + AsyncWrite + Unpin> futures_util::Stream for WebSocketStream<S> {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let frame = match ready!(Pin::new(&mut self.0).poll_next(cx)) {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Poll::Ready(Some(Err(e.into()))),
                None => return Poll::Ready(None),
            };

            // LINT: Control frames are answered by tungstenite itself.
            #[allow(clippy::wildcard_enum_match_arm)]
            match frame {
                tungstenite::Message::Text(text) => {
                    debug!("Received raw message: {}", text);
                    let msg = serde_json::from_str(&text).map_err(Into::into);
                    return Poll::Ready(Some(msg));
                }
                tungstenite::Message::Close(_) => return Poll::Ready(None),
                _ => continue,
            }
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> futures_util::Sink<Message> for WebSocketStream<S> {
    type Error = error::Error;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.0).poll_ready(cx).map_err(Into::into)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        debug!("Sending message: {:?}", item);
        Pin::new(&mut self.0)
            .start_send(tungstenite::Message::Text(serde_json::to_string(&item)?))
            .map_err(Into::into)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.0).poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.0).poll_close(cx).map_err(Into::into)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> From<tokio_tungstenite::WebSocketStream<S>>
    for WebSocketStream<S>
{
    fn from(s: tokio_tungstenite::WebSocketStream<S>) -> Self {
        Self(s)
    }
}
