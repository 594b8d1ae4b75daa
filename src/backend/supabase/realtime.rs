// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt as _, StreamExt as _};
use log::{debug, warn};
use secrecy::ExposeSecret as _;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
    time,
};
use tokio_tungstenite::connect_async;
use url::Url;

use crate::{
    backend::{self, ChangeEvent, Subscription},
    error::{self, Error, Result},
    storage,
};

use super::{message, session, Supabase};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: u64 = 1;

impl<S: storage::Storage<session::Data>> Supabase<S> {
    fn realtime_url(&self) -> Result<Url> {
        let mut url = self.endpoint(&["realtime", "v1", "websocket"])?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::Config(format!("{} cannot be reached over WebSocket", self.url)))?;
        let _ = url
            .query_pairs_mut()
            .append_pair("apikey", self.api_key.expose_secret())
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }
}

/// Waits for the server to accept the join.
async fn joined<T>(stream: &mut message::WebSocketStream<T>, topic: &str) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg) = stream.next().await {
        let msg = msg?;
        match msg.reply_status(JOIN_REF) {
            Some("ok") => return Ok(()),
            Some(status) => {
                return Err(error::Backend::UnexpectedResponse(format!(
                    "joining {topic} failed with status {status}: {}",
                    msg.payload
                ))
                .into())
            }
            None => debug!("Ignoring {} while joining {}", msg.event, topic),
        }
    }
    Err(error::Backend::StreamEnded.into())
}

/// Relays row changes to the subscriber and keeps the socket alive until the
/// subscriber goes away.
async fn relay<T>(
    mut stream: message::WebSocketStream<T>,
    tx: mpsc::Sender<ChangeEvent>,
    table: String,
) where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut heartbeat = time::interval_at(time::Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    let mut reference = JOIN_REF;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                reference += 1;
                if let Err(e) = stream.send(message::Message::heartbeat(reference)).await {
                    warn!("Change feed for {} stopped: {}", table, e);
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(msg)) => {
                    if let Some(change) = msg.change() {
                        if tx.send(change).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!("Change feed for {} stopped: {}", table, e);
                    break;
                }
                None => {
                    debug!("Change feed for {} closed by the server", table);
                    break;
                }
            },
            () = tx.closed() => break,
        }
    }

    let _ = stream.close().await;
}

#[async_trait]
impl<S: storage::Storage<session::Data>> backend::Changes for Supabase<S> {
    async fn subscribe_changes(&self, table: &str) -> Result<Subscription<ChangeEvent>> {
        let url = self.realtime_url()?;
        let token = self.bearer().await?;
        let topic = format!("realtime:public:{table}");

        let (stream, _) = connect_async(url.as_str()).await?;
        let mut stream: message::WebSocketStream<_> = stream.into();
        stream
            .send(message::Message::join(&topic, table, &token, JOIN_REF))
            .await?;
        time::timeout(JOIN_TIMEOUT, joined(&mut stream, &topic))
            .await
            .map_err(|_| {
                error::Backend::UnexpectedResponse(format!("timed out joining {topic}"))
            })??;
        debug!("Subscribed to changes on {}", table);

        let (tx, rx) = mpsc::channel(16);
        let worker = tokio::spawn(relay(stream, tx, table.to_owned()));
        Ok(Subscription::new(rx, worker))
    }
}
