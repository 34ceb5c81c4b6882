// realtime.rs
//! In-process change notifications, pushed to browsers as Server-Sent Events.

use actix_web::{HttpResponse, web::Bytes};
use futures::{Stream, StreamExt, stream};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
    /// Sent instead of the events a slow subscriber missed.
    Resync,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub action: ChangeAction,
    pub id: Option<i64>,
}

impl ChangeEvent {
    pub fn new(table: &'static str, action: ChangeAction, id: i64) -> Self {
        Self {
            table,
            action,
            id: Some(id),
        }
    }

    fn resync(table: &'static str) -> Self {
        Self {
            table,
            action: ChangeAction::Resync,
            id: None,
        }
    }

    fn to_frame(&self) -> Bytes {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Bytes::from(format!("event: change\ndata: {}\n\n", data))
    }
}

#[derive(Debug, Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // Err only means nobody is listening
        if let Ok(n) = self.tx.send(event) {
            log::debug!("Perubahan dikirim ke {} pelanggan", n);
        }
    }

    /// SSE frames for every change on `table`, starting with a comment line
    /// so the response headers are flushed immediately.
    pub fn subscribe(
        &self,
        table: &'static str,
    ) -> impl Stream<Item = Result<Bytes, actix_web::Error>> + use<> {
        let rx = self.tx.subscribe();
        let hello = stream::once(async {
            Ok::<_, actix_web::Error>(Bytes::from_static(b": connected\n\n"))
        });

        let changes = stream::unfold(rx, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.table == table => {
                        return Some((Ok::<_, actix_web::Error>(event.to_frame()), rx));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        log::warn!("Pelanggan {} tertinggal {} perubahan", table, missed);
                        return Some((Ok(ChangeEvent::resync(table).to_frame()), rx));
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        hello.chain(changes)
    }

    pub fn sse_response(&self, table: &'static str) -> HttpResponse {
        HttpResponse::Ok()
            .content_type("text/event-stream")
            .insert_header(("Cache-Control", "no-cache"))
            .insert_header(("X-Accel-Buffering", "no"))
            .streaming(self.subscribe(table))
    }
}
