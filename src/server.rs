//! JSON-lines bridge server
//!
//! Protocol, one JSON document per line:
//! - out, once at start: `{"event":"FinishLoad"}`
//! - in: `{"id": <any>, "method": "<operation>", "params": {...}}`
//! - out: `{"id": <same>, "state": true, "result": ...}` or
//!   `{"id": <same>, "state": false, "error": "..."}`
//! - in: `{"cancel": <id>}` aborts a pending request; it gets no response.
//!
//! Each request runs on its own task, so responses can arrive out of order.
//! End of input drains in-flight requests before returning.

use crate::bridge::{Bridge, Envelope};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, info, warn};

const OUTBOX_CAPACITY: usize = 256;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Incoming {
    Cancel { cancel: Value },
    Call(CallRequest),
}

#[derive(Debug, Deserialize)]
struct CallRequest {
    #[serde(default)]
    id: Value,
    #[serde(alias = "operation")]
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    #[serde(flatten)]
    envelope: Envelope,
}

type Pending = Arc<Mutex<HashMap<String, AbortHandle>>>;

/// Serve the bridge until `reader` reaches end of input
pub async fn serve<R, W>(bridge: Arc<Bridge>, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    let writer_task = tokio::spawn(write_lines(writer, rx));

    bridge.finish_load();
    tx.send(json!({ "event": "FinishLoad" }).to_string())
        .await
        .map_err(|_| Error::Config("output closed before FinishLoad".to_string()))?;
    info!("bridge server ready");

    let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
    let mut tasks = JoinSet::new();
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                handle_line(line, &bridge, &tx, &pending, &mut tasks).await;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    if !e.is_cancelled() {
                        warn!(error = %e, "request task failed");
                    }
                }
            }
        }
    }

    debug!(in_flight = tasks.len(), "input closed, draining");
    while tasks.join_next().await.is_some() {}

    drop(tx);
    writer_task
        .await
        .map_err(|e| Error::Config(format!("writer task failed: {}", e)))??;
    info!("bridge server stopped");
    Ok(())
}

async fn handle_line(
    line: &str,
    bridge: &Arc<Bridge>,
    tx: &mpsc::Sender<String>,
    pending: &Pending,
    tasks: &mut JoinSet<()>,
) {
    let request = match serde_json::from_str::<Incoming>(line) {
        Ok(Incoming::Call(request)) => request,
        Ok(Incoming::Cancel { cancel }) => {
            match pending.lock().await.remove(&cancel.to_string()) {
                Some(handle) => {
                    handle.abort();
                    debug!(id = %cancel, "request cancelled");
                }
                None => debug!(id = %cancel, "cancel for unknown request"),
            }
            return;
        }
        Err(e) => {
            let error = Error::invalid(format!("malformed request: {}", e));
            send(tx, Value::Null, Envelope::err(&error)).await;
            return;
        }
    };

    let key = request.id.to_string();
    let tracked = !request.id.is_null();
    let mut in_flight = pending.lock().await;
    if tracked && in_flight.contains_key(&key) {
        drop(in_flight);
        let error = Error::invalid(format!("request id {} is already in flight", key));
        send(tx, request.id, Envelope::err(&error)).await;
        return;
    }

    let bridge = bridge.clone();
    let tx = tx.clone();
    let task_pending = pending.clone();
    let task_key = key.clone();
    let handle = tasks.spawn(async move {
        let envelope = bridge.call(&request.method, request.params).await;
        if tracked {
            task_pending.lock().await.remove(&task_key);
        }
        send(&tx, request.id, envelope).await;
    });
    if tracked {
        in_flight.insert(key, handle);
    }
}

async fn send(tx: &mpsc::Sender<String>, id: Value, envelope: Envelope) {
    match serde_json::to_string(&Response { id, envelope }) {
        Ok(line) => {
            if tx.send(line).await.is_err() {
                warn!("output closed, dropping response");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode response"),
    }
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}
