//! The telephone engine's control channel: a line-oriented,
//! key=value request/response protocol over TCP. One request is a run of
//! `key=value` lines terminated by a blank line; the reply is the same
//! shape, starting with either `retValue=...` (plus parameters) or
//! `error=<kind>` (plus `detail=...`).

use std::collections::HashMap;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::dispatcher::Dispatcher;
use crate::wire::encode_result;

/// Runs until the listener itself fails to bind; each accepted connection is
/// handled on its own task and a connection error never brings down the
/// listener.
pub async fn serve(addr: &str, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "control channel listening");
    loop {
        let (socket, peer) = listener.accept().await?;
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, dispatcher).await {
                tracing::warn!(%peer, error = %e, "control channel connection ended with error");
            }
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), LinesCodecError> {
    let mut lines = Framed::new(socket, LinesCodec::new());
    let mut fields: HashMap<String, String> = HashMap::new();

    while let Some(line) = lines.next().await.transpose()? {
        if line.is_empty() {
            if fields.is_empty() {
                continue;
            }
            let message = std::mem::take(&mut fields);
            let reply = handle_request(&dispatcher, &message).await;
            for line in reply {
                lines.send(line).await?;
            }
            lines.send(String::new()).await?;
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            fields.insert(key.to_string(), value.to_string());
        }
    }
    Ok(())
}

/// `call.route` for a symbolic `lateroute/stage1-*` name is the late-route
/// lookup path; anything else is the initial stage-1 request. The `called`
/// field carries the distinguishing value either way.
async fn handle_request(dispatcher: &Dispatcher, fields: &HashMap<String, String>) -> Vec<String> {
    let called = fields.get("called").map(String::as_str).unwrap_or("");

    if called.contains("lateroute/stage1-") {
        return match dispatcher.lookup_late_route(called).await {
            Ok(result) => {
                let mut lines = Vec::new();
                encode_result(&result, &mut lines);
                lines
            }
            Err(e) => format_error(&e),
        };
    }

    let Some(caller) = fields.get("caller") else {
        return format_error(&switchboard_types::RouteError::no_route(
            "missing required field 'caller'",
        ));
    };
    if called.is_empty() {
        return format_error(&switchboard_types::RouteError::no_route(
            "missing required field 'called'",
        ));
    }

    let call_id = fields
        .get("billid")
        .or_else(|| fields.get("x_eventphone_id"))
        .cloned();

    match dispatcher.route(caller, called, call_id).await {
        Ok(response) => {
            let mut lines = Vec::new();
            encode_result(&response.result, &mut lines);
            lines
        }
        Err(e) => format_error(&e),
    }
}

fn format_error(e: &switchboard_types::RouteError) -> Vec<String> {
    vec![
        format!("error={}", e.kind.as_str()),
        format!("detail={}", e.detail),
    ]
}
