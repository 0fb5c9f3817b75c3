//! LiveReload protocol server.
//!
//! ```text
//! GET /livereload.js   embedded client script
//! GET /livereload      websocket upgrade
//!     client → {"command":"hello","protocols":[...]}
//!     server → {"command":"hello","protocols":[...],"serverName":"hindsite"}
//!     server → {"command":"reload","path":"/posts/a.html","liveCSS":true}
//! ```
//!
//! Each connected browser gets a thread and a channel; [`LiveReload::reload`]
//! fans a command out to every channel and drops clients whose thread has
//! exited.

use crate::{log, verbose};
use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use serde_json::json;
use std::{
    io::{Read, Write},
    net::SocketAddr,
    sync::{
        Arc,
        mpsc::{self, Receiver, Sender},
    },
    thread,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tungstenite::{Message, WebSocket, handshake::derive_accept_key, protocol::Role};

const CLIENT_SCRIPT: &str = include_str!("embed/livereload.js");
const PROTOCOL: &str = "http://livereload.com/protocols/official-7";

type Clients = Arc<Mutex<Vec<Sender<String>>>>;

pub struct LiveReload {
    server: Arc<Server>,
    clients: Clients,
}

impl LiveReload {
    /// Listen on `port` in a background thread.
    pub fn start(port: u16) -> Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let server = Server::http(addr)
            .map_err(|e| anyhow!("Failed to start livereload server on {addr}: {e}"))?;
        let server = Arc::new(server);
        let clients = Clients::default();

        let (srv, cls) = (Arc::clone(&server), Arc::clone(&clients));
        thread::spawn(move || {
            for request in srv.incoming_requests() {
                if let Err(e) = handle_request(request, &cls) {
                    log!("livereload"; "request error: {e}");
                }
            }
        });
        verbose!("livereload"; "listening: http://{addr}");
        Ok(Self { server, clients })
    }

    /// Ask every connected browser to reload `path`.
    pub fn reload(&self, path: &str) {
        let msg = json!({ "command": "reload", "path": path, "liveCSS": true }).to_string();
        let mut clients = self.clients.lock();
        clients.retain(|tx| tx.send(msg.clone()).is_ok());
        verbose!("livereload"; "reload: {path} ({} clients)", clients.len());
    }
}

impl Drop for LiveReload {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

fn handle_request(request: Request, clients: &Clients) -> Result<()> {
    let path = request.url().split('?').next().unwrap_or_default().to_owned();
    match path.as_str() {
        "/livereload.js" => {
            let response = Response::from_string(CLIENT_SCRIPT).with_header(
                Header::from_bytes("Content-Type", "application/javascript; charset=utf-8")
                    .unwrap(),
            );
            request.respond(response)?;
        }
        "/livereload" => upgrade(request, clients)?,
        _ => {
            let response = Response::from_string("404 Not Found").with_status_code(StatusCode(404));
            request.respond(response)?;
        }
    }
    Ok(())
}

/// Complete the websocket handshake and hand the connection to a client
/// thread.
fn upgrade(request: Request, clients: &Clients) -> Result<()> {
    let key = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Sec-WebSocket-Key"))
        .map(|h| h.value.as_str().to_owned());
    let Some(key) = key else {
        let response = Response::from_string("400 Bad Request").with_status_code(StatusCode(400));
        request.respond(response)?;
        return Ok(());
    };
    let accept = Header::from_bytes("Sec-WebSocket-Accept", derive_accept_key(key.as_bytes()))
        .map_err(|()| anyhow!("invalid websocket key"))?;
    let response = Response::empty(StatusCode(101))
        .with_header(Header::from_bytes("Upgrade", "websocket").unwrap())
        .with_header(Header::from_bytes("Connection", "Upgrade").unwrap())
        .with_header(accept);
    let stream = request.upgrade("websocket", response);

    let (tx, rx) = mpsc::channel();
    clients.lock().push(tx);
    thread::spawn(move || {
        let socket = WebSocket::from_raw_socket(stream, Role::Server, None);
        if let Err(e) = run_client(socket, &rx) {
            verbose!("livereload"; "client closed: {e}");
        }
    });
    Ok(())
}

fn run_client<S: Read + Write>(mut socket: WebSocket<S>, rx: &Receiver<String>) -> Result<()> {
    // The browser opens with its own hello.
    let hello = socket.read()?;
    verbose!("livereload"; "client: {hello}");
    let reply = json!({ "command": "hello", "protocols": [PROTOCOL], "serverName": "hindsite" });
    socket.send(Message::text(reply.to_string()))?;
    for msg in rx {
        socket.send(Message::text(msg))?;
    }
    Ok(())
}
