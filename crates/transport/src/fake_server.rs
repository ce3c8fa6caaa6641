//! One-shot HTTP/1.1 server for exercising the transport against real sockets.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::config::ClientConfig;

/// What the server saw on its single connection.
#[derive(Debug)]
pub struct Exchange {
    /// Request head and body as received.
    pub request: String,
    /// Whether the client hung up while the server held the connection open.
    pub client_closed: bool,
}

pub struct FakeServer {
    pub base_url: String,
    pub exchange: oneshot::Receiver<Exchange>,
}

impl FakeServer {
    /// Accepts one connection, replies with `response` and closes the socket.
    pub async fn reply(response: impl Into<Vec<u8>>) -> Self {
        Self::spawn(response.into(), false).await
    }

    /// Accepts one connection, replies with `response` and keeps the socket open
    /// until the client hangs up.
    pub async fn reply_and_hold(response: impl Into<Vec<u8>>) -> Self {
        Self::spawn(response.into(), true).await
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: format!("{}/agent", self.base_url),
            request_timeout_secs: 5,
            ..ClientConfig::default()
        }
    }

    pub async fn finish(self) -> Exchange {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.exchange)
            .await
            .expect("server finished in time")
            .expect("server reported its exchange")
    }

    async fn spawn(response: Vec<u8>, hold: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local address");
        let (sender, exchange) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            socket.write_all(&response).await.expect("write response");
            socket.flush().await.expect("flush response");

            let mut client_closed = false;
            if hold {
                let mut buffer = [0u8; 256];
                client_closed = matches!(socket.read(&mut buffer).await, Ok(0) | Err(_));
            }
            let _ = sender.send(Exchange {
                request,
                client_closed,
            });
        });

        Self {
            base_url: format!("http://{address}"),
            exchange,
        }
    }
}

/// Builds a response with a `Content-Length` body.
pub fn response(status_line: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Builds an event stream response whose body runs until the socket closes.
pub fn event_stream(frames: &[&str]) -> String {
    let mut response =
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n"
            .to_string();
    for frame in frames {
        response.push_str(frame);
    }
    response
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut received = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(head_end) = find_head_end(&received) {
            let head = String::from_utf8_lossy(&received[..head_end]).to_ascii_lowercase();
            if received.len() >= head_end + content_length(&head) {
                break;
            }
        }
        let read = socket.read(&mut chunk).await.expect("read request");
        if read == 0 {
            break;
        }
        received.extend_from_slice(&chunk[..read]);
    }

    String::from_utf8_lossy(&received).into_owned()
}

fn find_head_end(received: &[u8]) -> Option<usize> {
    received
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|position| position + 4)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}
