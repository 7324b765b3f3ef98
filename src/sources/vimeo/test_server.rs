//! Bare HTTP/1.1 server on a local port, for exercising the real reqwest paths.

use reqwest::Client;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// How the server answers one connection
#[derive(Debug, Clone)]
pub enum Response {
    Full {
        status: &'static str,
        body: &'static [u8],
    },
    /// Announce `length` bytes, send `partial`, then go quiet
    Stall {
        length: usize,
        partial: &'static [u8],
    },
}

pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    /// The n-th connection gets `responses[n]`; later ones repeat the last entry
    pub async fn start(responses: Vec<Response>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let response = responses.get(n).or(responses.last()).cloned();

                tokio::spawn(async move {
                    let mut request = [0u8; 4096];
                    let _ = socket.read(&mut request).await;

                    match response {
                        Some(Response::Full { status, body }) => {
                            let head = format!(
                                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                                status,
                                body.len()
                            );
                            let _ = socket.write_all(head.as_bytes()).await;
                            let _ = socket.write_all(body).await;
                            let _ = socket.shutdown().await;
                        }
                        Some(Response::Stall { length, partial }) => {
                            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", length);
                            let _ = socket.write_all(head.as_bytes()).await;
                            let _ = socket.write_all(partial).await;
                            let _ = socket.flush().await;
                            tokio::time::sleep(Duration::from_secs(30)).await;
                        }
                        None => {}
                    }
                });
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Connections accepted so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// URL of a local port nothing listens on
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/master.json", addr)
}

/// Client that never goes through a proxy from the environment
pub fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}
