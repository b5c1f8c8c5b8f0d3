/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::time::Duration;

use log::debug;

use crate::error::FmiError;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/106.0.5249.62 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

pub fn build_client(timeout: Duration) -> Result<reqwest::Client, FmiError> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()?;

    Ok(client)
}

/// Fetches `url` and returns the body. Anything but 200 OK is an error.
pub async fn get_xml(client: &reqwest::Client, url: &str) -> Result<String, FmiError> {
    debug!("Querying data from FMI API (url={})", url);

    let response = client.get(url).send().await?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(FmiError::Api {
            status: status.as_u16(),
        });
    }

    let xml = response.text().await?;

    Ok(xml)
}

#[cfg(test)]
pub mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `response` verbatim to every connection. Returns the base url.
    pub async fn serve(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(s) => s,
                    Err(_) => return,
                };
                let response = response.clone();
                tokio::spawn(async move {
                    let mut request = vec![];
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    pub async fn serve_xml(body: &str) -> String {
        serve(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await
    }

    /// Accepts connections but never answers.
    pub async fn serve_silence() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut held = vec![];
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::*;
    use super::*;

    #[tokio::test]
    async fn ok_body() {
        let base = serve_xml("<a/>").await;
        let client = build_client(DEFAULT_TIMEOUT).unwrap();
        let body = get_xml(&client, &base).await.unwrap();
        assert_eq!(body, "<a/>");
    }

    #[tokio::test]
    async fn service_unavailable() {
        let base = serve(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_owned(),
        )
        .await;
        let client = build_client(DEFAULT_TIMEOUT).unwrap();
        match get_xml(&client, &base).await {
            Err(FmiError::Api { status }) => assert_eq!(status, 503),
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn timeout() {
        let base = serve_silence().await;
        let client = build_client(Duration::from_millis(200)).unwrap();
        match get_xml(&client, &base).await {
            Err(FmiError::Timeout(_)) => {}
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_refused() {
        // Bind and drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = build_client(DEFAULT_TIMEOUT).unwrap();
        match get_xml(&client, &format!("http://{}", addr)).await {
            Err(FmiError::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
