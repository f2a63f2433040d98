// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Result comment for a pull request thread
//!
//! Posts the overall coverage and the failed tests as a Markdown comment in
//! the Azure DevOps pull request threads format.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Thread status `closed`
const THREAD_STATUS: u8 = 2;
/// Comment type `text`
const COMMENT_TYPE: u8 = 1;

/// Webhook errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request could not be sent
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status
    #[error("Webhook returned {status}: {body}")]
    Status {
        /// Response status
        status: reqwest::StatusCode,
        /// Response body, possibly empty
        body: String,
    },
}

/// Request body: a new thread holding one comment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    pub status: u8,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub parent_comment_id: u32,
    pub content: String,
    pub comment_type: u8,
}

impl CommentThread {
    #[must_use]
    pub fn new(coverage: f64, failed_tests: &[String]) -> Self {
        Self {
            status: THREAD_STATUS,
            comments: vec![Comment {
                parent_comment_id: 0,
                content: make_comment(coverage, failed_tests),
                comment_type: COMMENT_TYPE,
            }],
        }
    }
}

/// Markdown summary of a run
#[must_use]
pub fn make_comment(coverage: f64, failed_tests: &[String]) -> String {
    let mut comment = if failed_tests.is_empty() {
        "All tests are successful. 💪\n\n".to_string()
    } else {
        let mut table = "Test failed. 🙅 \n\n Failed tests:\n\n|Test name|\n|--------|\n".to_string();
        for test in failed_tests {
            table.push_str(&format!("|{test}|\n"));
        }
        table.push('\n');
        table
    };
    comment.push_str(&format!("Total coverage is {coverage:.2}%"));
    comment
}

/// Sends result comments to a webhook
#[derive(Debug, Clone)]
pub struct Notifier {
    url: String,
    token: String,
    client: reqwest::Client,
}

impl Notifier {
    /// Create a notifier; an empty `url` disables it
    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(url, token, reqwest::Client::new())
    }

    /// Create a notifier using an existing HTTP client
    #[must_use]
    pub fn with_client(
        url: impl Into<String>,
        token: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            client,
        }
    }

    /// Whether a webhook URL is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty()
    }

    /// Post the result comment; does nothing when no URL is configured
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Http` when the request fails and
    /// `NotifyError::Status` when the endpoint rejects it.
    pub async fn send(&self, coverage: f64, failed_tests: &[String]) -> Result<(), NotifyError> {
        if !self.is_enabled() {
            debug!("no webhook configured");
            return Ok(());
        }

        let body = CommentThread::new(coverage, failed_tests);
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status { status, body });
        }

        info!(url = %self.url, %status, "posted result comment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_comment_all_passed() {
        assert_eq!(
            make_comment(87.456, &[]),
            "All tests are successful. 💪\n\nTotal coverage is 87.46%"
        );
    }

    #[test]
    fn test_comment_with_failures() {
        let failed = vec!["TestA".to_string(), "TestB/sub".to_string()];
        assert_eq!(
            make_comment(42.5, &failed),
            "Test failed. 🙅 \n\n Failed tests:\n\n|Test name|\n|--------|\n|TestA|\n|TestB/sub|\n\nTotal coverage is 42.50%"
        );
    }

    #[test]
    fn test_thread_body_json() {
        let body = serde_json::to_value(CommentThread::new(0.0, &[])).expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({
                "status": 2,
                "comments": [{
                    "parentCommentId": 0,
                    "content": "All tests are successful. 💪\n\nTotal coverage is 0.00%",
                    "commentType": 1
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_empty_url_is_noop() {
        let notifier = Notifier::new("", "token");
        assert!(!notifier.is_enabled());
        notifier.send(50.0, &[]).await.expect("no-op");
    }

    /// Serve one HTTP request with `status_line`, returning the raw request
    async fn serve_once(listener: TcpListener, status_line: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.expect("read");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).to_string()
    }

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("client")
    }

    #[tokio::test]
    async fn test_send_posts_comment_with_bearer_token() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("http://{}/threads", listener.local_addr().expect("addr"));
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 200 OK"));

        let notifier = Notifier::with_client(url, "s3cr3t", local_client());
        notifier
            .send(75.0, &["TestBroken".to_string()])
            .await
            .expect("send succeeds");

        let request = server.await.expect("server");
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /threads "), "{request}");
        assert!(lower.contains("authorization: bearer s3cr3t"), "{request}");
        assert!(lower.contains("content-type: application/json"), "{request}");
        assert!(request.contains("\"commentType\":1"), "{request}");
        assert!(request.contains("|TestBroken|"), "{request}");
    }

    #[tokio::test]
    async fn test_send_rejected_status_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("http://{}/threads", listener.local_addr().expect("addr"));
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 401 Unauthorized"));

        let notifier = Notifier::with_client(url, "wrong", local_client());
        let result = notifier.send(75.0, &[]).await;
        server.await.expect("server");

        match result {
            Err(NotifyError::Status { status, .. }) => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }
}
