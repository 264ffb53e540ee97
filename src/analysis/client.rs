use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, Url,
};
use serde::Serialize;

use crate::frame::EncodedImage;

use super::{
    types::{parse_response, AnalysisResult, ClientError, UploadPayload},
    AnalysisBackend,
};

const FRAME_ENDPOINT: &str = "analyze_webcam";
const FILE_ENDPOINT: &str = "analyze";

#[derive(Serialize)]
struct FrameRequest<'a> {
    image: &'a str,
}

/// HTTP client for the analysis service.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    frame_url: Url,
    file_url: Url,
    timeout: Option<Duration>,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        // without the trailing slash `join` would replace the last path segment
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&base).with_context(|| format!("invalid base url {base_url}"))?;

        Ok(Self {
            client: Client::new(),
            frame_url: base.join(FRAME_ENDPOINT)?,
            file_url: base.join(FILE_ENDPOINT)?,
            timeout,
        })
    }

    pub fn frame_url(&self) -> &Url {
        &self.frame_url
    }

    pub fn file_url(&self) -> &Url {
        &self.file_url
    }

    async fn send(
        &self,
        request: impl Future<Output = Result<Response, reqwest::Error>>,
    ) -> Result<AnalysisResult, ClientError> {
        let exchange = async {
            let response = request.await?;
            let status = response.status();
            let body = response.bytes().await?;

            if !status.is_success() {
                return Err(ClientError::Status {
                    status,
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }

            parse_response(&body)
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => exchange.await,
        }
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisClient {
    async fn analyze_frame(&self, image: &EncodedImage) -> Result<AnalysisResult, ClientError> {
        let data_url = image.to_data_url();
        let request = self
            .client
            .post(self.frame_url.clone())
            .json(&FrameRequest { image: &data_url })
            .send();

        self.send(request).await
    }

    async fn analyze_file(&self, upload: &UploadPayload) -> Result<AnalysisResult, ClientError> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(upload.content_type)?;
        let form = Form::new().part("file", part);

        let request = self
            .client
            .post(self.file_url.clone())
            .multipart(form)
            .send();

        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    struct Captured {
        head: String,
        body: Vec<u8>,
    }

    /// Answers exactly one request with `status` and `body`, then hands back
    /// what it received.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            let header_end = loop {
                let n = socket.read(&mut buf).await.expect("read head");
                assert!(n > 0, "client closed before sending headers");
                raw.extend_from_slice(&buf[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);

            while raw.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.expect("read body");
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.expect("write response");
            socket.shutdown().await.ok();

            Captured {
                head,
                body: raw[header_end..].to_vec(),
            }
        });

        (format!("http://{addr}"), handle)
    }

    #[test]
    fn endpoints_join_onto_base_path() {
        let client = HttpAnalysisClient::new("http://127.0.0.1:8000", None).expect("client");
        assert_eq!(client.frame_url().as_str(), "http://127.0.0.1:8000/analyze_webcam");
        assert_eq!(client.file_url().as_str(), "http://127.0.0.1:8000/analyze");

        let client = HttpAnalysisClient::new("http://posture.local/api", None).expect("client");
        assert_eq!(client.frame_url().as_str(), "http://posture.local/api/analyze_webcam");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(HttpAnalysisClient::new("not a url", None).is_err());
    }

    #[tokio::test]
    async fn frame_is_posted_as_data_url_json() {
        let (base, server) =
            one_shot_server("200 OK", r#"{"feedback":"Slouching detected","score":42}"#).await;
        let client = HttpAnalysisClient::new(&base, None).expect("client");

        let result = client
            .analyze_frame(&EncodedImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
            .await
            .expect("analysis");
        assert_eq!(result, AnalysisResult::new("Slouching detected", Some(42)));

        let captured = server.await.expect("server task");
        assert!(captured.head.starts_with("POST /analyze_webcam HTTP/1.1"));
        let sent: serde_json::Value = serde_json::from_slice(&captured.body).expect("json body");
        assert_eq!(sent["image"], "data:image/jpeg;base64,/9j/2Q==");
    }

    #[tokio::test]
    async fn file_is_posted_as_multipart_field() {
        let (base, server) = one_shot_server("200 OK", r#"{"feedback":"Analyzed 3 frames"}"#).await;
        let client = HttpAnalysisClient::new(&base, None).expect("client");
        let upload = UploadPayload::new(Path::new("squat.mp4"), b"fake-video".to_vec());

        let result = client.analyze_file(&upload).await.expect("analysis");
        assert_eq!(result, AnalysisResult::new("Analyzed 3 frames", None));

        let captured = server.await.expect("server task");
        assert!(captured.head.starts_with("POST /analyze HTTP/1.1"));
        assert!(captured
            .head
            .to_ascii_lowercase()
            .contains("content-type: multipart/form-data; boundary="));
        let body = String::from_utf8_lossy(&captured.body);
        assert!(body.contains(r#"name="file"; filename="squat.mp4""#));
        assert!(body.contains("Content-Type: video/mp4"));
        assert!(body.contains("fake-video"));
    }

    #[tokio::test]
    async fn error_status_is_reported_not_parsed() {
        let (base, server) = one_shot_server("500 Internal Server Error", r#"{"feedback":"boom"}"#).await;
        let client = HttpAnalysisClient::new(&base, None).expect("client");

        let err = client
            .analyze_frame(&EncodedImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
            .await
            .expect_err("500 must fail");
        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert!(body.contains("boom"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client = HttpAnalysisClient::new(&format!("http://{addr}"), None).expect("client");
        let err = client
            .analyze_frame(&EncodedImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
            .await
            .expect_err("nothing listening");
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn silent_server_hits_the_configured_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let limit = Duration::from_millis(100);
        let client = HttpAnalysisClient::new(&format!("http://{addr}"), Some(limit)).expect("client");
        let err = client
            .analyze_frame(&EncodedImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
            .await
            .expect_err("server never answers");
        assert!(matches!(err, ClientError::Timeout(d) if d == limit));

        server.abort();
    }
}
