use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{
    CheckpointCorroboration, CheckpointSubmission, CursorProgress, LoadedPool, ReconcileRequest,
    ReconcileResponse, StreakSnapshot, StudyBackend,
};
use crate::error::BackendError;

const TIMEOUT: u64 = 5000;
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
pub const SERVER_URL_ENV: &str = "STUDYFLOW_SERVER_URL";

/// Talks JSON to a study server rooted at `base_url`.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(TIMEOUT))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(BackendError::Rejected {
            status: status.as_u16(),
            message: message.trim().to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = Self::send(self.client.get(self.url(path))).await?;
        Ok(response.json().await?)
    }
}

impl StudyBackend for HttpBackend {
    fn load_pool<'a>(&'a self, set_id: &'a str) -> BoxFuture<'a, Result<LoadedPool, BackendError>> {
        async move {
            match self.get_json(&format!("sets/{set_id}")).await {
                Err(BackendError::Rejected { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                    Err(BackendError::UnknownSet(set_id.to_string()))
                }
                other => other,
            }
        }
        .boxed()
    }

    fn save_cursor_progress(
        &self,
        progress: CursorProgress,
    ) -> BoxFuture<'_, Result<(), BackendError>> {
        async move {
            Self::send(self.client.post(self.url("progress")).json(&progress)).await?;
            Ok(())
        }
        .boxed()
    }

    fn fetch_streak_snapshot(&self) -> BoxFuture<'_, Result<StreakSnapshot, BackendError>> {
        self.get_json::<StreakSnapshot>("streak").boxed()
    }

    fn reconcile_action(
        &self,
        request: ReconcileRequest,
    ) -> BoxFuture<'_, Result<ReconcileResponse, BackendError>> {
        async move {
            let response =
                Self::send(self.client.post(self.url("streak/actions")).json(&request)).await?;
            Ok(response.json().await?)
        }
        .boxed()
    }

    fn submit_checkpoint_answers(
        &self,
        submission: CheckpointSubmission,
    ) -> BoxFuture<'_, Result<Option<CheckpointCorroboration>, BackendError>> {
        async move {
            let request = self
                .client
                .post(self.url("checkpoints/grade"))
                .json(&submission);
            match Self::send(request).await {
                Ok(response) => Ok(Some(response.json().await?)),
                Err(BackendError::Rejected { status, .. })
                    if status == StatusCode::NOT_FOUND.as_u16() =>
                {
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned response and returns the base URL to reach it.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/")
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:9000/api/").unwrap();
        assert_eq!(backend.base_url(), "http://localhost:9000/api");
        assert_eq!(backend.url("/streak"), "http://localhost:9000/api/streak");
    }

    #[tokio::test]
    async fn fetches_streak_snapshot() {
        let url = serve_once(
            "200 OK",
            r#"{"todayPoints":3,"dailyGoal":10,"currentStreak":5,"dailyGoalMet":false}"#,
        )
        .await;
        let backend = HttpBackend::new(url).unwrap();
        let snapshot = backend.fetch_streak_snapshot().await.unwrap();
        assert_eq!(snapshot.today_points, 3);
        assert_eq!(snapshot.current_streak, 5);
    }

    #[tokio::test]
    async fn server_error_is_rejected_with_message() {
        let url = serve_once("500 Internal Server Error", "boom").await;
        let backend = HttpBackend::new(url).unwrap();
        let err = backend
            .reconcile_action(ReconcileRequest { points: 1 })
            .await
            .unwrap_err();
        match err {
            BackendError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_grading_endpoint_means_no_corroboration() {
        let url = serve_once("404 Not Found", "").await;
        let backend = HttpBackend::new(url).unwrap();
        let result = backend
            .submit_checkpoint_answers(CheckpointSubmission {
                set_id: "s".into(),
                item_ids: vec!["abc".into()],
                questions: vec![],
                answers: vec![],
            })
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn unknown_set_maps_404() {
        let url = serve_once("404 Not Found", "").await;
        let backend = HttpBackend::new(url).unwrap();
        let err = backend.load_pool("nope").await.unwrap_err();
        assert!(matches!(err, BackendError::UnknownSet(id) if id == "nope"));
    }
}
