//! Google Cloud Speech-to-Text v1 (`speech:recognize`) の REST バインディング。
//!
//! 音声は base64 で 1 リクエストに埋め込んで送る。ストリーミング API は使わない。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{Recognizer, RecognizerFactory};
use crate::domain::error::TranscribeError;
use crate::domain::settings::TranscriberSettings;
use crate::domain::stt::{RecognitionRequest, RecognizeResponse};

// ─── 認証情報 ────────────────────────────────────────────────────

/// 認証情報ファイルから読み込んだ資格情報
#[derive(Clone, PartialEq, Eq)]
pub enum GoogleCredentials {
    /// `?key=` クエリで送る API キー
    ApiKey(String),
    /// Authorization: Bearer で送る OAuth アクセストークン
    AccessToken(String),
}

// 秘密情報をログに出さない
impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => write!(f, "ApiKey(***)"),
            Self::AccessToken(_) => write!(f, "AccessToken(***)"),
        }
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl GoogleCredentials {
    pub fn from_file(path: &Path) -> Result<Self, TranscribeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TranscribeError::configuration(format!(
                "Cannot read credentials file {:?}: {}",
                path, e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, TranscribeError> {
        let file: CredentialsFile = serde_json::from_str(raw).map_err(|e| {
            TranscribeError::configuration(format!("Invalid credentials JSON: {e}"))
        })?;

        if let Some(key) = file.api_key.filter(|k| !k.is_empty()) {
            return Ok(Self::ApiKey(key));
        }
        if let Some(token) = file.access_token.filter(|t| !t.is_empty()) {
            return Ok(Self::AccessToken(token));
        }
        if file.kind.as_deref() == Some("service_account") {
            return Err(TranscribeError::configuration(
                "Service account key files require an OAuth token exchange, which is not \
                 supported; provide a credentials file with \"access_token\" or \"api_key\"",
            ));
        }
        Err(TranscribeError::configuration(
            "Credentials file contains neither \"api_key\" nor \"access_token\"",
        ))
    }
}

// ─── リクエスト/レスポンスの JSON 表現 ──────────────────────────

#[derive(Debug, Serialize)]
struct RecognizeBody<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    /// base64 エンコード済み音声
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

fn build_body(request: &RecognitionRequest) -> RecognizeBody<'_> {
    RecognizeBody {
        config: RecognitionConfig {
            encoding: request.encoding.as_str(),
            sample_rate_hertz: request.sample_rate_hertz,
            language_code: &request.language_code,
            model: &request.model,
        },
        audio: RecognitionAudio {
            content: base64::engine::general_purpose::STANDARD.encode(&request.audio_content),
        },
    }
}

/// 非 2xx レスポンスを RemoteCall エラーに変換する。認証拒否は回復不能扱い。
fn status_error(status: reqwest::StatusCode, body: &str) -> TranscribeError {
    let detail = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => {
            let message = err.error.message.unwrap_or_else(|| "Unknown error".to_string());
            match err.error.status {
                Some(s) => format!("{s}: {message}"),
                None => message,
            }
        }
        Err(_) => body.chars().take(500).collect(),
    };

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        TranscribeError::remote_fatal(format!("Authentication rejected ({status}): {detail}"))
    } else if status.is_client_error() {
        TranscribeError::remote_fatal(format!("Speech API error ({status}): {detail}"))
    } else {
        TranscribeError::remote(format!("Speech API error ({status}): {detail}"))
    }
}

// ─── GoogleCloudRecognizer ───────────────────────────────────────

/// Google Cloud Speech-to-Text クライアント。HTTP クライアントは全呼び出しで再利用する。
pub struct GoogleCloudRecognizer {
    client: reqwest::Client,
    credentials: GoogleCredentials,
    endpoint: String,
}

impl GoogleCloudRecognizer {
    pub fn new(
        credentials: GoogleCredentials,
        endpoint: impl Into<String>,
    ) -> Result<Self, TranscribeError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            TranscribeError::configuration(format!("Failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            credentials,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/speech:recognize", self.endpoint)
    }
}

#[async_trait]
impl Recognizer for GoogleCloudRecognizer {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognizeResponse, TranscribeError> {
        log::debug!(
            "POSTing {} byte(s) of audio to {}",
            request.audio_content.len(),
            self.url()
        );

        let builder = self.client.post(self.url()).json(&build_body(request));
        let builder = match &self.credentials {
            GoogleCredentials::ApiKey(key) => builder.query(&[("key", key.as_str())]),
            GoogleCredentials::AccessToken(token) => builder.bearer_auth(token),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TranscribeError::remote(format!("Speech API request timed out: {e}"))
            } else {
                TranscribeError::remote(format!("HTTP request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscribeError::remote(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| TranscribeError::remote(format!("Response parse error: {e}")))
    }

    fn name(&self) -> &str {
        "google-cloud"
    }
}

/// 認証情報ファイルを読み、GoogleCloudRecognizer を組み立てるファクトリ。
/// ネットワークには接続しない。
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleCloudFactory;

impl RecognizerFactory for GoogleCloudFactory {
    fn create(
        &self,
        settings: &TranscriberSettings,
    ) -> Result<Arc<dyn Recognizer>, TranscribeError> {
        let credentials = GoogleCredentials::from_file(&settings.credentials_path)?;
        log::debug!("Loaded {:?} from {:?}", credentials, settings.credentials_path);
        Ok(Arc::new(GoogleCloudRecognizer::new(
            credentials,
            settings.endpoint.as_str(),
        )?))
    }
}
