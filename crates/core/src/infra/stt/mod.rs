pub mod google;
mod scripted;

pub use google::{GoogleCloudFactory, GoogleCloudRecognizer, GoogleCredentials};
pub use scripted::ScriptedRecognizer;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::error::TranscribeError;
use crate::domain::settings::TranscriberSettings;
use crate::domain::stt::{RecognitionRequest, RecognizeResponse};

/// リモート認識 API の trait。構築後は読み取り専用で、複数呼び出しから共有できる。
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// 1 リクエストを送り、レスポンスを待つ。失敗は RemoteCall として返す。
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognizeResponse, TranscribeError>;

    /// 実装名 (例: "google-cloud")
    fn name(&self) -> &str;

    /// 保持しているリソースを解放する。既定では何もしない。
    fn close(&self) {}
}

/// 認証情報の場所を受け取り、Recognizer を組み立てる。
///
/// 認証情報のパスは引数で明示的に渡す。プロセス環境変数は書き換えない。
pub trait RecognizerFactory {
    fn create(
        &self,
        settings: &TranscriberSettings,
    ) -> Result<Arc<dyn Recognizer>, TranscribeError>;
}
