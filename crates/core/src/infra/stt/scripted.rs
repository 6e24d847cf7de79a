use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Recognizer, RecognizerFactory};
use crate::domain::error::TranscribeError;
use crate::domain::settings::TranscriberSettings;
use crate::domain::stt::{RecognitionRequest, RecognizeResponse};

/// ScriptedRecognizer: 登録した応答を順に返すモック実装。
/// 受け取ったリクエストを記録する。応答が尽きたら空レスポンス（認識なし）を返す。
#[derive(Default)]
pub struct ScriptedRecognizer {
    replies: Mutex<VecDeque<Result<RecognizeResponse, TranscribeError>>>,
    requests: Mutex<Vec<RecognitionRequest>>,
    closed: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1 件の応答を登録した状態で作る。
    pub fn replying(response: RecognizeResponse) -> Arc<Self> {
        let recognizer = Self::new();
        recognizer.push_reply(response);
        Arc::new(recognizer)
    }

    /// 1 件のエラーを登録した状態で作る。
    pub fn failing(error: TranscribeError) -> Arc<Self> {
        let recognizer = Self::new();
        recognizer.push_error(error);
        Arc::new(recognizer)
    }

    pub fn push_reply(&self, response: RecognizeResponse) {
        self.replies.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, error: TranscribeError) {
        self.replies.lock().push_back(Err(error));
    }

    /// これまでに受け取ったリクエストのコピー
    pub fn requests(&self) -> Vec<RecognitionRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognizeResponse, TranscribeError> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RecognizeResponse::default()))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// 共有中の ScriptedRecognizer をそのまま Recognizer として渡す。
impl RecognizerFactory for Arc<ScriptedRecognizer> {
    fn create(
        &self,
        _settings: &TranscriberSettings,
    ) -> Result<Arc<dyn Recognizer>, TranscribeError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stt::{AudioEncoding, COMMAND_MODEL};

    fn request() -> RecognitionRequest {
        RecognitionRequest {
            encoding: AudioEncoding::Linear16,
            sample_rate_hertz: 16000,
            language_code: "en-US".into(),
            model: COMMAND_MODEL.into(),
            audio_content: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn replies_in_order_then_empty() {
        let recognizer = ScriptedRecognizer::new();
        recognizer.push_reply(RecognizeResponse::single("one", Some(0.5)));
        recognizer.push_error(TranscribeError::remote("down"));

        let first = recognizer.recognize(&request()).await.unwrap();
        assert_eq!(first.top_alternative().unwrap().transcript, "one");

        assert!(recognizer.recognize(&request()).await.is_err());

        let third = recognizer.recognize(&request()).await.unwrap();
        assert!(third.results.is_empty());

        assert_eq!(recognizer.request_count(), 3);
        assert_eq!(recognizer.requests()[0].audio_content, vec![1, 2, 3]);
    }

    #[test]
    fn counts_close_calls() {
        let recognizer = ScriptedRecognizer::new();
        assert_eq!(recognizer.close_count(), 0);
        recognizer.close();
        assert_eq!(recognizer.close_count(), 1);
        assert_eq!(recognizer.name(), "scripted");
    }
}
