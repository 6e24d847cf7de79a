use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Google Cloud Speech-to-Text の既定エンドポイント
pub const DEFAULT_ENDPOINT: &str = "https://speech.googleapis.com";

/// 書き起こしサービス設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberSettings {
    /// 認証情報ファイルのパス（内容は RecognizerFactory が解釈する）
    pub credentials_path: PathBuf,
    /// 言語コード（例: "en-US"）。ローカルでは検証しない。
    pub language_code: String,
    /// デバッグ出力（認識テキストをログに出す）
    pub debug: bool,
    /// チャンク入力の扱い
    pub chunked_mode: ChunkedMode,
    /// リクエストに載せるサンプルレートの決め方
    pub sample_rate_policy: SampleRatePolicy,
    /// API ベース URL（末尾スラッシュなし）
    pub endpoint: String,
}

/// チャンク入力の動作モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkedMode {
    /// 全チャンクを連結してから 1 回だけ送信する
    BufferThenSend,
    /// チャンク入力を受け付けず、即座に Unsupported を返す
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRatePolicy {
    /// 16000 Hz 以外の入力を Configuration エラーで拒否する
    Require16k,
    /// 入力の実サンプルレートをそのままリクエストに載せる
    Forward,
}

impl TranscriberSettings {
    pub fn new(credentials_path: impl Into<PathBuf>, language_code: impl Into<String>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            language_code: language_code.into(),
            ..Default::default()
        }
    }
}

impl Default for TranscriberSettings {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::new(),
            language_code: "en-US".to_string(),
            debug: false,
            chunked_mode: ChunkedMode::BufferThenSend,
            sample_rate_policy: SampleRatePolicy::Require16k,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}
