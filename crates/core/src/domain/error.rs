use serde::Serialize;

/// 書き起こし処理のエラー種別（診断出力ではコード文字列で区別する）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// 認証情報ファイルの欠落、サンプルレート不正など。リトライしない。
    #[serde(rename = "E_CONFIGURATION")]
    Configuration,
    /// WAV コンテナが解析できない（ヘッダ不正、データ欠損）
    #[serde(rename = "E_MALFORMED_INPUT")]
    MalformedInput,
    /// ネットワーク障害、認証拒否、リモート側のエラー
    #[serde(rename = "E_REMOTE_CALL")]
    RemoteCall,
    /// チャンク入力が無効化されている
    #[serde(rename = "E_UNSUPPORTED")]
    Unsupported,
    /// 呼び出し側による中断（失敗ではない）
    #[serde(rename = "E_INTERRUPTED")]
    Interrupted,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration => "E_CONFIGURATION",
            Self::MalformedInput => "E_MALFORMED_INPUT",
            Self::RemoteCall => "E_REMOTE_CALL",
            Self::Unsupported => "E_UNSUPPORTED",
            Self::Interrupted => "E_INTERRUPTED",
        }
    }
}

/// 書き起こしエラー（CLI の診断ペイロード兼用）
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("[{}] {message}", .kind.code())]
pub struct TranscribeError {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
}

impl TranscribeError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Configuration,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn malformed_input(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::MalformedInput,
            message: msg.into(),
            recoverable: true,
        }
    }

    /// 一時的な通信障害など、再送で回復しうるリモートエラー
    pub fn remote(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::RemoteCall,
            message: msg.into(),
            recoverable: true,
        }
    }

    /// 認証拒否など、同じ設定では回復しないリモートエラー
    pub fn remote_fatal(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::RemoteCall,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unsupported,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn interrupted() -> Self {
        Self {
            kind: ErrorKind::Interrupted,
            message: "Interrupted by caller".into(),
            recoverable: true,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.kind == ErrorKind::Interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind_and_recoverable() {
        let e = TranscribeError::configuration("no credentials");
        assert_eq!(e.kind, ErrorKind::Configuration);
        assert!(!e.recoverable);

        let e = TranscribeError::malformed_input("bad header");
        assert_eq!(e.kind, ErrorKind::MalformedInput);
        assert!(e.recoverable);

        let e = TranscribeError::remote("connection reset");
        assert_eq!(e.kind, ErrorKind::RemoteCall);
        assert!(e.recoverable);

        let e = TranscribeError::remote_fatal("401");
        assert_eq!(e.kind, ErrorKind::RemoteCall);
        assert!(!e.recoverable);

        let e = TranscribeError::unsupported("chunked input disabled");
        assert_eq!(e.kind, ErrorKind::Unsupported);

        let e = TranscribeError::interrupted();
        assert!(e.is_interrupted());
    }

    #[test]
    fn display_includes_code_and_message() {
        let e = TranscribeError::remote_fatal("authentication rejected");
        let msg = e.to_string();
        assert_eq!(msg, "[E_REMOTE_CALL] authentication rejected");
    }
}
