use std::io::Write;

use serde::Serialize;

use cloud_asr_core::domain::error::TranscribeError;
use cloud_asr_core::domain::stt::Transcription;

/// エラー出力ペイロード（stderr に 1 行 JSON で出す）
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload<'a> {
    pub code: &'static str,
    pub message: &'a str,
    pub recoverable: bool,
}

impl<'a> From<&'a TranscribeError> for ErrorPayload<'a> {
    fn from(e: &'a TranscribeError) -> Self {
        Self {
            code: e.kind.code(),
            message: &e.message,
            recoverable: e.recoverable,
        }
    }
}

/// 書き起こし結果を 1 行の JSON にする。認識なしは `null`。
pub fn render_line(result: Option<&Transcription>) -> serde_json::Result<String> {
    serde_json::to_string(&result)
}

/// 結果を stdout に 1 行で書き出す。
pub fn print_json(result: Option<&Transcription>) -> std::io::Result<()> {
    let line = render_line(result)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()
}

/// エラーを stderr に 1 行の JSON で書き出す。
pub fn print_error(e: &TranscribeError) {
    match serde_json::to_string(&ErrorPayload::from(e)) {
        Ok(line) => eprintln!("{line}"),
        Err(_) => eprintln!("{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_transcription_fields() {
        let t = Transcription {
            text: "turn on the light".into(),
            likelihood: 0.5,
            transcribe_seconds: 0.125,
            wav_seconds: 1.0,
        };
        let line = render_line(Some(&t)).unwrap();
        assert_eq!(
            line,
            r#"{"text":"turn on the light","likelihood":0.5,"transcribe_seconds":0.125,"wav_seconds":1.0}"#
        );
    }

    #[test]
    fn renders_absence_as_null() {
        assert_eq!(render_line(None).unwrap(), "null");
    }

    #[test]
    fn error_payload_uses_code() {
        let e = TranscribeError::unsupported("chunked input disabled");
        let json = serde_json::to_string(&ErrorPayload::from(&e)).unwrap();
        assert!(json.contains(r#""code":"E_UNSUPPORTED""#));
        assert!(json.contains("chunked input disabled"));
        assert!(json.contains(r#""recoverable":false"#));
    }
}
