use serde::{Deserialize, Serialize};

use super::error::TranscribeError;

/// リモート API が前提とするサンプルレート (Hz)
pub const REQUIRED_SAMPLE_RATE: u32 = 16_000;

/// 短い発話・コマンド向けの認識モデル
pub const COMMAND_MODEL: &str = "command_and_search";

// ─── AudioClip ───────────────────────────────────────────────────

/// 認識リクエストに載せる PCM 音声。永続化しない。
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// 生 PCM バイト列（WAV ヘッダを含まない）
    pub pcm: Vec<u8>,
    /// サンプルレート (Hz)
    pub sample_rate: u32,
    /// 1 サンプルあたりのバイト数
    pub sample_width: u16,
    /// チャンネル数
    pub channels: u16,
    /// 音声長 (秒)
    pub duration_secs: f64,
}

impl AudioClip {
    /// WAV ヘッダのフレーム数から音声長を求める。duration = frames / rate。
    pub fn from_frames(
        pcm: Vec<u8>,
        sample_rate: u32,
        sample_width: u16,
        channels: u16,
        frames: u32,
    ) -> Result<Self, TranscribeError> {
        validate_format(sample_rate, sample_width, channels)?;
        Ok(Self {
            pcm,
            sample_rate,
            sample_width,
            channels,
            duration_secs: frames as f64 / sample_rate as f64,
        })
    }

    /// 連結済みチャンクから音声長を求める。
    ///
    /// duration = bytes / (rate * width * channels)。width と channels が 1 の
    /// ときはバイト数をフレーム数とみなす従来の計算と一致する。
    pub fn from_pcm(
        pcm: Vec<u8>,
        sample_rate: u32,
        sample_width: u16,
        channels: u16,
    ) -> Result<Self, TranscribeError> {
        validate_format(sample_rate, sample_width, channels)?;
        let bytes_per_second = sample_rate as f64 * sample_width as f64 * channels as f64;
        let duration_secs = pcm.len() as f64 / bytes_per_second;
        Ok(Self {
            pcm,
            sample_rate,
            sample_width,
            channels,
            duration_secs,
        })
    }
}

/// サンプルレート・サンプル幅・チャンネル数がいずれも正であることを確認する。
pub fn validate_format(
    sample_rate: u32,
    sample_width: u16,
    channels: u16,
) -> Result<(), TranscribeError> {
    if sample_rate == 0 {
        return Err(TranscribeError::configuration("Sample rate must be positive"));
    }
    if sample_width == 0 {
        return Err(TranscribeError::configuration("Sample width must be positive"));
    }
    if channels == 0 {
        return Err(TranscribeError::configuration("Channel count must be positive"));
    }
    Ok(())
}

// ─── RecognitionRequest ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioEncoding {
    /// 16-bit リニア PCM
    #[serde(rename = "LINEAR16")]
    Linear16,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear16 => "LINEAR16",
        }
    }
}

/// 1 回の認識呼び出しで送るリクエスト。音声は分割せず一括で送る。
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub model: String,
    pub audio_content: Vec<u8>,
}

// ─── RecognizeResponse ───────────────────────────────────────────

/// `speech:recognize` のレスポンス。認識なしの場合 results は空。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub results: Vec<RecognitionResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<RecognitionAlternative>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecognitionAlternative {
    #[serde(default)]
    pub transcript: String,
    /// 信頼度。API が省略した場合は None。
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl RecognizeResponse {
    /// 最初の結果の最初の候補を返す。候補がなければ None。
    pub fn top_alternative(&self) -> Option<&RecognitionAlternative> {
        self.results.first()?.alternatives.first()
    }

    /// テスト・オフライン用: 候補 1 件だけのレスポンスを作る。
    pub fn single(transcript: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            results: vec![RecognitionResult {
                alternatives: vec![RecognitionAlternative {
                    transcript: transcript.into(),
                    confidence,
                }],
            }],
        }
    }
}

// ─── Transcription ───────────────────────────────────────────────

/// 書き起こし結果。「認識なし」は Option::None で表し、空文字列の結果とは区別する。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcription {
    pub text: String,
    /// 信頼度 (0.0–1.0)。API が返さない場合は 0.0。
    pub likelihood: f32,
    /// リモート呼び出しにかかった実時間 (秒)
    pub transcribe_seconds: f64,
    /// 入力音声の長さ (秒)
    pub wav_seconds: f64,
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    #[test]
    fn from_frames_computes_duration() {
        let clip = AudioClip::from_frames(vec![0; 32000], 16000, 2, 1, 16000).unwrap();
        assert_eq!(clip.duration_secs, 1.0);
    }

    #[test]
    fn from_frames_zero_rate_is_configuration_error() {
        let err = AudioClip::from_frames(vec![], 0, 2, 1, 100).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn from_pcm_mono_8bit_treats_bytes_as_frames() {
        let clip = AudioClip::from_pcm(vec![0; 4800], 16000, 1, 1).unwrap();
        assert_eq!(clip.duration_secs, 0.3);
    }

    #[test]
    fn from_pcm_divides_by_frame_size() {
        // 16-bit stereo: 4 bytes/frame, 64000 bytes = 16000 frames = 1 s
        let clip = AudioClip::from_pcm(vec![0; 64000], 16000, 2, 2).unwrap();
        assert_eq!(clip.duration_secs, 1.0);
    }

    #[test]
    fn from_pcm_rejects_zero_width_or_channels() {
        assert_eq!(
            AudioClip::from_pcm(vec![0; 10], 16000, 0, 1).unwrap_err().kind,
            ErrorKind::Configuration
        );
        assert_eq!(
            AudioClip::from_pcm(vec![0; 10], 16000, 2, 0).unwrap_err().kind,
            ErrorKind::Configuration
        );
    }

    #[test]
    fn top_alternative_takes_first_of_first() {
        let response = RecognizeResponse {
            results: vec![
                RecognitionResult {
                    alternatives: vec![
                        RecognitionAlternative {
                            transcript: "first".into(),
                            confidence: Some(0.8),
                        },
                        RecognitionAlternative {
                            transcript: "second".into(),
                            confidence: Some(0.9),
                        },
                    ],
                },
                RecognitionResult {
                    alternatives: vec![RecognitionAlternative {
                        transcript: "other".into(),
                        confidence: Some(0.99),
                    }],
                },
            ],
        };
        assert_eq!(response.top_alternative().unwrap().transcript, "first");
    }

    #[test]
    fn top_alternative_none_when_empty() {
        assert!(RecognizeResponse::default().top_alternative().is_none());

        let no_alternatives = RecognizeResponse {
            results: vec![RecognitionResult::default()],
        };
        assert!(no_alternatives.top_alternative().is_none());
    }

    #[test]
    fn response_deserializes_missing_fields() {
        let body = r#"{"results":[{"alternatives":[{"transcript":"hi"}]}]}"#;
        let response: RecognizeResponse = serde_json::from_str(body).unwrap();
        let alt = response.top_alternative().unwrap();
        assert_eq!(alt.transcript, "hi");
        assert_eq!(alt.confidence, None);

        let empty: RecognizeResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.results.is_empty());
    }
}
