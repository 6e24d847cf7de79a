//! クラウド音声認識 API へ WAV 音声を送り、書き起こし結果を返すコアライブラリ。

pub mod domain {
    pub mod error;
    pub mod settings;
    pub mod stt;

    #[cfg(test)]
    mod serde_tests;
}

pub mod infra {
    pub mod audio;
    pub mod stt;
}

pub mod usecase {
    pub mod transcription_service;
}

pub use domain::error::{ErrorKind, TranscribeError};
pub use domain::settings::{ChunkedMode, SampleRatePolicy, TranscriberSettings};
pub use domain::stt::{AudioClip, RecognitionRequest, RecognizeResponse, Transcription};
pub use usecase::transcription_service::TranscriptionService;
