use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::{Stream, TryStreamExt};

use crate::domain::error::TranscribeError;
use crate::domain::settings::{ChunkedMode, SampleRatePolicy, TranscriberSettings};
use crate::domain::stt::{
    validate_format, AudioClip, AudioEncoding, RecognitionRequest, Transcription, COMMAND_MODEL,
    REQUIRED_SAMPLE_RATE,
};
use crate::infra::audio::{parse_wav, ChunkBuffer};
use crate::infra::stt::{GoogleCloudFactory, Recognizer, RecognizerFactory};

/// 書き起こしサービス。
///
/// 構築時に作った Recognizer を全呼び出しで使い回す。Recognizer は構築後に
/// 変更されないため、同じインスタンスを複数タスクから並行に呼び出してよい。
pub struct TranscriptionService {
    recognizer: Arc<dyn Recognizer>,
    settings: TranscriberSettings,
    stopped: AtomicBool,
}

impl TranscriptionService {
    /// 認証情報ファイルの存在を確認し、factory に Recognizer を作らせる。
    /// ネットワークには接続しない。
    pub fn new(
        settings: TranscriberSettings,
        factory: &dyn RecognizerFactory,
    ) -> Result<Self, TranscribeError> {
        check_credentials(&settings.credentials_path)?;
        let recognizer = factory.create(&settings)?;

        log::info!(
            "Transcriber ready (recognizer={}, language_code={})",
            recognizer.name(),
            settings.language_code
        );

        Ok(Self {
            recognizer,
            settings,
            stopped: AtomicBool::new(false),
        })
    }

    /// Google Cloud Speech-to-Text を使うサービスを作る。
    pub fn connect(settings: TranscriberSettings) -> Result<Self, TranscribeError> {
        Self::new(settings, &GoogleCloudFactory)
    }

    /// WAV ファイル全体を書き起こす。
    ///
    /// WAV が解析できなければ MalformedInput を返し、リモート呼び出しは行わない。
    pub async fn transcribe_wav(
        &self,
        wav_bytes: &[u8],
    ) -> Result<Option<Transcription>, TranscribeError> {
        let clip = parse_wav(wav_bytes)?;
        log::debug!(
            "Parsed WAV: {} Hz, {} byte(s)/sample, {} channel(s), {:.3}s",
            clip.sample_rate,
            clip.sample_width,
            clip.channels,
            clip.duration_secs
        );
        self.transcribe_clip(clip).await
    }

    /// チャンク列を書き起こす。
    ///
    /// `BufferThenSend` では全チャンクを到着順に連結し終えてから 1 回だけ送信する。
    /// `Unsupported` ではストリームを読まずに即座に Unsupported を返す。
    /// チャンク待ちの間に future を drop すれば、そこで中断できる。
    pub async fn transcribe_stream<S, B>(
        &self,
        chunks: S,
        sample_rate: u32,
        sample_width: u16,
        channels: u16,
    ) -> Result<Option<Transcription>, TranscribeError>
    where
        S: Stream<Item = Result<B, TranscribeError>>,
        B: AsRef<[u8]>,
    {
        if self.settings.chunked_mode == ChunkedMode::Unsupported {
            return Err(TranscribeError::unsupported(
                "Chunked transcription is disabled (chunked_mode = unsupported)",
            ));
        }

        // 長い録音を読み切ってから設定エラーに気付かないよう、先に検証する
        validate_format(sample_rate, sample_width, channels)?;
        self.request_sample_rate(sample_rate)?;

        let mut chunks = std::pin::pin!(chunks);
        let mut buffer = ChunkBuffer::new();
        while let Some(chunk) = chunks.try_next().await? {
            buffer.push(chunk.as_ref());
        }

        log::debug!(
            "Received {} chunk(s), {} byte(s) of audio",
            buffer.chunk_count(),
            buffer.len()
        );

        let clip = buffer.into_clip(sample_rate, sample_width, channels)?;
        self.transcribe_clip(clip).await
    }

    /// サービスを停止する。2 回目以降の呼び出しは何もしない。
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("Stopping transcriber ({})", self.recognizer.name());
        self.recognizer.close();
    }

    async fn transcribe_clip(
        &self,
        clip: AudioClip,
    ) -> Result<Option<Transcription>, TranscribeError> {
        let sample_rate_hertz = self.request_sample_rate(clip.sample_rate)?;
        let wav_seconds = clip.duration_secs;

        let start = Instant::now();
        let recognized = self.submit(clip.pcm, sample_rate_hertz).await?;
        let transcribe_seconds = start.elapsed().as_secs_f64();
        log::debug!("Decoded audio in {} second(s)", transcribe_seconds);

        Ok(recognized.map(|(text, likelihood)| Transcription {
            text,
            likelihood,
            transcribe_seconds,
            wav_seconds,
        }))
    }

    /// 認識リクエストを 1 回送り、先頭結果の先頭候補を取り出す。
    /// 候補がなければ None（エラーではない）。
    async fn submit(
        &self,
        pcm: Vec<u8>,
        sample_rate_hertz: u32,
    ) -> Result<Option<(String, f32)>, TranscribeError> {
        let request = RecognitionRequest {
            encoding: AudioEncoding::Linear16,
            sample_rate_hertz,
            language_code: self.settings.language_code.clone(),
            model: COMMAND_MODEL.to_string(),
            audio_content: pcm,
        };

        let response = self.recognizer.recognize(&request).await?;

        let Some(alternative) = response.top_alternative() else {
            log::debug!("No results returned.");
            return Ok(None);
        };

        let confidence = alternative.confidence.unwrap_or(0.0);
        log::debug!("Transcription confidence: {}", confidence);
        if self.settings.debug {
            log::debug!("Transcript: {:?}", alternative.transcript);
        }

        Ok(Some((alternative.transcript.clone(), confidence)))
    }

    /// リクエストに載せるサンプルレートを決める。
    fn request_sample_rate(&self, actual: u32) -> Result<u32, TranscribeError> {
        match self.settings.sample_rate_policy {
            SampleRatePolicy::Forward => Ok(actual),
            SampleRatePolicy::Require16k if actual == REQUIRED_SAMPLE_RATE => Ok(actual),
            SampleRatePolicy::Require16k => Err(TranscribeError::configuration(format!(
                "Audio sample rate is {actual} Hz but {REQUIRED_SAMPLE_RATE} Hz is required \
                 (resample the input or use sample_rate_policy = forward)"
            ))),
        }
    }
}

impl std::fmt::Debug for TranscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionService")
            .field("recognizer", &self.recognizer.name())
            .field("language_code", &self.settings.language_code)
            .finish()
    }
}

fn check_credentials(path: &Path) -> Result<(), TranscribeError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        TranscribeError::configuration(format!(
            "Credentials file {:?} is not accessible: {}",
            path, e
        ))
    })?;
    if !metadata.is_file() {
        return Err(TranscribeError::configuration(format!(
            "Credentials path {:?} is not a file",
            path
        )));
    }
    std::fs::File::open(path).map_err(|e| {
        TranscribeError::configuration(format!(
            "Credentials file {:?} is not readable: {}",
            path, e
        ))
    })?;
    Ok(())
}
