//! TranscriptionService 統合テスト。
//!
//! ScriptedRecognizer でリモート API を置き換えて実行する。
//! 実 API を叩くテストは `#[ignore]` 付き:
//! - GOOGLE_STT_CREDENTIALS: {"api_key": ...} または {"access_token": ...} を含む JSON
//! - GOOGLE_STT_WAV: 16 kHz / 16-bit / mono の WAV ファイル
//!
//! 実行: cargo test --test transcription_integration -- --ignored

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, Stream, StreamExt};

use cloud_asr_core::domain::error::{ErrorKind, TranscribeError};
use cloud_asr_core::domain::settings::TranscriberSettings;
use cloud_asr_core::domain::stt::RecognizeResponse;
use cloud_asr_core::infra::audio::WavChunkReader;
use cloud_asr_core::infra::stt::ScriptedRecognizer;
use cloud_asr_core::TranscriptionService;

struct Fixture {
    service: TranscriptionService,
    recognizer: Arc<ScriptedRecognizer>,
    _credentials: tempfile::NamedTempFile,
}

fn fixture(recognizer: Arc<ScriptedRecognizer>) -> Fixture {
    let credentials = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(credentials.path(), r#"{"api_key":"integration"}"#).unwrap();
    let settings = TranscriberSettings::new(credentials.path(), "en-US");
    let service = TranscriptionService::new(settings, &recognizer).unwrap();
    Fixture {
        service,
        recognizer,
        _credentials: credentials,
    }
}

fn synth_wav(frames: u32, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            writer.write_sample((i % 2000) as i16 - 1000).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, TranscribeError>> {
    stream::iter(parts.into_iter().map(Ok))
}

// ─── Scenarios ───────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_single_alternative() {
    let f = fixture(ScriptedRecognizer::replying(RecognizeResponse::single(
        "turn on the light",
        Some(0.92),
    )));

    let result = f
        .service
        .transcribe_wav(&synth_wav(16000, 16000))
        .await
        .unwrap()
        .expect("transcription expected");

    assert_eq!(result.text, "turn on the light");
    assert_eq!(result.likelihood, 0.92);
    assert_eq!(result.wav_seconds, 1.0);
    assert!(result.transcribe_seconds >= 0.0);
}

#[tokio::test]
async fn scenario_b_zero_results_is_absent() {
    let f = fixture(ScriptedRecognizer::replying(RecognizeResponse::default()));

    let result = f.service.transcribe_wav(&synth_wav(32000, 16000)).await.unwrap();
    assert!(result.is_none());
    assert_eq!(f.recognizer.request_count(), 1);
}

#[tokio::test]
async fn scenario_c_chunked_duration() {
    let f = fixture(ScriptedRecognizer::replying(RecognizeResponse::single("ok", Some(0.5))));

    let result = f
        .service
        .transcribe_stream(chunks(vec![vec![0u8; 1600]; 3]), 16000, 1, 1)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.wav_seconds, 0.3);
    assert_eq!(f.recognizer.requests()[0].audio_content.len(), 4800);
}

#[tokio::test]
async fn scenario_d_authentication_failure() {
    let f = fixture(ScriptedRecognizer::failing(TranscribeError::remote_fatal(
        "Authentication rejected (401 Unauthorized): invalid API key",
    )));

    let err = f
        .service
        .transcribe_wav(&synth_wav(16000, 16000))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RemoteCall);
    assert!(!err.recoverable);

    f.service.stop();
    assert_eq!(f.recognizer.close_count(), 1);
}

// ─── Properties ──────────────────────────────────────────────────

#[tokio::test]
async fn duration_is_frames_over_rate() {
    let frame_counts = [1u32, 777, 16000, 48123];
    let recognizer = Arc::new(ScriptedRecognizer::new());
    for _ in frame_counts {
        recognizer.push_reply(RecognizeResponse::single("x", Some(1.0)));
    }
    let f = fixture(recognizer);

    for frames in frame_counts {
        let result = f
            .service
            .transcribe_wav(&synth_wav(frames, 16000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.wav_seconds, frames as f64 / 16000.0);
    }
}

#[tokio::test]
async fn chunk_payload_is_ordered_concatenation() {
    let recognizer = Arc::new(ScriptedRecognizer::new());
    let f = fixture(recognizer);

    let b1 = vec![1u8, 2, 3, 4];
    let b2 = vec![5u8, 6];
    let b3 = vec![7u8, 8, 9, 10];

    f.service
        .transcribe_stream(chunks(vec![b1.clone(), b2.clone(), b3.clone()]), 16000, 2, 1)
        .await
        .unwrap();
    f.service
        .transcribe_stream(chunks(vec![b3.clone(), b1.clone(), b2.clone()]), 16000, 2, 1)
        .await
        .unwrap();

    let requests = f.recognizer.requests();
    let expected: Vec<u8> = [b1, b2, b3].concat();
    assert_eq!(requests[0].audio_content, expected);
    assert_ne!(requests[1].audio_content, expected);
}

#[tokio::test]
async fn chunked_wav_matches_whole_file_payload() {
    let f = fixture(Arc::new(ScriptedRecognizer::new()));
    let wav = synth_wav(5000, 16000);

    f.service.transcribe_wav(&wav).await.unwrap();

    let reader = WavChunkReader::new(Cursor::new(wav), 1024).unwrap();
    let format = reader.format();
    f.service
        .transcribe_stream(
            stream::iter(reader),
            format.sample_rate,
            format.sample_width,
            format.channels,
        )
        .await
        .unwrap();

    let requests = f.recognizer.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].audio_content, requests[1].audio_content);
}

#[tokio::test]
async fn missing_confidence_defaults_to_zero() {
    let f = fixture(ScriptedRecognizer::replying(RecognizeResponse::single("hello", None)));

    let result = f
        .service
        .transcribe_wav(&synth_wav(1600, 16000))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.text, "hello");
    assert_eq!(result.likelihood, 0.0);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let f = fixture(Arc::new(ScriptedRecognizer::new()));
    f.service.stop();
    f.service.stop();
    assert_eq!(f.recognizer.close_count(), 1);
}

#[tokio::test]
async fn malformed_input_makes_no_remote_call() {
    let f = fixture(Arc::new(ScriptedRecognizer::new()));

    let err = f
        .service
        .transcribe_wav(b"RIFF\x00\x00\x00\x00JUNKJUNK")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::MalformedInput);
    assert_eq!(f.recognizer.request_count(), 0);
}

#[tokio::test]
async fn dropping_stream_mid_drain_sends_nothing() {
    let f = fixture(Arc::new(ScriptedRecognizer::new()));
    let stalled = chunks(vec![vec![0u8; 3200]]).chain(stream::pending());

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        f.service.transcribe_stream(stalled, 16000, 2, 1),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(f.recognizer.request_count(), 0);

    f.service.stop();
    assert_eq!(f.recognizer.close_count(), 1);
}

#[tokio::test]
async fn concurrent_calls_share_one_service() {
    let recognizer = Arc::new(ScriptedRecognizer::new());
    for _ in 0..4 {
        recognizer.push_reply(RecognizeResponse::single("same", Some(0.3)));
    }
    let f = fixture(recognizer);
    let wav = synth_wav(1600, 16000);

    let (a, b, c, d) = tokio::join!(
        f.service.transcribe_wav(&wav),
        f.service.transcribe_wav(&wav),
        f.service.transcribe_wav(&wav),
        f.service.transcribe_wav(&wav),
    );
    for result in [a, b, c, d] {
        assert_eq!(result.unwrap().unwrap().text, "same");
    }
    assert_eq!(f.recognizer.request_count(), 4);
}

// ─── Live API ────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn transcribe_with_google_cloud() {
    let credentials = std::env::var("GOOGLE_STT_CREDENTIALS")
        .map(PathBuf::from)
        .expect("GOOGLE_STT_CREDENTIALS env var required for live tests");
    let wav_path = std::env::var("GOOGLE_STT_WAV")
        .map(PathBuf::from)
        .expect("GOOGLE_STT_WAV env var required for live tests");

    let service =
        TranscriptionService::connect(TranscriberSettings::new(credentials, "en-US")).unwrap();
    let wav = std::fs::read(&wav_path).unwrap();

    match service.transcribe_wav(&wav).await {
        Ok(Some(t)) => println!("Transcribed: {} ({})", t.text, t.likelihood),
        Ok(None) => println!("No speech recognized (acceptable for test)"),
        Err(e) => panic!("Unexpected error: {}", e),
    }
    service.stop();
}
