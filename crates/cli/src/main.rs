mod output;

use std::future::Future;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::{stream, Stream};
use tokio::sync::{mpsc, oneshot};

use cloud_asr_core::domain::error::TranscribeError;
use cloud_asr_core::domain::settings::{
    ChunkedMode, SampleRatePolicy, TranscriberSettings, DEFAULT_ENDPOINT,
};
use cloud_asr_core::infra::audio::{WavChunkReader, WavFormat, DEFAULT_FRAMES_IN_CHUNK};
use cloud_asr_core::TranscriptionService;

/// Speech to text with Google Cloud Speech-to-Text.
#[derive(Parser, Debug)]
#[command(name = "cloud-asr")]
struct Cli {
    /// Print DEBUG messages to the console.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Do speech to text on one or more WAV files.
    Transcribe(TranscribeArgs),
}

#[derive(Args, Debug)]
struct TranscribeArgs {
    /// WAV file(s) to transcribe. WAV data is read from stdin when none are given.
    wav_file: Vec<PathBuf>,

    /// Path to the credentials file (JSON with "api_key" or "access_token").
    #[arg(long)]
    credentials: PathBuf,

    /// Language code for the speech API (e.g. en-US).
    #[arg(long)]
    language_code: String,

    /// Number of frames to read from stdin at a time.
    #[arg(long, default_value_t = DEFAULT_FRAMES_IN_CHUNK)]
    frames_in_chunk: usize,

    /// How stdin audio is handled: buffer-then-send or unsupported.
    #[arg(long, value_enum, default_value = "buffer-then-send")]
    chunked_mode: ChunkedModeArg,

    /// require16k rejects audio that is not 16 kHz; forward sends the actual rate.
    #[arg(long, value_enum, default_value = "require16k")]
    sample_rate_policy: SampleRatePolicyArg,

    /// Speech API base URL.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ChunkedModeArg {
    BufferThenSend,
    Unsupported,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SampleRatePolicyArg {
    Require16k,
    Forward,
}

impl From<ChunkedModeArg> for ChunkedMode {
    fn from(arg: ChunkedModeArg) -> Self {
        match arg {
            ChunkedModeArg::BufferThenSend => ChunkedMode::BufferThenSend,
            ChunkedModeArg::Unsupported => ChunkedMode::Unsupported,
        }
    }
}

impl From<SampleRatePolicyArg> for SampleRatePolicy {
    fn from(arg: SampleRatePolicyArg) -> Self {
        match arg {
            SampleRatePolicyArg::Require16k => SampleRatePolicy::Require16k,
            SampleRatePolicyArg::Forward => SampleRatePolicy::Forward,
        }
    }
}

/// CLI 実行エラー
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Transcribe(#[from] TranscribeError),
    #[error("Cannot read {path:?}: {source}")]
    ReadInput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);
    log::debug!("{:?}", cli);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(CliError::Transcribe(e)) if e.is_interrupted() => {
            log::info!("Interrupted");
            0
        }
        Err(CliError::Transcribe(e)) => {
            log::error!("Transcription failed: {e}");
            output::print_error(&e);
            1
        }
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error: {e}");
            1
        }
    };
    process::exit(code);
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Transcribe(args) => transcribe(args, cli.debug).await,
    }
}

async fn transcribe(args: TranscribeArgs, debug: bool) -> Result<(), CliError> {
    let settings = TranscriberSettings {
        credentials_path: args.credentials.clone(),
        language_code: args.language_code.clone(),
        debug,
        chunked_mode: args.chunked_mode.into(),
        sample_rate_policy: args.sample_rate_policy.into(),
        endpoint: args.endpoint.clone(),
    };
    let service = TranscriptionService::connect(settings)?;
    run_until_interrupted(&service, transcribe_inputs(&service, &args), interrupt()).await
}

/// `work` と `interrupt` を競わせ、先に interrupt が完了したら Interrupted を返す。
/// 結果によらず最後にサービスを停止する。
async fn run_until_interrupted<W, I>(
    service: &TranscriptionService,
    work: W,
    interrupt: I,
) -> Result<(), CliError>
where
    W: Future<Output = Result<(), CliError>>,
    I: Future<Output = ()>,
{
    let result = tokio::select! {
        r = work => r,
        _ = interrupt => Err(TranscribeError::interrupted().into()),
    };

    service.stop();
    result
}

/// Ctrl-C を待つ。シグナルを登録できない環境では完了しない。
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

async fn transcribe_inputs(
    service: &TranscriptionService,
    args: &TranscribeArgs,
) -> Result<(), CliError> {
    if !args.wav_file.is_empty() {
        for wav_path in &args.wav_file {
            log::debug!("Processing {:?}", wav_path);
            let wav_bytes = read_wav_file(wav_path).await?;
            let result = service.transcribe_wav(&wav_bytes).await?;
            output::print_json(result.as_ref())?;
        }
        return Ok(());
    }

    if std::io::stdin().is_terminal() {
        eprintln!("Reading WAV data from stdin...");
    }

    let (format, chunks) = stdin_chunks(args.frames_in_chunk).await?;
    log::debug!("stdin WAV format: {:?}", format);

    let result = service
        .transcribe_stream(chunks, format.sample_rate, format.sample_width, format.channels)
        .await?;
    output::print_json(result.as_ref())?;
    Ok(())
}

async fn read_wav_file(path: &Path) -> Result<Vec<u8>, CliError> {
    tokio::fs::read(path).await.map_err(|source| CliError::ReadInput {
        path: path.to_path_buf(),
        source,
    })
}

/// stdin の WAV を別スレッドで読み、フレーム単位のチャンクをストリームとして返す。
async fn stdin_chunks(
    frames_in_chunk: usize,
) -> Result<(WavFormat, impl Stream<Item = Result<Vec<u8>, TranscribeError>>), TranscribeError> {
    let (format_tx, format_rx) = oneshot::channel();
    let (chunk_tx, chunk_rx) = mpsc::channel(16);

    // stdin の読み取りはブロックするため専用スレッドで行う
    std::thread::spawn(move || {
        let reader = match WavChunkReader::new(std::io::stdin().lock(), frames_in_chunk) {
            Ok(reader) => reader,
            Err(e) => {
                let _ = format_tx.send(Err(e));
                return;
            }
        };
        if format_tx.send(Ok(reader.format())).is_err() {
            return;
        }
        for chunk in reader {
            if chunk_tx.blocking_send(chunk).is_err() {
                break;
            }
        }
    });

    let format = format_rx.await.map_err(|_| {
        TranscribeError::malformed_input("stdin reader stopped before the WAV header")
    })??;

    let chunks = stream::unfold(chunk_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    Ok((format, chunks))
}
