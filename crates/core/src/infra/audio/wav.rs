//! WAV コンテナの読み取り。
//!
//! ヘッダの解析は hound に任せ、認識に必要なフォーマット情報と
//! 生 PCM ペイロードだけを取り出す。

use std::io::{Chain, Cursor, Read};

use crate::domain::error::TranscribeError;
use crate::domain::stt::AudioClip;

/// 標準入力ストリーミング時の既定チャンクサイズ (フレーム数)
pub const DEFAULT_FRAMES_IN_CHUNK: usize = 1024;

/// WAV の音声フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub sample_rate: u32,
    /// 1 サンプルあたりのバイト数
    pub sample_width: u16,
    pub channels: u16,
    /// ヘッダ上のフレーム数
    pub frames: u32,
}

impl WavFormat {
    fn from_reader<R: Read>(reader: &hound::WavReader<R>) -> Self {
        let spec = reader.spec();
        Self {
            sample_rate: spec.sample_rate,
            sample_width: (spec.bits_per_sample + 7) / 8,
            channels: spec.channels,
            frames: reader.duration(),
        }
    }

    pub fn block_align(&self) -> usize {
        self.sample_width as usize * self.channels as usize
    }

    /// ヘッダが宣言するデータ長 (バイト)
    pub fn data_len(&self) -> usize {
        self.frames as usize * self.block_align()
    }
}

fn malformed(e: hound::Error) -> TranscribeError {
    TranscribeError::malformed_input(format!("Invalid WAV data: {e}"))
}

const RIFF_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
/// data チャンク以外のチャンクとして受け付ける最大長
const MAX_HEADER_CHUNK_LEN: usize = 1 << 20;
/// パイプ出力のレコーダーが長さ未確定の data チャンクに書く値
const STREAMING_DATA_LENS: [u32; 2] = [u32::MAX, i32::MAX as u32];

/// data チャンク先頭までのヘッダバイト列
struct WavHeader {
    bytes: Vec<u8>,
    /// data 長が未確定 (EOF まで読む)
    streamed: bool,
}

/// RIFF ヘッダから data チャンクヘッダまでを読み込む。
///
/// data 長はフレーム境界に切り下げて書き戻す。未確定長のストリームや
/// 端数のある data チャンクも hound が受け付けられる形になる。
fn read_header<R: Read>(source: &mut R) -> Result<WavHeader, TranscribeError> {
    let mut bytes = vec![0u8; RIFF_HEADER_LEN];
    read_header_bytes(source, &mut bytes)?;
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(TranscribeError::malformed_input(
            "Invalid WAV data: missing RIFF/WAVE header",
        ));
    }

    let mut block_align = None;
    loop {
        let start = bytes.len();
        bytes.resize(start + CHUNK_HEADER_LEN, 0);
        read_header_bytes(source, &mut bytes[start..])?;
        let len = u32::from_le_bytes([
            bytes[start + 4],
            bytes[start + 5],
            bytes[start + 6],
            bytes[start + 7],
        ]);

        if &bytes[start..start + 4] == b"data" {
            let align = block_align.filter(|&a| a > 0).unwrap_or(1);
            let usable = len - len % align;
            bytes[start + 4..start + 8].copy_from_slice(&usable.to_le_bytes());
            return Ok(WavHeader {
                bytes,
                streamed: STREAMING_DATA_LENS.contains(&len),
            });
        }

        // RIFF チャンクは 2 バイト境界に揃える
        let body_len = len as usize + (len as usize & 1);
        if body_len > MAX_HEADER_CHUNK_LEN {
            return Err(TranscribeError::malformed_input(format!(
                "Invalid WAV data: {} byte chunk before data",
                len
            )));
        }
        let body = bytes.len();
        bytes.resize(body + body_len, 0);
        read_header_bytes(source, &mut bytes[body..])?;

        if &bytes[start..start + 4] == b"fmt " && len >= 16 {
            let channels = u16::from_le_bytes([bytes[body + 2], bytes[body + 3]]);
            let bits = u16::from_le_bytes([bytes[body + 14], bytes[body + 15]]);
            block_align = Some(channels as u32 * ((bits as u32 + 7) / 8));
        }
    }
}

fn read_header_bytes<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<(), TranscribeError> {
    source.read_exact(buf).map_err(|e| {
        TranscribeError::malformed_input(format!("Invalid WAV data: incomplete header ({e})"))
    })
}

/// WAV バイト列全体を解析し、ヘッダを除いた PCM を AudioClip にする。
///
/// data 長が未確定のヘッダでは、残りのバイト列をフレーム境界まで使う。
pub fn parse_wav(wav_bytes: &[u8]) -> Result<AudioClip, TranscribeError> {
    let mut rest = wav_bytes;
    let header = read_header(&mut rest)?;
    let reader = hound::WavReader::new(Cursor::new(&header.bytes)).map_err(malformed)?;
    let format = WavFormat::from_reader(&reader);
    let block_align = format.block_align().max(1);

    let payload = if header.streamed {
        &rest[..rest.len() - rest.len() % block_align]
    } else {
        rest.get(..format.data_len()).ok_or_else(|| {
            TranscribeError::malformed_input(format!(
                "Truncated WAV data: header declares {} bytes, found {}",
                format.data_len(),
                rest.len()
            ))
        })?
    };

    AudioClip::from_frames(
        payload.to_vec(),
        format.sample_rate,
        format.sample_width,
        format.channels,
        (payload.len() / block_align) as u32,
    )
}

/// WAV ストリームを固定フレーム数ずつのチャンクに分けて読むリーダー。
///
/// ヘッダのフレーム数を読み切るか EOF に達した時点で終了する。
/// data 長が未確定のストリームは EOF まで読む。最後のチャンクは短くなりうる。
pub struct WavChunkReader<R: Read> {
    inner: Chain<Cursor<Vec<u8>>, R>,
    format: WavFormat,
    frames_in_chunk: usize,
    remaining_frames: usize,
    eof: bool,
}

impl<R: Read> WavChunkReader<R> {
    pub fn new(mut source: R, frames_in_chunk: usize) -> Result<Self, TranscribeError> {
        if frames_in_chunk == 0 {
            return Err(TranscribeError::configuration(
                "frames_in_chunk must be positive",
            ));
        }
        let header = read_header(&mut source)?;
        let streamed = header.streamed;
        let reader =
            hound::WavReader::new(Cursor::new(header.bytes).chain(source)).map_err(malformed)?;
        let format = WavFormat::from_reader(&reader);
        Ok(Self {
            inner: reader.into_inner(),
            remaining_frames: if streamed {
                usize::MAX
            } else {
                format.frames as usize
            },
            format,
            frames_in_chunk,
            eof: false,
        })
    }

    pub fn format(&self) -> WavFormat {
        self.format
    }

    fn read_chunk(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        if self.eof || self.remaining_frames == 0 || self.format.block_align() == 0 {
            return Ok(None);
        }

        let frames = self.remaining_frames.min(self.frames_in_chunk);
        let mut chunk = vec![0u8; frames * self.format.block_align()];
        let mut filled = 0;
        while filled < chunk.len() {
            match self.inner.read(&mut chunk[filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        chunk.truncate(filled);
        self.remaining_frames -= frames;

        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }
}

impl<R: Read> Iterator for WavChunkReader<R> {
    type Item = Result<Vec<u8>, TranscribeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.eof = true;
                Some(Err(TranscribeError::malformed_input(format!(
                    "Failed to read WAV data: {e}"
                ))))
            }
        }
    }
}
