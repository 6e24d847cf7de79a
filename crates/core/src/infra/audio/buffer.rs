use crate::domain::error::TranscribeError;
use crate::domain::stt::AudioClip;

/// チャンク入力を到着順に連結するバッファ。
/// チャンク数は診断用で、音声長の計算には使わない。
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    pcm: Vec<u8>,
    chunks: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// チャンクを末尾に追加する。
    pub fn push(&mut self, chunk: &[u8]) {
        self.pcm.extend_from_slice(chunk);
        self.chunks += 1;
    }

    /// 連結済みバイト数
    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// 受け取ったチャンク数（空チャンクも数える）
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// 連結結果を AudioClip に変換する。
    pub fn into_clip(
        self,
        sample_rate: u32,
        sample_width: u16,
        channels: u16,
    ) -> Result<AudioClip, TranscribeError> {
        AudioClip::from_pcm(self.pcm, sample_rate, sample_width, channels)
    }
}
