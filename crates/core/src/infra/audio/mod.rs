pub mod buffer;
pub mod wav;

pub use buffer::ChunkBuffer;
pub use wav::{parse_wav, WavChunkReader, WavFormat, DEFAULT_FRAMES_IN_CHUNK};
