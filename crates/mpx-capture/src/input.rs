//! Sample-stream framing and channel selection
//!
//! The capture source delivers interleaved stereo IEEE-754 f32 LE frames
//! on stdin. Reads happen in fixed blocks; EOF or a short read ends the
//! stream cleanly.

use std::io::{self, Read};

use mpx_core::{Sample, StereoSample};

/// Frames per read block
pub const BLOCK_FRAMES: usize = 2048;

const BYTES_PER_FRAME: usize = 2 * size_of::<f32>();
const BLOCK_BYTES: usize = BLOCK_FRAMES * BYTES_PER_FRAME;

/// Blocking block reader over the raw capture stream.
pub struct FrameReader<R> {
    inner: R,
    bytes: Vec<u8>,
    frames: Vec<StereoSample>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes: vec![0; BLOCK_BYTES],
            frames: vec![StereoSample::default(); BLOCK_FRAMES],
        }
    }

    /// Read one block of frames. Returns `Ok(None)` on EOF or a short
    /// read (expected stream termination).
    pub fn read_block(&mut self) -> io::Result<Option<&[StereoSample]>> {
        match self.inner.read_exact(&mut self.bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        for (frame, chunk) in self
            .frames
            .iter_mut()
            .zip(self.bytes.chunks_exact(BYTES_PER_FRAME))
        {
            let left = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let right = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            *frame = StereoSample::new(left as Sample, right as Sample);
        }
        Ok(Some(&self.frames))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// Frames accumulated before the channel latches
const WARMUP_FRAMES: u32 = 4096;

/// The right channel wins only with a clear energy margin
const RIGHT_BIAS: f64 = 1.2;

/// One-shot energy-based channel selector.
///
/// Sums per-channel energy over the warm-up window, then latches for
/// the lifetime of the process. During warm-up the left channel is
/// used.
#[derive(Debug, Clone, Default)]
pub struct ChannelSelector {
    energy_left: f64,
    energy_right: f64,
    frames: u32,
    locked: Option<Channel>,
}

impl ChannelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn select(&mut self, frame: StereoSample) -> Sample {
        match self.locked {
            Some(Channel::Left) => frame.left,
            Some(Channel::Right) => frame.right,
            None => {
                self.energy_left += frame.left * frame.left;
                self.energy_right += frame.right * frame.right;
                self.frames += 1;
                if self.frames >= WARMUP_FRAMES {
                    let channel = if self.energy_right > self.energy_left * RIGHT_BIAS {
                        Channel::Right
                    } else {
                        Channel::Left
                    };
                    self.locked = Some(channel);
                    log::info!("channel locked: {channel:?}");
                    return match channel {
                        Channel::Left => frame.left,
                        Channel::Right => frame.right,
                    };
                }
                frame.left
            }
        }
    }

    pub fn locked(&self) -> Option<Channel> {
        self.locked
    }
}
