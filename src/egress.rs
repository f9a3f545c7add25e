//! Egress interface: where one tick's finished output buffer goes.
//!
//! Spec §6: `ISampleBufferWriter.write(buf)`. `buf` is either a valid
//! interleaved PCM buffer of size `samples_per_tick * n_channels`, or an
//! empty slice signaling end-of-stream.

use std::time::{Duration, Instant};

use crate::packet::ChannelMask;

/// Accepts one tick's output buffer, or an empty slice marking
/// end-of-stream.
pub trait SampleBufferWriter {
    fn write(&mut self, buf: &[f32]);
}

/// Wraps a [`SampleBufferWriter`] to pace writes to wall-clock time, one
/// buffer per `samples_per_tick / sample_rate` seconds. Inserted when
/// `Options::ENABLE_TIMING` is set (spec §4.13, §6.2's
/// `EnableTiming` branch).
pub struct TimedWriter<W> {
    inner: W,
    tick_duration: Duration,
    next_tick_at: Option<Instant>,
}

impl<W: SampleBufferWriter> TimedWriter<W> {
    pub fn new(inner: W, channels: ChannelMask, sample_rate: u32, samples_per_tick: usize) -> Self {
        let _ = channels;
        let tick_duration = Duration::from_secs_f64(samples_per_tick as f64 / sample_rate as f64);
        Self {
            inner,
            tick_duration,
            next_tick_at: None,
        }
    }
}

impl<W: SampleBufferWriter> SampleBufferWriter for TimedWriter<W> {
    fn write(&mut self, buf: &[f32]) {
        let now = Instant::now();
        let target = self.next_tick_at.unwrap_or(now);
        if target > now {
            std::thread::sleep(target - now);
        }
        self.next_tick_at = Some(target.max(now) + self.tick_duration);
        self.inner.write(buf);
    }
}

/// `Vec`-backed writer for tests and simple in-process hosts. Not part of
/// the stable public surface.
pub mod test_support {
    use super::SampleBufferWriter;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every buffer handed to it, for assertions in tests.
    #[derive(Default)]
    pub struct RecordingWriter {
        pub buffers: Rc<RefCell<Vec<Vec<f32>>>>,
    }

    impl RecordingWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn buffers(&self) -> Rc<RefCell<Vec<Vec<f32>>>> {
            self.buffers.clone()
        }
    }

    impl SampleBufferWriter for RecordingWriter {
        fn write(&mut self, buf: &[f32]) {
            self.buffers.borrow_mut().push(buf.to_vec());
        }
    }
}
