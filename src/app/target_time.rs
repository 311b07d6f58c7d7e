use std::thread::sleep;
use std::time::{Duration, Instant};

/// Paces a loop to a fixed rate by sleeping off whatever is left of each frame. Used where no
/// compositor provides the frame clock: the flat fallback and the mock runtime.
#[derive(Debug)]
pub struct TargetTime {
    target_frame_time: Duration,
    last_frame_start_time: Instant,
}

impl TargetTime {
    /// Create a new target time from frames/sec
    pub fn new(target_fps: u64) -> Self {
        Self {
            target_frame_time: Duration::from_micros(1_000_000 / target_fps.max(1)),
            last_frame_start_time: Instant::now(),
        }
    }

    pub fn frame_time(&self) -> Duration {
        self.target_frame_time
    }

    /// Frame period in nanoseconds
    pub fn frame_nanos(&self) -> i64 {
        self.target_frame_time.as_nanos() as i64
    }

    /// Start a new frame
    pub fn start_frame(&mut self) {
        self.last_frame_start_time = Instant::now();
    }

    /// End a frame, and wait any slack time we have
    pub fn end_frame(&self) {
        let frame_duration = Instant::now() - self.last_frame_start_time;
        if frame_duration < self.target_frame_time {
            sleep(self.target_frame_time - frame_duration);
        }
    }

    /// Block until the current frame is over, then start the next one
    pub fn wait_next(&mut self) {
        self.end_frame();
        self.start_frame();
    }
}

impl Default for TargetTime {
    fn default() -> Self {
        Self::new(90)
    }
}
