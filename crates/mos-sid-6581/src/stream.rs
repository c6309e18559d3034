//! Lazy audio stream: fractional downsampling from the cycle clock.
//!
//! The SID pushes one mixed value per cycle. The stream box-filters runs of
//! cycles into output samples at the host rate and queues them until the
//! host drains them. Nothing is produced unless the machine runs, and the
//! queue can be capped so warp mode sheds samples instead of growing it.

use std::collections::VecDeque;

/// Default host sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone)]
pub struct AudioStream {
    clock_hz: u64,
    sample_rate: u32,
    /// Bresenham accumulator: gains `sample_rate` per cycle, emits at `clock_hz`.
    phase: u64,
    sum: f32,
    count: u32,
    queue: VecDeque<f32>,
    limit: Option<usize>,
    dropped: u64,
    produced: u64,
}

impl AudioStream {
    #[must_use]
    pub fn new(clock_hz: u64, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            clock_hz: clock_hz.max(1),
            sample_rate,
            phase: 0,
            sum: 0.0,
            count: 0,
            queue: VecDeque::new(),
            limit: None,
            dropped: 0,
            produced: 0,
        }
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Change the host rate. Pending samples are discarded.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        *self = Self {
            limit: self.limit,
            ..Self::new(self.clock_hz, sample_rate)
        };
    }

    /// Change the input clock, e.g. after switching PAL/NTSC.
    pub fn set_clock(&mut self, clock_hz: u64) {
        self.clock_hz = clock_hz.max(1);
        self.phase = self.phase.min(self.clock_hz - 1);
    }

    /// Cap the queue; samples beyond the cap are dropped and counted.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    /// Feed one cycle's worth of output.
    pub fn push_cycle(&mut self, value: f32) {
        self.sum += value;
        self.count += 1;
        self.phase += u64::from(self.sample_rate);
        if self.phase < self.clock_hz {
            return;
        }
        self.phase -= self.clock_hz;
        let sample = self.sum / self.count as f32;
        self.sum = 0.0;
        self.count = 0;
        self.produced += 1;
        match self.limit {
            Some(limit) if self.queue.len() >= limit => self.dropped += 1,
            _ => self.queue.push_back(sample),
        }
    }

    /// Samples waiting to be drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remove up to `max` samples from the front of the queue.
    pub fn drain(&mut self, max: usize) -> Vec<f32> {
        let n = max.min(self.queue.len());
        self.queue.drain(..n).collect()
    }

    /// Remove every queued sample.
    pub fn drain_all(&mut self) -> Vec<f32> {
        self.queue.drain(..).collect()
    }

    /// Start over: empty queue, fresh phase, counters cleared.
    pub fn restart(&mut self) {
        *self = Self {
            limit: self.limit,
            ..Self::new(self.clock_hz, self.sample_rate)
        };
    }

    /// Samples discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Samples produced since the last restart, queued or dropped.
    #[must_use]
    pub fn produced(&self) -> u64 {
        self.produced
    }
}

impl Iterator for AudioStream {
    type Item = f32;

    /// Yields queued samples; `None` means "nothing yet", not end of stream.
    fn next(&mut self) -> Option<f32> {
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_of_cycles_gives_sample_rate_samples() {
        let mut stream = AudioStream::new(985_248, DEFAULT_SAMPLE_RATE);
        for _ in 0..985_248 {
            stream.push_cycle(0.0);
        }
        assert_eq!(stream.produced(), 44_100);
        assert_eq!(stream.len(), 44_100);
    }

    #[test]
    fn samples_average_their_cycles() {
        let mut stream = AudioStream::new(4, 2);
        for v in [1.0, 0.0, 0.5, 0.5] {
            stream.push_cycle(v);
        }
        assert_eq!(stream.drain_all(), vec![0.5, 0.5]);
    }

    #[test]
    fn limit_drops_overflow() {
        let mut stream = AudioStream::new(10, 10);
        stream.set_limit(Some(3));
        for _ in 0..5 {
            stream.push_cycle(0.25);
        }
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.dropped(), 2);
        assert_eq!(stream.drain(2), vec![0.25, 0.25]);
    }

    #[test]
    fn restart_clears_and_resumes() {
        let mut stream = AudioStream::new(10, 10);
        stream.push_cycle(1.0);
        stream.restart();
        assert!(stream.is_empty());
        assert_eq!(stream.produced(), 0);
        stream.push_cycle(0.5);
        assert_eq!(stream.next(), Some(0.5));
        assert_eq!(stream.next(), None);
    }
}
