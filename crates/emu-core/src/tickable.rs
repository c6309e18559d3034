//! Trait for components that advance one machine cycle at a time.

use crate::Ticks;

/// A component that can be advanced by machine cycles.
///
/// Each chip in the machine implements this. The run loop ticks every chip
/// once per CPU cycle, so chips never see batched time.
pub trait Tickable {
    /// Advance the component by one machine cycle.
    fn tick(&mut self);

    /// Advance the component by multiple cycles.
    ///
    /// Default implementation calls `tick()` in a loop. Overrides must
    /// produce identical results.
    fn tick_n(&mut self, count: Ticks) {
        for _ in 0..count.get() {
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u64);

    impl Tickable for Counter {
        fn tick(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn tick_n_calls_tick() {
        let mut c = Counter(0);
        c.tick_n(Ticks::new(17));
        assert_eq!(c.0, 17);
    }
}
