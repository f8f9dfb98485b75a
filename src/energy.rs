use crate::window::{RingBuffer, RunningSum, SumMaintenance};

/// Sliding sum of squared high-pass outputs over `N + 1` entries.
#[derive(Debug, Clone)]
pub struct EnergyStage {
    window: usize,
    squares: RingBuffer,
    sum: RunningSum,
    ticks: usize,
}

impl EnergyStage {
    pub fn new(window: usize, maintenance: SumMaintenance) -> Self {
        Self {
            window,
            squares: RingBuffer::new(window + 1),
            sum: RunningSum::new(maintenance),
            ticks: 0,
        }
    }

    /// Evaluation point for this tick. Zero for the first `N` inputs, afterwards the
    /// unnormalised energy of the window.
    pub fn process_hp(&mut self, hp_value: f64) -> f64 {
        let square = hp_value * hp_value;
        let evicted = self.squares.push(square);
        self.sum.apply(square, evicted, &self.squares, self.squares.capacity());

        if self.ticks < self.window {
            self.ticks += 1;
            return 0.0;
        }
        // rounding in the incremental path may dip just below zero
        self.sum.value().max(0.0)
    }

    pub fn is_warm(&self) -> bool {
        self.ticks >= self.window
    }

    pub fn reset(&mut self) {
        self.squares.clear();
        self.sum.clear();
        self.ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_window_is_silent() {
        let mut stage = EnergyStage::new(30, SumMaintenance::Incremental);
        for _ in 0..30 {
            assert_eq!(stage.process_hp(3.0), 0.0);
        }
        assert!(stage.is_warm());
        assert_eq!(stage.process_hp(3.0), 31.0 * 9.0);
    }

    #[test]
    fn test_window_spans_n_plus_one_entries() {
        let mut stage = EnergyStage::new(4, SumMaintenance::default());
        for _ in 0..4 {
            stage.process_hp(0.0);
        }
        assert_eq!(stage.process_hp(2.0), 4.0);
        for _ in 0..4 {
            assert_eq!(stage.process_hp(0.0), 4.0);
        }
        assert_eq!(stage.process_hp(0.0), 0.0);
    }

    #[test]
    fn test_reset_clears_energy() {
        let mut stage = EnergyStage::new(2, SumMaintenance::Compensated);
        for _ in 0..10 {
            stage.process_hp(5.0);
        }
        stage.reset();
        assert!(!stage.is_warm());
        assert_eq!(stage.process_hp(5.0), 0.0);
    }
}
