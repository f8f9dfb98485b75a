use crate::window::{RingBuffer, RunningSum, SumMaintenance};

/// Turns detection ticks into a moving-average heart rate.
#[derive(Debug, Clone)]
pub struct BpmEstimator {
    sample_rate: f64,
    readings: RingBuffer,
    sum: RunningSum,
    last_beat: Option<u64>,
}

impl BpmEstimator {
    pub fn new(sample_rate: f64, window: usize) -> Self {
        Self {
            sample_rate,
            readings: RingBuffer::new(window),
            sum: RunningSum::new(SumMaintenance::default()),
            last_beat: None,
        }
    }

    /// Records a beat at sample `index` and returns the updated average. The first beat
    /// after construction or a reset has no interval and yields `None`.
    pub fn on_beat(&mut self, index: u64) -> Option<f64> {
        let previous = self.last_beat.replace(index)?;
        let interval = index.checked_sub(previous).filter(|&n| n > 0)?;

        let bpm = 60.0 * self.sample_rate / interval as f64;
        let evicted = self.readings.push(bpm);
        self.sum
            .apply(bpm, evicted, &self.readings, self.readings.capacity());
        self.current()
    }

    pub fn current(&self) -> Option<f64> {
        if self.readings.is_empty() {
            None
        } else {
            Some(self.sum.value() / self.readings.len() as f64)
        }
    }

    pub fn reset(&mut self) {
        self.readings.clear();
        self.sum.clear();
        self.last_beat = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_rhythm() {
        let mut bpm = BpmEstimator::new(200.0, 5);
        assert_eq!(bpm.on_beat(0), None);
        for k in 1..10 {
            let value = bpm.on_beat(k * 200).unwrap();
            assert!((value - 60.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_average_rolls_over_window() {
        let mut bpm = BpmEstimator::new(100.0, 2);
        bpm.on_beat(0);
        assert_eq!(bpm.on_beat(100), Some(60.0));
        assert_eq!(bpm.on_beat(150), Some(90.0));
        assert_eq!(bpm.on_beat(200), Some(120.0));
    }

    #[test]
    fn test_reset_forgets_last_beat() {
        let mut bpm = BpmEstimator::new(200.0, 5);
        bpm.on_beat(0);
        bpm.on_beat(200);
        bpm.reset();
        assert_eq!(bpm.current(), None);
        assert_eq!(bpm.on_beat(1000), None);
    }
}
