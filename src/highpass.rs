use crate::window::{RingBuffer, RunningSum, SumMaintenance};

/// Baseline-wander removal: the raw sample from `(M + 1) / 2` ticks ago minus the
/// mean of the `M` most recent raw samples.
#[derive(Debug, Clone)]
pub struct HighPass {
    window: usize,
    delay: usize,
    history: RingBuffer,
    sum: RunningSum,
    ticks: usize,
}

impl HighPass {
    pub fn new(window: usize, maintenance: SumMaintenance) -> Self {
        Self {
            window,
            delay: (window + 1) / 2,
            history: RingBuffer::new(window + 1),
            sum: RunningSum::new(maintenance),
            ticks: 0,
        }
    }

    /// Filter output for this tick, `None` during the first `M` ticks while the
    /// running sum is still filling.
    pub fn process(&mut self, sample: f64) -> Option<f64> {
        self.history.push(sample);
        let leaving = if self.ticks >= self.window {
            self.history.get(self.window)
        } else {
            None
        };
        self.sum.apply(sample, leaving, &self.history, self.window);

        if self.ticks < self.window {
            self.ticks += 1;
            return None;
        }

        let delayed = self.history.get(self.delay)?;
        Some(delayed - self.sum.value() / self.window as f64)
    }

    /// Same as [`process`](Self::process) with the warm-up placeholder `0`.
    pub fn process_raw(&mut self, sample: f64) -> f64 {
        self.process(sample).unwrap_or(0.0)
    }

    pub fn is_warm(&self) -> bool {
        self.ticks >= self.window
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.sum.clear();
        self.ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_outputs_zero() {
        let mut hp = HighPass::new(5, SumMaintenance::Incremental);
        for i in 0..5 {
            assert!(!hp.is_warm());
            assert_eq!(hp.process_raw(100.0 * (i + 1) as f64), 0.0);
        }
        assert!(hp.is_warm());
        assert!(hp.process(1.0).is_some());
    }

    #[test]
    fn test_constant_input_has_zero_response() {
        for &v in &[7.0, -3.0, 1024.0, 0.0] {
            let mut hp = HighPass::new(5, SumMaintenance::default());
            for _ in 0..50 {
                assert_eq!(hp.process_raw(v), 0.0);
            }
        }
    }

    #[test]
    fn test_impulse_response_is_delayed() {
        let mut hp = HighPass::new(5, SumMaintenance::Incremental);
        for _ in 0..10 {
            hp.process_raw(0.0);
        }
        let out: Vec<f64> = [1000.0, 0.0, 0.0, 0.0, 0.0, 0.0]
            .iter()
            .map(|&x| hp.process_raw(x))
            .collect();
        assert_eq!(out, vec![-200.0, -200.0, -200.0, 800.0, -200.0, 0.0]);
    }

    #[test]
    fn test_reset_restarts_warmup() {
        let mut hp = HighPass::new(3, SumMaintenance::Incremental);
        for _ in 0..10 {
            hp.process_raw(5.0);
        }
        hp.reset();
        assert!(!hp.is_warm());
        assert_eq!(hp.process(9.0), None);
    }
}
