use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SumMaintenance {
    Incremental,
    Recompute { interval: usize },
    Compensated,
}

impl Default for SumMaintenance {
    fn default() -> Self {
        SumMaintenance::Recompute { interval: 4096 }
    }
}

/// Circular buffer addressed by age: `get(0)` is the newest value.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<f64>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Stores `value`, returning the entry it overwrote once the buffer is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.is_full() {
            Some(self.data[self.head])
        } else {
            self.len += 1;
            None
        };
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.data.len();
        evicted
    }

    pub fn get(&self, age: usize) -> Option<f64> {
        if age >= self.len {
            return None;
        }
        let cap = self.data.len();
        Some(self.data[(self.head + cap - 1 - age) % cap])
    }

    pub fn recent(&self, n: usize) -> impl Iterator<Item = f64> + '_ {
        (0..n.min(self.len)).filter_map(move |age| self.get(age))
    }

    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|x| *x = 0.0);
        self.head = 0;
        self.len = 0;
    }
}

/// Sum over the `span` most recent entries of a [`RingBuffer`], updated per push.
#[derive(Debug, Clone)]
pub struct RunningSum {
    policy: SumMaintenance,
    sum: f64,
    compensation: f64,
    since_refresh: usize,
}

impl RunningSum {
    pub fn new(policy: SumMaintenance) -> Self {
        Self {
            policy,
            sum: 0.0,
            compensation: 0.0,
            since_refresh: 0,
        }
    }

    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }

    // `history` must already contain `added`
    pub fn apply(&mut self, added: f64, removed: Option<f64>, history: &RingBuffer, span: usize) {
        match self.policy {
            SumMaintenance::Incremental => {
                self.sum += added;
                if let Some(old) = removed {
                    self.sum -= old;
                }
            }
            SumMaintenance::Recompute { interval } => {
                self.sum += added;
                if let Some(old) = removed {
                    self.sum -= old;
                }
                self.since_refresh += 1;
                if self.since_refresh >= interval {
                    self.sum = history.recent(span).sum();
                    self.since_refresh = 0;
                }
            }
            SumMaintenance::Compensated => {
                self.add_compensated(added);
                if let Some(old) = removed {
                    self.add_compensated(-old);
                }
            }
        }
    }

    fn add_compensated(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    pub fn clear(&mut self) {
        self.sum = 0.0;
        self.compensation = 0.0;
        self.since_refresh = 0;
    }
}
