use crate::bpm::BpmEstimator;
use crate::detector::QrsDetector;
use crate::source::SourceEvent;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

pub const DEFAULT_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    Unpaced,
    RealTime { sample_rate: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub index: u64,
    pub time_secs: f64,
    pub bpm: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub beats: Vec<Beat>,
    pub samples: u64,
    pub dropped: u64,
    pub resets: u64,
}

fn sample_period(sample_rate: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(1.0 / sample_rate)
        .ok()
        .filter(|period| !period.is_zero())
}

pub async fn produce(events: Vec<SourceEvent>, tx: mpsc::Sender<SourceEvent>, pacing: Pacing) {
    let mut ticker = match pacing {
        Pacing::RealTime { sample_rate } => match sample_period(sample_rate) {
            Some(period) => {
                let mut t = interval(period);
                t.set_missed_tick_behavior(MissedTickBehavior::Burst);
                Some(t)
            }
            None => {
                warn!("No usable sample period at {}Hz, replaying unpaced", sample_rate);
                None
            }
        },
        Pacing::Unpaced => None,
    };

    for event in events {
        if let Some(t) = ticker.as_mut() {
            t.tick().await;
        }
        if tx.send(event).await.is_err() {
            debug!("Consumer closed, stopping producer");
            break;
        }
    }
}

/// Drains `rx` until every sender is dropped. The first leads-off period of each
/// detachment resets the detector and the BPM average.
pub async fn consume<R: Rng>(
    mut detector: QrsDetector<R>,
    mut bpm: BpmEstimator,
    sample_rate: f64,
    mut rx: mpsc::Receiver<SourceEvent>,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut index: u64 = 0;
    let mut attached = true;

    while let Some(event) = rx.recv().await {
        let position = index;
        index += 1;

        let sample = match event {
            SourceEvent::LeadsOff => {
                if attached {
                    warn!("Leads off at sample {}, resetting detector", position);
                    detector.reset();
                    bpm.reset();
                    summary.resets += 1;
                    attached = false;
                }
                continue;
            }
            SourceEvent::Sample(x) => x,
        };
        attached = true;

        match detector.tick(sample) {
            Ok(true) => {
                let beat = Beat {
                    index: position,
                    time_secs: position as f64 / sample_rate,
                    bpm: bpm.on_beat(position),
                };
                debug!("Beat at {:.3}s, bpm {:?}", beat.time_secs, beat.bpm);
                summary.beats.push(beat);
                summary.samples += 1;
            }
            Ok(false) => summary.samples += 1,
            Err(e) => {
                warn!("Dropping sample {}: {}", position, e);
                summary.dropped += 1;
            }
        }
    }

    info!(
        "Processed {} samples: {} beats, {} dropped, {} resets",
        summary.samples,
        summary.beats.len(),
        summary.dropped,
        summary.resets
    );
    summary
}

pub async fn replay<R: Rng>(
    events: Vec<SourceEvent>,
    detector: QrsDetector<R>,
    bpm: BpmEstimator,
    sample_rate: f64,
    pacing: Pacing,
    depth: usize,
) -> RunSummary {
    let (tx, rx) = mpsc::channel(depth.max(1));
    let producer = tokio::spawn(produce(events, tx, pacing));
    let summary = consume(detector, bpm, sample_rate, rx).await;
    if let Err(e) = producer.await {
        warn!("Producer task failed: {}", e);
    }
    summary
}
