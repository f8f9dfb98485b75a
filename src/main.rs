use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use heartline::args::{Cli, Commands, DetectArgs};
use heartline::bpm::BpmEstimator;
use heartline::config::{ConfigFile, Settings};
use heartline::source;
use heartline::stream::{self, Pacing, DEFAULT_QUEUE_DEPTH};
use heartline::QrsDetector;
use std::path::PathBuf;
use std::process;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => detect(args),
        Commands::Synth {
            output,
            beats,
            period,
            amplitude,
        } => {
            let samples = source::impulse_train(beats * period, period, amplitude);
            source::write_text(&output, &samples)
                .with_context(|| format!("Failed to write samples to {}", output))?;
            Ok(())
        }
        Commands::Config { config } => {
            let settings = load_settings(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("org", "heartline", "heartline")?;
    let path = dirs.config_dir().join("config.kdl");
    path.exists().then_some(path)
}

fn load_settings(explicit: Option<&str>) -> Result<Settings> {
    let path = explicit.map(PathBuf::from).or_else(default_config_path);
    let file = match &path {
        Some(p) => {
            log::info!("Loading configuration from {}", p.display());
            ConfigFile::load(p)
                .with_context(|| format!("Failed to load configuration from {}", p.display()))?
        }
        None => ConfigFile::default(),
    };
    Ok(file.resolve()?)
}

fn effective_rate(flag: Option<f64>, container: Option<f64>) -> Option<f64> {
    match (flag, container) {
        (Some(flag), Some(rate)) => {
            if flag != rate {
                log::warn!("Ignoring --rate {}Hz, the input is sampled at {}Hz", flag, rate);
            }
            Some(rate)
        }
        (None, Some(rate)) => {
            log::info!("Using container sample rate {}Hz", rate);
            Some(rate)
        }
        (flag, None) => flag,
    }
}

fn detect(args: DetectArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        settings.seed = Some(seed);
    }

    let recording = source::load(&args.input, args.column)
        .with_context(|| format!("Failed to load samples from {}", args.input))?;
    if let Some(rate) = effective_rate(args.rate, recording.sample_rate) {
        settings.sample_rate = rate;
    }
    settings.validate()?;

    let detector = match settings.seed {
        Some(seed) => QrsDetector::seeded(settings.detector.clone(), seed)?,
        None => QrsDetector::new(settings.detector.clone())?,
    };
    let bpm = BpmEstimator::new(settings.sample_rate, settings.bpm_window);
    let pacing = if args.realtime {
        Pacing::RealTime {
            sample_rate: settings.sample_rate,
        }
    } else {
        Pacing::Unpaced
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start runtime")?;
    let summary = runtime.block_on(stream::replay(
        recording.events,
        detector,
        bpm,
        settings.sample_rate,
        pacing,
        DEFAULT_QUEUE_DEPTH,
    ));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for beat in &summary.beats {
            match beat.bpm {
                Some(bpm) => println!("{}\t{:.3}s\t{:.1} bpm", beat.index, beat.time_secs, bpm),
                None => println!("{}\t{:.3}s\t-", beat.index, beat.time_secs),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_rate_wins_over_flag() {
        assert_eq!(effective_rate(Some(250.0), Some(500.0)), Some(500.0));
        assert_eq!(effective_rate(None, Some(500.0)), Some(500.0));
        assert_eq!(effective_rate(Some(250.0), None), Some(250.0));
        assert_eq!(effective_rate(None, None), None);
    }
}
