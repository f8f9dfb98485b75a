use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Streaming ECG QRS detection and heart-rate estimation.")]
#[command(allow_negative_numbers = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the detector over a recorded sample stream.
    Detect(DetectArgs),
    /// Write a synthetic impulse train, one sample per line.
    Synth {
        output: String,
        #[arg(long, default_value_t = 10)]
        beats: usize,
        /// Samples between impulses.
        #[arg(long, default_value_t = 200)]
        period: usize,
        #[arg(long, default_value_t = 1000.0)]
        amplitude: f64,
    },
    /// Print the effective configuration as JSON.
    Config {
        #[arg(long)]
        config: Option<String>,
    },
}

#[derive(Args)]
pub struct DetectArgs {
    pub input: String,
    /// KDL configuration file.
    #[arg(long)]
    pub config: Option<String>,
    /// Seed for the forgetting-factor generator.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Sample rate in Hz, for text inputs.
    #[arg(long)]
    pub rate: Option<f64>,
    /// Column holding the signal in CSV inputs.
    #[arg(long, default_value_t = 0)]
    pub column: usize,
    /// Replay at the sample rate instead of as fast as possible.
    #[arg(long)]
    pub realtime: bool,
    /// Emit a JSON report instead of one line per beat.
    #[arg(long)]
    pub json: bool,
}
