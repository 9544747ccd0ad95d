//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Queue, resolve, and download episodes from video-host pages.
///
/// Each positional URL becomes one queued episode; episode numbers count up
/// from `--episode`. The queue runs until every record reaches a final state.
#[derive(Parser, Debug)]
#[command(name = "animedl")]
#[command(author, version, about)]
pub struct Args {
    /// Video-host page URLs (or direct media URLs), one per episode
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Series title used for folder and file names
    #[arg(short, long)]
    pub title: String,

    /// Season number
    #[arg(short, long, default_value_t = 1)]
    pub season: u32,

    /// Episode number of the first URL; later URLs count up from here
    #[arg(short, long, default_value_t = 1)]
    pub episode: u32,

    /// Language tag recorded on each episode (e.g. vostfr, vf)
    #[arg(short, long, default_value = "vostfr")]
    pub language: String,

    /// Settings file; missing file means defaults (flags still override)
    #[arg(long, default_value = "settings.json")]
    pub settings: PathBuf,

    /// Root download directory (overrides the settings file)
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Maximum simultaneous downloads, 1-20 (overrides the settings file)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub concurrency: Option<u8>,

    /// Proxy endpoint, repeatable; one is chosen at random per download
    #[arg(short = 'x', long = "proxy")]
    pub proxies: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
