// src/main.rs
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use ccd_scope::display::{
    channel_trace, combined_scope, render_combined_png, render_scan_png, render_sequencer_png,
    scan_comparison, sequencer_scope, write_png, PlotStyle, ScanLayout, TimelineRequest,
};
use ccd_scope::scan::ScanDataLoader;
use ccd_scope::sequencer::JsonSequencer;
use ccd_scope::ScopeConfig;

/// Scope-style views of CCD scans against their sequencer clocks.
#[derive(Parser, Debug)]
#[command(name = "ccd-scope", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output PNG path; defaults to the configured name for the view
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Acquisition window length in multiples of 256 samples
    #[arg(long, global = true)]
    extend: Option<usize>,

    /// Tick every 256 samples instead of on clock edges
    #[arg(long, global = true)]
    regular_ticks: bool,

    /// Clock that triggers the ADC
    #[arg(long, global = true)]
    trigger: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// DSI and TM traces of one channel over the readout clocks
    Combined {
        /// DSI scan file, or "-" when absent
        dsi: PathBuf,
        /// Transparent-mode scan file, or "-" when absent
        tm: PathBuf,
        /// Sequencer description
        sequencer: PathBuf,
        /// Channel name, e.g. Segment07
        channel: String,
        /// Readout function or program
        readout: Option<String>,
    },
    /// Clock states of a readout function
    Sequencer {
        sequencer: PathBuf,
        #[arg(long)]
        readout: Option<String>,
    },
    /// Mean traces of several scans, channel by channel
    Scan {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Channels to compare
        #[arg(long, value_delimiter = ',')]
        channels: Option<Vec<usize>>,
        /// Append channels into one line per file
        #[arg(long)]
        stitched: bool,
    },
}

fn optional_file(path: &Path) -> Option<&Path> {
    match path.to_str() {
        Some("-") | Some("none") => None,
        _ => Some(path),
    }
}

fn load_config(args: &Args) -> Result<ScopeConfig> {
    let mut config = match &args.config {
        Some(path) => ScopeConfig::from_json_file(path)?,
        None => ScopeConfig::default(),
    };
    if let Some(extend) = args.extend {
        config.extend = extend;
    }
    if let Some(trigger) = &args.trigger {
        config.trigger_clock = trigger.clone();
    }
    if args.regular_ticks {
        config.mark_transitions = false;
    }
    config.validate()?;
    Ok(config)
}

fn load_sequencer(config: &ScopeConfig, path: &Path) -> Result<JsonSequencer> {
    let path = config.resolve_sequencer_path(path);
    JsonSequencer::from_path(&path)
        .with_context(|| format!("failed to load sequencer {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;
    let style = PlotStyle::sized(config.plot_width, config.plot_height);
    let loader = ScanDataLoader::new(config.raw_channel_count);

    let (png, default_output) = match &args.command {
        Command::Combined {
            dsi,
            tm,
            sequencer,
            channel,
            readout,
        } => {
            let model = load_sequencer(&config, sequencer)?;
            let readout = readout.as_deref().unwrap_or(&config.combined_readout);
            let request = TimelineRequest::from_config(&config, readout);
            let dsi = channel_trace(&loader, &config, optional_file(dsi), channel);
            let tm = channel_trace(&loader, &config, optional_file(tm), channel);
            let sequencer_name = sequencer
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let scope = combined_scope(&model, dsi, tm, channel, &sequencer_name, &request)?;
            (render_combined_png(&scope, &style)?, &config.outputs.combined)
        }
        Command::Sequencer { sequencer, readout } => {
            let model = load_sequencer(&config, sequencer)?;
            let readout = readout.as_deref().unwrap_or(&config.sequencer_readout);
            let scope = sequencer_scope(&model, &TimelineRequest::from_config(&config, readout))?;
            (render_sequencer_png(&scope, &style)?, &config.outputs.sequencer)
        }
        Command::Scan {
            files,
            channels,
            stitched,
        } => {
            let channels = channels.as_deref().unwrap_or(&config.comparison_channels);
            let layout = if *stitched {
                ScanLayout::Stitched
            } else {
                ScanLayout::Overlay
            };
            let comparison = scan_comparison(&loader, files, channels, layout);
            info!("{} panels from {} files", comparison.panels.len(), files.len());
            (render_scan_png(&comparison, &style)?, &config.outputs.scan)
        }
    };
    let output = args.output.as_ref().unwrap_or(default_output);
    write_png(output, &png)?;
    Ok(())
}
