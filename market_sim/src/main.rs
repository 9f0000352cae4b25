use std::env;
use std::error::Error;
use std::thread;

use clap::{self, Parser};
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;

use market::controller::Simulation;
use market::core::{parse_item_list, SimConfig};
use market::events::EventSink;

#[derive(clap::Parser)]
#[clap()]
struct Opts {
    #[clap(short = 'c', long = "config", default_value = "market-sim.toml")]
    config: String,
    /// Comma-separated item catalog, overriding config and ITEM_TYPES.
    #[clap(long)]
    items: Option<String>,
    #[clap(long)]
    producers: Option<u32>,
    #[clap(long)]
    consumers: Option<u32>,
    #[clap(long)]
    run_ms: Option<u64>,
    #[clap(long)]
    seed: Option<u64>,
    /// Write the event stream to a file instead of stdout.
    #[clap(long)]
    out: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let opts: Opts = Opts::parse();
    let mut cfg: SimConfig = confy::load_path(&opts.config)?;

    if cfg.items.is_empty() {
        if let Ok(raw) = env::var("ITEM_TYPES") {
            cfg.items = parse_item_list(&raw);
        }
    }
    if let Some(raw) = &opts.items {
        cfg.items = parse_item_list(raw);
    }
    if let Some(v) = opts.producers {
        cfg.producers = v;
    }
    if let Some(v) = opts.consumers {
        cfg.consumers = v;
    }
    if let Some(v) = opts.run_ms {
        cfg.run_ms = v;
    }
    if let Some(v) = opts.seed {
        cfg.seed = v;
    }
    // stdout carries the event stream, so diagnostics go to stderr.
    eprintln!("config: {:?}", cfg);

    let sink = match &opts.out {
        Some(path) => EventSink::to_file(path)?,
        None => EventSink::stdout(),
    };
    let sim = Simulation::new(cfg, sink)?;

    // Ends the run early on a termination signal; workers drain their
    // current cycle and the controller joins them as usual.
    let ctx = sim.context();
    let mut signals = Signals::new(&[SIGHUP, SIGINT, SIGQUIT, SIGTERM])?;
    thread::spawn(move || {
        for _ in signals.forever() {
            ctx.stop();
        }
    });

    sim.run()?;
    Ok(())
}
