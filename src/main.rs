use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use epimap::pipeline::layers::Layer;
use epimap::util::format_count;
use epimap::{MapEngine, MetricRegistry, RenderSink, load_dataset};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Dataset JSON with county and state time series plus geometry.
    data: PathBuf,

    #[arg(long, default_value = "cases")]
    metric: String,

    /// Day index to display; defaults to the most recent day.
    #[arg(long)]
    day: Option<usize>,

    /// Dump the composed layer sequence as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

struct CountingSink {
    pushes: usize,
}

impl RenderSink for CountingSink {
    fn push_layers(&mut self, layers: &[Layer]) {
        self.pushes += 1;
        log::debug!("pushed {} layers", layers.len());
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let dataset = load_dataset(&args.data)?;
    let num_days = dataset.num_days;

    let mut engine = MapEngine::new(dataset, MetricRegistry::with_defaults())?;
    engine.attach_sink(CountingSink { pushes: 0 })?;

    engine.set_active_metric(&args.metric)?;
    if let Some(day) = args.day {
        engine.set_day_index(day)?;
    }

    let layers = engine.layers()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(layers.as_ref())?);
        return Ok(());
    }

    let day = engine.day_index()?;
    let total = engine.total()?;
    println!(
        "day {day}/{}: {} {}",
        num_days - 1,
        format_count(total),
        engine.pluralize(total)?
    );
    for layer in layers.iter() {
        println!("  {:<18} {:>6} records", layer.id(), layer.len());
    }

    Ok(())
}
