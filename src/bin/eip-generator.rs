//! Command-line front end: reads an Entropy/IP model on stdin and writes
//! generated addresses to stdout, one per line.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::info;

use eipgen::{read_model, Generator, GeneratorConfig, GeneratorError};

#[derive(Parser, Debug)]
#[command(name = "eip-generator")]
#[command(about = "Generate IPv6 addresses from an Entropy/IP model read on stdin")]
struct Args {
    /// Approximate number of addresses to generate
    #[arg(short = 'N', value_name = "COUNT", default_value_t = 1_000_000)]
    count: u64,

    /// Minimum state probability, 0 = auto, negative = no pruning
    #[arg(
        short = 'S',
        value_name = "PROB",
        default_value_t = 0.0,
        allow_negative_numbers = true
    )]
    min_probability: f64,

    /// Maximum number of addresses per model state
    #[arg(short = 'M', value_name = "COUNT", default_value_t = 1_000)]
    max_per_state: u64,

    /// Maximum depth in the model to run in parallel
    #[arg(short = 'P', value_name = "DEPTH", default_value_t = 4)]
    parallel_depth: usize,

    /// Print the model before and a summary after the addresses
    #[arg(short = 'V')]
    verbose: bool,

    /// Pass model header lines from stdin to stdout
    #[arg(short = 'p')]
    passthrough: bool,

    /// Bound the queue between traversal and sampling
    #[arg(long, value_name = "STATES")]
    queue_capacity: Option<usize>,
}

impl Args {
    fn config(&self) -> GeneratorConfig {
        let config = GeneratorConfig::default()
            .target_count(self.count)
            .min_state_probability(self.min_probability)
            .max_per_state(self.max_per_state)
            .parallel_depth(self.parallel_depth)
            .verbose(self.verbose)
            .passthrough(self.passthrough);
        match self.queue_capacity {
            Some(capacity) => config.queue_capacity(capacity),
            None => config,
        }
    }
}

fn run<W: Write>(args: &Args, out: &mut W) -> Result<(), GeneratorError> {
    let config = args.config();
    config.validate()?;

    let echo: Option<&mut dyn Write> = if config.is_passthrough() {
        Some(&mut *out)
    } else {
        None
    };
    let model = read_model(io::stdin().lock(), echo)?;

    let generator = Generator::new(Arc::new(model), config)?;
    let summary = generator.run(rand::rng(), out)?;
    info!("{summary}");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = run(&args, &mut out);
    let flushed = out.flush();

    match result.and(flushed.map_err(GeneratorError::from)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("eip-generator: {e}");
            ExitCode::FAILURE
        }
    }
}
