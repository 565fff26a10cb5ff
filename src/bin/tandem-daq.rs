//! Headless acquisition runner.
//!
//! ```bash
//! tandem-daq [config.json] [step]
//! ```
//!
//! Runs the configured source (playback file if set, otherwise the simulator)
//! for `execution_time_seconds`, logging every rate snapshot. Without a limit
//! it runs until the loop stops or halts. Signals are not handled, so killing
//! the process skips the final statistics flush.

use tandem::prelude::*;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.first() {
        Some(path) => TandemConfig::load(path)?,
        None => TandemConfig::default(),
    };
    let step: MeasurementStep = match args.get(1) {
        Some(name) => name.parse()?,
        None => MeasurementStep::default(),
    };

    let run_time = config
        .execution_time_seconds
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .unwrap_or(Duration::MAX);

    info!("{}: running step {}", config.experiment_name, step);
    let mut engine = TandemEngine::builder().config(config).step(step).build()?;

    engine.run_for(run_time, |event| match event {
        LoopEvent::Rates(rates) => info!(
            "[{}] cycles {} | A {:.2}/s B {:.2}/s | background {:?} chance {:?} \
             corrected {:?} ratio {:?}",
            rates.step,
            rates.cycles,
            rates.rate_a,
            rates.rate_b,
            rates.background_rate,
            rates.chance_rate,
            rates.corrected_rate,
            rates.unquantum_effect_ratio,
        ),
        LoopEvent::WaitingForPlayback { reason, .. } => error!("Playback unavailable: {}", reason),
        LoopEvent::Halted { reason } => error!("Acquisition halted: {}", reason),
        _ => {}
    })?;

    let summary = engine.shutdown()?;
    info!(
        "Finished: {} cycles, {} statistics rows, state {:?}",
        summary.cycles, summary.rows, summary.state
    );
    if let Some(reason) = summary.halted {
        return Err(reason.into());
    }
    Ok(())
}
