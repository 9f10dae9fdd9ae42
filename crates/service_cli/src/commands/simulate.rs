//! Simulate command implementation
//!
//! Synthesises arrival timestamps for a known source so the locate command
//! can be exercised without field data.

use std::io::Write;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::info;

use super::OutputFormat;
use crate::config::HydrophoneConfig;
use crate::{CliError, Result};

/// Simulated arrival at one hydrophone
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedArrival {
    /// Hydrophone identifier
    pub id: String,
    /// Hydrophone position
    pub position: [f64; 3],
    /// Arrival timestamp including noise
    pub arrival: f64,
}

/// Run the simulate command
pub fn run(
    config: &HydrophoneConfig,
    source: [f64; 3],
    time: f64,
    noise_std: f64,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    config.validate()?;

    info!("Simulating arrivals...");
    info!("  Source: {:?}", source);
    info!("  Emission time: {} s", time);
    info!("  Noise std: {} s", noise_std);

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let arrivals = simulate_arrivals(config, source, time, noise_std, &mut rng)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render(&mut out, &arrivals, format)
}

/// Compute arrival timestamps for every configured hydrophone.
///
/// Each arrival is `time + tof + n` with `n ~ N(0, noise_std²)`.
pub fn simulate_arrivals<R: rand::Rng>(
    config: &HydrophoneConfig,
    source: [f64; 3],
    time: f64,
    noise_std: f64,
    rng: &mut R,
) -> Result<Vec<SimulatedArrival>> {
    if !noise_std.is_finite() || noise_std < 0.0 {
        return Err(CliError::invalid_argument(format!(
            "noise standard deviation must be finite and non-negative, got {}",
            noise_std
        )));
    }
    if source.iter().any(|c| !c.is_finite()) || !time.is_finite() {
        return Err(CliError::invalid_argument("source and emission time must be finite"));
    }

    let normal = Normal::new(0.0, noise_std).map_err(|e| CliError::invalid_argument(e.to_string()))?;
    let model = config.propagation();

    Ok(config
        .hydrophones
        .iter()
        .map(|h| {
            let noise = if noise_std > 0.0 { normal.sample(rng) } else { 0.0 };
            SimulatedArrival {
                id: h.id.clone(),
                position: h.position,
                arrival: time + model.time_of_flight(source, h.position) + noise,
            }
        })
        .collect())
}

/// Write simulated arrivals in the requested format.
pub fn render<W: Write>(out: &mut W, arrivals: &[SimulatedArrival], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, arrivals)?;
            writeln!(out)?;
        }
        OutputFormat::Table => {
            writeln!(out, "{:<14} {:>30}  {:>16}", "hydrophone", "position (m)", "arrival (s)")?;
            for a in arrivals {
                let position = format!("[{:.3}, {:.3}, {:.3}]", a.position[0], a.position[1], a.position[2]);
                writeln!(out, "{:<14} {:>30}  {:>16.12}", a.id, position, a.arrival)?;
            }
            writeln!(out)?;
            let line: Vec<String> = arrivals.iter().map(|a| format!("{:.12}", a.arrival)).collect();
            writeln!(out, "Timestamps: {}", line.join(" "))?;
        }
    }
    Ok(())
}
