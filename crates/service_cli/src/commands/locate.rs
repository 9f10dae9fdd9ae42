//! Locate command implementation
//!
//! Pairs the supplied arrival timestamps with the configured hydrophones and
//! solves for the source position and emission time.

use std::io::Write;

use locator_core::locate::{SourceEstimate, SourceLocator};
use locator_core::math::differentiation::{CentralDifference, DifferentiationMode};
use locator_core::types::{LocatorError, Unknowns};
use tracing::{info, warn};

use super::OutputFormat;
use crate::config::HydrophoneConfig;
use crate::Result;

/// Options for the locate command
#[derive(Debug, Clone)]
pub struct LocateOptions {
    /// Starting point, centroid of the array when absent
    pub initial: Option<Unknowns>,
    /// Use central differences instead of forward-mode AD
    pub finite_difference: bool,
    /// Relative finite-difference step
    pub fd_step: f64,
    /// Override of the configured iteration budget
    pub max_iterations: Option<usize>,
    /// Output format
    pub format: OutputFormat,
    /// Print the per-iteration trace
    pub trace: bool,
}

/// Run the locate command
pub fn run(config: &HydrophoneConfig, timestamps: &[f64], options: &LocateOptions) -> Result<()> {
    let estimate = solve(config, timestamps, options)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render(&mut out, &estimate, options)?;
    Ok(())
}

/// Build the locator from configuration and options and solve one event.
pub fn solve(
    config: &HydrophoneConfig,
    timestamps: &[f64],
    options: &LocateOptions,
) -> Result<SourceEstimate> {
    config.validate()?;

    info!("Starting localisation...");
    info!("  Hydrophones: {}", config.hydrophones.len());
    info!("  Speed of sound: {} m/s", config.speed_of_sound);

    let receivers = config
        .receiver_array()
        .with_arrivals(timestamps)
        .map_err(LocatorError::from)?;

    let mut lm = config.lm_config();
    if let Some(max_iterations) = options.max_iterations {
        lm.max_iterations = max_iterations;
    }

    let differentiation = if options.finite_difference {
        let fd = CentralDifference::new(options.fd_step).map_err(LocatorError::from)?;
        DifferentiationMode::CentralDifference(fd)
    } else {
        DifferentiationMode::Forward
    };

    let estimate = SourceLocator::new(config.propagation(), lm)
        .with_differentiator(differentiation)
        .locate(&receivers, options.initial)?;

    if !estimate.converged() {
        warn!("Solver stopped with status {}", estimate.status);
    }
    Ok(estimate)
}

/// Write the estimate in the requested format.
pub fn render<W: Write>(out: &mut W, estimate: &SourceEstimate, options: &LocateOptions) -> Result<()> {
    match options.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, estimate)?;
            writeln!(out)?;
        }
        OutputFormat::Table => {
            let g = &estimate.initial_guess;
            writeln!(
                out,
                "Initial guess: x={:.6} y={:.6} z={:.6} t={:.9}",
                g.x, g.y, g.z, g.t
            )?;
            writeln!(out, "Status:        {}", estimate.status)?;
            writeln!(out, "Iterations:    {}", estimate.iterations)?;
            writeln!(out, "Final cost:    {:.6e}", estimate.final_cost)?;
            writeln!(out, "RMS residual:  {:.3e} s", estimate.rms_residual())?;
            writeln!(out, "x = {:.6} m", estimate.x)?;
            writeln!(out, "y = {:.6} m", estimate.y)?;
            writeln!(out, "z = {:.6} m", estimate.z)?;
            writeln!(out, "t = {:.9} s", estimate.t)?;

            if options.trace {
                writeln!(out)?;
                writeln!(
                    out,
                    "{:>5}  {:>13}  {:>13}  {:>11}  {:>9}  {}",
                    "iter", "cost", "candidate", "step", "lambda", "accepted"
                )?;
                for record in &estimate.trace {
                    let candidate = record
                        .candidate_cost
                        .map(|c| format!("{:.6e}", c))
                        .unwrap_or_else(|| "-".to_string());
                    writeln!(
                        out,
                        "{:>5}  {:>13.6e}  {:>13}  {:>11.3e}  {:>9.1e}  {}",
                        record.iteration,
                        record.cost,
                        candidate,
                        record.step_norm,
                        record.lambda,
                        if record.accepted { "yes" } else { "no" }
                    )?;
                }
            }
        }
    }
    Ok(())
}
