//! Check command implementation
//!
//! Validates a hydrophone configuration and summarises the array geometry.

use std::io::Write;

use locator_core::types::MIN_RECEIVERS;
use tracing::{info, warn};

use crate::config::HydrophoneConfig;
use crate::Result;

/// Tolerance (m) below which the array is treated as coplanar.
const PLANARITY_TOLERANCE: f64 = 1e-6;

/// Run the check command
pub fn run(config: &HydrophoneConfig) -> Result<()> {
    info!("Checking configuration...");
    config.validate()?;

    let positions: Vec<[f64; 3]> = config.hydrophones.iter().map(|h| h.position).collect();
    if positions.len() == MIN_RECEIVERS {
        warn!("Exactly {} hydrophones: the fit has no redundancy", MIN_RECEIVERS);
    }
    if is_coplanar(&positions, PLANARITY_TOLERANCE) {
        warn!("Hydrophones are coplanar: sources mirrored through the array plane are indistinguishable");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    summarise(&mut out, config)?;
    Ok(())
}

/// Write the configuration summary.
pub fn summarise<W: Write>(out: &mut W, config: &HydrophoneConfig) -> Result<()> {
    let array = config.receiver_array();
    let centroid = array.centroid();
    let lm = config.lm_config();

    writeln!(out, "Configuration OK")?;
    writeln!(out, "  Hydrophones:      {}", array.len())?;
    writeln!(out, "  Speed of sound:   {} m/s", config.speed_of_sound)?;
    writeln!(out, "  Distance epsilon: {:e} m²", config.distance_epsilon)?;
    writeln!(
        out,
        "  Solver:           max {} iterations, ftol {:e}, xtol {:e}",
        lm.max_iterations, lm.function_tolerance, lm.step_tolerance
    )?;
    if let Some(limit) = lm.time_limit {
        writeln!(out, "  Time limit:       {} ms", limit.as_millis())?;
    }
    writeln!(
        out,
        "  Centroid:         [{:.3}, {:.3}, {:.3}]",
        centroid[0], centroid[1], centroid[2]
    )?;
    writeln!(out, "  Aperture:         {:.3} m", aperture(array.positions()))?;
    writeln!(
        out,
        "  Coplanar:         {}",
        if is_coplanar(array.positions(), PLANARITY_TOLERANCE) { "yes" } else { "no" }
    )?;
    Ok(())
}

/// Largest distance between any two hydrophones.
pub fn aperture(positions: &[[f64; 3]]) -> f64 {
    let mut max: f64 = 0.0;
    for (i, a) in positions.iter().enumerate() {
        for b in &positions[i + 1..] {
            max = max.max(distance(a, b));
        }
    }
    max
}

/// Whether every position lies within `tol` of a single plane.
///
/// Fewer than four points, or collinear sets, are always coplanar.
pub fn is_coplanar(positions: &[[f64; 3]], tol: f64) -> bool {
    let Some(origin) = positions.first() else {
        return true;
    };

    // Normal from the first pair of edges that are not parallel
    let edges: Vec<[f64; 3]> = positions[1..].iter().map(|p| sub(p, origin)).collect();
    let normal = edges.iter().enumerate().find_map(|(i, a)| {
        edges[i + 1..].iter().find_map(|b| {
            let n = cross(a, b);
            let len = norm(&n);
            (len > tol * norm(a).max(norm(b)).max(1.0)).then(|| [n[0] / len, n[1] / len, n[2] / len])
        })
    });

    match normal {
        Some(n) => edges.iter().all(|e| dot(e, &n).abs() <= tol),
        None => true,
    }
}

fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    norm(&sub(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, Hydrophone, SolverSettings};
    use crate::CliError;
    use approx::assert_relative_eq;

    fn config(positions: &[[f64; 3]]) -> HydrophoneConfig {
        HydrophoneConfig {
            speed_of_sound: 1482.0,
            distance_epsilon: 1e-12,
            log_level: "info".to_string(),
            solver: SolverSettings::default(),
            hydrophones: positions
                .iter()
                .enumerate()
                .map(|(i, &position)| Hydrophone {
                    id: format!("h{}", i),
                    position,
                })
                .collect(),
        }
    }

    #[test]
    fn test_aperture() {
        let positions = [[0.0, 0.0, 0.0], [3.0, 4.0, 0.0], [1.0, 1.0, 1.0]];
        assert_relative_eq!(aperture(&positions), 5.0);
        assert_eq!(aperture(&[]), 0.0);
    }

    #[test]
    fn test_flat_array_is_coplanar() {
        let flat = [[0.0, 0.0, -5.0], [10.0, 0.0, -5.0], [0.0, 10.0, -5.0], [10.0, 10.0, -5.0]];
        assert!(is_coplanar(&flat, 1e-6));

        let tilted = [[0.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 1.0, 2.0]];
        assert!(is_coplanar(&tilted, 1e-6));
    }

    #[test]
    fn test_volume_array_is_not_coplanar() {
        let positions = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0, 1.0]];
        assert!(!is_coplanar(&positions, 1e-6));
    }

    #[test]
    fn test_collinear_is_coplanar() {
        let line = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        assert!(is_coplanar(&line, 1e-6));
    }

    #[test]
    fn test_summary_lists_geometry() {
        let config = config(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0, 1.0]]);
        let mut buf = Vec::new();
        summarise(&mut buf, &config).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Hydrophones:      4"));
        assert!(text.contains("Centroid:         [0.500, 0.500, 0.500]"));
        assert!(text.contains("Coplanar:         no"));
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let config = config(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let result = run(&config);
        assert!(matches!(result, Err(CliError::Config(ConfigError::Validation(_)))));
    }
}
