//! CLI command implementations
//!
//! Each submodule implements a specific CLI command.

pub mod check;
pub mod locate;
pub mod simulate;

use clap::ValueEnum;
use locator_core::types::Unknowns;

/// Output format shared by the commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Table,
    /// Pretty-printed JSON
    Json,
}

/// Parse `x,y,z` into a position.
pub fn parse_position(s: &str) -> Result<[f64; 3], String> {
    parse_components(s)
}

/// Parse `x,y,z,t` into an unknowns vector.
pub fn parse_unknowns(s: &str) -> Result<Unknowns, String> {
    parse_components::<4>(s).map(Unknowns::from)
}

fn parse_components<const N: usize>(s: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!(
            "expected {} comma-separated numbers, got {} in '{}'",
            N,
            parts.len(),
            s
        ));
    }

    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(&parts) {
        let value: f64 = part
            .parse()
            .map_err(|_| format!("'{}' is not a number", part))?;
        if !value.is_finite() {
            return Err(format!("'{}' is not finite", part));
        }
        *slot = value;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("1, -2.5,3e1").unwrap(), [1.0, -2.5, 30.0]);
    }

    #[test]
    fn test_parse_unknowns() {
        let u = parse_unknowns("10,0,0,0.000675").unwrap();
        assert_eq!(u, Unknowns::new(10.0, 0.0, 0.0, 0.000675));
    }

    #[test]
    fn test_parse_wrong_count() {
        let err = parse_position("1,2").unwrap_err();
        assert!(err.contains("expected 3"));
        assert!(parse_unknowns("1,2,3").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_position("1,two,3").unwrap_err().contains("not a number"));
        assert!(parse_position("1,NaN,3").unwrap_err().contains("not finite"));
    }
}
