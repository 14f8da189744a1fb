//! Kubernetes resource quantities expressed in the units the remote service bills in.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::{Error, Result};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Parse a quantity string into its value in base units.
///
/// Supports decimal SI suffixes (`n`, `u`, `m`, `k`, `M`, `G`, `T`, `P`, `E`),
/// binary suffixes (`Ki` .. `Ei`) and decimal exponents (`1e3`).
pub fn parse(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);
    let value: f64 = number.parse().ok()?;

    let multiplier = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024f64,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        exp if exp.len() > 1 && (exp.starts_with('e') || exp.starts_with('E')) => {
            let power: i32 = exp[1..].parse().ok()?;
            10f64.powi(power)
        }
        _ => return None,
    };

    let parsed = value * multiplier;
    parsed.is_finite().then_some(parsed)
}

/// CPU quantity in cores.
pub fn cpu_cores(quantity: &Quantity, container: &str) -> Result<f64> {
    non_negative("cpu", quantity, container)
}

/// Memory quantity in GiB.
pub fn memory_gib(quantity: &Quantity, container: &str) -> Result<f64> {
    non_negative("memory", quantity, container).map(|bytes| bytes / GIB)
}

fn non_negative(resource: &'static str, quantity: &Quantity, container: &str) -> Result<f64> {
    match parse(&quantity.0) {
        Some(value) if value >= 0.0 => Ok(value),
        _ => Err(Error::InvalidQuantity {
            resource,
            value: quantity.0.clone(),
            container: container.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity(s.to_string())
    }

    #[test]
    fn cpu_accepts_cores_and_millicores() {
        assert_eq!(cpu_cores(&q("500m"), "web").unwrap(), 0.5);
        assert_eq!(cpu_cores(&q("2"), "web").unwrap(), 2.0);
        assert_eq!(cpu_cores(&q("1.5"), "web").unwrap(), 1.5);
    }

    #[test]
    fn memory_is_reported_in_gib() {
        assert_eq!(memory_gib(&q("256Mi"), "web").unwrap(), 0.25);
        assert_eq!(memory_gib(&q("2Gi"), "web").unwrap(), 2.0);
        let decimal = memory_gib(&q("1G"), "web").unwrap();
        assert!((decimal - 0.9313).abs() < 1e-3);
    }

    #[test]
    fn exponents_and_small_suffixes() {
        assert_eq!(parse("1e3"), Some(1000.0));
        assert_eq!(parse("12E2"), Some(1200.0));
        assert_eq!(parse("1E"), Some(1e18));
        assert_eq!(parse("100n"), Some(100e-9));
    }

    #[test]
    fn rejects_garbage_and_negative_values() {
        assert_eq!(parse("lots"), None);
        assert_eq!(parse("1Xi"), None);

        let err = cpu_cores(&q("-1"), "web").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidQuantity { resource: "cpu", ref container, .. } if container == "web"
        ));
        assert!(memory_gib(&q("abc"), "sidecar").is_err());
    }
}
