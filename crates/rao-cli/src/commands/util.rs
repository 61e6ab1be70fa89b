use anyhow::{bail, Result};

/// Thread count from a `--workers` value: a positive integer or "auto".
pub fn parse_workers(spec: &str) -> Result<usize> {
    if spec.eq_ignore_ascii_case("auto") {
        return Ok(num_cpus::get());
    }
    match spec.parse::<usize>() {
        Ok(0) | Err(_) => bail!("invalid worker count '{spec}': expected a positive integer or \"auto\""),
        Ok(count) => Ok(count),
    }
}

/// Margin column text; absent values print as a dash.
pub fn fmt_margin(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_accept_counts_and_auto() {
        assert_eq!(parse_workers("3").unwrap(), 3);
        assert_eq!(parse_workers("AUTO").unwrap(), num_cpus::get());
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn margins_format_with_two_decimals() {
        assert_eq!(fmt_margin(Some(53.9091)), "53.91");
        assert_eq!(fmt_margin(Some(f64::INFINITY)), "inf");
        assert_eq!(fmt_margin(None), "-");
    }
}
