use anyhow::{Context, Result, bail};
use std::collections::HashSet;

/// Seed used when no token resolves to anything.
pub const DEFAULT_SEED: u64 = 1337;

/// Largest number of seeds a single range token may expand to.
const MAX_RANGE: u64 = 10_000;

/// Resolve CLI seed tokens into a deduplicated seed list.
///
/// Accepts decimal integers (negative values use their magnitude), `0x` hex
/// literals, and ranges written `a..b` (exclusive) or `a..=b` (inclusive).
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut pending: Vec<u64> = Vec::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once("..") {
            pending.extend(expand_range(token, start, end)?);
            continue;
        }

        pending.push(parse_seed(token)?);
    }

    let mut seen = HashSet::new();
    let mut deduped: Vec<u64> = pending.into_iter().filter(|seed| seen.insert(*seed)).collect();

    if deduped.is_empty() {
        deduped.push(DEFAULT_SEED);
    }

    Ok(deduped)
}

fn parse_seed(token: &str) -> Result<u64> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex seed: {token}"));
    }

    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }

    if let Ok(value) = token.parse::<u64>() {
        return Ok(value);
    }

    bail!("Unrecognized seed token: {token}");
}

fn expand_range(token: &str, start: &str, end: &str) -> Result<Vec<u64>> {
    let (end, inclusive) = match end.strip_prefix('=') {
        Some(end) => (end, true),
        None => (end, false),
    };
    let start = parse_seed(start).with_context(|| format!("invalid range start in {token}"))?;
    let end = parse_seed(end).with_context(|| format!("invalid range end in {token}"))?;
    let end = if inclusive { end.saturating_add(1) } else { end };

    if end <= start {
        bail!("Empty seed range: {token}");
    }
    if end - start > MAX_RANGE {
        bail!("Seed range {token} expands to more than {MAX_RANGE} seeds");
    }

    Ok((start..end).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn resolves_numbers_hex_and_negatives() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7", "0x10"])).unwrap();
        assert_eq!(seeds, vec![42, 7, 16]);
    }

    #[test]
    fn expands_ranges_and_dedupes() {
        let seeds = resolve_seed_inputs(&tokens(&["3..6", "4..=7", "5"])).unwrap();
        assert_eq!(seeds, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn empty_input_falls_back_to_default() {
        assert_eq!(resolve_seed_inputs(&tokens(&["", " "])).unwrap(), vec![DEFAULT_SEED]);
    }

    #[test]
    fn rejects_garbage_and_runaway_ranges() {
        assert!(resolve_seed_inputs(&tokens(&["banana"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["9..2"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["0..100000"])).is_err());
    }
}
