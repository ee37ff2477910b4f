use anyhow::{Context, Result, bail};

/// Fallback when no seed tokens are given.
pub const DEFAULT_SEED: u64 = 1337;

/// Resolve CLI seed tokens into concrete seeds.
///
/// Accepts decimal integers (negative values use their magnitude), `0x` hex
/// literals and the keyword `random`, which draws a fresh seed. Duplicates are
/// dropped while keeping the first occurrence's position.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds: Vec<u64> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }
        let seed = parse_seed(token)?;
        if !seeds.contains(&seed) {
            seeds.push(seed);
        }
    }

    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED);
    }
    Ok(seeds)
}

fn parse_seed(token: &str) -> Result<u64> {
    if token.eq_ignore_ascii_case("random") {
        let seed = rand::random::<u64>();
        log::info!("drew random seed {seed}");
        return Ok(seed);
    }

    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .with_context(|| format!("invalid hex seed: {token}"));
    }

    if let Ok(value) = token.parse::<u64>() {
        return Ok(value);
    }

    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }

    bail!("Unrecognized seed token: {token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn resolves_decimal_negative_and_hex() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7", "0xff"])).unwrap();
        assert_eq!(seeds, vec![42, 7, 255]);
    }

    #[test]
    fn drops_duplicates_in_order() {
        let seeds = resolve_seed_inputs(&tokens(&["9", "0x9", "3", "9"])).unwrap();
        assert_eq!(seeds, vec![9, 3]);
    }

    #[test]
    fn empty_input_uses_default() {
        assert_eq!(resolve_seed_inputs(&[]).unwrap(), vec![DEFAULT_SEED]);
    }

    #[test]
    fn random_keyword_yields_a_seed() {
        assert_eq!(resolve_seed_inputs(&tokens(&["random"])).unwrap().len(), 1);
    }

    #[test]
    fn rejects_garbage() {
        let err = resolve_seed_inputs(&tokens(&["CL-ORANGE42"])).unwrap_err();
        assert!(err.to_string().contains("Unrecognized seed token"));
        assert!(resolve_seed_inputs(&tokens(&["0xzz"])).is_err());
    }
}
