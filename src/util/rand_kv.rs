use bytes::Bytes;
use rand::{distr::Alphanumeric, rngs::StdRng, Rng, SeedableRng};

/// Deterministic test key for index `i`.
pub fn get_test_key(i: usize) -> Bytes {
  Bytes::from(std::format!("barrelkv-test-key-{i:09}"))
}

/// Deterministic test value for index `i`. Seeded off `i` so repeated calls
/// with the same index always produce the same bytes, which tests rely on.
pub fn get_test_value(i: usize) -> Bytes {
  let mut rng = StdRng::seed_from_u64(i as u64);
  let suffix: String = (0..12).map(|_| rng.sample(Alphanumeric) as char).collect();
  Bytes::from(std::format!("barrelkv-test-value-{i:09}-{suffix}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deterministic() {
    assert_eq!(get_test_key(7), get_test_key(7));
    assert_eq!(get_test_value(7), get_test_value(7));
    assert_ne!(get_test_key(7), get_test_key(8));
    assert_ne!(get_test_value(7), get_test_value(8));
  }
}
