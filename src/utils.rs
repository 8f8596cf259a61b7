use rand::Rng;
use rand::distributions::Alphanumeric;

/// `prefix-xxxxxxxx` with eight lowercase alphanumerics.
pub fn make_short_random_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("{prefix}-{suffix}")
}
