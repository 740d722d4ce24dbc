//! Browser User-Agent generation.
//!
//! The admin API sits behind the web client and expects browser-like
//! requests, so each client picks one Firefox identity at construction.

use rand::seq::SliceRandom;
use rand::Rng;

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
    "Macintosh; Intel Mac OS X 10.15",
    "Macintosh; Intel Mac OS X 14.5",
];

/// Range of recent Firefox major versions to pick from.
const FIREFOX_MIN_VERSION: u32 = 120;
const FIREFOX_MAX_VERSION: u32 = 135;

pub fn firefox_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let platform = PLATFORMS.choose(&mut rng).copied().unwrap_or(PLATFORMS[0]);
    let version = rng.gen_range(FIREFOX_MIN_VERSION..=FIREFOX_MAX_VERSION);
    format!(
        "Mozilla/5.0 ({}; rv:{}.0) Gecko/20100101 Firefox/{}.0",
        platform, version, version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firefox_user_agent_shape() {
        for _ in 0..20 {
            let ua = firefox_user_agent();
            assert!(ua.starts_with("Mozilla/5.0 ("));
            assert!(ua.contains("Gecko/20100101 Firefox/"));
            assert!(PLATFORMS.iter().any(|p| ua.contains(p)));
        }
    }
}
