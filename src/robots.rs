//! robots.txt gate.
//!
//! Fetched once at engine start with a 10s ceiling; any failure (network
//! error, timeout, non-2xx, malformed body) defaults to allow-all rather
//! than blocking the job on a misbehaving host.

use std::time::Duration;
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Cached robots policy for user-agent `"*"`. Only `Disallow` rules are
/// tracked; `Allow` overrides are not modeled since callers only care
/// about blocked vs. not-blocked.
pub struct RobotsGate {
    disallow: Vec<String>,
}

impl RobotsGate {
    /// Allow-all gate, used when `respect_robots_txt` is off or when the
    /// fetch failed.
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            disallow: Vec::new(),
        }
    }

    pub async fn fetch(client: &reqwest::Client, base_url: &str) -> Self {
        match Self::try_fetch(client, base_url).await {
            Ok(gate) => gate,
            Err(e) => {
                log::warn!("robots.txt fetch failed for {base_url}, defaulting to allow-all: {e}");
                Self::allow_all()
            }
        }
    }

    async fn try_fetch(client: &reqwest::Client, base_url: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)?;
        let robots_url = base.join("/robots.txt")?;

        let body = tokio::time::timeout(FETCH_TIMEOUT, async {
            client.get(robots_url).send().await?.text().await
        })
        .await??;

        Ok(Self {
            disallow: parse_disallow_rules(&body),
        })
    }

    /// True if `url`'s path is not covered by any `Disallow` rule under
    /// user-agent `*`.
    #[must_use]
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let path = parsed.path();
        !self.disallow.iter().any(|rule| path.starts_with(rule.as_str()))
    }
}

/// Minimal parser covering the `User-agent: *` block's `Disallow` lines;
/// other user-agent sections and `Allow` overrides are not interpreted.
fn parse_disallow_rules(body: &str) -> Vec<String> {
    let mut rules = Vec::new();
    let mut in_wildcard_block = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => in_wildcard_block = value == "*",
            "disallow" if in_wildcard_block && !value.is_empty() => {
                rules.push(value.to_string());
            }
            _ => {}
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_permits_everything() {
        let gate = RobotsGate::allow_all();
        assert!(gate.is_allowed("http://example.com/anything"));
    }

    #[test]
    fn disallow_rule_blocks_matching_path() {
        let rules = parse_disallow_rules("User-agent: *\nDisallow: /private\n");
        let gate = RobotsGate { disallow: rules };
        assert!(!gate.is_allowed("http://example.com/private/page"));
        assert!(gate.is_allowed("http://example.com/public"));
    }

    #[test]
    fn rules_outside_wildcard_block_are_ignored() {
        let rules = parse_disallow_rules("User-agent: Googlebot\nDisallow: /only-google\n");
        let gate = RobotsGate { disallow: rules };
        assert!(gate.is_allowed("http://example.com/only-google"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let rules = parse_disallow_rules("# comment\n\nUser-agent: *\nDisallow: /x # trailing\n");
        assert_eq!(rules, vec!["/x".to_string()]);
    }
}
