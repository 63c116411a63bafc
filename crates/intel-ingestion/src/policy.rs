use std::time::Duration;

use intel_core::Settings;
use reqwest::Client;
use url::Url;

pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: String,
}

impl PolicyDecision {
    fn allow(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
        }
    }
}

fn domain_allowed(url: &Url, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    allowed_domains
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// Disallow-rule check against `robots.txt`, scoped to the single
/// user-agent group that matches `user_agent` (falling back to `*`). No
/// robots-parsing crate is in the dependency stack, so this reads the
/// handful of directives ingestion actually needs: `User-agent` and
/// `Disallow` path prefixes.
fn robots_allows(body: &str, user_agent: &str, path: &str) -> bool {
    let mut in_matching_group = false;
    let mut matched_specific = false;
    let mut disallowed_paths: Vec<String> = Vec::new();
    let mut wildcard_disallowed: Vec<String> = Vec::new();
    let mut current_agent_is_wildcard = false;

    for raw_line in body.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                let is_wildcard = value == "*";
                let is_match = value.eq_ignore_ascii_case(user_agent)
                    || user_agent.to_lowercase().contains(&value.to_lowercase());
                if is_match && !is_wildcard {
                    matched_specific = true;
                }
                in_matching_group = is_match || is_wildcard;
                current_agent_is_wildcard = is_wildcard;
            }
            "disallow" if in_matching_group && !value.is_empty() => {
                if current_agent_is_wildcard {
                    wildcard_disallowed.push(value.to_string());
                } else {
                    disallowed_paths.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    let rules = if matched_specific {
        &disallowed_paths
    } else {
        &wildcard_disallowed
    };
    !rules.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

async fn robots_check(client: &Client, url: &Url, settings: &Settings) -> PolicyDecision {
    if !settings.ingest_policy_require_robots {
        return PolicyDecision::allow("robots_check_disabled");
    }

    let robots_url = format!(
        "{}://{}/robots.txt",
        url.scheme(),
        url.host_str().unwrap_or_default()
    );

    let response = client
        .get(&robots_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(_) => {
            return if settings.ingest_policy_deny_on_robots_error {
                PolicyDecision::deny("robots_check_error_deny")
            } else {
                PolicyDecision::allow("robots_check_error_allow")
            };
        }
    };

    if !response.status().is_success() {
        return PolicyDecision::allow("robots_missing_allow");
    }

    let body = match response.text().await {
        Ok(b) => b,
        Err(_) => {
            return if settings.ingest_policy_deny_on_robots_error {
                PolicyDecision::deny("robots_check_error_deny")
            } else {
                PolicyDecision::allow("robots_check_error_allow")
            };
        }
    };

    let path = if url.path().is_empty() { "/" } else { url.path() };
    if robots_allows(&body, &settings.ingest_user_agent, path) {
        PolicyDecision::allow("robots_allowed")
    } else {
        PolicyDecision::deny("robots_disallowed")
    }
}

pub async fn validate_source_policy(source_url: &str, client: &Client, settings: &Settings) -> PolicyDecision {
    let Ok(url) = Url::parse(source_url) else {
        return PolicyDecision::deny("invalid_url");
    };

    if !domain_allowed(&url, &settings.allowed_domains()) {
        return PolicyDecision::deny("domain_not_allowed");
    }

    robots_check(client, &url, settings).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_allowed_matches_exact_and_subdomain() {
        let allowed = vec!["sec.gov".to_string()];
        assert!(domain_allowed(&Url::parse("https://sec.gov/x").unwrap(), &allowed));
        assert!(domain_allowed(&Url::parse("https://www.sec.gov/x").unwrap(), &allowed));
        assert!(!domain_allowed(&Url::parse("https://evil.com/x").unwrap(), &allowed));
    }

    #[test]
    fn domain_allowed_permits_everything_when_unconfigured() {
        assert!(domain_allowed(&Url::parse("https://anything.example").unwrap(), &[]));
    }

    #[test]
    fn robots_allows_when_no_matching_disallow_rule() {
        let body = "User-agent: *\nDisallow: /private\n";
        assert!(robots_allows(body, "IntelBot", "/public/page"));
        assert!(!robots_allows(body, "IntelBot", "/private/page"));
    }

    #[test]
    fn robots_prefers_specific_agent_group_over_wildcard() {
        let body = "User-agent: *\nDisallow: /\n\nUser-agent: IntelBot\nDisallow: /admin\n";
        assert!(robots_allows(body, "IntelBot", "/public"));
        assert!(!robots_allows(body, "IntelBot", "/admin/page"));
    }
}
