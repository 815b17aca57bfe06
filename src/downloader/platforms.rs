// Per-site configuration keyed by domain suffix

use serde::Serialize;
use url::Url;

/// Static settings for one supported site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformConfig {
    pub domain: &'static str,
    pub description: &'static str,
    pub requires_cookies: bool,
    pub user_agent: Option<&'static str>,
    pub referer: Option<&'static str>,
}

pub static PLATFORMS: &[PlatformConfig] = &[
    PlatformConfig {
        domain: "agasobanuyefilms.com",
        description: "Rwandan movie streaming platform",
        requires_cookies: true,
        user_agent: Some("Mozilla/5.0"),
        referer: Some("https://agasobanuyefilms.com/"),
    },
    PlatformConfig {
        domain: "youtube.com",
        description: "YouTube",
        requires_cookies: false,
        user_agent: None,
        referer: None,
    },
    PlatformConfig {
        domain: "youtu.be",
        description: "YouTube",
        requires_cookies: false,
        user_agent: None,
        referer: None,
    },
    PlatformConfig {
        domain: "vimeo.com",
        description: "Vimeo",
        requires_cookies: false,
        user_agent: None,
        referer: None,
    },
    PlatformConfig {
        domain: "instagram.com",
        description: "Instagram (videos, images, reels)",
        requires_cookies: false,
        user_agent: None,
        referer: None,
    },
    PlatformConfig {
        domain: "pinterest.com",
        description: "Pinterest images",
        requires_cookies: false,
        user_agent: None,
        referer: None,
    },
];

/// Lowercased host of `url` with a leading `www.` removed.
///
/// Scheme-less input like "youtube.com/watch?v=x" is retried with https.
pub fn host_of(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{}", url)).ok())?;

    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    Some(host)
}

/// Longest-suffix match of `host` against `table`
pub fn match_platform<'a>(host: &str, table: &'a [PlatformConfig]) -> Option<&'a PlatformConfig> {
    table
        .iter()
        .filter(|p| host.ends_with(p.domain))
        .max_by_key(|p| p.domain.len())
}

/// Platform settings for `url`, if any entry matches its host
pub fn platform_for(url: &str) -> Option<&'static PlatformConfig> {
    let host = host_of(url)?;
    match_platform(&host, PLATFORMS)
}
