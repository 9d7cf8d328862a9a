//! Site configurations: pages, consent variants and scripted actions.
//!
//! A [`SiteConfig`] is loaded once per run (see [`crate::loader`]) and is
//! immutable afterwards. Each [`PageSpec`] expands into one scan task per
//! declared [`Variant`].

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for one audited site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Optional label used in logs and reports
    #[serde(default)]
    pub name: Option<String>,
    /// Main URL, also the page the consent hashes are harvested from
    pub main_url: String,
    /// Policy source endpoint
    pub api_url: String,
    /// Replacement for `main_url` when matching policy host patterns
    pub settings_domain_substitution: String,
    /// Pages to scan, in declaration order
    #[serde(alias = "urls")]
    pub pages: Vec<PageSpec>,
}

impl SiteConfig {
    /// Label for logs: the configured name, or the main URL.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.main_url)
    }

    /// Pages selected for this run.
    ///
    /// If any page sets `only`, just those pages are returned; otherwise all of them.
    #[must_use]
    pub fn selected_pages(&self) -> Vec<PageSpec> {
        let only: Vec<PageSpec> = self.pages.iter().filter(|page| page.only).cloned().collect();
        if only.is_empty() {
            self.pages.clone()
        } else {
            only
        }
    }

    /// Validate URLs and page declarations.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_url("main_url", &self.main_url)?;
        validate_url("api_url", &self.api_url)?;
        validate_url("settings_domain_substitution", &self.settings_domain_substitution)?;

        for (index, page) in self.pages.iter().enumerate() {
            if page.name_base.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("pages[{index}].name_base"),
                    reason: "must not be empty".to_string(),
                });
            }
            validate_url(&format!("pages[{index}].url"), &page.url)?;
            if page.variants.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("pages[{index}].variants"),
                    reason: "at least one variant is required".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> ConfigResult<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("invalid URL '{value}': {e}"),
        })
}

/// One page of a site and the consent variants to scan it under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Restrict the run to pages with this flag
    #[serde(default)]
    pub only: bool,
    /// Human-readable base name of the page
    pub name_base: String,
    /// Page URL
    pub url: String,
    /// Scripted post-load interactions, applied in order
    #[serde(default)]
    pub actions: Vec<ScanAction>,
    /// Consent states to scan the page under
    #[serde(default)]
    pub variants: Vec<Variant>,
    /// Scan in the headless browser
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Wait for the operator after actions
    #[serde(default)]
    pub pause: bool,
    /// Use a fixed delay instead of a network-idle wait
    #[serde(default)]
    pub skip_network_idle: bool,
    /// Fixed delay used when `skip_network_idle` is set
    #[serde(default = "default_wait_for_network_idle_ms")]
    pub wait_for_network_idle_ms: u64,
}

fn default_headless() -> bool {
    true
}

fn default_wait_for_network_idle_ms() -> u64 {
    5000
}

/// A simulated consent state: a built-in bundle name or an explicit group list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variant {
    /// Bundle name (`none`, `required`, `optional`, `all`)
    Named(String),
    /// Explicit list of group IDs
    Explicit(Vec<String>),
}

impl Variant {
    /// The built-in bundle this variant names, if any.
    #[must_use]
    pub fn bundle(&self) -> Option<Bundle> {
        match self {
            Self::Named(name) => Bundle::from_name(name),
            Self::Explicit(_) => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Explicit(groups) => f.write_str(&groups.join(",")),
        }
    }
}

/// Built-in variant shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bundle {
    /// No group granted
    None,
    /// Every required group
    Required,
    /// Every optional group
    Optional,
    /// Every group
    All,
}

impl Bundle {
    /// Look up a bundle by its configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "required" => Some(Self::Required),
            "optional" => Some(Self::Optional),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Scripted interaction applied after the page settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanAction {
    /// Click the first element matching `selector`
    Click {
        /// CSS selector
        selector: String,
    },
    /// Replace the value of an input
    Type {
        /// CSS selector
        selector: String,
        /// Text to enter
        text: String,
    },
    /// Wait for network idle, bounded by `timeout` (milliseconds)
    WaitForNetworkIdle {
        /// Upper bound in milliseconds; the scanner default applies when absent
        #[serde(default)]
        timeout: Option<u64>,
    },
    /// Reload the page
    Refresh,
    /// Scroll an element into the viewport
    ScrollIntoView {
        /// CSS selector
        selector: String,
    },
    /// Remove an element from the DOM
    RemoveElement {
        /// CSS selector
        selector: String,
    },
}

impl ScanAction {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Type { .. } => "type",
            Self::WaitForNetworkIdle { .. } => "waitForNetworkIdle",
            Self::Refresh => "refresh",
            Self::ScrollIntoView { .. } => "scrollIntoView",
            Self::RemoveElement { .. } => "removeElement",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE_TOML: &str = r##"
name = "avustukset"
main_url = "https://avustukset.dev.hel.ninja/fi/avustukset"
api_url = "https://avustukset.dev.hel.ninja/en/api/cookie-banner"
settings_domain_substitution = "https://avustukset.dev.hel.ninja/fi/avustukset"

[[pages]]
name_base = "Frontpage"
url = "https://avustukset.dev.hel.ninja/fi/avustukset"
variants = ["none", "required", "all"]

[[pages]]
name_base = "Map"
url = "https://avustukset.dev.hel.ninja/fi/kartta"
headless = false
skip_network_idle = true
variants = ["required", ["essential", "statistics"]]
actions = [
  { type = "removeElement", selector = "#block-surveys" },
  { type = "scrollIntoView", selector = ".component__content.map" },
  { type = "waitForNetworkIdle", timeout = 5000 },
  { type = "refresh" },
]
"##;

    #[test]
    fn test_parse_site_config() {
        let site: SiteConfig = toml::from_str(SITE_TOML).expect("parse site config");
        assert_eq!(site.label(), "avustukset");
        assert_eq!(site.pages.len(), 2);

        let front = &site.pages[0];
        assert!(front.headless);
        assert_eq!(front.wait_for_network_idle_ms, 5000);
        assert_eq!(front.variants[0].bundle(), Some(Bundle::None));

        let map = &site.pages[1];
        assert!(!map.headless);
        assert_eq!(
            map.variants[1],
            Variant::Explicit(vec!["essential".to_string(), "statistics".to_string()])
        );
        assert_eq!(map.actions.len(), 4);
        assert_eq!(
            map.actions[2],
            ScanAction::WaitForNetworkIdle {
                timeout: Some(5000)
            }
        );
        assert_eq!(map.actions[3], ScanAction::Refresh);
        site.validate().expect("valid site config");
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(Variant::Named("all".to_string()).to_string(), "all");
        assert_eq!(
            Variant::Explicit(vec!["essential".to_string(), "chat".to_string()]).to_string(),
            "essential,chat"
        );
    }

    #[test]
    fn test_selected_pages_honours_only() {
        let mut site: SiteConfig = toml::from_str(SITE_TOML).expect("parse site config");
        assert_eq!(site.selected_pages().len(), 2);

        site.pages[1].only = true;
        let selected = site.selected_pages();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name_base, "Map");
    }

    #[test]
    fn test_validate_rejects_page_without_variants() {
        let mut site: SiteConfig = toml::from_str(SITE_TOML).expect("parse site config");
        site.pages[0].variants.clear();
        let err = site.validate().unwrap_err();
        assert!(err.to_string().contains("pages[0].variants"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut site: SiteConfig = toml::from_str(SITE_TOML).expect("parse site config");
        site.api_url = "not a url".to_string();
        assert!(site.validate().is_err());
    }

    #[test]
    fn test_unknown_bundle_name() {
        assert_eq!(Variant::Named("everything".to_string()).bundle(), None);
    }
}
