//! Variant expansion: page × consent variant → scan tasks.

use cookiescan_core::{
    Bundle, ConsentGroupSetting, ConsentHashes, CookieSpec, PageSpec, SameSite, ScanTask, Variant,
    CONSENT_COOKIE_NAME,
};
use tracing::{debug, error, warn};

/// Group lists behind the built-in variant names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantBundles {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub all: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, group_id: &str) {
    if !list.iter().any(|existing| existing == group_id) {
        list.push(group_id.to_string());
    }
}

impl VariantBundles {
    /// Partition policy groups by their `required` flag.
    #[must_use]
    pub fn from_settings(settings: &[ConsentGroupSetting]) -> Self {
        let mut bundles = Self::default();
        for setting in settings {
            if setting.required {
                push_unique(&mut bundles.required, &setting.group_id);
            } else {
                push_unique(&mut bundles.optional, &setting.group_id);
            }
            push_unique(&mut bundles.all, &setting.group_id);
        }
        bundles
    }

    #[must_use]
    pub fn resolve(&self, bundle: Bundle) -> &[String] {
        match bundle {
            Bundle::None => &[],
            Bundle::Required => self.required.as_slice(),
            Bundle::Optional => self.optional.as_slice(),
            Bundle::All => self.all.as_slice(),
        }
    }
}

/// Build the consent cookie granting `groups`.
///
/// Groups without a known hash are left out of the cookie.
#[must_use]
pub fn consent_cookie(hashes: &ConsentHashes, groups: &[String], domain: &str) -> CookieSpec {
    let mut granted = serde_json::Map::new();
    for group in groups {
        match hashes.group_hashes.get(group) {
            Some(hash) => {
                granted.insert(group.clone(), serde_json::Value::String(hash.clone()));
            }
            None => error!(group = %group, "group not found in group hashes"),
        }
    }

    let value = serde_json::json!({ "groups": granted });

    CookieSpec {
        name: CONSENT_COOKIE_NAME.to_string(),
        value: urlencoding::encode(&value.to_string()).into_owned(),
        domain: domain.to_string(),
        path: "/".to_string(),
        expires: hashes.expires,
        http_only: false,
        secure: false,
        same_site: SameSite::Strict,
    }
}

fn cookie_domain(hashes: &ConsentHashes, page_url: &str) -> String {
    if let Some(domain) = &hashes.domain {
        return domain.clone();
    }
    match url::Url::parse(page_url) {
        Ok(url) => url.host_str().unwrap_or_default().to_string(),
        Err(e) => {
            warn!(url = %page_url, error = %e, "cannot derive consent cookie domain");
            String::new()
        }
    }
}

/// Expand every page and variant into one scan task.
///
/// A named variant that is not a built-in bundle is scanned without any
/// consent cookie.
#[must_use]
pub fn expand_tasks(
    pages: &[PageSpec],
    hashes: &ConsentHashes,
    settings: &[ConsentGroupSetting],
) -> Vec<ScanTask> {
    let bundles = VariantBundles::from_settings(settings);
    let mut tasks = Vec::new();

    for page in pages {
        let domain = cookie_domain(hashes, &page.url);

        for variant in &page.variants {
            let (groups, cookies) = match variant {
                Variant::Named(name) => match variant.bundle() {
                    Some(bundle) => {
                        let groups = bundles.resolve(bundle).to_vec();
                        let cookie = consent_cookie(hashes, &groups, &domain);
                        (groups, vec![cookie])
                    }
                    None => {
                        warn!(
                            variant = %name,
                            page = %page.name_base,
                            "unknown variant bundle, scanning without consent cookie"
                        );
                        (Vec::new(), Vec::new())
                    }
                },
                Variant::Explicit(groups) => {
                    let cookie = consent_cookie(hashes, groups, &domain);
                    (groups.clone(), vec![cookie])
                }
            };

            tasks.push(ScanTask {
                name: format!("{} with {variant} accepted", page.name_base),
                url: page.url.clone(),
                cookies,
                groups,
                actions: page.actions.clone(),
                headless: page.headless,
                pause: page.pause,
                skip_network_idle: page.skip_network_idle,
                wait_for_network_idle_ms: page.wait_for_network_idle_ms,
            });
        }
    }

    debug!(count = tasks.len(), "expanded scan tasks");
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn group(id: &str, required: bool) -> ConsentGroupSetting {
        ConsentGroupSetting {
            group_id: id.to_string(),
            required,
            rules: vec![],
        }
    }

    fn settings() -> Vec<ConsentGroupSetting> {
        vec![
            group("essential", true),
            group("admin", true),
            group("statistics", false),
        ]
    }

    fn hashes() -> ConsentHashes {
        ConsentHashes {
            group_hashes: BTreeMap::from([
                ("essential".to_string(), "h1".to_string()),
                ("admin".to_string(), "h2".to_string()),
                ("statistics".to_string(), "h3".to_string()),
            ]),
            expires: 1_900_000_000.0,
            domain: None,
        }
    }

    fn page(variants: Vec<Variant>) -> PageSpec {
        PageSpec {
            only: false,
            name_base: "Frontpage".to_string(),
            url: "https://www.hel.fi/fi".to_string(),
            actions: vec![],
            variants,
            headless: true,
            pause: false,
            skip_network_idle: false,
            wait_for_network_idle_ms: 5000,
        }
    }

    fn decoded(cookie: &CookieSpec) -> serde_json::Value {
        serde_json::from_str(&urlencoding::decode(&cookie.value).unwrap()).unwrap()
    }

    #[test]
    fn test_bundles() {
        let bundles = VariantBundles::from_settings(&settings());
        assert_eq!(bundles.required, vec!["essential", "admin"]);
        assert_eq!(bundles.optional, vec!["statistics"]);
        assert_eq!(bundles.all, vec!["essential", "admin", "statistics"]);
        assert!(bundles.resolve(Bundle::None).is_empty());
    }

    #[test]
    fn test_bundles_are_rebuilt_per_call() {
        let first = VariantBundles::from_settings(&settings());
        let second = VariantBundles::from_settings(&settings());
        assert_eq!(first, second);
        assert_eq!(second.all.len(), 3);
    }

    #[test]
    fn test_duplicate_group_ids_are_collapsed() {
        let mut duplicated = settings();
        duplicated.push(group("essential", true));
        let bundles = VariantBundles::from_settings(&duplicated);
        assert_eq!(bundles.all, vec!["essential", "admin", "statistics"]);
    }

    #[test]
    fn test_none_and_required_give_two_tasks() {
        let pages = [page(vec![
            Variant::Named("none".to_string()),
            Variant::Named("required".to_string()),
        ])];
        let tasks = expand_tasks(&pages, &hashes(), &settings());

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "Frontpage with none accepted");
        assert!(tasks[0].groups.is_empty());
        assert_eq!(tasks[0].cookies.len(), 1);
        assert_eq!(decoded(&tasks[0].cookies[0]), serde_json::json!({ "groups": {} }));

        assert_eq!(tasks[1].groups, vec!["essential", "admin"]);
        assert_eq!(
            decoded(&tasks[1].cookies[0]),
            serde_json::json!({ "groups": { "essential": "h1", "admin": "h2" } })
        );
    }

    #[test]
    fn test_consent_cookie_attributes() {
        let tasks = expand_tasks(
            &[page(vec![Variant::Named("all".to_string())])],
            &hashes(),
            &settings(),
        );
        let cookie = &tasks[0].cookies[0];
        assert_eq!(cookie.name, "helfi-cookie-consents");
        assert_eq!(cookie.domain, "www.hel.fi");
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.same_site, SameSite::Strict);
        assert!(!cookie.http_only && !cookie.secure);
        assert!((cookie.expires - 1_900_000_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_harvested_domain_wins() {
        let mut hashes = hashes();
        hashes.domain = Some(".hel.fi".to_string());
        let pages = [page(vec![Variant::Named("all".to_string())])];
        let tasks = expand_tasks(&pages, &hashes, &settings());
        assert_eq!(tasks[0].cookies[0].domain, ".hel.fi");
    }

    #[test]
    fn test_unknown_bundle_has_no_cookie() {
        let tasks = expand_tasks(
            &[page(vec![Variant::Named("everything".to_string())])],
            &hashes(),
            &settings(),
        );
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].cookies.is_empty());
        assert!(tasks[0].groups.is_empty());
        assert_eq!(tasks[0].name, "Frontpage with everything accepted");
    }

    #[test]
    fn test_explicit_variant_skips_unknown_hashes() {
        let explicit = Variant::Explicit(vec!["statistics".to_string(), "marketing".to_string()]);
        let tasks = expand_tasks(&[page(vec![explicit])], &hashes(), &settings());

        assert_eq!(tasks[0].name, "Frontpage with statistics,marketing accepted");
        assert_eq!(tasks[0].groups, vec!["statistics", "marketing"]);
        assert_eq!(
            decoded(&tasks[0].cookies[0]),
            serde_json::json!({ "groups": { "statistics": "h3" } })
        );
    }
}
