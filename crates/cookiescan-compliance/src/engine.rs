//! Compliance engine: matches a harvested inventory against consent policy.

use crate::error::Result;
use crate::expiration::cookie_expiration_text;
use crate::pattern::{compile, rewrite_url, Matcher, PatternKind};
use cookiescan_core::{
    ComplianceData, ConsentGroupSetting, FlatItemRule, InventoryItem, MatchedRule, StorageItem,
    StorageKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Flat verdict row for one storage item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundItem {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    pub item_id: String,
    pub item: StorageItem,
    pub groups: Vec<String>,
    /// Scan task name
    pub name: String,
    pub url: String,
    pub frame_url: String,
    pub compliant: bool,
    pub compliance_data: ComplianceData,
}

impl FoundItem {
    /// Compliant, but every declaring rule disagrees on host or lifetime.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.compliant
            && self
                .compliance_data
                .matching_settings
                .iter()
                .all(|rule| !rule.host_matches || !rule.expires_matches)
    }
}

/// Output of [`check_compliance`].
#[derive(Debug, Clone, Default)]
pub struct ComplianceOutcome {
    /// One row per storage item, in inventory order
    pub found_items: Vec<FoundItem>,
    /// Policy rules with their declaring group
    pub site_settings_flat: Vec<FlatItemRule>,
}

impl ComplianceOutcome {
    #[must_use]
    pub fn compliant_count(&self) -> usize {
        self.found_items.iter().filter(|item| item.compliant).count()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.found_items.iter().filter(|item| item.is_warning()).count()
    }
}

struct CompiledRule<'a> {
    setting: &'a FlatItemRule,
    name: Matcher,
    host: Matcher,
}

/// Item identity and lifetime needed to match one storage item.
struct Candidate<'a> {
    kind: StorageKind,
    item_id: &'a str,
    /// `Some` for cookies
    expiration_text: Option<&'a str>,
}

fn evaluate(
    rules: &[CompiledRule<'_>],
    candidate: &Candidate<'_>,
    page_url: &str,
) -> ComplianceData {
    let matching_settings: Vec<MatchedRule> = rules
        .iter()
        .filter(|rule| {
            rule.setting.rule.storage_type == candidate.kind
                && rule.name.is_match(candidate.item_id)
        })
        .map(|rule| {
            let expiration = rule.setting.rule.expiration.as_str();
            let expires_matches = match candidate.expiration_text {
                Some(text) => text == expiration,
                None => expiration == "-",
            };
            MatchedRule {
                setting: rule.setting.clone(),
                host_matches: rule.host.is_match(page_url),
                expires_matches,
            }
        })
        .collect();

    ComplianceData {
        compliant: !matching_settings.is_empty(),
        matching_settings,
    }
}

/// Annotate `inventory` with verdicts and return the flat verdict list.
///
/// Every cookie gets its `expiration_text`, every item its `compliance`, every
/// frame `compliant` and every inventory item `all_compliant`. Host patterns
/// are matched against the task's page URL after rewriting `main_url` to
/// `settings_domain_substitution`. `settings` is only read.
pub fn check_compliance(
    settings: &[ConsentGroupSetting],
    inventory: &mut [InventoryItem],
    main_url: &str,
    settings_domain_substitution: &str,
) -> Result<ComplianceOutcome> {
    let site_settings_flat = ConsentGroupSetting::flatten(settings);
    let rules = site_settings_flat
        .iter()
        .map(|setting| {
            Ok(CompiledRule {
                setting,
                name: compile(&setting.rule.name, PatternKind::Name)?,
                host: compile(&setting.rule.host, PatternKind::Host)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut found_items = Vec::new();

    for inventory_item in inventory.iter_mut() {
        let page_url = rewrite_url(&inventory_item.url, main_url, settings_domain_substitution);
        let mut all_compliant = true;

        for frame in &mut inventory_item.frames {
            let mut frame_compliant = true;
            let frame_url = frame.frame_url.clone();

            let mut record = |kind: StorageKind, item: StorageItem, data: &ComplianceData| {
                if !data.compliant {
                    frame_compliant = false;
                }
                found_items.push(FoundItem {
                    kind,
                    item_id: item.item_id().to_string(),
                    item,
                    groups: inventory_item.groups.clone(),
                    name: inventory_item.name.clone(),
                    url: inventory_item.url.clone(),
                    frame_url: frame_url.clone(),
                    compliant: data.compliant,
                    compliance_data: data.clone(),
                });
            };

            for cookie in frame.cookies.iter_mut().flatten() {
                let text = cookie_expiration_text(cookie.frame_timestamp, cookie.expires);
                let data = evaluate(
                    &rules,
                    &Candidate {
                        kind: StorageKind::Cookie,
                        item_id: &cookie.name,
                        expiration_text: Some(text.as_str()),
                    },
                    &page_url,
                );
                cookie.expiration_text = Some(text);
                cookie.compliance = Some(data.clone());
                record(StorageKind::Cookie, StorageItem::Cookie(cookie.clone()), &data);
            }

            for kind in StorageKind::ALL {
                let Some(entries) = frame.entries_mut(kind) else {
                    continue;
                };
                for entry in entries.iter_mut() {
                    let data = evaluate(
                        &rules,
                        &Candidate {
                            kind,
                            item_id: &entry.key,
                            expiration_text: None,
                        },
                        &page_url,
                    );
                    entry.compliance = Some(data.clone());
                    record(kind, StorageItem::Entry(entry.clone()), &data);
                }
            }

            frame.compliant = Some(frame_compliant);
            all_compliant &= frame_compliant;
        }

        debug!(task = %inventory_item.name, compliant = all_compliant, "inventory item checked");
        inventory_item.all_compliant = Some(all_compliant);
    }

    Ok(ComplianceOutcome {
        found_items,
        site_settings_flat,
    })
}
