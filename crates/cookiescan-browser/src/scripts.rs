//! JavaScript evaluated inside frames.
//!
//! Every storage script resolves to a JSON array of `{ key, value }` objects.
//! IndexedDB and Cache API scripts only count items, values are never read.

/// localStorage entries in index order.
pub const LOCAL_STORAGE: &str = r"(() => {
  const data = [];
  for (let i = 0; i < window.localStorage.length; i++) {
    const key = window.localStorage.key(i);
    data.push({ key, value: String(window.localStorage.getItem(key)) });
  }
  return data;
})()";

/// sessionStorage entries in index order.
pub const SESSION_STORAGE: &str = r"(() => {
  const data = [];
  for (let i = 0; i < window.sessionStorage.length; i++) {
    const key = window.sessionStorage.key(i);
    data.push({ key, value: String(window.sessionStorage.getItem(key)) });
  }
  return data;
})()";

/// One `{ key: "<db>/<store>", value: "<n> items" }` per object store.
pub const INDEXED_DB: &str = r"(async () => {
  const entries = [];
  const dbs = await indexedDB.databases();
  for (const dbInfo of dbs) {
    const db = await new Promise((resolve) => {
      const request = indexedDB.open(dbInfo.name);
      request.onsuccess = () => resolve(request.result);
      request.onerror = () => resolve(null);
    });
    if (!db) continue;
    for (let i = 0; i < db.objectStoreNames.length; i++) {
      const storeName = db.objectStoreNames[i];
      const store = db.transaction(storeName, 'readonly').objectStore(storeName);
      const count = await new Promise((resolve) => {
        const countRequest = store.count();
        countRequest.onsuccess = () => resolve(countRequest.result);
        countRequest.onerror = () => resolve(0);
      });
      entries.push({ key: `${dbInfo.name}/${storeName}`, value: `${count} items` });
    }
    db.close();
  }
  return entries;
})()";

/// One `{ key: cacheName, value: "<n> items" }` per cache.
pub const CACHE_STORAGE: &str = r"(async () => {
  const entries = [];
  for (const name of await caches.keys()) {
    const cache = await caches.open(name);
    const requests = await cache.keys();
    entries.push({ key: name, value: `${requests.length} items` });
  }
  return entries;
})()";

/// `true` once the consent widget API is available.
pub const CONSENT_WIDGET_READY: &str =
    "Boolean(window.hds && window.hds.cookieConsent)";

/// Press "accept all" inside the consent banner's shadow root.
pub const ACCEPT_ALL_CONSENT: &str = r"(() => {
  const target = document.querySelector('.hds-cc__target');
  const button = target && target.shadowRoot
    ? target.shadowRoot.querySelector('.hds-cc__all-cookies-button')
    : null;
  if (!button) return false;
  button.click();
  return true;
})()";

/// Expression removing the first element matching `selector`.
///
/// Resolves to `true` if an element was removed.
#[must_use]
pub fn remove_element(selector: &str) -> String {
    let selector = serde_json::Value::String(selector.to_string());
    format!(
        "(() => {{ const el = document.querySelector({selector}); if (!el) return false; el.remove(); return true; }})()"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_element_escapes_selector() {
        let script = remove_element(r#"button[title="Close"]"#);
        assert!(script.contains(r#"document.querySelector("button[title=\"Close\"]")"#));
    }

    #[test]
    fn test_storage_scripts_are_expressions() {
        for script in [LOCAL_STORAGE, SESSION_STORAGE, INDEXED_DB, CACHE_STORAGE] {
            assert!(script.starts_with('('));
            assert!(script.ends_with("()"));
        }
    }
}
