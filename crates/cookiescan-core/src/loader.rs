//! Site configuration loading from a directory of TOML files.

use crate::error::{ConfigError, ConfigResult};
use crate::site::SiteConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loader for site configs, one `*.toml` file per site.
pub struct SiteConfigLoader {
    /// Directory containing site configs
    sites_dir: PathBuf,
}

impl SiteConfigLoader {
    /// Create a new loader for the given directory.
    ///
    /// # Errors
    /// Returns error if the path doesn't exist or isn't a directory.
    pub fn new(sites_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let sites_dir = sites_dir.into();

        if !sites_dir.is_dir() {
            return Err(ConfigError::DirectoryNotFound {
                path: sites_dir.display().to_string(),
            });
        }

        Ok(Self { sites_dir })
    }

    /// Load every valid site config, ordered by file path.
    ///
    /// Files that fail to parse or validate are logged and skipped.
    pub fn load_all(&self) -> ConfigResult<Vec<(PathBuf, SiteConfig)>> {
        let mut paths = Vec::new();
        Self::collect_paths(&self.sites_dir, &mut paths)?;
        paths.sort();

        let mut sites = Vec::new();
        for path in paths {
            match Self::load_from_path(&path) {
                Ok(site) => {
                    debug!(path = %path.display(), site = %site.label(), "loaded site config");
                    sites.push((path, site));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping invalid site config");
                }
            }
        }

        info!(
            count = sites.len(),
            dir = %self.sites_dir.display(),
            "loaded site configs"
        );

        Ok(sites)
    }

    fn collect_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> ConfigResult<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect_paths(&path, paths)?;
            } else if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                paths.push(path);
            }
        }
        Ok(())
    }

    /// Parse and validate a single site config file.
    pub fn load_from_path(path: &Path) -> ConfigResult<SiteConfig> {
        let contents = std::fs::read_to_string(path)?;
        let site: SiteConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::SiteParseError {
                path: path.display().to_string(),
                source: e,
            })?;
        site.validate()?;
        Ok(site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VALID: &str = r#"
main_url = "https://www.hel.fi/fi/"
api_url = "https://www.hel.fi/en/api/cookie-banner"
settings_domain_substitution = "https://www.hel.fi/fi/"

[[pages]]
name_base = "Frontpage"
url = "https://www.hel.fi/fi/"
variants = ["none", "required", "all"]
"#;

    #[test]
    fn test_missing_directory() {
        let result = SiteConfigLoader::new("/nonexistent/cookiescan/sites");
        assert!(matches!(result, Err(ConfigError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_load_all_sorted_and_skips_invalid() {
        let tmp = TempDir::new().expect("create temp dir");
        fs::write(tmp.path().join("b-core.toml"), VALID).expect("write");
        fs::write(tmp.path().join("a-broken.toml"), "main_url = ").expect("write");
        fs::create_dir(tmp.path().join("nested")).expect("mkdir");
        fs::write(tmp.path().join("nested/c-site.toml"), VALID).expect("write");
        fs::write(tmp.path().join("notes.txt"), "ignored").expect("write");

        let loader = SiteConfigLoader::new(tmp.path()).expect("create loader");
        let sites = loader.load_all().expect("load sites");

        assert_eq!(sites.len(), 2);
        assert!(sites[0].0.ends_with("b-core.toml"));
        assert!(sites[1].0.ends_with("nested/c-site.toml"));
        assert_eq!(sites[0].1.pages.len(), 1);
    }

    #[test]
    fn test_load_from_path_reports_parse_error() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "pages = 3").expect("write");
        let err = SiteConfigLoader::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::SiteParseError { .. }));
    }
}
