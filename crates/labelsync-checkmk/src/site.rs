//! Local site discovery
//!
//! When running as a site user, the API URL and the automation secret can be
//! read from the site's own files under `$OMD_ROOT`:
//!
//! - `etc/apache/listen-port.conf`: `Listen <addr>:<port>` of the site apache
//! - `var/check_mk/web/<user>/automation.secret`: the user's secret

use labelsync_core::{Error, Result};
use std::path::{Path, PathBuf};

/// REST API version used for derived URLs
pub const API_VERSION: &str = "1.0";

/// Path of the automation secret file for `username`
pub fn secret_path(omd_root: &Path, username: &str) -> PathBuf {
    omd_root
        .join("var/check_mk/web")
        .join(username)
        .join("automation.secret")
}

/// Read the automation secret of `username` from the site
///
/// A missing or empty secret file is an authentication failure: there is
/// no credential to present.
pub fn resolve_secret(omd_root: &Path, username: &str) -> Result<String> {
    let path = secret_path(omd_root, username);
    let secret = match std::fs::read_to_string(&path) {
        Ok(content) => content.trim().to_string(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::auth(format!(
                "No automation secret for user '{}' ({} does not exist)",
                username,
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if secret.is_empty() {
        return Err(Error::auth(format!(
            "Automation secret file {} is empty",
            path.display()
        )));
    }

    tracing::debug!("Read automation secret for user '{}' from site", username);
    Ok(secret)
}

/// Derive the REST API URL of the local site
///
/// Uses the last `Listen` directive of the site's apache configuration:
/// `http://<listen>/<site>/check_mk/api/1.0`.
pub fn resolve_site_url(omd_root: &Path, site: &str) -> Result<String> {
    let path = omd_root.join("etc/apache/listen-port.conf");
    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::config(format!("Cannot read {}: {}", path.display(), e))
    })?;

    let listen = content
        .lines()
        .filter(|line| line.starts_with("Listen"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .last()
        .ok_or_else(|| Error::config(format!("No Listen directive in {}", path.display())))?;

    Ok(format!("http://{}/{}/check_mk/api/{}", listen, site, API_VERSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_and_trims_secret() {
        let root = tempfile::tempdir().unwrap();
        let path = secret_path(root.path(), "automation");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "s3cr3t\n").unwrap();

        assert_eq!(resolve_secret(root.path(), "automation").unwrap(), "s3cr3t");
    }

    #[test]
    fn missing_secret_is_auth_error() {
        let root = tempfile::tempdir().unwrap();
        let err = resolve_secret(root.path(), "automation").unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn empty_secret_is_auth_error() {
        let root = tempfile::tempdir().unwrap();
        let path = secret_path(root.path(), "bot");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "  \n").unwrap();

        assert!(matches!(
            resolve_secret(root.path(), "bot"),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn derives_url_from_listen_directive() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("etc/apache")).unwrap();
        fs::write(
            root.path().join("etc/apache/listen-port.conf"),
            "# Port of the site apache\nServerName 127.0.0.1:5000\nListen 127.0.0.1:5000\n",
        )
        .unwrap();

        assert_eq!(
            resolve_site_url(root.path(), "mysite").unwrap(),
            "http://127.0.0.1:5000/mysite/check_mk/api/1.0"
        );
    }

    #[test]
    fn missing_listen_directive_is_config_error() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("etc/apache")).unwrap();
        fs::write(root.path().join("etc/apache/listen-port.conf"), "# empty\n").unwrap();

        assert!(matches!(
            resolve_site_url(root.path(), "mysite"),
            Err(Error::Config(_))
        ));
    }
}
