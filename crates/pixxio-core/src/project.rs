use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

pub const PROJECT_DIR: &str = ".pixxio";
pub const CONFIG_FILE: &str = "config.yaml";

const CONFIG_TEMPLATE: &str = "\
# pixx.io asset source options
apiEndpointUri: https://your-company.pixxio.media/cgi-bin/api/pixxio-api.pl
apiKey: your-api-key
# sharedRefreshToken: token-used-when-an-account-has-none
# apiDialect: v1
# mediaTypes:
#   image/jpeg:
#     usePixxioThumbnailAsOriginal: false
# autoTagging:
#   enable: false
#   inUseTag: used-by-neos
";

pub fn project_dir(base_path: &Path) -> PathBuf {
    base_path.join(PROJECT_DIR)
}

/// Creates the `.pixxio` directory with an empty secrets store and a config
/// template. Existing files are left untouched.
pub fn initialize_project(base_path: &Path) -> std::io::Result<()> {
    let pixxio_dir = project_dir(base_path);
    fs::create_dir_all(&pixxio_dir)?;

    let secrets_path = pixxio_dir.join(crate::secrets::SECRETS_FILE);
    if !secrets_path.exists() {
        fs::write(secrets_path, "{}")?;
    }

    let config_path = pixxio_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        fs::write(config_path, CONFIG_TEMPLATE)?;
    }

    Ok(())
}

pub fn verify_project_initialized(base_path: &Path) -> std::io::Result<()> {
    let pixxio_dir = project_dir(base_path);
    if !pixxio_dir.is_dir() {
        return Err(Error::new(
            ErrorKind::NotFound,
            "Project not initialized. Please run `pixxio init` first.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetSourceOptions;
    use tempfile::tempdir;

    #[test]
    fn test_initialize_project_creates_directory_and_files() {
        let dir = tempdir().unwrap();
        let base_path = dir.path();

        assert!(verify_project_initialized(base_path).is_err());
        initialize_project(base_path).unwrap();
        verify_project_initialized(base_path).unwrap();

        let secrets = fs::read_to_string(base_path.join(".pixxio/secrets.json")).unwrap();
        assert_eq!(secrets, "{}");
        let options = AssetSourceOptions::load(&base_path.join(".pixxio/config.yaml")).unwrap();
        assert_eq!(options.api_key(), "your-api-key");
    }

    #[test]
    fn test_initialize_project_keeps_existing_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".pixxio/config.yaml");
        fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        fs::write(&config_path, "apiKey: mine\n").unwrap();

        initialize_project(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "apiKey: mine\n");
    }
}
