//! Datacenter configuration for arc
//!
//! A datacenter is described by one `<datacenter>.kdl` document. This crate
//! finds that document, parses it into [`Config`] and validates the
//! cross references before anything is built from it.

pub mod error;
pub mod model;
pub mod parser;
mod validate;

pub use error::*;
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
pub use validate::validate;

use std::path::{Path, PathBuf};

/// Find `<datacenter>.kdl`
///
/// Search order:
/// 1. `ARC_CONFIG_PATH` (direct path)
/// 2. `ARC_CONFIG_DIR`
/// 3. the current directory
/// 4. `./.arc/`
/// 5. `~/.config/arc/`
pub fn find_config(datacenter: &str) -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("ARC_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let filename = format!("{}.kdl", datacenter);

    if let Ok(dir) = std::env::var("ARC_CONFIG_DIR") {
        let path = Path::new(&dir).join(&filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    let path = current_dir.join(&filename);
    if path.exists() {
        return Ok(path);
    }

    let arc_dir = current_dir.join(".arc");
    if arc_dir.is_dir() {
        let path = arc_dir.join(&filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("arc").join(&filename);
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::NotFound(datacenter.to_string()))
}

/// Find, parse and validate the configuration of a datacenter
pub fn load(datacenter: &str) -> Result<Config> {
    let path = find_config(datacenter)?;
    tracing::debug!(path = %path.display(), datacenter, "loading configuration");
    load_from(&path, datacenter)
}

/// Parse and validate a configuration file at a known path
pub fn load_from(path: &Path, datacenter: &str) -> Result<Config> {
    let config = parse_kdl_file(path, datacenter)?;
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const MINIMAL: &str = r#"
datacenter "dev" {
    provider "mock"
    network {
        cidr "10.0.0.0/16"
        availability-zones "az1"
        subnet-group "private" { cidr "10.0.1.0/24" }
    }
    compute { keypair "id_ed25519" }
}
"#;

    fn clear_env() {
        unsafe {
            std::env::remove_var("ARC_CONFIG_PATH");
            std::env::remove_var("ARC_CONFIG_DIR");
        }
    }

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("dev.kdl"), MINIMAL).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config("dev");
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("dev.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_config_in_arc_dir() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let arc_dir = temp_dir.path().join(".arc");
        fs::create_dir(&arc_dir).unwrap();
        fs::write(arc_dir.join("dev.kdl"), MINIMAL).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config("dev");
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".arc/dev.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_config_env_dir() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stage.kdl"), MINIMAL).unwrap();

        unsafe {
            std::env::set_var("ARC_CONFIG_DIR", temp_dir.path());
        }
        let result = find_config("stage");
        clear_env();

        assert_eq!(result.unwrap(), temp_dir.path().join("stage.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_config_env_path_wins() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let direct = temp_dir.path().join("anything.kdl");
        fs::write(&direct, MINIMAL).unwrap();
        fs::write(temp_dir.path().join("dev.kdl"), MINIMAL).unwrap();

        unsafe {
            std::env::set_var("ARC_CONFIG_PATH", &direct);
            std::env::set_var("ARC_CONFIG_DIR", temp_dir.path());
        }
        let result = find_config("dev");
        clear_env();

        assert_eq!(result.unwrap(), direct);
    }

    #[test]
    #[serial]
    fn test_find_config_not_found() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config("no-such-datacenter-anywhere");
        std::env::set_current_dir(original_dir).unwrap();

        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    #[serial]
    fn test_load_validates() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("dev.kdl");
        fs::write(&path, MINIMAL).unwrap();

        let config = load_from(&path, "dev").unwrap();
        assert_eq!(config.name, "dev");
        assert_eq!(config.datacenter.compute.keypair, "id_ed25519");

        let broken = MINIMAL.replace(
            "compute { keypair \"id_ed25519\" }",
            "compute { keypair \"id_ed25519\"; cluster \"c\" { pod \"p\" { subnet-group \"nope\" } } }",
        );
        fs::write(&path, broken).unwrap();
        assert!(matches!(
            load_from(&path, "dev"),
            Err(ConfigError::Unknown { kind: "subnet-group", .. })
        ));
    }
}
