use std::path::{Path, PathBuf};

/// Process environment the core reads
#[derive(Debug, Clone, Default)]
pub struct Env {
    /// `SSH_USER`, falling back to `USER`
    pub user: String,

    pub ssh_auth_sock: String,

    /// `ARC`: local staging directory
    pub arc_dir: PathBuf,

    /// `ROOT`: prefix of the script tree
    pub root: PathBuf,

    pub version: String,
}

impl Env {
    /// `<root>/usr/lib/arc`; an empty root is `/`
    pub fn lib_dir(&self) -> PathBuf {
        let root = if self.root.as_os_str().is_empty() {
            Path::new("/")
        } else {
            self.root.as_path()
        };
        root.join("usr/lib/arc")
    }

    /// Path of a bundled script
    pub fn script(&self, dir: &str, name: &str) -> PathBuf {
        self.lib_dir().join(dir).join(name)
    }

    /// Path of a file in the staging directory
    pub fn staged(&self, name: &str) -> PathBuf {
        self.arc_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_paths() {
        let env = Env {
            root: PathBuf::from("/opt/root"),
            arc_dir: PathBuf::from("/home/alice/.arc"),
            ..Default::default()
        };
        assert_eq!(
            env.script("create", "set_hostname.sh"),
            PathBuf::from("/opt/root/usr/lib/arc/create/set_hostname.sh")
        );
        assert_eq!(
            env.staged("packages-1.0.txt"),
            PathBuf::from("/home/alice/.arc/packages-1.0.txt")
        );

        let env = Env::default();
        assert_eq!(
            env.lib_dir().join("arc.sh"),
            PathBuf::from("/usr/lib/arc/arc.sh")
        );
    }
}
