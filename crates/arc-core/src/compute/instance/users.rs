//! Accounts of the teams a pod serves

use crate::env::Env;
use crate::error::{CoreError, Result};
use crate::ssh::Batch;
use arc_config::Config;

/// Users and groups of `teams`, each once, in team order
pub fn expand<'a>(config: &'a Config, teams: &[String]) -> Result<(Vec<&'a str>, Vec<&'a str>)> {
    let mut users: Vec<&str> = Vec::new();
    let mut groups: Vec<&str> = Vec::new();
    for name in teams {
        let team = config
            .team(name)
            .ok_or_else(|| CoreError::Config(format!("unknown team '{}'", name)))?;
        for user in &team.users {
            if !users.contains(&user.as_str()) {
                users.push(user);
            }
        }
        for group in &team.groups {
            if !groups.contains(&group.as_str()) {
                groups.push(group);
            }
        }
    }
    Ok((users, groups))
}

/// Append the account steps to `batch`, writing key files to the staging
/// directory on the way
pub async fn configure(
    batch: &mut Batch,
    env: &Env,
    config: &Config,
    teams: &[String],
) -> Result<()> {
    let (users, groups) = expand(config, teams)?;

    for name in groups {
        let group = config
            .group(name)
            .ok_or_else(|| CoreError::Config(format!("unknown group '{}'", name)))?;
        batch.script(
            "users",
            "setup_group.sh",
            &[name.to_string(), group.gid.to_string()],
        );
    }

    for name in users {
        let user = config
            .user(name)
            .ok_or_else(|| CoreError::Config(format!("unknown user '{}'", name)))?;

        if user.removed {
            batch.script("users", "setup_user.sh", &[name, "remove"]);
            batch.script("users", "setup_sudo.sh", &[name, "remove"]);
            continue;
        }

        batch.script("users", "setup_user.sh", &[name.to_string(), user.uid.to_string()]);
        if !user.groups.is_empty() {
            batch.script(
                "users",
                "add_user_to_groups.sh",
                &[name.to_string(), user.groups.join(",")],
            );
        }

        let keys = env.staged(&format!("authorized_keys.{}", name));
        if let Some(dir) = keys.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut content = user.keys.join("\n");
        content.push('\n');
        tokio::fs::write(&keys, content).await?;
        tracing::debug!(user = name, path = %keys.display(), "wrote authorized keys");

        batch.copy(keys, format!("/tmp/authorized_keys.{}", name));
        batch.script("users", "setup_ssh.sh", &[name]);
        if user.sudo {
            batch.script("users", "setup_sudo.sh", &[name]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::Step;
    use arc_config::{Group, Team, User};
    use std::path::PathBuf;

    fn config() -> Config {
        Config {
            users: vec![
                User {
                    name: "alice".to_string(),
                    uid: 6001,
                    groups: vec!["ops".to_string()],
                    sudo: true,
                    keys: vec!["ssh-ed25519 AAAA alice".to_string()],
                    removed: false,
                },
                User {
                    name: "bob".to_string(),
                    uid: 6002,
                    removed: true,
                    ..Default::default()
                },
            ],
            groups: vec![Group {
                name: "ops".to_string(),
                gid: 5000,
            }],
            teams: vec![
                Team {
                    name: "ops".to_string(),
                    users: vec!["alice".to_string(), "bob".to_string()],
                    groups: vec!["ops".to_string()],
                },
                Team {
                    name: "oncall".to_string(),
                    users: vec!["alice".to_string()],
                    groups: vec![],
                },
            ],
            ..Default::default()
        }
    }

    fn sudo_steps(batch: &Batch) -> Vec<String> {
        batch
            .steps()
            .iter()
            .filter_map(|s| match s {
                Step::Sudo(command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_expand_dedups_across_teams() {
        let config = config();
        let (users, groups) =
            expand(&config, &["ops".to_string(), "oncall".to_string()]).unwrap();
        assert_eq!(users, vec!["alice", "bob"]);
        assert_eq!(groups, vec!["ops"]);
        assert!(matches!(
            expand(&config, &["nobody".to_string()]),
            Err(CoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_configure_steps_and_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = Env {
            arc_dir: dir.path().join("arc"),
            root: PathBuf::from("/opt"),
            ..Default::default()
        };
        let mut batch = Batch::new(&env);

        configure(&mut batch, &env, &config(), &["ops".to_string()])
            .await
            .unwrap();

        assert_eq!(
            sudo_steps(&batch),
            vec![
                "/tmp/setup_group.sh ops 5000",
                "/tmp/setup_user.sh alice 6001",
                "/tmp/add_user_to_groups.sh alice ops",
                "/tmp/setup_ssh.sh alice",
                "/tmp/setup_sudo.sh alice",
                "/tmp/setup_user.sh bob remove",
                "/tmp/setup_sudo.sh bob remove",
            ]
        );
        let keys = std::fs::read_to_string(dir.path().join("arc/authorized_keys.alice")).unwrap();
        assert_eq!(keys, "ssh-ed25519 AAAA alice\n");
        assert!(batch.steps().contains(&Step::Copy {
            local: dir.path().join("arc/authorized_keys.alice"),
            remote: "/tmp/authorized_keys.alice".to_string(),
        }));
    }
}
