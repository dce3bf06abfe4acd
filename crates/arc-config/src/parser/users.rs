//! users and teams node parsing

use super::{children, first_u32, flag, name_of, prop, strings};
use crate::error::{ConfigError, Result};
use crate::model::{Group, Team, User};
use kdl::KdlNode;

/// Numeric id from `uid=N` or a `uid N` child
fn id_of(node: &KdlNode, key: &str) -> Option<u32> {
    prop(node, key)
        .and_then(|v| v.as_integer())
        .and_then(|i| u32::try_from(i).ok())
        .or_else(|| {
            children(node)
                .iter()
                .find(|c| c.name().value() == key)
                .and_then(first_u32)
        })
}

pub(super) fn parse_users(node: &KdlNode) -> Result<(Vec<User>, Vec<Group>)> {
    let mut users = Vec::new();
    let mut groups = Vec::new();

    for child in children(node) {
        match child.name().value() {
            "group" => {
                let name = name_of(child, "group")?;
                let gid = id_of(child, "gid")
                    .ok_or_else(|| ConfigError::Missing(format!("gid of group '{}'", name)))?;
                groups.push(Group { name, gid });
            }
            "user" => users.push(parse_user(child)?),
            _ => {}
        }
    }

    Ok((users, groups))
}

fn parse_user(node: &KdlNode) -> Result<User> {
    let name = name_of(node, "user")?;
    let uid =
        id_of(node, "uid").ok_or_else(|| ConfigError::Missing(format!("uid of user '{}'", name)))?;
    let mut user = User {
        name,
        uid,
        ..Default::default()
    };

    for child in children(node) {
        match child.name().value() {
            "groups" => user.groups = strings(child),
            "sudo" => user.sudo = flag(child),
            "key" | "keys" => user.keys.extend(strings(child)),
            "removed" => user.removed = flag(child),
            _ => {}
        }
    }

    Ok(user)
}

pub(super) fn parse_teams(node: &KdlNode) -> Result<Vec<Team>> {
    let mut teams = Vec::new();

    for child in children(node) {
        if child.name().value() != "team" {
            continue;
        }
        let mut team = Team {
            name: name_of(child, "team")?,
            ..Default::default()
        };
        for member in children(child) {
            match member.name().value() {
                "users" => team.users = strings(member),
                "groups" => team.groups = strings(member),
                _ => {}
            }
        }
        teams.push(team);
    }

    Ok(teams)
}
