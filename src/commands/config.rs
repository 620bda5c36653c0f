//! `config`: inspect and edit the stored gitflow settings.

use color_print::cformat;

use crate::errors::FlowError;
use crate::git::Repository;
use crate::styling::{hint_message, println, success_message};

/// What the config verb should do.
#[derive(Debug, Clone)]
pub enum ConfigAction {
    List,
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
}

/// Keys are addressed relative to the `gitflow.` namespace; a fully
/// qualified key is accepted as-is.
fn qualify(key: &str) -> String {
    if key.starts_with("gitflow.") {
        key.to_string()
    } else {
        format!("gitflow.{key}")
    }
}

pub fn handle_config(repo: &Repository, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::List => {
            let entries = repo.config_entries("gitflow.")?;
            if entries.is_empty() {
                println!("{}", hint_message("No gitflow configuration set"));
                return Ok(());
            }
            for (key, value) in entries {
                println!("{}", cformat!("<bold>{key}</> = {value}"));
            }
            Ok(())
        }
        ConfigAction::Get { key } => {
            let key = qualify(&key);
            match repo.config_get(&key)? {
                Some(value) => {
                    println!("{value}");
                    Ok(())
                }
                None => {
                    Err(FlowError::invalid_input(format!("Config key {key:?} is not set")).into())
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let key = qualify(&key);
            repo.config_set(&key, &value)?;
            println!(
                "{}",
                success_message(cformat!("Set <bold>{key}</> = {value}"))
            );
            Ok(())
        }
        ConfigAction::Unset { key } => {
            let key = qualify(&key);
            if repo.config_unset(&key)? {
                println!("{}", success_message(cformat!("Unset <bold>{key}</>")));
            } else {
                println!("{}", hint_message(format!("Config key {key:?} was not set")));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("feature.finish.notag"), "gitflow.feature.finish.notag");
        assert_eq!(qualify("gitflow.origin"), "gitflow.origin");
    }
}
