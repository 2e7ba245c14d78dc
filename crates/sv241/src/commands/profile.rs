//! Profile subcommand handlers. Only the local config file is touched.

use serde::Serialize;
use tabled::Tabled;

use sv241_config::{self as config, Config, Profile};

use crate::cli::{GlobalOpts, ProfileArgs, ProfileCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Proxy")]
    proxy: String,
}

fn rows(cfg: &Config) -> Vec<ProfileRow> {
    let default = cfg.default_profile.as_deref();
    cfg.profiles
        .iter()
        .map(|(name, profile)| ProfileRow {
            marker: if Some(name.as_str()) == default { "*" } else { "" },
            name: name.clone(),
            proxy: profile.proxy.clone(),
        })
        .collect()
}

pub fn handle(args: ProfileArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ProfileCommand::List => {
            let cfg = config::load_config()?;
            let rows = rows(&cfg);
            if rows.is_empty() {
                util::notice(
                    "No profiles configured. Add one with: sv241 profile add <name> --url <proxy url>",
                    global.quiet,
                );
                return Ok(());
            }
            let out = output::render_single(global.output_format(), &rows, |rows| {
                output::render_table(rows)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ProfileCommand::Add { name, url } => {
            config::parse_proxy_url(&url)?;
            let mut cfg = config::load_config()?;
            let first = cfg.profiles.is_empty();
            cfg.profiles.insert(
                name.clone(),
                Profile {
                    proxy: url,
                    ..Profile::default()
                },
            );
            if first {
                cfg.default_profile = Some(name.clone());
            }
            let path = config::save_config(&cfg)?;
            util::notice(
                &format!("Saved profile '{name}' to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }

        ProfileCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            util::notice(&format!("Default profile set to '{name}'"), global.quiet);
            Ok(())
        }

        ProfileCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), false);
            Ok(())
        }
    }
}
