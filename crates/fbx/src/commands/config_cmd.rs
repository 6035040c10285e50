//! Config subcommand handlers.

use fbx_api::CredentialStore;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::util;
use crate::config::{self, Config, KeyringStore, Profile};
use crate::error::CliError;

/// Format config for display. Profiles carry no secrets (credentials
/// live in the keyring), so nothing needs masking.
fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "app_id = \"{}\"", p.app_id);
        let _ = writeln!(out, "app_name = \"{}\"", p.app_name);
        if let Some(ref device) = p.device_name {
            let _ = writeln!(out, "device_name = \"{device}\"");
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init {
            host,
            device_name,
            insecure,
        } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = global.profile.clone().unwrap_or_else(|| "default".into());

            let mut profile = config::blank_profile();
            profile.host = host;
            profile.device_name = device_name;
            profile.insecure = insecure.then_some(true);

            // Catch bad URLs at init time, not on first use
            profile.root_url()?;

            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg.default_profile.is_none() {
                cfg.default_profile = Some(profile_name.clone());
            }
            config::save_config(&cfg)?;

            eprintln!(
                "Profile '{profile_name}' written to {}",
                config::config_path().display()
            );
            eprintln!("Next: fbx register --profile {profile_name}");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            if !global.quiet {
                print!("{}", format_config(&cfg));
            }
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: fbx config init --host <URL>");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ──────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                let available: Vec<_> = cfg.profiles.keys().cloned().collect();
                return Err(CliError::ProfileNotFound {
                    name,
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("Default profile set to '{name}'");
            Ok(())
        }

        // ── Forget ──────────────────────────────────────────────────
        ConfigCommand::Forget => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            if !util::confirm(
                &format!("Forget stored credentials for profile '{profile_name}'?"),
                global.yes,
            )? {
                return Ok(());
            }

            KeyringStore::new(profile_name.clone()).clear()?;
            eprintln!("Credentials cleared for profile '{profile_name}'.");
            eprintln!("The appliance still lists the app; revoke it on the device as well.");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_config_includes_profiles_sorted() {
        let mut cfg = Config::default();
        for name in ["zeta", "alpha"] {
            let mut profile: Profile = config::blank_profile();
            profile.host = format!("http://{name}.lan");
            cfg.profiles.insert(name.into(), profile);
        }

        let out = format_config(&cfg);
        let alpha = out.find("[profiles.alpha]").expect("alpha rendered");
        let zeta = out.find("[profiles.zeta]").expect("zeta rendered");
        assert!(alpha < zeta, "profiles should render in name order:\n{out}");
    }
}
