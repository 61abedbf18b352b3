//! Profile management: list, show, add, edit, delete and switch.
//!
//! Arguments left out on the command line are prompted for interactively.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use inquire::{Confirm, Password, PasswordDisplayMode, Select, Text};
use roricode_core::{Config, DEFAULT_MODEL, Profile};
use roricode_models::DEFAULT_BASE_URL;
use serde_json::json;

use super::types::ProfileCommand;

/// Execute a profile subcommand.
pub fn execute(command: ProfileCommand) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    match command {
        ProfileCommand::List { json } => list(&config, json),
        ProfileCommand::Show { name } => show(&config, &name),
        ProfileCommand::Add { name, api_key, model, base_url } => {
            add(&mut config, name, api_key, model, base_url)
        }
        ProfileCommand::Edit { name, api_key, model, base_url } => {
            edit(&mut config, name, api_key, model, base_url)
        }
        ProfileCommand::Delete { name, yes } => delete(&mut config, name, yes),
        ProfileCommand::Switch { name } => switch(&mut config, name),
    }
}

fn list(config: &Config, json_output: bool) -> Result<()> {
    if json_output {
        let profiles: Vec<_> = config
            .profiles
            .iter()
            .map(|(name, profile)| {
                json!({
                    "name": name,
                    "model": profile.model,
                    "base_url": profile.base_url,
                    "has_api_key": profile.is_configured(),
                    "active": *name == config.active_profile,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    println!("{} {}", "Active Profile:".bold(), config.active_profile.cyan());
    println!();
    println!("{}", "Available Profiles:".bold());
    for (name, profile) in &config.profiles {
        let marker = if *name == config.active_profile { " (active)".green().to_string() } else { String::new() };
        println!("  {}{}", name.bold(), marker);
        println!("    Model: {}", profile.model);
        if let Some(base_url) = &profile.base_url {
            println!("    Base URL: {}", base_url);
        }
        println!("    API Key: {}", if profile.is_configured() { "Yes" } else { "No" });
        println!();
    }
    Ok(())
}

fn show(config: &Config, name: &str) -> Result<()> {
    let profile = config.profile(name)?;
    println!("{} {}", "Profile:".bold(), name.cyan());
    println!("Model: {}", profile.model);
    match &profile.base_url {
        Some(base_url) => println!("Base URL: {}", base_url),
        None => println!("Base URL: {} (default)", DEFAULT_BASE_URL),
    }
    println!("API Key: {}", profile.masked_api_key());
    println!("Active: {}", if config.active_profile == name { "yes" } else { "no" });
    Ok(())
}

fn add(
    config: &mut Config,
    name: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => Text::new("Profile name:").prompt()?,
    };
    let name = name.trim().to_string();

    // Flags given: take them as they are. Otherwise walk through every field.
    let interactive = api_key.is_none();
    let api_key = match api_key {
        Some(key) => key,
        None => Password::new("API Key:")
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()?,
    };
    let model = match model {
        Some(model) => model,
        None if interactive => Text::new("Model:").with_default(DEFAULT_MODEL).prompt()?,
        None => DEFAULT_MODEL.to_string(),
    };
    let base_url = match base_url {
        Some(url) => Some(url),
        None if interactive => Some(Text::new("Base URL (optional):").prompt()?),
        None => None,
    };

    let mut profile = Profile::new(api_key, model);
    if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
        profile = profile.with_base_url(url.trim());
    }

    config.add_profile(&name, profile)?;
    // Make the new profile usable right away if the active one cannot chat.
    let activated = !config.is_valid() && config.profiles.get(&name).is_some_and(Profile::is_configured);
    if activated {
        config.switch_profile(&name)?;
    }
    config.save().context("Failed to save configuration")?;

    println!("{} Profile '{}' added successfully!", "✓".green(), name);
    if activated {
        println!("Active profile is now '{}'", name);
    }
    Ok(())
}

fn edit(
    config: &mut Config,
    name: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => select_profile(config, "Select profile to edit:", false)?,
    };
    let current = config.profile(&name)?.clone();

    let (api_key, model, base_url) = if api_key.is_none() && model.is_none() && base_url.is_none() {
        let key = Password::new("API Key (leave empty to keep):")
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()?;
        let model = Text::new("Model:").with_default(&current.model).prompt()?;
        let base_url =
            Text::new("Base URL:").with_default(current.base_url.as_deref().unwrap_or_default()).prompt()?;
        (Some(key).filter(|k| !k.is_empty()), Some(model), Some(base_url))
    } else {
        (api_key, model, base_url)
    };

    config.update_profile(&name, api_key, base_url, model)?;
    config.save().context("Failed to save configuration")?;
    println!("{} Profile '{}' updated successfully!", "✓".green(), name);
    Ok(())
}

fn delete(config: &mut Config, name: Option<String>, yes: bool) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => select_profile(config, "Select profile to delete:", false)?,
    };
    config.profile(&name)?;

    if !yes {
        let confirmed = Confirm::new(&format!("Delete profile '{}'?", name)).with_default(false).prompt()?;
        if !confirmed {
            println!("Deletion cancelled");
            return Ok(());
        }
    }

    let was_active = config.active_profile == name;
    config.remove_profile(&name)?;
    config.save().context("Failed to save configuration")?;

    println!("{} Profile '{}' deleted successfully!", "✓".green(), name);
    if was_active {
        println!("Active profile is now '{}'", config.active_profile);
    }
    Ok(())
}

fn switch(config: &mut Config, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => {
            if config.profiles.keys().all(|n| *n == config.active_profile) {
                println!("No other profiles available to switch to");
                return Ok(());
            }
            select_profile(config, "Select profile to switch to:", true)?
        }
    };

    config.switch_profile(&name)?;
    config.save().context("Failed to save configuration")?;
    println!("Switched to profile '{}'", name);
    Ok(())
}

fn select_profile(config: &Config, label: &str, exclude_active: bool) -> Result<String> {
    let names: Vec<String> = config
        .profiles
        .keys()
        .filter(|name| !exclude_active || **name != config.active_profile)
        .cloned()
        .collect();
    if names.is_empty() {
        bail!("No profiles available");
    }
    Ok(Select::new(label, names).prompt()?)
}
