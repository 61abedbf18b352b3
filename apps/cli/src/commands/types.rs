//! Command type definitions shared between main.rs and the command modules.

use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// List all profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show profile details
    Show {
        /// Profile name
        name: String,
    },

    /// Add a new profile; missing values are prompted for
    Add {
        /// Profile name
        name: Option<String>,

        /// API key
        #[arg(long)]
        api_key: Option<String>,

        /// Model identifier
        #[arg(long)]
        model: Option<String>,

        /// Base URL of an OpenAI compatible endpoint
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Edit an existing profile; without flags every field is prompted for
    Edit {
        /// Profile name
        name: Option<String>,

        /// New API key
        #[arg(long)]
        api_key: Option<String>,

        /// New model identifier
        #[arg(long)]
        model: Option<String>,

        /// New base URL (empty string resets to the provider default)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Delete a profile
    Delete {
        /// Profile name
        name: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Switch the active profile
    Switch {
        /// Profile name
        name: Option<String>,
    },
}
