//! Builds a completion client from the profile configuration.

use std::sync::Arc;

use roricode_abstraction::CompletionClient;
use roricode_core::Config;
use tracing::debug;

use crate::openai::OpenAIClient;

/// Returns a client for the active profile, or `None` when the profile is not
/// usable (missing or without an API key).
pub fn client_from_config(config: &Config) -> Option<Arc<dyn CompletionClient>> {
    if !config.is_valid() {
        debug!(profile = %config.active_profile, "Active profile not configured, no client");
        return None;
    }
    let profile = config.current_profile()?;

    let mut client = OpenAIClient::new(profile.model.clone(), profile.api_key.clone());
    if let Some(base_url) = profile.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        client = client.with_base_url(base_url);
    }
    debug!(
        profile = %config.active_profile,
        model = %profile.model,
        base_url = %client.base_url(),
        "Created completion client"
    );
    Some(Arc::new(client))
}
