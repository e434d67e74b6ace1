//! Builders to construct pipeline groups from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::{Group, PipelineError, Server};

/// Register every configured group on `server`.
///
/// Endpoints and handlers are code, not configuration: bind them on the
/// returned groups, using [`GroupConfig::handle_config`] for `set_handle`.
///
/// [`GroupConfig::handle_config`]: crate::config::GroupConfig::handle_config
///
/// # Errors
///
/// Returns `PipelineError::InvalidConfig` if `cfg` does not validate, or
/// `PipelineError::DuplicateGroup` if any configured name is already
/// registered. Nothing is registered in either case.
pub fn build_groups(
    server: &Server,
    cfg: &ServerConfig,
) -> Result<HashMap<String, Arc<Group>>, PipelineError> {
    cfg.validate()
        .map_err(|e| PipelineError::InvalidConfig(format!("config invalid: {e}")))?;

    let existing = server.group_names();
    if let Some(name) = cfg.groups.keys().find(|name| existing.contains(*name)) {
        return Err(PipelineError::DuplicateGroup(name.clone()));
    }

    let mut groups = HashMap::new();
    for (name, group_cfg) in &cfg.groups {
        let group = server.add_group(name, group_cfg.concurrency, group_cfg.queue_capacity)?;
        groups.insert(name.clone(), group);
    }
    Ok(groups)
}
