use tracing::debug;

use crate::events::Reporter;
use crate::types::{ModuleKind, PluginContext};

/// A dependent that resolved to a linked performer in the current context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNotice {
    pub performer_id: String,
    pub module_kind: ModuleKind,
    pub service: Option<String>,
}

impl LinkNotice {
    pub fn is_config(&self) -> bool {
        self.module_kind == ModuleKind::Config
    }
}

/// Resolves the performer's dependents against the current performer set.
///
/// Notices come back in dependent declaration order so callers can act on
/// them before anything else reads the config.
pub fn link_performers(context: &PluginContext) -> Vec<LinkNotice> {
    context
        .performer
        .dependents
        .iter()
        .filter_map(|dependent| context.linked_performer(dependent))
        .map(|performer| LinkNotice {
            performer_id: performer.performer_id.clone(),
            module_kind: performer.module.kind,
            service: performer.service_name().map(str::to_string),
        })
        .collect()
}

/// One `info` event per dependent known to the context: linked or not.
pub(super) fn report_link_state(context: &PluginContext, reporter: &Reporter) {
    for dependent in &context.performer.dependents {
        let Some(performer) = context
            .performers
            .iter()
            .find(|p| p.performer_id == dependent.module_id)
        else {
            debug!("Dependent {} has no performer", dependent.module_id);
            continue;
        };

        if performer.linked {
            reporter.info(format!("{} linked", performer.performer_id));
        } else {
            reporter.info(format!("{} not linked", performer.performer_id));
        }
    }
}
