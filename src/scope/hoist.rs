//! Enum value hoisting
//!
//! Decides, per backend, where the values of every bound enum are reachable:
//! - scoped enums expose `Enum.Value`; a backend without native scoped
//!   enums also exports the values into the parent scope when it can
//! - unscoped enums export their values into the parent scope when the
//!   backend can export into that kind of scope, otherwise a gap is recorded
//! - anonymous enums always become parent-scope constants

use super::graph::{ScopeGraph, ScopeKind};
use crate::backend::{CapabilityTable, Feature};
use crate::model::{Model, NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// Hoisting decision for one enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumExport {
    #[serde(skip)]
    pub node: NodeId,
    /// Dotted path of the enum, or of its parent scope when anonymous
    pub name: String,
    pub parent_kind: ScopeKind,
    /// Values reachable as `Enum.Value`
    pub scoped_access: bool,
    /// Values exported into the parent scope
    pub hoisted: bool,
    /// Every dotted name a value is reachable under
    pub reachable: Vec<String>,
    /// Export the backend could not perform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<Feature>,
}

fn can_export_into(caps: &CapabilityTable, kind: ScopeKind) -> bool {
    match kind {
        ScopeKind::Module => true,
        ScopeKind::Class => caps.supports(Feature::ClassScopeEnumExport),
    }
}

/// Hoisting decisions for every placed enum, in model order
pub fn enum_exports(model: &Model, graph: &ScopeGraph, caps: &CapabilityTable) -> Vec<EnumExport> {
    let mut exports = Vec::new();
    for node in model.nodes() {
        let NodeKind::Enum(e) = &node.kind else {
            continue;
        };
        let Some(parent) = graph.placement(node.id) else {
            continue;
        };
        let parent_kind = graph.scope(parent).kind();
        let parent_path = graph.dotted_path(parent);

        let (scoped_access, hoisted, gap) = if e.anonymous {
            (false, true, None)
        } else if e.scoped {
            let hoist = !caps.supports(Feature::ScopedEnum) && can_export_into(caps, parent_kind);
            (true, hoist, None)
        } else if can_export_into(caps, parent_kind) {
            (true, true, None)
        } else {
            (true, false, Some(Feature::ClassScopeEnumExport))
        };

        let enum_path = if e.anonymous {
            parent_path.clone()
        } else {
            format!("{}.{}", parent_path, node.exposed_name)
        };
        let mut reachable = Vec::new();
        for value in &e.values {
            if scoped_access {
                reachable.push(format!("{}.{}", enum_path, value.label));
            }
            if hoisted {
                reachable.push(format!("{}.{}", parent_path, value.label));
            }
        }

        exports.push(EnumExport {
            node: node.id,
            name: enum_path,
            parent_kind,
            scoped_access,
            hoisted,
            reachable,
            gap,
        });
    }
    exports
}
