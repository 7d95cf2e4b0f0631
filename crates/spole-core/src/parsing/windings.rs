use crate::model::{WindingRecord, WINDING_SLOTS};
use crate::trace::{TraceBundle, TraceDecisionTarget, TraceStepType, TraceWarning};
use std::collections::HashSet;
use tracing::debug;

/// How many windings a document has and what to call them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindingLayout {
    pub count: usize,
    /// Always one name per slot.
    pub names: Vec<String>,
}

/// Decide the winding count and display names once every page has been read.
///
/// A document has a third winding only when something landed in slot 3,
/// so a 2-winding document always carries an all-null slot 3.
pub fn infer_windings(
    windings: &[WindingRecord; WINDING_SLOTS],
    trace: &mut TraceBundle,
) -> WindingLayout {
    let count = if windings[2].is_empty() { 2 } else { 3 };
    debug!(count, "winding count inferred");
    trace.push_decision(
        TraceDecisionTarget::WindingCount,
        None,
        match count {
            3 => "values found for winding 3; document has 3 windings".to_string(),
            _ => "no values for winding 3; document has 2 windings".to_string(),
        },
        TraceStepType::InferWindings,
    );
    if count == 3 && type_only(&windings[2]) {
        trace.warnings.push(TraceWarning::document(
            "winding 3 has a type from the column header but no values",
        ));
    }

    let names = winding_names(&windings[..count]);
    let reason = match names.typed {
        true => format!("named windings by type: {}", names.names[..count].join(", ")),
        false => "winding types missing or repeated; using ordinal names".to_string(),
    };
    trace.push_decision(
        TraceDecisionTarget::WindingNames,
        None,
        reason,
        TraceStepType::InferWindings,
    );

    WindingLayout {
        count,
        names: names.names,
    }
}

/// A record whose only value is its winding type.
fn type_only(winding: &WindingRecord) -> bool {
    winding.winding_type.is_some()
        && *winding
            == WindingRecord {
                winding_type: winding.winding_type,
                ..Default::default()
            }
}

struct Names {
    names: Vec<String>,
    typed: bool,
}

fn winding_names(counted: &[WindingRecord]) -> Names {
    let types: Vec<_> = counted.iter().filter_map(|w| w.winding_type).collect();
    let distinct: HashSet<_> = types.iter().collect();
    let typed = types.len() == counted.len() && distinct.len() == types.len();

    let names = (0..WINDING_SLOTS)
        .map(|i| match (typed, types.get(i)) {
            (true, Some(t)) => t.to_string(),
            _ => format!("Winding {}", i + 1),
        })
        .collect();
    Names { names, typed }
}
