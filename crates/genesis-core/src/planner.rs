//! Path planner: enumerate tool chains through the type graph.
//!
//! The registry induces a directed graph whose vertices are
//! [`WorkflowType`] values and whose edges are path tools. The planner
//! enumerates every simple chain from the detected input type to any
//! satisfying output type, bounded by depth and result count.
//!
//! Simple here means: no tool is used twice, and no type-changing step
//! may produce a type an earlier type-changing step already produced.
//! In-place transforms (AUDIO -> AUDIO denoise, TEXT -> TEXT translate)
//! do not move through type space and are exempt from the produced-type
//! check. The input type is not counted as produced, so chains may
//! return to it once (IMAGE -> TEXT -> IMAGE), while repeated ping-pong
//! between two types is cut off after one round trip.

use tracing::debug;

use genesis_types::{GenesisError, PathCandidate, Result, ToolSpec, WorkflowType};

use crate::registry::ToolRegistry;

/// Enumerate candidate paths from `input_type` to any of `satisfying`.
///
/// An empty `satisfying` set means the classifier could not decide; the
/// planner falls back to accepting every content-bearing sink type.
///
/// Returned candidates are sorted breadth-of-lengths: length ascending,
/// then summed tool `preferred` score descending, then tool-name
/// sequence lexicographic. At most `max_paths` are returned; none is
/// longer than `max_depth`.
///
/// Fails with [`GenesisError::NoPathFound`] when the graph has no
/// satisfying chain within the depth bound.
pub fn find_paths(
    registry: &ToolRegistry,
    input_type: WorkflowType,
    satisfying: &[WorkflowType],
    max_depth: usize,
    max_paths: usize,
) -> Result<Vec<PathCandidate>> {
    let mut found: Vec<PathCandidate> = Vec::new();
    let mut chain: Vec<ToolSpec> = Vec::new();
    let mut produced: Vec<WorkflowType> = Vec::new();

    walk(
        registry,
        input_type,
        satisfying,
        max_depth,
        &mut chain,
        &mut produced,
        &mut found,
    );

    if found.is_empty() {
        return Err(GenesisError::NoPathFound {
            input_type,
            wanted: satisfying.to_vec(),
        });
    }

    found.sort_by(|a, b| {
        a.len()
            .cmp(&b.len())
            .then_with(|| b.preference_score().cmp(&a.preference_score()))
            .then_with(|| name_seq(a).cmp(&name_seq(b)))
    });
    found.truncate(max_paths);

    debug!(
        input = %input_type,
        candidates = found.len(),
        "path enumeration complete"
    );
    Ok(found)
}

fn satisfies(ty: WorkflowType, satisfying: &[WorkflowType]) -> bool {
    if satisfying.is_empty() {
        ty.is_content_bearing()
    } else {
        satisfying.contains(&ty)
    }
}

fn walk(
    registry: &ToolRegistry,
    current: WorkflowType,
    satisfying: &[WorkflowType],
    remaining_depth: usize,
    chain: &mut Vec<ToolSpec>,
    produced: &mut Vec<WorkflowType>,
    found: &mut Vec<PathCandidate>,
) {
    if remaining_depth == 0 {
        return;
    }
    for tool in registry.tools_by_input_type(current) {
        let out = tool.spec.output_type;
        let in_place = out == current;
        if chain.iter().any(|step| step.name == tool.spec.name) {
            continue;
        }
        if !in_place && produced.contains(&out) {
            continue;
        }
        chain.push(tool.spec.clone());
        if !in_place {
            produced.push(out);
        }

        if satisfies(out, satisfying) {
            found.push(PathCandidate::new(chain.clone()));
        }
        walk(
            registry,
            out,
            satisfying,
            remaining_depth - 1,
            chain,
            produced,
            found,
        );

        if !in_place {
            produced.pop();
        }
        chain.pop();
    }
}

fn name_seq(path: &PathCandidate) -> Vec<&str> {
    path.steps.iter().map(|t| t.name.as_str()).collect()
}
