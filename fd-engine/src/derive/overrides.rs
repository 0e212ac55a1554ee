use tracing::{debug, warn};

use crate::{
    element::{ElementNode, Mechanism},
    error::EvaluationError,
    expression::value_kind,
    logging::{Category, category},
    resolver::patch_element,
};

use super::walk::{Node, Pass, Run, Visit};

pub(crate) struct OverridePass;

impl Pass for OverridePass {
    type Carry = ();

    fn visit(&self, run: &mut Run<'_>, node: Node<'_>, _: ()) -> Visit<()> {
        if !run.state.is_visible(node.resolved_id) {
            return Visit::Stop;
        }

        match derive_override(run, node) {
            Ok(Some(element)) => {
                debug!("{} {} overridden", category(Category::Override), node.resolved_id);
                run.state.set_override(node.resolved_id, element);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    "{} {} failed: {}",
                    category(Category::Override),
                    node.resolved_id,
                    err
                );
                run.state.set_error(node.resolved_id, err.to_string());
            }
        }
        Visit::Descend(())
    }
}

fn derive_override(
    run: &mut Run<'_>,
    node: Node<'_>,
) -> Result<Option<ElementNode>, EvaluationError> {
    let result = match node.element.patch.mechanism() {
        Mechanism::Script(script) => run.script(node, script)?,
        Mechanism::Expression(_) => {
            return Err(EvaluationError::Unsupported("override by no-code expression"));
        }
        Mechanism::Legacy(function) => run.legacy(node, function)?,
        Mechanism::Absent => return Ok(None),
    };
    if result.is_null() {
        return Ok(None);
    }

    let patch = result
        .as_map()
        .ok_or_else(|| EvaluationError::UnexpectedResult {
            expected: "object",
            found: value_kind(result.as_object()),
        })?;
    Ok(Some(patch_element(run.resolver, node.element, patch)?))
}
