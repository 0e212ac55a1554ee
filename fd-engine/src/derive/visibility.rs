use tracing::{debug, warn};

use crate::{
    element::Mechanism,
    error::EvaluationError,
    logging::{Category, category},
};

use super::walk::{Node, Pass, Run, Visit};

pub(crate) struct VisibilityPass;

impl Pass for VisibilityPass {
    type Carry = bool;

    fn visit(&self, run: &mut Run<'_>, node: Node<'_>, parent_visible: bool) -> Visit<bool> {
        if node.element.is_root() {
            return Visit::Descend(true);
        }
        if !parent_visible {
            run.state.set_visible(node.resolved_id, false);
            return Visit::Descend(false);
        }

        let visible = match own_visibility(run, node) {
            Ok(visible) => visible,
            Err(err) => {
                warn!(
                    "{} {} failed, keeping it visible: {}",
                    category(Category::Visibility),
                    node.resolved_id,
                    err
                );
                run.state.set_error(node.resolved_id, err.to_string());
                true
            }
        };
        if !visible {
            debug!("{} {} hidden", category(Category::Visibility), node.resolved_id);
        }
        run.state.set_visible(node.resolved_id, visible);
        Visit::Descend(visible)
    }
}

fn own_visibility(run: &mut Run<'_>, node: Node<'_>) -> Result<bool, EvaluationError> {
    match node.element.visibility.mechanism() {
        Mechanism::Script(script) => Ok(run.script(node, script)?.as_bool()),
        Mechanism::Expression(expression) => run.expression(node, expression)?.expect_bool(),
        Mechanism::Legacy(function) => {
            let result = run.legacy(node, function)?;
            // No-code legacy conditions list when to hide.
            if result.is_no_code() {
                Ok(result.is_null())
            } else {
                Ok(result.as_bool())
            }
        }
        Mechanism::Absent => Ok(true),
    }
}
