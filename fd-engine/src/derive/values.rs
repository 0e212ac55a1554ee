use serde_json::Value;
use tracing::warn;

use crate::{
    element::Mechanism,
    error::EvaluationError,
    logging::{Category, category},
};

use super::walk::{Node, Pass, Run, Visit};

pub(crate) struct ValuePass;

impl Pass for ValuePass {
    type Carry = ();

    fn visit(&self, run: &mut Run<'_>, node: Node<'_>, _: ()) -> Visit<()> {
        if !run.state.is_visible(node.resolved_id) {
            return Visit::Stop;
        }
        if !node.element.accepts_input() {
            return Visit::Descend(());
        }

        match compute_value(run, node) {
            Ok(Some(value)) => run.state.set_computed_value(node.resolved_id, value),
            Ok(None) => {}
            Err(err) => {
                warn!("{} {} failed: {}", category(Category::Value), node.resolved_id, err);
                run.state.set_error(node.resolved_id, err.to_string());
            }
        }
        Visit::Descend(())
    }
}

// `Some(Value::Null)` is a computation that produced null, `None` means no
// computation was declared.
fn compute_value(run: &mut Run<'_>, node: Node<'_>) -> Result<Option<Value>, EvaluationError> {
    let result = match node.element.value.mechanism() {
        Mechanism::Script(script) => run.script(node, script)?,
        Mechanism::Expression(expression) => run.expression(node, expression)?,
        Mechanism::Legacy(function) => run.legacy(node, function)?,
        Mechanism::Absent => return Ok(None),
    };
    Ok(Some(result.into_value()))
}
