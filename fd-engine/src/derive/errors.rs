use tracing::debug;

use crate::{
    element::Mechanism,
    error::{ElementError, EvaluationError},
    logging::{Category, category},
    validation::ValidationFailure,
};

use super::walk::{Node, Pass, Run, Visit};

pub(crate) struct ErrorPass;

impl Pass for ErrorPass {
    type Carry = ();

    fn visit(&self, run: &mut Run<'_>, node: Node<'_>, _: ()) -> Visit<()> {
        if !run.state.is_visible(node.resolved_id) {
            return Visit::Stop;
        }
        if node.element.accepts_input()
            && let Err(err) = validate_input_element(run, node)
        {
            debug!(
                "{} {} invalid: {}",
                category(Category::Validation),
                node.resolved_id,
                err
            );
            run.state.set_error(node.resolved_id, err.to_string());
        }
        Visit::Descend(())
    }
}

pub(crate) fn validate_input_element(
    run: &mut Run<'_>,
    node: Node<'_>,
) -> Result<(), ElementError> {
    if !run.state.is_visible(node.resolved_id) {
        return Ok(());
    }

    let overridden = run.state.override_for(node.resolved_id).cloned();
    let element = overridden.as_ref().unwrap_or(node.element);
    let value = run.state.value(node.resolved_id).cloned();
    if value.is_none() && !element.required {
        return Ok(());
    }

    run.validators.validate(element, value.as_ref())?;

    let node = Node {
        element,
        prefix: node.prefix,
        resolved_id: node.resolved_id,
    };
    match custom_validation(run, node)? {
        Some(message) if !message.is_empty() => {
            Err(ElementError::Validation(ValidationFailure::new(message)))
        }
        _ => Ok(()),
    }
}

fn custom_validation(run: &mut Run<'_>, node: Node<'_>) -> Result<Option<String>, EvaluationError> {
    match node.element.validation.mechanism() {
        Mechanism::Script(script) => run.script(node, script)?.validation_message(),
        Mechanism::Expression(rules) => {
            for rule in rules {
                if !run.expression(node, &rule.expression)?.expect_bool()? {
                    return Ok(Some(rule.message.clone()));
                }
            }
            Ok(None)
        }
        Mechanism::Legacy(function) => run.legacy(node, function)?.validation_message(),
        Mechanism::Absent => Ok(None),
    }
}
