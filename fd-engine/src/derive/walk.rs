use tracing::warn;

use crate::{
    element::{ElementNode, LegacyFunction, Script, Shape, resolved_id},
    error::EvaluationError,
    evaluator::{EvalContext, EvalResult, Evaluator},
    expression::Expression,
    logging::{Category, category},
    resolver::ElementResolver,
    state::DerivationState,
    validation::{ValidatorRegistry, dataset_ids},
};

use super::DerivationError;

pub(crate) struct Run<'r> {
    pub state: &'r mut DerivationState,
    pub evaluator: &'r mut dyn Evaluator,
    pub resolver: &'r dyn ElementResolver,
    pub validators: &'r ValidatorRegistry,
    max_depth: usize,
}

#[derive(Clone, Copy)]
pub(crate) struct Node<'a> {
    pub element: &'a ElementNode,
    pub prefix: Option<&'a str>,
    pub resolved_id: &'a str,
}

pub(crate) enum Visit<C> {
    Stop,
    Descend(C),
}

pub(crate) trait Pass {
    type Carry: Copy;

    fn visit(&self, run: &mut Run<'_>, node: Node<'_>, carry: Self::Carry) -> Visit<Self::Carry>;
}

impl<'r> Run<'r> {
    pub fn new(
        state: &'r mut DerivationState,
        evaluator: &'r mut dyn Evaluator,
        resolver: &'r dyn ElementResolver,
        validators: &'r ValidatorRegistry,
        max_depth: usize,
    ) -> Self {
        Self {
            state,
            evaluator,
            resolver,
            validators,
            max_depth,
        }
    }

    pub fn script(
        &mut self,
        node: Node<'_>,
        script: &Script,
    ) -> Result<EvalResult, EvaluationError> {
        let context = EvalContext::new(node.resolved_id, node.prefix, node.element, self.state);
        self.evaluator.evaluate_script(script, &context)
    }

    pub fn expression(
        &mut self,
        node: Node<'_>,
        expression: &Expression,
    ) -> Result<EvalResult, EvaluationError> {
        let context = EvalContext::new(node.resolved_id, node.prefix, node.element, self.state);
        self.evaluator.evaluate_expression(expression, &context)
    }

    pub fn legacy(
        &mut self,
        node: Node<'_>,
        function: &LegacyFunction,
    ) -> Result<EvalResult, EvaluationError> {
        let context = EvalContext::new(node.resolved_id, node.prefix, node.element, self.state);
        self.evaluator.evaluate_legacy(function, &context)
    }
}

/// Walks the whole tree below `root` with one pass. Replicating containers
/// are expanded after their own visit, from whatever value they have by
/// then.
pub(crate) fn walk<P: Pass>(
    pass: &P,
    run: &mut Run<'_>,
    root: &ElementNode,
    carry: P::Carry,
) -> Result<(), DerivationError> {
    walk_element(pass, run, root, None, carry, 0)
}

fn walk_element<P: Pass>(
    pass: &P,
    run: &mut Run<'_>,
    element: &ElementNode,
    prefix: Option<&str>,
    carry: P::Carry,
    depth: usize,
) -> Result<(), DerivationError> {
    let resolved = resolved_id(prefix, &element.id);
    if depth > run.max_depth {
        return Err(DerivationError::DepthExceeded {
            id: resolved,
            limit: run.max_depth,
        });
    }
    run.state.mark_reached(&resolved);

    let node = Node {
        element,
        prefix,
        resolved_id: &resolved,
    };
    let Visit::Descend(carry) = pass.visit(run, node, carry) else {
        return Ok(());
    };

    match element.shape() {
        Shape::Root(children) | Shape::Section(children) => {
            for child in children {
                walk_element(pass, run, child, prefix, carry, depth + 1)?;
            }
        }
        Shape::Replicating(children) => {
            for row in dataset_rows(run.state, &resolved) {
                let row_prefix = resolved_id(Some(resolved.as_str()), &row);
                for child in children {
                    walk_element(pass, run, child, Some(row_prefix.as_str()), carry, depth + 1)?;
                }
            }
        }
        Shape::Leaf => {}
    }
    Ok(())
}

fn dataset_rows(state: &mut DerivationState, resolved: &str) -> Vec<String> {
    let Some(value) = state.value(resolved) else {
        return Vec::new();
    };
    match dataset_ids(value) {
        Ok(rows) => rows,
        Err(failure) => {
            warn!(
                "{} container {} has no usable rows: {}",
                category(Category::Derive),
                resolved,
                failure
            );
            if state.error(resolved).is_none() {
                state.set_error(resolved, failure.message());
            }
            Vec::new()
        }
    }
}
