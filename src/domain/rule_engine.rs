//! Rule evaluation.
//!
//! Transactions are tried in declared order; the first whose trigger is true
//! becomes the rule's intent for this step and the rest are not evaluated.

use tracing::debug;

use crate::domain::error::EngineError;
use crate::domain::expr_eval::evaluate_bool;
use crate::domain::rule::{Rule, TradeIntent};
use crate::domain::state::StepState;

pub fn evaluate(rule: &Rule, state: &StepState) -> Result<Option<TradeIntent>, EngineError> {
    for (n, tx) in rule.transactions.iter().enumerate() {
        if !evaluate_bool(&tx.expression, state)? {
            continue;
        }
        let timestamp = state.time.ok_or_else(|| EngineError::UnresolvedIdentifier {
            name: "time".to_string(),
        })?;
        debug!(rule = %rule.id, transaction = n, expr = %tx.expression, "rule triggered");
        return Ok(Some(TradeIntent {
            rule_id: rule.id.clone(),
            rule_type: rule.rule_type,
            action: rule.action,
            price: state.close,
            size: tx.size,
            size_type: tx.size_type,
            priority: rule.rule_type.priority(),
            timestamp,
        }));
    }
    Ok(None)
}

/// Evaluate every rule and order the intents by priority. The sort is
/// stable, so rules of equal priority keep their declared order.
pub fn collect_intents<'a>(
    rules: impl IntoIterator<Item = &'a Rule>,
    state: &StepState,
) -> Result<Vec<TradeIntent>, EngineError> {
    let mut intents = Vec::new();
    for rule in rules {
        if let Some(intent) = evaluate(rule, state)? {
            intents.push(intent);
        }
    }
    intents.sort_by_key(|intent| intent.priority);
    Ok(intents)
}
