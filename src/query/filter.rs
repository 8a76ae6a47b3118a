//! Filter normalisation.
//!
//! The API expects a closed range as a single `$between` operator, so paired
//! `$gte` + `$lte`/`$lt` bounds on the same field are folded before a filter
//! is sent.

use crate::models::FilterExpression;
use serde_json::Value;

const GTE: &str = "$gte";
const LTE: &str = "$lte";
const LT: &str = "$lt";
const BETWEEN: &str = "$between";

/// Rewrite top-level field conditions into the API's canonical form.
///
/// A condition object holding `$gte` together with `$lte` or `$lt` loses
/// those bounds and gains `$between: [low, high]`. When `$lt` is present it
/// is used verbatim as `high`. Composition nodes (`$and`, `$or`, `$not`) and
/// anything malformed pass through untouched.
pub fn normalize_filter(filter: &FilterExpression) -> FilterExpression {
    filter
        .iter()
        .map(|(field, condition)| {
            if field.starts_with('$') {
                return (field.clone(), condition.clone());
            }
            (field.clone(), normalize_condition(condition))
        })
        .collect()
}

fn normalize_condition(condition: &Value) -> Value {
    let Value::Object(ops) = condition else {
        return condition.clone();
    };

    let Some(low) = ops.get(GTE) else {
        return condition.clone();
    };

    let high = match (ops.get(LT), ops.get(LTE)) {
        (Some(lt), _) => lt,
        (None, Some(lte)) => lte,
        (None, None) => return condition.clone(),
    };

    let mut rewritten = ops.clone();
    let range = Value::Array(vec![low.clone(), high.clone()]);
    rewritten.remove(GTE);
    rewritten.remove(LTE);
    rewritten.remove(LT);
    rewritten.insert(BETWEEN.to_string(), range);
    Value::Object(rewritten)
}

/// Normalise and serialise a filter for the `where` query parameter.
pub fn encode_filter(filter: &FilterExpression) -> String {
    Value::Object(normalize_filter(filter)).to_string()
}
