//! Expression evaluator
//!
//! Evaluates the restricted expression language used by schema nodes:
//!
//! - `$item`, `$item.name`, `$item[0].v` - the current iteration element
//! - `data.path` - path inside the payload aliased `data`
//! - any other path - looked up in the data context directly
//! - `a.b + c.d * 2` - arithmetic over references and numeric literals
//!
//! Text templates embed expressions as `${...}`. Every evaluation returns
//! renderable text: absent values render empty, failed arithmetic renders
//! `NaN`.

pub mod arith;

use schema_types::{
    CalculateKind, CalculatedStyle, Condition, ConditionOperator, StyleValue,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::context::DataContext;
use crate::format::{number_to_text, parse_number, to_fixed, to_number, value_to_text};
use crate::observer::{EvalObserver, NoopObserver};
use crate::path::get_value_normalized;

pub use arith::{has_operator, ArithError, ArithExpr};

/// Prefix binding references to the current iteration element
pub const ITEM_PREFIX: &str = "$item";
/// Prefix addressing the payload aliased `data`
pub const DATA_PREFIX: &str = "data.";

static NOOP: NoopObserver = NoopObserver;

/// Evaluates expressions, conditions and styles, reporting to an observer.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    observer: &'a dyn EvalObserver,
}

impl Default for Evaluator<'static> {
    fn default() -> Self {
        Self { observer: &NOOP }
    }
}

impl std::fmt::Debug for Evaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator").finish_non_exhaustive()
    }
}

impl<'a> Evaluator<'a> {
    pub fn new(observer: &'a dyn EvalObserver) -> Self {
        Self { observer }
    }

    /// Resolve a single variable reference to the value it names.
    pub fn resolve_reference<'v>(
        &self,
        reference: &str,
        ctx: &'v DataContext,
        item: Option<&'v Value>,
    ) -> Option<&'v Value> {
        let reference = reference.trim();

        if let Some(rest) = reference.strip_prefix(ITEM_PREFIX) {
            if rest.is_empty() {
                return item;
            }
            if rest.starts_with('.') || rest.starts_with('[') {
                return get_value_normalized(item?, rest.trim_start_matches('.'));
            }
            // `$items...` is an ordinary key, not an item binding
        }

        if let Some(rest) = reference.strip_prefix(DATA_PREFIX) {
            return get_value_normalized(ctx.get("data")?, rest);
        }

        ctx.lookup(reference)
    }

    /// Evaluate the body of a `${...}` placeholder.
    pub fn evaluate_expression(
        &self,
        expr: &str,
        ctx: &DataContext,
        item: Option<&Value>,
    ) -> String {
        let expr = expr.trim();

        let result = if has_operator(expr) {
            match ArithExpr::parse(expr) {
                Ok(ast) => {
                    let value = ast.eval(&mut |reference| self.reference_number(reference, ctx, item));
                    number_to_text(value)
                }
                Err(_) => "NaN".to_string(),
            }
        } else {
            self.resolve_reference(expr, ctx, item)
                .map(value_to_text)
                .unwrap_or_default()
        };

        self.observer.expression_resolved(expr, &result);
        result
    }

    /// Numeric value of a reference inside arithmetic: absent or null
    /// count as 0, non-numeric values poison the result with NaN.
    fn reference_number(&self, reference: &str, ctx: &DataContext, item: Option<&Value>) -> f64 {
        match self.resolve_reference(reference, ctx, item) {
            None | Some(Value::Null) => 0.0,
            Some(value) => to_number(value).unwrap_or(f64::NAN),
        }
    }

    /// Replace every `${expr}` in `template` with its evaluated text.
    ///
    /// An unterminated `${` is kept verbatim.
    pub fn interpolate(&self, template: &str, ctx: &DataContext, item: Option<&Value>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    out.push_str(&self.evaluate_expression(&after[..end], ctx, item));
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    pub fn evaluate_condition(
        &self,
        condition: &Condition,
        ctx: &DataContext,
        item: Option<&Value>,
    ) -> bool {
        let left = self.resolve_reference(&condition.key, ctx, item);
        let right = &condition.value;

        let result = match condition.operator {
            ConditionOperator::Equal => strict_equals(left, right),
            ConditionOperator::GreaterThan => compare(left, right) == Some(Ordering::Greater),
            ConditionOperator::LessThan => compare(left, right) == Some(Ordering::Less),
            ConditionOperator::GreaterOrEqual => matches!(
                compare(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ConditionOperator::LessOrEqual => matches!(
                compare(left, right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            ConditionOperator::Unknown => false,
        };

        self.observer.condition_evaluated(condition, result);
        result
    }

    /// Resolve every style property to a literal value.
    ///
    /// Properties that resolve to null, and calculated kinds this engine
    /// does not know, are left out.
    pub fn resolve_style(
        &self,
        style: &BTreeMap<String, StyleValue>,
        ctx: &DataContext,
        item: Option<&Value>,
    ) -> BTreeMap<String, Value> {
        let mut resolved = BTreeMap::new();

        for (property, spec) in style {
            let value = match spec {
                StyleValue::Literal(value) => value.clone(),
                StyleValue::Conditional(cond) => {
                    if self.evaluate_condition(&cond.condition, ctx, item) {
                        cond.when_true.clone()
                    } else {
                        cond.when_false.clone()
                    }
                }
                StyleValue::Calculated(calc) => match calc.calculate {
                    CalculateKind::Percentage => Value::String(self.percentage(calc, ctx, item)),
                    CalculateKind::Unsupported => continue,
                },
            };

            if !value.is_null() {
                resolved.insert(property.clone(), value);
            }
        }

        resolved
    }

    /// `(value / max) * 100` with two decimals; `0%` when either side is
    /// not a number or `max` is not positive.
    fn percentage(&self, calc: &CalculatedStyle, ctx: &DataContext, item: Option<&Value>) -> String {
        let value = parse_number(&self.operand_text(&calc.value, ctx, item));
        let max = parse_number(&self.operand_text(&calc.max, ctx, item));

        match (value, max) {
            (Some(value), Some(max)) if max > 0.0 => {
                let pct = value / max * 100.0;
                if pct.is_finite() {
                    format!("{}%", to_fixed(pct, 2))
                } else {
                    "0%".to_string()
                }
            }
            _ => "0%".to_string(),
        }
    }

    fn operand_text(&self, operand: &Value, ctx: &DataContext, item: Option<&Value>) -> String {
        match operand {
            Value::String(template) => self.interpolate(template, ctx, item),
            other => value_to_text(other),
        }
    }
}

/// Strict equality: same type and value; numbers compare by value.
fn strict_equals(left: Option<&Value>, right: &Value) -> bool {
    match (left, right) {
        (None, _) => false,
        (Some(Value::Number(l)), Value::Number(r)) => l.as_f64() == r.as_f64(),
        (Some(l), r) => l == r,
    }
}

/// Numeric comparison after coercing both sides. Unordered (NaN) when
/// either side is not a number.
fn compare(left: Option<&Value>, right: &Value) -> Option<Ordering> {
    let l = comparison_number(left)?;
    let r = comparison_number(Some(right))?;
    l.partial_cmp(&r)
}

fn comparison_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Null => Some(0.0),
        other => to_number(other),
    }
}

/// Evaluate a placeholder body without an observer
pub fn evaluate_expression(expr: &str, ctx: &DataContext, item: Option<&Value>) -> String {
    Evaluator::default().evaluate_expression(expr, ctx, item)
}

/// Interpolate a text template without an observer
pub fn interpolate(template: &str, ctx: &DataContext, item: Option<&Value>) -> String {
    Evaluator::default().interpolate(template, ctx, item)
}

/// Evaluate a condition without an observer
pub fn evaluate_condition(condition: &Condition, ctx: &DataContext, item: Option<&Value>) -> bool {
    Evaluator::default().evaluate_condition(condition, ctx, item)
}

/// Resolve a style map without an observer
pub fn resolve_style(
    style: &BTreeMap<String, StyleValue>,
    ctx: &DataContext,
    item: Option<&Value>,
) -> BTreeMap<String, Value> {
    Evaluator::default().resolve_style(style, ctx, item)
}
