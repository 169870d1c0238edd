//! Conversion rules
//!
//! Every (source kind, target kind) pair maps to one [`ConversionRule`]. The
//! binder ranks overload candidates by the rules their arguments need.
//!
//! ## Numeric matrix
//!
//! | From \ To          | same  | wider integral | narrower integral | float        | decimal      |
//! |--------------------|-------|----------------|-------------------|--------------|--------------|
//! | integral           | Exact | Widening       | NarrowingChecked  | Widening     | Widening     |
//! | Single             | Exact | Rejected       | Rejected          | Widening (D) | Narrowing    |
//! | Double             | Exact | Rejected       | Rejected          | Narrowing (S)| Narrowing    |
//! | Decimal            | Exact | Rejected       | Rejected          | Narrowing    | -            |
//!
//! Script integers carry a nominal kind: `Int32` when the value fits,
//! `Int64` otherwise. Script floating-point values are always `Double`, even
//! when they have no fractional part, so they never bind to integral targets.

use std::cmp::Ordering;

use hostbind_sdk::NumericKind;

/// How a value reaches a target type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConversionRule {
    /// Same kind
    Exact,
    /// Lossless
    Widening,
    /// Allowed when the value fits; range-checked
    NarrowingChecked,
    /// Not convertible
    Rejected,
}

impl ConversionRule {
    /// Is the conversion allowed at all?
    pub fn is_allowed(self) -> bool {
        self != ConversionRule::Rejected
    }

    /// Weight used when summing over an argument list
    pub(crate) fn weight(self) -> u32 {
        match self {
            ConversionRule::Exact => 0,
            ConversionRule::Widening => 1,
            ConversionRule::NarrowingChecked => 4,
            ConversionRule::Rejected => u16::MAX as u32,
        }
    }
}

/// Nominal kind of a script integer
pub fn script_int_kind(value: i64) -> NumericKind {
    if NumericKind::Int32.contains(value as i128) {
        NumericKind::Int32
    } else {
        NumericKind::Int64
    }
}

/// Does every value of `from` fit `to`? Both must be integral.
fn integral_subset(from: NumericKind, to: NumericKind) -> bool {
    match (from.integral_range(), to.integral_range()) {
        (Some((flo, fhi)), Some((tlo, thi))) => flo >= tlo && fhi <= thi,
        _ => false,
    }
}

/// Rule for a host numeric of kind `from` reaching kind `to`
pub fn numeric_rule(from: NumericKind, to: NumericKind) -> ConversionRule {
    use NumericKind::*;

    if from == to {
        return ConversionRule::Exact;
    }
    match (from.is_integral(), to.is_integral()) {
        (true, true) => {
            if integral_subset(from, to) {
                ConversionRule::Widening
            } else {
                ConversionRule::NarrowingChecked
            }
        }
        (true, false) => ConversionRule::Widening,
        (false, true) => ConversionRule::Rejected,
        (false, false) => match (from, to) {
            (Single, Double) => ConversionRule::Widening,
            _ => ConversionRule::NarrowingChecked,
        },
    }
}

/// Rule for a script integer with value `value` reaching kind `to`
pub fn script_int_rule(value: i64, to: NumericKind) -> ConversionRule {
    let nominal = script_int_kind(value);
    if to.is_integral() {
        if to == nominal {
            ConversionRule::Exact
        } else if integral_subset(nominal, to) {
            ConversionRule::Widening
        } else {
            ConversionRule::NarrowingChecked
        }
    } else {
        ConversionRule::Widening
    }
}

/// Rule for a script floating-point value reaching kind `to`
pub fn script_double_rule(to: NumericKind) -> ConversionRule {
    match to {
        NumericKind::Double => ConversionRule::Exact,
        NumericKind::Single | NumericKind::Decimal => ConversionRule::NarrowingChecked,
        _ => ConversionRule::Rejected,
    }
}

/// Tie-break penalty for numeric targets: prefer integral over floating
/// targets, and `Double` over `Single` over `Decimal`.
pub(crate) fn numeric_penalty(to: NumericKind) -> u32 {
    match to {
        NumericKind::Double => 1,
        NumericKind::Single => 2,
        NumericKind::Decimal => 3,
        _ => 0,
    }
}

// ============================================================================
// Candidate cost
// ============================================================================

/// Cost of binding one overload candidate; lower is better
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindCost {
    /// Worst rule over all arguments
    pub worst: ConversionRule,
    /// Sum of rule weights
    pub total: u32,
    /// Sum of tie-break penalties
    pub penalty: u32,
    /// A params-array collected loose arguments
    pub expanded: bool,
    /// Optional parameters filled from their defaults
    pub defaults: usize,
}

impl BindCost {
    /// Cost of a parameterless binding
    pub fn zero() -> Self {
        BindCost {
            worst: ConversionRule::Exact,
            total: 0,
            penalty: 0,
            expanded: false,
            defaults: 0,
        }
    }

    /// Account for one converted argument
    pub fn add(&mut self, rule: ConversionRule, penalty: u32) {
        self.worst = self.worst.max(rule);
        self.total += rule.weight();
        self.penalty += penalty;
    }
}

impl PartialOrd for BindCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BindCost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.worst
            .cmp(&other.worst)
            .then(self.total.cmp(&other.total))
            .then(self.penalty.cmp(&other.penalty))
            .then(self.expanded.cmp(&other.expanded))
            .then(self.defaults.cmp(&other.defaults))
    }
}
