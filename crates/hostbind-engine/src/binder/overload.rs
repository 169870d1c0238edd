//! Overload resolution
//!
//! Each candidate's parameter list is matched against the script arguments:
//! arity first (optional parameters and a trailing params-array widen it),
//! then per-argument conversion. Candidates are ranked by [`BindCost`]; a
//! unique best candidate wins.
//!
//! By-ref and out parameters bind to `HostVariable` proxies passed by script;
//! the variable receives the value the callee left in the slot.

use hostbind_sdk::{HostArray, HostValue, HostVariable, ParamInfo, ParamMode, TypeRef};

use super::table::Slot;
use crate::engine::EngineCore;
use crate::error::{ConversionError, ScriptError, ScriptResult};
use crate::marshal::{BindCost, ConversionRule};
use crate::value::ScriptValue;

/// Arguments converted for one candidate
#[derive(Debug)]
pub(crate) struct Prepared {
    /// One value per parameter
    pub args: Vec<HostValue>,
    /// Ranking cost
    pub cost: BindCost,
    /// Parameter slots to write back into variables after the call
    pub cells: Vec<(usize, HostVariable)>,
}

impl Prepared {
    /// No arguments
    pub(crate) fn empty() -> Self {
        Prepared {
            args: Vec::new(),
            cost: BindCost::zero(),
            cells: Vec::new(),
        }
    }

    /// Copy by-ref and out slots back into their variables
    pub(crate) fn write_back(&self) {
        for (index, cell) in &self.cells {
            if let Some(value) = self.args.get(*index) {
                cell.set(value.clone());
            }
        }
    }
}

/// Why a candidate did not apply
#[derive(Debug)]
pub(crate) enum Mismatch {
    /// Wrong number of arguments
    Arity,
    /// An argument did not convert
    Conversion(ConversionError),
}

impl From<ConversionError> for Mismatch {
    fn from(err: ConversionError) -> Self {
        Mismatch::Conversion(err)
    }
}

fn accepts_arity(params: &[ParamInfo], count: usize) -> bool {
    let min = params.iter().filter(|p| !p.is_optional()).count();
    let unbounded = params.last().map(|p| p.is_params).unwrap_or(false);
    count >= min && (unbounded || count <= params.len())
}

impl EngineCore {
    /// Convert `args` for `params`
    pub(crate) fn prepare_args(&self, params: &[ParamInfo], args: &[ScriptValue]) -> Result<Prepared, Mismatch> {
        if !accepts_arity(params, args.len()) {
            return Err(Mismatch::Arity);
        }

        let mut cost = BindCost::zero();
        let mut values = Vec::with_capacity(params.len());
        let mut cells = Vec::new();

        for (i, param) in params.iter().enumerate() {
            if param.is_params {
                let rest = args.get(i..).unwrap_or(&[]);
                values.push(self.collect_params(param, rest, &mut cost)?);
                break;
            }

            let arg = match args.get(i) {
                Some(arg) => arg,
                None => {
                    values.push(param.default.clone().unwrap_or(HostValue::Null));
                    cost.defaults += 1;
                    continue;
                }
            };

            match param.mode {
                ParamMode::In => {
                    let converted = self.to_host(arg, &param.ty)?;
                    cost.add(converted.rule, converted.penalty);
                    values.push(converted.value);
                }
                ParamMode::Ref | ParamMode::Out => match variable_of(arg) {
                    Some(cell) => {
                        if cell.ty() != &param.ty {
                            return Err(ConversionError::incompatible(
                                format!("HostVariable<{}>", cell.ty()),
                                &param.ty,
                            )
                            .into());
                        }
                        cost.add(ConversionRule::Exact, 0);
                        values.push(match param.mode {
                            ParamMode::Out => HostValue::default_for(&param.ty),
                            _ => cell.get(),
                        });
                        cells.push((i, cell));
                    }
                    None if param.mode == ParamMode::Out => {
                        cost.add(ConversionRule::Widening, 0);
                        values.push(HostValue::default_for(&param.ty));
                    }
                    None => {
                        let converted = self.to_host(arg, &param.ty)?;
                        cost.add(converted.rule, converted.penalty);
                        values.push(converted.value);
                    }
                },
            }
        }

        Ok(Prepared {
            args: values,
            cost,
            cells,
        })
    }

    fn collect_params(
        &self,
        param: &ParamInfo,
        rest: &[ScriptValue],
        cost: &mut BindCost,
    ) -> Result<HostValue, Mismatch> {
        if let [single] = rest {
            if let Ok(direct) = self.to_host(single, &param.ty) {
                cost.add(direct.rule, direct.penalty);
                return Ok(direct.value);
            }
        }
        let element = param.params_element().cloned().unwrap_or(TypeRef::Object);
        let mut items = Vec::with_capacity(rest.len());
        for arg in rest {
            let converted = self.to_host(arg, &element)?;
            cost.add(converted.rule, converted.penalty);
            items.push(converted.value);
        }
        cost.expanded = true;
        Ok(HostValue::Array(HostArray::new(element, items)))
    }

    /// Pick the best of `candidates` for `args`.
    ///
    /// `declared` counts every overload with this name, hidden ones included.
    /// With a single declared overload whose arity fits, its conversion error
    /// is reported; otherwise a failed match is a missing member.
    pub(crate) fn resolve<'s>(
        &self,
        name: &str,
        candidates: &[&'s Slot],
        declared: usize,
        args: &[ScriptValue],
    ) -> ScriptResult<(&'s Slot, Prepared)> {
        let mut best: Vec<(&'s Slot, Prepared)> = Vec::new();
        let mut conversion_error = None;

        for slot in candidates {
            match self.prepare_args(slot.imp.params(), args) {
                Ok(prepared) => {
                    let ordering = best.first().map(|(_, b)| prepared.cost.cmp(&b.cost));
                    match ordering {
                        None | Some(std::cmp::Ordering::Equal) => best.push((slot, prepared)),
                        Some(std::cmp::Ordering::Less) => {
                            best.clear();
                            best.push((slot, prepared));
                        }
                        Some(std::cmp::Ordering::Greater) => {}
                    }
                }
                Err(Mismatch::Conversion(err)) => {
                    if candidates.len() == 1 && declared == 1 {
                        conversion_error = Some(err);
                    }
                }
                Err(Mismatch::Arity) => {}
            }
        }

        match best.len() {
            0 => Err(match conversion_error {
                Some(err) => ScriptError::ArgumentConversion(err),
                None => ScriptError::MissingMember(name.to_string()),
            }),
            1 => Ok(best.remove(0)),
            _ => Err(ScriptError::AmbiguousMember(name.to_string())),
        }
    }
}

/// Host variable behind a proxy argument
fn variable_of(arg: &ScriptValue) -> Option<HostVariable> {
    match arg.as_host_item()?.target().ok()? {
        HostValue::Variable(cell) => Some(cell),
        _ => None,
    }
}
