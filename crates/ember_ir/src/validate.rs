//! Structural validation of a design.

use crate::design::Design;
use crate::error::ElabError;
use crate::expr::Expr;
use crate::ids::{ArrayId, ModuleId, RuleId, SignalId};
use crate::signal::SignalKind;
use crate::stmt::{Stmt, Target};
use crate::types::Type;
use std::collections::HashSet;

pub(crate) fn validate(design: &Design) -> Result<(), ElabError> {
    check_types(design)?;
    check_ownership(design)?;
    check_signals(design)?;
    check_arrays(design)?;
    check_connections(design)?;
    for rule in design.rules.ids() {
        check_rule_scope(design, rule)?;
    }
    Ok(())
}

fn invalid(kind: &'static str, index: u32) -> ElabError {
    ElabError::InvalidId { kind, index }
}

/// Struct fields must refer to previously interned types, which rules out
/// recursive types in deserialized designs.
fn check_types(design: &Design) -> Result<(), ElabError> {
    for i in 0..design.types.len() {
        let id = crate::ids::TypeId::from_raw(i as u32);
        if let Type::Struct { fields, .. } = design.types.get(id) {
            for (_, field_ty) in fields {
                if field_ty.index() >= i {
                    return Err(invalid("type", field_ty.as_raw()));
                }
            }
        }
    }
    Ok(())
}

fn check_ownership(design: &Design) -> Result<(), ElabError> {
    if !design.modules.contains(design.top) {
        return Err(invalid("module", design.top.as_raw()));
    }
    if design.modules[design.top].parent.is_some() {
        return Err(ElabError::OwnershipViolation {
            module: design.module_path(design.top),
        });
    }

    let mut seen: HashSet<ModuleId> = HashSet::new();
    let mut stack = vec![design.top];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            return Err(ElabError::OwnershipViolation {
                module: design.module_path(id),
            });
        }
        let module = &design.modules[id];
        for child in &module.children {
            if !design.modules.contains(*child) {
                return Err(invalid("module", child.as_raw()));
            }
            if design.modules[*child].parent != Some(id) {
                return Err(ElabError::OwnershipViolation {
                    module: design.module_path(*child),
                });
            }
            stack.push(*child);
        }
        for s in &module.signals {
            match design.signals.try_get(*s) {
                Some(sig) if sig.owner == id => {}
                Some(_) => {
                    return Err(ElabError::OwnershipViolation {
                        module: design.module_path(id),
                    })
                }
                None => return Err(invalid("signal", s.as_raw())),
            }
        }
        for a in &module.arrays {
            match design.arrays.try_get(*a) {
                Some(arr) if arr.owner == id => {}
                Some(_) => {
                    return Err(ElabError::OwnershipViolation {
                        module: design.module_path(id),
                    })
                }
                None => return Err(invalid("array", a.as_raw())),
            }
        }
        for r in &module.rules {
            match design.rules.try_get(*r) {
                Some(rule) if rule.owner == id => {}
                Some(_) => {
                    return Err(ElabError::OwnershipViolation {
                        module: design.module_path(id),
                    })
                }
                None => return Err(invalid("rule", r.as_raw())),
            }
        }
    }

    // every module must hang off the tree rooted at top
    if let Some(orphan) = design.modules.ids().find(|m| !seen.contains(m)) {
        return Err(ElabError::OwnershipViolation {
            module: design.module_path(orphan),
        });
    }
    Ok(())
}

fn check_signals(design: &Design) -> Result<(), ElabError> {
    for (id, sig) in design.signals.iter() {
        if !design.modules.contains(sig.owner) {
            return Err(invalid("module", sig.owner.as_raw()));
        }
        if !design.types.contains(sig.ty) {
            return Err(invalid("type", sig.ty.as_raw()));
        }
        let width = design.types.bit_width(sig.ty);
        if width == 0 {
            return Err(ElabError::ZeroWidth {
                signal: design.signal_path(id),
            });
        }
        match &sig.init {
            Some(init) if init.width() != width => {
                return Err(ElabError::InitWidth {
                    signal: design.signal_path(id),
                    expected: width,
                    actual: init.width(),
                })
            }
            None if sig.kind == SignalKind::Constant => {
                return Err(ElabError::MissingConstantValue {
                    signal: design.signal_path(id),
                })
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_arrays(design: &Design) -> Result<(), ElabError> {
    for (id, array) in design.arrays.iter() {
        let malformed = |reason: &str| ElabError::MalformedArray {
            array: design.array_path(id),
            reason: reason.to_string(),
        };
        let Some(first) = array.elements.first() else {
            return Err(malformed("it has no elements"));
        };
        for e in &array.elements {
            if !design.signals.contains(*e) {
                return Err(invalid("signal", e.as_raw()));
            }
            if !design.signal_visible_from(*e, array.owner) {
                return Err(ElabError::UndeclaredSignal {
                    user: design.array_path(id),
                    signal: design.signal_path(*e),
                });
            }
            if design.signals[*e].ty != design.signals[*first].ty {
                return Err(malformed("its elements differ in type"));
            }
        }
    }
    Ok(())
}

fn check_connections(design: &Design) -> Result<(), ElabError> {
    for (mid, module) in design.modules.iter() {
        for conn in &module.connections {
            for end in [conn.a, conn.b] {
                if !design.signals.contains(end) {
                    return Err(invalid("signal", end.as_raw()));
                }
                if !design.signal_visible_from(end, mid) {
                    return Err(ElabError::UndeclaredSignal {
                        user: design.module_path(mid),
                        signal: design.signal_path(end),
                    });
                }
            }
            let (wa, wb) = (design.signal_width(conn.a), design.signal_width(conn.b));
            if wa != wb {
                return Err(ElabError::ConnectionWidth {
                    a: design.signal_path(conn.a),
                    a_width: wa,
                    b: design.signal_path(conn.b),
                    b_width: wb,
                });
            }
        }
    }
    Ok(())
}

fn check_rule_scope(design: &Design, rule: RuleId) -> Result<(), ElabError> {
    let owner = design.rules[rule].owner;
    let mut result = Ok(());
    let mut check_signal = |s: SignalId| {
        if result.is_err() {
            return;
        }
        if !design.signals.contains(s) {
            result = Err(invalid("signal", s.as_raw()));
        } else if !design.signal_visible_from(s, owner) {
            result = Err(ElabError::UndeclaredSignal {
                user: design.rule_path(rule),
                signal: design.signal_path(s),
            });
        }
    };
    let mut arrays: Vec<ArrayId> = Vec::new();

    design.rules[rule].body.walk_exprs(&mut |e| match e {
        Expr::Signal(s) => check_signal(*s),
        Expr::Element { array, .. } => arrays.push(*array),
        _ => {}
    });
    design.rules[rule].body.walk(&mut |stmt| {
        if let Stmt::Assign { target, .. } | Stmt::AssignNext { target, .. } = stmt {
            let mut t = target;
            loop {
                match t {
                    Target::Signal(s) => {
                        check_signal(*s);
                        break;
                    }
                    Target::Element { array, .. } => {
                        arrays.push(*array);
                        break;
                    }
                    Target::Local(_) => break,
                    Target::Index { base, .. }
                    | Target::Slice { base, .. }
                    | Target::Field { base, .. } => t = base.as_ref(),
                }
            }
        }
    });
    result?;

    for array in arrays {
        if !design.arrays.contains(array) {
            return Err(invalid("array", array.as_raw()));
        }
        if !design.array_visible_from(array, owner) {
            return Err(ElabError::UndeclaredSignal {
                user: design.rule_path(rule),
                signal: design.array_path(array),
            });
        }
    }
    Ok(())
}
