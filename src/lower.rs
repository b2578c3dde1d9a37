use indexmap::IndexMap;
use serde_json::Value;

use crate::defs::DefinitionStore;
use crate::error::{Result, SchemaError};
use crate::ir::{Field, Literal, Reflection, Ty};
use crate::schema::{Kind, Schema};

/// Lower `root` and every definition in `store`.
pub fn reflect(store: &DefinitionStore, root: &Schema) -> Result<Reflection> {
    let mut lw = Lowerer { store, expanding: Vec::new() };
    let root = lw.lower(root)?;
    let mut definitions = IndexMap::with_capacity(store.len());
    for (name, schema) in store.iter() {
        lw.expanding.push(name.to_string());
        let ty = lw.lower(schema)?;
        lw.expanding.pop();
        definitions.insert(name.to_string(), ty);
    }
    Ok(Reflection { root, definitions })
}

struct Lowerer<'a> {
    store: &'a DefinitionStore,
    // definitions currently being inlined for an intersection
    expanding: Vec<String>,
}

impl Lowerer<'_> {
    fn lower(&mut self, schema: &Schema) -> Result<Ty> {
        let ty = match schema.kind() {
            Kind::Any => Ty::Any,
            Kind::Null => Ty::Null,
            Kind::Boolean => Ty::Bool,
            Kind::String(r) => Ty::String {
                enum_: Vec::new(),
                pattern: r.pattern.clone(),
                format: r.format.clone(),
            },
            Kind::Number(r) => Ty::Number {
                min: tightest(r.minimum, r.exclusive_minimum, f64::max),
                max: tightest(r.maximum, r.exclusive_maximum, f64::min),
            },
            Kind::Integer(r) => {
                // An exclusive bound moves to the next integer inside the range.
                let min = tightest(r.minimum.map(f64::ceil), r.exclusive_minimum.map(|x| x.floor() + 1.0), f64::max);
                let max = tightest(r.maximum.map(f64::floor), r.exclusive_maximum.map(|x| x.ceil() - 1.0), f64::min);
                Ty::Integer { min: min.map(|x| x as i64), max: max.map(|x| x as i64) }
            }
            Kind::Object(obj) => {
                let mut fields = Vec::with_capacity(obj.properties.len());
                for (name, prop) in &obj.properties {
                    fields.push(Field {
                        name: name.clone(),
                        ty: self.guarded(|lw| lw.lower(&prop.schema))?,
                        required: prop.required,
                        doc: prop.schema.annotations().description.clone(),
                    });
                }
                Ty::Object { fields, open: obj.additional_properties != Some(false) }
            }
            Kind::Array(arr) => Ty::ArrayList {
                item: Box::new(self.guarded(|lw| lw.lower(&arr.items))?),
                min_items: arr.min_items,
                max_items: arr.max_items,
                unique: arr.unique_items,
            },
            Kind::Union(members) => {
                let arms = members.iter().map(|m| self.lower(m)).collect::<Result<Vec<_>>>()?;
                simplify_unions(arms)
            }
            Kind::Intersection(members) => {
                let mut merged = Ty::Any;
                for m in members {
                    let next = self.lower_resolved(m)?;
                    merged = merge(merged, next);
                }
                merged
            }
            Kind::LiteralUnion(values) => lower_literals(values),
            Kind::Reference(name) => {
                if !self.store.contains(name) {
                    return Err(SchemaError::UnknownDefinition { name: name.clone() });
                }
                Ty::Named(name.clone())
            }
        };
        Ok(ty)
    }

    // Below a property or an array item a reference may point back at a
    // definition that is still being inlined.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::take(&mut self.expanding);
        let out = f(self);
        self.expanding = saved;
        out
    }

    // Intersections need the structure behind a reference, not its name,
    // including references that are arms of a union.
    fn lower_resolved(&mut self, schema: &Schema) -> Result<Ty> {
        let name = match schema.kind() {
            Kind::Reference(name) => name,
            Kind::Union(members) => {
                let arms = members.iter().map(|m| self.lower_resolved(m)).collect::<Result<Vec<_>>>()?;
                return Ok(simplify_unions(arms));
            }
            _ => return self.lower(schema),
        };
        if self.expanding.iter().any(|n| n == name) {
            let mut chain = self.expanding.clone();
            chain.push(name.clone());
            return Err(SchemaError::CyclicReference { chain });
        }
        let target = self
            .store
            .get(name)
            .ok_or_else(|| SchemaError::UnknownDefinition { name: name.clone() })?;
        self.expanding.push(name.clone());
        let ty = self.lower_resolved(target);
        self.expanding.pop();
        ty
    }
}

fn tightest(a: Option<f64>, b: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

fn lower_literals(values: &[Value]) -> Ty {
    let strings: Vec<String> = values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
    let mut arms = Vec::new();
    if !strings.is_empty() {
        arms.push(Ty::String { enum_: strings, pattern: None, format: None });
    }
    for v in values {
        match v {
            Value::String(_) => {}
            Value::Null => arms.push(Ty::Null),
            Value::Bool(b) => arms.push(Ty::Literal(Literal::Bool(*b))),
            Value::Number(n) => arms.push(Ty::Literal(Literal::Number(n.as_f64().unwrap_or(f64::NAN)))),
            other => arms.push(Ty::Literal(Literal::Json(other.to_string()))),
        }
    }
    if arms.is_empty() {
        Ty::Never
    } else {
        simplify_unions(arms)
    }
}

// Flatten nested unions, drop repeats, and collapse X ∪ null → Nullable(X).
fn simplify_unions(arms: Vec<Ty>) -> Ty {
    let mut flat: Vec<Ty> = Vec::new();
    let mut had_null = false;
    let mut push = |t: Ty, flat: &mut Vec<Ty>| {
        if matches!(t, Ty::Null) {
            had_null = true;
        } else if !flat.contains(&t) {
            flat.push(t);
        }
    };
    for arm in arms {
        match arm {
            Ty::OneOf(inner) => inner.into_iter().for_each(|t| push(t, &mut flat)),
            Ty::Nullable(inner) => {
                push(Ty::Null, &mut flat);
                push(*inner, &mut flat);
            }
            t => push(t, &mut flat),
        }
    }
    if flat.iter().any(|t| matches!(t, Ty::Any)) {
        return Ty::Any;
    }

    let core = match flat.len() {
        0 => return if had_null { Ty::Null } else { Ty::Never },
        1 => flat.remove(0),
        _ => Ty::OneOf(flat),
    };

    if had_null {
        Ty::Nullable(Box::new(core))
    } else {
        core
    }
}

/// Both sides must hold; on conflicting details the later side wins.
fn merge(a: Ty, b: Ty) -> Ty {
    match (a, b) {
        (Ty::Any, t) | (t, Ty::Any) => t,
        (Ty::Never, _) | (_, Ty::Never) => Ty::Never,
        (Ty::Object { fields: mut fa, open: oa }, Ty::Object { fields: fb, open: ob }) => {
            for f in fb {
                match fa.iter_mut().find(|e| e.name == f.name) {
                    Some(existing) => {
                        existing.required |= f.required;
                        existing.ty = f.ty;
                        if f.doc.is_some() {
                            existing.doc = f.doc;
                        }
                    }
                    None => fa.push(f),
                }
            }
            Ty::Object { fields: fa, open: oa && ob }
        }
        (Ty::Nullable(x), Ty::Nullable(y)) => Ty::Nullable(Box::new(merge(*x, *y))),
        (Ty::Nullable(_), Ty::Null) | (Ty::Null, Ty::Nullable(_)) => Ty::Null,
        (Ty::Nullable(x), t) => merge(*x, t),
        (t, Ty::Nullable(y)) => merge(t, *y),
        // Distribute over union arms; arms that cannot hold drop out.
        (Ty::OneOf(arms), t) => {
            simplify_unions(arms.into_iter().map(|a| merge(a, t.clone())).filter(|a| *a != Ty::Never).collect())
        }
        (t, Ty::OneOf(arms)) => {
            simplify_unions(arms.into_iter().map(|b| merge(t.clone(), b)).filter(|b| *b != Ty::Never).collect())
        }
        (Ty::Integer { .. }, t @ Ty::Integer { .. }) => t,
        (i @ Ty::Integer { .. }, Ty::Number { .. }) | (Ty::Number { .. }, i @ Ty::Integer { .. }) => i,
        (Ty::Number { .. }, t @ Ty::Number { .. }) => t,
        (Ty::String { .. }, t @ Ty::String { .. }) => t,
        (Ty::ArrayList { .. }, t @ Ty::ArrayList { .. }) => t,
        (a, b) if a == b => b,
        _ => Ty::Never,
    }
}

// ------------------------------- Tests ------------------------------------ //
