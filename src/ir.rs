// Static type shape of a schema, for type synthesis. No serde_json::Value here.

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Never,                   // contradictory intersection (e.g. string & boolean)
    Any,
    Null,
    Bool,
    Integer { min: Option<i64>, max: Option<i64> },
    Number  { min: Option<f64>, max: Option<f64> },
    String  { enum_: Vec<String>, pattern: Option<String>, format: Option<String> },
    Literal(Literal),        // one exact non-string value
    ArrayList {
        item: Box<Ty>,
        min_items: Option<u64>,
        max_items: Option<u64>,
        unique: bool,
    },
    Object {
        fields: Vec<Field>,  // declaration order
        open: bool,          // undeclared keys allowed
    },
    OneOf(Vec<Ty>),
    Nullable(Box<Ty>),
    Named(String),           // a definition, emitted as its own type
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    pub required: bool,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    /// Arrays and objects, as compact JSON text.
    Json(String),
}

/// The reflected target plus one type per definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub root: Ty,
    pub definitions: IndexMap<String, Ty>,
}

impl Ty {
    pub fn field(&self, name: &str) -> Option<&Field> {
        match self {
            Ty::Object { fields, .. } => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }
}
