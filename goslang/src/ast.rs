//! Typed syntax tree built from the JSON the external parser produces.
//!
//! Conversion runs in two steps: a scan for `error` nodes anywhere in the
//! document, then a structural walk that rejects anything that does not
//! have the expected shape.
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Native, PrimitiveType};

#[derive(Debug, Error)]
pub enum AstError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("malformed syntax tree: {0}")]
    Malformed(String),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

fn malformed(message: impl Into<String>) -> AstError {
    AstError::Malformed(message.into())
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(String),
    Func(Box<FuncType>),
}

impl TypeExpr {
    /// The scalar type this expression names, if any.
    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self {
            TypeExpr::Named(name) => PrimitiveType::from_name(name),
            TypeExpr::Func(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncType {
    pub params: Vec<String>,
    pub param_types: Vec<TypeExpr>,
    pub results: Vec<String>,
    pub result_types: Vec<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spec {
    pub idents: Vec<String>,
    pub types: Vec<TypeExpr>,
    pub vals: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal {
        value: Native,
        ty: PrimitiveType,
    },
    Ident(String),
    Unary {
        op: String,
        operand: Box<Node>,
    },
    Binary {
        op: String,
        left: Box<Node>,
        right: Box<Node>,
    },
    Call {
        fun: Box<Node>,
        args: Vec<Node>,
    },
    Assign {
        idents: Vec<String>,
        vals: Vec<Node>,
    },
    FuncLit {
        ty: FuncType,
        body: Box<Node>,
    },
    Seq(Vec<Node>),
    Block(Box<Node>),
    VarDecl(Spec),
    ConstDecl(Spec),
    FuncDecl {
        name: String,
        ty: FuncType,
        body: Box<Node>,
    },
    Return(Vec<Node>),
    Package(Vec<Node>),
    If {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Go(Box<Node>),
    Nop,
}

impl Node {
    pub fn parse(text: &str) -> Result<Self, AstError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, AstError> {
        find_error(value)?;
        convert(value)
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Node::Call { .. })
    }
}

/// Fails with the message of the first `error` node, depth first.
fn find_error(value: &Value) -> Result<(), AstError> {
    match value {
        Value::Object(map) => {
            if map.get("tag").and_then(Value::as_str) == Some("error") {
                let message = match map.get("val") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::from("unknown error"),
                };
                return Err(AstError::Parse(message));
            }
            map.values().try_for_each(find_error)
        }
        Value::Array(items) => items.iter().try_for_each(find_error),
        _ => Ok(()),
    }
}

fn object(value: &Value) -> Result<&Map<String, Value>, AstError> {
    value
        .as_object()
        .ok_or_else(|| malformed(format!("expected a node, found {value}")))
}

fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a Value, AstError> {
    map.get(key)
        .ok_or_else(|| malformed(format!("missing field `{key}`")))
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a str, AstError> {
    field(map, key)?
        .as_str()
        .ok_or_else(|| malformed(format!("field `{key}` is not a string")))
}

fn array_field<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], AstError> {
    match map.get(key) {
        Some(Value::Array(items)) => Ok(items),
        // the parser emits null for empty lists in some positions
        Some(Value::Null) | None => Ok(&[]),
        Some(_) => Err(malformed(format!("field `{key}` is not a list"))),
    }
}

fn node_field(map: &Map<String, Value>, key: &str) -> Result<Box<Node>, AstError> {
    convert(field(map, key)?).map(Box::new)
}

fn nodes(items: &[Value]) -> Result<Vec<Node>, AstError> {
    items.iter().map(convert).collect()
}

fn ident_name(value: &Value) -> Result<String, AstError> {
    match value {
        Value::String(name) => Ok(name.clone()),
        _ => match convert(value)? {
            Node::Ident(name) => Ok(name),
            other => Err(malformed(format!("expected an identifier, found {other:?}"))),
        },
    }
}

fn ident_names(items: &[Value]) -> Result<Vec<String>, AstError> {
    items.iter().map(ident_name).collect()
}

fn type_expr(value: &Value) -> Result<TypeExpr, AstError> {
    let map = object(value)?;
    match str_field(map, "tag")? {
        "ident" => Ok(TypeExpr::Named(str_field(map, "val")?.to_owned())),
        "funcType" => func_type(value).map(|ty| TypeExpr::Func(Box::new(ty))),
        other => Err(malformed(format!("unsupported type expression `{other}`"))),
    }
}

fn type_exprs(items: &[Value]) -> Result<Vec<TypeExpr>, AstError> {
    items.iter().map(type_expr).collect()
}

fn func_type(value: &Value) -> Result<FuncType, AstError> {
    let map = object(value)?;
    if str_field(map, "tag")? != "funcType" {
        return Err(malformed("expected a funcType"));
    }
    Ok(FuncType {
        params: ident_names(array_field(map, "params")?)?,
        param_types: type_exprs(array_field(map, "paramTypes")?)?,
        results: ident_names(array_field(map, "results")?)?,
        result_types: type_exprs(array_field(map, "resultTypes")?)?,
    })
}

fn spec(value: &Value) -> Result<Spec, AstError> {
    let map = object(value)?;
    Ok(Spec {
        idents: ident_names(array_field(map, "idents")?)?,
        types: type_exprs(array_field(map, "types")?)?,
        vals: nodes(array_field(map, "vals")?)?,
    })
}

fn literal(map: &Map<String, Value>) -> Result<Node, AstError> {
    let kind = str_field(map, "kind")?;
    let ty = PrimitiveType::from_name(kind)
        .ok_or_else(|| malformed(format!("unknown literal kind `{kind}`")))?;
    let raw = field(map, "val")?;
    let value = if ty.is_integer() {
        raw.as_i64().map(Native::Int)
    } else if ty == PrimitiveType::Float64 {
        raw.as_f64().map(Native::Float)
    } else {
        raw.as_bool().map(Native::Bool)
    };
    let value = value.ok_or_else(|| malformed(format!("invalid {kind} literal {raw}")))?;
    Ok(Node::Literal { value, ty })
}

fn convert(value: &Value) -> Result<Node, AstError> {
    let map = object(value)?;
    let tag = str_field(map, "tag")?;
    let node = match tag {
        "lit" => literal(map)?,
        "ident" => Node::Ident(str_field(map, "val")?.to_owned()),
        "unop" => Node::Unary {
            op: str_field(map, "op")?.to_owned(),
            operand: node_field(map, "op1")?,
        },
        "binop" => Node::Binary {
            op: str_field(map, "op")?.to_owned(),
            left: node_field(map, "op1")?,
            right: node_field(map, "op2")?,
        },
        "call" => Node::Call {
            fun: node_field(map, "fun")?,
            args: nodes(array_field(map, "args")?)?,
        },
        "assign" => Node::Assign {
            idents: ident_names(array_field(map, "idents")?)?,
            vals: nodes(array_field(map, "vals")?)?,
        },
        "funcLit" => Node::FuncLit {
            ty: func_type(field(map, "type")?)?,
            body: node_field(map, "body")?,
        },
        "seq" => Node::Seq(nodes(array_field(map, "stmts")?)?),
        "block" => Node::Block(node_field(map, "body")?),
        "varDecl" => Node::VarDecl(spec(field(map, "spec")?)?),
        "constDecl" => Node::ConstDecl(spec(field(map, "spec")?)?),
        "funcDecl" => Node::FuncDecl {
            name: ident_name(field(map, "name")?)?,
            ty: func_type(field(map, "type")?)?,
            body: node_field(map, "body")?,
        },
        "return" => Node::Return(nodes(array_field(map, "results")?)?),
        "package" => Node::Package(nodes(array_field(map, "decls")?)?),
        "if" => Node::If {
            cond: node_field(map, "cond")?,
            then: node_field(map, "then")?,
            otherwise: match map.get("else") {
                Some(value) => convert(value).map(Box::new)?,
                None => Box::new(Node::Nop),
            },
        },
        "go" => Node::Go(node_field(map, "call")?),
        "nop" => Node::Nop,
        other => return Err(malformed(format!("unknown node tag `{other}`"))),
    };
    Ok(node)
}
