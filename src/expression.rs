use crate::{BinaryOp, Expression, OperatorCall, Value};
use ptree::TreeItem;
use std::fmt::{Display, Formatter};

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
        }
    }
}

impl PartialEq for OperatorCall {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.target == other.target
            && self.modifiers == other.modifiers
            && self.args == other.args
    }
}

impl OperatorCall {
    /// The operator identifier as written, with modifiers and target re-attached.
    pub fn full_name(&self) -> String {
        let mut name = self.name.clone();
        for modifier in &self.modifiers {
            name.push(':');
            name.push_str(modifier);
        }
        if let Some(target) = &self.target {
            name.push('@');
            name.push_str(target);
        }
        name
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

impl Expression {
    /// Visit every node of the expression tree, pre-order.
    pub fn walk(&self, visit: &mut impl FnMut(&Expression)) {
        visit(self);
        match self {
            Expression::Literal(_) | Expression::Reference(_) | Expression::EnvVar(_) => {}
            Expression::Or(left, right) => {
                left.walk(visit);
                right.walk(visit);
            }
            Expression::Not(inner) => inner.walk(visit),
            Expression::Operation { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expression::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.walk(visit);
                then.walk(visit);
                otherwise.walk(visit);
            }
            Expression::Call(call) => {
                for arg in &call.args {
                    arg.walk(visit);
                }
            }
        }
    }

    pub fn as_call(&self) -> Option<&OperatorCall> {
        match self {
            Expression::Call(call) => Some(call),
            _ => None,
        }
    }

    fn children(&self) -> Vec<Expression> {
        match self {
            Expression::Literal(_) | Expression::Reference(_) | Expression::EnvVar(_) => Vec::new(),
            Expression::Or(left, right) => vec![(**left).clone(), (**right).clone()],
            Expression::Not(inner) => vec![(**inner).clone()],
            Expression::Operation { left, right, .. } => vec![(**left).clone(), (**right).clone()],
            Expression::Ternary {
                condition,
                then,
                otherwise,
            } => vec![
                (**condition).clone(),
                (**then).clone(),
                (**otherwise).clone(),
            ],
            Expression::Call(call) => call.args.clone(),
        }
    }

    /// Dump the expression tree to stdout; a debugging aid for grammar work.
    pub fn print(&self) -> Result<(), std::io::Error> {
        ptree::print_tree(self)
    }

    fn render(&self, f: &mut Formatter<'_>, nested: bool) -> std::fmt::Result {
        match self {
            Expression::Literal(value) => write_literal(f, value),
            Expression::Reference(cursor) => write!(f, "{}", cursor),
            Expression::EnvVar(name) => write!(f, "${}", name),
            Expression::Or(left, right) => {
                left.render(f, true)?;
                write!(f, " || ")?;
                right.render(f, true)
            }
            Expression::Not(inner) => {
                write!(f, "! ")?;
                inner.render(f, true)
            }
            Expression::Operation { op, left, right } => {
                left.render(f, true)?;
                write!(f, " {} ", op.symbol())?;
                right.render(f, true)
            }
            Expression::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.render(f, true)?;
                write!(f, " ? ")?;
                then.render(f, true)?;
                write!(f, " : ")?;
                otherwise.render(f, true)
            }
            Expression::Call(call) => {
                if nested {
                    write!(f, "(")?;
                }
                write!(f, "{}", call.full_name())?;
                for arg in &call.args {
                    write!(f, " ")?;
                    arg.render(f, true)?;
                }
                if nested {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

fn write_literal(f: &mut Formatter<'_>, value: &Value) -> std::fmt::Result {
    match value {
        Value::String(s) => {
            write!(f, "\"")?;
            for c in s.chars() {
                match c {
                    '"' => write!(f, "\\\"")?,
                    '\\' => write!(f, "\\\\")?,
                    '\n' => write!(f, "\\n")?,
                    '\r' => write!(f, "\\r")?,
                    '\t' => write!(f, "\\t")?,
                    _ => write!(f, "{}", c)?,
                }
            }
            write!(f, "\"")
        }
        other => write!(f, "{}", other),
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.render(f, false)
    }
}

impl TreeItem for Expression {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        match self {
            Expression::Literal(value) => write!(f, "literal {}", value),
            Expression::Reference(cursor) => write!(f, "reference {}", cursor),
            Expression::EnvVar(name) => write!(f, "env ${}", name),
            Expression::Or(_, _) => write!(f, "||"),
            Expression::Not(_) => write!(f, "!"),
            Expression::Operation { op, .. } => write!(f, "{}", op.symbol()),
            Expression::Ternary { .. } => write!(f, "?:"),
            Expression::Call(call) => write!(f, "call {}", call.full_name()),
        }
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        std::borrow::Cow::from(self.children())
    }
}
