//! Types and type environments.

use braid_ast::Env;

/// A base type plus its stage: 0 is an ordinary value, `n > 0` is code
/// quoted `n` times. Negative stages appear while checking inside a quote
/// for names bound outside it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    pub kind: TypeKind,
    pub stage: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Int,
    Float,
    String,
    Void,
    /// An opaque base type supplied by a builtin table (e.g. `Float4`).
    Prim(String),
    Fun { params: Vec<Type>, ret: Box<Type> },
}

impl Type {
    pub const fn new(kind: TypeKind, stage: i32) -> Self {
        Self { kind, stage }
    }

    pub const fn int() -> Self {
        Self::new(TypeKind::Int, 0)
    }

    pub const fn float() -> Self {
        Self::new(TypeKind::Float, 0)
    }

    pub const fn string() -> Self {
        Self::new(TypeKind::String, 0)
    }

    pub const fn void() -> Self {
        Self::new(TypeKind::Void, 0)
    }

    pub fn prim(name: &str) -> Self {
        Self::new(TypeKind::Prim(name.to_string()), 0)
    }

    pub fn fun(params: Vec<Type>, ret: Type) -> Self {
        Self::new(
            TypeKind::Fun {
                params,
                ret: Box::new(ret),
            },
            0,
        )
    }

    /// The same base type `amount` stages further out.
    pub fn shifted(&self, amount: i32) -> Self {
        Self::new(self.kind.clone(), self.stage + amount)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, TypeKind::Int | TypeKind::Float)
    }

    pub fn is_code(&self) -> bool {
        self.stage > 0
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (open, close) = if self.stage >= 0 { ("<", ">") } else { ("[", "]") };
        let depth = self.stage.unsigned_abs() as usize;
        write!(f, "{}{}{}", open.repeat(depth), self.kind, close.repeat(depth))
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Int => f.write_str("Int"),
            TypeKind::Float => f.write_str("Float"),
            TypeKind::String => f.write_str("String"),
            TypeKind::Void => f.write_str("Void"),
            TypeKind::Prim(name) => f.write_str(name),
            TypeKind::Fun { params, ret } => {
                f.write_str("(")?;
                for param in params {
                    write!(f, "{param} ")?;
                }
                write!(f, "-> {ret})")
            }
        }
    }
}

/// A name's type together with the quote level it was bound at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub ty: Type,
    pub level: u32,
}

pub type TypeEnv = Env<Binding>;

/// Adjust the stage of every type in an environment.
pub fn shift_env(env: &TypeEnv, amount: i32) -> TypeEnv {
    env.map(&|binding: &Binding| Binding {
        ty: binding.ty.shifted(amount),
        level: binding.level,
    })
}
