//! The canonical expression and statement AST the compiler passes operate over.
//!
//! This is the surface the CLI (`bugsc-sim`) deserializes from JSON and the shape
//! every pass crate (`bugsc-eval`, `bugsc-collect`, `bugsc-build`) consumes; parsing
//! BUGS surface syntax into this tree is out of scope (spec.md §1).

use serde::{Deserialize, Serialize};

/// An expression node.
///
/// `Range` and `Colon` are the two distinguished call shapes from spec.md §3: a
/// range with both endpoints given (`lo:hi`) and the bare colon standing for an
/// unresolved full axis (`x[,]`-style indexing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// An integer literal.
    Int(i64),
    /// A floating point literal.
    Float(f64),
    /// A bare identifier.
    Sym(String),
    /// An array reference `name[indices...]`. A scalar identifier is a `Sym`, not a
    /// zero-index `Ref`.
    Ref(String, Vec<Expr>),
    /// A function or operator call, including arithmetic (`+`, `*`, ...), the range
    /// constructor (`Call(":", [lo, hi])`), and BUGS math/distribution primitives.
    Call(String, Vec<Expr>),
    /// The bare colon index marker (unresolved full axis).
    Colon,
}

impl Expr {
    /// Convenience constructor for a two-argument range expression `lo:hi`.
    pub fn range(lo: Expr, hi: Expr) -> Self {
        Expr::Call(":".to_string(), vec![lo, hi])
    }

    /// True if this expression is the bare colon marker.
    pub fn is_colon(&self) -> bool {
        matches!(self, Expr::Colon)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{v}"),
            Expr::Float(v) => write!(f, "{v}"),
            Expr::Sym(s) => write!(f, "{s}"),
            Expr::Ref(name, idx) => {
                write!(f, "{name}[")?;
                for (i, e) in idx.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            Expr::Call(name, args) if name == ":" && args.len() == 2 => {
                write!(f, "{}:{}", args[0], args[1])
            }
            Expr::Call(name, args) => {
                write!(f, "{name}(")?;
                for (i, e) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Expr::Colon => write!(f, ":"),
        }
    }
}

/// The assignable left-hand side of a logical or stochastic statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Lhs {
    /// A bare identifier.
    Sym(String),
    /// An array element or slice reference.
    Ref(String, Vec<Expr>),
    /// A link-function wrapped LHS, `f(lhs) = rhs` / `f(lhs) ~ dist`, prior to §4.A
    /// normalization. Normalized programs never contain this variant.
    Link(String, Box<Lhs>),
}

impl std::fmt::Display for Lhs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lhs::Sym(s) => write!(f, "{s}"),
            Lhs::Ref(name, idx) => Expr::Ref(name.clone(), idx.clone()).fmt(f),
            Lhs::Link(link, inner) => write!(f, "{link}({inner})"),
        }
    }
}

/// One statement in a model body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `lhs = rhs`
    Logical {
        /// The assignment target.
        lhs: Lhs,
        /// The right-hand side expression.
        rhs: Expr,
    },
    /// `lhs ~ dist`, with an optional `T(l,u)` / `C(l,u)` truncation/censoring pair
    /// carried separately until §4.A rewrites it into the `dist` call tree, and an
    /// optional link-function tag (`f(lhs) ~ dist`) preserved on the node record per
    /// §4.A rather than folded into the AST.
    Stochastic {
        /// The stochastic assignment target.
        lhs: Lhs,
        /// The distribution call.
        dist: Expr,
        /// Optional `T(l,u)` truncation bounds.
        truncate: Option<(Option<Expr>, Option<Expr>)>,
        /// Optional `C(l,u)` censoring bounds.
        censor: Option<(Option<Expr>, Option<Expr>)>,
        /// Optional link-function tag (`f(lhs) ~ dist`).
        link: Option<String>,
    },
    /// `for(var in lo:hi){ body }`
    For {
        /// The loop variable name.
        var: String,
        /// The lower bound of the range.
        lo: Expr,
        /// The upper bound of the range.
        hi: Expr,
        /// The loop body statements.
        body: Vec<Stmt>,
    },
    /// `if(cond){ body }`, eliminated during AST normalization (SPEC_FULL.md, A).
    If {
        /// The condition expression.
        cond: Expr,
        /// The body statements.
        body: Vec<Stmt>,
    },
}

/// A full model body: a flat list of top-level statements.
pub type Program = Vec<Stmt>;
