//! Triple pattern types
//!
//! Patterns represent the logical query structure handed over by the parser.
//! Each position of a triple pattern is either a variable or a constant term.

use crate::var_registry::VarId;
use localfed_core::Term;

/// A position in a triple pattern - variable or constant
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    /// Variable binding
    Var(VarId),
    /// Constant term (IRI, blank node label, or literal)
    Const(Term),
}

impl PatternTerm {
    pub fn is_var(&self) -> bool {
        matches!(self, PatternTerm::Var(_))
    }

    pub fn as_var(&self) -> Option<VarId> {
        match self {
            PatternTerm::Var(v) => Some(*v),
            PatternTerm::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<&Term> {
        match self {
            PatternTerm::Const(t) => Some(t),
            PatternTerm::Var(_) => None,
        }
    }
}

impl From<VarId> for PatternTerm {
    fn from(v: VarId) -> Self {
        PatternTerm::Var(v)
    }
}

impl From<Term> for PatternTerm {
    fn from(t: Term) -> Self {
        PatternTerm::Const(t)
    }
}

/// A triple pattern for matching triples
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub s: PatternTerm,
    pub p: PatternTerm,
    pub o: PatternTerm,
}

impl TriplePattern {
    pub fn new(
        s: impl Into<PatternTerm>,
        p: impl Into<PatternTerm>,
        o: impl Into<PatternTerm>,
    ) -> Self {
        Self {
            s: s.into(),
            p: p.into(),
            o: o.into(),
        }
    }

    /// Variables in this pattern (in order: s, p, o; may repeat)
    pub fn variables(&self) -> Vec<VarId> {
        [&self.s, &self.p, &self.o]
            .into_iter()
            .filter_map(PatternTerm::as_var)
            .collect()
    }
}
