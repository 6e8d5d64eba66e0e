//! RDF term model
//!
//! `Term` is the value type stored in triples and carried in query bindings.
//! All string data is `Arc<str>` so terms are cheap to clone when they flow
//! from a dataset snapshot into binding batches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// XSD datatype IRIs used by the literal constructors
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
}

/// rdf:langString, the implicit datatype of language-tagged literals
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// A literal value with its datatype and optional language tag
///
/// Equality is lexical: `"01"^^xsd:integer` and `"1"^^xsd:integer` are
/// different terms, which is what SPARQL join compatibility requires.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    lexical: Arc<str>,
    datatype: Arc<str>,
    lang: Option<Arc<str>>,
}

impl Literal {
    /// Typed literal
    pub fn typed(lexical: impl Into<Arc<str>>, datatype: impl Into<Arc<str>>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: datatype.into(),
            lang: None,
        }
    }

    /// Plain string literal (xsd:string)
    pub fn string(lexical: impl Into<Arc<str>>) -> Self {
        Self::typed(lexical, xsd::STRING)
    }

    /// Language-tagged string; the tag is lower-cased
    pub fn lang_string(lexical: impl Into<Arc<str>>, lang: &str) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Arc::from(RDF_LANG_STRING),
            lang: Some(Arc::from(lang.to_ascii_lowercase())),
        }
    }

    /// xsd:integer literal
    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), xsd::INTEGER)
    }

    /// xsd:boolean literal
    pub fn boolean(value: bool) -> Self {
        Self::typed(if value { "true" } else { "false" }, xsd::BOOLEAN)
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn datatype(&self) -> &str {
        &self.datatype
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.lexical.escape_default())?;
        match &self.lang {
            Some(lang) => write!(f, "@{}", lang),
            None if self.datatype.as_ref() == xsd::STRING => Ok(()),
            None => write!(f, "^^<{}>", self.datatype),
        }
    }
}

/// An RDF term: IRI, blank node or literal
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    /// Absolute IRI
    Iri(Arc<str>),
    /// Blank node label (dataset-local)
    BlankNode(Arc<str>),
    /// Literal value
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<Arc<str>>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank(label: impl Into<Arc<str>>) -> Self {
        Term::BlankNode(label.into())
    }

    pub fn literal(lit: Literal) -> Self {
        Term::Literal(lit)
    }

    /// Shorthand for an xsd:integer literal term
    pub fn integer(value: i64) -> Self {
        Term::Literal(Literal::integer(value))
    }

    /// Shorthand for an xsd:string literal term
    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Term::Literal(Literal::string(value))
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::BlankNode(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => lit.fmt(f),
        }
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}

/// A ground triple
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub s: Term,
    pub p: Term,
    pub o: Term,
}

impl Triple {
    pub fn new(s: Term, p: Term, o: Term) -> Self {
        Self { s, p, o }
    }

    /// True if every given constant equals the triple's term in that position
    pub fn matches(&self, s: Option<&Term>, p: Option<&Term>, o: Option<&Term>) -> bool {
        s.map_or(true, |s| &self.s == s)
            && p.map_or(true, |p| &self.p == p)
            && o.map_or(true, |o| &self.o == o)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.s, self.p, self.o)
    }
}
