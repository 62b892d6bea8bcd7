use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::types::TypeInfo;

/// Identity under which a provider is registered and resolved.
///
/// - `Type`: a component type, equal by `TypeId`
/// - `Symbol`: a unique identity, equal only to itself and its clones
/// - `Name`: a plain string, equal by value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Type(TypeInfo),
    Symbol(Symbol),
    Name(Cow<'static, str>),
}

impl Token {
    pub fn of<T: 'static + ?Sized>() -> Token {
        Token::Type(TypeInfo::of::<T>())
    }

    pub fn name(name: impl Into<Cow<'static, str>>) -> Token {
        Token::Name(name.into())
    }

    pub fn symbol(description: impl Into<Cow<'static, str>>) -> Token {
        Token::Symbol(Symbol::new(description))
    }

    pub fn type_info(&self) -> Option<TypeInfo> {
        match self {
            Token::Type(info) => Some(*info),
            _ => None,
        }
    }

    /// The name form of a type token, used as an alternate locals key
    pub(crate) fn name_form(&self) -> Option<Token> {
        match self {
            Token::Type(info) => Some(Token::Name(Cow::Owned(info.short_name()))),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type(info) => fmt::Display::fmt(info, f),
            Token::Symbol(symbol) => fmt::Display::fmt(symbol, f),
            Token::Name(name) => f.write_str(name),
        }
    }
}

impl From<TypeInfo> for Token {
    fn from(info: TypeInfo) -> Self {
        Token::Type(info)
    }
}

impl From<Symbol> for Token {
    fn from(symbol: Symbol) -> Self {
        Token::Symbol(symbol)
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::Name(Cow::Owned(name))
    }
}

impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// A unique token identity with a description for diagnostics
#[derive(Debug, Clone)]
pub struct Symbol {
    id: u64,
    description: Cow<'static, str>,
}

impl Symbol {
    pub fn new(description: impl Into<Cow<'static, str>>) -> Self {
        Symbol {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database;

    #[test]
    fn symbols_are_unique() {
        let first = Symbol::new("db");
        let second = Symbol::new("db");

        assert_ne!(first, second);
        assert_eq!(first, first.clone());
        assert_eq!(first.to_string(), "Symbol(db)");
    }

    #[test]
    fn names_compare_by_value() {
        assert_eq!(Token::from("db"), Token::name(String::from("db")));
        assert_ne!(Token::from("db"), Token::of::<Database>());
    }

    #[test]
    fn type_tokens_display_short_names() {
        let token = Token::of::<Database>();

        assert_eq!(token.to_string(), "Database");
        assert_eq!(token.name_form(), Some(Token::from("Database")));
        assert_eq!(Token::from("x").name_form(), None);
    }
}
