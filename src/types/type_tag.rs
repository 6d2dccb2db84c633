//! Move type tags and their canonical string form
//!
//! Canonical rendering: primitives in lowercase, `vector<T>`, and structs as
//! `0x<64 hex>::module::Name<T1, T2>`.

use super::{Address, ParseError};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructTag {
    pub address: Address,
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Bool => f.write_str("bool"),
            TypeTag::U8 => f.write_str("u8"),
            TypeTag::U16 => f.write_str("u16"),
            TypeTag::U32 => f.write_str("u32"),
            TypeTag::U64 => f.write_str("u64"),
            TypeTag::U128 => f.write_str("u128"),
            TypeTag::U256 => f.write_str("u256"),
            TypeTag::Address => f.write_str("address"),
            TypeTag::Signer => f.write_str("signer"),
            TypeTag::Vector(inner) => write!(f, "vector<{}>", inner),
            TypeTag::Struct(tag) => write!(f, "{}", tag),
        }
    }
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)?;
        if !self.type_params.is_empty() {
            f.write_str("<")?;
            for (i, param) in self.type_params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", param)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl FromStr for TypeTag {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser::new(s);
        let tag = parser.parse_type()?;
        parser.skip_whitespace();
        if !parser.is_done() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(tag)
    }
}

impl FromStr for StructTag {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<TypeTag>()? {
            TypeTag::Struct(tag) => Ok(*tag),
            _ => Err(ParseError::InvalidTypeTag {
                input: s.to_string(),
                reason: "expected a struct type".to_string(),
            }),
        }
    }
}

/// Parse a type string and render it canonically
pub fn normalize_type(input: &str) -> Result<String, ParseError> {
    Ok(input.parse::<TypeTag>()?.to_string())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct TypeParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, reason: &str) -> ParseError {
        ParseError::InvalidTypeTag {
            input: self.input.to_string(),
            reason: format!("{} at position {}", reason, self.pos),
        }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            _ => Err(self.error(&format!("expected '{}'", expected))),
        }
    }

    /// Reads a path segment up to the next structural delimiter
    fn read_path(&mut self) -> &'a str {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '<' || c == '>' || c == ',' || c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.input[start..self.pos]
    }

    fn parse_type(&mut self) -> Result<TypeTag, ParseError> {
        let path = self.read_path();
        let tag = match path {
            "" => return Err(self.error("expected a type")),
            "bool" => TypeTag::Bool,
            "u8" => TypeTag::U8,
            "u16" => TypeTag::U16,
            "u32" => TypeTag::U32,
            "u64" => TypeTag::U64,
            "u128" => TypeTag::U128,
            "u256" => TypeTag::U256,
            "address" => TypeTag::Address,
            "signer" => TypeTag::Signer,
            "vector" => {
                self.expect('<')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                TypeTag::Vector(Box::new(inner))
            }
            _ => TypeTag::Struct(Box::new(self.parse_struct(path)?)),
        };
        Ok(tag)
    }

    fn parse_struct(&mut self, path: &str) -> Result<StructTag, ParseError> {
        let parts: Vec<&str> = path.split("::").collect();
        if parts.len() != 3 {
            return Err(self.error("struct type must be address::module::Name"));
        }
        let address = Address::from_hex(parts[0]).map_err(|_| self.error("invalid address"))?;
        if !is_identifier(parts[1]) || !is_identifier(parts[2]) {
            return Err(self.error("invalid identifier"));
        }

        let mut type_params = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some('<') {
            self.pos += 1;
            loop {
                type_params.push(self.parse_type()?);
                self.skip_whitespace();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some('>') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or '>'")),
                }
            }
        }

        Ok(StructTag {
            address,
            module: parts[1].to_string(),
            name: parts[2].to_string(),
            type_params,
        })
    }
}
