//! The generic node grammar every IDL file is written in:
//!
//! ```text
//! node  := KEY [NAME] ( '=' value ';' | '{' node* '}' | ';' )
//! value := STRING | NUMBER | IDENT | array<IDENT> | '[' value (',' value)* ']'
//! ```
//!
//! The parser gives meaning to the keys; this module only builds the tree.

use crate::{
    common::{error, quote},
    error::CompileError,
    tokenizer::Token,
};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER:    Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)*$").unwrap();
    static ref STRING:        Regex = Regex::new(r#"^".*"$"#).unwrap();
    static ref NUMBER:        Regex = Regex::new(r"^-?\d+(?:\.\d+)?$").unwrap();
    static ref ARRAY_TYPE:    Regex = Regex::new(r"^array<([A-Za-z_][A-Za-z0-9_]*)>$").unwrap();
    static ref EQUALS:        Regex = Regex::new(r"^=$").unwrap();
    static ref SEMICOLON:     Regex = Regex::new(r"^;$").unwrap();
    static ref COMMA:         Regex = Regex::new(r"^,$").unwrap();
    static ref LEFT_BRACE:    Regex = Regex::new(r"^\{$").unwrap();
    static ref RIGHT_BRACE:   Regex = Regex::new(r"^\}$").unwrap();
    static ref LEFT_BRACKET:  Regex = Regex::new(r"^\[$").unwrap();
    static ref RIGHT_BRACKET: Regex = Regex::new(r"^\]$").unwrap();
    static ref EOF:           Regex = Regex::new(r"^$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Number(String),
    Ident(String),
    ArrayType(String),
}

impl Scalar {
    /// The value without quoting; `array<T>` yields `T`.
    pub fn text(&self) -> &str {
        match self {
            Scalar::Str(s) | Scalar::Number(s) | Scalar::Ident(s) | Scalar::ArrayType(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
    Block(Vec<Node>),
    Flag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub key:    String,
    pub name:   Option<String>,
    pub value:  NodeValue,
    pub line:   usize,
    pub column: usize,
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self.value {
            NodeValue::Scalar(_) => "scalar",
            NodeValue::List(_) => "list",
            NodeValue::Block(_) => "block",
            NodeValue::Flag => "flag",
        }
    }
}

fn unescape(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn parse_nodes(tokens: &[Token]) -> Result<Vec<Node>, CompileError> {
    let mut index = 0;

    fn current_token(tokens: &[Token], index: usize) -> Result<&Token, CompileError> {
        tokens
            .get(index)
            .or_else(|| tokens.last())
            .ok_or_else(|| error("Unexpected end of input", 0, 0))
    }

    fn eat(tokens: &[Token], index: &mut usize, test: &Regex) -> Result<bool, CompileError> {
        if test.is_match(&current_token(tokens, *index)?.text) {
            *index += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(tokens: &[Token], index: &mut usize, test: &Regex, expected: &str) -> Result<(), CompileError> {
        if !eat(tokens, index, test)? {
            let tok = current_token(tokens, *index)?;
            return Err(error(
                &format!("Expected {} but found {}", expected, quote(&tok.text)),
                tok.line,
                tok.column,
            ));
        }
        Ok(())
    }

    fn unexpected_token(tokens: &[Token], index: usize) -> CompileError {
        match current_token(tokens, index) {
            Ok(tok) => error(
                &format!("Unexpected token {}", quote(&tok.text)),
                tok.line,
                tok.column,
            ),
            Err(e) => e,
        }
    }

    fn parse_scalar(tokens: &[Token], index: &mut usize) -> Result<Scalar, CompileError> {
        let tok = current_token(tokens, *index)?;
        let scalar = if let Some(caps) = ARRAY_TYPE.captures(&tok.text) {
            Scalar::ArrayType(caps[1].to_string())
        } else if STRING.is_match(&tok.text) {
            Scalar::Str(unescape(&tok.text))
        } else if NUMBER.is_match(&tok.text) {
            Scalar::Number(tok.text.clone())
        } else if IDENTIFIER.is_match(&tok.text) {
            Scalar::Ident(tok.text.clone())
        } else {
            return Err(unexpected_token(tokens, *index));
        };
        *index += 1;
        Ok(scalar)
    }

    fn parse_node(tokens: &[Token], index: &mut usize) -> Result<Node, CompileError> {
        let key_tok = current_token(tokens, *index)?;
        expect(tokens, index, &IDENTIFIER, "identifier")?;

        let mut name = None;
        let tok = current_token(tokens, *index)?;
        if IDENTIFIER.is_match(&tok.text) {
            name = Some(tok.text.clone());
            *index += 1;
        } else if STRING.is_match(&tok.text) {
            name = Some(unescape(&tok.text));
            *index += 1;
        }

        let value = if eat(tokens, index, &EQUALS)? {
            let value = if eat(tokens, index, &LEFT_BRACKET)? {
                let mut items = Vec::new();
                if !eat(tokens, index, &RIGHT_BRACKET)? {
                    loop {
                        items.push(parse_scalar(tokens, index)?);
                        if eat(tokens, index, &RIGHT_BRACKET)? {
                            break;
                        }
                        expect(tokens, index, &COMMA, "\",\" or \"]\"")?;
                    }
                }
                NodeValue::List(items)
            } else {
                NodeValue::Scalar(parse_scalar(tokens, index)?)
            };
            expect(tokens, index, &SEMICOLON, "\";\"")?;
            value
        } else if eat(tokens, index, &LEFT_BRACE)? {
            let mut children = Vec::new();
            while !eat(tokens, index, &RIGHT_BRACE)? {
                if EOF.is_match(&current_token(tokens, *index)?.text) {
                    return Err(unexpected_token(tokens, *index));
                }
                children.push(parse_node(tokens, index)?);
            }
            NodeValue::Block(children)
        } else if eat(tokens, index, &SEMICOLON)? {
            NodeValue::Flag
        } else {
            return Err(unexpected_token(tokens, *index));
        };

        Ok(Node {
            key: key_tok.text.clone(),
            name,
            value,
            line: key_tok.line,
            column: key_tok.column,
        })
    }

    let mut nodes = Vec::new();
    while !eat(tokens, &mut index, &EOF)? {
        nodes.push(parse_node(tokens, &mut index)?);
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_schema;

    fn parse(text: &str) -> Result<Vec<Node>, CompileError> {
        parse_nodes(&tokenize_schema(text)?)
    }

    #[test]
    fn parses_nested_blocks() {
        let nodes = parse(
            r#"
            struct point {
                description = "A \"point\"";
                strict = false;
                field x = int;
                field tags = array<string>;
                field ignored { ignore; }
            }
            "#,
        )
        .unwrap();

        assert_eq!(nodes.len(), 1);
        let point = &nodes[0];
        assert_eq!(point.key, "struct");
        assert_eq!(point.name.as_deref(), Some("point"));
        assert_eq!((point.line, point.column), (2, 13));

        let NodeValue::Block(children) = &point.value else {
            panic!("expected block, got {:?}", point.value);
        };
        assert_eq!(children.len(), 5);
        assert_eq!(
            children[0].value,
            NodeValue::Scalar(Scalar::Str("A \"point\"".into()))
        );
        assert_eq!(children[0].name, None);
        assert_eq!(children[1].value, NodeValue::Scalar(Scalar::Ident("false".into())));
        assert_eq!(children[2].name.as_deref(), Some("x"));
        assert_eq!(
            children[3].value,
            NodeValue::Scalar(Scalar::ArrayType("string".into()))
        );
        let NodeValue::Block(inner) = &children[4].value else {
            panic!("expected block");
        };
        assert_eq!(inner[0].key, "ignore");
        assert_eq!(inner[0].value, NodeValue::Flag);
    }

    #[test]
    fn parses_lists_and_quoted_names() {
        let nodes = parse(r#"server_parameter "net.port" { set_at = [startup, "runtime"]; empty = []; }"#).unwrap();
        assert_eq!(nodes[0].name.as_deref(), Some("net.port"));
        let NodeValue::Block(children) = &nodes[0].value else {
            panic!("expected block");
        };
        assert_eq!(
            children[0].value,
            NodeValue::List(vec![
                Scalar::Ident("startup".into()),
                Scalar::Str("runtime".into())
            ])
        );
        assert_eq!(children[1].value, NodeValue::List(vec![]));
    }

    #[test]
    fn reports_position_of_bad_token() {
        let err = parse("struct p {\n  field x = ;\n}").unwrap_err();
        assert!(
            matches!(err, CompileError::ParseError { line: 2, column: 13, .. }),
            "unexpected error {:?}",
            err
        );

        let err = parse("struct p {\n  field x = int;\n").unwrap_err();
        assert!(matches!(err, CompileError::ParseError { line: 3, .. }), "{:?}", err);

        let err = parse("struct p { field x = int }").unwrap_err();
        assert!(matches!(err, CompileError::ParseError { .. }));
    }
}
