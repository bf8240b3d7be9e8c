//! Master spec reader
//!
//! The master spec is a protobuf text-format description of the parser's
//! components. Only the component layout is needed here, so the file is
//! read into a generic field tree and the `component` blocks are picked out.

use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// File name of the master spec inside a model directory
pub const MASTER_SPEC_FILE: &str = "master_spec";

/// A field value in a text-format message
#[derive(Debug, Clone, PartialEq)]
pub enum TextValue {
    Scalar(String),
    Message(TextMessage),
}

/// A parsed text-format message: an ordered list of fields, repeats allowed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMessage {
    fields: Vec<(String, TextValue)>,
}

impl TextMessage {
    /// Parse a text-format message
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        parser.message(None)
    }

    /// All values of a (possibly repeated) field, in file order
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TextValue> + 'a {
        self.fields
            .iter()
            .filter(move |(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// First scalar value of a field
    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|(field, value)| match value {
            TextValue::Scalar(s) if field == name => Some(s.as_str()),
            _ => None,
        })
    }

    /// First message value of a field
    pub fn message(&self, name: &str) -> Option<&TextMessage> {
        self.fields.iter().find_map(|(field, value)| match value {
            TextValue::Message(m) if field == name => Some(m),
            _ => None,
        })
    }

    /// All message values of a repeated field
    pub fn messages<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TextMessage> + 'a {
        self.all(name).filter_map(|value| match value {
            TextValue::Message(m) => Some(m),
            TextValue::Scalar(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One parser component declared in the master spec
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub name: String,
    /// Registered name of the component's transition system
    pub transition_system: Option<String>,
    pub num_actions: Option<i64>,
}

/// Component layout of a trained parser
#[derive(Debug, Clone, PartialEq)]
pub struct MasterSpec {
    components: Vec<ComponentSpec>,
}

impl MasterSpec {
    /// Read `<model_dir>/master_spec`
    pub fn load<P: AsRef<Path>>(model_dir: P) -> Result<Self> {
        let path = model_dir.as_ref().join(MASTER_SPEC_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read master spec {}", path.display()))?;
        let spec = Self::parse(&text).with_context(|| format!("Invalid master spec {}", path.display()))?;

        info!(
            path = %path.display(),
            components = ?spec.component_names(),
            "Master spec loaded"
        );
        Ok(spec)
    }

    /// Parse master spec text
    pub fn parse(text: &str) -> Result<Self> {
        let root = TextMessage::parse(text)?;

        let mut components = Vec::new();
        for component in root.messages("component") {
            let name = component
                .scalar("name")
                .ok_or_else(|| anyhow!("component #{} has no name", components.len()))?
                .to_string();
            let transition_system = component
                .message("transition_system")
                .and_then(|ts| ts.scalar("registered_name"))
                .map(str::to_string);
            let num_actions = component
                .scalar("num_actions")
                .map(|n| {
                    n.parse::<i64>()
                        .with_context(|| format!("component '{}' has invalid num_actions '{}'", name, n))
                })
                .transpose()?;

            debug!(component = %name, transition_system = ?transition_system, "Found component");
            components.push(ComponentSpec {
                name,
                transition_system,
                num_actions,
            });
        }

        if components.is_empty() {
            bail!("master spec declares no component");
        }

        Ok(Self { components })
    }

    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Punct(char),
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            '{' | '}' | '<' | '>' | '[' | ']' | ':' | ',' | ';' => {
                tokens.push((Token::Punct(c), line));
                chars.next();
            }
            '"' | '\'' => {
                chars.next();
                let mut value = Vec::new();
                loop {
                    match chars.next() {
                        None | Some('\n') => bail!("line {}: unterminated string", line),
                        Some(q) if q == c => break,
                        Some('\\') => value.push(unescape(&mut chars, line)?),
                        Some(other) => {
                            let mut utf8 = [0u8; 4];
                            value.extend_from_slice(other.encode_utf8(&mut utf8).as_bytes());
                        }
                    }
                }
                let value = String::from_utf8(value)
                    .map_err(|e| anyhow!("line {}: string is not valid UTF-8: {}", line, e))?;
                tokens.push((Token::Str(value), line));
            }
            _ => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+') {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if ident.is_empty() {
                    bail!("line {}: unexpected character '{}'", line, c);
                }
                tokens.push((Token::Ident(ident), line));
            }
        }
    }

    Ok(tokens)
}

/// Decode one escape sequence to the byte it stands for. Hex and octal
/// escapes are raw bytes, so multi-byte UTF-8 may be spelled out byte by byte.
fn unescape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, line: usize) -> Result<u8> {
    let c = chars
        .next()
        .ok_or_else(|| anyhow!("line {}: dangling escape", line))?;
    let escaped = match c {
        'n' => b'\n',
        't' => b'\t',
        'r' => b'\r',
        '\\' => b'\\',
        '"' => b'"',
        '\'' => b'\'',
        'x' => {
            let mut code = 0u32;
            for _ in 0..2 {
                let digit = chars
                    .next()
                    .and_then(|d| d.to_digit(16))
                    .ok_or_else(|| anyhow!("line {}: bad hex escape", line))?;
                code = code * 16 + digit;
            }
            code as u8
        }
        '0'..='7' => {
            let mut code = c.to_digit(8).unwrap_or(0);
            for _ in 0..2 {
                match chars.peek().and_then(|d| d.to_digit(8)) {
                    Some(digit) => {
                        code = code * 8 + digit;
                        chars.next();
                    }
                    None => break,
                }
            }
            u8::try_from(code).map_err(|_| anyhow!("line {}: octal escape \\{:o} out of range", line, code))?
        }
        other => bail!("line {}: unknown escape '\\{}'", line, other),
    };
    Ok(escaped)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn message(&mut self, close: Option<char>) -> Result<TextMessage> {
        let mut message = TextMessage::default();

        loop {
            match (self.peek(), close) {
                (None, None) => return Ok(message),
                (None, Some(c)) => bail!("line {}: missing '{}'", self.line(), c),
                (Some(Token::Punct(p)), Some(c)) if *p == c => {
                    self.pos += 1;
                    return Ok(message);
                }
                _ => {}
            }

            let name = self.field_name()?;
            let has_colon = self.eat(':');

            match self.peek() {
                Some(Token::Punct('{')) | Some(Token::Punct('<')) => {
                    let value = self.nested()?;
                    message.fields.push((name, value));
                }
                Some(Token::Punct('[')) => {
                    self.pos += 1;
                    if !self.eat(']') {
                        loop {
                            let value = self.value()?;
                            message.fields.push((name.clone(), value));
                            if self.eat(',') {
                                continue;
                            }
                            if !self.eat(']') {
                                bail!("line {}: expected ']' closing list '{}'", self.line(), name);
                            }
                            break;
                        }
                    }
                }
                _ if has_colon => {
                    let value = self.scalar()?;
                    message.fields.push((name, TextValue::Scalar(value)));
                }
                _ => bail!("line {}: expected ':' or message after '{}'", self.line(), name),
            }

            if !self.eat(',') {
                self.eat(';');
            }
        }
    }

    fn field_name(&mut self) -> Result<String> {
        let line = self.line();
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(Token::Punct('[')) => match (self.next(), self.next()) {
                (Some(Token::Ident(name)), Some(Token::Punct(']'))) => Ok(format!("[{}]", name)),
                _ => bail!("line {}: malformed extension name", line),
            },
            Some(other) => bail!("line {}: expected field name, found {:?}", line, other),
            None => bail!("line {}: expected field name", line),
        }
    }

    fn nested(&mut self) -> Result<TextValue> {
        let close = match self.next() {
            Some(Token::Punct('{')) => '}',
            Some(Token::Punct('<')) => '>',
            _ => bail!("line {}: expected message", self.line()),
        };
        Ok(TextValue::Message(self.message(Some(close))?))
    }

    fn value(&mut self) -> Result<TextValue> {
        match self.peek() {
            Some(Token::Punct('{')) | Some(Token::Punct('<')) => self.nested(),
            _ => Ok(TextValue::Scalar(self.scalar()?)),
        }
    }

    fn scalar(&mut self) -> Result<String> {
        let line = self.line();
        match self.next() {
            Some(Token::Ident(value)) => Ok(value),
            Some(Token::Str(mut value)) => {
                // Adjacent string literals concatenate
                while let Some(Token::Str(more)) = self.peek() {
                    value.push_str(more);
                    self.pos += 1;
                }
                Ok(value)
            }
            Some(other) => bail!("line {}: expected value, found {:?}", line, other),
            None => bail!("line {}: expected value", line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
# Two-component parser
component {
  name: "rnn"
  transition_system { registered_name: "shift-only" }
  num_actions: 1
  fixed_feature {
    name: "words" size: 1 embedding_dim: 32
  }
}
component <
  name: 'ff'
  transition_system: {
    registered_name: "sempar"
    parameters { name: "commons" value: "com" "mons" }
  }
  num_actions: 415
  linked_feature [ { name: "lr" }, { name: "rl" } ];
>
"#;

    #[test]
    fn test_parses_components() {
        let spec = MasterSpec::parse(SPEC).unwrap();
        assert_eq!(spec.component_names(), vec!["rnn", "ff"]);

        let ff = &spec.components()[1];
        assert_eq!(ff.transition_system.as_deref(), Some("sempar"));
        assert_eq!(ff.num_actions, Some(415));
    }

    #[test]
    fn test_repeated_and_list_fields() {
        let root = TextMessage::parse(SPEC).unwrap();
        let ff = root.messages("component").nth(1).unwrap();

        let linked: Vec<_> = ff
            .messages("linked_feature")
            .filter_map(|m| m.scalar("name"))
            .collect();
        assert_eq!(linked, vec!["lr", "rl"]);

        let params = ff
            .message("transition_system")
            .and_then(|ts| ts.message("parameters"))
            .unwrap();
        assert_eq!(params.scalar("value"), Some("commons"));
    }

    #[test]
    fn test_string_escapes() {
        let root = TextMessage::parse(r#"a: "tab\there" b: "\x41\101\"" c: [1, 2, 3]"#).unwrap();
        assert_eq!(root.scalar("a"), Some("tab\there"));
        assert_eq!(root.scalar("b"), Some("AA\""));
        assert_eq!(root.all("c").count(), 3);
    }

    #[test]
    fn test_byte_escapes_decode_as_utf8() {
        let root = TextMessage::parse(r#"name: "caf\303\251" hex: "\xc3\xa9t\xc3\xa9" raw: "café""#).unwrap();
        assert_eq!(root.scalar("name"), Some("café"));
        assert_eq!(root.scalar("hex"), Some("été"));
        assert_eq!(root.scalar("raw"), Some("café"));
    }

    #[test]
    fn test_invalid_utf8_escape_fails() {
        let err = TextMessage::parse("\n\nname: \"bad\\377\"").unwrap_err();
        assert!(err.to_string().contains("line 3"));
        assert!(TextMessage::parse(r#"name: "\777""#).is_err());
    }

    #[test]
    fn test_extension_field_name() {
        let root = TextMessage::parse("[sling.ext] { x: 1 }").unwrap();
        assert!(root.message("[sling.ext]").is_some());
    }

    #[test]
    fn test_unclosed_message_fails() {
        let err = TextMessage::parse("component { name: \"x\"").unwrap_err();
        assert!(err.to_string().contains("missing '}'"));
    }

    #[test]
    fn test_spec_without_components_fails() {
        assert!(MasterSpec::parse("hyperparams { seed: 1 }").is_err());
    }

    #[test]
    fn test_component_without_name_fails() {
        assert!(MasterSpec::parse("component { num_actions: 3 }").is_err());
    }

    #[test]
    fn test_load_missing_spec_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = MasterSpec::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("master spec"));
    }
}
