//! Material script parser
//!
//! Parses declarative material blocks into untyped [`RawRecord`]s:
//!
//! ```text
//! singleton Material(TempleRuin_02_ConcreteStain1)
//! {
//!    mapTo = "ConcreteStain1";
//!    diffuseMap[0] = "3td_ConcreteStain_01";
//!    specularPower[0] = "64";
//! };
//! ```
//!
//! The parser only checks structure. Converting values to their property
//! types happens in the material builder.

use super::MaterialError;

/// Object class accepted in block headers
const MATERIAL_CLASS: &str = "Material";

/// One `key = "value";` assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Property key as written
    pub key: String,
    /// Stage index from `key[n]`, if present
    pub stage: Option<usize>,
    /// Unescaped string value
    pub value: String,
    /// 1-based source line of the key
    pub line: usize,
}

/// A parsed material block before type conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Name from the block header
    pub name: String,
    /// 1-based source line of the block header
    pub line: usize,
    /// Assignments in declaration order
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Semicolon,
    Colon,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Ident(s) => format!("identifier '{s}'"),
            Self::Number(s) => format!("number '{s}'"),
            Self::Str(s) => format!("string \"{s}\""),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::LBrace => "'{'".to_string(),
            Self::RBrace => "'}'".to_string(),
            Self::LBracket => "'['".to_string(),
            Self::RBracket => "']'".to_string(),
            Self::Equals => "'='".to_string(),
            Self::Semicolon => "';'".to_string(),
            Self::Colon => "':'".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn malformed(name: Option<&str>, line: usize, reason: impl Into<String>) -> MaterialError {
    MaterialError::MalformedRecord {
        name: name.map(str::to_string),
        line: Some(line),
        reason: reason.into(),
    }
}

/// Material script parser
pub struct ScriptParser;

impl ScriptParser {
    /// Parse script source into raw records, in declaration order
    ///
    /// # Errors
    /// Returns [`MaterialError::MalformedRecord`] with the offending line for
    /// any lexical or structural problem. Nothing is returned on failure.
    pub fn parse(source: &str) -> Result<Vec<RawRecord>, MaterialError> {
        // Files saved by some Windows tools start with a byte-order mark
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let tokens = Self::tokenize(source)?;
        let mut cursor = Cursor { tokens: &tokens, pos: 0, last_line: 1 };
        let mut records = Vec::new();

        while !cursor.at_end() {
            records.push(cursor.parse_block()?);
        }

        Ok(records)
    }

    fn tokenize(source: &str) -> Result<Vec<Spanned>, MaterialError> {
        let mut tokens = Vec::new();
        let mut chars = source.chars().peekable();
        let mut line = 1;

        while let Some(c) = chars.next() {
            let token = match c {
                '\n' => {
                    line += 1;
                    continue;
                }
                c if c.is_whitespace() => continue,
                '/' if chars.peek() == Some(&'/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            line += 1;
                            break;
                        }
                    }
                    continue;
                }
                '/' if chars.peek() == Some(&'*') => {
                    let start = line;
                    chars.next();
                    let mut prev = '\0';
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '\n' {
                            line += 1;
                        }
                        if prev == '*' && c == '/' {
                            closed = true;
                            break;
                        }
                        prev = c;
                    }
                    if !closed {
                        return Err(malformed(None, start, "unterminated block comment"));
                    }
                    continue;
                }
                '(' => Token::LParen,
                ')' => Token::RParen,
                '{' => Token::LBrace,
                '}' => Token::RBrace,
                '[' => Token::LBracket,
                ']' => Token::RBracket,
                '=' => Token::Equals,
                ';' => Token::Semicolon,
                ':' => Token::Colon,
                '"' => {
                    let start = line;
                    let mut value = String::new();
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        match c {
                            '"' => {
                                closed = true;
                                break;
                            }
                            '\\' => match chars.next() {
                                Some('n') => value.push('\n'),
                                Some('t') => value.push('\t'),
                                Some(escaped @ ('"' | '\\')) => value.push(escaped),
                                Some(other) => {
                                    value.push('\\');
                                    value.push(other);
                                }
                                None => break,
                            },
                            '\n' => {
                                return Err(malformed(None, start, "newline inside string literal"));
                            }
                            c => value.push(c),
                        }
                    }
                    if !closed {
                        return Err(malformed(None, start, "unterminated string literal"));
                    }
                    Token::Str(value)
                }
                c if c.is_ascii_alphanumeric() || c == '_' => {
                    let mut word = String::from(c);
                    while let Some(&next) = chars.peek() {
                        if next.is_ascii_alphanumeric() || next == '_' {
                            word.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if word.bytes().all(|b| b.is_ascii_digit()) {
                        Token::Number(word)
                    } else {
                        Token::Ident(word)
                    }
                }
                other => {
                    return Err(malformed(None, line, format!("unexpected character '{other}'")));
                }
            };
            tokens.push(Spanned { token, line });
        }

        Ok(tokens)
    }
}

struct Cursor<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    last_line: usize,
}

impl Cursor<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self, name: Option<&str>, expected: &str) -> Result<(Token, usize), MaterialError> {
        match self.tokens.get(self.pos) {
            Some(spanned) => {
                self.pos += 1;
                self.last_line = spanned.line;
                Ok((spanned.token.clone(), spanned.line))
            }
            None => Err(malformed(
                name,
                self.last_line,
                format!("unexpected end of input, expected {expected}"),
            )),
        }
    }

    fn expect(&mut self, name: Option<&str>, expected: &Token) -> Result<usize, MaterialError> {
        let (token, line) = self.next(name, &expected.describe())?;
        if &token == expected {
            Ok(line)
        } else {
            Err(malformed(
                name,
                line,
                format!("expected {}, found {}", expected.describe(), token.describe()),
            ))
        }
    }

    fn parse_block(&mut self) -> Result<RawRecord, MaterialError> {
        let (token, header_line) = self.next(None, "a material block")?;
        let class = match token {
            Token::Ident(word)
                if word.eq_ignore_ascii_case("singleton") || word.eq_ignore_ascii_case("new") =>
            {
                match self.next(None, "an object class")? {
                    (Token::Ident(class), _) => class,
                    (other, line) => {
                        return Err(malformed(None, line, format!("expected object class, found {}", other.describe())));
                    }
                }
            }
            Token::Ident(class) => class,
            other => {
                return Err(malformed(
                    None,
                    header_line,
                    format!("expected a material block, found {}", other.describe()),
                ));
            }
        };
        if !class.eq_ignore_ascii_case(MATERIAL_CLASS) {
            return Err(malformed(None, header_line, format!("unsupported object class '{class}'")));
        }

        self.expect(None, &Token::LParen)?;
        let name = match self.next(None, "a material name")? {
            (Token::Ident(name) | Token::Number(name), _) => name,
            (Token::RParen, line) => return Err(malformed(None, line, "material has no name")),
            (other, line) => {
                return Err(malformed(None, line, format!("expected material name, found {}", other.describe())));
            }
        };
        match self.next(Some(&name), "')'")? {
            (Token::RParen, _) => {}
            (Token::Colon, line) => {
                return Err(malformed(Some(&name), line, "materials cannot inherit from another record"));
            }
            (other, line) => {
                return Err(malformed(Some(&name), line, format!("expected ')', found {}", other.describe())));
            }
        }
        self.expect(Some(&name), &Token::LBrace)?;

        let mut assignments = Vec::new();
        loop {
            if self.peek() == Some(&Token::RBrace) {
                self.pos += 1;
                break;
            }
            assignments.push(self.parse_assignment(&name)?);
        }

        if self.peek() == Some(&Token::Semicolon) {
            self.pos += 1;
        }

        Ok(RawRecord {
            name,
            line: header_line,
            assignments,
        })
    }

    fn parse_assignment(&mut self, name: &str) -> Result<Assignment, MaterialError> {
        let (key, line) = match self.next(Some(name), "a property or '}'")? {
            (Token::Ident(key), line) => (key, line),
            (other, line) => {
                return Err(malformed(Some(name), line, format!("expected property name, found {}", other.describe())));
            }
        };

        let stage = if self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            let stage = match self.next(Some(name), "a stage index")? {
                (Token::Number(digits), line) => digits
                    .parse::<usize>()
                    .map_err(|_| malformed(Some(name), line, format!("stage index '{digits}' is too large")))?,
                (other, line) => {
                    return Err(malformed(Some(name), line, format!("expected stage index, found {}", other.describe())));
                }
            };
            self.expect(Some(name), &Token::RBracket)?;
            Some(stage)
        } else {
            None
        };

        self.expect(Some(name), &Token::Equals)?;
        let value = match self.next(Some(name), "a quoted value")? {
            (Token::Str(value), _) => value,
            (other, line) => {
                return Err(malformed(
                    Some(name),
                    line,
                    format!("value for '{key}' must be a quoted string, found {}", other.describe()),
                ));
            }
        };
        self.expect(Some(name), &Token::Semicolon)?;

        Ok(Assignment { key, stage, value, line })
    }
}
