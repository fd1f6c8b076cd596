// File: src/lexer.rs
//
// Tokenizer for the small scripting language the compiler/VM core executes.
// Out of scope for the core itself (spec.md treats lexing as an external
// collaborator); kept here so the crate is runnable end to end, in the same
// spirit as the teacher crate's own src/lexer.rs.

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Integer(i64),
    String(String),
    Operator(String),
    Punctuation(char),
    Keyword(String),
    Eof,
    Illegal(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

const KEYWORDS: &[&str] = &["let", "fn", "if", "else", "return", "true", "false"];

pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;
    let mut col = 1;

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' => {
                chars.next();
                col += 1;
            }
            '\n' => {
                chars.next();
                line += 1;
                col = 1;
            }
            '#' => {
                while let Some(&ch) = chars.peek() {
                    chars.next();
                    if ch == '\n' {
                        line += 1;
                        col = 1;
                        break;
                    }
                }
            }
            '"' => {
                let start_col = col;
                chars.next();
                col += 1;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') | None => {
                            col += 1;
                            break;
                        }
                        Some('\\') => {
                            col += 1;
                            if let Some(esc) = chars.next() {
                                col += 1;
                                match esc {
                                    'n' => s.push('\n'),
                                    't' => s.push('\t'),
                                    '\\' => s.push('\\'),
                                    '"' => s.push('"'),
                                    other => s.push(other),
                                }
                            }
                        }
                        Some(ch) => {
                            col += 1;
                            s.push(ch);
                        }
                    }
                }
                tokens.push(Token { kind: TokenKind::String(s), line, column: start_col });
            }
            '0'..='9' => {
                let start_col = col;
                let mut digits = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() {
                        digits.push(ch);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                let value = digits.parse().unwrap_or(0);
                tokens.push(Token { kind: TokenKind::Integer(value), line, column: start_col });
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start_col = col;
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                let kind = if KEYWORDS.contains(&ident.as_str()) {
                    TokenKind::Keyword(ident)
                } else {
                    TokenKind::Identifier(ident)
                };
                tokens.push(Token { kind, line, column: start_col });
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let start_col = col;
                let first = chars.next().unwrap();
                col += 1;
                let op = match (first, chars.peek()) {
                    ('=', Some('=')) => {
                        chars.next();
                        col += 1;
                        "==".to_string()
                    }
                    ('!', Some('=')) => {
                        chars.next();
                        col += 1;
                        "!=".to_string()
                    }
                    ('<', Some('=')) => {
                        chars.next();
                        col += 1;
                        "<=".to_string()
                    }
                    ('>', Some('=')) => {
                        chars.next();
                        col += 1;
                        ">=".to_string()
                    }
                    ('&', Some('&')) => {
                        chars.next();
                        col += 1;
                        "&&".to_string()
                    }
                    ('|', Some('|')) => {
                        chars.next();
                        col += 1;
                        "||".to_string()
                    }
                    _ => first.to_string(),
                };
                tokens.push(Token { kind: TokenKind::Operator(op), line, column: start_col });
            }
            '+' | '-' | '*' | '/' => {
                let start_col = col;
                let op = chars.next().unwrap();
                col += 1;
                tokens.push(Token {
                    kind: TokenKind::Operator(op.to_string()),
                    line,
                    column: start_col,
                });
            }
            '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';' | ':' => {
                tokens.push(Token { kind: TokenKind::Punctuation(c), line, column: col });
                chars.next();
                col += 1;
            }
            other => {
                tokens.push(Token { kind: TokenKind::Illegal(other), line, column: col });
                chars.next();
                col += 1;
            }
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, line, column: col });
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_let_binding() {
        let tokens = tokenize("let five = 5;");
        let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword("let".into()),
                TokenKind::Identifier("five".into()),
                TokenKind::Operator("=".into()),
                TokenKind::Integer(5),
                TokenKind::Punctuation(';'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_two_char_operators() {
        let tokens = tokenize("a == b != c && d || e <= f >= g");
        let ops: Vec<&str> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Operator(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ops, vec!["==", "!=", "&&", "||", "<=", ">="]);
    }

    #[test]
    fn tokenizes_escaped_string() {
        let tokens = tokenize(r#""hel\"lo\n""#);
        assert_eq!(tokens[0].kind, TokenKind::String("hel\"lo\n".to_string()));
    }
}
