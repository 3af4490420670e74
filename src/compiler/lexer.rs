use super::PredicateError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

/// A token together with the byte offset it starts at.
#[derive(Debug, Clone)]
pub(super) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(super) fn tokenize(input: &str) -> Result<Vec<Spanned>, PredicateError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, consumed) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            ',' => (Token::Comma, 1),
            '=' | '!' | '<' | '>' | '&' | '|' => lex_operator(&chars, i)?,
            '"' | '\'' => lex_string(&chars, i)?,
            c if c.is_ascii_digit() || c == '-' || c == '.' => lex_number(&chars, i)?,
            c if c.is_alphabetic() || c == '_' => lex_word(&chars, i),
            other => {
                return Err(PredicateError::new(
                    offset,
                    format!("unexpected character '{}'", other),
                ));
            }
        };
        tokens.push(Spanned { token, offset });
        i += consumed;
    }
    Ok(tokens)
}

fn lex_operator(chars: &[(usize, char)], i: usize) -> Result<(Token, usize), PredicateError> {
    let c = chars[i].1;
    let next = chars.get(i + 1).map(|(_, n)| *n);
    let token = match (c, next) {
        ('=', Some('=')) => (Token::Op("=="), 2),
        ('!', Some('=')) => (Token::Op("!="), 2),
        ('<', Some('=')) => (Token::Op("<="), 2),
        ('>', Some('=')) => (Token::Op(">="), 2),
        ('&', Some('&')) => (Token::And, 2),
        ('|', Some('|')) => (Token::Or, 2),
        ('<', _) => (Token::Op("<"), 1),
        ('>', _) => (Token::Op(">"), 1),
        ('!', _) => (Token::Not, 1),
        ('=', _) => (Token::Op("=="), 1),
        _ => {
            return Err(PredicateError::new(
                chars[i].0,
                format!("incomplete operator '{}'", c),
            ));
        }
    };
    Ok(token)
}

fn lex_string(chars: &[(usize, char)], i: usize) -> Result<(Token, usize), PredicateError> {
    let quote = chars[i].1;
    let mut text = String::new();
    let mut j = i + 1;
    while j < chars.len() {
        match chars[j].1 {
            '\\' if j + 1 < chars.len() => {
                text.push(chars[j + 1].1);
                j += 2;
            }
            c if c == quote => return Ok((Token::Text(text), j - i + 1)),
            c => {
                text.push(c);
                j += 1;
            }
        }
    }
    Err(PredicateError::new(chars[i].0, "unterminated string literal"))
}

fn lex_number(chars: &[(usize, char)], i: usize) -> Result<(Token, usize), PredicateError> {
    let mut j = i;
    let mut raw = String::new();
    if chars[j].1 == '-' {
        raw.push('-');
        j += 1;
    }
    while j < chars.len() {
        let c = chars[j].1;
        if c.is_ascii_digit() || c == '.' {
            raw.push(c);
        } else if c != '_' {
            break;
        }
        j += 1;
    }
    raw.parse::<f64>()
        .map(|n| (Token::Number(n), j - i))
        .map_err(|_| PredicateError::new(chars[i].0, format!("invalid number '{}'", raw)))
}

fn lex_word(chars: &[(usize, char)], i: usize) -> (Token, usize) {
    let mut j = i;
    let mut word = String::new();
    while j < chars.len() {
        let c = chars[j].1;
        if c.is_alphanumeric() || c == '_' || c == '.' {
            word.push(c);
            j += 1;
        } else {
            break;
        }
    }
    let token = match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        _ => Token::Ident(word),
    };
    (token, j - i)
}
