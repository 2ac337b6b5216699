//! Tokenizer.
//!
//! Accepts decimal numbers (integer or with a fractional part),
//! identifiers, arithmetic and comparison operators, logical connectives
//! (`&&`/`||` or the words `and`/`or`), assignment `:=`, parentheses and
//! commas. Unicode comparison signs are accepted on input so rendered
//! output pasted back in still parses.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(BigRational),
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,

    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,

    And,
    Or,

    Assign, // :=

    LParen,
    RParen,
    Comma,
}

/// Tokenize an expression string.
pub fn tokenize(s: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Two-character operators first.
        if i + 1 < chars.len() {
            let pair = (c, chars[i + 1]);
            let token = match pair {
                (':', '=') => Some(Token::Assign),
                ('>', '=') => Some(Token::Ge),
                ('<', '=') => Some(Token::Le),
                ('!', '=') => Some(Token::Ne),
                ('=', '=') => Some(Token::Eq),
                ('&', '&') => Some(Token::And),
                ('|', '|') => Some(Token::Or),
                _ => None,
            };
            if let Some(token) = token {
                out.push(token);
                i += 2;
                continue;
            }
        }

        let token = match c {
            '+' => Some(Token::Plus),
            '-' | '−' => Some(Token::Minus),
            '*' | '×' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '^' => Some(Token::Caret),
            '>' => Some(Token::Gt),
            '<' => Some(Token::Lt),
            '=' => Some(Token::Eq),
            '≥' => Some(Token::Ge),
            '≤' => Some(Token::Le),
            '≠' => Some(Token::Ne),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = token {
            out.push(token);
            i += 1;
            continue;
        }

        // Identifiers: [a-zA-Z_][a-zA-Z0-9_]*, case-normalized.
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.to_lowercase().as_str() {
                "and" => out.push(Token::And),
                "or" => out.push(Token::Or),
                w => out.push(Token::Ident(w.to_owned())),
            }
            continue;
        }

        // Numbers: digits, optionally a point and more digits.
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let int_str: String = chars[start..i].iter().collect();
            let int_part =
                BigInt::parse_bytes(int_str.as_bytes(), 10).ok_or("invalid number")?;

            let mut value = BigRational::from_integer(int_part);

            if i < chars.len() && chars[i] == '.' {
                let frac_start = i + 1;
                let mut j = frac_start;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j == frac_start {
                    return Err("digit expected after decimal point".into());
                }
                let frac_str: String = chars[frac_start..j].iter().collect();
                let frac =
                    BigInt::parse_bytes(frac_str.as_bytes(), 10).ok_or("invalid number")?;
                let scale = pow10(j - frac_start);
                value += BigRational::new(frac, scale);
                i = j;
            }

            out.push(Token::Number(value));
            continue;
        }

        return Err(format!("unexpected character: '{c}'"));
    }

    Ok(out)
}

fn pow10(n: usize) -> BigInt {
    let mut result = BigInt::from(1);
    let ten = BigInt::from(10);
    for _ in 0..n {
        result *= &ten;
    }
    debug_assert!(!result.is_zero());
    result
}
