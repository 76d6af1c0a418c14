//! A hand-written tokenizer for the Python-subset grammar cell source is
//! written in. Handles Python's significant indentation (INDENT/DEDENT
//! tokens) and implicit line joining inside brackets, since the Analyzer's
//! traversal discipline (`spec.md` §4.1: don't descend into function/class
//! bodies) depends on knowing exactly where a block starts and ends.

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    None_,
    Def,
    Class,
    Import,
    From,
    As,
    For,
    In,
    If,
    Elif,
    Else,
    While,
    Return,
    Pass,
    Break,
    Continue,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    DoubleSlashEq,
    PercentEq,
    DoubleStarEq,
    Assign,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Newline,
    Indent,
    Dedent,
    Eof,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    indent_stack: Vec<usize>,
    paren_depth: i32,
    at_line_start: bool,
    pending: Vec<Tok>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            indent_stack: vec![0],
            paren_depth: 0,
            at_line_start: true,
            pending: Vec::new(),
        }
    }

    /// Tokenize the whole source, returning an error message on malformed
    /// input (mismatched brackets, bad indentation, unterminated string).
    pub fn tokenize(mut self) -> Result<Vec<Tok>, String> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Tok::Eof;
            out.push(tok);
            if done {
                break;
            }
        }
        Ok(out)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn next_token(&mut self) -> Result<Tok, String> {
        if let Some(t) = self.pending.pop() {
            return Ok(t);
        }

        if self.at_line_start && self.paren_depth == 0 {
            if let Some(t) = self.handle_indentation()? {
                return Ok(t);
            }
        }

        self.skip_intraline_whitespace_and_comments();

        match self.peek_byte() {
            None => {
                self.at_line_start = true;
                if self.indent_stack.len() > 1 {
                    self.indent_stack.pop();
                    return Ok(Tok::Dedent);
                }
                Ok(Tok::Eof)
            }
            Some(b'\n') => {
                self.bump();
                if self.paren_depth > 0 {
                    self.next_token()
                } else {
                    self.at_line_start = true;
                    Ok(Tok::Newline)
                }
            }
            Some(c) if c.is_ascii_digit() => self.lex_number(),
            Some(b'"') | Some(b'\'') => self.lex_string(),
            Some(c) if c == b'_' || c.is_ascii_alphabetic() => Ok(self.lex_name()),
            Some(_) => self.lex_operator(),
        }
    }

    fn handle_indentation(&mut self) -> Result<Option<Tok>, String> {
        loop {
            let line_start = self.pos;
            let mut indent = 0usize;
            loop {
                match self.peek_byte() {
                    Some(b' ') => {
                        indent += 1;
                        self.bump();
                    }
                    Some(b'\t') => {
                        indent += 8;
                        self.bump();
                    }
                    _ => break,
                }
            }
            match self.peek_byte() {
                None => {
                    self.at_line_start = true;
                    if self.indent_stack.len() > 1 {
                        self.indent_stack.pop();
                        return Ok(Some(Tok::Dedent));
                    }
                    return Ok(None);
                }
                Some(b'\n') => {
                    self.bump();
                    continue;
                }
                Some(b'#') => {
                    while !matches!(self.peek_byte(), None | Some(b'\n')) {
                        self.bump();
                    }
                    continue;
                }
                _ => {
                    let _ = line_start;
                    break;
                }
            }
        }

        self.at_line_start = false;
        let indent = self.pos
            - self.src[..self.pos]
                .iter()
                .rposition(|&b| b == b'\n')
                .map(|p| p + 1)
                .unwrap_or(0);

        let current = *self.indent_stack.last().unwrap();
        if indent > current {
            self.indent_stack.push(indent);
            return Ok(Some(Tok::Indent));
        }
        if indent < current {
            let mut dedents = Vec::new();
            while *self.indent_stack.last().unwrap() > indent {
                self.indent_stack.pop();
                dedents.push(Tok::Dedent);
            }
            if *self.indent_stack.last().unwrap() != indent {
                return Err(format!("inconsistent indentation at byte {}", self.pos));
            }
            dedents.reverse();
            let first = dedents.pop().unwrap();
            for d in dedents {
                self.pending.push(d);
            }
            return Ok(Some(first));
        }
        Ok(None)
    }

    fn skip_intraline_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.bump();
                }
                Some(b'\\') if self.src.get(self.pos + 1) == Some(&b'\n') => {
                    self.bump();
                    self.bump();
                }
                Some(b'#') => {
                    while !matches!(self.peek_byte(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Result<Tok, String> {
        let start = self.pos;
        while matches!(self.peek_byte(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let mut is_float = false;
        if self.peek_byte() == Some(b'.')
            && matches!(self.src.get(self.pos + 1), Some(c) if c.is_ascii_digit())
        {
            is_float = true;
            self.bump();
            while matches!(self.peek_byte(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                self.bump();
            }
            while matches!(self.peek_byte(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|e| format!("bad float literal '{text}': {e}"))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|e| format!("bad int literal '{text}': {e}"))
        }
    }

    fn lex_string(&mut self) -> Result<Tok, String> {
        let quote = self.bump().unwrap();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string literal".to_string()),
                Some(c) if c == quote => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'\\') => out.push('\\'),
                    Some(c) if c == quote => out.push(quote as char),
                    Some(other) => {
                        out.push('\\');
                        out.push(other as char);
                    }
                    None => return Err("unterminated string literal".to_string()),
                },
                Some(c) => out.push(c as char),
            }
        }
        Ok(Tok::Str(out))
    }

    fn lex_name(&mut self) -> Tok {
        let start = self.pos;
        while matches!(self.peek_byte(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        match text {
            "True" => Tok::True,
            "False" => Tok::False,
            "None" => Tok::None_,
            "def" => Tok::Def,
            "class" => Tok::Class,
            "import" => Tok::Import,
            "from" => Tok::From,
            "as" => Tok::As,
            "for" => Tok::For,
            "in" => Tok::In,
            "if" => Tok::If,
            "elif" => Tok::Elif,
            "else" => Tok::Else,
            "while" => Tok::While,
            "return" => Tok::Return,
            "pass" => Tok::Pass,
            "break" => Tok::Break,
            "continue" => Tok::Continue,
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            _ => Tok::Name(text.to_string()),
        }
    }

    fn lex_operator(&mut self) -> Result<Tok, String> {
        let c = self.bump().unwrap();
        macro_rules! two {
            ($next:expr, $then:expr, $else_:expr) => {
                if self.peek_byte() == Some($next) {
                    self.bump();
                    $then
                } else {
                    $else_
                }
            };
        }
        let tok = match c {
            b'(' => {
                self.paren_depth += 1;
                Tok::LParen
            }
            b')' => {
                self.paren_depth -= 1;
                Tok::RParen
            }
            b'[' => {
                self.paren_depth += 1;
                Tok::LBracket
            }
            b']' => {
                self.paren_depth -= 1;
                Tok::RBracket
            }
            b'{' => {
                self.paren_depth += 1;
                Tok::LBrace
            }
            b'}' => {
                self.paren_depth -= 1;
                Tok::RBrace
            }
            b',' => Tok::Comma,
            b':' => Tok::Colon,
            b'.' => Tok::Dot,
            b'+' => two!(b'=', Tok::PlusEq, Tok::Plus),
            b'-' => two!(b'=', Tok::MinusEq, Tok::Minus),
            b'%' => two!(b'=', Tok::PercentEq, Tok::Percent),
            b'=' => two!(b'=', Tok::EqEq, Tok::Assign),
            b'<' => two!(b'=', Tok::LtEq, Tok::Lt),
            b'>' => two!(b'=', Tok::GtEq, Tok::Gt),
            b'!' => {
                if self.peek_byte() == Some(b'=') {
                    self.bump();
                    Tok::NotEq
                } else {
                    return Err("unexpected '!'".to_string());
                }
            }
            b'*' => {
                if self.peek_byte() == Some(b'*') {
                    self.bump();
                    two!(b'=', Tok::DoubleStarEq, Tok::DoubleStar)
                } else {
                    two!(b'=', Tok::StarEq, Tok::Star)
                }
            }
            b'/' => {
                if self.peek_byte() == Some(b'/') {
                    self.bump();
                    two!(b'=', Tok::DoubleSlashEq, Tok::DoubleSlash)
                } else {
                    two!(b'=', Tok::SlashEq, Tok::Slash)
                }
            }
            other => return Err(format!("unexpected character '{}'", other as char)),
        };
        Ok(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        Lexer::new(src).tokenize().unwrap()
    }

    #[test]
    fn simple_assignment() {
        let t = toks("x = 1 + 2\n");
        assert_eq!(
            t,
            vec![
                Tok::Name("x".into()),
                Tok::Assign,
                Tok::Int(1),
                Tok::Plus,
                Tok::Int(2),
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn indentation_tracked() {
        let t = toks("if x:\n    y = 1\nz = 2\n");
        assert!(t.contains(&Tok::Indent));
        assert!(t.contains(&Tok::Dedent));
    }

    #[test]
    fn aug_assign_tokenized() {
        let t = toks("counter += 1\n");
        assert_eq!(t[1], Tok::PlusEq);
    }
}
