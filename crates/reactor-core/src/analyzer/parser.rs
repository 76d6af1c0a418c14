//! Recursive-descent parser from the token stream ([`super::lexer`]) to the
//! AST ([`super::ast`]).

use super::ast::*;
use super::lexer::{Lexer, Tok};

pub fn parse(src: &str) -> Result<Vec<Stmt>, String> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut p = Parser { tokens, pos: 0 };
    p.parse_module()
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).unwrap_or(&Tok::Eof)
    }

    fn bump(&mut self) -> Tok {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Tok::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, t: &Tok) -> bool {
        self.peek() == t
    }

    fn expect(&mut self, t: Tok) -> Result<(), String> {
        if self.check(&t) {
            self.bump();
            Ok(())
        } else {
            Err(format!("expected {:?}, found {:?}", t, self.peek()))
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&Tok::Newline) {
            self.bump();
        }
    }

    fn parse_module(&mut self) -> Result<Vec<Stmt>, String> {
        let stmts = self.parse_statements_until(&[Tok::Eof])?;
        Ok(stmts)
    }

    fn parse_statements_until(&mut self, stop: &[Tok]) -> Result<Vec<Stmt>, String> {
        let mut out = Vec::new();
        self.skip_newlines();
        while !stop.contains(self.peek()) {
            out.push(self.parse_stmt()?);
            self.skip_newlines();
        }
        Ok(out)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, String> {
        self.expect(Tok::Colon)?;
        self.skip_newlines();
        if self.check(&Tok::Indent) {
            self.bump();
            let body = self.parse_statements_until(&[Tok::Dedent])?;
            self.expect(Tok::Dedent)?;
            Ok(body)
        } else {
            // Single simple statement on the same line, e.g. `if x: y = 1`.
            Ok(vec![self.parse_simple_stmt()?])
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, String> {
        match self.peek().clone() {
            Tok::If => self.parse_if(),
            Tok::While => self.parse_while(),
            Tok::For => self.parse_for(),
            Tok::Def => self.parse_def(),
            Tok::Class => self.parse_class(),
            _ => self.parse_simple_stmt(),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, String> {
        self.expect(Tok::If)?;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;
        self.skip_newlines();
        let orelse = if self.check(&Tok::Elif) {
            // Represent `elif` as a nested `if` inside `orelse`.
            vec![self.parse_elif()?]
        } else if self.check(&Tok::Else) {
            self.bump();
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { test, body, orelse })
    }

    fn parse_elif(&mut self) -> Result<Stmt, String> {
        self.expect(Tok::Elif)?;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;
        self.skip_newlines();
        let orelse = if self.check(&Tok::Elif) {
            vec![self.parse_elif()?]
        } else if self.check(&Tok::Else) {
            self.bump();
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { test, body, orelse })
    }

    fn parse_while(&mut self) -> Result<Stmt, String> {
        self.expect(Tok::While)?;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { test, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, String> {
        self.expect(Tok::For)?;
        let target = self.parse_expr_or_tuple()?;
        self.expect(Tok::In)?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::For { target, iter, body })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, String> {
        let mut params = Vec::new();
        self.expect(Tok::LParen)?;
        while !self.check(&Tok::RParen) {
            let name = self.expect_name()?;
            if self.check(&Tok::Colon) {
                self.bump();
                let _ = self.parse_expr()?; // type annotation, discarded
            }
            let default = if self.check(&Tok::Assign) {
                self.bump();
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(Param { name, default });
            if self.check(&Tok::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(Tok::RParen)?;
        Ok(params)
    }

    fn parse_def(&mut self) -> Result<Stmt, String> {
        self.expect(Tok::Def)?;
        let name = self.expect_name()?;
        let params = self.parse_params()?;
        if self.check(&Tok::Minus) {
            // `-> ReturnType` annotation.
            self.bump();
            let _ = self.parse_expr()?;
        }
        let body = self.parse_block()?;
        Ok(Stmt::FunctionDef { name, params, body })
    }

    fn parse_class(&mut self) -> Result<Stmt, String> {
        self.expect(Tok::Class)?;
        let name = self.expect_name()?;
        let mut bases = Vec::new();
        if self.check(&Tok::LParen) {
            self.bump();
            while !self.check(&Tok::RParen) {
                bases.push(self.parse_expr()?);
                if self.check(&Tok::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(Tok::RParen)?;
        }
        let body = self.parse_block()?;
        Ok(Stmt::ClassDef { name, bases, body })
    }

    fn expect_name(&mut self) -> Result<String, String> {
        match self.bump() {
            Tok::Name(n) => Ok(n),
            other => Err(format!("expected identifier, found {:?}", other)),
        }
    }

    fn parse_dotted_name(&mut self) -> Result<String, String> {
        let mut parts = vec![self.expect_name()?];
        while self.check(&Tok::Dot) {
            self.bump();
            parts.push(self.expect_name()?);
        }
        Ok(parts.join("."))
    }

    fn parse_import(&mut self) -> Result<Stmt, String> {
        self.expect(Tok::Import)?;
        let mut modules = Vec::new();
        loop {
            let module = self.parse_dotted_name()?;
            let alias = if self.check(&Tok::As) {
                self.bump();
                Some(self.expect_name()?)
            } else {
                None
            };
            modules.push((module, alias));
            if self.check(&Tok::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(Stmt::Import { modules })
    }

    fn parse_import_from(&mut self) -> Result<Stmt, String> {
        self.expect(Tok::From)?;
        let module = self.parse_dotted_name()?;
        self.expect(Tok::Import)?;
        let mut names = Vec::new();
        loop {
            let name = self.expect_name()?;
            let alias = if self.check(&Tok::As) {
                self.bump();
                Some(self.expect_name()?)
            } else {
                None
            };
            names.push((name, alias));
            if self.check(&Tok::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(Stmt::ImportFrom { module, names })
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt, String> {
        match self.peek().clone() {
            Tok::Import => self.parse_import(),
            Tok::From => self.parse_import_from(),
            Tok::Pass => {
                self.bump();
                Ok(Stmt::Pass)
            }
            Tok::Break => {
                self.bump();
                Ok(Stmt::Break)
            }
            Tok::Continue => {
                self.bump();
                Ok(Stmt::Continue)
            }
            Tok::Return => {
                self.bump();
                if matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Dedent) {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.parse_expr_or_tuple()?)))
                }
            }
            _ => self.parse_assign_or_expr(),
        }
    }

    fn parse_assign_or_expr(&mut self) -> Result<Stmt, String> {
        let first = self.parse_expr_or_tuple()?;
        if let Some(op) = self.aug_assign_op() {
            self.bump();
            let value = self.parse_expr_or_tuple()?;
            return Ok(Stmt::AugAssign {
                target: first,
                op,
                value,
            });
        }
        if self.check(&Tok::Assign) {
            let mut parts = vec![first];
            while self.check(&Tok::Assign) {
                self.bump();
                parts.push(self.parse_expr_or_tuple()?);
            }
            let value = parts.pop().unwrap();
            return Ok(Stmt::Assign {
                targets: parts,
                value,
            });
        }
        Ok(Stmt::Expr(first))
    }

    fn aug_assign_op(&self) -> Option<BinOp> {
        match self.peek() {
            Tok::PlusEq => Some(BinOp::Add),
            Tok::MinusEq => Some(BinOp::Sub),
            Tok::StarEq => Some(BinOp::Mul),
            Tok::SlashEq => Some(BinOp::Div),
            Tok::DoubleSlashEq => Some(BinOp::FloorDiv),
            Tok::PercentEq => Some(BinOp::Mod),
            Tok::DoubleStarEq => Some(BinOp::Pow),
            _ => None,
        }
    }

    fn can_start_expr(&self) -> bool {
        matches!(
            self.peek(),
            Tok::Name(_)
                | Tok::Int(_)
                | Tok::Float(_)
                | Tok::Str(_)
                | Tok::True
                | Tok::False
                | Tok::None_
                | Tok::LParen
                | Tok::LBracket
                | Tok::LBrace
                | Tok::Minus
                | Tok::Plus
                | Tok::Not
        )
    }

    fn parse_expr_or_tuple(&mut self) -> Result<Expr, String> {
        let first = self.parse_expr()?;
        if self.check(&Tok::Comma) {
            let mut items = vec![first];
            while self.check(&Tok::Comma) {
                self.bump();
                if !self.can_start_expr() {
                    break;
                }
                items.push(self.parse_expr()?);
            }
            Ok(Expr::Tuple(items))
        } else {
            Ok(first)
        }
    }

    pub fn parse_expr(&mut self) -> Result<Expr, String> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut first = self.parse_and()?;
        if self.check(&Tok::Or) {
            let mut items = vec![first];
            while self.check(&Tok::Or) {
                self.bump();
                items.push(self.parse_and()?);
            }
            first = Expr::BoolOp(BoolOp::Or, items);
        }
        Ok(first)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut first = self.parse_not()?;
        if self.check(&Tok::And) {
            let mut items = vec![first];
            while self.check(&Tok::And) {
                self.bump();
                items.push(self.parse_not()?);
            }
            first = Expr::BoolOp(BoolOp::And, items);
        }
        Ok(first)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.check(&Tok::Not) {
            self.bump();
            Ok(Expr::UnaryOp(UnaryOp::Not, Box::new(self.parse_not()?)))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Tok::EqEq => CmpOp::Eq,
                Tok::NotEq => CmpOp::NotEq,
                Tok::Lt => CmpOp::Lt,
                Tok::LtEq => CmpOp::LtEq,
                Tok::Gt => CmpOp::Gt,
                Tok::GtEq => CmpOp::GtEq,
                _ => break,
            };
            self.bump();
            rest.push((op, self.parse_additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_term()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::DoubleSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let right = self.parse_factor()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Tok::Minus => {
                self.bump();
                Ok(Expr::UnaryOp(UnaryOp::Neg, Box::new(self.parse_factor()?)))
            }
            Tok::Plus => {
                self.bump();
                Ok(Expr::UnaryOp(UnaryOp::Pos, Box::new(self.parse_factor()?)))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, String> {
        let base = self.parse_postfix()?;
        if self.check(&Tok::DoubleStar) {
            self.bump();
            let exp = self.parse_factor()?;
            Ok(Expr::BinOp(Box::new(base), BinOp::Pow, Box::new(exp)))
        } else {
            Ok(base)
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.bump();
                    let name = self.expect_name()?;
                    expr = Expr::Attribute(Box::new(expr), name);
                }
                Tok::LParen => {
                    self.bump();
                    let args = self.parse_call_args()?;
                    self.expect(Tok::RParen)?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                Tok::LBracket => {
                    self.bump();
                    let index = self.parse_expr_or_tuple()?;
                    self.expect(Tok::RBracket)?;
                    expr = Expr::Subscript(Box::new(expr), Box::new(index));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        while !self.check(&Tok::RParen) {
            // Keyword argument `name=value`: only the value contributes a read.
            if let Tok::Name(_) = self.peek() {
                if self.tokens.get(self.pos + 1) == Some(&Tok::Assign) {
                    self.bump();
                    self.bump();
                    args.push(self.parse_expr()?);
                    if self.check(&Tok::Comma) {
                        self.bump();
                        continue;
                    } else {
                        break;
                    }
                }
            }
            args.push(self.parse_expr()?);
            if self.check(&Tok::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_comprehension_tail(&mut self) -> Result<Vec<Comprehension>, String> {
        let mut gens = Vec::new();
        while self.check(&Tok::For) {
            self.bump();
            let target = self.parse_expr_or_tuple()?;
            self.expect(Tok::In)?;
            let iter = self.parse_or_no_comma()?;
            let mut ifs = Vec::new();
            while self.check(&Tok::If) {
                self.bump();
                ifs.push(self.parse_or_no_comma()?);
            }
            gens.push(Comprehension { target, iter, ifs });
        }
        Ok(gens)
    }

    /// A comprehension's `iter`/`if` clauses parse a plain expression: a bare
    /// comma there would belong to an outer tuple context, which comprehensions
    /// inside `[...]`/`{...}` never are.
    fn parse_or_no_comma(&mut self) -> Result<Expr, String> {
        self.parse_expr()
    }

    fn parse_atom(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Tok::Name(n) => Ok(Expr::Name(n)),
            Tok::Int(i) => Ok(Expr::Int(i)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::True => Ok(Expr::Bool(true)),
            Tok::False => Ok(Expr::Bool(false)),
            Tok::None_ => Ok(Expr::NoneLit),
            Tok::LParen => {
                if self.check(&Tok::RParen) {
                    self.bump();
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.parse_expr_or_tuple()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBracket => {
                if self.check(&Tok::RBracket) {
                    self.bump();
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.check(&Tok::For) {
                    let generators = self.parse_comprehension_tail()?;
                    self.expect(Tok::RBracket)?;
                    return Ok(Expr::ListComp {
                        element: Box::new(first),
                        generators,
                    });
                }
                let mut items = vec![first];
                while self.check(&Tok::Comma) {
                    self.bump();
                    if self.check(&Tok::RBracket) {
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                self.expect(Tok::RBracket)?;
                Ok(Expr::List(items))
            }
            Tok::LBrace => {
                if self.check(&Tok::RBrace) {
                    self.bump();
                    return Ok(Expr::Dict(Vec::new()));
                }
                let first_key = self.parse_expr()?;
                if self.check(&Tok::Colon) {
                    self.bump();
                    let first_val = self.parse_expr()?;
                    if self.check(&Tok::For) {
                        let generators = self.parse_comprehension_tail()?;
                        self.expect(Tok::RBrace)?;
                        return Ok(Expr::DictComp {
                            key: Box::new(first_key),
                            value: Box::new(first_val),
                            generators,
                        });
                    }
                    let mut pairs = vec![(first_key, first_val)];
                    while self.check(&Tok::Comma) {
                        self.bump();
                        if self.check(&Tok::RBrace) {
                            break;
                        }
                        let k = self.parse_expr()?;
                        self.expect(Tok::Colon)?;
                        let v = self.parse_expr()?;
                        pairs.push((k, v));
                    }
                    self.expect(Tok::RBrace)?;
                    Ok(Expr::Dict(pairs))
                } else if self.check(&Tok::For) {
                    let generators = self.parse_comprehension_tail()?;
                    self.expect(Tok::RBrace)?;
                    Ok(Expr::SetComp {
                        element: Box::new(first_key),
                        generators,
                    })
                } else {
                    let mut items = vec![first_key];
                    while self.check(&Tok::Comma) {
                        self.bump();
                        if self.check(&Tok::RBrace) {
                            break;
                        }
                        items.push(self.parse_expr()?);
                    }
                    self.expect(Tok::RBrace)?;
                    Ok(Expr::List(items))
                }
            }
            other => Err(format!("unexpected token in expression: {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_assignment() {
        let stmts = parse("price = 100\n").unwrap();
        assert_eq!(
            stmts,
            vec![Stmt::Assign {
                targets: vec![Expr::Name("price".into())],
                value: Expr::Int(100),
            }]
        );
    }

    #[test]
    fn parses_binary_expression() {
        let stmts = parse("tax = price * tax_rate\n").unwrap();
        match &stmts[0] {
            Stmt::Assign { value, .. } => {
                assert_eq!(
                    *value,
                    Expr::BinOp(
                        Box::new(Expr::Name("price".into())),
                        BinOp::Mul,
                        Box::new(Expr::Name("tax_rate".into()))
                    )
                );
            }
            _ => panic!("expected assign"),
        }
    }

    #[test]
    fn parses_tuple_destructuring() {
        let stmts = parse("a, b = 1, 2\n").unwrap();
        match &stmts[0] {
            Stmt::Assign { targets, value } => {
                assert_eq!(targets[0], Expr::Tuple(vec![Expr::Name("a".into()), Expr::Name("b".into())]));
                assert_eq!(*value, Expr::Tuple(vec![Expr::Int(1), Expr::Int(2)]));
            }
            _ => panic!("expected assign"),
        }
    }

    #[test]
    fn parses_for_loop_with_destructured_target() {
        let stmts = parse("for k, v in items.items():\n    total = total + v\n").unwrap();
        match &stmts[0] {
            Stmt::For { target, .. } => {
                assert_eq!(
                    *target,
                    Expr::Tuple(vec![Expr::Name("k".into()), Expr::Name("v".into())])
                );
            }
            _ => panic!("expected for"),
        }
    }

    #[test]
    fn parses_function_def_with_default() {
        let stmts = parse("def greet(name='world'):\n    return name\n").unwrap();
        match &stmts[0] {
            Stmt::FunctionDef { name, params, body } => {
                assert_eq!(name, "greet");
                assert_eq!(params[0].name, "name");
                assert_eq!(params[0].default, Some(Expr::Str("world".into())));
                assert_eq!(body.len(), 1);
            }
            _ => panic!("expected def"),
        }
    }

    #[test]
    fn parses_import_from_with_alias() {
        let stmts = parse("from collections import OrderedDict as OD\n").unwrap();
        assert_eq!(
            stmts[0],
            Stmt::ImportFrom {
                module: "collections".into(),
                names: vec![("OrderedDict".into(), Some("OD".into()))],
            }
        );
    }

    #[test]
    fn parses_aug_assign() {
        let stmts = parse("counter += 1\n").unwrap();
        assert_eq!(
            stmts[0],
            Stmt::AugAssign {
                target: Expr::Name("counter".into()),
                op: BinOp::Add,
                value: Expr::Int(1),
            }
        );
    }

    #[test]
    fn parses_list_comprehension() {
        let stmts = parse("squares = [x * x for x in values if x > 0]\n").unwrap();
        match &stmts[0] {
            Stmt::Assign { value, .. } => match value {
                Expr::ListComp { generators, .. } => {
                    assert_eq!(generators.len(), 1);
                    assert_eq!(generators[0].target, Expr::Name("x".into()));
                    assert_eq!(generators[0].ifs.len(), 1);
                }
                _ => panic!("expected list comp"),
            },
            _ => panic!("expected assign"),
        }
    }
}
