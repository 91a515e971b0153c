//! Tokenizer and parser for the SQL subset the mapper emits.

use crate::error::OrmError;
use crate::types::SqlValue;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Str(String),
    Number(String),
    Marker(Option<usize>),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn unsupported(detail: impl std::fmt::Display) -> OrmError {
    OrmError::Driver(format!("memory backend: {detail}"))
}

fn tokenize(sql: &str) -> Result<Vec<Token>, OrmError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let read_digits = |start: usize| -> (String, usize) {
        let mut end = start;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
        (chars[start..end].iter().collect(), end)
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() || c == ';' => i += 1,
            '`' | '"' | '\'' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(unsupported("unterminated quote")),
                        Some(&ch) if ch == c => {
                            if chars.get(i + 1) == Some(&c) {
                                text.push(c);
                                i += 2;
                            } else {
                                i += 1;
                                break;
                            }
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(if c == '\'' {
                    Token::Str(text)
                } else {
                    Token::Quoted(text)
                });
            }
            '?' | '$' => {
                let (digits, end) = read_digits(i + 1);
                if digits.is_empty() && c == '$' {
                    return Err(unsupported("bare `$`"));
                }
                tokens.push(Token::Marker(digits.parse().ok()));
                i = end;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '<' | '>' | '!' | '=' | '*' => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    ('<', Some('=')) => ("<=", 2),
                    ('>', Some('=')) => (">=", 2),
                    ('<', Some('>')) | ('!', Some('=')) => ("!=", 2),
                    ('<', _) => ("<", 1),
                    ('>', _) => (">", 1),
                    ('=', _) => ("=", 1),
                    ('*', _) => ("*", 1),
                    _ => return Err(unsupported("stray `!`")),
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => return Err(unsupported(format!("unexpected character `{other}`"))),
        }
    }
    Ok(tokens)
}

/// One column from a CREATE TABLE body.
#[derive(Debug, Clone)]
pub(super) struct ColumnSpec {
    pub name: String,
    pub auto_increment: bool,
    pub unique: bool,
    pub not_null: bool,
    pub default: Option<SqlValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// Parsed WHERE clause with parameters already substituted.
#[derive(Debug, Clone)]
pub(super) enum Filter {
    Or(Vec<Filter>),
    And(Vec<Filter>),
    Const(bool),
    Compare { column: String, op: CmpOp, value: SqlValue },
    IsNull { column: String, negated: bool },
    Between { column: String, low: SqlValue, high: SqlValue, negated: bool },
    In { column: String, values: Vec<SqlValue>, negated: bool },
    Like { column: String, pattern: SqlValue, negated: bool },
}

#[derive(Debug, Clone)]
pub(super) enum Command {
    Create {
        table: String,
        if_not_exists: bool,
        columns: Vec<ColumnSpec>,
    },
    Drop {
        table: String,
        if_exists: bool,
    },
    Truncate {
        table: String,
    },
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<SqlValue>,
        returning: Option<String>,
    },
    Select {
        table: String,
        count: bool,
        filter: Option<Filter>,
        order: Vec<(String, bool)>,
        limit: Option<usize>,
        offset: Option<usize>,
    },
    LastInsertId,
    Update {
        table: String,
        assignments: Vec<(String, SqlValue)>,
        filter: Option<Filter>,
    },
    Delete {
        table: String,
        filter: Option<Filter>,
    },
    Use {
        schema: String,
    },
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    params: &'a [Option<SqlValue>],
    next_param: usize,
}

/// Parse one statement, substituting bound parameters for its markers.
pub(super) fn parse(sql: &str, params: &[Option<SqlValue>]) -> Result<Command, OrmError> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
        params,
        next_param: 0,
    };
    let command = parser.command()?;
    if parser.pos < parser.tokens.len() {
        return Err(unsupported(format!(
            "trailing tokens in `{sql}` at {:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(command)
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.peek_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), OrmError> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(unsupported(format!("expected `{kw}`, found {:?}", self.peek())))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), OrmError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(unsupported(format!("expected {token:?}, found {:?}", self.peek())))
        }
    }

    fn ident(&mut self) -> Result<String, OrmError> {
        match self.bump() {
            Some(Token::Word(w) | Token::Quoted(w)) => {
                Ok(w.rsplit('.').next().unwrap_or(&w).to_string())
            }
            other => Err(unsupported(format!("expected identifier, found {other:?}"))),
        }
    }

    fn value(&mut self) -> Result<SqlValue, OrmError> {
        match self.bump() {
            Some(Token::Marker(number)) => {
                let slot = match number {
                    Some(n) if n > 0 => n - 1,
                    Some(_) => return Err(unsupported("placeholder numbers start at 1")),
                    None => {
                        self.next_param += 1;
                        self.next_param - 1
                    }
                };
                match self.params.get(slot) {
                    Some(Some(value)) => Ok(value.clone()),
                    Some(None) => Err(unsupported(format!(
                        "parameter {} was never bound",
                        slot + 1
                    ))),
                    None => Err(unsupported(format!(
                        "statement expects parameter {} but only {} were supplied",
                        slot + 1,
                        self.params.len()
                    ))),
                }
            }
            Some(Token::Number(text)) => literal_number(&text),
            Some(Token::Str(text)) => Ok(SqlValue::Text(text)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("NULL") => Ok(SqlValue::Null),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("TRUE") => Ok(SqlValue::Bool(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("FALSE") => Ok(SqlValue::Bool(false)),
            other => Err(unsupported(format!("expected a value, found {other:?}"))),
        }
    }

    fn command(&mut self) -> Result<Command, OrmError> {
        if self.eat_kw("CREATE") {
            self.create()
        } else if self.eat_kw("DROP") {
            self.expect_kw("TABLE")?;
            let if_exists = self.eat_kw("IF");
            if if_exists {
                self.expect_kw("EXISTS")?;
            }
            Ok(Command::Drop {
                table: self.ident()?,
                if_exists,
            })
        } else if self.eat_kw("TRUNCATE") {
            self.eat_kw("TABLE");
            Ok(Command::Truncate {
                table: self.ident()?,
            })
        } else if self.eat_kw("INSERT") {
            self.insert()
        } else if self.eat_kw("SELECT") {
            self.select()
        } else if self.eat_kw("UPDATE") {
            self.update()
        } else if self.eat_kw("DELETE") {
            self.expect_kw("FROM")?;
            let table = self.ident()?;
            let filter = self.where_clause()?;
            Ok(Command::Delete { table, filter })
        } else if self.eat_kw("USE") {
            Ok(Command::Use {
                schema: self.ident()?,
            })
        } else {
            Err(unsupported(format!("unsupported statement starting with {:?}", self.peek())))
        }
    }

    fn create(&mut self) -> Result<Command, OrmError> {
        self.expect_kw("TABLE")?;
        let if_not_exists = self.eat_kw("IF");
        if if_not_exists {
            self.expect_kw("NOT")?;
            self.expect_kw("EXISTS")?;
        }
        let table = self.ident()?;
        self.expect(&Token::LParen)?;

        let mut columns = Vec::new();
        loop {
            let definition = self.definition_tokens()?;
            if let Some(column) = column_spec(&definition)? {
                columns.push(column);
            }
            if self.eat(&Token::RParen) {
                break;
            }
            self.expect(&Token::Comma)?;
        }
        // table options are ignored
        self.pos = self.tokens.len();
        Ok(Command::Create {
            table,
            if_not_exists,
            columns,
        })
    }

    /// Tokens of one CREATE TABLE definition, up to a top-level comma or the closing paren.
    fn definition_tokens(&mut self) -> Result<Vec<Token>, OrmError> {
        let mut depth = 0usize;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => return Err(unsupported("unterminated column list")),
                Some(Token::Comma | Token::RParen) if depth == 0 => return Ok(out),
                Some(Token::LParen) => depth += 1,
                Some(Token::RParen) => depth -= 1,
                Some(_) => {}
            }
            if let Some(token) = self.bump() {
                out.push(token);
            }
        }
    }

    fn insert(&mut self) -> Result<Command, OrmError> {
        self.expect_kw("INTO")?;
        let table = self.ident()?;
        let mut columns = Vec::new();
        let mut values = Vec::new();

        if self.eat_kw("DEFAULT") {
            self.expect_kw("VALUES")?;
        } else {
            self.expect(&Token::LParen)?;
            if !self.eat(&Token::RParen) {
                loop {
                    columns.push(self.ident()?);
                    if self.eat(&Token::RParen) {
                        break;
                    }
                    self.expect(&Token::Comma)?;
                }
            }
            self.expect_kw("VALUES")?;
            self.expect(&Token::LParen)?;
            if !self.eat(&Token::RParen) {
                loop {
                    values.push(self.value()?);
                    if self.eat(&Token::RParen) {
                        break;
                    }
                    self.expect(&Token::Comma)?;
                }
            }
        }
        if columns.len() != values.len() {
            return Err(unsupported("column count does not match value count"));
        }

        let returning = if self.eat_kw("RETURNING") {
            Some(self.ident()?)
        } else {
            None
        };
        Ok(Command::Insert {
            table,
            columns,
            values,
            returning,
        })
    }

    fn select(&mut self) -> Result<Command, OrmError> {
        if self.eat_kw("LAST_INSERT_ID") {
            self.expect(&Token::LParen)?;
            self.expect(&Token::RParen)?;
            return Ok(Command::LastInsertId);
        }

        let count = if self.eat_kw("COUNT") {
            self.expect(&Token::LParen)?;
            self.expect(&Token::Op("*"))?;
            self.expect(&Token::RParen)?;
            true
        } else {
            self.expect(&Token::Op("*"))?;
            false
        };
        self.expect_kw("FROM")?;
        let table = self.ident()?;
        let filter = self.where_clause()?;

        let mut order = Vec::new();
        if self.eat_kw("ORDER") {
            self.expect_kw("BY")?;
            loop {
                let column = self.ident()?;
                let ascending = !self.eat_kw("DESC");
                if ascending {
                    self.eat_kw("ASC");
                }
                order.push((column, ascending));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let limit = if self.eat_kw("LIMIT") { Some(self.count_literal()?) } else { None };
        let offset = if self.eat_kw("OFFSET") { Some(self.count_literal()?) } else { None };

        Ok(Command::Select {
            table,
            count,
            filter,
            order,
            limit,
            offset,
        })
    }

    fn count_literal(&mut self) -> Result<usize, OrmError> {
        match self.value()?.as_i64() {
            Some(n) => usize::try_from(n).map_err(|_| unsupported("negative LIMIT/OFFSET")),
            None => Err(unsupported("LIMIT/OFFSET must be an integer")),
        }
    }

    fn update(&mut self) -> Result<Command, OrmError> {
        let table = self.ident()?;
        self.expect_kw("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.ident()?;
            self.expect(&Token::Op("="))?;
            assignments.push((column, self.value()?));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let filter = self.where_clause()?;
        Ok(Command::Update {
            table,
            assignments,
            filter,
        })
    }

    fn where_clause(&mut self) -> Result<Option<Filter>, OrmError> {
        if self.eat_kw("WHERE") {
            self.or_expr().map(Some)
        } else {
            Ok(None)
        }
    }

    fn or_expr(&mut self) -> Result<Filter, OrmError> {
        let mut terms = vec![self.and_expr()?];
        while self.eat_kw("OR") {
            terms.push(self.and_expr()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Filter::Or(terms) })
    }

    fn and_expr(&mut self) -> Result<Filter, OrmError> {
        let mut terms = vec![self.predicate()?];
        while self.eat_kw("AND") {
            terms.push(self.predicate()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Filter::And(terms) })
    }

    fn predicate(&mut self) -> Result<Filter, OrmError> {
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }
        if let Some(Token::Number(left)) = self.peek().cloned() {
            self.pos += 1;
            self.expect(&Token::Op("="))?;
            let right = self.value()?;
            return Ok(Filter::Const(literal_number(&left)? == right));
        }

        let column = self.ident()?;
        if self.eat_kw("IS") {
            let negated = self.eat_kw("NOT");
            self.expect_kw("NULL")?;
            return Ok(Filter::IsNull { column, negated });
        }
        let negated = self.eat_kw("NOT");
        if self.eat_kw("BETWEEN") {
            let low = self.value()?;
            self.expect_kw("AND")?;
            let high = self.value()?;
            return Ok(Filter::Between { column, low, high, negated });
        }
        if self.eat_kw("IN") {
            self.expect(&Token::LParen)?;
            let mut values = vec![self.value()?];
            while self.eat(&Token::Comma) {
                values.push(self.value()?);
            }
            self.expect(&Token::RParen)?;
            return Ok(Filter::In { column, values, negated });
        }
        if self.eat_kw("LIKE") {
            let pattern = self.value()?;
            return Ok(Filter::Like { column, pattern, negated });
        }
        if negated {
            return Err(unsupported("NOT must precede BETWEEN, IN or LIKE"));
        }

        let op = match self.bump() {
            Some(Token::Op("=")) => CmpOp::Eq,
            Some(Token::Op("!=")) => CmpOp::Ne,
            Some(Token::Op("<")) => CmpOp::Lt,
            Some(Token::Op(">")) => CmpOp::Gt,
            Some(Token::Op("<=")) => CmpOp::Le,
            Some(Token::Op(">=")) => CmpOp::Ge,
            other => return Err(unsupported(format!("expected comparison, found {other:?}"))),
        };
        let value = self.value()?;
        Ok(Filter::Compare { column, op, value })
    }
}

fn literal_number(text: &str) -> Result<SqlValue, OrmError> {
    if let Ok(int) = text.parse::<i64>() {
        return Ok(SqlValue::I64(int));
    }
    text.parse::<f64>()
        .map(SqlValue::Double)
        .map_err(|_| unsupported(format!("bad number `{text}`")))
}

/// Interpret one CREATE TABLE definition; index and key clauses yield `None`.
fn column_spec(tokens: &[Token]) -> Result<Option<ColumnSpec>, OrmError> {
    let name = match tokens.first() {
        Some(Token::Quoted(name)) => name.clone(),
        Some(Token::Word(word)) => {
            const CLAUSES: [&str; 7] = [
                "INDEX", "KEY", "UNIQUE", "PRIMARY", "CONSTRAINT", "FOREIGN", "FULLTEXT",
            ];
            if CLAUSES.iter().any(|c| word.eq_ignore_ascii_case(c)) {
                return Ok(None);
            }
            word.clone()
        }
        other => return Err(unsupported(format!("bad column definition start {other:?}"))),
    };

    let is =
        |token: &Token, kw: &str| matches!(token, Token::Word(w) if w.eq_ignore_ascii_case(kw));
    let mut spec = ColumnSpec {
        name,
        auto_increment: false,
        unique: false,
        not_null: false,
        default: None,
    };
    for (idx, token) in tokens.iter().enumerate().skip(1) {
        let next = tokens.get(idx + 1);
        if is(token, "AUTO_INCREMENT") || is(token, "IDENTITY") {
            spec.auto_increment = true;
        } else if is(token, "UNIQUE")
            || (is(token, "PRIMARY") && next.is_some_and(|t| is(t, "KEY")))
        {
            spec.unique = true;
        } else if is(token, "NOT") && next.is_some_and(|t| is(t, "NULL")) {
            spec.not_null = true;
        } else if is(token, "DEFAULT") {
            spec.default = match next {
                Some(Token::Number(n)) => Some(literal_number(n)?),
                Some(Token::Str(s)) => Some(SqlValue::Text(s.clone())),
                Some(t) if is(t, "TRUE") => Some(SqlValue::Bool(true)),
                Some(t) if is(t, "FALSE") => Some(SqlValue::Bool(false)),
                _ => None,
            };
        }
    }
    Ok(Some(spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(values: &[SqlValue]) -> Vec<Option<SqlValue>> {
        values.iter().cloned().map(Some).collect()
    }

    #[test]
    fn parses_create_table_with_indexes_and_options() {
        let sql = "CREATE TABLE IF NOT EXISTS `p` (`id` INT PRIMARY KEY AUTO_INCREMENT, \
                   `price` DECIMAL(10,2) DEFAULT 0, `name` VARCHAR(255) NOT NULL, \
                   INDEX idx_name (name)) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;";
        let Command::Create { table, columns, if_not_exists } = parse(sql, &[]).unwrap() else {
            panic!("expected CREATE");
        };
        assert_eq!(table, "p");
        assert!(if_not_exists);
        assert_eq!(columns.len(), 3);
        assert!(columns[0].auto_increment && columns[0].unique);
        assert_eq!(columns[1].default, Some(SqlValue::I64(0)));
        assert!(columns[2].not_null);
    }

    #[test]
    fn dollar_and_question_markers_bind_in_order() {
        let params = bound(&[SqlValue::I32(1), SqlValue::I32(2)]);
        for sql in [
            "SELECT * FROM t WHERE a = ? AND b BETWEEN 0 AND ?",
            "SELECT * FROM \"t\" WHERE a = $1 AND b BETWEEN 0 AND $2",
        ] {
            let Command::Select {
                filter: Some(Filter::And(terms)),
                ..
            } = parse(sql, &params).unwrap()
            else {
                panic!("expected conjunction");
            };
            assert!(matches!(&terms[1], Filter::Between { high: SqlValue::I32(2), .. }));
        }
    }

    #[test]
    fn unbound_parameter_is_an_error() {
        let err = parse("DELETE FROM t WHERE id = ?", &[None]).unwrap_err();
        assert!(err.to_string().contains("never bound"));
    }
}
