//! Consumes tokens from the [`Lexer`] and emits an AST of expression
//! nodes plus a typed [`ExecutionModel`].
//!
//! A recursive-descent parser keyed off a single current token, with
//! statement parsers (`parse_select`, `parse_create_table`, ...) and
//! expression parsers at increasing binding strength (`parse_or`,
//! `parse_and`, ... down to `parse_primary`). Every method returns
//! `Result<_>` rather than panicking, and allocates expression nodes into
//! the caller's `Pools` rather than an owned tree.

use crate::ast::{ExprKind, Op, Pools, QueryColumn};
use crate::error::{Result, SqlError};
use crate::lexer::{Lexeme, Lexer, Token};
use crate::model::{
    AlterColumnOp, AlterTableModel, ColumnSpec, CopyModel, CopySource, CreateTableModel, ExecutionModel, FromClause,
    InsertModel, Join, JoinKind, PartitionBy, QueryModel,
};
use crate::types::ColumnType;
use crate::value::Value;
use std::rc::Rc;

pub struct Parser<'p, 'a> {
    lexer: Lexer<'a>,
    pools: &'p mut Pools,
    cur: Lexeme,
}

impl<'p, 'a> Parser<'p, 'a> {
    pub fn new(src: &'a str, pools: &'p mut Pools) -> Result<Self> {
        let mut lexer = Lexer::new(src);
        let cur = lexer.next()?;
        Ok(Parser { lexer, pools, cur })
    }

    /// Hand the underlying lexer back to a caller that wants to peek the
    /// first keyword before committing to the model pipeline (section
    /// 4.1 step 3). Consumes `self` since a `Parser` only makes sense
    /// once its first token has been read.
    pub fn into_lexer(self) -> (Lexer<'a>, Lexeme) {
        (self.lexer, self.cur)
    }

    fn position(&self) -> usize {
        self.cur.position
    }

    fn advance(&mut self) -> Result<()> {
        self.cur = self.lexer.next()?;
        Ok(())
    }

    fn at_keyword(&self, kw: &str) -> bool {
        self.cur.is_keyword(kw)
    }

    fn eat_keyword(&mut self, kw: &str) -> Result<bool> {
        if self.at_keyword(kw) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if !self.eat_keyword(kw)? {
            return Err(SqlError::syntax(self.position(), format!("expected '{kw}'")));
        }
        Ok(())
    }

    fn expect_token(&mut self, tok: Token, what: &str) -> Result<Lexeme> {
        if self.cur.token != tok {
            return Err(SqlError::syntax(self.position(), format!("expected {what}")));
        }
        let lex = self.cur.clone();
        self.advance()?;
        Ok(lex)
    }

    fn eat_token(&mut self, tok: Token) -> Result<bool> {
        if self.cur.token == tok {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_id(&mut self, what: &str) -> Result<String> {
        if self.cur.token != Token::Id {
            return Err(SqlError::syntax(self.position(), format!("expected {what}")));
        }
        let name = self.cur.text.clone();
        self.advance()?;
        Ok(name)
    }

    /// Top-level entry point for the model pipeline (section 4.1 step 4):
    /// SELECT, CREATE TABLE [AS SELECT], INSERT, COPY. `ALTER`, `DROP`,
    /// `TRUNCATE`, `REPAIR` and `SET` never reach here -- the dispatcher
    /// recognizes them by their leading keyword and routes them straight
    /// to a keyword executor instead (section 4.1 step 3).
    pub fn parse_execution_model(&mut self) -> Result<ExecutionModel> {
        if self.at_keyword("SELECT") {
            Ok(ExecutionModel::Query(self.parse_select()?))
        } else if self.at_keyword("CREATE") {
            Ok(ExecutionModel::CreateTable(self.parse_create_table()?))
        } else if self.at_keyword("INSERT") {
            Ok(ExecutionModel::Insert(self.parse_insert()?))
        } else if self.at_keyword("COPY") {
            Ok(ExecutionModel::Copy(self.parse_copy()?))
        } else {
            Err(SqlError::syntax(self.position(), "expected a statement"))
        }
    }

    // ---- SELECT -----------------------------------------------------

    fn parse_select(&mut self) -> Result<QueryModel> {
        self.expect_keyword("SELECT")?;
        let mut model = QueryModel::new();

        if !self.eat_token(Token::Star)? {
            loop {
                let position = self.position();
                let expr = self.parse_or()?;
                let alias = if self.eat_keyword("AS")? {
                    Some(self.expect_id("column alias")?)
                } else if self.cur.token == Token::Id && !self.at_clause_keyword() {
                    Some(self.expect_id("column alias")?)
                } else {
                    None
                };
                model.columns.push(QueryColumn { alias, expr, position });
                if !self.eat_token(Token::Comma)? {
                    break;
                }
            }
        }

        if self.eat_keyword("FROM")? {
            model.from = Some(self.parse_from_source()?);
            loop {
                let kind = if self.eat_keyword("INNER")? {
                    self.expect_keyword("JOIN")?;
                    JoinKind::Inner
                } else if self.eat_keyword("LEFT")? {
                    let _ = self.eat_keyword("OUTER")?;
                    self.expect_keyword("JOIN")?;
                    JoinKind::Left
                } else if self.eat_keyword("JOIN")? {
                    JoinKind::Inner
                } else {
                    break;
                };
                let table = self.expect_id("joined table name")?;
                let _alias = self.maybe_alias()?;
                let predicate = if self.eat_keyword("ON")? { Some(self.parse_or()?) } else { None };
                model.joins.push(Join { kind, table, predicate });
            }
        }

        if self.eat_keyword("WHERE")? {
            model.wher = Some(self.parse_or()?);
        }

        if self.eat_keyword("GROUP")? {
            self.expect_keyword("BY")?;
            loop {
                model.group_by.push(self.parse_or()?);
                if !self.eat_token(Token::Comma)? {
                    break;
                }
            }
        }

        if self.eat_keyword("SAMPLE")? {
            self.expect_keyword("BY")?;
            model.sample_by = Some(self.parse_sample_interval()?);
        }

        if self.eat_keyword("ORDER")? {
            self.expect_keyword("BY")?;
            loop {
                let expr = self.parse_or()?;
                let desc = if self.eat_keyword("DESC")? {
                    true
                } else {
                    let _ = self.eat_keyword("ASC")?;
                    false
                };
                model.order_by.push((expr, desc));
                if !self.eat_token(Token::Comma)? {
                    break;
                }
            }
        }

        if self.eat_keyword("LIMIT")? {
            let position = self.position();
            let tok = self.expect_token(Token::Number, "a LIMIT count")?;
            model.limit = Some(
                tok.text
                    .parse()
                    .map_err(|_| SqlError::syntax(position, "invalid LIMIT count"))?,
            );
        }

        Ok(model)
    }

    /// `SAMPLE BY` intervals are written without a separating space
    /// (`1h`, `5m`) so the lexer splits them into a Number token
    /// immediately followed by a one-letter Id token; re-join them here.
    fn parse_sample_interval(&mut self) -> Result<String> {
        if self.cur.token == Token::QuotedString {
            let s = self.cur.text.clone();
            self.advance()?;
            return Ok(s);
        }
        let n = self.expect_token(Token::Number, "a SAMPLE BY interval")?;
        let unit = self.expect_id("a SAMPLE BY unit (s/m/h/d)")?;
        Ok(format!("{}{}", n.text, unit))
    }

    fn at_clause_keyword(&self) -> bool {
        ["FROM", "WHERE", "GROUP", "SAMPLE", "ORDER", "LIMIT", "INNER", "LEFT", "JOIN", "ON"]
            .iter()
            .any(|kw| self.at_keyword(kw))
    }

    fn maybe_alias(&mut self) -> Result<Option<String>> {
        if self.cur.token == Token::Id && !self.at_clause_keyword() {
            Ok(Some(self.expect_id("table alias")?))
        } else {
            Ok(None)
        }
    }

    fn parse_from_source(&mut self) -> Result<FromClause> {
        if self.eat_token(Token::LParen)? {
            let nested = self.parse_select()?;
            self.expect_token(Token::RParen, "closing ')' after nested query")?;
            let _alias = self.maybe_alias()?;
            Ok(FromClause::Nested(Box::new(nested)))
        } else {
            let name = self.expect_id("a table name")?;
            let _alias = self.maybe_alias()?;
            Ok(FromClause::Table(name))
        }
    }

    // ---- Expressions, by increasing binding strength -----------------

    fn parse_or(&mut self) -> Result<crate::ast::ExprId> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword("OR")? {
            let position = self.position();
            let rhs = self.parse_and()?;
            lhs = self.pools.alloc(ExprKind::Binary(Op::Or, lhs, rhs), position);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<crate::ast::ExprId> {
        let mut lhs = self.parse_not()?;
        while self.eat_keyword("AND")? {
            let position = self.position();
            let rhs = self.parse_not()?;
            lhs = self.pools.alloc(ExprKind::Binary(Op::And, lhs, rhs), position);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<crate::ast::ExprId> {
        if self.at_keyword("NOT") {
            let position = self.position();
            self.advance()?;
            let inner = self.parse_not()?;
            return Ok(self.pools.alloc(ExprKind::Unary(Op::Not, inner), position));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<crate::ast::ExprId> {
        let lhs = self.parse_concat()?;
        let op = match self.cur.token {
            Token::Eq => Op::Eq,
            Token::NotEq => Op::NotEq,
            Token::Lt => Op::Lt,
            Token::LtEq => Op::LtEq,
            Token::Gt => Op::Gt,
            Token::GtEq => Op::GtEq,
            _ => return Ok(lhs),
        };
        let position = self.position();
        self.advance()?;
        let rhs = self.parse_concat()?;
        Ok(self.pools.alloc(ExprKind::Binary(op, lhs, rhs), position))
    }

    fn parse_concat(&mut self) -> Result<crate::ast::ExprId> {
        let mut lhs = self.parse_additive()?;
        while self.at_concat() {
            let position = self.position();
            self.advance()?;
            self.advance()?;
            let rhs = self.parse_additive()?;
            lhs = self.pools.alloc(ExprKind::Binary(Op::Concat, lhs, rhs), position);
        }
        Ok(lhs)
    }

    fn at_concat(&self) -> bool {
        self.cur.token == Token::Pipe
    }

    fn parse_additive(&mut self) -> Result<crate::ast::ExprId> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.cur.token {
                Token::Plus => Op::Add,
                Token::Minus => Op::Sub,
                _ => break,
            };
            let position = self.position();
            self.advance()?;
            let rhs = self.parse_multiplicative()?;
            lhs = self.pools.alloc(ExprKind::Binary(op, lhs, rhs), position);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<crate::ast::ExprId> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.cur.token {
                Token::Star => Op::Mul,
                Token::Slash => Op::Div,
                Token::Percent => Op::Mod,
                _ => break,
            };
            let position = self.position();
            self.advance()?;
            let rhs = self.parse_unary()?;
            lhs = self.pools.alloc(ExprKind::Binary(op, lhs, rhs), position);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<crate::ast::ExprId> {
        if self.cur.token == Token::Minus {
            let position = self.position();
            self.advance()?;
            let inner = self.parse_unary()?;
            return Ok(self.pools.alloc(ExprKind::Unary(Op::Neg, inner), position));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<crate::ast::ExprId> {
        let position = self.position();
        match self.cur.token {
            Token::Number => {
                let text = self.cur.text.clone();
                self.advance()?;
                let value = parse_numeric_literal(&text);
                Ok(self.pools.alloc(ExprKind::Literal(value), position))
            }
            Token::QuotedString => {
                let text = self.cur.text.clone();
                self.advance()?;
                Ok(self.pools.alloc(ExprKind::Literal(Value::String(Rc::from(text.as_str()))), position))
            }
            Token::LParen => {
                self.advance()?;
                let inner = self.parse_or()?;
                self.expect_token(Token::RParen, "closing ')'")?;
                Ok(inner)
            }
            Token::Minus => self.parse_unary(),
            Token::Id => {
                if self.at_keyword("TRUE") {
                    self.advance()?;
                    Ok(self.pools.alloc(ExprKind::Literal(Value::Boolean(true)), position))
                } else if self.at_keyword("FALSE") {
                    self.advance()?;
                    Ok(self.pools.alloc(ExprKind::Literal(Value::Boolean(false)), position))
                } else if self.at_keyword("NULL") {
                    self.advance()?;
                    Ok(self.pools.alloc(ExprKind::Literal(Value::Null), position))
                } else if self.at_keyword("CASE") {
                    self.parse_case()
                } else {
                    let name = self.cur.text.clone();
                    self.advance()?;
                    if self.eat_token(Token::Dot)? {
                        // Qualified `table.column`: the resolver only
                        // matches by final segment, so the qualifier is
                        // dropped here rather than threaded through.
                        let tail = self.expect_id("a column name")?;
                        return Ok(self.pools.alloc(ExprKind::ColumnRef(tail), position));
                    }
                    if self.eat_token(Token::LParen)? {
                        let mut args = Vec::new();
                        if self.cur.token != Token::RParen {
                            loop {
                                if self.eat_token(Token::Star)? {
                                    // COUNT(*): no expression-level arg.
                                    break;
                                }
                                args.push(self.parse_or()?);
                                if !self.eat_token(Token::Comma)? {
                                    break;
                                }
                            }
                        }
                        self.expect_token(Token::RParen, "closing ')' after function arguments")?;
                        Ok(self.pools.alloc(ExprKind::Call(name, args), position))
                    } else {
                        Ok(self.pools.alloc(ExprKind::ColumnRef(name), position))
                    }
                }
            }
            _ => Err(SqlError::syntax(position, "expected an expression")),
        }
    }

    fn parse_case(&mut self) -> Result<crate::ast::ExprId> {
        let position = self.position();
        self.expect_keyword("CASE")?;
        let mut branches = Vec::new();
        while self.eat_keyword("WHEN")? {
            let when = self.parse_or()?;
            self.expect_keyword("THEN")?;
            let then = self.parse_or()?;
            branches.push((when, then));
        }
        self.expect_keyword("ELSE")?;
        let otherwise = self.parse_or()?;
        self.expect_keyword("END")?;
        Ok(self.pools.alloc(ExprKind::Case(branches, otherwise), position))
    }

    // ---- CREATE TABLE [AS SELECT] -------------------------------------

    fn parse_create_table(&mut self) -> Result<CreateTableModel> {
        self.expect_keyword("CREATE")?;
        self.expect_keyword("TABLE")?;
        let table_name = self.expect_id("a table name")?;

        let mut model = CreateTableModel {
            table_name,
            columns: Vec::new(),
            casts: Default::default(),
            timestamp_column: None,
            partition_by: PartitionBy::None,
            query: None,
        };

        if self.eat_keyword("AS")? {
            self.expect_token(Token::LParen, "'(' after AS")?;
            model.query = Some(Box::new(self.parse_select()?));
            self.expect_token(Token::RParen, "closing ')' after nested query")?;
            while self.eat_token(Token::Comma)? {
                self.expect_keyword("CAST")?;
                self.expect_token(Token::LParen, "'(' after CAST")?;
                let col = self.expect_id("a column name")?;
                self.expect_keyword("AS")?;
                let type_name = self.expect_id("a column type")?;
                let to = ColumnType::from_name(&type_name)
                    .ok_or_else(|| SqlError::syntax(self.position(), format!("unknown type '{type_name}'")))?;
                // A CAST to SYMBOL may itself carry a CAPACITY; not part
                // of the cast-group check (section 3), so it's consumed
                // and discarded rather than threaded through.
                if self.eat_keyword("CAPACITY")? {
                    self.expect_token(Token::Number, "a capacity")?;
                }
                self.expect_token(Token::RParen, "closing ')' after CAST")?;
                model.casts.insert(col, to);
            }
        } else {
            self.expect_token(Token::LParen, "'(' after table name")?;
            loop {
                model.columns.push(self.parse_column_spec()?);
                if !self.eat_token(Token::Comma)? {
                    break;
                }
            }
            self.expect_token(Token::RParen, "closing ')' after column list")?;
        }

        if self.eat_keyword("TIMESTAMP")? {
            self.expect_token(Token::LParen, "'(' after TIMESTAMP")?;
            model.timestamp_column = Some(self.expect_id("a timestamp column name")?);
            self.expect_token(Token::RParen, "closing ')' after TIMESTAMP")?;
        }

        if self.eat_keyword("PARTITION")? {
            self.expect_keyword("BY")?;
            let position = self.position();
            let name = self.expect_id("a partition mode")?;
            model.partition_by = match name.to_ascii_uppercase().as_str() {
                "NONE" => PartitionBy::None,
                "DAY" => PartitionBy::Day,
                "MONTH" => PartitionBy::Month,
                "YEAR" => PartitionBy::Year,
                _ => return Err(SqlError::syntax(position, format!("unknown partition mode '{name}'"))),
            };
        }

        Ok(model)
    }

    fn parse_column_spec(&mut self) -> Result<ColumnSpec> {
        let name = self.expect_id("a column name")?;
        let position = self.position();
        let type_name = self.expect_id("a column type")?;
        let col_type = ColumnType::from_name(&type_name)
            .ok_or_else(|| SqlError::syntax(position, format!("unknown type '{type_name}'")))?;

        let mut spec = ColumnSpec {
            name,
            col_type,
            symbol_capacity: None,
            symbol_cache: None,
            indexed: false,
            index_value_block_capacity: None,
        };
        loop {
            if self.eat_keyword("CAPACITY")? {
                let position = self.position();
                let n = self.expect_token(Token::Number, "a capacity")?;
                spec.symbol_capacity = Some(
                    n.text
                        .parse()
                        .map_err(|_| SqlError::syntax(position, "invalid capacity"))?,
                );
            } else if self.eat_keyword("NOCACHE")? {
                spec.symbol_cache = Some(false);
            } else if self.eat_keyword("CACHE")? {
                spec.symbol_cache = Some(true);
            } else if self.eat_keyword("INDEX")? {
                spec.indexed = true;
                if self.eat_keyword("CAPACITY")? {
                    let position = self.position();
                    let n = self.expect_token(Token::Number, "an index capacity")?;
                    spec.index_value_block_capacity = Some(
                        n.text
                            .parse()
                            .map_err(|_| SqlError::syntax(position, "invalid index capacity"))?,
                    );
                }
            } else {
                break;
            }
        }
        Ok(spec)
    }

    // ---- INSERT --------------------------------------------------------

    fn parse_insert(&mut self) -> Result<InsertModel> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table_name = self.expect_id("a table name")?;

        let mut columns = Vec::new();
        if self.eat_token(Token::LParen)? {
            loop {
                columns.push(self.expect_id("a column name")?);
                if !self.eat_token(Token::Comma)? {
                    break;
                }
            }
            self.expect_token(Token::RParen, "closing ')' after column list")?;
        }

        if self.at_keyword("SELECT") {
            let query = self.parse_select()?;
            return Ok(InsertModel {
                table_name,
                columns,
                values: Vec::new(),
                query: Some(Box::new(query)),
            });
        }

        self.expect_keyword("VALUES")?;
        self.expect_token(Token::LParen, "'(' after VALUES")?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_or()?);
            if !self.eat_token(Token::Comma)? {
                break;
            }
        }
        self.expect_token(Token::RParen, "closing ')' after VALUES list")?;

        Ok(InsertModel {
            table_name,
            columns,
            values,
            query: None,
        })
    }

    // ---- COPY ------------------------------------------------------------

    fn parse_copy(&mut self) -> Result<CopyModel> {
        self.expect_keyword("COPY")?;
        let source = if self.cur.token == Token::QuotedString {
            let s = self.cur.text.clone();
            self.advance()?;
            CopySource::File(s)
        } else if self.at_keyword("stdin") {
            self.advance()?;
            CopySource::Stdin
        } else {
            return Err(SqlError::syntax(self.position(), "expected a file path or 'stdin'"));
        };
        self.expect_keyword("INTO")?;
        let table_name = self.expect_id("a table name")?;
        Ok(CopyModel { source, table_name })
    }

    // ---- ALTER TABLE -------------------------------------------------

    /// Parses the remainder of `ALTER TABLE <name> (ADD|DROP) COLUMN ...`
    /// after the dispatcher has already consumed the leading `ALTER`
    /// keyword (section 4.1 step 3: keyword executors consume the stream
    /// directly rather than going through `parse_execution_model`).
    pub fn parse_alter_table(&mut self) -> Result<AlterTableModel> {
        self.expect_keyword("TABLE")?;
        let table_name = self.expect_id("a table name")?;
        let mut ops = Vec::new();
        loop {
            if self.eat_keyword("ADD")? {
                self.expect_keyword("COLUMN")?;
                ops.push(AlterColumnOp::Add(self.parse_column_spec()?));
            } else if self.eat_keyword("DROP")? {
                self.expect_keyword("COLUMN")?;
                loop {
                    ops.push(AlterColumnOp::Drop(self.expect_id("a column name")?));
                    if !self.eat_token(Token::Comma)? {
                        break;
                    }
                }
            } else {
                break;
            }
            if !self.eat_token(Token::Comma)? {
                break;
            }
        }
        if ops.is_empty() {
            return Err(SqlError::syntax(self.position(), "expected ADD or DROP COLUMN"));
        }
        Ok(AlterTableModel { table_name, ops })
    }

    /// `TRUNCATE TABLE t1, t2` / `REPAIR TABLE t1, t2` / `DROP TABLE t`
    /// share this trailing grammar once their leading keyword has been
    /// consumed by the dispatcher.
    pub fn parse_table_name_list(&mut self) -> Result<Vec<String>> {
        self.expect_keyword("TABLE")?;
        let mut names = Vec::new();
        loop {
            names.push(self.expect_id("a table name")?);
            if !self.eat_token(Token::Comma)? {
                break;
            }
        }
        Ok(names)
    }
}

/// A bare numeric literal types as `DOUBLE` if it has a fraction or
/// exponent, else as the narrowest of `INT`/`LONG` that holds it
/// (section 4.2's conversion table only has cells for `INT`/`LONG`
/// sources, never an untyped literal, so the parser has to pick one).
fn parse_numeric_literal(text: &str) -> Value {
    if text.contains('.') || text.contains('e') || text.contains('E') {
        Value::Double(text.parse().unwrap_or(f64::NAN))
    } else if let Ok(i) = text.parse::<i32>() {
        Value::Int(i)
    } else {
        Value::Long(text.parse().unwrap_or(crate::value::LONG_NULL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_select() {
        let mut pools = Pools::new();
        let mut p = Parser::new("SELECT x, y FROM t WHERE x > 1 LIMIT 5", &mut pools).unwrap();
        let model = p.parse_select().unwrap();
        assert_eq!(model.columns.len(), 2);
        assert!(matches!(model.from, Some(FromClause::Table(ref n)) if n == "t"));
        assert!(model.wher.is_some());
        assert_eq!(model.limit, Some(5));
    }

    #[test]
    fn parses_star_select() {
        let mut pools = Pools::new();
        let mut p = Parser::new("SELECT * FROM t", &mut pools).unwrap();
        let model = p.parse_select().unwrap();
        assert!(model.is_star());
    }

    #[test]
    fn parses_create_table_with_timestamp_and_partition() {
        let mut pools = Pools::new();
        let mut p = Parser::new(
            "CREATE TABLE a (x INT, ts TIMESTAMP) TIMESTAMP(ts) PARTITION BY DAY",
            &mut pools,
        )
        .unwrap();
        let model = p.parse_create_table().unwrap();
        assert_eq!(model.table_name, "a");
        assert_eq!(model.columns.len(), 2);
        assert_eq!(model.timestamp_column.as_deref(), Some("ts"));
        assert_eq!(model.partition_by, PartitionBy::Day);
    }

    #[test]
    fn parses_create_table_as_select_with_cast() {
        let mut pools = Pools::new();
        let mut p = Parser::new("CREATE TABLE g AS (SELECT * FROM f), CAST(x AS LONG)", &mut pools).unwrap();
        let model = p.parse_create_table().unwrap();
        assert!(model.query.is_some());
        assert_eq!(model.casts.get("x"), Some(&ColumnType::Long));
    }

    #[test]
    fn parses_insert_values() {
        let mut pools = Pools::new();
        let mut p = Parser::new("INSERT INTO a VALUES (1, 1577836800000000)", &mut pools).unwrap();
        let model = p.parse_insert().unwrap();
        assert_eq!(model.table_name, "a");
        assert_eq!(model.values.len(), 2);
    }

    #[test]
    fn parses_insert_as_select_with_column_list() {
        let mut pools = Pools::new();
        let mut p = Parser::new("INSERT INTO a (x) SELECT y FROM b", &mut pools).unwrap();
        let model = p.parse_insert().unwrap();
        assert_eq!(model.columns, vec!["x".to_string()]);
        assert!(model.query.is_some());
    }

    #[test]
    fn parses_copy_local_and_stdin() {
        let mut pools = Pools::new();
        let mut p = Parser::new("COPY 'data.csv' INTO t", &mut pools).unwrap();
        let model = p.parse_copy().unwrap();
        assert!(matches!(model.source, CopySource::File(ref f) if f == "data.csv"));
        assert_eq!(model.table_name, "t");

        let mut pools2 = Pools::new();
        let mut p2 = Parser::new("COPY stdin INTO t", &mut pools2).unwrap();
        let model2 = p2.parse_copy().unwrap();
        assert!(matches!(model2.source, CopySource::Stdin));
    }

    #[test]
    fn literal_typing_picks_int_or_long_or_double() {
        assert_eq!(parse_numeric_literal("3"), Value::Int(3));
        assert_eq!(parse_numeric_literal("3.5"), Value::Double(3.5));
        assert_eq!(parse_numeric_literal("1577836800000000"), Value::Long(1577836800000000));
    }

    #[test]
    fn parses_sample_by_interval() {
        let mut pools = Pools::new();
        let mut p = Parser::new("SELECT * FROM t SAMPLE BY 1h", &mut pools).unwrap();
        let model = p.parse_select().unwrap();
        assert_eq!(model.sample_by.as_deref(), Some("1h"));
    }

    #[test]
    fn parses_case_expression() {
        let mut pools = Pools::new();
        let mut p = Parser::new("SELECT CASE WHEN x > 1 THEN 1 ELSE 0 END FROM t", &mut pools).unwrap();
        let model = p.parse_select().unwrap();
        assert_eq!(model.columns.len(), 1);
    }
}
