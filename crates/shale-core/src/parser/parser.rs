//! Recursive-descent SQL parser.

use super::error::ParseError;
use super::pratt::{
    infix_binding_power, prefix_binding_power, token_to_binary_op, token_to_unary_op,
};
use crate::ast::{
    AggregateFunc, Assignment, BinaryOp, ColumnDef, CreateIndexStatement, CreateTableStatement,
    DeleteStatement, DropIndexStatement, DropTableStatement, Expr, FunctionCall, InsertStatement,
    Join, JoinType, Literal, OrderBy, OrderDirection, SelectItem, SelectStatement, Statement,
    TableRef, UpdateStatement,
};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::types::parse_type;

/// SQL parser over a tokenized statement.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self {
            tokens: Lexer::new(input).tokenize(),
            pos: 0,
        }
    }

    /// Parses exactly one statement, allowing a trailing semicolon.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the input is not a single valid SQL
    /// statement.
    pub fn parse(&mut self) -> Result<Statement, ParseError> {
        let statement = self.parse_statement()?;
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }
        if !self.current().is_eof() {
            return Err(ParseError::unexpected(
                "end of statement",
                &self.current().kind,
                self.current().span,
            ));
        }
        Ok(statement)
    }

    /// Parses a single SQL statement.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the input is not a valid SQL statement.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.current().as_keyword() {
            Some(Keyword::Select) => Ok(Statement::Select(self.parse_select()?)),
            Some(Keyword::Insert) => Ok(Statement::Insert(self.parse_insert()?)),
            Some(Keyword::Update) => Ok(Statement::Update(self.parse_update()?)),
            Some(Keyword::Delete) => Ok(Statement::Delete(self.parse_delete()?)),
            Some(Keyword::Create) => self.parse_create(),
            Some(Keyword::Drop) => self.parse_drop(),
            Some(Keyword::Show) => {
                self.advance();
                self.expect_keyword(Keyword::Tables)?;
                Ok(Statement::ShowTables)
            }
            Some(Keyword::Describe) => {
                self.advance();
                Ok(Statement::Describe(self.expect_identifier()?))
            }
            Some(Keyword::Truncate) => {
                self.advance();
                self.match_keyword(Keyword::Table);
                Ok(Statement::Truncate(self.expect_identifier()?))
            }
            _ => Err(ParseError::unexpected(
                "a SQL statement",
                &self.current().kind,
                self.current().span,
            )),
        }
    }

    // ===============================================================
    // Statements
    // ===============================================================

    fn parse_select(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect_keyword(Keyword::Select)?;

        let distinct = self.match_keyword(Keyword::Distinct);
        let columns = self.parse_select_items()?;

        let from = if self.match_keyword(Keyword::From) {
            Some(self.parse_table_ref()?)
        } else {
            None
        };

        let mut joins = Vec::new();
        while self.is_join_keyword() {
            joins.push(self.parse_join()?);
        }

        let where_clause = if self.match_keyword(Keyword::Where) {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        let group_by = if self.match_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            self.parse_expression_list()?
        } else {
            Vec::new()
        };

        let having = if self.match_keyword(Keyword::Having) {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        let order_by = if self.match_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let limit = if self.match_keyword(Keyword::Limit) {
            Some(self.expect_row_count()?)
        } else {
            None
        };

        let offset = if self.match_keyword(Keyword::Offset) {
            Some(self.expect_row_count()?)
        } else {
            None
        };

        Ok(SelectStatement {
            distinct,
            columns,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_items(&mut self) -> Result<Vec<SelectItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.check(&TokenKind::Star) {
                self.advance();
                items.push(SelectItem::Wildcard);
            } else {
                let expr = self.parse_expression(0)?;
                // AS alias, or a bare identifier as an implicit alias.
                // Clause keywords (FROM, WHERE, ...) are separate token
                // kinds, so they can never be taken as an alias.
                let alias = if self.match_keyword(Keyword::As) {
                    Some(self.expect_identifier()?)
                } else if matches!(self.current().kind, TokenKind::Identifier(_)) {
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                items.push(SelectItem::Expr { expr, alias });
            }

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    fn parse_table_ref(&mut self) -> Result<TableRef, ParseError> {
        let name = self.expect_identifier()?;
        let alias = if matches!(self.current().kind, TokenKind::Identifier(_)) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        Ok(TableRef { name, alias })
    }

    fn is_join_keyword(&self) -> bool {
        matches!(
            self.current().as_keyword(),
            Some(Keyword::Join | Keyword::Inner | Keyword::Left | Keyword::Right | Keyword::Cross)
        )
    }

    fn parse_join(&mut self) -> Result<Join, ParseError> {
        let join_type = match self.current().as_keyword() {
            Some(Keyword::Join) => {
                self.advance();
                JoinType::Inner
            }
            Some(Keyword::Inner) => {
                self.advance();
                self.expect_keyword(Keyword::Join)?;
                JoinType::Inner
            }
            Some(Keyword::Left) => {
                self.advance();
                self.match_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinType::Left
            }
            Some(Keyword::Right) => {
                self.advance();
                self.match_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinType::Right
            }
            Some(Keyword::Cross) => {
                self.advance();
                self.expect_keyword(Keyword::Join)?;
                JoinType::Cross
            }
            _ => {
                return Err(ParseError::unexpected(
                    "JOIN",
                    &self.current().kind,
                    self.current().span,
                ));
            }
        };

        let table = self.parse_table_ref()?;

        let on = if join_type != JoinType::Cross && self.match_keyword(Keyword::On) {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(Join {
            join_type,
            table,
            on,
        })
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderBy>, ParseError> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expression(0)?;
            let direction = if self.match_keyword(Keyword::Desc) {
                OrderDirection::Desc
            } else {
                self.match_keyword(Keyword::Asc);
                OrderDirection::Asc
            };
            items.push(OrderBy { expr, direction });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    fn parse_insert(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_identifier()?;

        let columns = if self.check(&TokenKind::LeftParen) {
            self.advance();
            let columns = self.parse_identifier_list()?;
            self.expect(&TokenKind::RightParen)?;
            columns
        } else {
            Vec::new()
        };

        self.expect_keyword(Keyword::Values)?;

        let mut values = Vec::new();
        loop {
            self.expect(&TokenKind::LeftParen)?;
            values.push(self.parse_expression_list()?);
            self.expect(&TokenKind::RightParen)?;
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(InsertStatement {
            table,
            columns,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateStatement, ParseError> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.expect_identifier()?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expression(0)?;
            assignments.push(Assignment { column, value });
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        let where_clause = if self.match_keyword(Keyword::Where) {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(UpdateStatement {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_identifier()?;

        let where_clause = if self.match_keyword(Keyword::Where) {
            Some(self.parse_expression(0)?)
        } else {
            None
        };

        Ok(DeleteStatement {
            table,
            where_clause,
        })
    }

    fn parse_create(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::Create)?;
        match self.current().as_keyword() {
            Some(Keyword::Table) => {
                self.advance();
                Ok(Statement::CreateTable(self.parse_create_table()?))
            }
            Some(Keyword::Unique) => {
                self.advance();
                self.expect_keyword(Keyword::Index)?;
                Ok(Statement::CreateIndex(self.parse_create_index(true)?))
            }
            Some(Keyword::Index) => {
                self.advance();
                Ok(Statement::CreateIndex(self.parse_create_index(false)?))
            }
            _ => Err(ParseError::unexpected(
                "TABLE or INDEX",
                &self.current().kind,
                self.current().span,
            )),
        }
    }

    fn parse_create_table(&mut self) -> Result<CreateTableStatement, ParseError> {
        let if_not_exists = if self.match_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            true
        } else {
            false
        };

        let table = self.expect_identifier()?;
        self.expect(&TokenKind::LeftParen)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RightParen)?;

        Ok(CreateTableStatement {
            table,
            if_not_exists,
            columns,
        })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef, ParseError> {
        let name = self.expect_identifier()?;

        let type_span = self.current().span;
        let type_name = self.expect_identifier()?;
        let type_text = if self.check(&TokenKind::LeftParen) {
            self.advance();
            let size = match &self.current().kind {
                TokenKind::Integer(n) => *n,
                other => {
                    return Err(ParseError::unexpected(
                        "a type size",
                        &other.clone(),
                        self.current().span,
                    ));
                }
            };
            self.advance();
            self.expect(&TokenKind::RightParen)?;
            format!("{type_name}({size})")
        } else {
            type_name
        };
        let col_type =
            parse_type(&type_text).map_err(|e| ParseError::new(e.to_string(), type_span))?;

        let mut column = ColumnDef {
            name,
            col_type,
            primary_key: false,
            unique: false,
            not_null: false,
            default: None,
        };

        loop {
            match self.current().as_keyword() {
                Some(Keyword::Primary) => {
                    self.advance();
                    self.expect_keyword(Keyword::Key)?;
                    column.primary_key = true;
                }
                Some(Keyword::Unique) => {
                    self.advance();
                    column.unique = true;
                }
                Some(Keyword::Not) => {
                    self.advance();
                    self.expect_keyword(Keyword::Null)?;
                    column.not_null = true;
                }
                Some(Keyword::Default) => {
                    self.advance();
                    column.default = Some(self.parse_literal()?);
                }
                _ => break,
            }
        }

        Ok(column)
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Integer(i) => {
                self.advance();
                Ok(Literal::Integer(i))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Literal::Float(f))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Literal::String(s))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Literal::Boolean(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Literal::Boolean(false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Literal::Null)
            }
            TokenKind::Minus => {
                self.advance();
                match self.current().kind {
                    TokenKind::Integer(i) => {
                        self.advance();
                        Ok(Literal::Integer(-i))
                    }
                    TokenKind::Float(f) => {
                        self.advance();
                        Ok(Literal::Float(-f))
                    }
                    _ => Err(ParseError::unexpected(
                        "a number",
                        &self.current().kind,
                        self.current().span,
                    )),
                }
            }
            other => Err(ParseError::unexpected("a literal value", &other, token.span)),
        }
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<CreateIndexStatement, ParseError> {
        let name = self.expect_identifier()?;
        self.expect_keyword(Keyword::On)?;
        let table = self.expect_identifier()?;
        self.expect(&TokenKind::LeftParen)?;
        let column = self.expect_identifier()?;
        self.expect(&TokenKind::RightParen)?;

        Ok(CreateIndexStatement {
            name,
            table,
            column,
            unique,
        })
    }

    fn parse_drop(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword(Keyword::Drop)?;
        match self.current().as_keyword() {
            Some(Keyword::Table) => {
                self.advance();
                let if_exists = if self.match_keyword(Keyword::If) {
                    self.expect_keyword(Keyword::Exists)?;
                    true
                } else {
                    false
                };
                let table = self.expect_identifier()?;
                Ok(Statement::DropTable(DropTableStatement { table, if_exists }))
            }
            Some(Keyword::Index) => {
                self.advance();
                let name = self.expect_identifier()?;
                self.expect_keyword(Keyword::On)?;
                let table = self.expect_identifier()?;
                Ok(Statement::DropIndex(DropIndexStatement { name, table }))
            }
            _ => Err(ParseError::unexpected(
                "TABLE or INDEX",
                &self.current().kind,
                self.current().span,
            )),
        }
    }

    // ===============================================================
    // Expressions
    // ===============================================================

    fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some((l_bp, r_bp)) = infix_binding_power(&self.current().kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }

            match self.current().as_keyword() {
                Some(Keyword::Is) => {
                    self.advance();
                    let negated = self.match_keyword(Keyword::Not);
                    self.expect_keyword(Keyword::Null)?;
                    lhs = Expr::IsNull {
                        expr: Box::new(lhs),
                        negated,
                    };
                }
                Some(Keyword::In) => {
                    self.advance();
                    self.expect(&TokenKind::LeftParen)?;
                    let list = self.parse_expression_list()?;
                    self.expect(&TokenKind::RightParen)?;
                    lhs = Expr::In {
                        expr: Box::new(lhs),
                        list,
                    };
                }
                Some(Keyword::Between) => {
                    // `x BETWEEN low AND high` rewrites to
                    // `x >= low AND x <= high`.
                    self.advance();
                    let low = self.parse_expression(r_bp)?;
                    self.expect_keyword(Keyword::And)?;
                    let high = self.parse_expression(r_bp)?;
                    lhs = Expr::Binary {
                        left: Box::new(Expr::Binary {
                            left: Box::new(lhs.clone()),
                            op: BinaryOp::GtEq,
                            right: Box::new(low),
                        }),
                        op: BinaryOp::And,
                        right: Box::new(Expr::Binary {
                            left: Box::new(lhs),
                            op: BinaryOp::LtEq,
                            right: Box::new(high),
                        }),
                    };
                }
                _ => {
                    if let Some(op) = token_to_binary_op(&self.current().kind) {
                        self.advance();
                        let rhs = self.parse_expression(r_bp)?;
                        lhs = Expr::Binary {
                            left: Box::new(lhs),
                            op,
                            right: Box::new(rhs),
                        };
                    } else {
                        break;
                    }
                }
            }
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        if let Some(op) = token_to_unary_op(&self.current().kind) {
            let bp = prefix_binding_power(&self.current().kind).unwrap_or(13);
            self.advance();
            let operand = self.parse_expression(bp)?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::String(_)
            | TokenKind::Keyword(Keyword::True | Keyword::False | Keyword::Null) => {
                Ok(Expr::Literal(self.parse_literal()?))
            }

            TokenKind::Star => {
                self.advance();
                Ok(Expr::Wildcard)
            }

            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression(0)?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::Keyword(kw) => {
                let func = match kw {
                    Keyword::Count => AggregateFunc::Count,
                    Keyword::Sum => AggregateFunc::Sum,
                    Keyword::Avg => AggregateFunc::Avg,
                    Keyword::Min => AggregateFunc::Min,
                    Keyword::Max => AggregateFunc::Max,
                    _ => {
                        return Err(ParseError::unexpected(
                            "an expression",
                            &token.kind,
                            token.span,
                        ));
                    }
                };
                self.advance();
                self.parse_function_call(func)
            }

            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::Dot) {
                    self.advance();
                    let column = self.expect_identifier()?;
                    Ok(Expr::Column {
                        table: Some(name),
                        name: column,
                        span: token.span,
                    })
                } else {
                    Ok(Expr::Column {
                        table: None,
                        name,
                        span: token.span,
                    })
                }
            }

            _ => Err(ParseError::unexpected(
                "an expression",
                &token.kind,
                token.span,
            )),
        }
    }

    fn parse_function_call(&mut self, func: AggregateFunc) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        let distinct = self.match_keyword(Keyword::Distinct);

        let args = if self.check(&TokenKind::RightParen) {
            Vec::new()
        } else if self.check(&TokenKind::Star) {
            self.advance();
            vec![Expr::Wildcard]
        } else {
            self.parse_expression_list()?
        };

        self.expect(&TokenKind::RightParen)?;

        Ok(Expr::Function(FunctionCall {
            func,
            args,
            distinct,
        }))
    }

    fn parse_expression_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut list = vec![self.parse_expression(0)?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            list.push(self.parse_expression(0)?);
        }
        Ok(list)
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut list = vec![self.expect_identifier()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            list.push(self.expect_identifier()?);
        }
        Ok(list)
    }

    // ===============================================================
    // Token helpers
    // ===============================================================

    fn current(&self) -> &Token {
        // The token stream always ends with EOF.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.current().as_keyword() == Some(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                kind.to_sql(),
                &self.current().kind,
                self.current().span,
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(ParseError::unexpected(
                keyword.as_str(),
                &self.current().kind,
                self.current().span,
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::unexpected(
                "an identifier",
                &other.clone(),
                self.current().span,
            )),
        }
    }

    fn expect_row_count(&mut self) -> Result<u64, ParseError> {
        match self.current().kind {
            TokenKind::Integer(n) if n >= 0 => {
                self.advance();
                Ok(n as u64)
            }
            ref other => Err(ParseError::unexpected(
                "a row count",
                &other.clone(),
                self.current().span,
            )),
        }
    }
}
