use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::engine::BookingRequest;
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom {
        room: NewRoom,
        returning: bool,
    },
    InsertBooking {
        request: BookingRequest,
        returning: bool,
    },
    SelectRooms {
        filter: RoomFilter,
    },
    SelectBookings {
        filter: BookingFilter,
    },
    SelectAvailability {
        room_id: RoomId,
        check_in: Option<NaiveDate>,
        check_out: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomFilter {
    All,
    Id(RoomId),
    Number(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFilter {
    All,
    Id(BookingId),
    RoomId(RoomId),
}

const ROOM_COLUMNS: &[&str] = &[
    "room_number",
    "room_type",
    "max_guests",
    "balcony",
    "beach_view",
    "air_conditioning",
];

const BOOKING_COLUMNS: &[&str] = &[
    "room_id",
    "check_in",
    "check_out",
    "guest_count",
    "guest_names",
    "created_by",
    "privilege",
    "special_requests",
];

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Query(query) => parse_select(query),
        Statement::Delete(_) => Err(SqlError::Unsupported(
            "DELETE: rooms and bookings are create-only".into(),
        )),
        Statement::Update { .. } => Err(SqlError::Unsupported(
            "UPDATE: rooms and bookings are create-only".into(),
        )),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// The table whose rows a statement returns: the FROM table of a SELECT,
/// or the target of `INSERT ... RETURNING`. `$n` placeholders parse as
/// values, so unbound statements can be inspected.
pub fn result_table(sql: &str) -> Result<Option<String>, SqlError> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| SqlError::Parse(e.to_string()))?;
    match stmts.first() {
        Some(Statement::Insert(insert)) if insert.returning.is_some() => {
            insert_table_name(insert).map(Some)
        }
        Some(Statement::Query(query)) => match query.body.as_ref() {
            SetExpr::Select(select) => select
                .from
                .first()
                .map(|from| table_factor_name(&from.relation))
                .transpose(),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let returning = insert.returning.is_some();

    match table.as_str() {
        "rooms" => {
            let row = insert_row(insert, ROOM_COLUMNS)?;
            let room_type = match row.get("room_type") {
                Some(expr) if !is_null(expr) => {
                    let s = parse_string(expr)?;
                    s.parse::<RoomType>()
                        .map_err(|e| SqlError::InvalidValue(e.to_string()))?
                }
                _ => return Err(SqlError::InvalidValue("room_type must not be null".into())),
            };
            let amenities = Amenities {
                balcony: row.bool_or_false("balcony")?,
                beach_view: row.bool_or_false("beach_view")?,
                air_conditioning: row.bool_or_false("air_conditioning")?,
            };
            let room = NewRoom::new(
                row.u32_or_zero("room_number")?,
                room_type,
                row.u32_or_zero("max_guests")?,
                amenities,
            );
            Ok(Command::InsertRoom { room, returning })
        }
        "bookings" => {
            let row = insert_row(insert, BOOKING_COLUMNS)?;
            let privilege = match row.get("privilege") {
                Some(expr) if !is_null(expr) => Some(
                    parse_string(expr)?
                        .parse::<GuestPrivilege>()
                        .map_err(|e| SqlError::InvalidValue(e.to_string()))?,
                ),
                _ => None,
            };
            let guest_names = match row.get("guest_names") {
                Some(expr) => parse_name_list(expr)?,
                None => Vec::new(),
            };
            let request = BookingRequest {
                room_id: row.i64_or_zero("room_id")?,
                check_in: row.optional("check_in", parse_date)?,
                check_out: row.optional("check_out", parse_date)?,
                guest_count: row.i64_or_zero("guest_count")?,
                guest_names,
                created_by: row.optional("created_by", parse_string)?,
                privilege,
                special_requests: row.optional("special_requests", parse_string)?,
            };
            Ok(Command::InsertBooking { request, returning })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut terms = Vec::new();
    if let Some(selection) = &select.selection {
        collect_eq_terms(selection, &mut terms)?;
    }

    match table.as_str() {
        "rooms" => {
            let filter = match terms.as_slice() {
                [] => RoomFilter::All,
                [(col, expr)] if col == "id" => RoomFilter::Id(parse_i64_expr(expr)?),
                [(col, expr)] if col == "room_number" => RoomFilter::Number(parse_u32(expr)?),
                _ => return Err(SqlError::Unsupported("rooms filter: use id or room_number".into())),
            };
            Ok(Command::SelectRooms { filter })
        }
        "bookings" => {
            let filter = match terms.as_slice() {
                [] => BookingFilter::All,
                [(col, expr)] if col == "id" => BookingFilter::Id(parse_i64_expr(expr)?),
                [(col, expr)] if col == "room_id" => BookingFilter::RoomId(parse_i64_expr(expr)?),
                _ => return Err(SqlError::Unsupported("bookings filter: use id or room_id".into())),
            };
            Ok(Command::SelectBookings { filter })
        }
        "availability" => {
            let (mut room_id, mut check_in, mut check_out) = (None, None, None);
            for (col, expr) in &terms {
                match col.as_str() {
                    "room_id" => room_id = Some(parse_i64_expr(expr)?),
                    "check_in" => check_in = Some(parse_optional(expr, parse_date)?),
                    "check_out" => check_out = Some(parse_optional(expr, parse_date)?),
                    other => return Err(SqlError::Unsupported(format!("availability filter: {other}"))),
                }
            }
            Ok(Command::SelectAvailability {
                room_id: room_id.ok_or(SqlError::MissingFilter("room_id"))?,
                check_in: check_in.ok_or(SqlError::MissingFilter("check_in"))?,
                check_out: check_out.ok_or(SqlError::MissingFilter("check_out"))?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `a = 1 AND b = 2 AND ...` into `(column, value)` pairs.
fn collect_eq_terms<'a>(expr: &'a Expr, out: &mut Vec<(String, &'a Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_eq_terms(inner, out),
        Expr::BinaryOp { left, op: ast::BinaryOperator::And, right } => {
            collect_eq_terms(left, out)?;
            collect_eq_terms(right, out)
        }
        Expr::BinaryOp { left, op: ast::BinaryOperator::Eq, right } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
            out.push((col, right.as_ref()));
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("WHERE clause: {other}"))),
    }
}

// ── INSERT rows ───────────────────────────────────────────────

/// One VALUES row keyed by column name.
struct InsertRow {
    values: Vec<(String, Expr)>,
}

impl InsertRow {
    fn get(&self, column: &str) -> Option<&Expr> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, e)| e)
    }

    fn optional<T>(
        &self,
        column: &str,
        parse: impl Fn(&Expr) -> Result<T, SqlError>,
    ) -> Result<Option<T>, SqlError> {
        match self.get(column) {
            Some(expr) => parse_optional(expr, parse),
            None => Ok(None),
        }
    }

    fn i64_or_zero(&self, column: &str) -> Result<i64, SqlError> {
        Ok(self.optional(column, parse_i64_expr)?.unwrap_or(0))
    }

    fn u32_or_zero(&self, column: &str) -> Result<u32, SqlError> {
        Ok(self.optional(column, parse_u32)?.unwrap_or(0))
    }

    fn bool_or_false(&self, column: &str) -> Result<bool, SqlError> {
        Ok(self.optional(column, parse_bool)?.unwrap_or(false))
    }
}

/// Pair the single VALUES row with its column list. Without an explicit
/// column list, values are taken in `default_columns` order.
fn insert_row(insert: &ast::Insert, default_columns: &[&str]) -> Result<InsertRow, SqlError> {
    let rows = extract_insert_rows(insert)?;
    if rows.len() != 1 {
        return Err(SqlError::Unsupported("multi-row INSERT".into()));
    }
    let values = &rows[0];

    let columns: Vec<String> = if insert.columns.is_empty() {
        default_columns.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    // A positional row may omit trailing optional columns.
    let arity_ok = if insert.columns.is_empty() {
        values.len() <= columns.len()
    } else {
        values.len() == columns.len()
    };
    if !arity_ok {
        return Err(SqlError::WrongArity(columns.len(), values.len()));
    }

    let mut pairs: Vec<(String, Expr)> = Vec::with_capacity(values.len());
    for (col, expr) in columns.into_iter().zip(values.iter()) {
        if !default_columns.contains(&col.as_str()) {
            return Err(SqlError::UnknownColumn(col));
        }
        if pairs.iter().any(|(c, _)| *c == col) {
            return Err(SqlError::Parse(format!("column {col} specified more than once")));
        }
        pairs.push((col, expr.clone()));
    }
    Ok(InsertRow { values: pairs })
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<&[Vec<Expr>], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(&values.rows)
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        // '2024-07-01'::date and friends: the literal is what matters.
        Expr::Cast { expr, .. } | Expr::Nested(expr) => extract_value(expr),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn parse_optional<T>(
    expr: &Expr,
    parse: impl Fn(&Expr) -> Result<T, SqlError>,
) -> Result<Option<T>, SqlError> {
    if is_null(expr) {
        Ok(None)
    } else {
        parse(expr).map(Some)
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::EscapedStringLiteral(s)) => Ok(s.clone()),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    s.trim()
        .parse()
        .map_err(|e| SqlError::InvalidValue(format!("bad date '{s}': {e}")))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::InvalidValue(format!("{v} out of range")))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::InvalidValue(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

/// `ARRAY['a', 'b']`, a text-array literal `'{"a","b"}'`, or NULL (empty).
fn parse_name_list(expr: &Expr) -> Result<Vec<String>, SqlError> {
    match expr {
        Expr::Array(array) => array
            .elem
            .iter()
            .map(|elem| {
                if is_null(elem) {
                    Err(SqlError::InvalidValue("guest names must not contain NULL".into()))
                } else {
                    parse_string(elem)
                }
            })
            .collect(),
        _ if is_null(expr) => Ok(Vec::new()),
        _ => parse_text_array(&parse_string(expr)?),
    }
}

// ── Text arrays ───────────────────────────────────────────────

/// Parse a PostgreSQL text-array literal such as `{"Ann Lee",Bob}`.
/// Quoted elements honor `\"` and `\\`; unquoted elements are trimmed.
pub fn parse_text_array(s: &str) -> Result<Vec<String>, SqlError> {
    let bad = || SqlError::InvalidValue(format!("malformed array literal: {s}"));
    let inner = s
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(bad)?;

    let mut items = Vec::new();
    if inner.trim().is_empty() {
        return Ok(items);
    }

    let mut chars = inner.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let item = if chars.next_if_eq(&'"').is_some() {
            let mut buf = String::new();
            loop {
                match chars.next().ok_or_else(bad)? {
                    '\\' => buf.push(chars.next().ok_or_else(bad)?),
                    '"' => break,
                    c => buf.push(c),
                }
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            buf
        } else {
            let mut buf = String::new();
            while let Some(c) = chars.next_if(|c| *c != ',') {
                if c == '"' || c == '{' || c == '}' {
                    return Err(bad());
                }
                buf.push(c);
            }
            let buf = buf.trim().to_string();
            if buf.is_empty() {
                return Err(bad());
            }
            if buf.eq_ignore_ascii_case("null") {
                return Err(SqlError::InvalidValue("guest names must not contain NULL".into()));
            }
            buf
        };
        items.push(item);

        match chars.next() {
            None => return Ok(items),
            Some(',') => continue,
            Some(_) => return Err(bad()),
        }
    }
}

/// Render names as a PostgreSQL text-array literal, quoting every element.
pub fn format_text_array(items: &[String]) -> String {
    let mut out = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        for c in item.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    }
    out.push('}');
    out
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(usize, usize),
    MissingFilter(&'static str),
    InvalidValue(String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(expected, got) => {
                write!(f, "expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::InvalidValue(s) => write!(f, "invalid value: {s}"),
        }
    }
}

impl std::error::Error for SqlError {}
