use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::data::DataRow;
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::warn;

use crate::auth::HotelAuthSource;
use crate::engine::{Engine, EngineError, ErrorKind};
use crate::model::*;
use crate::observability;
use crate::sql::{self, BookingFilter, Command, RoomFilter, SqlError};

pub struct HotelHandler {
    engine: Arc<Engine>,
    query_parser: Arc<HotelQueryParser>,
}

impl HotelHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(HotelQueryParser),
        }
    }

    /// Run one command, recording its outcome and latency.
    async fn execute_command(&self, cmd: Command) -> PgWireResult<Response> {
        let label = observability::command_label(&cmd);
        let start = Instant::now();
        let result = self.run_command(cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn run_command(&self, cmd: Command) -> PgWireResult<Response> {
        let engine = &self.engine;
        match cmd {
            Command::InsertRoom { room, returning } => {
                let room = engine.create_room(room).await.map_err(engine_err)?;
                if returning {
                    rooms_response(&[room])
                } else {
                    Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
                }
            }
            Command::InsertBooking { request, returning } => {
                let booking = match engine.create_booking(request).await {
                    Ok(b) => {
                        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
                        b
                    }
                    Err(e) => {
                        let reason = observability::rejection_reason(e.kind());
                        metrics::counter!(observability::BOOKINGS_REJECTED_TOTAL, "reason" => reason)
                            .increment(1);
                        return Err(engine_err(e));
                    }
                };
                if returning {
                    bookings_response(&[booking])
                } else {
                    Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
                }
            }
            Command::SelectRooms { filter } => {
                let rooms = match filter {
                    RoomFilter::All => engine.list_rooms().await,
                    RoomFilter::Id(id) => engine.get_room(id).await.map(Vec::from_iter),
                    RoomFilter::Number(n) => engine.find_room_by_number(n).await.map(Vec::from_iter),
                }
                .map_err(engine_err)?;
                rooms_response(&rooms)
            }
            Command::SelectBookings { filter } => {
                let bookings = match filter {
                    BookingFilter::All => engine.list_bookings().await,
                    BookingFilter::Id(id) => engine.get_booking(id).await.map(Vec::from_iter),
                    BookingFilter::RoomId(room_id) => engine.bookings_for_room(room_id).await,
                }
                .map_err(engine_err)?;
                bookings_response(&bookings)
            }
            Command::SelectAvailability {
                room_id,
                check_in,
                check_out,
            } => {
                let available = engine
                    .is_room_available(room_id, check_in, check_out)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(availability_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&room_id)?;
                encoder.encode_field(&check_in.map(|d| d.to_string()))?;
                encoder.encode_field(&check_out.map(|d| d.to_string()))?;
                encoder.encode_field(&available)?;
                let rows: Vec<PgWireResult<DataRow>> = vec![Ok(encoder.take_row())];

                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
        }
    }
}

// ── Result sets ──────────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn rooms_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("room_number", Type::INT8),
        field("room_type", Type::VARCHAR),
        field("max_guests", Type::INT8),
        field("balcony", Type::BOOL),
        field("beach_view", Type::BOOL),
        field("air_conditioning", Type::BOOL),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("room_id", Type::INT8),
        field("check_in", Type::DATE),
        field("check_out", Type::DATE),
        field("guest_count", Type::INT8),
        field("guest_names", Type::VARCHAR),
        field("created_by", Type::VARCHAR),
        field("privilege", Type::VARCHAR),
        field("special_requests", Type::VARCHAR),
        field("created_at", Type::TIMESTAMPTZ),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        field("room_id", Type::INT8),
        field("check_in", Type::DATE),
        field("check_out", Type::DATE),
        field("available", Type::BOOL),
    ]
}

fn rooms_response(rooms: &[Room]) -> PgWireResult<Response> {
    let schema = Arc::new(rooms_schema());
    let rows: Vec<PgWireResult<DataRow>> = rooms
        .iter()
        .map(|room| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&room.id)?;
            encoder.encode_field(&i64::from(room.number))?;
            encoder.encode_field(&room.room_type.to_string())?;
            encoder.encode_field(&i64::from(room.max_guests))?;
            encoder.encode_field(&room.amenities.balcony)?;
            encoder.encode_field(&room.amenities.beach_view)?;
            encoder.encode_field(&room.amenities.air_conditioning)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

fn bookings_response(bookings: &[Booking]) -> PgWireResult<Response> {
    let schema = Arc::new(bookings_schema());
    let rows: Vec<PgWireResult<DataRow>> = bookings
        .iter()
        .map(|b| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&b.id)?;
            encoder.encode_field(&b.room_id)?;
            encoder.encode_field(&b.stay.check_in.to_string())?;
            encoder.encode_field(&b.stay.check_out.to_string())?;
            encoder.encode_field(&i64::from(b.guest_count()))?;
            encoder.encode_field(&sql::format_text_array(&b.guest_names))?;
            encoder.encode_field(&b.created_by)?;
            encoder.encode_field(&b.privilege.to_string())?;
            encoder.encode_field(&b.special_requests)?;
            encoder.encode_field(&b.created_at.format("%Y-%m-%d %H:%M:%S%.6f+00").to_string())?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

/// Result columns for a statement, taken from the table it reads or
/// returns. Unparseable text gets no columns; executing it fails anyway.
fn statement_schema(sql: &str) -> Vec<FieldInfo> {
    match sql::result_table(sql).ok().flatten().as_deref() {
        Some("rooms") => rooms_schema(),
        Some("bookings") => bookings_schema(),
        Some("availability") => availability_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for HotelHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        Ok(vec![self.execute_command(cmd).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct HotelQueryParser;

#[async_trait]
impl QueryParser for HotelQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(statement_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for HotelHandler {
    type Statement = String;
    type QueryParser = HotelQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(&portal.statement.statement, &portal.parameters);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        self.execute_command(cmd).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            statement_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(statement_schema(
            &target.statement.statement,
        )))
    }
}

/// Walk `sql` once, calling `bind` for every `$N` placeholder outside
/// quoted literals and identifiers. A `Some` return replaces the token;
/// `None` keeps it verbatim.
fn rewrite_placeholders(sql: &str, mut bind: impl FnMut(usize) -> Option<String>) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                while let Some((_, q)) = chars.next() {
                    out.push(q);
                    if q == c {
                        // A doubled quote is an escaped quote, not the end.
                        match chars.next_if(|&(_, n)| n == c) {
                            Some(_) => out.push(c),
                            None => break,
                        }
                    }
                }
            }
            '$' => {
                let mut end = start + 1;
                while let Some((i, d)) = chars.next_if(|(_, d)| d.is_ascii_digit()) {
                    end = i + d.len_utf8();
                }
                let token = &sql[start..end];
                match token[1..].parse::<usize>().ok().and_then(&mut bind) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(token),
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Highest `$N` placeholder in the statement.
fn count_params(sql: &str) -> usize {
    let mut max = 0;
    rewrite_placeholders(sql, |n| {
        max = max.max(n);
        None
    });
    max
}

/// Bind text-format parameters into their placeholders as quoted literals.
/// Bound values are never rescanned, so a `$1` inside one stays text.
fn substitute_params<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    rewrite_placeholders(sql, |n| {
        let param = params.get(n.checked_sub(1)?)?;
        Some(match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes.as_ref());
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        })
    })
}

// ── Factory ──────────────────────────────────────────────────────

pub struct HotelFactory {
    handler: Arc<HotelHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<HotelAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl HotelFactory {
    pub fn new(engine: Arc<Engine>, password: &str) -> Self {
        let auth_source = HotelAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(HotelHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for HotelFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client socket until it disconnects.
pub async fn process_connection(
    socket: TcpStream,
    peer: SocketAddr,
    factory: Arc<HotelFactory>,
    tls: Option<TlsAcceptor>,
) {
    if let Err(e) = pgwire::tokio::process_socket(socket, tls, factory).await {
        warn!("connection error from {peer}: {e}");
    }
}

// ── Errors ───────────────────────────────────────────────────────

fn engine_sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::NotAvailable { .. } => "23P01",
        EngineError::DuplicateRoomNumber(_) => "23505",
        other => match other.kind() {
            ErrorKind::InvalidArgument => "22023",
            ErrorKind::Conflict => "23000",
            ErrorKind::Storage => "58030",
        },
    }
}

fn sql_sqlstate(e: &SqlError) -> &'static str {
    match e {
        SqlError::Parse(_) | SqlError::Empty | SqlError::WrongArity(..) => "42601",
        SqlError::Unsupported(_) | SqlError::MissingFilter(_) => "0A000",
        SqlError::UnknownTable(_) => "42P01",
        SqlError::UnknownColumn(_) => "42703",
        SqlError::InvalidValue(_) => "22P02",
    }
}

fn user_error(code: &'static str, message: String) -> PgWireError {
    warn!(sqlstate = code, "{message}");
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(engine_sqlstate(&e), e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error(sql_sqlstate(&e), e.to_string())
}
