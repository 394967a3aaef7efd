use mysql::{Conn, Opts, OptsBuilder, QueryResult, SslOpts, Text, Value, prelude::Queryable};

use crate::MySQLOptions;

use super::{DatabaseDriver, DatabaseSession, DriverError, FieldValue, RowCursor, validate_sql};

#[derive(Debug, Clone, Copy)]
pub struct MySQLDriver;

impl DatabaseDriver for MySQLDriver {
    type Config = MySQLOptions;

    fn check_connection(
        &self,
        config: &Self::Config,
    ) -> Result<(), DriverError> {
        let mut conn = open_conn(config)?;
        conn.ping()
            .map_err(|err| DriverError::Connection(format!("ping 失败: {}", err)))?;
        Ok(())
    }

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let conn = open_conn(config)?;
        Ok(Box::new(MySQLSession::new(conn)))
    }
}

struct MySQLSession {
    conn: Conn,
}

impl MySQLSession {
    fn new(conn: Conn) -> Self {
        Self { conn }
    }
}

impl DatabaseSession for MySQLSession {
    fn query(
        &mut self,
        sql: &str,
    ) -> Result<Box<dyn RowCursor + '_>, DriverError> {
        validate_sql(sql)?;
        tracing::debug!(sql = %sql);

        let result = self
            .conn
            .query_iter(sql)
            .map_err(|err| DriverError::Other(format!("执行查询失败: {}", err)))?;

        Ok(Box::new(MySQLCursor::new(result)?))
    }
}

struct MySQLCursor<'a> {
    result: QueryResult<'a, 'a, 'a, Text>,
    columns: Vec<String>,
    scratch: Vec<FieldValue>,
}

impl<'a> MySQLCursor<'a> {
    fn new(result: QueryResult<'a, 'a, 'a, Text>) -> Result<Self, DriverError> {
        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|col| col.name_str().to_string())
            .collect();

        if columns.is_empty() {
            return Err(DriverError::Schema("结果集没有列信息".into()));
        }

        let scratch = vec![FieldValue::Null; columns.len()];
        Ok(Self {
            result,
            columns,
            scratch,
        })
    }
}

impl RowCursor for MySQLCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn advance(&mut self) -> Result<Option<&[FieldValue]>, DriverError> {
        let Some(row) = self.result.next() else {
            return Ok(None);
        };

        // 连接中断等流级错误也会以错误项的形式出现在迭代末尾
        let mut row = row.map_err(|err| DriverError::RowRead(format!("读取行失败: {}", err)))?;

        for (idx, slot) in self.scratch.iter_mut().enumerate() {
            let value = row.take::<Value, _>(idx).unwrap_or(Value::NULL);
            *slot = map_value(value);
        }
        Ok(Some(&self.scratch))
    }
}

fn open_conn(config: &MySQLOptions) -> Result<Conn, DriverError> {
    if config.host.trim().is_empty() {
        return Err(DriverError::MissingField("host".into()));
    }
    if config.username.trim().is_empty() {
        return Err(DriverError::MissingField("username".into()));
    }
    if config.database.trim().is_empty() {
        return Err(DriverError::MissingField("database".into()));
    }

    let mut builder = OptsBuilder::new();
    builder = builder.ip_or_hostname(Some(config.host.clone()));
    builder = builder.tcp_port(config.port.parse().unwrap_or(3306));
    builder = builder.user(Some(config.username.clone()));
    builder = builder.pass(Some(config.password.clone()));
    builder = builder.db_name(Some(config.database.clone()));

    if config.use_tls {
        builder = builder.ssl_opts(Some(SslOpts::default()));
    }
    let opts = Opts::from(builder);
    Conn::new(opts).map_err(|err| DriverError::Connection(format!("{}", err)))
}

fn map_value(value: Value) -> FieldValue {
    match value {
        Value::NULL => FieldValue::Null,
        Value::Bytes(bytes) => FieldValue::Bytes(bytes),
        Value::Int(int) => FieldValue::Int(int),
        Value::UInt(uint) => FieldValue::UInt(uint),
        Value::Float(float) => FieldValue::Float(float),
        Value::Double(double) => FieldValue::Double(double),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            FieldValue::Date(year, month, day, hour, minute, second, micros)
        }
        Value::Time(neg, days, hours, minutes, seconds, micros) => {
            FieldValue::Time(neg, days, hours, minutes, seconds, micros)
        }
    }
}
