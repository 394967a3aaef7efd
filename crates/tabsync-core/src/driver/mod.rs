use crate::MySQLOptions;

pub use self::mysql::MySQLDriver;

mod mysql;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{0}")]
    Other(String),
    #[error("配置字段缺失: {0}")]
    MissingField(String),
    #[error("配置字段非法: {0}")]
    InvalidField(String),
    #[error("连接失败: {0}")]
    Connection(String),
    #[error("获取列信息失败: {0}")]
    Schema(String),
    #[error("读取结果失败: {0}")]
    RowRead(String),
}

/// 驱动层返回的列值，区分空值、字节串和数值标量
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Bytes(Vec<u8>),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    /// 年、月、日、时、分、秒、微秒
    Date(u16, u8, u8, u8, u8, u8, u32),
    /// 负号、天、时、分、秒、微秒
    Time(bool, u32, u8, u8, u8, u32),
}

pub trait DatabaseDriver {
    type Config;

    fn check_connection(
        &self,
        config: &Self::Config,
    ) -> Result<(), DriverError>;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError>;
}

pub trait DatabaseSession: Send {
    fn query(
        &mut self,
        sql: &str,
    ) -> Result<Box<dyn RowCursor + '_>, DriverError>;
}

/// 单遍前向游标，行数据写入内部复用的缓冲
pub trait RowCursor {
    fn columns(&self) -> &[String];

    /// 读到下一行返回 Some，游标耗尽返回 None，中途或末尾的读取错误返回 RowRead
    fn advance(&mut self) -> Result<Option<&[FieldValue]>, DriverError>;
}

pub fn check_connection(opts: &MySQLOptions) -> Result<(), DriverError> {
    MySQLDriver.check_connection(opts)
}

pub fn create_connection(opts: &MySQLOptions) -> Result<Box<dyn DatabaseSession>, DriverError> {
    MySQLDriver.create_connection(opts)
}

pub fn validate_sql(sql: &str) -> Result<(), DriverError> {
    if sql.trim().is_empty() {
        return Err(DriverError::InvalidField("sql".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_sql_rejects_empty() {
        assert!(matches!(validate_sql(""), Err(DriverError::InvalidField(_))));
        assert!(matches!(validate_sql("  \n"), Err(DriverError::InvalidField(_))));
        assert!(validate_sql("SELECT 1").is_ok());
    }
}
