use serde::{Deserialize, Serialize};

// 核心模块导出
pub mod driver;

// 重新导出 driver 类型
pub use driver::{
    DatabaseDriver, DatabaseSession, DriverError, FieldValue, MySQLDriver, RowCursor, check_connection,
    create_connection, validate_sql,
};

#[derive(Clone, Serialize, Deserialize)]
pub struct MySQLOptions {
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub use_tls: bool,
}

impl Default for MySQLOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: "3306".into(),
            username: "root".into(),
            password: "".into(),
            database: String::new(),
            use_tls: false,
        }
    }
}

impl MySQLOptions {
    /// 日志用的连接地址，不含密码
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_tls { "mysqls" } else { "mysql" };
        let db = self.database.trim();
        if db.is_empty() {
            format!("{}://{}:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, db)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_hides_password() {
        let opts = MySQLOptions {
            database: "orders".into(),
            password: "secret".into(),
            ..MySQLOptions::default()
        };
        let endpoint = opts.endpoint();
        assert_eq!(endpoint, "mysql://127.0.0.1:3306/orders");
        assert!(!endpoint.contains("secret"));
    }

    #[test]
    fn endpoint_without_database() {
        let opts = MySQLOptions {
            use_tls: true,
            ..MySQLOptions::default()
        };
        assert_eq!(opts.endpoint(), "mysqls://127.0.0.1:3306");
    }
}
