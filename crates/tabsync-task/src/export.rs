use std::fs::{DirBuilder, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use tabsync_core::DatabaseSession;

use crate::writer::{self, ExportError};
use crate::{ExportConfig, MessageKind, ProgressMessage, TableQuery, print_completed, print_error, print_progress};

/// 批量导出任务（每张表一个 CSV 文件）
///
/// 单表失败只记录错误，不中断整批；目标目录无法创建时整体失败
pub fn run(
    session: &mut Box<dyn DatabaseSession>,
    config: &ExportConfig,
) -> Result<(), ExportError> {
    tracing::info!("开始导出任务，共 {} 张表", config.queries.len());

    let dest = Path::new(&config.dest);
    ensure_dest_dir(dest)?;

    let mut exported = 0usize;
    let mut failed = 0usize;

    for query in &config.queries {
        let sql = build_select_sql(query);
        tracing::info!("执行查询: {}", sql);

        let start = Instant::now();
        match export_one(session, &sql, &dest.join(format!("{}.csv", query.table))) {
            Ok(rows) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::info!("表 {} 导出完成，{} 行，耗时 {} ms", query.table, rows, duration_ms);
                print_progress(ProgressMessage {
                    kind: MessageKind::Progress,
                    data: serde_json::json!({
                        "table": query.table,
                        "sql": sql,
                        "rows": rows,
                        "duration_ms": duration_ms,
                    }),
                });
                exported += 1;
            }
            Err(err) => {
                tracing::error!("表 {} 导出失败: {}", query.table, err);
                print_error("error", &format!("表 {} 导出失败: {}", query.table, err));
                failed += 1;
            }
        }
    }

    print_completed(serde_json::json!({
        "status": "success",
        "exported_tables": exported,
        "failed_tables": failed,
        "dest": config.dest,
    }));
    Ok(())
}

/// 拼接单表 SELECT 语句，filter 为空时不追加 WHERE
pub fn build_select_sql(query: &TableQuery) -> String {
    let mut sql = format!("SELECT {} FROM {}", query.columns.join(", "), query.table);
    if let Some(filter) = &query.filter {
        if !filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
    }
    sql
}

/// 已存在的输出文件直接覆盖
fn export_one(
    session: &mut Box<dyn DatabaseSession>,
    sql: &str,
    path: &Path,
) -> Result<u64, ExportError> {
    let mut cursor = session.query(sql)?;
    let file = File::create(path)?;
    let mut sink = BufWriter::new(file);
    let rows = writer::write_rows(cursor.as_mut(), &mut sink)?;
    sink.flush()?;
    Ok(rows)
}

/// 目标目录不存在时创建，权限仅属主可读写执行
fn ensure_dest_dir(dest: &Path) -> Result<(), ExportError> {
    if dest.exists() {
        return Ok(());
    }

    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tabsync_core::{DriverError, FieldValue, RowCursor};
    use tempfile::tempdir;

    struct FakeCursor {
        columns: Vec<String>,
        rows: Vec<Vec<FieldValue>>,
        index: usize,
        scratch: Vec<FieldValue>,
    }

    impl RowCursor for FakeCursor {
        fn columns(&self) -> &[String] {
            &self.columns
        }

        fn advance(&mut self) -> Result<Option<&[FieldValue]>, DriverError> {
            if self.index >= self.rows.len() {
                return Ok(None);
            }
            self.scratch.clone_from(&self.rows[self.index]);
            self.index += 1;
            Ok(Some(&self.scratch))
        }
    }

    struct FakeSession {
        columns: Vec<String>,
        rows: Vec<Vec<FieldValue>>,
        fail_tables: Vec<&'static str>,
    }

    impl FakeSession {
        fn boxed(
            rows: Vec<Vec<FieldValue>>,
            fail_tables: Vec<&'static str>,
        ) -> Box<dyn DatabaseSession> {
            Box::new(Self {
                columns: vec!["id".into(), "name".into()],
                rows,
                fail_tables,
            })
        }
    }

    impl DatabaseSession for FakeSession {
        fn query(
            &mut self,
            sql: &str,
        ) -> Result<Box<dyn RowCursor + '_>, DriverError> {
            if self.fail_tables.iter().any(|table| sql.contains(table)) {
                return Err(DriverError::Other(format!("表不存在: {}", sql)));
            }
            Ok(Box::new(FakeCursor {
                columns: self.columns.clone(),
                scratch: vec![FieldValue::Null; self.columns.len()],
                rows: self.rows.clone(),
                index: 0,
            }))
        }
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Bytes(s.as_bytes().to_vec())
    }

    fn sample_rows(n: i64) -> Vec<Vec<FieldValue>> {
        (1..=n).map(|i| vec![FieldValue::Int(i), text("row")]).collect()
    }

    fn query(table: &str) -> TableQuery {
        TableQuery {
            table: table.into(),
            columns: vec!["id".into(), "name".into()],
            filter: None,
        }
    }

    #[test]
    fn select_without_filter() {
        let sql = build_select_sql(&query("users"));
        assert_eq!(sql, "SELECT id, name FROM users");
    }

    #[test]
    fn empty_filter_adds_no_where() {
        let mut q = query("users");
        q.filter = Some(String::new());
        assert_eq!(build_select_sql(&q), "SELECT id, name FROM users");
    }

    #[test]
    fn filter_appends_where_clause() {
        let mut q = query("users");
        q.filter = Some("active = 1".into());
        assert_eq!(build_select_sql(&q), "SELECT id, name FROM users WHERE active = 1");
    }

    #[test]
    fn writes_one_file_per_table() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out");
        let mut session = FakeSession::boxed(sample_rows(2), vec![]);
        let config = ExportConfig {
            dest: dest.to_string_lossy().into_owned(),
            queries: vec![query("users"), query("orders")],
        };

        run(&mut session, &config).unwrap();

        let users = fs::read_to_string(dest.join("users.csv")).unwrap();
        let orders = fs::read_to_string(dest.join("orders.csv")).unwrap();
        assert_eq!(users.lines().count(), 2);
        assert_eq!(orders.lines().count(), 2);
    }

    #[test]
    fn rerun_overwrites_previous_output() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out");
        let config = ExportConfig {
            dest: dest.to_string_lossy().into_owned(),
            queries: vec![query("users")],
        };

        let mut session = FakeSession::boxed(sample_rows(3), vec![]);
        run(&mut session, &config).unwrap();
        assert_eq!(fs::read_to_string(dest.join("users.csv")).unwrap().lines().count(), 3);

        let mut session = FakeSession::boxed(sample_rows(1), vec![]);
        run(&mut session, &config).unwrap();
        assert_eq!(fs::read_to_string(dest.join("users.csv")).unwrap().lines().count(), 1);
    }

    #[test]
    fn failed_table_does_not_abort_batch() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out");
        let mut session = FakeSession::boxed(sample_rows(1), vec!["missing"]);
        let config = ExportConfig {
            dest: dest.to_string_lossy().into_owned(),
            queries: vec![query("missing"), query("users")],
        };

        run(&mut session, &config).unwrap();

        assert!(!dest.join("missing.csv").exists());
        assert!(dest.join("users.csv").exists());
    }

    #[cfg(unix)]
    #[test]
    fn dest_dir_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("out");
        let mut session = FakeSession::boxed(sample_rows(1), vec![]);
        let config = ExportConfig {
            dest: dest.to_string_lossy().into_owned(),
            queries: vec![query("users")],
        };

        run(&mut session, &config).unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn existing_dest_dir_is_kept() {
        let dir = tempdir().unwrap();
        let mut session = FakeSession::boxed(sample_rows(1), vec![]);
        let config = ExportConfig {
            dest: dir.path().to_string_lossy().into_owned(),
            queries: vec![query("users")],
        };

        run(&mut session, &config).unwrap();
        assert!(dir.path().join("users.csv").exists());
    }
}
