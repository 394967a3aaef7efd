use std::io::Write;

use tabsync_core::{DriverError, FieldValue, RowCursor};

/// 空值占位符，沿用批量装载的 NULL 约定
pub const NULL_TOKEN: &str = "`N";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{0}")]
    Driver(#[from] DriverError),
    #[error("写入失败: {0}")]
    Write(#[from] csv::Error),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 把游标中的全部行写成无表头的 CSV，返回写出的行数
///
/// 列顺序与游标一致；含逗号、引号或换行的字段按标准 CSV 规则加引号
pub fn write_rows<W: Write>(
    cursor: &mut dyn RowCursor,
    sink: W,
) -> Result<u64, ExportError> {
    let count = cursor.columns().len();
    if count == 0 {
        return Err(DriverError::Schema("无法确定列数".into()).into());
    }

    let mut wtr = csv::Writer::from_writer(sink);

    // 渲染缓冲按列数分配一次，之后每行覆盖复用
    let mut record: Vec<String> = vec![String::new(); count];
    let mut rows = 0u64;

    while let Some(values) = cursor.advance()? {
        for (slot, value) in record.iter_mut().zip(values) {
            *slot = render_value(value);
        }
        wtr.write_record(&record)?;
        rows += 1;
    }

    wtr.flush()?;
    Ok(rows)
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => NULL_TOKEN.to_string(),
        FieldValue::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        FieldValue::Int(int) => int.to_string(),
        FieldValue::UInt(uint) => uint.to_string(),
        FieldValue::Float(float) => float.to_string(),
        FieldValue::Double(double) => double.to_string(),
        FieldValue::Date(year, month, day, hour, minute, second, micros) => {
            format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}")
        }
        FieldValue::Time(neg, days, hours, minutes, seconds, micros) => {
            let sign = if *neg { "-" } else { "" };
            format!("{sign}{days} {hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
        }
    }
}
