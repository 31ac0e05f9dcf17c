// ==========================================
// 家具生产引擎 - 领域枚举的 SQLite 映射
// ==========================================
// 说明: 枚举统一以 snake_case 文本存储, 未知值读取时报错而非静默回退
// ==========================================

use crate::domain::types::{
    AcceptanceStatus, LedgerSource, ProcessStatus, ProductClass, ProductionStatus, StockStatus,
    TrackingStatus,
};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

macro_rules! impl_text_enum_sql {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    let raw = value.as_str()?;
                    <$ty>::from_db_str(raw).ok_or_else(|| {
                        FromSqlError::Other(
                            format!("无法识别的{}取值: {}", stringify!($ty), raw).into(),
                        )
                    })
                }
            }
        )+
    };
}

impl_text_enum_sql!(
    AcceptanceStatus,
    LedgerSource,
    ProcessStatus,
    ProductClass,
    ProductionStatus,
    StockStatus,
    TrackingStatus,
);
