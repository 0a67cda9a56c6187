// ==========================================
// 会展搭建项目管理系统 - 报价仓储
// ==========================================
// 报价是整体重新生成的派生单据, 存为单个类型化 JSON 负载列
// ==========================================

use crate::domain::quote::QuoteDocument;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// QuoteRepository - 报价仓储
// ==========================================
pub struct QuoteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QuoteRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询任务的报价单据
    pub fn find_by_task(&self, task_id: &str) -> RepositoryResult<Option<QuoteDocument>> {
        let conn = self.get_conn()?;

        let payload: Option<String> = match conn.query_row(
            "SELECT payload_json FROM quote_document WHERE task_id = ?",
            params![task_id],
            |row| row.get(0),
        ) {
            Ok(v) => Some(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        match payload {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// 保存报价单据（整行 upsert）, 挂在调用方事务上
    pub fn save_in_tx(&self, tx: &Transaction, doc: &QuoteDocument) -> RepositoryResult<()> {
        let payload_json = serde_json::to_string(doc)?;

        tx.execute(
            r#"INSERT INTO quote_document (task_id, payload_json, updated_at, updated_by)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(task_id) DO UPDATE SET
                   payload_json = excluded.payload_json,
                   updated_at = excluded.updated_at,
                   updated_by = excluded.updated_by"#,
            params![&doc.task_id, &payload_json, &doc.updated_at, &doc.updated_by],
        )?;

        Ok(())
    }

    /// 保存报价单据（自管事务的便捷入口）
    pub fn save(&self, doc: &QuoteDocument) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        self.save_in_tx(&tx, doc)?;
        tx.commit()?;
        Ok(())
    }
}
