// ==========================================
// 会展搭建项目管理系统 - 操作日志仓储
// ==========================================
// 审计追踪: 写入为尽力而为, 调用方失败只告警不阻断
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入一条操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let payload_json = match &log.payload_json {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };

        conn.execute(
            r#"INSERT INTO action_log (
                   action_id, task_id, action_type, action_ts, actor, payload_json, detail
               ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &log.action_id,
                &log.task_id,
                &log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                &log.actor,
                &payload_json,
                &log.detail,
            ],
        )?;

        Ok(())
    }

    /// 查询任务的操作日志（倒序, 限量）
    pub fn list_by_task(&self, task_id: &str, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, task_id, action_type, action_ts, actor, payload_json, detail
               FROM action_log
               WHERE task_id = ?
               ORDER BY action_ts DESC, action_id DESC
               LIMIT ?"#,
        )?;

        let logs = stmt
            .query_map(params![task_id, limit], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }

    /// 映射数据库行到 ActionLog
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ActionLog> {
        let ts_str: String = row.get(3)?;
        let payload_raw: Option<String> = row.get(5)?;

        Ok(ActionLog {
            action_id: row.get(0)?,
            task_id: row.get(1)?,
            action_type: row.get(2)?,
            action_ts: NaiveDateTime::parse_from_str(&ts_str, "%Y-%m-%d %H:%M:%S").map_err(
                |e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                },
            )?,
            actor: row.get(4)?,
            payload_json: payload_raw.and_then(|raw| serde_json::from_str(&raw).ok()),
            detail: row.get(6)?,
        })
    }
}
