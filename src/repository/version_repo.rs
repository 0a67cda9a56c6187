// ==========================================
// 会展搭建项目管理系统 - 单据版本仓储
// ==========================================
// 只追加的版本历史: version_no 在写入事务内按 MAX+1 分配,
// 保证同一 (task_id, document_kind) 下版本号严格递增且无并发冲突
// ==========================================

use crate::domain::types::DocumentKind;
use crate::domain::version::DocumentVersion;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// VersionRepository - 版本快照仓储
// ==========================================
pub struct VersionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VersionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加版本快照（自动分配 version_no）, 挂在调用方事务上
    ///
    /// 说明：
    /// - 在同一事务内查询 MAX(version_no) 并写入, 保证版本号分配原子性
    /// - 该方法会覆盖传入的 `version.version_no`
    pub fn append_tx(
        &self,
        tx: &Transaction,
        version: &mut DocumentVersion,
    ) -> RepositoryResult<i32> {
        let max_version_no: Option<i32> = tx.query_row(
            "SELECT MAX(version_no) FROM document_version WHERE task_id = ? AND document_kind = ?",
            params![&version.task_id, version.document_kind.as_str()],
            |row| row.get(0),
        )?;

        version.version_no = max_version_no.unwrap_or(0) + 1;

        tx.execute(
            r#"INSERT INTO document_version (
                   version_id, task_id, document_kind, version_no, label, payload_json,
                   linked_materials_version, created_by, created_at, source_updated_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &version.version_id,
                &version.task_id,
                version.document_kind.as_str(),
                &version.version_no,
                &version.label,
                &version.payload_json,
                &version.linked_materials_version,
                &version.created_by,
                &version.created_at,
                &version.source_updated_at,
            ],
        )?;

        Ok(version.version_no)
    }

    /// 追加版本快照（自管事务的便捷入口）
    pub fn append(&self, version: &mut DocumentVersion) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let no = self.append_tx(&tx, version)?;
        tx.commit()?;
        Ok(no)
    }

    /// 查询任务的版本列表（倒序）
    pub fn list_by_task(
        &self,
        task_id: &str,
        kind: DocumentKind,
    ) -> RepositoryResult<Vec<DocumentVersion>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT version_id, task_id, document_kind, version_no, label, payload_json,
                      linked_materials_version, created_by, created_at, source_updated_at
               FROM document_version
               WHERE task_id = ? AND document_kind = ?
               ORDER BY version_no DESC"#,
        )?;

        let versions = stmt
            .query_map(params![task_id, kind.as_str()], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    /// 按版本号查询快照
    pub fn find_by_version_no(
        &self,
        task_id: &str,
        kind: DocumentKind,
        version_no: i32,
    ) -> RepositoryResult<Option<DocumentVersion>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT version_id, task_id, document_kind, version_no, label, payload_json,
                      linked_materials_version, created_by, created_at, source_updated_at
               FROM document_version
               WHERE task_id = ? AND document_kind = ? AND version_no = ?"#,
            params![task_id, kind.as_str(), version_no],
            Self::map_row,
        ) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询最新版本号（无版本时为 0）
    pub fn latest_version_no_tx(
        &self,
        tx: &Transaction,
        task_id: &str,
        kind: DocumentKind,
    ) -> RepositoryResult<i32> {
        let max: Option<i32> = tx.query_row(
            "SELECT MAX(version_no) FROM document_version WHERE task_id = ? AND document_kind = ?",
            params![task_id, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// 映射数据库行到 DocumentVersion
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<DocumentVersion> {
        let kind_str: String = row.get(2)?;
        Ok(DocumentVersion {
            version_id: row.get(0)?,
            task_id: row.get(1)?,
            document_kind: DocumentKind::parse(&kind_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("未知单据类型: {}", kind_str).into(),
                )
            })?,
            version_no: row.get(3)?,
            label: row.get(4)?,
            payload_json: row.get(5)?,
            linked_materials_version: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get::<_, DateTime<Utc>>(8)?,
            source_updated_at: row.get::<_, Option<DateTime<Utc>>>(9)?,
        })
    }
}
