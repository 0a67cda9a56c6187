// ==========================================
// 会展搭建项目管理系统 - 预算仓储
// ==========================================
// 存储结构: budget_document 单行, 四个行区为类型化 JSON 列
// (serde 经由领域结构往返, 不做裸 Value 字段嗅探)
// ==========================================

use crate::domain::budget::{BudgetDocument, BudgetElement, BudgetLine, ImportMetadata};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// BudgetRepository - 预算仓储
// ==========================================
pub struct BudgetRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BudgetRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询任务的预算单据
    pub fn find_by_task(&self, task_id: &str) -> RepositoryResult<Option<BudgetDocument>> {
        let conn = self.get_conn()?;
        Self::find_by_task_inner(&conn, task_id)
    }

    /// 事务内读取
    pub fn find_by_task_tx(
        &self,
        tx: &Transaction,
        task_id: &str,
    ) -> RepositoryResult<Option<BudgetDocument>> {
        Self::find_by_task_inner(tx, task_id)
    }

    fn find_by_task_inner(
        conn: &Connection,
        task_id: &str,
    ) -> RepositoryResult<Option<BudgetDocument>> {
        let row = conn.query_row(
            r#"SELECT materials_json, labour_json, expenses_json, logistics_json,
                      imported_at, imported_from_task, manually_modified,
                      import_metadata_json, updated_at, updated_by
               FROM budget_document
               WHERE task_id = ?"#,
            params![task_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<DateTime<Utc>>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, DateTime<Utc>>(8)?,
                    row.get::<_, Option<String>>(9)?,
                ))
            },
        );

        let (
            materials_json,
            labour_json,
            expenses_json,
            logistics_json,
            imported_at,
            imported_from_task,
            manually_modified,
            import_metadata_json,
            updated_at,
            updated_by,
        ) = match row {
            Ok(v) => v,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let materials: Vec<BudgetElement> = serde_json::from_str(&materials_json)?;
        let labour: Vec<BudgetLine> = serde_json::from_str(&labour_json)?;
        let expenses: Vec<BudgetLine> = serde_json::from_str(&expenses_json)?;
        let logistics: Vec<BudgetLine> = serde_json::from_str(&logistics_json)?;
        let import_metadata: ImportMetadata = match import_metadata_json {
            Some(raw) => serde_json::from_str(&raw)?,
            None => ImportMetadata::default(),
        };

        Ok(Some(BudgetDocument {
            task_id: task_id.to_string(),
            materials,
            labour,
            expenses,
            logistics,
            imported_at,
            imported_from_task,
            manually_modified,
            import_metadata,
            updated_at,
            updated_by,
        }))
    }

    /// 保存预算单据（整行 upsert）, 挂在调用方事务上
    pub fn save_in_tx(&self, tx: &Transaction, doc: &BudgetDocument) -> RepositoryResult<()> {
        let materials_json = serde_json::to_string(&doc.materials)?;
        let labour_json = serde_json::to_string(&doc.labour)?;
        let expenses_json = serde_json::to_string(&doc.expenses)?;
        let logistics_json = serde_json::to_string(&doc.logistics)?;
        let import_metadata_json = serde_json::to_string(&doc.import_metadata)?;

        tx.execute(
            r#"INSERT INTO budget_document (
                   task_id, materials_json, labour_json, expenses_json, logistics_json,
                   imported_at, imported_from_task, manually_modified,
                   import_metadata_json, updated_at, updated_by
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(task_id) DO UPDATE SET
                   materials_json = excluded.materials_json,
                   labour_json = excluded.labour_json,
                   expenses_json = excluded.expenses_json,
                   logistics_json = excluded.logistics_json,
                   imported_at = excluded.imported_at,
                   imported_from_task = excluded.imported_from_task,
                   manually_modified = excluded.manually_modified,
                   import_metadata_json = excluded.import_metadata_json,
                   updated_at = excluded.updated_at,
                   updated_by = excluded.updated_by"#,
            params![
                &doc.task_id,
                &materials_json,
                &labour_json,
                &expenses_json,
                &logistics_json,
                &doc.imported_at,
                &doc.imported_from_task,
                doc.manually_modified,
                &import_metadata_json,
                &doc.updated_at,
                &doc.updated_by,
            ],
        )?;

        Ok(())
    }

    /// 保存预算单据（自管事务的便捷入口）
    pub fn save(&self, doc: &BudgetDocument) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        self.save_in_tx(&tx, doc)?;
        tx.commit()?;
        Ok(())
    }
}
