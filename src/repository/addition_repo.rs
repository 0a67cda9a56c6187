// ==========================================
// 会展搭建项目管理系统 - 预算补充项仓储
// ==========================================
// 红线:
//   - approved/rejected 后内容不可变 (仅审计字段由 decide 写入)
//   - 仅 draft 可删除
// 派生补充项以 (task_id, title, status != rejected) 作幂等查重键
// ==========================================

use crate::domain::addition::{AdditionMaterialLine, BudgetAddition};
use crate::domain::types::{AdditionSource, AdditionStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// AdditionRepository - 补充项仓储
// ==========================================
pub struct AdditionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AdditionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    const COLUMNS: &'static str = "addition_id, task_id, title, description, status, source, \
         source_element, source_material_id, materials_json, amount, \
         created_by, created_at, decided_by, decided_at, decision_notes, updated_at";

    // ==========================================
    // 写入
    // ==========================================

    /// 插入补充项, 挂在调用方事务上
    pub fn insert_tx(&self, tx: &Transaction, addition: &BudgetAddition) -> RepositoryResult<()> {
        Self::insert_inner(tx, addition)
    }

    /// 插入补充项（自管事务）
    pub fn insert(&self, addition: &BudgetAddition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_inner(&conn, addition)
    }

    fn insert_inner(conn: &Connection, addition: &BudgetAddition) -> RepositoryResult<()> {
        let materials_json = serde_json::to_string(&addition.materials)?;

        conn.execute(
            r#"INSERT INTO budget_addition (
                   addition_id, task_id, title, description, status, source,
                   source_element, source_material_id, materials_json, amount,
                   created_by, created_at, decided_by, decided_at, decision_notes, updated_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &addition.addition_id,
                &addition.task_id,
                &addition.title,
                &addition.description,
                addition.status.as_str(),
                addition.source.as_str(),
                &addition.source_element,
                &addition.source_material_id,
                &materials_json,
                addition.amount,
                &addition.created_by,
                &addition.created_at,
                &addition.decided_by,
                &addition.decided_at,
                &addition.decision_notes,
                &addition.updated_at,
            ],
        )?;

        Ok(())
    }

    /// 更新补充项内容（仅 draft / pending_approval 可改）
    pub fn update_content(&self, addition: &BudgetAddition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let materials_json = serde_json::to_string(&addition.materials)?;

        let rows = conn.execute(
            r#"UPDATE budget_addition
               SET title = ?, description = ?, materials_json = ?, amount = ?, updated_at = ?
               WHERE addition_id = ? AND status IN ('draft', 'pending_approval')"#,
            params![
                &addition.title,
                &addition.description,
                &materials_json,
                addition.amount,
                &addition.updated_at,
                &addition.addition_id,
            ],
        )?;

        if rows == 0 {
            // 区分不存在与状态不可改
            return match Self::find_by_id_inner(&conn, &addition.addition_id)? {
                Some(existing) => Err(RepositoryError::StateConflict(format!(
                    "补充项已处理({}), 内容不可修改",
                    existing.status
                ))),
                None => Err(RepositoryError::NotFound {
                    entity: "BudgetAddition".to_string(),
                    id: addition.addition_id.clone(),
                }),
            };
        }

        Ok(())
    }

    /// 审批流转: pending_approval → approved/rejected
    ///
    /// draft 状态的手工补充项也允许直接审批（提交即审）
    pub fn decide_tx(
        &self,
        tx: &Transaction,
        addition_id: &str,
        status: AdditionStatus,
        decided_by: &str,
        notes: Option<&str>,
        decided_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        if !status.is_processed() {
            return Err(RepositoryError::ValidationError(format!(
                "非法审批目标状态: {}",
                status
            )));
        }

        let rows = tx.execute(
            r#"UPDATE budget_addition
               SET status = ?, decided_by = ?, decided_at = ?, decision_notes = ?, updated_at = ?
               WHERE addition_id = ? AND status IN ('draft', 'pending_approval')"#,
            params![
                status.as_str(),
                decided_by,
                decided_at,
                notes,
                decided_at,
                addition_id,
            ],
        )?;

        if rows == 0 {
            return match Self::find_by_id_inner(tx, addition_id)? {
                Some(existing) => Err(RepositoryError::InvalidStateTransition {
                    from: existing.status.to_string(),
                    to: status.to_string(),
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "BudgetAddition".to_string(),
                    id: addition_id.to_string(),
                }),
            };
        }

        Ok(())
    }

    /// 删除补充项（仅 draft）
    pub fn delete_draft(&self, addition_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            "DELETE FROM budget_addition WHERE addition_id = ? AND status = 'draft'",
            params![addition_id],
        )?;

        if rows == 0 {
            return match Self::find_by_id_inner(&conn, addition_id)? {
                Some(existing) => Err(RepositoryError::StateConflict(format!(
                    "仅草稿状态的补充项可删除, 当前状态: {}",
                    existing.status
                ))),
                None => Err(RepositoryError::NotFound {
                    entity: "BudgetAddition".to_string(),
                    id: addition_id.to_string(),
                }),
            };
        }

        Ok(())
    }

    // ==========================================
    // 读取
    // ==========================================

    /// 按 id 查询
    pub fn find_by_id(&self, addition_id: &str) -> RepositoryResult<Option<BudgetAddition>> {
        let conn = self.get_conn()?;
        Self::find_by_id_inner(&conn, addition_id)
    }

    /// 事务内按 id 查询
    pub fn find_by_id_tx(
        &self,
        tx: &Transaction,
        addition_id: &str,
    ) -> RepositoryResult<Option<BudgetAddition>> {
        Self::find_by_id_inner(tx, addition_id)
    }

    fn find_by_id_inner(
        conn: &Connection,
        addition_id: &str,
    ) -> RepositoryResult<Option<BudgetAddition>> {
        let sql = format!(
            "SELECT {} FROM budget_addition WHERE addition_id = ?",
            Self::COLUMNS
        );
        match conn.query_row(&sql, params![addition_id], Self::map_row) {
            Ok(a) => Ok(Some(a)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询任务下全部补充项（按创建时间排序）
    pub fn list_by_task(&self, task_id: &str) -> RepositoryResult<Vec<BudgetAddition>> {
        let conn = self.get_conn()?;
        Self::list_by_task_inner(&conn, task_id)
    }

    /// 事务内查询任务下全部补充项
    pub fn list_by_task_tx(
        &self,
        tx: &Transaction,
        task_id: &str,
    ) -> RepositoryResult<Vec<BudgetAddition>> {
        Self::list_by_task_inner(tx, task_id)
    }

    fn list_by_task_inner(
        conn: &Connection,
        task_id: &str,
    ) -> RepositoryResult<Vec<BudgetAddition>> {
        let sql = format!(
            "SELECT {} FROM budget_addition WHERE task_id = ? ORDER BY created_at, addition_id",
            Self::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let additions = stmt
            .query_map(params![task_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(additions)
    }

    /// 按自然键标题查询未驳回的补充项（派生幂等查重）
    pub fn find_active_by_title_tx(
        &self,
        tx: &Transaction,
        task_id: &str,
        title: &str,
    ) -> RepositoryResult<Option<BudgetAddition>> {
        let sql = format!(
            "SELECT {} FROM budget_addition \
             WHERE task_id = ? AND title = ? AND status != 'rejected' \
             ORDER BY created_at LIMIT 1",
            Self::COLUMNS
        );
        match tx.query_row(&sql, params![task_id, title], Self::map_row) {
            Ok(a) => Ok(Some(a)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 映射数据库行到 BudgetAddition
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<BudgetAddition> {
        let status_str: String = row.get(4)?;
        let source_str: String = row.get(5)?;
        let materials_json: String = row.get(8)?;
        let materials: Vec<AdditionMaterialLine> = serde_json::from_str(&materials_json)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    8,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(BudgetAddition {
            addition_id: row.get(0)?,
            task_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            status: AdditionStatus::parse(&status_str).unwrap_or(AdditionStatus::Draft),
            source: AdditionSource::from_str(&source_str),
            source_element: row.get(6)?,
            source_material_id: row.get(7)?,
            materials,
            amount: row.get(9)?,
            created_by: row.get(10)?,
            created_at: row.get::<_, DateTime<Utc>>(11)?,
            decided_by: row.get(12)?,
            decided_at: row.get::<_, Option<DateTime<Utc>>>(13)?,
            decision_notes: row.get(14)?,
            updated_at: row.get::<_, DateTime<Utc>>(15)?,
        })
    }
}
