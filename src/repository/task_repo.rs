// ==========================================
// 会展搭建项目管理系统 - 任务仓储
// ==========================================
// 职责: 任务查询与兄弟任务定位 (任务 → 询单 → 同询单指定类型任务)
// 任务的创建/流转属于外部模块, 此处仅提供协同管线需要的读口
// ==========================================

use crate::domain::task::Task;
use crate::domain::types::{TaskStatus, TaskType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// TaskRepository - 任务仓储
// ==========================================
pub struct TaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TaskRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按 task_id 查询任务
    pub fn find_by_id(&self, task_id: &str) -> RepositoryResult<Option<Task>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT task_id, enquiry_id, task_type, title, status, created_at, updated_at
               FROM task
               WHERE task_id = ?"#,
            params![task_id],
            |row| Self::map_row(row),
        ) {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按 task_id 查询任务, 不存在则报 NotFound
    pub fn require(&self, task_id: &str) -> RepositoryResult<Task> {
        self.find_by_id(task_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Task".to_string(),
                id: task_id.to_string(),
            })
    }

    /// 查询同一询单下指定类型的兄弟任务
    ///
    /// 物料保存/签核后需要定位预算任务, 报价导入需要定位预算任务,
    /// 预算同步需要回溯物料任务, 都走这一个口
    pub fn find_sibling_of_type(
        &self,
        task_id: &str,
        task_type: TaskType,
    ) -> RepositoryResult<Option<Task>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT t2.task_id, t2.enquiry_id, t2.task_type, t2.title, t2.status,
                      t2.created_at, t2.updated_at
               FROM task t1
               JOIN task t2 ON t2.enquiry_id = t1.enquiry_id
               WHERE t1.task_id = ? AND t2.task_type = ?
               ORDER BY t2.created_at
               LIMIT 1"#,
            params![task_id, task_type.as_str()],
            |row| Self::map_row(row),
        ) {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 插入任务（测试与外部工作流模块使用）
    pub fn insert(&self, task: &Task) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO task (task_id, enquiry_id, task_type, title, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &task.task_id,
                &task.enquiry_id,
                task.task_type.as_str(),
                &task.title,
                task.status.as_str(),
                &task.created_at,
                &task.updated_at,
            ],
        )?;

        Ok(())
    }

    /// 更新任务状态
    pub fn update_status(&self, task_id: &str, status: TaskStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows = conn.execute(
            "UPDATE task SET status = ?, updated_at = ? WHERE task_id = ?",
            params![status.as_str(), Utc::now(), task_id],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Task".to_string(),
                id: task_id.to_string(),
            });
        }

        Ok(())
    }

    /// 映射数据库行到 Task
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let task_type_str: String = row.get(2)?;
        let status_str: String = row.get(4)?;
        Ok(Task {
            task_id: row.get(0)?,
            enquiry_id: row.get(1)?,
            task_type: TaskType::parse(&task_type_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("未知任务类型: {}", task_type_str).into(),
                )
            })?,
            title: row.get(3)?,
            status: TaskStatus::from_str(&status_str),
            created_at: row.get::<_, DateTime<Utc>>(5)?,
            updated_at: row.get::<_, DateTime<Utc>>(6)?,
        })
    }
}
