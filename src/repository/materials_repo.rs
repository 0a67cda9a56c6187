// ==========================================
// 会展搭建项目管理系统 - 物料清单仓储
// ==========================================
// 存储结构:
//   materials_document 主行 + materials_element / materials_material 子行
//   + materials_approval 部门签核行 (每部门一行, 并发签核互不覆盖)
// 子行写入策略: 整体替换 (先删后插), 与主行同事务
// 跨聚合的管线写入通过 *_tx 方法挂到服务层事务上
// ==========================================

use crate::domain::materials::{
    ApprovalStatus, DepartmentApproval, ElementDimensions, ElementMaterial, MaterialsDocument,
    ProjectElement, ProjectInfo,
};
use crate::domain::types::{Department, ElementCategory};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// MaterialsRepository - 物料清单仓储
// ==========================================
pub struct MaterialsRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialsRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 读取
    // ==========================================

    /// 查询任务的物料清单（含元素/材料与签核状态）
    pub fn find_by_task(&self, task_id: &str) -> RepositoryResult<Option<MaterialsDocument>> {
        let conn = self.get_conn()?;
        Self::find_by_task_inner(&conn, task_id)
    }

    /// 事务内读取（供同事务的后续判定使用）
    pub fn find_by_task_tx(
        &self,
        tx: &Transaction,
        task_id: &str,
    ) -> RepositoryResult<Option<MaterialsDocument>> {
        Self::find_by_task_inner(tx, task_id)
    }

    fn find_by_task_inner(
        conn: &Connection,
        task_id: &str,
    ) -> RepositoryResult<Option<MaterialsDocument>> {
        let head = conn.query_row(
            r#"SELECT project_info_json, available_elements_json, revision,
                      last_approval_at, updated_at, updated_by
               FROM materials_document
               WHERE task_id = ?"#,
            params![task_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<DateTime<Utc>>>(3)?,
                    row.get::<_, DateTime<Utc>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        );

        let (project_info_json, available_json, revision, last_approval_at, updated_at, updated_by) =
            match head {
                Ok(v) => v,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

        let project_info: ProjectInfo = serde_json::from_str(&project_info_json)?;
        let available_elements: Option<Vec<ProjectElement>> = match available_json {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };

        let elements = Self::load_elements(conn, task_id)?;
        let mut approval_status = Self::load_approval_inner(conn, task_id)?.unwrap_or_default();
        approval_status.last_approval_at = last_approval_at;
        approval_status.recompute_all_approved();

        Ok(Some(MaterialsDocument {
            task_id: task_id.to_string(),
            project_info,
            elements,
            available_elements,
            approval_status,
            revision,
            updated_at,
            updated_by,
        }))
    }

    /// 加载元素及其材料子行（按 seq_no 排序）
    fn load_elements(conn: &Connection, task_id: &str) -> RepositoryResult<Vec<ProjectElement>> {
        let mut stmt = conn.prepare(
            r#"SELECT element_id, element_type, name, category, dimensions_json, included
               FROM materials_element
               WHERE task_id = ?
               ORDER BY seq_no"#,
        )?;

        let heads = stmt
            .query_map(params![task_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, bool>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut elements = Vec::with_capacity(heads.len());
        for (element_id, element_type, name, category, dimensions_json, included) in heads {
            let dimensions: Option<ElementDimensions> = match dimensions_json {
                Some(raw) => Some(serde_json::from_str(&raw)?),
                None => None,
            };

            let mut mat_stmt = conn.prepare(
                r#"SELECT material_id, description, unit, quantity, included, additional, notes
                   FROM materials_material
                   WHERE element_id = ?
                   ORDER BY seq_no"#,
            )?;
            let materials = mat_stmt
                .query_map(params![&element_id], |row| {
                    Ok(ElementMaterial {
                        material_id: Some(row.get::<_, String>(0)?),
                        description: row.get(1)?,
                        unit: row.get(2)?,
                        quantity: row.get(3)?,
                        included: row.get(4)?,
                        additional: row.get(5)?,
                        notes: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            elements.push(ProjectElement {
                element_id: Some(element_id),
                element_type,
                name,
                category: ElementCategory::from_str(&category),
                dimensions,
                included,
                materials,
            });
        }

        Ok(elements)
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 保存物料清单（主行 + 子行整体替换 + 签核行）, 挂在调用方事务上
    ///
    /// 前置条件: doc 中元素/材料的 id 已由调用方补全
    pub fn save_in_tx(&self, tx: &Transaction, doc: &MaterialsDocument) -> RepositoryResult<()> {
        let project_info_json = serde_json::to_string(&doc.project_info)?;
        let available_json = match &doc.available_elements {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };

        tx.execute(
            r#"INSERT INTO materials_document (
                   task_id, project_info_json, available_elements_json, revision,
                   last_approval_at, updated_at, updated_by
               ) VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(task_id) DO UPDATE SET
                   project_info_json = excluded.project_info_json,
                   available_elements_json = excluded.available_elements_json,
                   revision = excluded.revision,
                   last_approval_at = excluded.last_approval_at,
                   updated_at = excluded.updated_at,
                   updated_by = excluded.updated_by"#,
            params![
                &doc.task_id,
                &project_info_json,
                &available_json,
                &doc.revision,
                &doc.approval_status.last_approval_at,
                &doc.updated_at,
                &doc.updated_by,
            ],
        )?;

        // 子行整体替换
        tx.execute(
            "DELETE FROM materials_material WHERE task_id = ?",
            params![&doc.task_id],
        )?;
        tx.execute(
            "DELETE FROM materials_element WHERE task_id = ?",
            params![&doc.task_id],
        )?;

        {
            let mut elem_stmt = tx.prepare(
                r#"INSERT INTO materials_element (
                       element_id, task_id, seq_no, element_type, name, category,
                       dimensions_json, included
                   ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            let mut mat_stmt = tx.prepare(
                r#"INSERT INTO materials_material (
                       material_id, element_id, task_id, seq_no, description, unit,
                       quantity, included, additional, notes
                   ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;

            for (eseq, element) in doc.elements.iter().enumerate() {
                let element_id = element.element_id.as_deref().ok_or_else(|| {
                    RepositoryError::ValidationError("元素缺少 element_id".to_string())
                })?;
                let dimensions_json = match &element.dimensions {
                    Some(d) => Some(serde_json::to_string(d)?),
                    None => None,
                };

                elem_stmt.execute(params![
                    element_id,
                    &doc.task_id,
                    eseq as i64,
                    &element.element_type,
                    &element.name,
                    element.category.as_str(),
                    &dimensions_json,
                    element.included,
                ])?;

                for (mseq, material) in element.materials.iter().enumerate() {
                    let material_id = material.material_id.as_deref().ok_or_else(|| {
                        RepositoryError::ValidationError("材料缺少 material_id".to_string())
                    })?;

                    mat_stmt.execute(params![
                        material_id,
                        element_id,
                        &doc.task_id,
                        mseq as i64,
                        &material.description,
                        &material.unit,
                        material.quantity,
                        material.included,
                        material.additional,
                        &material.notes,
                    ])?;
                }
            }
        }

        // 签核行整体写入（保存策略的产物: 重置或延续）
        self.replace_approvals_tx(tx, &doc.task_id, &doc.approval_status)?;

        Ok(())
    }

    /// 保存物料清单（自管事务的便捷入口）
    pub fn save(&self, doc: &MaterialsDocument) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        self.save_in_tx(&tx, doc)?;
        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 签核行
    // ==========================================

    /// 读取签核状态（不含 last_approval_at, 该字段在主行上）
    fn load_approval_inner(
        conn: &Connection,
        task_id: &str,
    ) -> RepositoryResult<Option<ApprovalStatus>> {
        let mut stmt = conn.prepare(
            r#"SELECT department, approved, approver, approved_at, comment
               FROM materials_approval
               WHERE task_id = ?"#,
        )?;

        let rows = stmt
            .query_map(params![task_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<DateTime<Utc>>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut status = ApprovalStatus::unapproved();
        for (dept_str, approved, approver, approved_at, comment) in rows {
            if let Some(dept) = Department::parse(&dept_str) {
                *status.entry_mut(dept) = DepartmentApproval {
                    approved,
                    approver,
                    approved_at,
                    comment,
                };
            }
        }
        status.recompute_all_approved();
        Ok(Some(status))
    }

    /// 整体写入签核行（保存策略: 重置或原样延续）
    pub fn replace_approvals_tx(
        &self,
        tx: &Transaction,
        task_id: &str,
        status: &ApprovalStatus,
    ) -> RepositoryResult<()> {
        let mut stmt = tx.prepare(
            r#"INSERT INTO materials_approval (task_id, department, approved, approver, approved_at, comment)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(task_id, department) DO UPDATE SET
                   approved = excluded.approved,
                   approver = excluded.approver,
                   approved_at = excluded.approved_at,
                   comment = excluded.comment"#,
        )?;

        for dept in Department::ALL {
            let entry = status.entry(dept);
            stmt.execute(params![
                task_id,
                dept.as_str(),
                entry.approved,
                &entry.approver,
                &entry.approved_at,
                &entry.comment,
            ])?;
        }

        Ok(())
    }

    /// 单部门签核行更新（独立一行, 与其他部门的并发签核不冲突）
    pub fn record_department_approval_tx(
        &self,
        tx: &Transaction,
        task_id: &str,
        dept: Department,
        entry: &DepartmentApproval,
    ) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO materials_approval (task_id, department, approved, approver, approved_at, comment)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(task_id, department) DO UPDATE SET
                   approved = excluded.approved,
                   approver = excluded.approver,
                   approved_at = excluded.approved_at,
                   comment = excluded.comment"#,
            params![
                task_id,
                dept.as_str(),
                entry.approved,
                &entry.approver,
                &entry.approved_at,
                &entry.comment,
            ],
        )?;
        Ok(())
    }

    /// 更新主行上的全签核时间戳
    pub fn set_last_approval_at_tx(
        &self,
        tx: &Transaction,
        task_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        tx.execute(
            "UPDATE materials_document SET last_approval_at = ? WHERE task_id = ?",
            params![at, task_id],
        )?;
        Ok(())
    }
}
