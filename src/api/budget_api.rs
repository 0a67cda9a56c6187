// ==========================================
// 会展搭建项目管理系统 - 预算 API
// ==========================================
// 职责: 预算单据读写 (物料区价格录入 + 人工/费用/物流区维护)
// 物料区的结构性内容来自同步器; 预算人员在此录入单价,
// 行合计一律按 数量 * 单价 重算后落库
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionLog;
use crate::domain::budget::{BudgetDocument, BudgetElement, BudgetLine};
use crate::domain::types::DocumentKind;
use crate::domain::version::DocumentVersion;
use crate::repository::{
    ActionLogRepository, BudgetRepository, TaskRepository, VersionRepository,
};

// ==========================================
// DTO
// ==========================================

/// 预算保存请求
///
/// 物料区可整体回传（录入单价后）; 省略时保留库中现状
#[derive(Debug, Clone, Deserialize)]
pub struct SaveBudgetRequest {
    #[serde(default)]
    pub materials: Option<Vec<BudgetElement>>,

    #[serde(default)]
    pub labour: Vec<BudgetLine>,

    #[serde(default)]
    pub expenses: Vec<BudgetLine>,

    #[serde(default)]
    pub logistics: Vec<BudgetLine>,
}

// ==========================================
// BudgetApi - 预算 API
// ==========================================
pub struct BudgetApi {
    conn: Arc<Mutex<Connection>>,
    task_repo: Arc<TaskRepository>,
    budget_repo: Arc<BudgetRepository>,
    version_repo: Arc<VersionRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl BudgetApi {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        task_repo: Arc<TaskRepository>,
        budget_repo: Arc<BudgetRepository>,
        version_repo: Arc<VersionRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            conn,
            task_repo,
            budget_repo,
            version_repo,
            action_log_repo,
        }
    }

    /// 查询任务的预算单据
    ///
    /// 任务存在但尚无预算时返回空单据; 任务不存在报 NotFound
    pub fn get_budget(&self, task_id: &str) -> ApiResult<BudgetDocument> {
        self.task_repo.require(task_id)?;

        let doc = self
            .budget_repo
            .find_by_task(task_id)?
            .unwrap_or_else(|| BudgetDocument::empty(task_id));
        Ok(doc)
    }

    /// 保存预算单据（人工编辑）
    ///
    /// 行合计按 数量 * 单价 重算; 标记 manually_modified;
    /// 同事务记预算版本快照
    pub fn save_budget(
        &self,
        task_id: &str,
        request: SaveBudgetRequest,
        actor: &str,
    ) -> ApiResult<BudgetDocument> {
        self.task_repo.require(task_id)?;

        let now = Utc::now();
        let existing = self
            .budget_repo
            .find_by_task(task_id)?
            .unwrap_or_else(|| BudgetDocument::empty(task_id));

        let mut materials = request.materials.unwrap_or(existing.materials);
        for element in &mut materials {
            for line in &mut element.materials {
                line.recompute_total();
            }
        }

        let mut labour = request.labour;
        let mut expenses = request.expenses;
        let mut logistics = request.logistics;
        for line in labour
            .iter_mut()
            .chain(expenses.iter_mut())
            .chain(logistics.iter_mut())
        {
            line.recompute_total();
        }

        let document = BudgetDocument {
            task_id: task_id.to_string(),
            materials,
            labour,
            expenses,
            logistics,
            imported_at: existing.imported_at,
            imported_from_task: existing.imported_from_task,
            manually_modified: true,
            import_metadata: existing.import_metadata,
            updated_at: now,
            updated_by: Some(actor.to_string()),
        };

        {
            let mut guard = self
                .conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
            let tx = guard
                .transaction()
                .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;

            self.budget_repo.save_in_tx(&tx, &document)?;

            let mut version = DocumentVersion {
                version_id: Uuid::new_v4().to_string(),
                task_id: task_id.to_string(),
                document_kind: DocumentKind::Budget,
                version_no: 0,
                label: Some("人工保存".to_string()),
                payload_json: serde_json::to_string(&document)
                    .map_err(|e| ApiError::InternalError(e.to_string()))?,
                linked_materials_version: None,
                created_by: Some(actor.to_string()),
                created_at: now,
                source_updated_at: Some(now),
            };
            self.version_repo.append_tx(&tx, &mut version)?;

            tx.commit()
                .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
        }

        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            task_id: Some(task_id.to_string()),
            action_type: "SAVE_BUDGET".to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: Some(serde_json::json!({
                "materials_total": document.materials_total(),
                "material_line_count": document.material_line_count(),
            })),
            detail: None,
        };
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "记录操作日志失败");
        }

        Ok(document)
    }
}
