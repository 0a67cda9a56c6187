// ==========================================
// 会展搭建项目管理系统 - 预算补充项 API
// ==========================================
// 职责: 补充项全生命周期
//   - 手工项: 创建(draft) → 修改 → 提交审批/直接审批 → 删除(仅draft)
//   - 派生项: 列表合并虚拟项; 审批虚拟项时物化为持久化行
// 对外 id 在边界解析为 AdditionId 和类型, 内部不做前缀嗅探
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::RequestValidator;
use crate::domain::action_log::ActionLog;
use crate::domain::addition::{
    AdditionId, AdditionMaterialLine, AdditionRecord, BudgetAddition,
};
use crate::domain::budget::BudgetDocument;
use crate::domain::materials::MaterialsDocument;
use crate::domain::task::Task;
use crate::domain::types::{AdditionSource, AdditionStatus, TaskStatus, TaskType};
use crate::engine::addition_reconciler::AdditionReconciler;
use crate::engine::events::{ReconcileEvent, ReconcileEventPublisher, ReconcileEventType};
use crate::repository::{
    ActionLogRepository, AdditionRepository, BudgetRepository, MaterialsRepository, TaskRepository,
};

// ==========================================
// DTO
// ==========================================

/// 手工补充项创建请求
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdditionRequest {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub materials: Vec<AdditionMaterialLine>,
}

/// 补充项修改请求（省略的字段保留现值）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAdditionRequest {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub materials: Option<Vec<AdditionMaterialLine>>,
}

/// 审批请求: action ∈ {approve, reject}
#[derive(Debug, Clone, Deserialize)]
pub struct DecideAdditionRequest {
    pub action: String,

    #[serde(default)]
    pub notes: Option<String>,
}

// ==========================================
// AdditionApi - 补充项 API
// ==========================================
pub struct AdditionApi {
    conn: Arc<Mutex<Connection>>,
    task_repo: Arc<TaskRepository>,
    materials_repo: Arc<MaterialsRepository>,
    budget_repo: Arc<BudgetRepository>,
    addition_repo: Arc<AdditionRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    reconciler: Arc<AdditionReconciler>,
    event_publisher: Option<Arc<dyn ReconcileEventPublisher>>,
}

impl AdditionApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        task_repo: Arc<TaskRepository>,
        materials_repo: Arc<MaterialsRepository>,
        budget_repo: Arc<BudgetRepository>,
        addition_repo: Arc<AdditionRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        reconciler: Arc<AdditionReconciler>,
        event_publisher: Option<Arc<dyn ReconcileEventPublisher>>,
    ) -> Self {
        Self {
            conn,
            task_repo,
            materials_repo,
            budget_repo,
            addition_repo,
            action_log_repo,
            reconciler,
            event_publisher,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询补充项列表（持久化行 + 虚拟项合并视图）
    ///
    /// 虚拟项只在物料清单已全签核时浮现
    /// (派生流程整体以全签核为前提)
    pub fn list_additions(
        &self,
        task_id: &str,
        status_filter: Option<&str>,
    ) -> ApiResult<Vec<AdditionRecord>> {
        let status_filter = match status_filter {
            Some(raw) => Some(AdditionStatus::parse(raw).ok_or_else(|| {
                ApiError::InvalidInput(format!("非法补充项状态: {}", raw))
            })?),
            None => None,
        };

        let (budget_task, materials_doc, budget_doc) = self.resolve_context(task_id)?;
        let persisted = self.addition_repo.list_by_task(task_id)?;

        let records = match materials_doc {
            Some(doc) if doc.approval_status.all_approved => {
                AdditionReconciler::merge_with_virtual(persisted, &budget_task, &doc, &budget_doc)
            }
            _ => persisted.into_iter().map(AdditionRecord::Persisted).collect(),
        };

        let records = match status_filter {
            Some(status) => records
                .into_iter()
                .filter(|r| r.status() == status)
                .collect(),
            None => records,
        };

        Ok(records)
    }

    // ==========================================
    // 手工项生命周期
    // ==========================================

    /// 创建手工补充项（draft 起步）
    pub fn create_addition(
        &self,
        task_id: &str,
        request: CreateAdditionRequest,
        actor: &str,
    ) -> ApiResult<BudgetAddition> {
        RequestValidator::addition_payload(&request.title, &request.materials)?;
        self.require_budget_task(task_id)?;

        let now = Utc::now();
        let mut materials = request.materials;
        for line in &mut materials {
            line.total_price = line.quantity * line.unit_price;
        }
        let amount = materials.iter().map(|l| l.total_price).sum();

        let addition = BudgetAddition {
            addition_id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            title: request.title,
            description: request.description,
            status: AdditionStatus::Draft,
            source: AdditionSource::Manual,
            source_element: None,
            source_material_id: None,
            materials,
            amount,
            created_by: Some(actor.to_string()),
            created_at: now,
            decided_by: None,
            decided_at: None,
            decision_notes: None,
            updated_at: now,
        };

        self.addition_repo.insert(&addition)?;
        self.log_action(task_id, "CREATE_ADDITION", actor, serde_json::json!({
            "addition_id": addition.addition_id,
            "title": addition.title,
        }));

        Ok(addition)
    }

    /// 修改补充项（仅 draft / pending_approval; 虚拟项不可直接修改）
    pub fn update_addition(
        &self,
        task_id: &str,
        addition_id: &str,
        request: UpdateAdditionRequest,
        actor: &str,
    ) -> ApiResult<BudgetAddition> {
        let id = match AdditionId::parse(addition_id) {
            AdditionId::Persisted(id) => id,
            AdditionId::Virtual { .. } => {
                return Err(ApiError::InvalidInput(
                    "虚拟补充项未持久化, 不能直接修改; 请先审批".to_string(),
                ))
            }
        };

        let mut addition = self.require_owned_addition(task_id, &id)?;

        if let Some(title) = request.title {
            addition.title = title;
        }
        if let Some(description) = request.description {
            addition.description = Some(description);
        }
        if let Some(mut materials) = request.materials {
            for line in &mut materials {
                line.total_price = line.quantity * line.unit_price;
            }
            addition.materials = materials;
        }
        addition.amount = addition.materials.iter().map(|l| l.total_price).sum();
        addition.updated_at = Utc::now();

        RequestValidator::addition_payload(&addition.title, &addition.materials)?;

        self.addition_repo.update_content(&addition)?;
        self.log_action(task_id, "UPDATE_ADDITION", actor, serde_json::json!({
            "addition_id": addition.addition_id,
        }));

        Ok(addition)
    }

    /// 删除补充项（仅 draft; 非 draft 报冲突, 原状态不变）
    pub fn delete_addition(&self, task_id: &str, addition_id: &str, actor: &str) -> ApiResult<()> {
        let id = match AdditionId::parse(addition_id) {
            AdditionId::Persisted(id) => id,
            AdditionId::Virtual { .. } => {
                return Err(ApiError::InvalidInput(
                    "虚拟补充项未持久化, 无可删除记录".to_string(),
                ))
            }
        };

        self.require_owned_addition(task_id, &id)?;
        self.addition_repo.delete_draft(&id)?;

        self.log_action(task_id, "DELETE_ADDITION", actor, serde_json::json!({
            "addition_id": id,
        }));
        Ok(())
    }

    // ==========================================
    // 审批接口
    // ==========================================

    /// 审批补充项
    ///
    /// - 持久化项: draft/pending_approval → approved/rejected, 终态不可再审
    /// - 虚拟项: approve 物化为 approved 行 (创建人=审批人=当前操作者);
    ///   reject 同样落一行 rejected 终态, 否则该虚拟项会在下次读取时重新浮现
    pub async fn decide_addition(
        &self,
        task_id: &str,
        addition_id: &str,
        request: DecideAdditionRequest,
        actor: &str,
    ) -> ApiResult<BudgetAddition> {
        let approve = match request.action.trim().to_ascii_lowercase().as_str() {
            "approve" => true,
            "reject" => false,
            other => {
                return Err(ApiError::InvalidInput(format!(
                    "非法审批动作: {} (有效值: approve / reject)",
                    other
                )))
            }
        };

        let now = Utc::now();
        let target_status = if approve {
            AdditionStatus::Approved
        } else {
            AdditionStatus::Rejected
        };

        let decided = match AdditionId::parse(addition_id) {
            AdditionId::Persisted(id) => {
                self.require_owned_addition(task_id, &id)?;

                let mut guard = self
                    .conn
                    .lock()
                    .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
                let tx = guard
                    .transaction()
                    .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;

                self.addition_repo.decide_tx(
                    &tx,
                    &id,
                    target_status,
                    actor,
                    request.notes.as_deref(),
                    now,
                )?;
                let decided = self
                    .addition_repo
                    .find_by_id_tx(&tx, &id)?
                    .ok_or_else(|| ApiError::NotFound(format!("补充项 {} 不存在", id)))?;

                tx.commit()
                    .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
                decided
            }
            AdditionId::Virtual { material_id } => {
                let (budget_task, materials_doc, budget_doc) = self.resolve_context(task_id)?;
                let materials_doc = materials_doc.ok_or_else(|| {
                    ApiError::NotFound("物料清单不存在, 虚拟补充项无从定位".to_string())
                })?;

                let budget_completed = budget_task.status == TaskStatus::Completed;
                let candidate = AdditionReconciler::find_candidate(
                    &materials_doc,
                    &budget_doc,
                    budget_completed,
                    &material_id,
                )
                .ok_or_else(|| {
                    ApiError::NotFound(format!(
                        "虚拟补充项对应的材料不存在: {}",
                        material_id
                    ))
                })?;

                let mut guard = self
                    .conn
                    .lock()
                    .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
                let tx = guard
                    .transaction()
                    .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;

                // 幂等防护: 同一虚拟项并发审批时, 后到者命中已有行
                let decided = match self
                    .addition_repo
                    .find_active_by_title_tx(&tx, task_id, &candidate.title)?
                {
                    Some(existing) if existing.status.is_processed() => existing,
                    Some(existing) => {
                        self.addition_repo.decide_tx(
                            &tx,
                            &existing.addition_id,
                            target_status,
                            actor,
                            request.notes.as_deref(),
                            now,
                        )?;
                        self.addition_repo
                            .find_by_id_tx(&tx, &existing.addition_id)?
                            .ok_or_else(|| {
                                ApiError::InternalError("补充项审批后读取失败".to_string())
                            })?
                    }
                    None => {
                        // 已驳回行不在按标题的查重范围内, 单独兜底,
                        // 避免重复驳回同一虚拟项落出多条 rejected 行
                        let covered = self
                            .addition_repo
                            .list_by_task_tx(&tx, task_id)?
                            .into_iter()
                            .find(|row| AdditionReconciler::row_matches_candidate(row, &candidate));

                        match covered {
                            Some(existing) => existing,
                            None => self.reconciler.materialize_virtual_tx(
                                &tx,
                                task_id,
                                &candidate,
                                approve,
                                actor,
                                request.notes.clone(),
                                now,
                            )?,
                        }
                    }
                };

                tx.commit()
                    .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
                decided
            }
        };

        self.log_action(task_id, "DECIDE_ADDITION", actor, serde_json::json!({
            "addition_id": decided.addition_id,
            "status": decided.status.as_str(),
            "notes": request.notes,
        }));

        if let Some(publisher) = &self.event_publisher {
            let event = ReconcileEvent::new(task_id, ReconcileEventType::AdditionDecided, actor)
                .with_detail(format!("{} → {}", decided.title, decided.status));
            if let Err(e) = publisher.publish(event).await {
                warn!(error = %e, "协同事件发布失败");
            }
        }

        Ok(decided)
    }

    // ==========================================
    // 内部
    // ==========================================

    /// 校验任务存在且为预算阶段
    fn require_budget_task(&self, task_id: &str) -> ApiResult<Task> {
        let task = self.task_repo.require(task_id)?;
        if task.task_type != TaskType::Budget {
            return Err(ApiError::InvalidInput(format!(
                "任务 {} 不是预算任务 (实际类型: {})",
                task_id, task.task_type
            )));
        }
        Ok(task)
    }

    /// 解析补充项上下文: 预算任务 + 物料清单 + 预算单据
    fn resolve_context(
        &self,
        task_id: &str,
    ) -> ApiResult<(Task, Option<MaterialsDocument>, BudgetDocument)> {
        let budget_task = self.require_budget_task(task_id)?;

        let materials_doc = match self
            .task_repo
            .find_sibling_of_type(task_id, TaskType::Materials)?
        {
            Some(materials_task) => self.materials_repo.find_by_task(&materials_task.task_id)?,
            None => None,
        };

        let budget_doc = self
            .budget_repo
            .find_by_task(task_id)?
            .unwrap_or_else(|| BudgetDocument::empty(task_id));

        Ok((budget_task, materials_doc, budget_doc))
    }

    /// 读取并校验归属: 补充项必须属于该预算任务
    fn require_owned_addition(&self, task_id: &str, addition_id: &str) -> ApiResult<BudgetAddition> {
        let addition = self
            .addition_repo
            .find_by_id(addition_id)?
            .ok_or_else(|| ApiError::NotFound(format!("补充项 {} 不存在", addition_id)))?;

        if addition.task_id != task_id {
            // 不泄露其他任务下的存在性
            return Err(ApiError::NotFound(format!("补充项 {} 不存在", addition_id)));
        }

        Ok(addition)
    }

    /// 尽力而为的操作日志, 失败只告警
    fn log_action(&self, task_id: &str, action_type: &str, actor: &str, payload: serde_json::Value) {
        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            task_id: Some(task_id.to_string()),
            action_type: action_type.to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: Some(payload),
            detail: None,
        };
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "记录操作日志失败");
        }
    }
}
