// ==========================================
// 会展搭建项目管理系统 - 物料清单 API
// ==========================================
// 职责: 物料清单读写 + 部门签核, 即协同管线的入口
// 控制流:
//   保存: 归一化 → 变化判定 → 签核保存策略 → 单事务持久化 (+版本快照)
//   签核: 部门行更新 → 达成全签核时, 同一事务内联跑
//         预算同步 + 补充项对账 (+预算版本快照)
// 一致性: 下游任何失败都回滚整个触发操作, 不留半成品状态
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::RequestValidator;
use crate::domain::action_log::ActionLog;
use crate::domain::materials::{ApprovalStatus, MaterialsDocument, ProjectElement, ProjectInfo};
use crate::domain::types::{DocumentKind, TaskType};
use crate::domain::version::DocumentVersion;
use crate::engine::addition_reconciler::AdditionReconciler;
use crate::engine::approval_gate::ApprovalGate;
use crate::engine::budget_sync::MaterialsBudgetSynchronizer;
use crate::engine::change_detector::ChangeDetector;
use crate::engine::events::{ReconcileEvent, ReconcileEventPublisher, ReconcileEventType};
use crate::repository::{
    ActionLogRepository, BudgetRepository, MaterialsRepository, TaskRepository, VersionRepository,
};

// ==========================================
// DTO
// ==========================================

/// 物料清单保存请求
///
/// 前端负载为 camelCase, 持久化记录为 snake_case, 两者都接受
#[derive(Debug, Clone, Deserialize)]
pub struct SaveMaterialsRequest {
    #[serde(default, alias = "projectInfo")]
    pub project_info: ProjectInfo,

    #[serde(default, alias = "projectElements")]
    pub project_elements: Vec<ProjectElement>,

    #[serde(default, alias = "availableElements")]
    pub available_elements: Option<Vec<ProjectElement>>,
}

/// 物料清单保存结果
#[derive(Debug, Clone, Serialize)]
pub struct SaveMaterialsOutcome {
    pub document: MaterialsDocument,
    /// 本次保存是否判定为内容变化
    pub content_changed: bool,
    /// 本次保存是否触发了签核重置
    pub approvals_reset: bool,
}

// ==========================================
// MaterialsApi - 物料清单 API
// ==========================================
pub struct MaterialsApi {
    conn: Arc<Mutex<Connection>>,
    task_repo: Arc<TaskRepository>,
    materials_repo: Arc<MaterialsRepository>,
    budget_repo: Arc<BudgetRepository>,
    version_repo: Arc<VersionRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    reconciler: Arc<AdditionReconciler>,
    event_publisher: Option<Arc<dyn ReconcileEventPublisher>>,
}

impl MaterialsApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        task_repo: Arc<TaskRepository>,
        materials_repo: Arc<MaterialsRepository>,
        budget_repo: Arc<BudgetRepository>,
        version_repo: Arc<VersionRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        reconciler: Arc<AdditionReconciler>,
        event_publisher: Option<Arc<dyn ReconcileEventPublisher>>,
    ) -> Self {
        Self {
            conn,
            task_repo,
            materials_repo,
            budget_repo,
            version_repo,
            action_log_repo,
            reconciler,
            event_publisher,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询任务的物料清单
    ///
    /// 任务存在但尚未保存过物料清单时返回空单据（全部未签核）,
    /// 与"首次保存时创建"的生命周期一致; 任务不存在报 NotFound
    pub fn get_materials(&self, task_id: &str) -> ApiResult<MaterialsDocument> {
        self.task_repo.require(task_id)?;

        let doc = self
            .materials_repo
            .find_by_task(task_id)?
            .unwrap_or_else(|| MaterialsDocument::empty(task_id));
        Ok(doc)
    }

    // ==========================================
    // 保存接口
    // ==========================================

    /// 保存物料清单（完整保存管线）
    ///
    /// # 流程
    /// 1. 字段校验（失败则无任何状态变更）
    /// 2. 变化判定: 首次保存不算变化; 元素数量快路径; 否则规范形态比较
    /// 3. 签核保存策略: 变化 → 全部门重置; 未变化 → 原样延续
    /// 4. 单事务: 主行 + 子行整体替换 + 签核行 + 版本快照
    pub async fn save_materials(
        &self,
        task_id: &str,
        request: SaveMaterialsRequest,
        actor: &str,
    ) -> ApiResult<SaveMaterialsOutcome> {
        RequestValidator::material_elements(&request.project_elements)?;
        self.task_repo.require(task_id)?;

        let now = Utc::now();
        let mut elements = request.project_elements;
        Self::assign_ids(&mut elements);

        let (outcome, was_reset, content_changed) = {
            let mut guard = self
                .conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
            let tx = guard
                .transaction()
                .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;

            let existing = self.materials_repo.find_by_task_tx(&tx, task_id)?;

            let content_changed = ChangeDetector::changed(
                existing.as_ref().map(|d| d.elements.as_slice()),
                &elements,
            );
            let policy = ApprovalGate::apply_save_policy(
                existing.as_ref().map(|d| d.approval_status.clone()),
                content_changed,
            );

            let revision = match &existing {
                Some(d) if !content_changed => d.revision,
                Some(d) => d.revision + 1,
                None => 1,
            };
            let is_first_save = existing.is_none();

            let document = MaterialsDocument {
                task_id: task_id.to_string(),
                project_info: request.project_info,
                elements,
                available_elements: request.available_elements,
                approval_status: policy.status,
                revision,
                updated_at: now,
                updated_by: Some(actor.to_string()),
            };

            self.materials_repo.save_in_tx(&tx, &document)?;

            // 内容变化或首次保存时记版本快照
            if content_changed || is_first_save {
                let mut version = DocumentVersion {
                    version_id: Uuid::new_v4().to_string(),
                    task_id: task_id.to_string(),
                    document_kind: DocumentKind::Materials,
                    version_no: 0,
                    label: Some("内容保存".to_string()),
                    payload_json: serde_json::to_string(&document)
                        .map_err(|e| ApiError::InternalError(e.to_string()))?,
                    linked_materials_version: None,
                    created_by: Some(actor.to_string()),
                    created_at: now,
                    source_updated_at: Some(now),
                };
                self.version_repo.append_tx(&tx, &mut version)?;
            }

            tx.commit()
                .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;

            let was_reset = policy.was_reset;
            (
                SaveMaterialsOutcome {
                    document,
                    content_changed,
                    approvals_reset: was_reset,
                },
                was_reset,
                content_changed,
            )
        };

        self.log_action(
            task_id,
            "SAVE_MATERIALS",
            actor,
            serde_json::json!({
                "content_changed": content_changed,
                "approvals_reset": was_reset,
                "element_count": outcome.document.elements.len(),
            }),
            None,
        );

        self.publish(ReconcileEvent::new(
            task_id,
            ReconcileEventType::MaterialsSaved,
            actor,
        ))
        .await;
        if was_reset {
            self.publish(ReconcileEvent::new(
                task_id,
                ReconcileEventType::ApprovalsReset,
                actor,
            ))
            .await;
        }

        Ok(outcome)
    }

    // ==========================================
    // 签核接口
    // ==========================================

    /// 部门签核
    ///
    /// 达成全签核时, 在同一事务内联执行预算同步与补充项对账;
    /// 下游失败回滚整个操作, 签核不会被记录
    pub async fn approve_department(
        &self,
        task_id: &str,
        department: &str,
        comments: Option<String>,
        actor: &str,
    ) -> ApiResult<ApprovalStatus> {
        let dept = RequestValidator::department(department)?;
        let task = self.task_repo.require(task_id)?;
        // 预先解析预算任务, 避免在持有连接锁时再走仓储查询
        let budget_task = self.task_repo.find_sibling_of_type(task_id, TaskType::Budget)?;

        let now = Utc::now();

        let (status, newly_fully_approved, synced, additions_created) = {
            let mut guard = self
                .conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
            let tx = guard
                .transaction()
                .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;

            let document = self
                .materials_repo
                .find_by_task_tx(&tx, task_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("任务 {} 尚未保存物料清单", task_id))
                })?;

            let outcome = ApprovalGate::record_approval(
                document.approval_status.clone(),
                dept,
                actor,
                comments.clone(),
                now,
            );

            self.materials_repo.record_department_approval_tx(
                &tx,
                task_id,
                dept,
                outcome.status.entry(dept),
            )?;

            let mut synced = false;
            let mut additions_created = 0usize;

            if outcome.newly_fully_approved {
                self.materials_repo
                    .set_last_approval_at_tx(&tx, task_id, Some(now))?;

                match &budget_task {
                    Some(budget_task) => {
                        // 先对账后同步: 对账需要基于同步前的预算物料区
                        // 判定"预算完成后新引入"的材料
                        let existing_budget = self
                            .budget_repo
                            .find_by_task_tx(&tx, &budget_task.task_id)?
                            .unwrap_or_else(|| {
                                crate::domain::budget::BudgetDocument::empty(&budget_task.task_id)
                            });

                        let created = self.reconciler.reconcile_tx(
                            &tx,
                            budget_task,
                            &document,
                            &existing_budget,
                            actor,
                            now,
                        )?;
                        additions_created = created.len();

                        let merged = MaterialsBudgetSynchronizer::synchronize(
                            &existing_budget,
                            &document,
                            Some(&task.title),
                            actor,
                            now,
                        );
                        self.budget_repo.save_in_tx(&tx, &merged)?;

                        // 预算快照关联当前物料版本, 便于追溯
                        let materials_version = self.version_repo.latest_version_no_tx(
                            &tx,
                            task_id,
                            DocumentKind::Materials,
                        )?;
                        let mut version = DocumentVersion {
                            version_id: Uuid::new_v4().to_string(),
                            task_id: budget_task.task_id.clone(),
                            document_kind: DocumentKind::Budget,
                            version_no: 0,
                            label: Some("预算同步".to_string()),
                            payload_json: serde_json::to_string(&merged)
                                .map_err(|e| ApiError::InternalError(e.to_string()))?,
                            linked_materials_version: Some(materials_version),
                            created_by: Some(actor.to_string()),
                            created_at: now,
                            source_updated_at: Some(merged.updated_at),
                        };
                        self.version_repo.append_tx(&tx, &mut version)?;

                        synced = true;
                    }
                    None => {
                        // 询单尚未建立预算任务: 签核本身仍然成立, 同步等预算任务创建后再触发
                        warn!(task_id = task_id, "未找到预算任务, 跳过预算同步与补充项对账");
                    }
                }
            }

            tx.commit()
                .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;

            (
                outcome.status,
                outcome.newly_fully_approved,
                synced,
                additions_created,
            )
        };

        self.log_action(
            task_id,
            "APPROVE_DEPARTMENT",
            actor,
            serde_json::json!({
                "department": dept.as_str(),
                "all_approved": status.all_approved,
                "budget_synchronized": synced,
                "additions_created": additions_created,
            }),
            comments,
        );

        self.publish(ReconcileEvent::new(
            task_id,
            ReconcileEventType::DepartmentApproved,
            actor,
        ))
        .await;
        if newly_fully_approved {
            self.publish(ReconcileEvent::new(
                task_id,
                ReconcileEventType::FullyApproved,
                actor,
            ))
            .await;
        }
        if synced {
            self.publish(ReconcileEvent::new(
                task_id,
                ReconcileEventType::BudgetSynchronized,
                actor,
            ))
            .await;
        }
        if additions_created > 0 {
            self.publish(
                ReconcileEvent::new(task_id, ReconcileEventType::AdditionCreated, actor)
                    .with_detail(format!("{} 条补充项", additions_created)),
            )
            .await;
        }

        Ok(status)
    }

    // ==========================================
    // 内部
    // ==========================================

    /// 为缺少 id 的元素/材料分配 UUID（保持既有 id 不变, 价格历史匹配依赖它）
    fn assign_ids(elements: &mut [ProjectElement]) {
        for element in elements.iter_mut() {
            if element.element_id.is_none() {
                element.element_id = Some(Uuid::new_v4().to_string());
            }
            for material in element.materials.iter_mut() {
                if material.material_id.is_none() {
                    material.material_id = Some(Uuid::new_v4().to_string());
                }
            }
        }
    }

    /// 尽力而为的操作日志, 失败只告警
    fn log_action(
        &self,
        task_id: &str,
        action_type: &str,
        actor: &str,
        payload: serde_json::Value,
        detail: Option<String>,
    ) {
        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            task_id: Some(task_id.to_string()),
            action_type: action_type.to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: Some(payload),
            detail,
        };
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "记录操作日志失败");
        }
    }

    /// 事件发布失败只告警, 不影响已提交的业务结果
    async fn publish(&self, event: ReconcileEvent) {
        if let Some(publisher) = &self.event_publisher {
            if let Err(e) = publisher.publish(event).await {
                warn!(error = %e, "协同事件发布失败");
            }
        }
    }
}
