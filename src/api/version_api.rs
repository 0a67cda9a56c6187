// ==========================================
// 会展搭建项目管理系统 - 单据版本 API
// ==========================================
// 职责: 版本历史查询 + 物料清单版本回滚
// 回滚走正常保存管线: 内容变化判定与签核重置策略照常生效,
// 不存在绕过会签的后门
// ==========================================

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::materials_api::{MaterialsApi, SaveMaterialsOutcome, SaveMaterialsRequest};
use crate::domain::action_log::ActionLog;
use crate::domain::materials::MaterialsDocument;
use crate::domain::types::DocumentKind;
use crate::domain::version::DocumentVersion;
use crate::repository::{ActionLogRepository, TaskRepository, VersionRepository};

// ==========================================
// VersionApi - 版本 API
// ==========================================
pub struct VersionApi {
    task_repo: Arc<TaskRepository>,
    version_repo: Arc<VersionRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    materials_api: Arc<MaterialsApi>,
}

impl VersionApi {
    pub fn new(
        task_repo: Arc<TaskRepository>,
        version_repo: Arc<VersionRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        materials_api: Arc<MaterialsApi>,
    ) -> Self {
        Self {
            task_repo,
            version_repo,
            action_log_repo,
            materials_api,
        }
    }

    /// 查询任务的版本历史（倒序）
    pub fn list_versions(&self, task_id: &str, kind: &str) -> ApiResult<Vec<DocumentVersion>> {
        let kind = Self::parse_kind(kind)?;
        self.task_repo.require(task_id)?;
        Ok(self.version_repo.list_by_task(task_id, kind)?)
    }

    /// 查询指定版本快照
    pub fn get_version(
        &self,
        task_id: &str,
        kind: &str,
        version_no: i32,
    ) -> ApiResult<DocumentVersion> {
        let kind = Self::parse_kind(kind)?;
        self.task_repo.require(task_id)?;

        self.version_repo
            .find_by_version_no(task_id, kind, version_no)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "任务 {} 不存在 {} 版本 v{}",
                    task_id, kind, version_no
                ))
            })
    }

    /// 物料清单版本回滚
    ///
    /// 把历史快照作为一次新的保存提交: 相对当前内容的变化照常
    /// 触发签核重置, 版本历史只追加不改写
    pub async fn rollback_materials(
        &self,
        task_id: &str,
        version_no: i32,
        actor: &str,
    ) -> ApiResult<SaveMaterialsOutcome> {
        let version = self
            .version_repo
            .find_by_version_no(task_id, DocumentKind::Materials, version_no)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("任务 {} 不存在物料版本 v{}", task_id, version_no))
            })?;

        let snapshot: MaterialsDocument =
            serde_json::from_str(&version.payload_json).map_err(|e| {
                ApiError::InternalError(format!("版本快照解析失败 (v{}): {}", version_no, e))
            })?;

        let request = SaveMaterialsRequest {
            project_info: snapshot.project_info,
            project_elements: snapshot.elements,
            available_elements: snapshot.available_elements,
        };

        let outcome = self
            .materials_api
            .save_materials(task_id, request, actor)
            .await?;

        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            task_id: Some(task_id.to_string()),
            action_type: "ROLLBACK_MATERIALS".to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: Some(serde_json::json!({
                "restored_version_no": version_no,
                "approvals_reset": outcome.approvals_reset,
            })),
            detail: None,
        };
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "记录操作日志失败");
        }

        Ok(outcome)
    }

    fn parse_kind(raw: &str) -> ApiResult<DocumentKind> {
        DocumentKind::parse(raw).ok_or_else(|| {
            ApiError::InvalidInput(format!(
                "非法单据类型: {} (有效值: materials / budget)",
                raw
            ))
        })
    }
}
