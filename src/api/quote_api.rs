// ==========================================
// 会展搭建项目管理系统 - 报价 API
// ==========================================
// 职责: 报价单据读写 + 从预算显式导入
// 导入/设置变更都走同一条转换路径 (整体重建), 不做增量修补
// 默认加成与税率来自注入的配置提供者
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::RequestValidator;
use crate::config::QuoteConfigProvider;
use crate::domain::action_log::ActionLog;
use crate::domain::quote::{MarginConfig, QuoteDocument};
use crate::domain::types::TaskType;
use crate::engine::events::{ReconcileEvent, ReconcileEventPublisher, ReconcileEventType};
use crate::engine::quote_transformer::QuoteTransformer;
use crate::repository::{ActionLogRepository, BudgetRepository, QuoteRepository, TaskRepository};

// ==========================================
// DTO
// ==========================================

/// 报价设置保存请求（省略的字段保留现值）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveQuoteRequest {
    #[serde(default)]
    pub margins: Option<MarginConfig>,

    #[serde(default)]
    pub discount: Option<f64>,

    #[serde(default, alias = "vatEnabled")]
    pub vat_enabled: Option<bool>,

    #[serde(default, alias = "vatRate")]
    pub vat_rate: Option<f64>,
}

// ==========================================
// QuoteApi - 报价 API
// ==========================================
pub struct QuoteApi {
    task_repo: Arc<TaskRepository>,
    budget_repo: Arc<BudgetRepository>,
    quote_repo: Arc<QuoteRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config: Arc<dyn QuoteConfigProvider>,
    event_publisher: Option<Arc<dyn ReconcileEventPublisher>>,
}

impl QuoteApi {
    pub fn new(
        task_repo: Arc<TaskRepository>,
        budget_repo: Arc<BudgetRepository>,
        quote_repo: Arc<QuoteRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config: Arc<dyn QuoteConfigProvider>,
        event_publisher: Option<Arc<dyn ReconcileEventPublisher>>,
    ) -> Self {
        Self {
            task_repo,
            budget_repo,
            quote_repo,
            action_log_repo,
            config,
            event_publisher,
        }
    }

    /// 查询任务的报价单据
    ///
    /// 尚未生成时返回带默认设置的空单据
    pub fn get_quote(&self, task_id: &str) -> ApiResult<QuoteDocument> {
        self.task_repo.require(task_id)?;

        match self.quote_repo.find_by_task(task_id)? {
            Some(doc) => Ok(doc),
            None => {
                let mut doc = QuoteDocument::empty(task_id, self.config.vat_rate());
                doc.margins = self.config.default_margins();
                Ok(doc)
            }
        }
    }

    /// 保存报价设置（加成/折扣/增值税）
    ///
    /// 已导入过预算时按新设置整体重建汇总树;
    /// 尚未导入时只保存设置, 分区保持为空
    pub fn save_quote(
        &self,
        task_id: &str,
        request: SaveQuoteRequest,
        actor: &str,
    ) -> ApiResult<QuoteDocument> {
        self.task_repo.require(task_id)?;

        let existing = self.get_quote(task_id)?;
        let margins = request.margins.unwrap_or(existing.margins.clone());
        let discount = request.discount.unwrap_or(existing.discount);
        let vat_enabled = request.vat_enabled.unwrap_or(existing.vat_enabled);
        let vat_rate = request.vat_rate.unwrap_or(existing.vat_rate);

        RequestValidator::quote_settings(&margins, discount, vat_rate)?;

        let now = Utc::now();

        // 已有导入来源时, 按新设置从预算整体重建
        let budget_doc = match &existing.generated_from_task {
            Some(budget_task_id) => self.budget_repo.find_by_task(budget_task_id)?,
            None => None,
        };

        let document = match budget_doc {
            Some(budget) => QuoteTransformer::transform(
                task_id,
                &budget,
                margins,
                discount,
                vat_enabled,
                vat_rate,
                actor,
                now,
            ),
            None => {
                let mut doc = existing;
                doc.margins = margins;
                doc.discount = discount;
                doc.vat_enabled = vat_enabled;
                doc.vat_rate = vat_rate;
                doc.updated_at = now;
                doc.updated_by = Some(actor.to_string());
                doc
            }
        };

        self.quote_repo.save(&document)?;
        self.log_action(task_id, "SAVE_QUOTE", actor, serde_json::json!({
            "grand_total": document.totals.grand_total,
            "vat_enabled": document.vat_enabled,
        }));

        Ok(document)
    }

    /// 从预算导入并整体重建报价
    ///
    /// 定位同询单的预算任务; 预算缺失时报 NotFound, 无部分效果
    pub async fn import_budget(&self, task_id: &str, actor: &str) -> ApiResult<QuoteDocument> {
        self.task_repo.require(task_id)?;

        let budget_task = self
            .task_repo
            .find_sibling_of_type(task_id, TaskType::Budget)?
            .ok_or_else(|| ApiError::NotFound("同询单下不存在预算任务".to_string()))?;

        let budget = self
            .budget_repo
            .find_by_task(&budget_task.task_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("预算任务 {} 尚无预算单据", budget_task.task_id))
            })?;

        // 设置沿用现有报价, 首次导入取配置默认值
        let existing = self.get_quote(task_id)?;

        let now = Utc::now();
        let document = QuoteTransformer::transform(
            task_id,
            &budget,
            existing.margins,
            existing.discount,
            existing.vat_enabled,
            existing.vat_rate,
            actor,
            now,
        );

        self.quote_repo.save(&document)?;

        self.log_action(task_id, "IMPORT_BUDGET_TO_QUOTE", actor, serde_json::json!({
            "source_budget_task": budget_task.task_id,
            "grand_total": document.totals.grand_total,
        }));

        if let Some(publisher) = &self.event_publisher {
            let event = ReconcileEvent::new(task_id, ReconcileEventType::QuoteImported, actor);
            if let Err(e) = publisher.publish(event).await {
                warn!(error = %e, "协同事件发布失败");
            }
        }

        Ok(document)
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
