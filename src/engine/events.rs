// ==========================================
// 会展搭建项目管理系统 - 协同事件发布
// ==========================================
// 职责: 定义协同管线事件 trait, 实现依赖倒置
// 说明: 引擎/API 层只依赖 trait, 通知投递由外部模块实现;
//       投递失败只告警, 不回滚已提交的业务事务
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ==========================================
// 协同事件类型
// ==========================================

/// 协同管线事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileEventType {
    /// 物料清单已保存
    MaterialsSaved,
    /// 签核因内容变化被重置
    ApprovalsReset,
    /// 单部门签核完成
    DepartmentApproved,
    /// 达成全部门签核
    FullyApproved,
    /// 预算物料区已同步
    BudgetSynchronized,
    /// 补充项已生成
    AdditionCreated,
    /// 补充项已审批
    AdditionDecided,
    /// 报价已从预算重新生成
    QuoteImported,
}

impl ReconcileEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileEventType::MaterialsSaved => "MaterialsSaved",
            ReconcileEventType::ApprovalsReset => "ApprovalsReset",
            ReconcileEventType::DepartmentApproved => "DepartmentApproved",
            ReconcileEventType::FullyApproved => "FullyApproved",
            ReconcileEventType::BudgetSynchronized => "BudgetSynchronized",
            ReconcileEventType::AdditionCreated => "AdditionCreated",
            ReconcileEventType::AdditionDecided => "AdditionDecided",
            ReconcileEventType::QuoteImported => "QuoteImported",
        }
    }
}

// ==========================================
// ReconcileEvent - 协同事件
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileEvent {
    /// 触发事件的任务
    pub task_id: String,
    /// 事件类型
    pub event_type: ReconcileEventType,
    /// 操作人
    pub actor: Option<String>,
    /// 补充描述
    pub detail: Option<String>,
}

impl ReconcileEvent {
    pub fn new(task_id: &str, event_type: ReconcileEventType, actor: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            event_type,
            actor: Some(actor.to_string()),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

// ==========================================
// ReconcileEventPublisher - 事件发布 trait
// ==========================================

/// 协同事件发布接口
///
/// 通知投递属于外部模块; 这里只约定发布口。
/// 实现方错误不会中断业务操作, 调用侧统一降级为告警日志。
#[async_trait]
pub trait ReconcileEventPublisher: Send + Sync {
    async fn publish(&self, event: ReconcileEvent) -> anyhow::Result<()>;
}

// ==========================================
// LoggingEventPublisher - 日志实现（默认）
// ==========================================

/// 仅写日志的事件发布器, 用于未接入通知系统的部署与测试
pub struct LoggingEventPublisher;

#[async_trait]
impl ReconcileEventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: ReconcileEvent) -> anyhow::Result<()> {
        tracing::info!(
            task_id = %event.task_id,
            event_type = %event.event_type.as_str(),
            actor = event.actor.as_deref().unwrap_or("-"),
            "协同事件"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_publisher_never_fails() {
        let publisher = LoggingEventPublisher;
        let event = ReconcileEvent::new("T1", ReconcileEventType::FullyApproved, "张工");
        assert!(publisher.publish(event).await.is_ok());
    }
}
