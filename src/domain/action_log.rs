// ==========================================
// 会展搭建项目管理系统 - 操作日志领域模型
// ==========================================
// 审计追踪: 保存/签核/审批等关键操作各记一行
// 写入为尽力而为, 失败只告警, 不阻断主操作
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,              // UUID
    pub task_id: Option<String>,        // 关联任务（可为空）
    pub action_type: String,            // 操作类型标识（SAVE_MATERIALS / APPROVE_DEPARTMENT / ...）
    pub action_ts: NaiveDateTime,       // 操作时间
    pub actor: String,                  // 操作人
    pub payload_json: Option<serde_json::Value>, // 操作负载摘要
    pub detail: Option<String>,         // 人类可读描述
}
