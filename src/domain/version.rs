// ==========================================
// 会展搭建项目管理系统 - 单据版本快照
// ==========================================
// 物料/预算单据的只追加历史: 每次内容保存/同步记录一个完整快照
// 预算快照关联其同步来源的物料版本, 便于追溯
// ==========================================

use crate::domain::types::DocumentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// DocumentVersion - 不可变版本快照
// ==========================================
// 红线: 正常流程只追加, 不修改、不删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub version_id: String,         // UUID
    pub task_id: String,            // 所属任务
    pub document_kind: DocumentKind, // 单据类型

    /// 版本号（同一任务+类型下从 1 递增, 入库事务内分配）
    pub version_no: i32,

    /// 版本标签（如 "内容保存" / "预算同步"）
    pub label: Option<String>,

    /// 完整单据快照（JSON）
    pub payload_json: String,

    /// 预算快照关联的物料版本号（物料快照为 None）
    pub linked_materials_version: Option<i32>,

    // ===== 审计字段 =====
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    /// 快照对应单据的最后更新时间
    pub source_updated_at: Option<DateTime<Utc>>,
}
