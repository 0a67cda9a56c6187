// ==========================================
// 会展搭建项目管理系统 - 预算补充项领域模型
// ==========================================
// 补充项 (BudgetAddition) 是预算外的追加行项:
//   - manual: 预算人员手工创建, 从 draft 起步
//   - materials_additional: 由 additional 材料在全签核后自动派生
// 虚拟/持久化二态用显式和类型表达 (AdditionRecord),
// 对外 id 在边界处一次性解析为 AdditionId, 内部不做字符串前缀嗅探
// ==========================================

use crate::domain::types::{AdditionSource, AdditionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 派生补充项标题前缀（预算任务未完成时）
pub const ADDITIONAL_TITLE_PREFIX: &str = "Additional: ";

/// 派生补充项标题前缀（预算任务已完成后新引入的材料）
pub const POST_BUDGET_TITLE_PREFIX: &str = "Post-Budget Addition: ";

/// 虚拟补充项对外 id 前缀
pub const VIRTUAL_ID_PREFIX: &str = "materials_additional_";

/// 计算派生补充项的自然键标题
pub fn derived_title(description: &str, budget_completed: bool) -> String {
    if budget_completed {
        format!("{}{}", POST_BUDGET_TITLE_PREFIX, description)
    } else {
        format!("{}{}", ADDITIONAL_TITLE_PREFIX, description)
    }
}

// ==========================================
// AdditionMaterialLine - 补充项内嵌材料行
// ==========================================
// 派生补充项创建时价格字段置零, 在预算评审阶段填入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionMaterialLine {
    #[serde(default, alias = "materialId")]
    pub material_id: Option<String>, // 来源材料行标识

    pub description: String,

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub quantity: f64,

    #[serde(default, alias = "unitPrice")]
    pub unit_price: f64,

    #[serde(default, alias = "totalPrice")]
    pub total_price: f64,
}

// ==========================================
// BudgetAddition - 持久化补充项
// ==========================================
// 红线: approved/rejected 后除审计字段外不可变; 仅 draft 可删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAddition {
    pub addition_id: String, // UUID
    pub task_id: String,     // 所属预算任务

    pub title: String,       // 自然键（派生项: 前缀 + 材料描述）
    #[serde(default)]
    pub description: Option<String>,

    pub status: AdditionStatus,
    pub source: AdditionSource,

    /// 派生来源（manual 项为 None）
    #[serde(default)]
    pub source_element: Option<String>, // 来源元素归一化键
    #[serde(default)]
    pub source_material_id: Option<String>, // 来源材料行标识

    /// 内嵌材料行
    #[serde(default)]
    pub materials: Vec<AdditionMaterialLine>,

    /// 行合计
    #[serde(default)]
    pub amount: f64,

    // ===== 审计字段 =====
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<String>,          // 批准/驳回人
    pub decided_at: Option<DateTime<Utc>>,   // 批准/驳回时间
    #[serde(default)]
    pub decision_notes: Option<String>,      // 审批意见
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// VirtualAddition - 读取时合成的虚拟补充项
// ==========================================
// 尚无持久化行的 additional 材料在列表接口中以虚拟项出现,
// 对外 id 为 `materials_additional_<material_id>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAddition {
    pub material_id: String,            // 底层材料行标识
    pub element_key: String,            // 元素归一化键
    pub title: String,                  // 派生标题
    pub description: String,            // 材料描述
    pub unit: String,
    pub quantity: f64,
}

impl VirtualAddition {
    /// 对外暴露的合成 id
    pub fn public_id(&self) -> String {
        format!("{}{}", VIRTUAL_ID_PREFIX, self.material_id)
    }
}

// ==========================================
// AdditionRecord - 补充项读取视图 (和类型)
// ==========================================
// 列表接口返回持久化项与虚拟项的合并视图, 调用方按枚举分支处理
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdditionRecord {
    Persisted(BudgetAddition),
    Virtual(VirtualAddition),
}

impl AdditionRecord {
    /// 对外 id（持久化项为 UUID, 虚拟项为合成 id）
    pub fn public_id(&self) -> String {
        match self {
            AdditionRecord::Persisted(a) => a.addition_id.clone(),
            AdditionRecord::Virtual(v) => v.public_id(),
        }
    }

    pub fn status(&self) -> AdditionStatus {
        match self {
            AdditionRecord::Persisted(a) => a.status,
            // 虚拟项语义上等同"待审批"
            AdditionRecord::Virtual(_) => AdditionStatus::PendingApproval,
        }
    }
}

// ==========================================
// AdditionId - 对外 id 的边界解析
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionId {
    /// 持久化补充项（UUID）
    Persisted(String),
    /// 虚拟补充项（底层材料行标识）
    Virtual { material_id: String },
}

impl AdditionId {
    /// 在 API 边界一次性解析对外 id, 内部逻辑只与枚举打交道
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(VIRTUAL_ID_PREFIX) {
            Some(material_id) if !material_id.is_empty() => AdditionId::Virtual {
                material_id: material_id.to_string(),
            },
            _ => AdditionId::Persisted(raw.to_string()),
        }
    }
}
