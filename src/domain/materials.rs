// ==========================================
// 会展搭建项目管理系统 - 物料清单领域模型
// ==========================================
// 每个物料任务持有一份 MaterialsDocument:
//   元素 (ProjectElement) → 材料 (ElementMaterial) 两级结构
// 会签状态 (ApprovalStatus) 按部门独立存储, 聚合出 all_approved
// 输入负载兼容 camelCase / snake_case 两种编码 (serde alias)
// ==========================================

use crate::domain::types::{Department, ElementCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ProjectInfo - 项目基础信息
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default, alias = "projectName")]
    pub project_name: Option<String>, // 项目名称
    #[serde(default, alias = "clientName")]
    pub client_name: Option<String>, // 客户名称
    #[serde(default)]
    pub venue: Option<String>, // 场馆/展位
    #[serde(default, alias = "setupDate")]
    pub setup_date: Option<String>, // 进场搭建日期
    #[serde(default, alias = "teardownDate")]
    pub teardown_date: Option<String>, // 撤场日期
    #[serde(default)]
    pub notes: Option<String>, // 备注
}

// ==========================================
// ElementDimensions - 元素尺寸
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDimensions {
    #[serde(default, alias = "widthM")]
    pub width_m: Option<f64>, // 宽 (米)
    #[serde(default, alias = "depthM")]
    pub depth_m: Option<f64>, // 深 (米)
    #[serde(default, alias = "heightM")]
    pub height_m: Option<f64>, // 高 (米)
}

// ==========================================
// ElementMaterial - 元素下的材料行
// ==========================================
// additional=true 的材料不进入预算物料区, 由补充项流程单独审批
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMaterial {
    /// 材料行唯一标识（首次保存时生成）
    #[serde(default, alias = "materialId", alias = "id")]
    pub material_id: Option<String>,

    /// 材料描述（预算合并键的一部分, 必填）
    pub description: String,

    /// 计量单位（如: 块 / 平方米 / 套）
    #[serde(default)]
    pub unit: String,

    /// 数量（>= 0）
    #[serde(default)]
    pub quantity: f64,

    /// 是否计入（false 的行不参与预算同步）
    #[serde(default = "default_true")]
    pub included: bool,

    /// 是否超出原始范围的补充材料
    #[serde(default)]
    pub additional: bool,

    /// 备注
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

// ==========================================
// ProjectElement - 物料清单元素
// ==========================================
// 元素是材料的命名分组（如 "舞台" / "接待台"）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectElement {
    /// 元素唯一标识（首次保存时生成）
    #[serde(default, alias = "elementId", alias = "id")]
    pub element_id: Option<String>,

    /// 元素类型（与 name 共同构成归一化键）
    #[serde(alias = "elementType", alias = "type")]
    pub element_type: String,

    /// 元素名称
    pub name: String,

    /// 分类: 自制 / 租赁 / 外包
    #[serde(default)]
    pub category: ElementCategory,

    /// 尺寸
    #[serde(default)]
    pub dimensions: Option<ElementDimensions>,

    /// 是否计入
    #[serde(default = "default_true")]
    pub included: bool,

    /// 材料行（有序）
    #[serde(default)]
    pub materials: Vec<ElementMaterial>,
}

impl ProjectElement {
    /// 归一化键: `{element_type}|{name}`
    pub fn normalize_key(&self) -> String {
        format!("{}|{}", self.element_type, self.name)
    }
}

// ==========================================
// DepartmentApproval - 单部门签核记录
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentApproval {
    pub approved: bool,                      // 是否已签核
    pub approver: Option<String>,            // 签核人
    pub approved_at: Option<DateTime<Utc>>,  // 签核时间
    pub comment: Option<String>,             // 签核意见
}

// ==========================================
// ApprovalStatus - 会签聚合状态
// ==========================================
// all_approved = 三部门全部签核
// 回退只能由内容变化触发, 不存在撤销签核的直接接口
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub design: DepartmentApproval,     // 设计部
    pub production: DepartmentApproval, // 制作部
    pub finance: DepartmentApproval,    // 财务部

    /// 派生: 三部门全部签核
    pub all_approved: bool,

    /// 派生: 达成全签核的时间
    pub last_approval_at: Option<DateTime<Utc>>,
}

impl ApprovalStatus {
    /// 全部未签核的初始状态
    pub fn unapproved() -> Self {
        Self::default()
    }

    pub fn entry(&self, dept: Department) -> &DepartmentApproval {
        match dept {
            Department::Design => &self.design,
            Department::Production => &self.production,
            Department::Finance => &self.finance,
        }
    }

    pub fn entry_mut(&mut self, dept: Department) -> &mut DepartmentApproval {
        match dept {
            Department::Design => &mut self.design,
            Department::Production => &mut self.production,
            Department::Finance => &mut self.finance,
        }
    }

    /// 重新计算 all_approved（不修改 last_approval_at）
    pub fn recompute_all_approved(&mut self) {
        self.all_approved = Department::ALL.iter().all(|d| self.entry(*d).approved);
    }
}

// ==========================================
// MaterialsDocument - 物料清单单据
// ==========================================
// 一个物料任务一份; 首次保存时创建
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialsDocument {
    pub task_id: String, // 所属任务

    /// 项目基础信息
    pub project_info: ProjectInfo,

    /// 元素列表（有序）
    pub elements: Vec<ProjectElement>,

    /// 可选元素面板（模板, 不参与内容变化判定）
    #[serde(default)]
    pub available_elements: Option<Vec<ProjectElement>>,

    /// 会签状态
    pub approval_status: ApprovalStatus,

    /// 内容修订号（每次内容保存 +1）
    pub revision: i64,

    /// 审计字段
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl MaterialsDocument {
    /// 任务尚未保存过物料清单时的空单据
    pub fn empty(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            project_info: ProjectInfo::default(),
            elements: Vec::new(),
            available_elements: None,
            approval_status: ApprovalStatus::unapproved(),
            revision: 0,
            updated_at: Utc::now(),
            updated_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_payload_accepts_both_encodings() {
        // camelCase（前端请求）
        let camel: ProjectElement = serde_json::from_str(
            r#"{"elementType":"stage","name":"主舞台","category":"production",
                "materials":[{"description":"木板","unit":"块","quantity":10}]}"#,
        )
        .unwrap();

        // snake_case（持久化记录）
        let snake: ProjectElement = serde_json::from_str(
            r#"{"element_type":"stage","name":"主舞台","category":"production",
                "materials":[{"description":"木板","unit":"块","quantity":10}]}"#,
        )
        .unwrap();

        assert_eq!(camel.element_type, snake.element_type);
        assert_eq!(camel.materials[0].description, snake.materials[0].description);
        assert_eq!(camel.materials[0].quantity, snake.materials[0].quantity);
        // included 缺省为 true, additional 缺省为 false
        assert!(camel.materials[0].included);
        assert!(!camel.materials[0].additional);
    }

    #[test]
    fn test_approval_status_recompute() {
        let mut status = ApprovalStatus::unapproved();
        assert!(!status.all_approved);

        for dept in Department::ALL {
            status.entry_mut(dept).approved = true;
        }
        status.recompute_all_approved();
        assert!(status.all_approved);

        status.entry_mut(Department::Finance).approved = false;
        status.recompute_all_approved();
        assert!(!status.all_approved);
    }
}
