// ==========================================
// 会展搭建项目管理系统 - 预算领域模型
// ==========================================
// 每个预算任务持有一份 BudgetDocument:
//   物料区 (从已全签核物料清单同步) + 人工/费用/物流三个行区
// 不变式: 物料区只反映 included 且非 additional 且已签核的材料;
//         已录入的 unit_price 不会被重新同步覆盖
// ==========================================

use crate::domain::types::ElementCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// BudgetMaterial - 预算物料行
// ==========================================
// unit_price 由预算人员录入; total_price = quantity * unit_price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetMaterial {
    #[serde(default, alias = "materialId")]
    pub material_id: Option<String>, // 同步来源的材料行标识

    pub description: String, // 材料描述（合并键的一部分）

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub quantity: f64,

    #[serde(default, alias = "unitPrice")]
    pub unit_price: f64,

    #[serde(default, alias = "totalPrice")]
    pub total_price: f64,

    #[serde(default)]
    pub notes: Option<String>,
}

impl BudgetMaterial {
    /// 按数量与单价重算行合计
    pub fn recompute_total(&mut self) {
        self.total_price = self.quantity * self.unit_price;
    }
}

// ==========================================
// BudgetElement - 预算物料区元素
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetElement {
    #[serde(default, alias = "elementId")]
    pub element_id: Option<String>,

    #[serde(alias = "elementType", alias = "type")]
    pub element_type: String,

    pub name: String,

    #[serde(default)]
    pub category: ElementCategory,

    #[serde(default)]
    pub materials: Vec<BudgetMaterial>,
}

/// 预算物料合并键: `{element_type}_{name}_{description}`
///
/// 重新同步时以该键查找历史行, 命中则保留已录入单价。
pub fn budget_material_key(element_type: &str, name: &str, description: &str) -> String {
    format!("{}_{}_{}", element_type, name, description)
}

// ==========================================
// BudgetLine - 通用预算行 (人工/费用/物流)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub description: String,

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub quantity: f64,

    #[serde(default, alias = "unitPrice")]
    pub unit_price: f64,

    #[serde(default, alias = "totalPrice")]
    pub total_price: f64,

    #[serde(default)]
    pub notes: Option<String>,
}

impl BudgetLine {
    pub fn recompute_total(&mut self) {
        self.total_price = self.quantity * self.unit_price;
    }
}

// ==========================================
// ImportMetadata - 同步来源信息
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportMetadata {
    pub source_task_title: Option<String>, // 来源物料任务标题
    pub element_count: usize,              // 同步的元素数
    pub material_count: usize,             // 同步的材料行数
}

// ==========================================
// BudgetDocument - 预算单据
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetDocument {
    pub task_id: String, // 所属预算任务

    /// 物料区（由同步器写入/合并）
    pub materials: Vec<BudgetElement>,

    /// 人工区
    #[serde(default)]
    pub labour: Vec<BudgetLine>,

    /// 费用区
    #[serde(default)]
    pub expenses: Vec<BudgetLine>,

    /// 物流区
    #[serde(default)]
    pub logistics: Vec<BudgetLine>,

    // ===== 同步溯源 =====
    pub imported_at: Option<DateTime<Utc>>,      // 最近一次同步时间
    pub imported_from_task: Option<String>,      // 来源物料任务ID
    pub manually_modified: bool,                 // 同步后是否被人工改动
    #[serde(default)]
    pub import_metadata: ImportMetadata,

    // ===== 审计字段 =====
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl BudgetDocument {
    pub fn empty(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            materials: Vec::new(),
            labour: Vec::new(),
            expenses: Vec::new(),
            logistics: Vec::new(),
            imported_at: None,
            imported_from_task: None,
            manually_modified: false,
            import_metadata: ImportMetadata::default(),
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    /// 物料区行合计
    pub fn materials_total(&self) -> f64 {
        self.materials
            .iter()
            .flat_map(|e| e.materials.iter())
            .map(|m| m.total_price)
            .sum()
    }

    /// 物料区材料行数
    pub fn material_line_count(&self) -> usize {
        self.materials.iter().map(|e| e.materials.len()).sum()
    }

    /// 判断物料区是否已包含某材料描述（预算完成后新材料的判定依据）
    pub fn contains_material(&self, element_type: &str, name: &str, description: &str) -> bool {
        let key = budget_material_key(element_type, name, description);
        self.materials.iter().any(|e| {
            e.materials
                .iter()
                .any(|m| budget_material_key(&e.element_type, &e.name, &m.description) == key)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_material_key() {
        assert_eq!(
            budget_material_key("stage", "主舞台", "木板"),
            "stage_主舞台_木板"
        );
    }

    #[test]
    fn test_recompute_total() {
        let mut m = BudgetMaterial {
            material_id: None,
            description: "Banner".to_string(),
            unit: "件".to_string(),
            quantity: 5.0,
            unit_price: 500.0,
            total_price: 0.0,
            notes: None,
        };
        m.recompute_total();
        assert_eq!(m.total_price, 2500.0);
    }

    #[test]
    fn test_contains_material() {
        let mut doc = BudgetDocument::empty("T1");
        doc.materials.push(BudgetElement {
            element_id: None,
            element_type: "stage".to_string(),
            name: "主舞台".to_string(),
            category: ElementCategory::Production,
            materials: vec![BudgetMaterial {
                material_id: None,
                description: "木板".to_string(),
                unit: "块".to_string(),
                quantity: 10.0,
                unit_price: 0.0,
                total_price: 0.0,
                notes: None,
            }],
        });
        assert!(doc.contains_material("stage", "主舞台", "木板"));
        assert!(!doc.contains_material("stage", "主舞台", "铝型材"));
    }
}
