// ==========================================
// 会展搭建项目管理系统 - 物料→预算同步引擎
// ==========================================
// 职责: 把已全签核的物料清单投影进预算物料区, 与既有预算数据合并
// 不变式:
//   - 只投影 included 元素下 included 且非 additional 的材料
//   - 合并键 `{element_type}_{name}_{description}` 命中时保留已录入单价,
//     行合计按新数量重算 —— 数量变化绝不抹掉历史单价
//   - 幂等: 同一输入跑两遍, 物料区输出完全一致
// ==========================================

use crate::domain::budget::{
    budget_material_key, BudgetDocument, BudgetElement, BudgetMaterial, ImportMetadata,
};
use crate::domain::materials::MaterialsDocument;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// ==========================================
// MaterialsBudgetSynchronizer - 同步引擎
// ==========================================
pub struct MaterialsBudgetSynchronizer;

impl MaterialsBudgetSynchronizer {
    /// 投影并合并
    ///
    /// # 参数
    /// - existing: 既有预算单据（价格历史的来源）
    /// - materials_doc: 已全签核的物料清单
    /// - source_task_title: 来源物料任务标题（溯源信息）
    /// - actor: 操作人
    /// - now: 同步时间
    ///
    /// # 返回
    /// 合并后的完整预算单据（人工/费用/物流区原样保留）
    pub fn synchronize(
        existing: &BudgetDocument,
        materials_doc: &MaterialsDocument,
        source_task_title: Option<&str>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> BudgetDocument {
        // 历史单价查找表
        let mut price_lookup: HashMap<String, f64> = HashMap::new();
        for element in &existing.materials {
            for material in &element.materials {
                price_lookup.insert(
                    budget_material_key(&element.element_type, &element.name, &material.description),
                    material.unit_price,
                );
            }
        }

        let mut merged_elements: Vec<BudgetElement> = Vec::new();
        let mut material_count = 0usize;

        for element in &materials_doc.elements {
            if !element.included {
                continue;
            }

            let materials: Vec<BudgetMaterial> = element
                .materials
                .iter()
                .filter(|m| m.included && !m.additional)
                .map(|m| {
                    let key =
                        budget_material_key(&element.element_type, &element.name, &m.description);
                    let unit_price = price_lookup.get(&key).copied().unwrap_or(0.0);
                    BudgetMaterial {
                        material_id: m.material_id.clone(),
                        description: m.description.clone(),
                        unit: m.unit.clone(),
                        quantity: m.quantity,
                        unit_price,
                        // 数量来自新快照, 单价来自历史
                        total_price: m.quantity * unit_price,
                        notes: m.notes.clone(),
                    }
                })
                .collect();

            // 没有可同步材料的元素不进入预算物料区
            if materials.is_empty() {
                continue;
            }

            material_count += materials.len();
            merged_elements.push(BudgetElement {
                element_id: element.element_id.clone(),
                element_type: element.element_type.clone(),
                name: element.name.clone(),
                category: element.category,
                materials,
            });
        }

        let element_count = merged_elements.len();

        BudgetDocument {
            task_id: existing.task_id.clone(),
            materials: merged_elements,
            labour: existing.labour.clone(),
            expenses: existing.expenses.clone(),
            logistics: existing.logistics.clone(),
            imported_at: Some(now),
            imported_from_task: Some(materials_doc.task_id.clone()),
            manually_modified: false,
            import_metadata: ImportMetadata {
                source_task_title: source_task_title.map(|s| s.to_string()),
                element_count,
                material_count,
            },
            updated_at: now,
            updated_by: Some(actor.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::materials::{ElementMaterial, ProjectElement, ProjectInfo};
    use crate::domain::materials::ApprovalStatus;
    use crate::domain::types::ElementCategory;

    fn material(desc: &str, qty: f64, included: bool, additional: bool) -> ElementMaterial {
        ElementMaterial {
            material_id: Some(format!("m-{}", desc)),
            description: desc.to_string(),
            unit: "件".to_string(),
            quantity: qty,
            included,
            additional,
            notes: None,
        }
    }

    fn materials_doc(elements: Vec<ProjectElement>) -> MaterialsDocument {
        MaterialsDocument {
            task_id: "T-materials".to_string(),
            project_info: ProjectInfo::default(),
            elements,
            available_elements: None,
            approval_status: ApprovalStatus::unapproved(),
            revision: 1,
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    fn element(name: &str, included: bool, materials: Vec<ElementMaterial>) -> ProjectElement {
        ProjectElement {
            element_id: Some(format!("e-{}", name)),
            element_type: "stage".to_string(),
            name: name.to_string(),
            category: ElementCategory::Production,
            dimensions: None,
            included,
            materials,
        }
    }

    #[test]
    fn test_projection_filters_excluded_and_additional() {
        let doc = materials_doc(vec![
            element(
                "主舞台",
                true,
                vec![
                    material("木板", 10.0, true, false),
                    material("补充灯架", 2.0, true, true), // additional 不进预算
                    material("备用板", 3.0, false, false), // 未计入不进预算
                ],
            ),
            element("废弃元素", false, vec![material("木板", 1.0, true, false)]),
        ]);

        let existing = BudgetDocument::empty("T-budget");
        let merged =
            MaterialsBudgetSynchronizer::synchronize(&existing, &doc, Some("物料清单"), "op", Utc::now());

        assert_eq!(merged.materials.len(), 1);
        assert_eq!(merged.materials[0].materials.len(), 1);
        assert_eq!(merged.materials[0].materials[0].description, "木板");
        assert_eq!(merged.import_metadata.element_count, 1);
        assert_eq!(merged.import_metadata.material_count, 1);
    }

    #[test]
    fn test_price_preserved_on_quantity_change() {
        // 既有预算: Banner 单价 500, 数量 2
        let mut existing = BudgetDocument::empty("T-budget");
        existing.materials.push(BudgetElement {
            element_id: None,
            element_type: "stage".to_string(),
            name: "主舞台".to_string(),
            category: ElementCategory::Production,
            materials: vec![BudgetMaterial {
                material_id: None,
                description: "Banner".to_string(),
                unit: "件".to_string(),
                quantity: 2.0,
                unit_price: 500.0,
                total_price: 1000.0,
                notes: None,
            }],
        });

        // 重新同步: 数量改为 5
        let doc = materials_doc(vec![element(
            "主舞台",
            true,
            vec![material("Banner", 5.0, true, false)],
        )]);

        let merged =
            MaterialsBudgetSynchronizer::synchronize(&existing, &doc, None, "op", Utc::now());

        let line = &merged.materials[0].materials[0];
        assert_eq!(line.unit_price, 500.0);
        assert_eq!(line.total_price, 2500.0);
    }

    #[test]
    fn test_new_material_gets_zero_price() {
        let existing = BudgetDocument::empty("T-budget");
        let doc = materials_doc(vec![element(
            "主舞台",
            true,
            vec![material("木板", 10.0, true, false)],
        )]);

        let merged =
            MaterialsBudgetSynchronizer::synchronize(&existing, &doc, None, "op", Utc::now());
        let line = &merged.materials[0].materials[0];
        assert_eq!(line.unit_price, 0.0);
        assert_eq!(line.total_price, 0.0);
    }

    #[test]
    fn test_synchronize_is_idempotent_on_materials_section() {
        let mut existing = BudgetDocument::empty("T-budget");
        existing.materials.push(BudgetElement {
            element_id: None,
            element_type: "stage".to_string(),
            name: "主舞台".to_string(),
            category: ElementCategory::Production,
            materials: vec![BudgetMaterial {
                material_id: None,
                description: "木板".to_string(),
                unit: "块".to_string(),
                quantity: 10.0,
                unit_price: 120.0,
                total_price: 1200.0,
                notes: None,
            }],
        });

        let doc = materials_doc(vec![element(
            "主舞台",
            true,
            vec![material("木板", 10.0, true, false)],
        )]);

        let now = Utc::now();
        let first = MaterialsBudgetSynchronizer::synchronize(&existing, &doc, None, "op", now);
        let second = MaterialsBudgetSynchronizer::synchronize(&first, &doc, None, "op", now);

        assert_eq!(
            serde_json::to_string(&first.materials).unwrap(),
            serde_json::to_string(&second.materials).unwrap()
        );
    }

    #[test]
    fn test_labour_and_expense_sections_untouched() {
        let mut existing = BudgetDocument::empty("T-budget");
        existing.labour.push(crate::domain::budget::BudgetLine {
            description: "搭建工".to_string(),
            unit: "人天".to_string(),
            quantity: 6.0,
            unit_price: 400.0,
            total_price: 2400.0,
            notes: None,
        });

        let doc = materials_doc(vec![element(
            "主舞台",
            true,
            vec![material("木板", 10.0, true, false)],
        )]);

        let merged =
            MaterialsBudgetSynchronizer::synchronize(&existing, &doc, None, "op", Utc::now());
        assert_eq!(merged.labour.len(), 1);
        assert_eq!(merged.labour[0].total_price, 2400.0);
    }
}
