// ==========================================
// 会展搭建项目管理系统 - 物料归一化引擎
// ==========================================
// 职责: 把元素集合转为与顺序无关的规范形态, 供内容变化判定使用
// 键: `{element_type}|{name}`; 材料按 description 排序
// 纯函数, 无副作用
// ==========================================

use crate::domain::materials::ProjectElement;
use crate::domain::types::ElementCategory;
use serde::Serialize;
use std::collections::BTreeMap;

// ==========================================
// NormalizedMaterial - 归一化材料行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMaterial {
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    pub additional: bool,
}

// ==========================================
// NormalizedElement - 归一化元素
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedElement {
    pub element_type: String,
    pub category: ElementCategory,
    pub materials: Vec<NormalizedMaterial>,
}

// ==========================================
// Normalizer - 归一化引擎
// ==========================================
pub struct Normalizer;

impl Normalizer {
    /// 产出规范形态
    ///
    /// BTreeMap 保证键序稳定, serde 序列化结果可直接做确定性比较。
    /// camelCase / snake_case 两种输入编码在 DTO 反序列化阶段已统一,
    /// 此处只面对单一类型形态。
    pub fn normalize(elements: &[ProjectElement]) -> BTreeMap<String, NormalizedElement> {
        let mut map = BTreeMap::new();

        for element in elements {
            let mut materials: Vec<NormalizedMaterial> = element
                .materials
                .iter()
                .map(|m| NormalizedMaterial {
                    description: m.description.clone(),
                    unit: m.unit.clone(),
                    quantity: m.quantity,
                    additional: m.additional,
                })
                .collect();
            materials.sort_by(|a, b| a.description.cmp(&b.description));

            map.insert(
                element.normalize_key(),
                NormalizedElement {
                    element_type: element.element_type.clone(),
                    category: element.category,
                    materials,
                },
            );
        }

        map
    }
}
