// ==========================================
// 会展搭建项目管理系统 - 内容变化判定引擎
// ==========================================
// 职责: 判定两次物料元素集合之间是否发生实质内容变化,
//       驱动签核重置策略
// 约束: 不允许漏报 (漏报会静默保留过期签核); 误报可容忍, 代价只是重新签核
// ==========================================

use crate::domain::materials::ProjectElement;
use crate::engine::normalizer::Normalizer;

// ==========================================
// ChangeDetector - 变化判定
// ==========================================
pub struct ChangeDetector;

impl ChangeDetector {
    /// 判定内容是否变化
    ///
    /// # 规则
    /// - 无既有单据 (首次保存) → false
    /// - 元素数量不同 → true (快路径)
    /// - 否则对两侧规范形态做确定性序列化后比较
    ///
    /// 浮点数量按精确序列化值比较, 不做近似相等处理。
    pub fn changed(existing: Option<&[ProjectElement]>, incoming: &[ProjectElement]) -> bool {
        let existing = match existing {
            Some(e) => e,
            None => return false,
        };

        let existing_norm = Normalizer::normalize(existing);
        let incoming_norm = Normalizer::normalize(incoming);

        if existing_norm.len() != incoming_norm.len() {
            return true;
        }

        // BTreeMap 键序稳定, 序列化结果可直接比较。
        // 序列化失败时两侧取不同的哨兵值, 结论落在 "已变化" 一侧 (不允许漏报)
        let existing_json =
            serde_json::to_string(&existing_norm).unwrap_or_else(|_| "<a>".to_string());
        let incoming_json =
            serde_json::to_string(&incoming_norm).unwrap_or_else(|_| "<b>".to_string());

        existing_json != incoming_json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::materials::ElementMaterial;
    use crate::domain::types::ElementCategory;

    fn material(desc: &str, qty: f64) -> ElementMaterial {
        ElementMaterial {
            material_id: None,
            description: desc.to_string(),
            unit: "件".to_string(),
            quantity: qty,
            included: true,
            additional: false,
            notes: None,
        }
    }

    fn element(name: &str, materials: Vec<ElementMaterial>) -> ProjectElement {
        ProjectElement {
            element_id: None,
            element_type: "stage".to_string(),
            name: name.to_string(),
            category: ElementCategory::Production,
            dimensions: None,
            included: true,
            materials,
        }
    }

    #[test]
    fn test_first_save_is_not_a_change() {
        let incoming = vec![element("主舞台", vec![material("木板", 10.0)])];
        assert!(!ChangeDetector::changed(None, &incoming));
    }

    #[test]
    fn test_identical_content_unchanged() {
        let a = vec![element("主舞台", vec![material("木板", 10.0)])];
        let b = vec![element("主舞台", vec![material("木板", 10.0)])];
        assert!(!ChangeDetector::changed(Some(&a), &b));
    }

    #[test]
    fn test_reordered_content_unchanged() {
        let a = vec![element("主舞台", vec![material("木板", 10.0), material("螺丝", 100.0)])];
        let b = vec![element("主舞台", vec![material("螺丝", 100.0), material("木板", 10.0)])];
        assert!(!ChangeDetector::changed(Some(&a), &b));
    }

    #[test]
    fn test_element_count_mismatch_fast_path() {
        let a = vec![element("主舞台", vec![])];
        let b = vec![element("主舞台", vec![]), element("副舞台", vec![])];
        assert!(ChangeDetector::changed(Some(&a), &b));
    }

    #[test]
    fn test_quantity_change_detected() {
        let a = vec![element("主舞台", vec![material("木板", 10.0)])];
        let b = vec![element("主舞台", vec![material("木板", 15.0)])];
        assert!(ChangeDetector::changed(Some(&a), &b));
    }

    #[test]
    fn test_additional_flag_change_detected() {
        let a = vec![element("主舞台", vec![material("木板", 10.0)])];
        let mut flagged = material("木板", 10.0);
        flagged.additional = true;
        let b = vec![element("主舞台", vec![flagged])];
        assert!(ChangeDetector::changed(Some(&a), &b));
    }
}
