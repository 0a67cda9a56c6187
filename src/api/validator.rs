// ==========================================
// 会展搭建项目管理系统 - 请求校验器
// ==========================================
// 职责: 在任何状态变更之前拒绝非法请求, 给出字段级违规明细
// ==========================================

use crate::api::error::{ApiError, ApiResult, FieldViolation};
use crate::domain::addition::AdditionMaterialLine;
use crate::domain::materials::ProjectElement;
use crate::domain::quote::MarginConfig;
use crate::domain::types::Department;

// ==========================================
// RequestValidator - 请求校验
// ==========================================
pub struct RequestValidator;

impl RequestValidator {
    /// 校验会签部门名
    ///
    /// # 返回
    /// - Ok(Department): 合法部门
    /// - Err(ApiError::InvalidInput): 非法部门名（任何状态变更之前拒绝）
    pub fn department(raw: &str) -> ApiResult<Department> {
        Department::parse(raw).ok_or_else(|| {
            ApiError::InvalidInput(format!(
                "非法部门名: {} (有效值: design / production / finance)",
                raw
            ))
        })
    }

    /// 校验物料清单保存负载的元素/材料字段
    pub fn material_elements(elements: &[ProjectElement]) -> ApiResult<()> {
        let mut violations = Vec::new();

        for (ei, element) in elements.iter().enumerate() {
            if element.element_type.trim().is_empty() {
                violations.push(FieldViolation {
                    field: format!("project_elements[{}].element_type", ei),
                    reason: "元素类型不能为空".to_string(),
                });
            }
            if element.name.trim().is_empty() {
                violations.push(FieldViolation {
                    field: format!("project_elements[{}].name", ei),
                    reason: "元素名称不能为空".to_string(),
                });
            }

            for (mi, material) in element.materials.iter().enumerate() {
                if material.description.trim().is_empty() {
                    violations.push(FieldViolation {
                        field: format!("project_elements[{}].materials[{}].description", ei, mi),
                        reason: "材料描述不能为空".to_string(),
                    });
                }
                // NaN 与负数都会落在这个分支
                if !(material.quantity >= 0.0) || !material.quantity.is_finite() {
                    violations.push(FieldViolation {
                        field: format!("project_elements[{}].materials[{}].quantity", ei, mi),
                        reason: "数量必须为非负数".to_string(),
                    });
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError {
                message: format!("物料清单负载存在 {} 处字段违规", violations.len()),
                violations,
            })
        }
    }

    /// 校验补充项负载
    pub fn addition_payload(title: &str, lines: &[AdditionMaterialLine]) -> ApiResult<()> {
        let mut violations = Vec::new();

        if title.trim().is_empty() {
            violations.push(FieldViolation {
                field: "title".to_string(),
                reason: "标题不能为空".to_string(),
            });
        }

        for (i, line) in lines.iter().enumerate() {
            if line.description.trim().is_empty() {
                violations.push(FieldViolation {
                    field: format!("materials[{}].description", i),
                    reason: "材料描述不能为空".to_string(),
                });
            }
            if !(line.quantity >= 0.0) || !line.quantity.is_finite() {
                violations.push(FieldViolation {
                    field: format!("materials[{}].quantity", i),
                    reason: "数量必须为非负数".to_string(),
                });
            }
            if !(line.unit_price >= 0.0) || !line.unit_price.is_finite() {
                violations.push(FieldViolation {
                    field: format!("materials[{}].unit_price", i),
                    reason: "单价必须为非负数".to_string(),
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError {
                message: format!("补充项负载存在 {} 处字段违规", violations.len()),
                violations,
            })
        }
    }

    /// 校验报价设置
    pub fn quote_settings(
        margins: &MarginConfig,
        discount: f64,
        vat_rate: f64,
    ) -> ApiResult<()> {
        let mut violations = Vec::new();

        let margin_fields = [
            ("margins.materials", margins.materials),
            ("margins.labour", margins.labour),
            ("margins.expenses", margins.expenses),
            ("margins.logistics", margins.logistics),
        ];
        for (field, value) in margin_fields {
            if !(value >= 0.0) || !value.is_finite() {
                violations.push(FieldViolation {
                    field: field.to_string(),
                    reason: "加成比例必须为非负数".to_string(),
                });
            }
        }

        if !(discount >= 0.0) || !discount.is_finite() {
            violations.push(FieldViolation {
                field: "discount".to_string(),
                reason: "折扣金额必须为非负数".to_string(),
            });
        }
        if !(vat_rate >= 0.0) || !vat_rate.is_finite() {
            violations.push(FieldViolation {
                field: "vat_rate".to_string(),
                reason: "税率必须为非负数".to_string(),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError {
                message: format!("报价设置存在 {} 处字段违规", violations.len()),
                violations,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::materials::ElementMaterial;
    use crate::domain::types::ElementCategory;

    #[test]
    fn test_department_validation() {
        assert!(RequestValidator::department("design").is_ok());
        assert!(RequestValidator::department("finance").is_ok());
        let err = RequestValidator::department("hr").unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_material_elements_field_violations() {
        let elements = vec![ProjectElement {
            element_id: None,
            element_type: "".to_string(),
            name: "主舞台".to_string(),
            category: ElementCategory::Production,
            dimensions: None,
            included: true,
            materials: vec![ElementMaterial {
                material_id: None,
                description: "".to_string(),
                unit: "件".to_string(),
                quantity: -1.0,
                included: true,
                additional: false,
                notes: None,
            }],
        }];

        match RequestValidator::material_elements(&elements) {
            Err(ApiError::ValidationError { violations, .. }) => {
                assert_eq!(violations.len(), 3);
                assert!(violations.iter().any(|v| v.field.ends_with("element_type")));
                assert!(violations.iter().any(|v| v.field.ends_with("description")));
                assert!(violations.iter().any(|v| v.field.ends_with("quantity")));
            }
            other => panic!("Expected ValidationError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_valid_elements_pass() {
        let elements = vec![ProjectElement {
            element_id: None,
            element_type: "stage".to_string(),
            name: "主舞台".to_string(),
            category: ElementCategory::Production,
            dimensions: None,
            included: true,
            materials: vec![],
        }];
        assert!(RequestValidator::material_elements(&elements).is_ok());
    }
}
