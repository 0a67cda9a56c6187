// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use expo_production_erp::api::SaveMaterialsRequest;
use expo_production_erp::domain::materials::{
    ElementMaterial, ProjectElement, ProjectInfo,
};
use expo_production_erp::domain::types::ElementCategory;

// ==========================================
// ElementMaterial 构建器
// ==========================================

pub struct MaterialBuilder {
    description: String,
    unit: String,
    quantity: f64,
    included: bool,
    additional: bool,
    notes: Option<String>,
}

impl MaterialBuilder {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            unit: "件".to_string(),
            quantity: 1.0,
            included: true,
            additional: false,
            notes: None,
        }
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.included = false;
        self
    }

    pub fn additional(mut self) -> Self {
        self.additional = true;
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn build(self) -> ElementMaterial {
        ElementMaterial {
            material_id: None,
            description: self.description,
            unit: self.unit,
            quantity: self.quantity,
            included: self.included,
            additional: self.additional,
            notes: self.notes,
        }
    }
}

// ==========================================
// ProjectElement 构建器
// ==========================================

pub struct ElementBuilder {
    element_type: String,
    name: String,
    category: ElementCategory,
    included: bool,
    materials: Vec<ElementMaterial>,
}

impl ElementBuilder {
    pub fn new(element_type: &str, name: &str) -> Self {
        Self {
            element_type: element_type.to_string(),
            name: name.to_string(),
            category: ElementCategory::Production,
            included: true,
            materials: Vec::new(),
        }
    }

    pub fn category(mut self, category: ElementCategory) -> Self {
        self.category = category;
        self
    }

    pub fn excluded(mut self) -> Self {
        self.included = false;
        self
    }

    pub fn material(mut self, material: ElementMaterial) -> Self {
        self.materials.push(material);
        self
    }

    pub fn build(self) -> ProjectElement {
        ProjectElement {
            element_id: None,
            element_type: self.element_type,
            name: self.name,
            category: self.category,
            dimensions: None,
            included: self.included,
            materials: self.materials,
        }
    }
}

// ==========================================
// 保存请求快捷构造
// ==========================================

pub fn save_request(elements: Vec<ProjectElement>) -> SaveMaterialsRequest {
    SaveMaterialsRequest {
        project_info: ProjectInfo {
            project_name: Some("测试展位项目".to_string()),
            client_name: Some("测试客户".to_string()),
            venue: None,
            setup_date: None,
            teardown_date: None,
            notes: None,
        },
        project_elements: elements,
        available_elements: None,
    }
}

/// 单元素单材料的最小保存请求
pub fn single_material_request(
    element_name: &str,
    description: &str,
    quantity: f64,
) -> SaveMaterialsRequest {
    save_request(vec![ElementBuilder::new("stage", element_name)
        .material(MaterialBuilder::new(description).quantity(quantity).build())
        .build()])
}
