// ==========================================
// 会展搭建项目管理系统 - 预算→报价转换引擎
// ==========================================
// 职责: 把完整预算投影为报价单据 (显式导入时整体重建, 非增量修补)
// 规则:
//   - 材料/费用/物流行: margin = base * margin%; final = base * (1 + margin%)
//   - 人工行定价不加成 (final = base)
//   - 汇总: subtotal → 折扣 → 增值税 → grand_total
//   - 金额在汇总点四舍五入到 2 位, 中间计算不取整
//   - 整体毛利率 = total_margin / total_base * 100, 基数为 0 时取 0
// 纯函数, 无副作用
// ==========================================

use crate::domain::budget::{BudgetDocument, BudgetLine};
use crate::domain::quote::{
    MarginConfig, QuoteDocument, QuoteLine, QuoteSection, QuoteTotals,
};
use chrono::{DateTime, Utc};

/// 四舍五入到 2 位小数
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ==========================================
// QuoteTransformer - 转换引擎
// ==========================================
pub struct QuoteTransformer;

impl QuoteTransformer {
    /// 预算 → 报价整体转换
    ///
    /// # 参数
    /// - quote_task_id: 报价任务
    /// - budget: 来源预算单据
    /// - margins: 分类加成比例（报价单可覆盖默认值）
    /// - discount: 折扣金额
    /// - vat_enabled / vat_rate: 增值税开关与税率（百分数）
    pub fn transform(
        quote_task_id: &str,
        budget: &BudgetDocument,
        margins: MarginConfig,
        discount: f64,
        vat_enabled: bool,
        vat_rate: f64,
        actor: &str,
        now: DateTime<Utc>,
    ) -> QuoteDocument {
        // 材料行: 元素拍平, 行描述带上元素名便于对客呈现
        let material_lines: Vec<QuoteLine> = budget
            .materials
            .iter()
            .flat_map(|element| {
                element.materials.iter().map(|m| {
                    Self::build_line(
                        format!("{} - {}", element.name, m.description),
                        m.unit.clone(),
                        m.quantity,
                        m.total_price,
                        margins.materials,
                    )
                })
            })
            .collect();

        let materials = Self::build_section(material_lines);
        let labour = Self::build_section(Self::lines_from(&budget.labour, 0.0));
        let expenses = Self::build_section(Self::lines_from(&budget.expenses, margins.expenses));
        let logistics = Self::build_section(Self::lines_from(&budget.logistics, margins.logistics));

        let total_base =
            materials.base_total + labour.base_total + expenses.base_total + logistics.base_total;
        let total_margin = materials.margin_total
            + labour.margin_total
            + expenses.margin_total
            + logistics.margin_total;
        let subtotal =
            materials.final_total + labour.final_total + expenses.final_total + logistics.final_total;

        let total_after_discount = subtotal - discount;
        let vat_amount = if vat_enabled {
            total_after_discount * vat_rate / 100.0
        } else {
            0.0
        };
        let grand_total = total_after_discount + vat_amount;

        let overall_margin_percentage = if total_base == 0.0 {
            0.0
        } else {
            total_margin / total_base * 100.0
        };

        let totals = QuoteTotals {
            subtotal: round2(subtotal),
            discount: round2(discount),
            total_after_discount: round2(total_after_discount),
            vat_amount: round2(vat_amount),
            grand_total: round2(grand_total),
            total_base: round2(total_base),
            total_margin: round2(total_margin),
            overall_margin_percentage: round2(overall_margin_percentage),
        };

        QuoteDocument {
            task_id: quote_task_id.to_string(),
            margins,
            discount,
            vat_enabled,
            vat_rate,
            materials: Self::round_section(materials),
            labour: Self::round_section(labour),
            expenses: Self::round_section(expenses),
            logistics: Self::round_section(logistics),
            totals,
            generated_from_task: Some(budget.task_id.clone()),
            generated_at: Some(now),
            updated_at: now,
            updated_by: Some(actor.to_string()),
        }
    }

    // ==========================================
    // 内部
    // ==========================================

    fn lines_from(lines: &[BudgetLine], margin_pct: f64) -> Vec<QuoteLine> {
        lines
            .iter()
            .map(|l| {
                Self::build_line(
                    l.description.clone(),
                    l.unit.clone(),
                    l.quantity,
                    l.total_price,
                    margin_pct,
                )
            })
            .collect()
    }

    fn build_line(
        description: String,
        unit: String,
        quantity: f64,
        base: f64,
        margin_pct: f64,
    ) -> QuoteLine {
        QuoteLine {
            description,
            unit,
            quantity,
            base_amount: base,
            margin_percentage: margin_pct,
            margin_amount: base * margin_pct / 100.0,
            final_price: base * (1.0 + margin_pct / 100.0),
        }
    }

    /// 分区汇总（未取整, 供上层继续累加）
    fn build_section(lines: Vec<QuoteLine>) -> QuoteSection {
        let base_total = lines.iter().map(|l| l.base_amount).sum();
        let margin_total = lines.iter().map(|l| l.margin_amount).sum();
        let final_total = lines.iter().map(|l| l.final_price).sum();
        QuoteSection {
            lines,
            base_total,
            margin_total,
            final_total,
        }
    }

    /// 汇总完成后对展示金额取整
    fn round_section(mut section: QuoteSection) -> QuoteSection {
        for line in &mut section.lines {
            line.base_amount = round2(line.base_amount);
            line.margin_amount = round2(line.margin_amount);
            line.final_price = round2(line.final_price);
        }
        section.base_total = round2(section.base_total);
        section.margin_total = round2(section.margin_total);
        section.final_total = round2(section.final_total);
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::budget::{BudgetElement, BudgetMaterial};
    use crate::domain::types::ElementCategory;

    fn budget_with_material(base: f64) -> BudgetDocument {
        let mut budget = BudgetDocument::empty("T-budget");
        budget.materials.push(BudgetElement {
            element_id: None,
            element_type: "stage".to_string(),
            name: "主舞台".to_string(),
            category: ElementCategory::Production,
            materials: vec![BudgetMaterial {
                material_id: None,
                description: "木板".to_string(),
                unit: "块".to_string(),
                quantity: 10.0,
                unit_price: base / 10.0,
                total_price: base,
                notes: None,
            }],
        });
        budget
    }

    fn line(desc: &str, total: f64) -> BudgetLine {
        BudgetLine {
            description: desc.to_string(),
            unit: "项".to_string(),
            quantity: 1.0,
            unit_price: total,
            total_price: total,
            notes: None,
        }
    }

    #[test]
    fn test_materials_margin_twenty_percent() {
        let quote = QuoteTransformer::transform(
            "T-quote",
            &budget_with_material(1000.0),
            MarginConfig::default(),
            0.0,
            false,
            13.0,
            "op",
            Utc::now(),
        );

        let line = &quote.materials.lines[0];
        assert_eq!(line.margin_amount, 200.0);
        assert_eq!(line.final_price, 1200.0);
        assert_eq!(quote.totals.subtotal, 1200.0);
        assert_eq!(quote.totals.grand_total, 1200.0);
    }

    #[test]
    fn test_labour_carries_zero_margin() {
        let mut budget = BudgetDocument::empty("T-budget");
        budget.labour.push(line("搭建工", 2400.0));

        let quote = QuoteTransformer::transform(
            "T-quote",
            &budget,
            MarginConfig::default(),
            0.0,
            false,
            13.0,
            "op",
            Utc::now(),
        );

        let l = &quote.labour.lines[0];
        assert_eq!(l.margin_percentage, 0.0);
        assert_eq!(l.margin_amount, 0.0);
        assert_eq!(l.final_price, 2400.0);
        // 人工基数仍计入整体毛利率分母
        assert_eq!(quote.totals.total_base, 2400.0);
        assert_eq!(quote.totals.overall_margin_percentage, 0.0);
    }

    #[test]
    fn test_discount_and_vat_aggregation() {
        let quote = QuoteTransformer::transform(
            "T-quote",
            &budget_with_material(1000.0),
            MarginConfig::default(),
            200.0,
            true,
            13.0,
            "op",
            Utc::now(),
        );

        // subtotal 1200 - 折扣 200 = 1000; 增值税 130; 总计 1130
        assert_eq!(quote.totals.total_after_discount, 1000.0);
        assert_eq!(quote.totals.vat_amount, 130.0);
        assert_eq!(quote.totals.grand_total, 1130.0);
    }

    #[test]
    fn test_vat_disabled_yields_zero() {
        let quote = QuoteTransformer::transform(
            "T-quote",
            &budget_with_material(1000.0),
            MarginConfig::default(),
            0.0,
            false,
            13.0,
            "op",
            Utc::now(),
        );
        assert_eq!(quote.totals.vat_amount, 0.0);
        assert_eq!(quote.totals.grand_total, quote.totals.total_after_discount);
    }

    #[test]
    fn test_empty_budget_has_zero_margin_percentage() {
        let quote = QuoteTransformer::transform(
            "T-quote",
            &BudgetDocument::empty("T-budget"),
            MarginConfig::default(),
            0.0,
            true,
            13.0,
            "op",
            Utc::now(),
        );
        assert_eq!(quote.totals.total_base, 0.0);
        assert_eq!(quote.totals.overall_margin_percentage, 0.0);
        assert_eq!(quote.totals.grand_total, 0.0);
    }

    #[test]
    fn test_rounding_happens_at_aggregation() {
        // 三行各 0.115 * 10% 加成 = 每行 margin 0.0115
        // 先加总 (0.0345) 再取整 → 0.03; 若逐行取整 (0.01*3) 会得到错误结果
        let mut budget = BudgetDocument::empty("T-budget");
        for i in 0..3 {
            budget.expenses.push(line(&format!("杂费{}", i), 0.115));
        }

        let quote = QuoteTransformer::transform(
            "T-quote",
            &budget,
            MarginConfig::default(),
            0.0,
            false,
            13.0,
            "op",
            Utc::now(),
        );

        assert_eq!(quote.expenses.margin_total, 0.03);
    }

    #[test]
    fn test_overall_margin_percentage() {
        // 材料 1000 基数 20% 加成, 毛利率 = 200 / 1000 * 100 = 20%
        let quote = QuoteTransformer::transform(
            "T-quote",
            &budget_with_material(1000.0),
            MarginConfig::default(),
            0.0,
            false,
            13.0,
            "op",
            Utc::now(),
        );
        assert_eq!(quote.totals.overall_margin_percentage, 20.0);
    }
}
