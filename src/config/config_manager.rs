// ==========================================
// 会展搭建项目管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 报价默认加成/税率经由 QuoteConfigProvider 注入, 测试可替换
// ==========================================

use crate::domain::quote::MarginConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 默认增值税率（百分数）
pub const DEFAULT_VAT_RATE: f64 = 13.0;

// ==========================================
// QuoteConfigProvider - 报价配置注入口
// ==========================================
pub trait QuoteConfigProvider: Send + Sync {
    /// 报价默认分类加成比例
    fn default_margins(&self) -> MarginConfig;

    /// 默认增值税率（百分数）
    fn vat_rate(&self) -> f64;
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入配置值（scope_id='global', upsert）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
               ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value"#,
            params![key, value],
        )?;

        Ok(())
    }

    /// 读取数值配置, 缺失或非法时取默认值
    fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        match self.get_config_value(key) {
            Ok(Some(raw)) => raw.trim().parse::<f64>().unwrap_or_else(|_| {
                tracing::warn!(key = key, value = %raw, "配置值非法, 使用默认值");
                default
            }),
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key = key, error = %e, "配置读取失败, 使用默认值");
                default
            }
        }
    }
}

impl QuoteConfigProvider for ConfigManager {
    fn default_margins(&self) -> MarginConfig {
        let defaults = MarginConfig::default();
        MarginConfig {
            materials: self.get_f64_or("quote/margin_materials", defaults.materials),
            labour: self.get_f64_or("quote/margin_labour", defaults.labour),
            expenses: self.get_f64_or("quote/margin_expenses", defaults.expenses),
            logistics: self.get_f64_or("quote/margin_logistics", defaults.logistics),
        }
    }

    fn vat_rate(&self) -> f64 {
        self.get_f64_or("quote/vat_rate", DEFAULT_VAT_RATE)
    }
}
