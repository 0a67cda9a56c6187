// ==========================================
// 会展搭建项目管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键/忙等待）
// - 提供幂等建表入口, 避免"部分表存在/部分表缺失"的半初始化库
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 幂等建表（CREATE TABLE IF NOT EXISTS）
///
/// 覆盖核心协同管线的全部表:
/// 任务、物料单据（文档 + 元素/材料子行 + 部门签核行）、
/// 预算单据、补充项、报价单据、版本快照、操作日志、配置
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS task (
            task_id     TEXT PRIMARY KEY,
            enquiry_id  TEXT NOT NULL,
            task_type   TEXT NOT NULL,
            title       TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'pending',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_task_enquiry_type ON task(enquiry_id, task_type);

        CREATE TABLE IF NOT EXISTS materials_document (
            task_id                 TEXT PRIMARY KEY REFERENCES task(task_id),
            project_info_json       TEXT NOT NULL DEFAULT '{}',
            available_elements_json TEXT,
            revision                INTEGER NOT NULL DEFAULT 0,
            last_approval_at        TEXT,
            updated_at              TEXT NOT NULL,
            updated_by              TEXT
        );

        -- 元素/材料子行: 保存时整体替换 (先删后插, 与文档同事务)
        CREATE TABLE IF NOT EXISTS materials_element (
            element_id      TEXT PRIMARY KEY,
            task_id         TEXT NOT NULL REFERENCES materials_document(task_id) ON DELETE CASCADE,
            seq_no          INTEGER NOT NULL,
            element_type    TEXT NOT NULL,
            name            TEXT NOT NULL,
            category        TEXT NOT NULL DEFAULT 'production',
            dimensions_json TEXT,
            included        INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_materials_element_task ON materials_element(task_id, seq_no);

        CREATE TABLE IF NOT EXISTS materials_material (
            material_id TEXT PRIMARY KEY,
            element_id  TEXT NOT NULL REFERENCES materials_element(element_id) ON DELETE CASCADE,
            task_id     TEXT NOT NULL,
            seq_no      INTEGER NOT NULL,
            description TEXT NOT NULL,
            unit        TEXT NOT NULL DEFAULT '',
            quantity    REAL NOT NULL DEFAULT 0,
            included    INTEGER NOT NULL DEFAULT 1,
            additional  INTEGER NOT NULL DEFAULT 0,
            notes       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_materials_material_element ON materials_material(element_id, seq_no);
        CREATE INDEX IF NOT EXISTS idx_materials_material_task ON materials_material(task_id);

        -- 部门签核按行独立存储: 并发签核互不覆盖
        CREATE TABLE IF NOT EXISTS materials_approval (
            task_id     TEXT NOT NULL,
            department  TEXT NOT NULL,
            approved    INTEGER NOT NULL DEFAULT 0,
            approver    TEXT,
            approved_at TEXT,
            comment     TEXT,
            PRIMARY KEY (task_id, department)
        );

        CREATE TABLE IF NOT EXISTS budget_document (
            task_id              TEXT PRIMARY KEY REFERENCES task(task_id),
            materials_json       TEXT NOT NULL DEFAULT '[]',
            labour_json          TEXT NOT NULL DEFAULT '[]',
            expenses_json        TEXT NOT NULL DEFAULT '[]',
            logistics_json       TEXT NOT NULL DEFAULT '[]',
            imported_at          TEXT,
            imported_from_task   TEXT,
            manually_modified    INTEGER NOT NULL DEFAULT 0,
            import_metadata_json TEXT,
            updated_at           TEXT NOT NULL,
            updated_by           TEXT
        );

        CREATE TABLE IF NOT EXISTS budget_addition (
            addition_id        TEXT PRIMARY KEY,
            task_id            TEXT NOT NULL,
            title              TEXT NOT NULL,
            description        TEXT,
            status             TEXT NOT NULL,
            source             TEXT NOT NULL,
            source_element     TEXT,
            source_material_id TEXT,
            materials_json     TEXT NOT NULL DEFAULT '[]',
            amount             REAL NOT NULL DEFAULT 0,
            created_by         TEXT,
            created_at         TEXT NOT NULL,
            decided_by         TEXT,
            decided_at         TEXT,
            decision_notes     TEXT,
            updated_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_budget_addition_task ON budget_addition(task_id, status);
        CREATE INDEX IF NOT EXISTS idx_budget_addition_title ON budget_addition(task_id, title);

        CREATE TABLE IF NOT EXISTS quote_document (
            task_id      TEXT PRIMARY KEY REFERENCES task(task_id),
            payload_json TEXT NOT NULL,
            updated_at   TEXT NOT NULL,
            updated_by   TEXT
        );

        -- 版本快照: 只追加, 正常流程不修改/不删除
        CREATE TABLE IF NOT EXISTS document_version (
            version_id               TEXT PRIMARY KEY,
            task_id                  TEXT NOT NULL,
            document_kind            TEXT NOT NULL,
            version_no               INTEGER NOT NULL,
            label                    TEXT,
            payload_json             TEXT NOT NULL,
            linked_materials_version INTEGER,
            created_by               TEXT,
            created_at               TEXT NOT NULL,
            source_updated_at        TEXT,
            UNIQUE (task_id, document_kind, version_no)
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id    TEXT PRIMARY KEY,
            task_id      TEXT,
            action_type  TEXT NOT NULL,
            action_ts    TEXT NOT NULL,
            actor        TEXT NOT NULL,
            payload_json TEXT,
            detail       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_task_ts ON action_log(task_id, action_ts);
        CREATE INDEX IF NOT EXISTS idx_action_log_type_ts ON action_log(action_type, action_ts);

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key      TEXT NOT NULL,
            value    TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;
    Ok(())
}
