use serde_json::json;

use crate::tools::FunctionSpec;

/// Built-in command catalog handed to the parser.
pub fn default_catalog() -> Vec<FunctionSpec> {
    vec![
        FunctionSpec::new(
            "create_post",
            "Tạo bài post cho social media (Facebook, LinkedIn, Twitter)",
            json!({
                "type": "object",
                "properties": {
                    "topic": { "type": "string", "description": "Chủ đề bài post" },
                    "platform": {
                        "type": "string",
                        "enum": ["facebook", "linkedin", "twitter", "all"],
                        "description": "Nền tảng social media"
                    },
                    "tone": {
                        "type": "string",
                        "enum": ["professional", "casual", "friendly", "formal"]
                    },
                    "include_image": { "type": "boolean" },
                    "schedule": { "type": "string", "description": "ISO time or \"now\"" }
                },
                "required": ["topic", "platform"]
            }),
        ),
        FunctionSpec::new(
            "backup_database",
            "Backup database lên Google Drive",
            json!({
                "type": "object",
                "properties": {
                    "destination": { "type": "string", "enum": ["google_drive", "local"] },
                    "include_data": { "type": "boolean" }
                },
                "required": ["destination"]
            }),
        ),
        FunctionSpec::new(
            "generate_seo",
            "Tạo bài SEO cho từ khóa",
            json!({
                "type": "object",
                "properties": {
                    "keyword": { "type": "string" },
                    "word_count": { "type": "number" },
                    "count": { "type": "number" },
                    "tone": { "type": "string", "enum": ["professional", "casual", "friendly"] }
                },
                "required": ["keyword"]
            }),
        ),
        FunctionSpec::new(
            "get_stats",
            "Lấy thống kê và metrics",
            json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": ["today", "week", "month", "all"] },
                    "category": {
                        "type": "string",
                        "enum": ["workflows", "agents", "executions", "costs", "all"]
                    }
                },
                "required": ["type"]
            }),
        ),
        FunctionSpec::new(
            "create_workflow",
            "Tạo workflow mới từ mô tả",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "description": { "type": "string" },
                    "trigger": {
                        "type": "string",
                        "enum": ["manual", "scheduled", "webhook", "event"]
                    },
                    "steps": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["name", "description"]
            }),
        ),
        FunctionSpec::new(
            "schedule_post",
            "Lên lịch đăng bài post",
            json!({
                "type": "object",
                "properties": {
                    "post_id": { "type": "string" },
                    "schedule_time": { "type": "string" },
                    "platforms": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["facebook", "linkedin", "twitter"] }
                    }
                },
                "required": ["post_id", "schedule_time"]
            }),
        ),
    ]
}
