//! Built-in catalog: categories, genres, cast members and videos.

use crate::config::types::*;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Default upper bound for an uploaded video, in KiB (50 GB).
pub const DEFAULT_VIDEO_MAX_KB: u64 = 50_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i16)]
pub enum CastMemberType {
    Director = 1,
    Actor = 2,
}

impl CastMemberType {
    pub const ALL: [CastMemberType; 2] = [CastMemberType::Director, CastMemberType::Actor];

    pub fn code(self) -> i16 {
        self as i16
    }
}

/// Content rating classes accepted for a video.
pub const RATINGS: [&str; 6] = ["L", "10", "12", "14", "16", "18"];

fn rules(entries: Vec<(&str, ValidationRule)>) -> HashMap<String, ValidationRule> {
    entries
        .into_iter()
        .map(|(name, rule)| (name.to_string(), rule))
        .collect()
}

fn name_rule() -> ValidationRule {
    ValidationRule::of(ValueKind::String).required().max_length(255)
}

fn category() -> EntityConfig {
    EntityConfig {
        name: "category".into(),
        table: "categories".into(),
        path_segment: "categories".into(),
        soft_delete: true,
        columns: vec![
            ColumnConfig::new("name", ColumnType::String).not_null(),
            ColumnConfig::new("description", ColumnType::Text),
            ColumnConfig::new("is_active", ColumnType::Boolean)
                .not_null()
                .default_value(Value::Bool(true)),
        ],
        validation: rules(vec![
            ("name", name_rule()),
            ("description", ValidationRule::of(ValueKind::String).nullable()),
            ("is_active", ValidationRule::of(ValueKind::Boolean)),
        ]),
        relations: Vec::new(),
        files: Vec::new(),
    }
}

fn genre() -> EntityConfig {
    EntityConfig {
        name: "genre".into(),
        table: "genres".into(),
        path_segment: "genres".into(),
        soft_delete: true,
        columns: vec![
            ColumnConfig::new("name", ColumnType::String).not_null(),
            ColumnConfig::new("is_active", ColumnType::Boolean)
                .not_null()
                .default_value(Value::Bool(true)),
        ],
        validation: rules(vec![
            ("name", name_rule()),
            ("is_active", ValidationRule::of(ValueKind::Boolean)),
        ]),
        relations: vec![RelationConfig {
            field: "categories_id".into(),
            related: "categories".into(),
            pivot_table: "category_genre".into(),
            owner_key: "genre_id".into(),
            related_key: "category_id".into(),
            required: false,
        }],
        files: Vec::new(),
    }
}

fn cast_member() -> EntityConfig {
    let types: Vec<Value> = CastMemberType::ALL.iter().map(|t| json!(t.code())).collect();
    EntityConfig {
        name: "cast_member".into(),
        table: "cast_members".into(),
        path_segment: "cast_members".into(),
        soft_delete: true,
        columns: vec![
            ColumnConfig::new("name", ColumnType::String).not_null(),
            ColumnConfig::new("type", ColumnType::SmallInt).not_null(),
        ],
        validation: rules(vec![
            ("name", name_rule()),
            (
                "type",
                ValidationRule::of(ValueKind::Integer).required().allowed(types),
            ),
        ]),
        relations: Vec::new(),
        files: Vec::new(),
    }
}

fn video(video_max_kb: u64) -> EntityConfig {
    let ratings: Vec<Value> = RATINGS.iter().map(|r| json!(r)).collect();
    EntityConfig {
        name: "video".into(),
        table: "videos".into(),
        path_segment: "videos".into(),
        soft_delete: true,
        columns: vec![
            ColumnConfig::new("title", ColumnType::String).not_null(),
            ColumnConfig::new("description", ColumnType::Text).not_null(),
            ColumnConfig::new("year_launched", ColumnType::SmallInt).not_null(),
            ColumnConfig::new("opened", ColumnType::Boolean)
                .not_null()
                .default_value(Value::Bool(false)),
            ColumnConfig::new("rating", ColumnType::String).not_null(),
            ColumnConfig::new("duration", ColumnType::Integer).not_null(),
            ColumnConfig::new("video_file", ColumnType::String),
        ],
        validation: rules(vec![
            ("title", name_rule()),
            ("description", ValidationRule::of(ValueKind::String).required()),
            (
                "year_launched",
                ValidationRule::of(ValueKind::Integer).required().format("year"),
            ),
            ("opened", ValidationRule::of(ValueKind::Boolean)),
            (
                "rating",
                ValidationRule::of(ValueKind::String).required().allowed(ratings),
            ),
            (
                "duration",
                ValidationRule::of(ValueKind::Integer).required().minimum(1.0),
            ),
        ]),
        relations: vec![
            RelationConfig {
                field: "categories_id".into(),
                related: "categories".into(),
                pivot_table: "category_video".into(),
                owner_key: "video_id".into(),
                related_key: "category_id".into(),
                required: true,
            },
            RelationConfig {
                field: "genres_id".into(),
                related: "genres".into(),
                pivot_table: "genre_video".into(),
                owner_key: "video_id".into(),
                related_key: "genre_id".into(),
                required: true,
            },
        ],
        files: vec![FileFieldConfig {
            field: "video_file".into(),
            mime_types: vec!["video/mp4".into()],
            max_kb: video_max_kb,
        }],
    }
}

/// The catalog served when no `CATALOG_CONFIG` file is given.
pub fn builtin(video_max_kb: u64) -> CatalogConfig {
    CatalogConfig {
        entities: vec![category(), genre(), cast_member(), video(video_max_kb)],
    }
}
