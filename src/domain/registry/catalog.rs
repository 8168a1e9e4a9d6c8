//! Built-in registry entries for the `tools` database.
//!
//! Used when no registry document is configured, and as fixtures in tests.

use super::{ActionDefinition, ParameterSpec, Registry, TableDefinition, ViewDefinition};
use crate::domain::shape::{FieldKind, FieldSpec, Shape};

pub const TOOLS_DATABASE: &str = "tools";

/// Attributes every persisted record carries.
pub fn shared_attributes() -> Shape {
    Shape::new(vec![
        FieldSpec::required("id", FieldKind::Integer).describe("Unique identifier"),
        FieldSpec::required("name", FieldKind::String),
        FieldSpec::optional("created_at", FieldKind::Timestamp),
        FieldSpec::optional("created_by", FieldKind::String),
        FieldSpec::optional("updated_at", FieldKind::Timestamp),
        FieldSpec::optional("updated_by", FieldKind::String),
        FieldSpec::optional("deleted_at", FieldKind::Timestamp)
            .nullable()
            .describe("Soft deletion date"),
    ])
}

fn tool_row() -> Shape {
    shared_attributes().extend(vec![
        FieldSpec::optional("description", FieldKind::String).nullable(),
        FieldSpec::required("category_id", FieldKind::Integer),
        FieldSpec::required("url", FieldKind::String),
        FieldSpec::required("status", FieldKind::String),
        FieldSpec::optional("icon", FieldKind::String).nullable(),
        FieldSpec::optional("category_name", FieldKind::String).nullable(),
        FieldSpec::optional("countries", FieldKind::Array).nullable(),
        FieldSpec::optional("purposes", FieldKind::Array).nullable(),
        FieldSpec::optional("languages", FieldKind::Array).nullable(),
    ])
}

const TOOLS_SQL: &str = "
SELECT
    t.*,
    (get_m2m_right_json(t.id, 'tool', 'country')) AS countries,
    (get_m2m_right_json(t.id, 'tool', 'purpose')) AS purposes,
    (get_m2m_right_json(t.id, 'tool', 'language')) AS languages,
    c.name AS category_name
FROM tool AS t
LEFT JOIN category AS c ON c.id = t.category_id
WHERE t.deleted_at IS NULL
ORDER BY t.name
";

const MY_TOOLS_SQL: &str = "
SELECT
    t.*,
    true AS is_favorite,
    c.name AS category_name
FROM tool AS t
LEFT JOIN category AS c ON c.id = t.category_id
INNER JOIN userprofile_m2m_tool AS umt ON umt.tool_id = t.id
INNER JOIN userprofile AS up ON up.id = umt.userprofile_id
WHERE up.email = '###UPN###'
ORDER BY t.name
";

const TOOLS_BY_CATEGORY_SQL: &str = "
SELECT t.*, c.name AS category_name
FROM tool AS t
LEFT JOIN category AS c ON c.id = t.category_id
WHERE t.deleted_at IS NULL AND c.name = '###P1###'
ORDER BY t.name
";

const COUNTRIES_SQL: &str = "
SELECT c.*, r.name AS region_name
FROM country AS c
LEFT JOIN region AS r ON r.id = c.region_id
WHERE c.deleted_at IS NULL
ORDER BY c.name
";

fn trace_output() -> Shape {
    shared_attributes().extend(vec![
        FieldSpec::optional("trace_data", FieldKind::Object),
        FieldSpec::required("affected_records", FieldKind::Object),
    ])
}

fn tenant_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::required("tenant", FieldKind::String),
        FieldSpec::required("searchindex", FieldKind::String),
        FieldSpec::required("name", FieldKind::String),
        FieldSpec::optional("description", FieldKind::String).nullable(),
        FieldSpec::optional("Translations", FieldKind::Object),
    ]
}

pub fn builtin() -> Registry {
    let mut reg = Registry::new();

    reg.register_view(
        "tools",
        ViewDefinition {
            database_name: TOOLS_DATABASE.to_string(),
            sql_template: TOOLS_SQL.to_string(),
            schema: tool_row(),
            parameters: Vec::new(),
        },
    );
    reg.register_view(
        "my_tools",
        ViewDefinition {
            database_name: TOOLS_DATABASE.to_string(),
            sql_template: MY_TOOLS_SQL.to_string(),
            schema: tool_row().extend(vec![FieldSpec::required("is_favorite", FieldKind::Boolean)]),
            parameters: Vec::new(),
        },
    );
    reg.register_view(
        "tools_by_category",
        ViewDefinition {
            database_name: TOOLS_DATABASE.to_string(),
            sql_template: TOOLS_BY_CATEGORY_SQL.to_string(),
            schema: tool_row(),
            parameters: vec![ParameterSpec {
                name: "category".to_string(),
                description: Some("Category name, pre-escaped".to_string()),
            }],
        },
    );
    reg.register_view(
        "countries",
        ViewDefinition {
            database_name: TOOLS_DATABASE.to_string(),
            sql_template: COUNTRIES_SQL.to_string(),
            schema: shared_attributes().extend(vec![
                FieldSpec::required("region_id", FieldKind::Integer),
                FieldSpec::optional("region_name", FieldKind::String).nullable(),
            ]),
            parameters: Vec::new(),
        },
    );

    reg.register_action(
        "tools",
        ActionDefinition {
            database_name: TOOLS_DATABASE.to_string(),
            function_name: "create_or_update_tool_view".to_string(),
            input_schema: Shape::any(),
            output_schema: trace_output(),
        },
    );
    reg.register_action(
        "userprofile_favourite",
        ActionDefinition {
            database_name: TOOLS_DATABASE.to_string(),
            function_name: "userprofile_m2m_tool_manage_view".to_string(),
            input_schema: Shape::new(vec![
                FieldSpec::required("email", FieldKind::String),
                FieldSpec::required("tool_id", FieldKind::Integer),
                FieldSpec::required("is_favorite", FieldKind::Boolean),
            ]),
            output_schema: trace_output(),
        },
    );

    reg.register_table(TableDefinition {
        database_name: TOOLS_DATABASE.to_string(),
        table_name: "country".to_string(),
        is_virtual: false,
        shape: Shape::new(tenant_fields())
            .extend(vec![FieldSpec::required("region_id", FieldKind::Integer)]),
    });
    reg.register_table(TableDefinition {
        database_name: TOOLS_DATABASE.to_string(),
        table_name: "region".to_string(),
        is_virtual: false,
        shape: Shape::new(tenant_fields()),
    });
    reg.register_table(TableDefinition {
        database_name: TOOLS_DATABASE.to_string(),
        table_name: "tool".to_string(),
        is_virtual: false,
        shape: Shape::new(tenant_fields()).extend(vec![
            FieldSpec::required("category_id", FieldKind::Integer),
            FieldSpec::required("url", FieldKind::String),
            FieldSpec::required("status", FieldKind::String),
            FieldSpec::optional("icon", FieldKind::String).nullable(),
        ]),
    });

    reg
}
