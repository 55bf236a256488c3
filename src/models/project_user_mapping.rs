use serde::Serialize;

/// Assignment of a person to a project for one month
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct ProjectUserMapping {
    pub project_code: String,
    pub department: String,
    pub role_type: String,
    pub position: String,
    pub name: String,
    pub month: String,
}
