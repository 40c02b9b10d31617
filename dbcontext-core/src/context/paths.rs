//! On-disk layout of the context tree.
//!
//! ```text
//! <base>/context/connections/<connection>/databases/_databases.yml
//! <base>/.../databases/<database>/schemas/_schemas.yml
//! <base>/.../schemas/<schema>/_tables.yml
//! <base>/.../schemas/<schema>/<table>/<table>__columns.yml
//! <base>/.../schemas/<schema>/<table>/<table>__sample.xml
//! ```
//!
//! Every segment taken from a name (connection, database, schema, table) is
//! sanitized, so no name can climb out of the tree.

use std::path::{Path, PathBuf};

/// File listing the databases of a connection.
pub const DATABASES_FILE: &str = "_databases.yml";
/// File listing the schemas of a database.
pub const SCHEMAS_FILE: &str = "_schemas.yml";
/// File listing the tables of a schema.
pub const TABLES_FILE: &str = "_tables.yml";
/// Suffix of per-table column files.
pub const COLUMNS_SUFFIX: &str = "__columns.yml";
/// Suffix of per-table sample documents.
pub const SAMPLE_SUFFIX: &str = "__sample.xml";

/// Makes a catalog name safe as a single path segment: lower-case, with
/// `/`, `\`, spaces and `.` replaced by `_`.
pub fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ' ' | '.' => '_',
            other => other,
        })
        .collect()
}

/// Path builder rooted at one connection's directory.
#[derive(Debug, Clone)]
pub struct ContextLayout {
    connection_dir: PathBuf,
}

impl ContextLayout {
    /// Layout for `connection` under `base_dir`.
    pub fn new(base_dir: &Path, connection: &str) -> Self {
        Self {
            connection_dir: base_dir
                .join("context")
                .join("connections")
                .join(sanitize_name(connection)),
        }
    }

    /// `<connection>/databases`
    pub fn databases_dir(&self) -> PathBuf {
        self.connection_dir.join("databases")
    }

    /// `<connection>/databases/_databases.yml`
    pub fn databases_file(&self) -> PathBuf {
        self.databases_dir().join(DATABASES_FILE)
    }

    /// `<connection>/databases/<database>/schemas`
    pub fn schemas_dir(&self, database: &str) -> PathBuf {
        self.databases_dir()
            .join(sanitize_name(database))
            .join("schemas")
    }

    /// `.../schemas/_schemas.yml`
    pub fn schemas_file(&self, database: &str) -> PathBuf {
        self.schemas_dir(database).join(SCHEMAS_FILE)
    }

    /// `.../schemas/<schema>`
    pub fn schema_dir(&self, database: &str, schema: &str) -> PathBuf {
        self.schemas_dir(database).join(sanitize_name(schema))
    }

    /// `.../schemas/<schema>/_tables.yml`
    pub fn tables_file(&self, database: &str, schema: &str) -> PathBuf {
        self.schema_dir(database, schema).join(TABLES_FILE)
    }

    /// `.../schemas/<schema>/<table>`
    pub fn table_dir(&self, database: &str, schema: &str, table: &str) -> PathBuf {
        self.schema_dir(database, schema).join(sanitize_name(table))
    }

    /// `.../<table>/<table>__columns.yml`
    pub fn columns_file(&self, database: &str, schema: &str, table: &str) -> PathBuf {
        self.table_dir(database, schema, table)
            .join(format!("{}{}", sanitize_name(table), COLUMNS_SUFFIX))
    }

    /// `.../<table>/<table>__sample.xml`
    pub fn sample_file(&self, database: &str, schema: &str, table: &str) -> PathBuf {
        self.table_dir(database, schema, table)
            .join(format!("{}{}", sanitize_name(table), SAMPLE_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Sales Data"), "sales_data");
        assert_eq!(sanitize_name("a/b\\c.d"), "a_b_c_d");
        assert_eq!(sanitize_name("already_safe"), "already_safe");
    }

    #[test]
    fn test_layout_paths() {
        let layout = ContextLayout::new(Path::new("/work"), "Prod DB");
        assert_eq!(
            layout.databases_file(),
            PathBuf::from("/work/context/connections/prod_db/databases/_databases.yml")
        );
        assert_eq!(
            layout.tables_file("Analytics", "Public"),
            PathBuf::from(
                "/work/context/connections/prod_db/databases/analytics/schemas/public/_tables.yml"
            )
        );
        assert_eq!(
            layout.columns_file("analytics", "public", "Order.Items"),
            PathBuf::from(
                "/work/context/connections/prod_db/databases/analytics/schemas/public/\
                 order_items/order_items__columns.yml"
            )
        );
        assert!(
            layout
                .sample_file("analytics", "public", "users")
                .ends_with("users/users__sample.xml")
        );
    }

    #[test]
    fn test_connection_name_stays_inside_tree() {
        let layout = ContextLayout::new(Path::new("/work"), "../../etc");
        let root = Path::new("/work/context/connections");
        let databases = layout.databases_dir();
        assert!(databases.starts_with(root));
        assert!(
            databases
                .strip_prefix(root)
                .unwrap()
                .components()
                .all(|c| matches!(c, std::path::Component::Normal(_)))
        );
        assert_eq!(databases, root.join("______etc").join("databases"));
    }
}
