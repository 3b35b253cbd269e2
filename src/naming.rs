//! Column-name cleaning applied to every table before it is written or merged.

use crate::table::Table;
use crate::types::{MergeKeySet, Result};

/// Leading character SPSS does not accept in a variable name
pub const RESERVED_MARKER: char = '_';

/// Replaces the reserved marker at the start of a name
pub const RESERVED_PREFIX: &str = "v";

/// Separator between a file prefix and the column name
pub const FILE_PREFIX_SEPARATOR: &str = "_";

/// Clean a single column name.
///
/// Steps, in order:
/// 1. a leading `_` is replaced by `v`;
/// 2. a case-insensitive match against `keys` becomes the canonical key name;
/// 3. non-key names get `<file_prefix>_` prepended when a prefix is given.
pub fn clean_column_name(name: &str, keys: &MergeKeySet, file_prefix: Option<&str>) -> String {
    let name = match name.strip_prefix(RESERVED_MARKER) {
        Some(rest) => format!("{}{}", RESERVED_PREFIX, rest),
        None => name.to_string(),
    };

    if let Some(canonical) = keys.canonical(&name) {
        return canonical.to_string();
    }

    match file_prefix {
        Some(prefix) => format!("{}{}{}", prefix, FILE_PREFIX_SEPARATOR, name),
        None => name,
    }
}

/// Clean every column name of `table`, preserving column order and cells.
///
/// Fails with `DuplicateColumn` when two cleaned names collide.
pub fn clean_columns(table: Table, keys: &MergeKeySet, file_prefix: Option<&str>) -> Result<Table> {
    let names = table
        .column_names()
        .into_iter()
        .map(|name| clean_column_name(name, keys, file_prefix))
        .collect();

    table.rename_columns(names)
}
