//! Message catalog for page titles, labels and flash messages.

use std::collections::HashMap;

use lazy_static::lazy_static;

lazy_static! {
    static ref CATALOG: HashMap<&'static str, &'static str> = HashMap::from([
        ("title.users.list", "Users"),
        ("title.users.create", "Add User"),
        ("title.users.update", "Edit User"),
        ("response.users.create", "User has been created."),
        ("response.users.update", "User has been updated."),
        ("response.users.delete", "User has been deleted."),
        ("response.db-failed", "Unable to save to database: :error"),
        ("label.users.fullname", "Full Name"),
        ("label.users.email", "E-mail Address"),
        ("label.users.password", "Password"),
        ("label.users.roles", "Roles"),
        ("label.edit", "Edit"),
        ("label.delete", "Delete"),
    ]);
}

/// Look up `key` and substitute `:name` placeholders.
///
/// Unknown keys translate to themselves so a missing entry stays visible.
pub fn trans(key: &str, replacements: &[(&str, &str)]) -> String {
    let mut line = CATALOG.get(key).copied().unwrap_or(key).to_string();
    for (name, value) in replacements {
        line = line.replace(&format!(":{}", name), value);
    }
    line
}
