//! Listing table and edit form descriptors, plus the hooks other
//! components use to extend them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::events::Channel;
use crate::i18n::trans;
use crate::users::dto::{EditedUser, Profile};
use crate::users::repo_types::{Role, UserWithRoles};

type CellFn = Box<dyn Fn(&UserWithRoles) -> Value + Send + Sync>;

struct ColumnDef {
    name: String,
    label: String,
    cell: CellFn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub label: String,
}

pub type Row = BTreeMap<String, Value>;

/// Rendered listing table.
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

/// Column set of the user listing, rendered against a page of users.
#[derive(Default)]
pub struct TableBuilder {
    columns: Vec<ColumnDef>,
    extra_rows: Vec<Row>,
}

impl TableBuilder {
    /// Base columns: name, e-mail and roles.
    pub fn users() -> Self {
        let mut table = Self::default();
        table
            .column("fullname", &trans("label.users.fullname", &[]), |u| {
                json!(u.user.fullname)
            })
            .column("email", &trans("label.users.email", &[]), |u| {
                json!(u.user.email)
            })
            .column("roles", &trans("label.users.roles", &[]), |u| {
                json!(u.roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>())
            });
        table
    }

    pub fn column<F>(&mut self, name: &str, label: &str, cell: F) -> &mut Self
    where
        F: Fn(&UserWithRoles) -> Value + Send + Sync + 'static,
    {
        self.columns.push(ColumnDef {
            name: name.into(),
            label: label.into(),
            cell: Box::new(cell),
        });
        self
    }

    /// Append a free-form row after the user rows.
    pub fn row(&mut self, row: Row) -> &mut Self {
        self.extra_rows.push(row);
        self
    }

    /// Append the trailing edit and delete link columns.
    pub fn actions(&mut self, config: &AppConfig) -> &mut Self {
        let edit_base = config.handles("users");
        let delete_base = edit_base.clone();
        self.column("edit", &trans("label.edit", &[]), move |u| {
            json!(format!("{}/{}/edit", edit_base, u.user.id))
        })
        .column("delete", &trans("label.delete", &[]), move |u| {
            json!(format!("{}/{}/delete", delete_base, u.user.id))
        })
    }

    #[cfg(test)]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn build(&self, users: &[UserWithRoles]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                label: c.label.clone(),
            })
            .collect();
        let mut rows: Vec<Row> = users
            .iter()
            .map(|u| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), (c.cell)(u)))
                    .collect()
            })
            .collect();
        rows.extend(self.extra_rows.iter().cloned());
        Table { columns, rows }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Select { multiple: bool, options: Vec<Role> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub value: Value,
}

/// Edit form descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct Form {
    pub mode: &'static str,
    pub action: String,
    pub method: &'static str,
    pub fields: Vec<Field>,
}

impl Form {
    /// Build the user form. Values come from `old_input` when a previous
    /// submission was rejected, otherwise from `user`. Passwords are never
    /// filled in.
    pub fn user(
        config: &AppConfig,
        user: &EditedUser,
        mode: Profile,
        roles: &[Role],
        old_input: Option<&Value>,
    ) -> Self {
        let (action, method) = match (mode, user.id) {
            (Profile::Update, Some(id)) => (config.handles(&format!("users/{}", id)), "PUT"),
            _ => (config.handles("users"), "POST"),
        };
        let old = |name: &str| old_input.and_then(|v| v.get(name)).cloned();
        let selected: Vec<i64> = user.roles.iter().map(|r| r.id).collect();

        let mut form = Self {
            mode: mode.as_str(),
            action,
            method,
            fields: Vec::new(),
        };
        form.field(
            "fullname",
            &trans("label.users.fullname", &[]),
            FieldKind::Text,
            old("fullname").unwrap_or_else(|| json!(user.fullname)),
        )
        .field(
            "email",
            &trans("label.users.email", &[]),
            FieldKind::Email,
            old("email").unwrap_or_else(|| json!(user.email)),
        )
        .field(
            "password",
            &trans("label.users.password", &[]),
            FieldKind::Password,
            json!(""),
        )
        .field(
            "roles",
            &trans("label.users.roles", &[]),
            FieldKind::Select {
                multiple: true,
                options: roles.to_vec(),
            },
            old("roles").unwrap_or_else(|| json!(selected)),
        );
        form
    }

    pub fn field(&mut self, name: &str, label: &str, kind: FieldKind, value: Value) -> &mut Self {
        self.fields.push(Field {
            name: name.into(),
            label: label.into(),
            kind,
            value,
        });
        self
    }
}

/// Adds columns or rows to the user listing.
/// `users` is the page being listed.
pub trait TableExtension: Send + Sync {
    fn extend(&self, users: &[UserWithRoles], table: &mut TableBuilder);
}

impl<F> TableExtension for F
where
    F: Fn(&[UserWithRoles], &mut TableBuilder) + Send + Sync,
{
    fn extend(&self, users: &[UserWithRoles], table: &mut TableBuilder) {
        self(users, table)
    }
}

/// Adds fields to the user form. Called once per [`Channel`].
pub trait FormExtension: Send + Sync {
    fn extend(&self, channel: Channel, user: &EditedUser, form: &mut Form);
}

impl<F> FormExtension for F
where
    F: Fn(Channel, &EditedUser, &mut Form) + Send + Sync,
{
    fn extend(&self, channel: Channel, user: &EditedUser, form: &mut Form) {
        self(channel, user, form)
    }
}

/// Registered presenter extensions, run in registration order.
#[derive(Default, Clone)]
pub struct UserExtensions {
    tables: Vec<Arc<dyn TableExtension>>,
    forms: Vec<Arc<dyn FormExtension>>,
}

impl UserExtensions {
    pub fn on_table(&mut self, ext: impl TableExtension + 'static) -> &mut Self {
        self.tables.push(Arc::new(ext));
        self
    }

    pub fn on_form(&mut self, ext: impl FormExtension + 'static) -> &mut Self {
        self.forms.push(Arc::new(ext));
        self
    }

    pub fn extend_table(&self, users: &[UserWithRoles], table: &mut TableBuilder) {
        for ext in &self.tables {
            ext.extend(users, table);
        }
    }

    pub fn extend_form(&self, user: &EditedUser, form: &mut Form) {
        for channel in Channel::ALL {
            for ext in &self.forms {
                ext.extend(channel, user, form);
            }
        }
    }
}
