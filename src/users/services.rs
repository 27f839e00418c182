use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::events::Phase;
use crate::flash::Level;
use crate::i18n::trans;
use crate::state::AppState;
use crate::users::dto::{field_errors, EditedUser, ListQuery, Profile, UserInput};
use crate::users::presenter::{Form, TableBuilder};
use crate::users::repo_types::{UserDraft, UserFilter, UserSnapshot, UserStatus};
use crate::view::View;

pub const PER_PAGE: i64 = 30;

/// Page of users as a table, plus the role list for the filter UI.
#[instrument(skip(state))]
pub async fn list(state: &AppState, actor_id: i64, query: &ListQuery) -> AppResult<View> {
    let filter = UserFilter {
        keyword: query.q.clone(),
        role_ids: query.role_ids()?,
    };
    let users = state
        .users
        .paginate(&filter, query.page(), PER_PAGE)
        .await?;

    let mut table = TableBuilder::users();
    state.extensions.extend_table(&users.items, &mut table);
    table.actions(&state.config);
    let rendered = table.build(&users.items);

    let roles: serde_json::Map<String, serde_json::Value> = state
        .users
        .list_roles()
        .await?
        .into_iter()
        .map(|r| (r.id.to_string(), json!(r.name)))
        .collect();

    let bag = state.flash.take(actor_id).await;
    Ok(View::make("users.index", trans("title.users.list", &[]))
        .with("eloquent", &users)?
        .with("table", &rendered)?
        .with("roles", &roles)?
        .with_flash(bag))
}

/// Blank form for a new account.
pub async fn new_form(state: &AppState, actor_id: i64) -> AppResult<View> {
    let draft = UserDraft::new_unverified();
    let user = EditedUser {
        id: None,
        fullname: draft.fullname,
        email: draft.email,
        status: draft.status,
        roles: Vec::new(),
    };
    form_view(state, actor_id, user, Profile::Create).await
}

/// Form pre-filled with an existing account.
pub async fn edit_form(state: &AppState, actor_id: i64, id: i64) -> AppResult<View> {
    let found = state.users.find(id).await?.ok_or(AppError::NotFound)?;
    let roles = state.users.roles_of(id).await?;
    let user = EditedUser {
        id: Some(found.id),
        fullname: found.fullname,
        email: found.email,
        status: found.status,
        roles,
    };
    form_view(state, actor_id, user, Profile::Update).await
}

async fn form_view(
    state: &AppState,
    actor_id: i64,
    user: EditedUser,
    mode: Profile,
) -> AppResult<View> {
    let roles = state.users.list_roles().await?;
    let bag = state.flash.take(actor_id).await;

    let mut form = Form::user(&state.config, &user, mode, &roles, bag.old_input.as_ref());
    state.extensions.extend_form(&user, &mut form);

    let title = match mode {
        Profile::Create => trans("title.users.create", &[]),
        Profile::Update => trans("title.users.update", &[]),
    };
    Ok(View::make("users.edit", title)
        .with("eloquent", &user)?
        .with("form", &form)?
        .with_flash(bag))
}

/// Keep the rejected submission for the redisplayed form.
async fn reject(
    state: &AppState,
    actor_id: i64,
    input: &UserInput,
    errors: &validator::ValidationErrors,
) -> AppResult<()> {
    let old = serde_json::to_value(input.without_password()).map_err(anyhow::Error::from)?;
    state
        .flash
        .with_input(actor_id, old, field_errors(errors))
        .await;
    Ok(())
}

/// Validate and create an account. Returns where to redirect.
#[instrument(skip(state, input), fields(email = %input.email))]
pub async fn create(state: &AppState, actor_id: i64, input: UserInput) -> AppResult<String> {
    if let Err(errors) = input.validate_for(Profile::Create) {
        warn!(invalid = ?errors.field_errors().keys().collect::<Vec<_>>(), "create rejected");
        reject(state, actor_id, &input, &errors).await?;
        return Ok(state.config.handles("users/create"));
    }

    let draft = UserDraft::new_unverified();
    persist(state, actor_id, draft, &input, Profile::Create).await;

    Ok(state.config.handles("users"))
}

/// Validate and update account `id`. Returns where to redirect.
#[instrument(skip(state, input))]
pub async fn update(
    state: &AppState,
    actor_id: i64,
    id: i64,
    input: UserInput,
) -> AppResult<String> {
    if input.id != Some(id) {
        return Err(AppError::IdMismatch {
            path: id,
            body: input.id,
        });
    }

    if let Err(errors) = input.validate_for(Profile::Update) {
        warn!(invalid = ?errors.field_errors().keys().collect::<Vec<_>>(), "update rejected");
        reject(state, actor_id, &input, &errors).await?;
        return Ok(state.config.handles(&format!("users/{}/edit", id)));
    }

    let user = state.users.find(id).await?.ok_or(AppError::NotFound)?;
    persist(state, actor_id, UserDraft::from(user), &input, Profile::Update).await;

    Ok(state.config.handles("users"))
}

/// Copy `input` onto `draft` and save it with its roles.
///
/// Failures are reported to the admin as an error flash and `false` is
/// returned. Notifications published before the failure are not retracted.
pub async fn persist(
    state: &AppState,
    actor_id: i64,
    mut draft: UserDraft,
    input: &UserInput,
    mode: Profile,
) -> bool {
    let (before, after) = match mode {
        Profile::Create => (Phase::Creating, Phase::Created),
        Profile::Update => (Phase::Updating, Phase::Updated),
    };

    draft.fullname = input.fullname.clone();
    draft.email = input.email.clone();

    let saved = async {
        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            draft.password = hash_password(password)?;
        }

        let snapshot = draft.snapshot();
        state.events.notify(before, &snapshot, actor_id);
        state.events.notify(Phase::Saving, &snapshot, actor_id);

        let user = state.users.save_with_roles(&draft, &input.role_ids()).await?;

        let snapshot = UserSnapshot::from(&user);
        state.events.notify(after, &snapshot, actor_id);
        state.events.notify(Phase::Saved, &snapshot, actor_id);
        anyhow::Ok(user)
    }
    .await;

    match saved {
        Ok(user) => {
            info!(user_id = user.id, mode = mode.as_str(), "user saved");
            let key = format!("response.users.{}", mode.as_str());
            state
                .flash
                .add(actor_id, Level::Success, trans(&key, &[]))
                .await;
            true
        }
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, mode = mode.as_str(), "saving user failed");
            state
                .flash
                .add(
                    actor_id,
                    Level::Error,
                    trans("response.db-failed", &[("error", &message)]),
                )
                .await;
            false
        }
    }
}

/// Delete account `id` with its role assignments. Returns where to redirect.
///
/// Deleting one's own account is answered like a missing account.
#[instrument(skip(state))]
pub async fn destroy(state: &AppState, actor_id: i64, id: i64) -> AppResult<String> {
    let user = match state.users.find(id).await? {
        Some(user) if user.id != actor_id => user,
        Some(_) => {
            warn!(user_id = id, "refusing self-deletion");
            return Err(AppError::NotFound);
        }
        None => return Err(AppError::NotFound),
    };

    let snapshot = UserSnapshot::from(&user);
    state.events.notify(Phase::Deleting, &snapshot, actor_id);

    match state.users.delete_with_roles(user.id).await {
        Ok(()) => {
            state.events.notify(Phase::Deleted, &snapshot, actor_id);
            info!(user_id = user.id, "user deleted");
            state
                .flash
                .add(actor_id, Level::Success, trans("response.users.delete", &[]))
                .await;
        }
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, user_id = user.id, "deleting user failed");
            state
                .flash
                .add(
                    actor_id,
                    Level::Error,
                    trans("response.db-failed", &[("error", &message)]),
                )
                .await;
        }
    }

    Ok(state.config.handles("users"))
}

/// Create an administrator account for `email` unless one exists.
pub async fn ensure_admin(state: &AppState, email: &str, password: &str) -> anyhow::Result<()> {
    if state.users.find_by_email(email).await?.is_some() {
        return Ok(());
    }

    let role_ids: Vec<i64> = state
        .users
        .list_roles()
        .await?
        .into_iter()
        .filter(|r| state.config.manage_roles.contains(&r.name))
        .map(|r| r.id)
        .collect();
    anyhow::ensure!(
        !role_ids.is_empty(),
        "none of the roles {:?} exist",
        state.config.manage_roles
    );

    let draft = UserDraft {
        fullname: "Administrator".into(),
        email: email.into(),
        password: hash_password(password)?,
        status: UserStatus::Verified,
        ..UserDraft::new_unverified()
    };
    let user = state.users.save_with_roles(&draft, &role_ids).await?;
    info!(user_id = user.id, email, "bootstrap administrator created");
    Ok(())
}
