//! In-memory [`UserRepository`] used by tests.
//!
//! Writes are applied to a copy of the data and swapped in only when every
//! step succeeded, mirroring a database transaction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::repo::UserRepository;
use super::repo_types::{Page, Role, User, UserDraft, UserFilter, UserWithRoles};

#[derive(Debug, Clone, Default)]
struct Data {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    user_role: BTreeSet<(i64, i64)>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    data: Mutex<Data>,
    fail_writes: AtomicBool,
}

impl MemoryUserRepository {
    pub async fn insert_role(&self, id: i64, name: &str) {
        self.data.lock().await.roles.insert(
            id,
            Role {
                id,
                name: name.into(),
            },
        );
    }

    /// Store a user as-is (password already hashed) with the given roles.
    pub async fn insert_user(&self, user: User, role_ids: &[i64]) {
        let mut data = self.data.lock().await;
        data.next_id = data.next_id.max(user.id);
        for role_id in role_ids {
            data.user_role.insert((user.id, *role_id));
        }
        data.users.insert(user.id, user);
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn user_count(&self) -> usize {
        self.data.lock().await.users.len()
    }

    pub async fn role_ids_of(&self, user_id: i64) -> Vec<i64> {
        self.data
            .lock()
            .await
            .user_role
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, r)| *r)
            .collect()
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("database is read-only");
        }
        Ok(())
    }
}

fn roles_for(data: &Data, user_id: i64) -> Vec<Role> {
    let mut roles: Vec<Role> = data
        .user_role
        .iter()
        .filter(|(u, _)| *u == user_id)
        .filter_map(|(_, r)| data.roles.get(r).cloned())
        .collect();
    roles.sort_by(|a, b| a.name.cmp(&b.name));
    roles
}

fn sync(data: &mut Data, user_id: i64, role_ids: &[i64]) -> anyhow::Result<()> {
    if let Some(missing) = role_ids.iter().find(|id| !data.roles.contains_key(id)) {
        anyhow::bail!("role {} does not exist", missing);
    }
    data.user_role.retain(|(u, _)| *u != user_id);
    for role_id in role_ids {
        data.user_role.insert((user_id, *role_id));
    }
    Ok(())
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn paginate(
        &self,
        filter: &UserFilter,
        page: i64,
        per_page: i64,
    ) -> anyhow::Result<Page<UserWithRoles>> {
        let data = self.data.lock().await;
        let keyword = filter.keyword.trim().to_lowercase();
        let matching: Vec<&User> = data
            .users
            .values()
            .filter(|u| {
                keyword.is_empty()
                    || u.fullname.to_lowercase().contains(&keyword)
                    || u.email.to_lowercase().contains(&keyword)
            })
            .filter(|u| {
                filter.role_ids.is_empty()
                    || filter
                        .role_ids
                        .iter()
                        .any(|r| data.user_role.contains(&(u.id, *r)))
            })
            .collect();

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX))
            .take(per_page as usize)
            .map(|u| UserWithRoles {
                user: u.clone(),
                roles: roles_for(&data, u.id),
            })
            .collect();
        Ok(Page::new(items, total, page, per_page))
    }

    async fn find(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.data.lock().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .data
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn roles_of(&self, user_id: i64) -> anyhow::Result<Vec<Role>> {
        Ok(roles_for(&*self.data.lock().await, user_id))
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.data.lock().await.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn save_with_roles(&self, draft: &UserDraft, role_ids: &[i64]) -> anyhow::Result<User> {
        self.check_writable()?;
        let mut guard = self.data.lock().await;
        let mut data = guard.clone();
        let now = OffsetDateTime::now_utc();

        let user = match draft.id {
            None => {
                data.next_id += 1;
                User {
                    id: data.next_id,
                    fullname: draft.fullname.clone(),
                    email: draft.email.clone(),
                    password: draft.password.clone(),
                    status: draft.status,
                    created_at: now,
                    updated_at: now,
                }
            }
            Some(id) => {
                let existing = data
                    .users
                    .get(&id)
                    .ok_or_else(|| anyhow::anyhow!("user {} vanished", id))?;
                User {
                    id,
                    fullname: draft.fullname.clone(),
                    email: draft.email.clone(),
                    password: draft.password.clone(),
                    status: draft.status,
                    created_at: existing.created_at,
                    updated_at: now,
                }
            }
        };
        data.users.insert(user.id, user.clone());
        sync(&mut data, user.id, role_ids)?;

        *guard = data;
        Ok(user)
    }

    async fn delete_with_roles(&self, id: i64) -> anyhow::Result<()> {
        self.check_writable()?;
        let mut guard = self.data.lock().await;
        let mut data = guard.clone();
        sync(&mut data, id, &[])?;
        data.users.remove(&id);
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::UserStatus;

    fn draft(name: &str) -> UserDraft {
        UserDraft {
            fullname: name.into(),
            email: format!("{}@x.com", name.to_lowercase()),
            password: "hash".into(),
            ..UserDraft::new_unverified()
        }
    }

    #[tokio::test]
    async fn failed_sync_leaves_no_trace() {
        let repo = MemoryUserRepository::default();
        repo.insert_role(1, "Member").await;

        let err = repo.save_with_roles(&draft("Ada"), &[1, 99]).await.unwrap_err();
        assert!(err.to_string().contains("99"));
        assert_eq!(repo.user_count().await, 0);
    }

    #[tokio::test]
    async fn paginate_filters_by_keyword_and_role() {
        let repo = MemoryUserRepository::default();
        repo.insert_role(1, "Member").await;
        repo.insert_role(2, "Administrator").await;
        repo.save_with_roles(&draft("Ada"), &[1]).await.unwrap();
        repo.save_with_roles(&draft("Grace"), &[2]).await.unwrap();

        let by_name = UserFilter {
            keyword: "GRA".into(),
            role_ids: vec![],
        };
        let page = repo.paginate(&by_name, 1, 30).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].user.fullname, "Grace");
        assert_eq!(page.items[0].user.status, UserStatus::Unverified);

        let by_role = UserFilter {
            keyword: String::new(),
            role_ids: vec![1],
        };
        let page = repo.paginate(&by_role, 1, 30).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].roles[0].name, "Member");
    }
}
