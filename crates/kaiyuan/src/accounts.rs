use chrono::Utc;
use entity::account;
use kaiyuan_core::models::{AccountView, RemoteProfile};
use kaiyuan_core::validate::normalize_email;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Provider emails are optional; an empty one is stored as NULL so it does not
/// collide with other accounts lacking an email.
fn profile_email(profile: &RemoteProfile) -> Option<String> {
    let email = normalize_email(&profile.email);
    (!email.is_empty()).then_some(email)
}

/// Fresh account built from every provider-sourced field.
pub fn new_from_profile(profile: &RemoteProfile, now: i64) -> account::ActiveModel {
    account::ActiveModel {
        uid: Set(Some(profile.uid.clone())),
        username: Set(profile.username.clone()),
        email: Set(profile_email(profile)),
        avatar: Set(profile.avatar.clone()),
        github: Set(profile.github.clone()),
        password_hash: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Refresh an existing account on repeat OAuth login.
///
/// Only `email` and `github` follow the provider. `username` and `avatar` keep
/// whatever the account holds locally, and the password hash is never touched.
pub fn refresh_from_profile(
    existing: account::Model,
    profile: &RemoteProfile,
    now: i64,
) -> account::ActiveModel {
    let mut active: account::ActiveModel = existing.into();
    active.email = Set(profile_email(profile));
    active.github = Set(profile.github.clone());
    active.updated_at = Set(now);
    active
}

pub fn to_view(model: &account::Model) -> AccountView {
    AccountView {
        id: model.id,
        uid: model.uid.clone(),
        username: model.username.clone(),
        email: model.email.clone().unwrap_or_default(),
        avatar: model.avatar.clone(),
        github: model.github.clone(),
    }
}

pub async fn find_by_uid(
    db: &DatabaseConnection,
    uid: &str,
) -> Result<Option<account::Model>, DbErr> {
    account::Entity::find()
        .filter(account::Column::Uid.eq(uid))
        .one(db)
        .await
}

pub async fn find_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<account::Model>, DbErr> {
    account::Entity::find()
        .filter(account::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
}

/// Insert a password-bearing account with no provider link.
pub async fn create_password_account(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password_hash: String,
) -> Result<account::Model, DbErr> {
    let now = Utc::now().timestamp();
    account::ActiveModel {
        uid: Set(None),
        username: Set(username.trim().to_string()),
        email: Set(Some(normalize_email(email))),
        avatar: Set(String::new()),
        github: Set(String::new()),
        password_hash: Set(Some(password_hash)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Maps a provider profile onto the local account store (create-or-update).
pub struct AccountReconciler<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> AccountReconciler<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn reconcile(&self, profile: &RemoteProfile) -> Result<account::Model, DbErr> {
        let now = Utc::now().timestamp();

        if let Some(existing) = find_by_uid(self.db, &profile.uid).await? {
            log::debug!("Refreshing account {} from provider uid {}", existing.id, profile.uid);
            return refresh_from_profile(existing, profile, now).update(self.db).await;
        }

        match new_from_profile(profile, now).insert(self.db).await {
            Ok(created) => {
                log::info!("Created account {} for provider uid {}", created.id, profile.uid);
                Ok(created)
            }
            // A concurrent login for the same uid won the insert: fall back to
            // the update branch once.
            Err(e) if is_unique_violation(&e) => match find_by_uid(self.db, &profile.uid).await? {
                Some(existing) => {
                    log::warn!("Account insert for uid {} raced; retrying as update", profile.uid);
                    refresh_from_profile(existing, profile, now).update(self.db).await
                }
                None => {
                    log::error!(
                        "Account insert for uid {} violated a unique key other than uid \
                         (email already held by another account): {e}",
                        profile.uid
                    );
                    Err(e)
                }
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_db;

    fn profile(uid: &str, username: &str, email: &str) -> RemoteProfile {
        RemoteProfile {
            uid: uid.to_string(),
            username: username.to_string(),
            avatar: format!("https://img/{username}.png"),
            email: email.to_string(),
            github: format!("{username}-gh"),
        }
    }

    fn stored(username: &str) -> account::Model {
        account::Model {
            id: 1,
            uid: Some("42".to_string()),
            username: username.to_string(),
            email: Some("old@x.com".to_string()),
            avatar: "https://img/custom.png".to_string(),
            github: "old-gh".to_string(),
            password_hash: Some("$argon2id$stub".to_string()),
            created_at: 100,
            updated_at: 100,
        }
    }

    #[test]
    fn test_refresh_keeps_username() {
        let active = refresh_from_profile(stored("local-name"), &profile("42", "ada", "a@x.com"), 200);
        assert!(!active.username.is_set());
        assert_eq!(active.username.as_ref(), "local-name");
    }

    #[test]
    fn test_refresh_keeps_avatar() {
        let active = refresh_from_profile(stored("local-name"), &profile("42", "ada", "a@x.com"), 200);
        assert!(!active.avatar.is_set());
        assert_eq!(active.avatar.as_ref(), "https://img/custom.png");
    }

    #[test]
    fn test_refresh_keeps_password_hash() {
        let active = refresh_from_profile(stored("local-name"), &profile("42", "ada", "a@x.com"), 200);
        assert!(!active.password_hash.is_set());
    }

    #[test]
    fn test_refresh_updates_email() {
        let active = refresh_from_profile(stored("local-name"), &profile("42", "ada", "New@X.com"), 200);
        assert!(active.email.is_set());
        assert_eq!(active.email.as_ref(), &Some("new@x.com".to_string()));
    }

    #[test]
    fn test_refresh_updates_github() {
        let active = refresh_from_profile(stored("local-name"), &profile("42", "ada", "a@x.com"), 200);
        assert!(active.github.is_set());
        assert_eq!(active.github.as_ref(), "ada-gh");
    }

    #[test]
    fn test_refresh_bumps_updated_at_only() {
        let active = refresh_from_profile(stored("local-name"), &profile("42", "ada", "a@x.com"), 200);
        assert_eq!(active.updated_at.as_ref(), &200);
        assert!(!active.created_at.is_set());
        assert!(!active.uid.is_set());
    }

    #[test]
    fn test_new_from_profile_takes_every_field() {
        let active = new_from_profile(&profile("42", "ada", "a@x.com"), 300);
        assert_eq!(active.uid.as_ref(), &Some("42".to_string()));
        assert_eq!(active.username.as_ref(), "ada");
        assert_eq!(active.avatar.as_ref(), "https://img/ada.png");
        assert_eq!(active.email.as_ref(), &Some("a@x.com".to_string()));
        assert_eq!(active.github.as_ref(), "ada-gh");
        assert_eq!(active.password_hash.as_ref(), &None);
        assert!(!active.id.is_set());
    }

    #[test]
    fn test_empty_provider_email_is_null() {
        let active = new_from_profile(&profile("42", "ada", "  "), 300);
        assert_eq!(active.email.as_ref(), &None);
    }

    #[tokio::test]
    async fn test_reconcile_creates_then_updates() {
        let db = memory_db().await;
        let reconciler = AccountReconciler::new(&db);

        let created = reconciler.reconcile(&profile("42", "ada", "a@x.com")).await.unwrap();
        assert_eq!(created.uid.as_deref(), Some("42"));
        assert_eq!(created.username, "ada");

        let mut changed = profile("42", "ada-renamed", "ada@new.com");
        changed.github = "ada-new-gh".to_string();
        changed.avatar = "https://img/other.png".to_string();
        let updated = reconciler.reconcile(&changed).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.username, "ada");
        assert_eq!(updated.avatar, "https://img/ada.png");
        assert_eq!(updated.email.as_deref(), Some("ada@new.com"));
        assert_eq!(updated.github, "ada-new-gh");

        let count = account::Entity::find().all(&db).await.unwrap().len();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_reconcile_distinct_uids_create_distinct_accounts() {
        let db = memory_db().await;
        let reconciler = AccountReconciler::new(&db);

        let a = reconciler.reconcile(&profile("1", "ada", "")).await.unwrap();
        let b = reconciler.reconcile(&profile("2", "bob", "")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.email, None);
        assert_eq!(b.email, None);
    }

    #[tokio::test]
    async fn test_duplicate_uid_insert_is_unique_violation() {
        let db = memory_db().await;
        new_from_profile(&profile("42", "ada", "a@x.com"), 1)
            .insert(&db)
            .await
            .unwrap();

        let err = new_from_profile(&profile("42", "ada", "b@x.com"), 1)
            .insert(&db)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_concurrent_first_logins_share_one_account() {
        let db = memory_db().await;
        let first = AccountReconciler::new(&db);
        let second = AccountReconciler::new(&db);
        let a = profile("42", "ada", "a@x.com");
        let b = profile("42", "ada", "b@x.com");

        let (x, y) = tokio::join!(first.reconcile(&a), second.reconcile(&b));
        let (x, y) = (x.unwrap(), y.unwrap());

        assert_eq!(x.id, y.id);
        assert_eq!(x.uid.as_deref(), Some("42"));
        assert_eq!(y.uid.as_deref(), Some("42"));

        let rows = account::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].username, "ada");
    }

    #[tokio::test]
    async fn test_provider_email_held_by_password_account_is_rejected() {
        let db = memory_db().await;
        let owner = create_password_account(&db, "owner", "a@x.com", "hash".to_string())
            .await
            .unwrap();

        let err = AccountReconciler::new(&db)
            .reconcile(&profile("42", "ada", "a@x.com"))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        assert!(find_by_uid(&db, "42").await.unwrap().is_none());
        let kept = find_by_email(&db, "a@x.com").await.unwrap().unwrap();
        assert_eq!(kept.id, owner.id);
        assert_eq!(kept.username, "owner");
        assert_eq!(kept.password_hash.as_deref(), Some("hash"));
    }

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let db = memory_db().await;
        create_password_account(&db, "ada", "Ada@X.com", "hash".to_string())
            .await
            .unwrap();

        let found = find_by_email(&db, " ADA@x.com ").await.unwrap().unwrap();
        assert_eq!(found.username, "ada");
        assert_eq!(found.uid, None);
    }
}
