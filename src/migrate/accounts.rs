//! Tenants, roles, users and their role links.

use anyhow::Result;
use tracing::instrument;

use crate::db::model::{LegacyRole, LegacyTenant, LegacyUser};
use crate::db::LegacySource;
use crate::model::{NewRole, NewTenant, NewUser};
use crate::pipeline::{RowOutcome, RowPolicy, Stage, StageReport};
use crate::store::AccountStore;
use crate::transform::{clean_text, normalize_email};

const ALREADY_MIGRATED: &str = "already migrated";

/// Legacy status 0 is "normal"; anything else is disabled.
fn is_active(status: i64) -> bool {
    status == 0
}

pub fn tenant_from_legacy(row: &LegacyTenant) -> NewTenant {
    let code = clean_text(row.code.as_deref()).unwrap_or_else(|| format!("tenant-{}", row.id));
    let name = clean_text(row.name.as_deref()).unwrap_or_else(|| code.clone());
    NewTenant {
        legacy_id: row.id,
        code,
        name,
        is_active: is_active(row.status),
        created_at: row.created_at,
    }
}

pub fn role_from_legacy(row: &LegacyRole, tenant_id: i64) -> NewRole {
    let code = clean_text(row.code.as_deref()).unwrap_or_else(|| format!("role-{}", row.id));
    let name = clean_text(row.name.as_deref()).unwrap_or_else(|| code.clone());
    NewRole {
        legacy_id: row.id,
        tenant_id,
        code,
        name,
    }
}

/// Build the target user, or the reason the row cannot be migrated.
pub fn user_from_legacy(row: &LegacyUser, tenant_id: Option<i64>) -> Result<NewUser, &'static str> {
    if row.deleted != 0 {
        return Err("soft-deleted");
    }
    let email = normalize_email(row.email.as_deref());
    let username = clean_text(row.username.as_deref())
        .or_else(|| email.clone())
        .ok_or("missing username and email")?;
    Ok(NewUser {
        legacy_id: row.id,
        tenant_id,
        username,
        email,
        phone: clean_text(row.phone.as_deref()),
        password_hash: clean_text(row.password.as_deref()),
        display_name: clean_text(row.nickname.as_deref()),
        is_active: is_active(row.status),
        created_at: row.created_at,
    })
}

/// Migrate tenants, roles, users and user-role links, in that order. Every
/// stage that started leaves its report in `reports`, also when it fails.
#[instrument(skip_all)]
pub async fn migrate_accounts<S, T>(
    source: &S,
    target: &mut T,
    policy: RowPolicy,
    reports: &mut Vec<StageReport>,
) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: AccountStore + ?Sized,
{
    let mut stage = Stage::new("tenants", policy);
    let outcome = migrate_tenants(source, target, &mut stage).await;
    stage.close(reports, outcome)?;

    let mut stage = Stage::new("roles", policy);
    let outcome = migrate_roles(source, target, &mut stage).await;
    stage.close(reports, outcome)?;

    let mut stage = Stage::new("users", policy);
    let outcome = migrate_users(source, target, &mut stage).await;
    stage.close(reports, outcome)?;

    let mut stage = Stage::new("user_roles", policy);
    let outcome = migrate_user_roles(source, target, &mut stage).await;
    stage.close(reports, outcome)
}

async fn migrate_tenants<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: AccountStore + ?Sized,
{
    for row in source.tenants().await? {
        let key = row.id.to_string();
        let tenant = tenant_from_legacy(&row);

        stage.begin_row(target).await?;
        let result = match target.tenant_id(row.id).await {
            Ok(Some(_)) => Ok(RowOutcome::skipped(ALREADY_MIGRATED)),
            Ok(None) => target.insert_tenant(&tenant).await.map(RowOutcome::Inserted),
            Err(err) => Err(err),
        };
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn migrate_roles<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: AccountStore + ?Sized,
{
    for row in source.roles().await? {
        let key = row.id.to_string();
        let Some(legacy_tenant) = row.tenant_id else {
            stage.skip(key, "missing tenant id");
            continue;
        };

        stage.begin_row(target).await?;
        let result = write_role(target, &row, legacy_tenant).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_role<T>(target: &mut T, row: &LegacyRole, legacy_tenant: i64) -> Result<RowOutcome>
where
    T: AccountStore + ?Sized,
{
    if target.role_id(row.id).await?.is_some() {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let Some(tenant_id) = target.tenant_id(legacy_tenant).await? else {
        return Ok(RowOutcome::skipped(format!(
            "tenant {legacy_tenant} not migrated"
        )));
    };
    let role = role_from_legacy(row, tenant_id);
    Ok(RowOutcome::Inserted(target.insert_role(&role).await?))
}

async fn migrate_users<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: AccountStore + ?Sized,
{
    for row in source.users().await? {
        let key = row.id.to_string();
        // validate before touching the target; tenant is resolved later
        if let Err(reason) = user_from_legacy(&row, None) {
            stage.skip(key, reason);
            continue;
        }

        stage.begin_row(target).await?;
        let result = write_user(target, &row).await;
        if let Some(id) = stage.finish_row(target, &key, result).await? {
            stage.map_id(key, id);
        }
    }
    Ok(())
}

async fn write_user<T>(target: &mut T, row: &LegacyUser) -> Result<RowOutcome>
where
    T: AccountStore + ?Sized,
{
    if target.user_id(row.id).await?.is_some() {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    let tenant_id = match row.tenant_id {
        Some(legacy) => target.tenant_id(legacy).await?,
        None => None,
    };
    let user = match user_from_legacy(row, tenant_id) {
        Ok(user) => user,
        Err(reason) => return Ok(RowOutcome::skipped(reason)),
    };
    if let Some(email) = &user.email {
        if target.email_taken(email).await? {
            return Ok(RowOutcome::skipped(format!("email {email} already exists")));
        }
    }
    Ok(RowOutcome::Inserted(target.insert_user(&user).await?))
}

fn id_or_null(id: Option<i64>) -> String {
    id.map_or_else(|| "null".to_string(), |v| v.to_string())
}

async fn migrate_user_roles<S, T>(source: &S, target: &mut T, stage: &mut Stage) -> Result<()>
where
    S: LegacySource + ?Sized,
    T: AccountStore + ?Sized,
{
    for link in source.user_roles().await? {
        let key = format!("{}:{}", id_or_null(link.user_id), id_or_null(link.role_id));
        let (Some(legacy_user), Some(legacy_role)) = (link.user_id, link.role_id) else {
            stage.skip(key, "missing user or role id");
            continue;
        };

        stage.begin_row(target).await?;
        let result = write_user_role(target, legacy_user, legacy_role).await;
        stage.finish_row(target, key, result).await?;
    }
    Ok(())
}

/// Link rows have no ID of their own, so success is [`RowOutcome::Linked`].
async fn write_user_role<T>(target: &mut T, legacy_user: i64, legacy_role: i64) -> Result<RowOutcome>
where
    T: AccountStore + ?Sized,
{
    let Some(user_id) = target.user_id(legacy_user).await? else {
        return Ok(RowOutcome::skipped(format!("user {legacy_user} not migrated")));
    };
    let Some(role_id) = target.role_id(legacy_role).await? else {
        return Ok(RowOutcome::skipped(format!("role {legacy_role} not migrated")));
    };
    if target.user_role_exists(user_id, role_id).await? {
        return Ok(RowOutcome::skipped(ALREADY_MIGRATED));
    }
    target.insert_user_role(user_id, role_id).await?;
    Ok(RowOutcome::Linked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> LegacyUser {
        LegacyUser {
            id: 3,
            username: Some(" jdoe ".into()),
            email: Some("J.Doe@Example.com".into()),
            nickname: Some("NULL".into()),
            ..Default::default()
        }
    }

    #[test]
    fn tenant_defaults_code_and_name() {
        let t = tenant_from_legacy(&LegacyTenant {
            id: 9,
            status: 1,
            ..Default::default()
        });
        assert_eq!(t.code, "tenant-9");
        assert_eq!(t.name, "tenant-9");
        assert!(!t.is_active);
    }

    #[test]
    fn user_fields_are_cleaned() {
        let u = user_from_legacy(&user(), Some(4)).unwrap();
        assert_eq!(u.username, "jdoe");
        assert_eq!(u.email.as_deref(), Some("j.doe@example.com"));
        assert_eq!(u.display_name, None);
        assert_eq!(u.tenant_id, Some(4));
        assert!(u.is_active);
    }

    #[test]
    fn username_falls_back_to_email() {
        let mut row = user();
        row.username = None;
        assert_eq!(
            user_from_legacy(&row, None).unwrap().username,
            "j.doe@example.com"
        );
    }

    #[test]
    fn unusable_users_are_rejected() {
        let mut row = user();
        row.deleted = 1;
        assert_eq!(user_from_legacy(&row, None), Err("soft-deleted"));

        let mut row = user();
        row.username = Some("  ".into());
        row.email = Some("not-an-email".into());
        assert_eq!(
            user_from_legacy(&row, None),
            Err("missing username and email")
        );
    }
}
