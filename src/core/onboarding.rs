//! Onboarding batches - inviting a cohort of future pick leaders.
//!
//! Each member is a person whose login starts with an empty password. The
//! invite run hands out temporary passwords and mails them; a failed send
//! reverts that member's password so the next run retries them.

use crate::{
    core::{
        auth::{Principal, require_core_or_admin},
        member,
    },
    entities::{
        EmailKind, Onboarding, OnboardingMember, Person, User, onboarding, onboarding_member,
        user,
    },
    errors::{Error, Result},
    notify::{Mailer, NewEmail, dispatch},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};
use std::collections::HashMap;
use tracing::{info, warn};

/// Creates a named batch of prospective pick leaders.
pub async fn create_batch(
    db: &DatabaseConnection,
    principal: &Principal,
    name: &str,
    person_ids: &[i64],
) -> Result<onboarding::Model> {
    require_core_or_admin(principal)?;
    if name.trim().is_empty() {
        return Err(Error::validation("a batch needs a name"));
    }

    let txn = db.begin().await?;
    let batch = onboarding::ActiveModel {
        name: Set(name.trim().to_string()),
        created_at: Set(Utc::now()),
        log: Set(String::new()),
        all_sent: Set(false),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    for person_id in person_ids {
        // Members must exist as people
        Person::find_by_id(*person_id)
            .one(&txn)
            .await?
            .ok_or(Error::NotFound {
                entity: "person",
                id: *person_id,
            })?;
        onboarding_member::ActiveModel {
            onboarding_id: Set(batch.id),
            person_id: Set(*person_id),
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;
    Ok(batch)
}

/// Sends registration invites to every member still missing a password.
///
/// Members who already hold a password are skipped and still count towards
/// completeness. The batch log gets one timestamped line per member; the
/// batch is `all_sent` only when every member ends the run with a stored
/// temporary password and a delivered invite.
pub async fn send_invites(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    principal: &Principal,
    onboarding_id: i64,
) -> Result<onboarding::Model> {
    require_core_or_admin(principal)?;
    let batch = Onboarding::find_by_id(onboarding_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "onboarding",
            id: onboarding_id,
        })?;

    let members = OnboardingMember::find()
        .filter(onboarding_member::Column::OnboardingId.eq(batch.id))
        .all(db)
        .await?;

    let mut log = batch.log.clone();
    let mut complete = true;
    for member_row in &members {
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let login = User::find()
            .filter(user::Column::PersonId.eq(member_row.person_id))
            .one(db)
            .await?;
        let Some(login) = login else {
            complete = false;
            log.push_str(&format!(
                "[{stamp}] person {}: FAIL no login account\n",
                member_row.person_id
            ));
            warn!(person = member_row.person_id, "onboarding member has no login");
            continue;
        };
        if !login.password_hash.is_empty() {
            log.push_str(&format!("[{stamp}] {}: OK already invited\n", login.email));
            continue;
        }

        let (login, password) = member::reset_password(db, login).await?;
        let mut context = HashMap::new();
        context.insert("password", password);
        let sent = dispatch(
            db,
            mailer,
            NewEmail {
                kind: Some(EmailKind::Registration),
                recipient_email: login.email.clone(),
                recipient_person_id: Some(member_row.person_id),
                context,
                ..Default::default()
            },
        )
        .await?;

        if sent {
            log.push_str(&format!("[{stamp}] {}: OK\n", login.email));
        } else {
            // Revert so the next run retries this member
            let email = login.email.clone();
            let mut active = login.into_active_model();
            active.password_hash = Set(String::new());
            active.has_temporary_password = Set(false);
            active.update(db).await?;
            complete = false;
            log.push_str(&format!("[{stamp}] {email}: FAIL send error\n"));
        }
    }

    let mut active = batch.into_active_model();
    active.log = Set(log);
    active.all_sent = Set(complete);
    let batch = active.update(db).await?;
    info!(
        batch = batch.id,
        all_sent = batch.all_sent,
        members = members.len(),
        "onboarding invites processed"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::Role;
    use crate::test_utils::{RecordingMailer, create_test_person, setup_test_db};

    fn core_principal() -> Principal {
        Principal::new(999, vec![Role::Core])
    }

    #[tokio::test]
    async fn test_invite_run_with_one_failure() -> Result<()> {
        let db = setup_test_db().await?;
        let principal = core_principal();

        let mut person_ids = Vec::new();
        for (first, email) in [("Ana", "a@example.org"), ("Bo", "b@example.org"), ("Cy", "c@example.org")] {
            let person = create_test_person(&db, first, "Invitee").await?;
            member::create_user(&db, email, Some(person.actor_id), &[Role::Volunteer]).await?;
            person_ids.push(person.actor_id);
        }
        let batch = create_batch(&db, &principal, "Spring cohort", &person_ids).await?;

        let mailer = RecordingMailer::failing_for(&["c@example.org"]);
        let batch = send_invites(&db, &mailer, &principal, batch.id).await?;

        assert!(!batch.all_sent);
        assert!(batch.log.contains("a@example.org: OK"));
        assert!(batch.log.contains("b@example.org: OK"));
        assert!(batch.log.contains("c@example.org: FAIL"));

        let ok = member::find_user_by_email(&db, "a@example.org").await?.unwrap();
        assert!(ok.has_temporary_password);
        assert!(!ok.password_hash.is_empty());

        // Failed member is back to square one
        let failed = member::find_user_by_email(&db, "c@example.org").await?.unwrap();
        assert!(!failed.has_temporary_password);
        assert!(failed.password_hash.is_empty());

        // Invites actually carried the temporary password
        assert_eq!(mailer.messages().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_run_retries_only_failures() -> Result<()> {
        let db = setup_test_db().await?;
        let principal = core_principal();

        let mut person_ids = Vec::new();
        for (first, email) in [("Ana", "a2@example.org"), ("Cy", "c2@example.org")] {
            let person = create_test_person(&db, first, "Invitee").await?;
            member::create_user(&db, email, Some(person.actor_id), &[Role::Volunteer]).await?;
            person_ids.push(person.actor_id);
        }
        let batch = create_batch(&db, &principal, "Retry cohort", &person_ids).await?;

        let flaky = RecordingMailer::failing_for(&["c2@example.org"]);
        let batch = send_invites(&db, &flaky, &principal, batch.id).await?;
        assert!(!batch.all_sent);

        let reliable = RecordingMailer::default();
        let batch = send_invites(&db, &reliable, &principal, batch.id).await?;
        assert!(batch.all_sent);
        // Only the failed member was re-invited
        assert_eq!(reliable.messages().len(), 1);
        assert_eq!(reliable.messages()[0].to, "c2@example.org");
        Ok(())
    }
}
