//! Member management - people, users, roles and passwords.
//!
//! People and organizations share the `actors` id space; helpers here create
//! the actor row alongside the concrete row and resolve the polymorphic
//! reference back to its concrete arm.

use crate::{
    core::auth::{Principal, require_admin},
    entities::{
        Actor, ActorKind, EmailKind, Organization, Person, Role, User, UserRole, actor,
        organization, person, user, user_role,
    },
    errors::{Error, Result},
    notify::{Mailer, NewEmail, dispatch},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set,
};
use std::collections::HashMap;
use tracing::info;

/// Characters allowed in generated passwords; ambiguous glyphs (l/1, O/0, I)
/// are left out so invites survive being read over the phone.
const PASSWORD_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated temporary passwords.
pub const TEMPORARY_PASSWORD_LENGTH: usize = 12;

/// Generates a random password from the ambiguity-free alphabet.
#[must_use]
pub fn make_random_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}

/// Hashes a password with Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::External {
            message: format!("failed to hash password: {e}"),
        })
}

/// Verifies a password against a stored Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::External {
        message: format!("invalid password hash format: {e}"),
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Concrete arm of an actor reference
#[derive(Debug, Clone, PartialEq)]
pub enum ActorRef {
    /// A physical person
    Person(person::Model),
    /// An organization
    Organization(organization::Model),
}

/// Resolves an actor id to its concrete person or organization row.
pub async fn resolve_actor<C: ConnectionTrait>(db: &C, actor_id: i64) -> Result<ActorRef> {
    let actor = Actor::find_by_id(actor_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "actor",
            id: actor_id,
        })?;

    match actor.kind {
        ActorKind::Person => Person::find_by_id(actor_id)
            .one(db)
            .await?
            .map(ActorRef::Person)
            .ok_or(Error::NotFound {
                entity: "person",
                id: actor_id,
            }),
        ActorKind::Organization => Organization::find_by_id(actor_id)
            .one(db)
            .await?
            .map(ActorRef::Organization)
            .ok_or(Error::NotFound {
                entity: "organization",
                id: actor_id,
            }),
    }
}

/// Email address an actor can be reached at: a person's login email, or the
/// organization contact person's login email.
pub async fn actor_email<C: ConnectionTrait>(db: &C, actor_id: i64) -> Result<Option<String>> {
    let person_id = match resolve_actor(db, actor_id).await? {
        ActorRef::Person(p) => Some(p.actor_id),
        ActorRef::Organization(o) => o.contact_person_id,
    };

    let Some(person_id) = person_id else {
        return Ok(None);
    };
    let user = User::find()
        .filter(user::Column::PersonId.eq(person_id))
        .one(db)
        .await?;
    Ok(user.map(|u| u.email))
}

/// Fields for creating a person (and optionally their login).
#[derive(Debug, Clone, Default)]
pub struct NewPerson {
    pub first_name: String,
    pub family_name: String,
    pub phone: Option<String>,
    pub language: Option<crate::entities::Language>,
}

/// Inserts an actor row plus the person row sharing its id.
pub async fn create_person<C: ConnectionTrait>(db: &C, new: NewPerson) -> Result<person::Model> {
    if new.first_name.trim().is_empty() {
        return Err(Error::validation("first name cannot be empty"));
    }

    let actor = actor::ActiveModel {
        kind: Set(ActorKind::Person),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let person = person::ActiveModel {
        actor_id: Set(actor.actor_id),
        first_name: Set(new.first_name.trim().to_string()),
        family_name: Set(new.family_name.trim().to_string()),
        phone: Set(new.phone),
        language: Set(new.language),
        newsletter_subscription: Set(false),
        comments: Set(String::new()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(person)
}

/// Inserts an actor row plus an organization row sharing its id.
pub async fn create_organization<C: ConnectionTrait>(
    db: &C,
    civil_name: &str,
    is_beneficiary: bool,
    is_equipment_point: bool,
    contact_person_id: Option<i64>,
) -> Result<organization::Model> {
    if civil_name.trim().is_empty() {
        return Err(Error::validation("organization name cannot be empty"));
    }

    let actor = actor::ActiveModel {
        kind: Set(ActorKind::Organization),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let org = organization::ActiveModel {
        actor_id: Set(actor.actor_id),
        civil_name: Set(civil_name.trim().to_string()),
        description: Set(String::new()),
        is_beneficiary: Set(is_beneficiary),
        is_equipment_point: Set(is_equipment_point),
        contact_person_id: Set(contact_person_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(org)
}

/// Creates a login for a person with the given roles and no password yet.
/// The email is stored lowercased; uniqueness is enforced by the schema.
pub async fn create_user<C: ConnectionTrait>(
    db: &C,
    email: &str,
    person_id: Option<i64>,
    roles: &[Role],
) -> Result<user::Model> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::validation(format!("invalid email address: {email}")));
    }

    let user = user::ActiveModel {
        email: Set(email),
        password_hash: Set(String::new()),
        has_temporary_password: Set(false),
        agreed_terms: Set(false),
        is_staff: Set(roles.iter().any(|r| r.is_staff_role())),
        person_id: Set(person_id),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    for role in roles {
        user_role::ActiveModel {
            user_id: Set(user.id),
            role: Set(*role),
        }
        .insert(db)
        .await?;
    }

    Ok(user)
}

/// Finds a user by (case-insensitively normalized) email.
pub async fn find_user_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Replaces a user's role set and recomputes `is_staff`.
pub async fn set_roles(
    db: &DatabaseConnection,
    user_id: i64,
    roles: &[Role],
) -> Result<user::Model> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: user_id,
        })?;

    UserRole::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    for role in roles {
        user_role::ActiveModel {
            user_id: Set(user_id),
            role: Set(*role),
        }
        .insert(db)
        .await?;
    }

    let mut active: user::ActiveModel = user.into();
    active.is_staff = Set(roles.iter().any(|r| r.is_staff_role()));
    active.update(db).await.map_err(Into::into)
}

/// Lists a user's roles.
pub async fn roles_of<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<Vec<Role>> {
    Ok(UserRole::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.role)
        .collect())
}

/// Sets a fresh temporary password on the user and returns the clear text
/// so the caller can put it in a registration or reset email.
pub async fn reset_password<C: ConnectionTrait>(
    db: &C,
    user: user::Model,
) -> Result<(user::Model, String)> {
    let password = make_random_password(TEMPORARY_PASSWORD_LENGTH);
    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(hash_password(&password)?);
    active.has_temporary_password = Set(true);
    let user = active.update(db).await?;
    info!(user = user.id, "temporary password set");
    Ok((user, password))
}

/// Resets the password for the login behind `email` and mails the new
/// temporary password. Returns whether the mail was delivered.
pub async fn send_password_reset(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    email: &str,
) -> Result<bool> {
    let user = User::find()
        .filter(user::Column::Email.eq(email.to_lowercase()))
        .one(db)
        .await?
        .ok_or_else(|| Error::validation("no account registered for this email"))?;
    let person_id = user.person_id;
    let (user, password) = reset_password(db, user).await?;

    let mut context = HashMap::new();
    context.insert("password", password);
    dispatch(
        db,
        mailer,
        NewEmail {
            kind: Some(EmailKind::PasswordReset),
            recipient_email: user.email,
            recipient_person_id: person_id,
            context,
            ..Default::default()
        },
    )
    .await
}

/// User-chosen password replacing the temporary one.
pub async fn change_password(
    db: &DatabaseConnection,
    user: user::Model,
    new_password: &str,
) -> Result<user::Model> {
    if new_password.len() < 8 {
        return Err(Error::validation(
            "password must be at least 8 characters long",
        ));
    }
    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(hash_password(new_password)?);
    active.has_temporary_password = Set(false);
    active.update(db).await.map_err(Into::into)
}

/// Records acceptance of the terms and conditions.
pub async fn accept_terms(db: &DatabaseConnection, user: user::Model) -> Result<user::Model> {
    let mut active: user::ActiveModel = user.into();
    active.agreed_terms = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Writes the newsletter email list, one address per line, for people who
/// opted in and hold a login. Returns the number of addresses written.
pub async fn export_email_list(
    db: &DatabaseConnection,
    principal: &Principal,
    path: &std::path::Path,
) -> Result<usize> {
    require_admin(principal)?;
    let subscribers = Person::find()
        .filter(person::Column::NewsletterSubscription.eq(true))
        .all(db)
        .await?;

    let mut addresses = Vec::with_capacity(subscribers.len());
    for person in subscribers {
        let login = User::find()
            .filter(user::Column::PersonId.eq(person.actor_id))
            .one(db)
            .await?;
        if let Some(login) = login {
            addresses.push(login.email);
        }
    }
    addresses.sort();
    addresses.dedup();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, addresses.join("\n") + "\n")?;
    info!(count = addresses.len(), path = %path.display(), "email list exported");
    Ok(addresses.len())
}

/// Person linked to a user, if any.
pub async fn person_of<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
) -> Result<Option<person::Model>> {
    match user.person_id {
        Some(_) => user.find_related(Person).one(db).await.map_err(Into::into),
        None => Ok(None),
    }
}
