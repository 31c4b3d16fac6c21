//! Notification dispatcher.
//!
//! Every state change that should reach a human is expressed as an
//! [`EmailKind`] plus context data. The dispatcher renders the bilingual
//! template, hands the finished message to the [`Mailer`] sink and records
//! the outcome on a persisted `emails` row. Delivery is best-effort: a
//! failed send is logged and reported, never rolled back into the
//! originating transaction.

use crate::{
    entities::{EmailKind, Language, Person, email},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use std::collections::HashMap;
use tracing::{error, info};

/// Fully-formed message handed to the delivery sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Usually the pick leader, so volunteers can reply directly
    pub reply_to: Option<String>,
}

/// Delivery sink; the real SMTP submitter lives in an outer collaborator.
pub trait Mailer: Send + Sync {
    /// Delivers one message. An `Err` carries a short diagnostic for the
    /// audit log and leaves the originating state change committed.
    fn deliver(&self, message: &OutgoingMessage) -> std::result::Result<(), String>;
}

/// Default sink that only traces messages; used by maintenance commands and
/// environments without an SMTP host configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMailer;

impl Mailer for TracingMailer {
    fn deliver(&self, message: &OutgoingMessage) -> std::result::Result<(), String> {
        info!(to = %message.to, subject = %message.subject, "email (tracing sink)");
        Ok(())
    }
}

/// A notification to compose and send
#[derive(Debug, Clone, Default)]
pub struct NewEmail {
    pub kind: Option<EmailKind>,
    pub recipient_email: String,
    /// Person the address resolved to, when known; drives the language pick
    pub recipient_person_id: Option<i64>,
    pub harvest_id: Option<i64>,
    pub property_id: Option<i64>,
    /// `{placeholder}` values substituted into the template
    pub context: HashMap<&'static str, String>,
    /// Leader-written body replacing the default template rendering
    pub override_body: Option<String>,
    pub reply_to: Option<String>,
}

/// Subject and body template for one kind in one language.
fn template(kind: EmailKind, lang: Language) -> (&'static str, &'static str) {
    match (kind, lang) {
        (EmailKind::Registration, Language::En) => (
            "Welcome to the collective",
            "You have been invited to join as a pick leader.\n\
             Log in with this temporary password: {password}",
        ),
        (EmailKind::Registration, Language::Fr) => (
            "Bienvenue dans le collectif",
            "Vous êtes invité·e à rejoindre l'équipe comme chef·fe de cueillette.\n\
             Connectez-vous avec ce mot de passe temporaire : {password}",
        ),
        (EmailKind::PasswordReset, Language::En) => (
            "Password reset",
            "Your new temporary password is: {password}",
        ),
        (EmailKind::PasswordReset, Language::Fr) => (
            "Réinitialisation du mot de passe",
            "Votre nouveau mot de passe temporaire est : {password}",
        ),
        (EmailKind::NewRfp, Language::En) => (
            "New request for harvest #{harvest_id}",
            "{requester} asks to join the pick at {location} with {number_of_pickers} picker(s).",
        ),
        (EmailKind::NewRfp, Language::Fr) => (
            "Nouvelle demande pour la cueillette #{harvest_id}",
            "{requester} demande à participer à la cueillette à {location} ({number_of_pickers} personne(s)).",
        ),
        (EmailKind::NewComment, Language::En) => (
            "New comment on harvest #{harvest_id}",
            "{author} commented:\n{content}",
        ),
        (EmailKind::NewComment, Language::Fr) => (
            "Nouveau commentaire sur la cueillette #{harvest_id}",
            "{author} a commenté :\n{content}",
        ),
        (EmailKind::PropertyRegistered, Language::En) => (
            "Your property is registered",
            "Thank you! Your property at {address} has been validated by our team.",
        ),
        (EmailKind::PropertyRegistered, Language::Fr) => (
            "Votre propriété est enregistrée",
            "Merci ! Votre propriété au {address} a été validée par notre équipe.",
        ),
        (EmailKind::SeasonAuthorization, Language::En) => (
            "May we harvest your trees this season?",
            "Please confirm whether we may organize picks at {address} this season.",
        ),
        (EmailKind::SeasonAuthorization, Language::Fr) => (
            "Pouvons-nous cueillir vos arbres cette saison ?",
            "Merci de confirmer si nous pouvons organiser des cueillettes au {address} cette saison.",
        ),
        (EmailKind::SelectedPicker, Language::En) => (
            "You are selected for the pick",
            "Good news! You are confirmed for the harvest at {location} on {start_date}.",
        ),
        (EmailKind::SelectedPicker, Language::Fr) => (
            "Vous êtes sélectionné·e pour la cueillette",
            "Bonne nouvelle ! Votre participation à la cueillette à {location} le {start_date} est confirmée.",
        ),
        (EmailKind::RejectedPicker, Language::En) => (
            "About your participation request",
            "We are sorry: the pick at {location} cannot take your request this time.",
        ),
        (EmailKind::RejectedPicker, Language::Fr) => (
            "À propos de votre demande de participation",
            "Désolé : la cueillette à {location} ne peut pas retenir votre demande cette fois-ci.",
        ),
        (EmailKind::UnselectedPickers, Language::En) => (
            "The pick is full",
            "The harvest at {location} is now fully staffed. Hope to see you at the next one!",
        ),
        (EmailKind::UnselectedPickers, Language::Fr) => (
            "La cueillette est complète",
            "La cueillette à {location} est maintenant complète. Au plaisir de vous voir à la prochaine !",
        ),
        (EmailKind::Closing, Language::En) => ("", "Fruitfully yours,\nThe harvest collective"),
        (EmailKind::Closing, Language::Fr) => ("", "Fruitueusement vôtre,\nLe collectif de cueillette"),
    }
}

/// Replaces `{key}` placeholders from the context map.
fn render(template: &str, context: &HashMap<&'static str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in context {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

fn intro(lang: Language, name: &str) -> String {
    match lang {
        Language::Fr => format!("Bonjour {name},\n\n"),
        Language::En => format!("Hi {name},\n\n"),
    }
}

/// Renders the default bilingual message: recipient language first, the
/// other language after a separator, shared closing footer in both.
fn default_message(
    kind: EmailKind,
    lang: Language,
    name: &str,
    context: &HashMap<&'static str, String>,
) -> String {
    let section = |l: Language| {
        format!(
            "{}{}\n\n{}",
            intro(l, name),
            render(template(kind, l).1, context),
            template(EmailKind::Closing, l).1
        )
    };
    let sep = "___________________________________";
    match lang {
        Language::Fr => format!(
            "* * English version follows * *\n\n{}\n\n{sep}\n\n{}",
            section(Language::Fr),
            section(Language::En)
        ),
        Language::En => format!(
            "* * Version française plus bas * *\n\n{}\n\n{sep}\n\n{}",
            section(Language::En),
            section(Language::Fr)
        ),
    }
}

/// Composes and sends one notification, recording the outcome on a
/// persisted email row. Returns whether delivery succeeded.
pub async fn dispatch<C: ConnectionTrait>(
    db: &C,
    mailer: &dyn Mailer,
    new: NewEmail,
) -> Result<bool> {
    let Some(kind) = new.kind else {
        return Err(crate::errors::Error::validation("email kind is required"));
    };

    let (lang, name) = match new.recipient_person_id {
        Some(id) => match Person::find_by_id(id).one(db).await? {
            Some(p) => (p.language_or_default(), p.name()),
            None => (Language::Fr, String::new()),
        },
        None => (Language::Fr, String::new()),
    };

    let subject = format!(
        "[Fruitshare] {}",
        render(template(kind, lang).0, &new.context)
    );
    let body = match &new.override_body {
        Some(body) => body.clone(),
        None => default_message(kind, lang, &name, &new.context),
    };

    let message = OutgoingMessage {
        to: new.recipient_email.clone(),
        subject,
        body: body.clone(),
        reply_to: new.reply_to.clone(),
    };

    let (sent, log) = if new.recipient_email.is_empty() {
        (false, "recipient has no email address".to_string())
    } else {
        match mailer.deliver(&message) {
            Ok(()) => (true, format!("sent <{kind:?}> to {}", new.recipient_email)),
            Err(e) => (false, format!("delivery failed: {e}")),
        }
    };

    if sent {
        info!(kind = ?kind, to = %new.recipient_email, "notification sent");
    } else {
        error!(kind = ?kind, to = %new.recipient_email, log = %log, "notification failed");
    }

    email::ActiveModel {
        recipient_email: Set(new.recipient_email),
        recipient_person_id: Set(new.recipient_person_id),
        kind: Set(kind),
        harvest_id: Set(new.harvest_id),
        property_id: Set(new.property_id),
        sent: Set(sent),
        body: Set(body),
        log: Set(log),
        date_sent: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(sent)
}
