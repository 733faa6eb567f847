//! Email composition from embedded templates.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::ParticipantName;
use crate::io::config::MailConfig;

const FOOTER_TEMPLATE: &str = include_str!("templates/footer.txt");
const WISHLIST_REQUEST_TEMPLATE: &str = include_str!("templates/wishlist_request.txt");
const ASSIGNMENT_TEMPLATE: &str = include_str!("templates/assignment.txt");
const ASSIGNMENT_MISSING_TEMPLATE: &str = include_str!("templates/assignment_missing.txt");
const LATE_WISHLIST_TEMPLATE: &str = include_str!("templates/late_wishlist.txt");

pub const WISHLIST_REQUEST_SUBJECT: &str =
    "Secret Santa - Send Your Wishlist to Get Your Assignment!";

/// Subject and plain-text body of an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMail {
    pub subject: String,
    pub body: String,
}

/// Template engine wrapper around minijinja.
pub struct Templates {
    env: Environment<'static>,
    budget: String,
    contact: Option<String>,
}

impl Templates {
    pub fn new(budget: impl Into<String>, contact: Option<String>) -> Self {
        let mut env = Environment::new();
        env.add_template("footer", FOOTER_TEMPLATE)
            .expect("footer template should be valid");
        env.add_template("wishlist_request", WISHLIST_REQUEST_TEMPLATE)
            .expect("wishlist request template should be valid");
        env.add_template("assignment", ASSIGNMENT_TEMPLATE)
            .expect("assignment template should be valid");
        env.add_template("assignment_missing", ASSIGNMENT_MISSING_TEMPLATE)
            .expect("missing-wishlist template should be valid");
        env.add_template("late_wishlist", LATE_WISHLIST_TEMPLATE)
            .expect("late wishlist template should be valid");
        Self {
            env,
            budget: budget.into(),
            contact: contact.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn from_config(cfg: &MailConfig) -> Self {
        Self::new(cfg.gift_budget.clone(), cfg.contact_name.clone())
    }

    pub fn wishlist_request(&self) -> Result<ComposedMail> {
        let body = self.env.get_template("wishlist_request")?.render(context! {
            budget => self.budget,
        })?;
        Ok(ComposedMail {
            subject: WISHLIST_REQUEST_SUBJECT.to_string(),
            body,
        })
    }

    /// Assignment for a giver. `None` selects the "no wishlist arrived" variant.
    pub fn assignment(
        &self,
        receiver: &ParticipantName,
        wishlist: Option<&str>,
    ) -> Result<ComposedMail> {
        let template = match wishlist {
            Some(_) => "assignment",
            None => "assignment_missing",
        };
        let receiver = receiver.display_name();
        let body = self.env.get_template(template)?.render(context! {
            receiver => receiver,
            wishlist => wishlist.map(str::trim_end),
            budget => self.budget,
            contact => self.contact,
        })?;
        Ok(ComposedMail {
            subject: format!("Your Secret Santa Assignment: {}!", receiver),
            body,
        })
    }

    pub fn late_wishlist(&self, receiver: &ParticipantName, wishlist: &str) -> Result<ComposedMail> {
        let receiver = receiver.display_name();
        let body = self.env.get_template("late_wishlist")?.render(context! {
            receiver => receiver,
            wishlist => wishlist.trim_end(),
            budget => self.budget,
            contact => self.contact,
        })?;
        Ok(ComposedMail {
            subject: format!("Secret Santa Update: {}'s Wishlist Arrived!", receiver),
            body,
        })
    }
}
