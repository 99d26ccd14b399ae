//! Gmail as the mail service behind the engine.
//!
//! The engine only sees the [`MailService`] trait; [`GmailClient`] implements
//! it over the Gmail REST API v1, [`auth`] produces the bearer token it
//! needs and [`authorize`] obtains the first one interactively.

pub mod auth;
pub mod authorize;
pub mod client;
pub mod error;
pub mod message;
pub mod service;

pub use auth::{AuthorizedUser, GmailAuthenticator};
pub use authorize::{ClientSecrets, InstalledAppFlow};
pub use client::GmailClient;
pub use error::{AuthError, MailError};
pub use service::{FetchedMessage, Label, MailService, MessagePage, MessageQuery, MessageRef};
