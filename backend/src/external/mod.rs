//! External API integrations

pub mod mailer;
pub mod moodle;
pub mod sheets;
pub mod whatsapp;

pub use mailer::{MailAttachment, Mailer};
pub use moodle::MoodleClient;
pub use sheets::SheetsClient;
pub use whatsapp::{MediaFile, Messenger, SendContext, WhatsAppClient, WhatsAppEndpoint};
