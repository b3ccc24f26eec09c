pub mod mailer;

pub use mailer::{send_with_retry, LogMailer, MailError, Mailer, Message};
