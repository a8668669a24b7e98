use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}
