//! Onboarding email tools and the mail delivery seam.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use proto::ToolError;
use tracing::{debug, info};

use crate::Tool;

const WELCOME_SUBJECT: &str = "Welcome to the company!";
const WELCOME_BODY: &str = "Welcome to the company! We are very happy to have you here.";
const POLICY_SUBJECT: &str = "HR policies";
const POLICY_BODY: &str = "Please find attached the HR policies of the company";
const SLACK_SUBJECT: &str = "Join us on Slack";

/// An email ready to hand to a [`Mailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Files attached to the message.
    pub attachments: Vec<PathBuf>,
}

/// Mail delivery backend
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends one email.
    async fn send(&self, email: OutgoingEmail) -> Result<(), ToolError>;
}

/// Mailer that logs and records every message instead of delivering it
pub struct OutboxMailer {
    sender: String,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl OutboxMailer {
    /// Creates an outbox that reports `sender` as the from-address.
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Returns every email sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), ToolError> {
        info!(
            from = %self.sender,
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "Email queued in outbox"
        );
        self.sent.lock().push(email);
        Ok(())
    }
}

/// Normalizes and validates a model-provided email address.
///
/// Surrounding whitespace, quotes and angle brackets are stripped; the
/// remainder must have exactly one `@`, non-empty local and domain parts,
/// a dot in the domain, and no whitespace.
pub fn parse_recipient(input: &str) -> Result<String, ToolError> {
    let addr = input
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '<' | '>' | '`'))
        .trim();

    let invalid = || ToolError::InvalidArgs(format!("'{addr}' is not a valid email address"));

    if addr.is_empty() {
        return Err(ToolError::InvalidArgs(
            "expected the recipient's email address".to_string(),
        ));
    }
    if addr.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = addr.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(addr.to_string())
}

/// Sends the welcome email to a new employee
pub struct WelcomeEmailTool {
    mailer: Arc<dyn Mailer>,
}

impl WelcomeEmailTool {
    /// Creates the tool on top of a mail backend.
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Tool for WelcomeEmailTool {
    fn name(&self) -> &str {
        "welcome_email_tool"
    }

    fn description(&self) -> &str {
        "useful to send a welcome email to a new employee. The input is the email address of the recipient."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let recipient = parse_recipient(input)?;
        self.mailer
            .send(OutgoingEmail {
                to: recipient.clone(),
                subject: WELCOME_SUBJECT.to_string(),
                body: WELCOME_BODY.to_string(),
                attachments: Vec::new(),
            })
            .await?;
        Ok(format!("An email has been sent to {recipient}"))
    }
}

/// Sends the HR policy document to a new employee
pub struct HrPolicyEmailTool {
    mailer: Arc<dyn Mailer>,
    policy_document: PathBuf,
}

impl HrPolicyEmailTool {
    /// Creates the tool; `policy_document` is attached to every email.
    pub fn new(mailer: Arc<dyn Mailer>, policy_document: impl Into<PathBuf>) -> Self {
        Self {
            mailer,
            policy_document: policy_document.into(),
        }
    }
}

#[async_trait]
impl Tool for HrPolicyEmailTool {
    fn name(&self) -> &str {
        "HR_policy_email_tool"
    }

    fn description(&self) -> &str {
        "useful to send an email with the HR policies to the new employee. The input is the email address of the recipient."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let recipient = parse_recipient(input)?;

        let is_file = tokio::fs::metadata(&self.policy_document)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ToolError::ExecutionFailed(format!(
                "Attachment {} not found",
                self.policy_document.display()
            )));
        }
        debug!(attachment = %self.policy_document.display(), "Attaching HR policy document");

        self.mailer
            .send(OutgoingEmail {
                to: recipient.clone(),
                subject: POLICY_SUBJECT.to_string(),
                body: POLICY_BODY.to_string(),
                attachments: vec![self.policy_document.clone()],
            })
            .await?;
        Ok(format!("An email has been sent to {recipient}"))
    }
}

/// Emails the company Slack invite link
pub struct SlackInviteTool {
    mailer: Arc<dyn Mailer>,
    invite_url: String,
}

impl SlackInviteTool {
    /// Creates the tool with the workspace invite URL to send.
    pub fn new(mailer: Arc<dyn Mailer>, invite_url: impl Into<String>) -> Self {
        Self {
            mailer,
            invite_url: invite_url.into(),
        }
    }
}

#[async_trait]
impl Tool for SlackInviteTool {
    fn name(&self) -> &str {
        "slack_invite_tool"
    }

    fn description(&self) -> &str {
        "useful to invite a new employee to the company Slack workspace. The input is the email address of the recipient."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let recipient = parse_recipient(input)?;
        if self.invite_url.trim().is_empty() {
            return Err(ToolError::ExecutionFailed(
                "no Slack invite link is configured".to_string(),
            ));
        }
        self.mailer
            .send(OutgoingEmail {
                to: recipient.clone(),
                subject: SLACK_SUBJECT.to_string(),
                body: format!(
                    "You have been invited to the company Slack workspace. Join here: {}",
                    self.invite_url
                ),
                attachments: Vec::new(),
            })
            .await?;
        Ok(format!("A Slack invite has been sent to {recipient}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: OutgoingEmail) -> Result<(), ToolError> {
            Err(ToolError::ExecutionFailed("smtp rejected".to_string()))
        }
    }

    #[test]
    fn parse_recipient_strips_wrapping_characters() {
        assert_eq!(parse_recipient(" a@b.com ").expect("plain"), "a@b.com");
        assert_eq!(parse_recipient("\"a@b.com\"").expect("quoted"), "a@b.com");
        assert_eq!(parse_recipient("<jane@corp.io>").expect("angled"), "jane@corp.io");
    }

    #[test]
    fn parse_recipient_rejects_invalid_addresses() {
        for bad in ["", "   ", "jane", "jane@", "@corp.io", "a@b@c.com", "a b@c.com", "a@corp", "a@.com"] {
            let err = parse_recipient(bad).expect_err(bad);
            assert!(matches!(err, ToolError::InvalidArgs(_)), "{bad}: {err}");
        }
    }

    #[tokio::test]
    async fn welcome_email_tool_sends_welcome_message() {
        let outbox = Arc::new(OutboxMailer::new("hr@company.com"));
        let tool = WelcomeEmailTool::new(outbox.clone());

        let out = tool.execute("a@b.com").await.expect("send welcome");
        assert_eq!(out, "An email has been sent to a@b.com");

        let sent = outbox.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert_eq!(sent[0].subject, WELCOME_SUBJECT);
        assert!(sent[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn welcome_email_tool_propagates_mailer_failure() {
        let tool = WelcomeEmailTool::new(Arc::new(FailingMailer));
        let err = tool.execute("a@b.com").await.expect_err("mailer fails");
        assert!(err.to_string().contains("smtp rejected"));
    }

    #[tokio::test]
    async fn policy_email_tool_attaches_document() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let doc = tmp.path().join("HR_policies.pdf");
        std::fs::write(&doc, b"%PDF-1.4").expect("write doc");

        let outbox = Arc::new(OutboxMailer::new("hr@company.com"));
        let tool = HrPolicyEmailTool::new(outbox.clone(), &doc);
        tool.execute("new.hire@corp.io").await.expect("send policies");

        let sent = outbox.sent();
        assert_eq!(sent[0].subject, POLICY_SUBJECT);
        assert_eq!(sent[0].attachments, vec![doc]);
    }

    #[tokio::test]
    async fn policy_email_tool_fails_when_document_missing() {
        let outbox = Arc::new(OutboxMailer::new("hr@company.com"));
        let tool = HrPolicyEmailTool::new(outbox.clone(), "/definitely/not/here.pdf");
        let err = tool.execute("a@b.com").await.expect_err("missing doc");
        assert!(err.to_string().contains("not found"));
        assert!(outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn slack_invite_tool_includes_invite_link() {
        let outbox = Arc::new(OutboxMailer::new("hr@company.com"));
        let tool = SlackInviteTool::new(outbox.clone(), "https://join.slack.com/t/acme");
        let out = tool.execute("a@b.com").await.expect("invite");
        assert!(out.contains("a@b.com"));
        assert!(outbox.sent()[0].body.contains("https://join.slack.com/t/acme"));
    }

    #[tokio::test]
    async fn slack_invite_tool_requires_configured_link() {
        let tool = SlackInviteTool::new(Arc::new(OutboxMailer::new("hr@company.com")), " ");
        let err = tool.execute("a@b.com").await.expect_err("no link");
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }
}
