//! Slack Block Kit messages for incoming webhooks

use serde::{Deserialize, Serialize};

use super::export::ExportMethod;
use super::release::InstallLink;

pub const INSTALL_INSTRUCTION: &str = "Select a flavour to install on your iPhone:";
pub const TESTFLIGHT_POINTER: &str = "<https://apps.apple.com/us/app/testflight/id899247664?platform=iphone|Open the Testflight app on your iPhone to install the app.>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Mrkdwn { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { text: TextObject },
    Context { elements: Vec<TextObject> },
}

impl Block {
    pub fn section(text: impl Into<String>) -> Self {
        Self::Section {
            text: TextObject::Mrkdwn { text: text.into() },
        }
    }

    pub fn context(text: impl Into<String>) -> Self {
        Self::Context {
            elements: vec![TextObject::Mrkdwn { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub blocks: Vec<Block>,
}

/// `<url|label>` link markup
pub fn link(url: &str, label: &str) -> String {
    format!("<{}|{}>", url, label)
}

/// Build summary blocks: summary, install instructions for the method, then
/// an optional Jira link as `(base_url, ticket)`
pub fn build_summary_message(
    summary: &str,
    method: ExportMethod,
    links: &[InstallLink],
    jira: Option<(&str, &str)>,
) -> Message {
    let mut blocks = vec![Block::section(summary)];

    match method {
        ExportMethod::AdHoc | ExportMethod::Enterprise => {
            blocks.push(Block::context(INSTALL_INSTRUCTION));
            let links = links
                .iter()
                .map(|l| link(&l.url, &l.flavour.label_including_release))
                .collect::<Vec<_>>()
                .join(" - ");
            blocks.push(Block::section(links));
        }
        ExportMethod::AppStore => blocks.push(Block::context(TESTFLIGHT_POINTER)),
        ExportMethod::Development => {}
    }

    if let Some((base_url, ticket)) = jira {
        let url = format!("{}/browse/{}", base_url.trim_end_matches('/'), ticket);
        blocks.push(Block::context(format!("Jira: {}", link(&url, ticket))));
    }

    Message { blocks }
}
