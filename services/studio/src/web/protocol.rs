//! services/studio/src/web/protocol.rs
//!
//! Defines the WebSocket messages the server pushes to the browser while a
//! book is being generated.

use pollen_pages_core::{GenerationStage, Progress};
use serde::Serialize;

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A progress snapshot. The UI updates its progress bar and stage text.
    Progress(Progress),

    /// The book is installed and ready to display.
    BookReady { title: String },

    /// A fatal generation error. The UI returns to its empty state.
    Error { message: String },
}

impl ServerMessage {
    /// The messages a progress snapshot translates to: the snapshot itself,
    /// followed by a terminal message once the attempt has ended.
    pub fn from_progress(progress: Progress) -> Vec<ServerMessage> {
        let terminal = match &progress.stage {
            GenerationStage::Done => Some(ServerMessage::BookReady {
                title: progress.label.clone(),
            }),
            GenerationStage::Failed { .. } => Some(ServerMessage::Error {
                message: progress.detail.clone(),
            }),
            _ => None,
        };
        std::iter::once(ServerMessage::Progress(progress))
            .chain(terminal)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn progress(stage: GenerationStage, label: &str, detail: &str) -> Progress {
        Progress {
            percent: 100,
            stage,
            label: label.to_string(),
            detail: detail.to_string(),
        }
    }

    #[test]
    fn progress_message_is_flat() {
        let msg = ServerMessage::Progress(progress(
            GenerationStage::GeneratingImage { index: 1, total: 3 },
            "Painting...",
            "Rendering page 2 of 3",
        ));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "progress",
                "percent": 100,
                "stage": {"kind": "generating_image", "index": 1, "total": 3},
                "label": "Painting...",
                "detail": "Rendering page 2 of 3"
            })
        );
    }

    #[test]
    fn terminal_stages_add_a_message() {
        let done = ServerMessage::from_progress(progress(GenerationStage::Done, "Voyage", "3 pages"));
        assert_eq!(done.len(), 2);
        assert!(matches!(&done[1], ServerMessage::BookReady { title } if title == "Voyage"));

        let failed = ServerMessage::from_progress(progress(
            GenerationStage::Failed { reason: "x".into() },
            "Generation failed",
            "try again",
        ));
        assert!(matches!(&failed[1], ServerMessage::Error { message } if message == "try again"));

        let mid = ServerMessage::from_progress(progress(GenerationStage::GeneratingStory, "", ""));
        assert_eq!(mid.len(), 1);
    }
}
