//! Line-based recognizer for headless use
//!
//! Each non-empty input line counts as one finalized utterance.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use super::engine::{EngineEvent, RecognitionEngine, RecognitionResult};
use crate::Result;

/// Recognizes typed lines instead of speech
pub struct LineRecognizer<R> {
    lines: Lines<R>,
    active: bool,
}

impl LineRecognizer<BufReader<Stdin>> {
    /// Read utterances from standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> LineRecognizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            active: false,
        }
    }
}

#[async_trait(?Send)]
impl<R: AsyncBufRead + Unpin> RecognitionEngine for LineRecognizer<R> {
    fn start(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active = false;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if self.active => {
                    return Some(EngineEvent::Results {
                        result_index: 0,
                        results: vec![RecognitionResult::finished(line)],
                    });
                }
                Ok(Some(_)) => tracing::debug!("input ignored while stopped"),
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "input stream failed");
                    return None;
                }
            }
        }
    }
}
