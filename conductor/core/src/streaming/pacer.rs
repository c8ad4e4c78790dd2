//! Paced Emitter
//!
//! Takes any fragment sequence and re-emits it one unit (character) at a
//! time with a fixed delay between units. Terminal events are forwarded
//! unchanged and end the paced stream.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::backend::StreamingToken;

/// Channel capacity of a paced stream
const PACED_BUFFER: usize = 256;

/// Split a fragment into reveal units
pub fn split_units(text: &str) -> impl Iterator<Item = String> + '_ {
    text.chars().map(String::from)
}

/// Re-emits streamed fragments at unit granularity
#[derive(Clone, Copy, Debug)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    /// Create a pacer with a fixed inter-unit delay
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Wrap a token stream
    ///
    /// With a zero delay the stream is returned as is. Otherwise a task
    /// forwards every unit, sleeping between units, and stops as soon as the
    /// consumer goes away.
    pub fn pace(&self, mut rx: mpsc::Receiver<StreamingToken>) -> mpsc::Receiver<StreamingToken> {
        if self.delay.is_zero() {
            return rx;
        }

        let delay = self.delay;
        let (tx, paced) = mpsc::channel(PACED_BUFFER);

        tokio::spawn(async move {
            while let Some(token) = rx.recv().await {
                match token {
                    StreamingToken::Token(text) => {
                        for unit in split_units(&text) {
                            if tx.send(StreamingToken::Token(unit)).await.is_err() {
                                return;
                            }
                            tokio::time::sleep(delay).await;
                        }
                    }
                    terminal => {
                        let _ = tx.send(terminal).await;
                        return;
                    }
                }
            }
        });

        paced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut rx: mpsc::Receiver<StreamingToken>) -> Vec<StreamingToken> {
        let mut out = Vec::new();
        while let Some(token) = rx.recv().await {
            out.push(token);
        }
        out
    }

    #[test]
    fn test_split_units_handles_multibyte() {
        let units: Vec<String> = split_units("¡olé!").collect();
        assert_eq!(units, vec!["¡", "o", "l", "é", "!"]);
    }

    #[tokio::test]
    async fn test_pace_emits_single_characters() {
        let (tx, rx) = mpsc::channel(10);
        tx.send(StreamingToken::Token("Hel".to_string())).await.unwrap();
        tx.send(StreamingToken::Token("lo".to_string())).await.unwrap();
        tx.send(StreamingToken::Complete {
            message: "Hello".to_string(),
        })
        .await
        .unwrap();
        drop(tx);

        let tokens = collect(Pacer::new(Duration::from_millis(1)).pace(rx)).await;

        let texts: Vec<&str> = tokens
            .iter()
            .filter_map(|t| match t {
                StreamingToken::Token(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["H", "e", "l", "l", "o"]);
        assert!(matches!(
            tokens.last(),
            Some(StreamingToken::Complete { message }) if message == "Hello"
        ));
    }

    #[tokio::test]
    async fn test_pace_forwards_error_and_stops() {
        let (tx, rx) = mpsc::channel(10);
        tx.send(StreamingToken::Token("ab".to_string())).await.unwrap();
        tx.send(StreamingToken::Error("boom".to_string())).await.unwrap();
        tx.send(StreamingToken::Token("never".to_string())).await.unwrap();
        drop(tx);

        let tokens = collect(Pacer::new(Duration::from_millis(1)).pace(rx)).await;
        assert_eq!(tokens.len(), 3);
        assert!(matches!(&tokens[2], StreamingToken::Error(e) if e == "boom"));
    }

    #[tokio::test]
    async fn test_zero_delay_passes_through() {
        let (tx, rx) = mpsc::channel(10);
        tx.send(StreamingToken::Token("whole".to_string())).await.unwrap();
        drop(tx);

        let tokens = collect(Pacer::new(Duration::ZERO).pace(rx)).await;
        assert!(matches!(&tokens[0], StreamingToken::Token(t) if t == "whole"));
    }
}
