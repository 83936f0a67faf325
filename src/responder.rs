use std::fmt::Display;

use async_trait::async_trait;

/// Turns one line of operator input into one reply.
///
/// The conversation loop only ever renders a failure, so any `Display`
/// error type works. Implementations own whatever conversation state they
/// keep; the loop holds none.
#[async_trait]
pub trait Responder: Send {
    type Error: Display + Send;

    async fn respond(&mut self, text: &str) -> Result<String, Self::Error>;
}
