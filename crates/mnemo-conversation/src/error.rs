use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("message list is empty")]
    EmptyMessages,

    #[error("transcript sink write failed: {0}")]
    SinkWrite(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConversationError>;
