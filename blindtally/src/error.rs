use thiserror::Error;

/// Error classes surfaced to callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed message, wrong type tag, truncated or oversized buffer.
    Protocol,
    /// Signature/MAC mismatch, failed proof, bad blinding.
    Crypto,
    /// Duplicate voter or resubmitted ballot.
    Policy,
    /// Tally recovery produced no small-range discrete-log match.
    Integrity,
    /// Socket, filesystem, or store failure.
    Io,
}

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("blindtally: unexpected message type")]
    UnexpectedMessage,

    #[error("blindtally: frame exceeds transport limit")]
    OversizedFrame,

    #[error("blindtally: encoding error: {0}")]
    Encoding(#[from] serde_cbor::Error),

    #[error("blindtally: ballot sequence is empty or lengths mismatch")]
    LengthMismatch,

    #[error("blindtally: server signature verification failed")]
    ServerAuth,

    #[error("blindtally: session echo does not match our public value")]
    SessionEcho,

    #[error("blindtally: record authentication failed")]
    RecordAuth,

    #[error("blindtally: registrar blind signature invalid")]
    BlindSignatureInvalid,

    #[error("blindtally: ballot proof invalid")]
    BallotProofInvalid,

    #[error("blindtally: partial decryption proof invalid")]
    PartialProofInvalid,

    #[error("blindtally: tallyer record signature invalid")]
    RecordSignatureInvalid,

    #[error("blindtally: vote must be 0 or 1")]
    VoteOutOfRange,

    #[error("blindtally: blinded message out of range for signing key")]
    BlindedOutOfRange,

    #[error("blindtally: value not invertible in group")]
    NonInvertible,

    #[error("blindtally: RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("blindtally: voter {0} is already registered")]
    DuplicateVoter(String),

    #[error("blindtally: ballot already recorded")]
    DuplicateBallot,

    #[error("blindtally: tally does not decode within the search bound")]
    TallyUndecodable,

    #[error("blindtally: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blindtally: key file {0}: {1}")]
    KeyFile(String, String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedMessage
            | Error::OversizedFrame
            | Error::Encoding(_)
            | Error::LengthMismatch => ErrorKind::Protocol,

            Error::ServerAuth
            | Error::SessionEcho
            | Error::RecordAuth
            | Error::BlindSignatureInvalid
            | Error::BallotProofInvalid
            | Error::PartialProofInvalid
            | Error::RecordSignatureInvalid
            | Error::VoteOutOfRange
            | Error::BlindedOutOfRange
            | Error::NonInvertible
            | Error::Rsa(_) => ErrorKind::Crypto,

            Error::DuplicateVoter(_) | Error::DuplicateBallot => ErrorKind::Policy,

            Error::TallyUndecodable => ErrorKind::Integrity,

            Error::Io(_) | Error::KeyFile(_, _) => ErrorKind::Io,
        }
    }
}
