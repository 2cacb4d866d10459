use thiserror::Error;

use sb_crypto::CryptoError;
use sb_proto::codec::CodecError;
use sb_store::StoreError;

use crate::invite::InviteError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("No active peer selected")]
    NoActivePeer,

    #[error("Conversation with {0} is not accepted yet")]
    NotAccepted(String),

    #[error(transparent)]
    Invite(#[from] InviteError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
