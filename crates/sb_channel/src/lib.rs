//! sb_channel — invite handshake and channel session orchestration
//!
//! The invite handshake gates everything: no envelope between two users is
//! created or displayed until the pair's invite reaches `accepted`. Once it
//! does, a [`session::ChannelSession`] drives the conversation with one
//! peer — history fetch + decrypt, send with local echo, and live event
//! reconciliation — against three black-box collaborators supplied by the
//! hosting application:
//!
//! - a **Directory** resolving user ids to public keys,
//! - a **Relay** storing and pushing opaque envelopes,
//! - an **invite transport** carrying handshake actions.
//!
//! # Module layout
//! - `invite`    — the pair-scoped invite state machine (the ledger)
//! - `transport` — collaborator traits + live `ChannelEvent`s
//! - `session`   — per-peer orchestration
//! - `local`     — in-process reference backend (tests, single-process use)
//! - `error`     — session-level error type

pub mod error;
pub mod invite;
pub mod local;
pub mod session;
pub mod transport;

pub use error::ChannelError;
pub use invite::{InviteError, InviteLedger};
pub use local::LocalNetwork;
pub use session::{ChannelSession, ChatMessage, MessageBody};
pub use transport::{ChannelEvent, Directory, InviteTransport, Relay, TransportError};
