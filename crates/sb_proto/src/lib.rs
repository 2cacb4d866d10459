//! sb_proto — Wire types and serialisation for Sealbox
//!
//! Everything the relay server sees is defined here. All binary fields
//! (ciphertext, IV, wrapped keys, public keys) cross the boundary as
//! base64 text, serialised to JSON.
//!
//! # Modules
//! - `envelope` — the encrypted message envelope (what the relay sees)
//! - `codec`    — seal/open: the hybrid encrypt/decrypt operation
//! - `invite`   — invite handshake wire types
//! - `api`      — directory/relay DTOs shared between client and services

pub mod api;
pub mod codec;
pub mod envelope;
pub mod invite;

pub use codec::{open, seal, CodecError, Role, SealedFields};
pub use envelope::{Envelope, EnvelopeDraft};
pub use invite::{InviteDecision, InviteRecord, InviteState, InviteStatusView};
