//! TCP transport and connection manager.
//!
//! ```text
//!            ┌──────────────┐ accept   ┌─────────┐
//!  socket ──►│ TcpTransport │─────────►│         │  Session   ┌─────────────────┐
//!            │  handshake   │◄─────────│ Switch  │───────────►│ ProtocolHandler │
//!            └──────────────┘  dial    │  caps   │◄───────────│  (e.g. PEX)     │
//!                                      └─────────┘ candidates └─────────────────┘
//! ```
//!
//! [`TcpTransport`] owns the listening socket and performs the descriptor
//! handshake. [`Switch`] runs the accept and dial loops, enforces the
//! connection caps and hands each admitted connection to the registered
//! [`ProtocolHandler`].

pub mod frame;

mod peers;
mod session;
mod switch;
mod transport;

pub use peers::RejectReason;
pub use session::{ProtocolHandler, Session, SessionError};
pub use switch::{Switch, SwitchConfig, SwitchError};
pub use transport::{
    Connection, DEFAULT_DIAL_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, HandshakeError, TcpTransport,
    TransportError, check_compatible,
};
