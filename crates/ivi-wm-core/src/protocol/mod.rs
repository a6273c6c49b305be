//! JSON command protocol: envelope types and socket framing constants.

pub mod envelope;
pub mod wire;
