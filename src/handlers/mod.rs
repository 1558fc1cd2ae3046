// HTTP handlers, split by security tier:
// public (no session) and protected (session cookie or Bearer token).

pub mod protected;
pub mod public;
