//! Network-facing domain components: the wireless link and the backend
//! HTTP client.  Both drive their ports and never own them.

pub mod backend;
pub mod connectivity;
